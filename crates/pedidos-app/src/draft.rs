// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use std::collections::BTreeSet;

use crate::{
    Address, AddressKind, Company, Customer, LineItem, NewOrder, NewOrderLine, PriceList,
    StepKind,
};

/// Order being assembled across the wizard steps. Only the controller owns
/// one; steps see it by shared reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderDraft {
    pub company: Option<Company>,
    pub customer: Option<Customer>,
    pub delivery_address: Option<Address>,
    pub invoice_address: Option<Address>,
    pub price_list: Option<PriceList>,
    pub observations: Option<String>,
    pub line_items: Vec<LineItem>,
}

/// Partial update of an [`OrderDraft`]. `Some` overwrites the matching draft
/// field, `None` leaves it alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftPatch {
    pub company: Option<Company>,
    pub customer: Option<Customer>,
    pub delivery_address: Option<Address>,
    pub invoice_address: Option<Address>,
    pub price_list: Option<PriceList>,
    pub observations: Option<String>,
    pub line_items: Option<Vec<LineItem>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DraftField {
    Company,
    Customer,
    DeliveryAddress,
    InvoiceAddress,
    PriceList,
    Observations,
    LineItems,
}

impl DraftPatch {
    pub fn fields(&self) -> Vec<DraftField> {
        let mut fields = Vec::new();
        if self.company.is_some() {
            fields.push(DraftField::Company);
        }
        if self.customer.is_some() {
            fields.push(DraftField::Customer);
        }
        if self.delivery_address.is_some() {
            fields.push(DraftField::DeliveryAddress);
        }
        if self.invoice_address.is_some() {
            fields.push(DraftField::InvoiceAddress);
        }
        if self.price_list.is_some() {
            fields.push(DraftField::PriceList);
        }
        if self.observations.is_some() {
            fields.push(DraftField::Observations);
        }
        if self.line_items.is_some() {
            fields.push(DraftField::LineItems);
        }
        fields
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(address) = &self.delivery_address
            && address.kind != AddressKind::Delivery
        {
            bail!(
                "address {} is an {} address -- pick a delivery address",
                address.id,
                address.kind.as_str()
            );
        }
        if let Some(address) = &self.invoice_address
            && address.kind != AddressKind::Invoice
        {
            bail!(
                "address {} is a {} address -- pick an invoice address",
                address.id,
                address.kind.as_str()
            );
        }
        if let Some(items) = &self.line_items {
            let mut seen = BTreeSet::new();
            for item in items {
                if item.quantity == 0 {
                    bail!("quantity for {} must be at least 1", item.product_name);
                }
                if !seen.insert(item.product_id) {
                    bail!("product {} appears more than once", item.product_name);
                }
            }
        }
        Ok(())
    }
}

impl OrderDraft {
    /// Shallow merge. The patch is validated first; a rejected patch leaves
    /// the draft untouched.
    pub fn merge(&mut self, patch: DraftPatch) -> Result<Vec<DraftField>> {
        patch.validate()?;
        let fields = patch.fields();

        if let Some(company) = patch.company {
            self.company = Some(company);
        }
        if let Some(customer) = patch.customer {
            self.customer = Some(customer);
        }
        if let Some(address) = patch.delivery_address {
            self.delivery_address = Some(address);
        }
        if let Some(address) = patch.invoice_address {
            self.invoice_address = Some(address);
        }
        if let Some(price_list) = patch.price_list {
            self.price_list = Some(price_list);
        }
        if let Some(observations) = patch.observations {
            let trimmed = observations.trim();
            self.observations = (!trimmed.is_empty()).then(|| trimmed.to_owned());
        }
        if let Some(items) = patch.line_items {
            self.line_items = items;
        }

        Ok(fields)
    }

    /// Name of the draft field `step` needs for its lookups when it is still
    /// missing.
    pub fn missing_dependency(&self, step: StepKind) -> Option<&'static str> {
        match step {
            StepKind::Company => None,
            StepKind::Customer => self.company.is_none().then_some("company"),
            StepKind::Address | StepKind::Products => {
                if self.company.is_none() {
                    Some("company")
                } else if self.customer.is_none() {
                    Some("customer")
                } else {
                    None
                }
            }
        }
    }

    pub fn contributes(&self, step: StepKind) -> bool {
        match step {
            StepKind::Company => self.company.is_some(),
            StepKind::Customer => self.customer.is_some(),
            StepKind::Address => self.delivery_address.is_some() && self.invoice_address.is_some(),
            StepKind::Products => !self.line_items.is_empty(),
        }
    }

    pub fn total_units(&self) -> u64 {
        self.line_items
            .iter()
            .map(|item| u64::from(item.quantity))
            .sum()
    }

    pub fn to_new_order(&self) -> Result<NewOrder> {
        let Some(company) = &self.company else {
            bail!("company is required -- go back to the company step and select one");
        };
        let Some(customer) = &self.customer else {
            bail!("customer is required -- go back to the customer step and select one");
        };
        let Some(delivery) = &self.delivery_address else {
            bail!("delivery address is required -- complete the order info step");
        };
        let Some(invoice) = &self.invoice_address else {
            bail!("invoice address is required -- complete the order info step");
        };
        if self.line_items.is_empty() {
            bail!("order has no products -- add at least one product and save");
        }

        Ok(NewOrder {
            company_id: company.id,
            customer_id: customer.id,
            delivery_address_id: delivery.id.clone(),
            invoice_address_id: invoice.id.clone(),
            price_list_id: self.price_list.as_ref().map(|list| list.id),
            observations: self.observations.clone(),
            lines: self
                .line_items
                .iter()
                .map(|item| NewOrderLine {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect(),
        })
    }
}
