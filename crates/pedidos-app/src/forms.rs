// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use std::fmt;

use crate::{Address, Company, Customer, DraftPatch, LineItem, StepKind, UserProfile};

/// Validation failure tied to one form field. Carried inside
/// `anyhow::Error`; the UI recovers it with `downcast_ref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for FieldError {}

/// Step in the wizard that records free-text observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObservationsStep {
    Address,
    #[default]
    Products,
}

impl ObservationsStep {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::Products => "products",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "address" => Some(Self::Address),
            "products" => Some(Self::Products),
            _ => None,
        }
    }

    pub const fn step(self) -> StepKind {
        match self {
            Self::Address => StepKind::Address,
            Self::Products => StepKind::Products,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompanyFormInput {
    pub company: Option<Company>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CustomerFormInput {
    pub customer: Option<Customer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddressFormInput {
    pub delivery: Option<Address>,
    pub invoice: Option<Address>,
    /// `None` when observations are collected by another step.
    pub observations: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductsFormInput {
    pub line_items: Vec<LineItem>,
    pub observations: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepPayload {
    Company(CompanyFormInput),
    Customer(CustomerFormInput),
    Address(AddressFormInput),
    Products(ProductsFormInput),
}

impl StepPayload {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::Company(_) => StepKind::Company,
            Self::Customer(_) => StepKind::Customer,
            Self::Address(_) => StepKind::Address,
            Self::Products(_) => StepKind::Products,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Company(company) => company.validate(),
            Self::Customer(customer) => customer.validate(),
            Self::Address(address) => address.validate(),
            Self::Products(products) => products.validate(),
        }
    }

    /// Validates and converts the step's contribution into a draft patch.
    pub fn into_patch(self) -> Result<DraftPatch> {
        self.validate()?;
        let patch = match self {
            Self::Company(form) => DraftPatch {
                company: form.company,
                ..DraftPatch::default()
            },
            Self::Customer(form) => DraftPatch {
                customer: form.customer,
                ..DraftPatch::default()
            },
            Self::Address(form) => DraftPatch {
                delivery_address: form.delivery,
                invoice_address: form.invoice,
                observations: form.observations,
                ..DraftPatch::default()
            },
            Self::Products(form) => DraftPatch {
                line_items: Some(form.line_items),
                observations: form.observations,
                ..DraftPatch::default()
            },
        };
        Ok(patch)
    }
}

impl CompanyFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.company.is_none() {
            return Err(FieldError::new("company", "select a company to continue").into());
        }
        Ok(())
    }
}

impl CustomerFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.customer.is_none() {
            return Err(FieldError::new(
                "customer",
                "select a customer -- type at least 3 characters to search",
            )
            .into());
        }
        Ok(())
    }
}

impl AddressFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.delivery.is_none() {
            return Err(FieldError::new("delivery", "select a delivery address").into());
        }
        if self.invoice.is_none() {
            return Err(FieldError::new("invoice", "select an invoice address").into());
        }
        Ok(())
    }
}

impl ProductsFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.line_items.is_empty() {
            return Err(FieldError::new("products", "add at least one product").into());
        }
        if let Some(item) = self.line_items.iter().find(|item| item.quantity == 0) {
            bail!("quantity for {} must be at least 1", item.product_name);
        }
        Ok(())
    }
}

/// Administrator edit of a user's details. Role and activation status are
/// read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserEdit {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub code_erp: Option<String>,
}

impl UserEdit {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.email.is_none() && self.code_erp.is_none()
    }

    /// Returns `profile` with the edited fields replaced; untouched fields
    /// are carried over as they are.
    pub fn apply_to(&self, profile: &UserProfile) -> Result<UserProfile> {
        if self.is_empty() {
            bail!("nothing to change for user {}", profile.id);
        }
        let mut updated = profile.clone();
        if let Some(full_name) = &self.full_name {
            updated.full_name = required("full_name", full_name)?;
        }
        if let Some(email) = &self.email {
            let email = required("email", email)?;
            if !email.contains('@') {
                return Err(
                    FieldError::new("email", format!("{email:?} is not an email address")).into(),
                );
            }
            updated.email = email;
        }
        if let Some(code_erp) = &self.code_erp {
            updated.code_erp = required("code_erp", code_erp)?;
        }
        Ok(updated)
    }
}

fn required(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FieldError::new(field, "must not be blank").into());
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::{
        AddressFormInput, CompanyFormInput, CustomerFormInput, FieldError, ObservationsStep,
        ProductsFormInput, StepPayload, UserEdit,
    };
    use crate::{
        Address, AddressKind, Company, CompanyId, LineItem, ProductId, StepKind, UserId,
        UserProfile,
    };

    #[test]
    fn missing_company_reports_field_error() {
        let error = StepPayload::Company(CompanyFormInput::default())
            .validate()
            .expect_err("empty company form should fail");
        let field = error
            .downcast_ref::<FieldError>()
            .expect("field error expected");
        assert_eq!(field.field, "company");
    }

    #[test]
    fn missing_customer_mentions_search_threshold() {
        let error = CustomerFormInput::default()
            .validate()
            .expect_err("empty customer form should fail");
        assert!(error.to_string().contains("at least 3 characters"));
    }

    #[test]
    fn address_form_checks_delivery_before_invoice() {
        let error = AddressFormInput {
            delivery: None,
            invoice: Some(Address::default_for(AddressKind::Invoice)),
            observations: None,
        }
        .validate()
        .expect_err("missing delivery should fail");
        let field = error
            .downcast_ref::<FieldError>()
            .expect("field error expected");
        assert_eq!(field.field, "delivery");
    }

    #[test]
    fn company_payload_converts_to_patch() -> anyhow::Result<()> {
        let company = Company {
            id: CompanyId::new(2),
            name: "Nutreo".to_owned(),
        };
        let payload = StepPayload::Company(CompanyFormInput {
            company: Some(company.clone()),
        });
        assert_eq!(payload.kind(), StepKind::Company);
        let patch = payload.into_patch()?;
        assert_eq!(patch.company, Some(company));
        assert!(patch.customer.is_none());
        Ok(())
    }

    #[test]
    fn products_payload_always_carries_line_items() -> anyhow::Result<()> {
        let patch = StepPayload::Products(ProductsFormInput {
            line_items: vec![LineItem {
                product_id: ProductId::new(4),
                product_name: "Producto D".to_owned(),
                unit: "kg".to_owned(),
                quantity: 3,
            }],
            observations: Some("fragile".to_owned()),
        })
        .into_patch()?;
        assert_eq!(patch.line_items.map(|items| items.len()), Some(1));
        assert_eq!(patch.observations.as_deref(), Some("fragile"));
        Ok(())
    }

    #[test]
    fn empty_product_list_is_rejected() {
        assert!(ProductsFormInput::default().validate().is_err());
    }

    #[test]
    fn observations_step_parses_config_values() {
        assert_eq!(
            ObservationsStep::parse("address"),
            Some(ObservationsStep::Address)
        );
        assert_eq!(ObservationsStep::parse("products").map(|s| s.step()), Some(StepKind::Products));
        assert_eq!(ObservationsStep::parse("customer"), None);
    }

    fn pending_user() -> UserProfile {
        UserProfile {
            id: UserId::new("auth0|pending-1"),
            code_erp: String::new(),
            full_name: "Nuevo Usuario".to_owned(),
            email: "nuevo@example.com".to_owned(),
            user_type: "customer".to_owned(),
            is_active: false,
        }
    }

    #[test]
    fn user_edit_touches_only_the_given_fields() {
        let edit = UserEdit {
            code_erp: Some(" CLI-301 ".to_owned()),
            ..UserEdit::default()
        };
        let updated = edit.apply_to(&pending_user()).expect("valid edit");
        assert_eq!(updated.code_erp, "CLI-301");
        assert_eq!(updated.full_name, "Nuevo Usuario");
        assert_eq!(updated.user_type, "customer");
        assert!(!updated.is_active);
    }

    #[test]
    fn user_edit_rejects_blank_values_and_bad_emails() {
        let blank = UserEdit {
            full_name: Some("   ".to_owned()),
            ..UserEdit::default()
        };
        let error = blank.apply_to(&pending_user()).expect_err("blank name");
        assert_eq!(
            error.downcast_ref::<FieldError>().map(|error| error.field),
            Some("full_name")
        );

        let email = UserEdit {
            email: Some("nuevo.example.com".to_owned()),
            ..UserEdit::default()
        };
        let error = email.apply_to(&pending_user()).expect_err("bad email");
        assert!(error.to_string().starts_with("email:"));

        assert!(UserEdit::default().apply_to(&pending_user()).is_err());
    }
}
