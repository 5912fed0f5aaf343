// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use crate::ids::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub city: Option<String>,
    pub vat: Option<String>,
    pub email: Option<String>,
}

impl Customer {
    pub fn named(id: CustomerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            city: None,
            vat: None,
            email: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AddressKind {
    Delivery,
    Invoice,
}

impl AddressKind {
    pub const ALL: [Self; 2] = [Self::Delivery, Self::Invoice];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Delivery => "delivery",
            Self::Invoice => "invoice",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "delivery" => Some(Self::Delivery),
            "invoice" => Some(Self::Invoice),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Delivery => "delivery address",
            Self::Invoice => "invoice address",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub name: String,
    pub kind: AddressKind,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

impl Address {
    /// Stand-in used when the backend has no interlocutor of this kind for a
    /// customer.
    pub fn default_for(kind: AddressKind) -> Self {
        match kind {
            AddressKind::Delivery => Self {
                id: AddressId::new("delivery-default"),
                name: "Main address".to_owned(),
                kind,
                street: Some("Calle Principal #123".to_owned()),
                city: Some("Ciudad de México".to_owned()),
                state: Some("CDMX".to_owned()),
                country: Some("México".to_owned()),
            },
            AddressKind::Invoice => Self {
                id: AddressId::new("invoice-default"),
                name: "Billing address".to_owned(),
                kind,
                street: Some("Av. Reforma #456".to_owned()),
                city: Some("Ciudad de México".to_owned()),
                state: Some("CDMX".to_owned()),
                country: Some("México".to_owned()),
            },
        }
    }

    pub fn is_synthesized_default(&self) -> bool {
        self.id == Self::default_for(self.kind).id
    }

    pub fn display_line(&self) -> String {
        let parts = [&self.street, &self.city, &self.state, &self.country]
            .into_iter()
            .flatten()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>();
        if parts.is_empty() {
            return "address not specified".to_owned();
        }
        parts.join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub unit: String,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceList {
    pub id: PriceListId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit: String,
    pub quantity: u32,
}

impl LineItem {
    pub fn from_product(product: &Product) -> Self {
        Self {
            product_id: product.id,
            product_name: product.name.clone(),
            unit: product.unit.clone(),
            quantity: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Submission payload built from a complete draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub company_id: CompanyId,
    pub customer_id: CustomerId,
    pub delivery_address_id: AddressId,
    pub invoice_address_id: AddressId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_list_id: Option<PriceListId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
    pub lines: Vec<NewOrderLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    pub id: OrderId,
    pub created_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    /// Blank until an administrator completes the profile, as are
    /// `full_name` and `user_type`.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub code_erp: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub full_name: String,
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub user_type: String,
    pub is_active: bool,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum StepKind {
    #[default]
    Company,
    Customer,
    Address,
    Products,
}

impl StepKind {
    pub const ALL: [Self; 4] = [Self::Company, Self::Customer, Self::Address, Self::Products];

    pub const fn index(self) -> usize {
        match self {
            Self::Company => 0,
            Self::Customer => 1,
            Self::Address => 2,
            Self::Products => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Customer => "customer",
            Self::Address => "order info",
            Self::Products => "products",
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::Company => "Select company",
            Self::Customer => "Select customer",
            Self::Address => "Order information",
            Self::Products => "Add products",
        }
    }

    pub const fn is_last(self) -> bool {
        self.index() == Self::ALL.len() - 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Address, AddressKind, StepKind};
    use crate::AddressId;

    #[test]
    fn address_display_line_skips_missing_parts() {
        let address = Address {
            id: AddressId::new("44"),
            name: "Warehouse".to_owned(),
            kind: AddressKind::Delivery,
            street: Some("Cra 7 #12-30".to_owned()),
            city: None,
            state: Some("  ".to_owned()),
            country: Some("Colombia".to_owned()),
        };
        assert_eq!(address.display_line(), "Cra 7 #12-30, Colombia");
    }

    #[test]
    fn address_display_line_falls_back_when_empty() {
        let address = Address {
            id: AddressId::new("45"),
            name: String::new(),
            kind: AddressKind::Invoice,
            street: None,
            city: None,
            state: None,
            country: None,
        };
        assert_eq!(address.display_line(), "address not specified");
    }

    #[test]
    fn default_addresses_are_marked_synthesized() {
        for kind in AddressKind::ALL {
            let address = Address::default_for(kind);
            assert_eq!(address.kind, kind);
            assert!(address.is_synthesized_default());
        }
    }

    #[test]
    fn address_kind_round_trips_wire_names() {
        assert_eq!(AddressKind::parse("delivery"), Some(AddressKind::Delivery));
        assert_eq!(AddressKind::parse("invoice"), Some(AddressKind::Invoice));
        assert_eq!(AddressKind::parse("billing"), None);
    }

    #[test]
    fn step_index_mapping_is_dense() {
        for (index, step) in StepKind::ALL.iter().enumerate() {
            assert_eq!(step.index(), index);
            assert_eq!(StepKind::from_index(index), Some(*step));
        }
        assert_eq!(StepKind::from_index(StepKind::ALL.len()), None);
        assert!(StepKind::Products.is_last());
        assert!(!StepKind::Address.is_last());
    }
}
