// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{LineItem, OrderDraft, Product, ProductId, ProductsFormInput, StepPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Duplicate,
}

/// Line items being edited on the products step. Kept apart from the draft
/// until saved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductSelection {
    items: Vec<LineItem>,
    observations: String,
}

impl ProductSelection {
    pub fn from_draft(draft: &OrderDraft) -> Self {
        Self {
            items: draft.line_items.clone(),
            observations: draft.observations.clone().unwrap_or_default(),
        }
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: ProductId) -> bool {
        self.items.iter().any(|item| item.product_id == id)
    }

    /// Appends `product` at quantity 1. A product already in the list is
    /// left as is.
    pub fn add(&mut self, product: &Product) -> AddOutcome {
        if self.contains(product.id) {
            return AddOutcome::Duplicate;
        }
        self.items.push(LineItem::from_product(product));
        AddOutcome::Added
    }

    pub fn remove(&mut self, id: ProductId) -> Option<LineItem> {
        let index = self.items.iter().position(|item| item.product_id == id)?;
        Some(self.items.remove(index))
    }

    pub fn increment(&mut self, id: ProductId) -> Option<u32> {
        let item = self.items.iter_mut().find(|item| item.product_id == id)?;
        item.quantity = item.quantity.saturating_add(1);
        Some(item.quantity)
    }

    /// Returns the new quantity, or `None` when the product is missing or
    /// already at 1.
    pub fn decrement(&mut self, id: ProductId) -> Option<u32> {
        let item = self.items.iter_mut().find(|item| item.product_id == id)?;
        if item.quantity <= 1 {
            return None;
        }
        item.quantity -= 1;
        Some(item.quantity)
    }

    pub fn set_quantity(&mut self, id: ProductId, quantity: u32) -> bool {
        if quantity == 0 {
            return false;
        }
        match self.items.iter_mut().find(|item| item.product_id == id) {
            Some(item) => {
                item.quantity = quantity;
                true
            }
            None => false,
        }
    }

    pub fn observations(&self) -> &str {
        &self.observations
    }

    pub fn observations_mut(&mut self) -> &mut String {
        &mut self.observations
    }

    pub fn payload(&self, include_observations: bool) -> StepPayload {
        StepPayload::Products(ProductsFormInput {
            line_items: self.items.clone(),
            observations: include_observations.then(|| self.observations.clone()),
        })
    }
}
