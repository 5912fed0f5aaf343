// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;

use crate::{
    Address, AddressKind, Company, CompanyId, Customer, CustomerId, NewOrder, OrderReceipt,
    PriceList, Product, StepKind, UserEdit, UserId, UserProfile,
};

pub trait CompanyLookup {
    fn list_companies(&self) -> Result<Vec<Company>>;
}

pub trait CustomerLookup {
    /// Returns an empty list without a request when `term` is shorter than
    /// three characters.
    fn search_customers(&self, company: CompanyId, term: &str) -> Result<Vec<Customer>>;
}

pub trait AddressLookup {
    /// Never empty: a synthesized default stands in when the backend has no
    /// address of `kind`.
    fn list_addresses(&self, customer: CustomerId, kind: AddressKind) -> Result<Vec<Address>>;
}

pub trait ProductLookup {
    fn search_products(&self, company: CompanyId, term: &str) -> Result<Vec<Product>>;
}

pub trait PriceListLookup {
    fn find_price_list(&self, customer: CustomerId, company: CompanyId)
    -> Result<Option<PriceList>>;
}

pub trait OrderSubmission {
    fn create_order(&self, order: &NewOrder) -> Result<OrderReceipt>;
}

pub trait UserDirectory {
    fn current_profile(&self) -> Result<UserProfile>;
    fn list_users(&self) -> Result<Vec<UserProfile>>;
    fn get_user(&self, id: &UserId) -> Result<UserProfile>;
    fn update_user(&self, profile: &UserProfile) -> Result<UserProfile>;
}

/// Loads the user, applies `edit` and stores the result.
pub fn edit_user<D: UserDirectory + ?Sized>(
    directory: &D,
    id: &UserId,
    edit: &UserEdit,
) -> Result<UserProfile> {
    let current = directory.get_user(id)?;
    let updated = edit.apply_to(&current)?;
    directory.update_user(&updated)
}

/// Everything the wizard consumes from the backend.
pub trait OrderBackend:
    CompanyLookup + CustomerLookup + AddressLookup + ProductLookup + PriceListLookup + OrderSubmission
{
}

impl<T> OrderBackend for T where
    T: CompanyLookup
        + CustomerLookup
        + AddressLookup
        + ProductLookup
        + PriceListLookup
        + OrderSubmission
{
}

/// A dependent lookup issued by a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    Companies,
    Customers { company: CompanyId, term: String },
    Addresses { customer: CustomerId, kind: AddressKind },
    Products { company: CompanyId, term: String },
    PriceList { customer: CustomerId, company: CompanyId },
}

impl FetchRequest {
    pub fn step(&self) -> StepKind {
        match self {
            Self::Companies => StepKind::Company,
            Self::Customers { .. } => StepKind::Customer,
            Self::Addresses { .. } => StepKind::Address,
            Self::Products { .. } | Self::PriceList { .. } => StepKind::Products,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Companies => "companies".to_owned(),
            Self::Customers { term, .. } => format!("customers matching {term:?}"),
            Self::Addresses { kind, .. } => format!("{} options", kind.label()),
            Self::Products { term, .. } => format!("products matching {term:?}"),
            Self::PriceList { .. } => "price list".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPayload {
    Companies(Vec<Company>),
    Customers(Vec<Customer>),
    Addresses {
        kind: AddressKind,
        addresses: Vec<Address>,
    },
    Products(Vec<Product>),
    PriceList(Option<PriceList>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub request_id: u64,
    pub step: StepKind,
    pub result: Result<FetchPayload, String>,
}

/// Tagged lookup ready to hand to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub request_id: u64,
    pub request: FetchRequest,
}

pub fn run_fetch<B: OrderBackend + ?Sized>(backend: &B, ticket: &FetchTicket) -> FetchResponse {
    let result = match &ticket.request {
        FetchRequest::Companies => backend.list_companies().map(FetchPayload::Companies),
        FetchRequest::Customers { company, term } => backend
            .search_customers(*company, term)
            .map(FetchPayload::Customers),
        FetchRequest::Addresses { customer, kind } => backend
            .list_addresses(*customer, *kind)
            .map(|addresses| FetchPayload::Addresses {
                kind: *kind,
                addresses,
            }),
        FetchRequest::Products { company, term } => backend
            .search_products(*company, term)
            .map(FetchPayload::Products),
        FetchRequest::PriceList { customer, company } => backend
            .find_price_list(*customer, *company)
            .map(FetchPayload::PriceList),
    };

    FetchResponse {
        request_id: ticket.request_id,
        step: ticket.request.step(),
        result: result.map_err(|error| format!("{error:#}")),
    }
}
