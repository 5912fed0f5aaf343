// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use pedidos_app::{
    Address, AddressId, AddressKind, AddressLookup, Company, CompanyId, CompanyLookup, Customer,
    CustomerId, CustomerLookup, MIN_SEARCH_CHARS, NewOrder, OrderId, OrderReceipt,
    OrderSubmission, PriceList, PriceListId, PriceListLookup, Product, ProductId, ProductLookup,
    UserDirectory, UserId, UserProfile,
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const COMPANIES: [(i64, &str); 3] = [(1, "Premex"), (2, "Nutreo"), (3, "Adiquim")];

const CUSTOMERS: [(i64, &str, &str, &str); 3] = [
    (
        10,
        "ALIMENTOS CONCENTRADOS DEL CARIBE",
        "Barranquilla",
        "900123456-1",
    ),
    (11, "ALIMENTOS FINCA S.A.S", "Medellín", "800765432-9"),
    (12, "AMASA S.A.S", "Bogotá", "901555010-3"),
];

const PRODUCTS: [(i64, &str, &str); 5] = [
    (1, "Producto A", "kg"),
    (2, "Producto B", "L"),
    (3, "Producto C", "unidad"),
    (4, "Producto D", "kg"),
    (5, "Producto E", "L"),
];

const FIXTURE_DATETIME: &str = "2026-02-19T12:34:56Z";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    ListCompanies,
    SearchCustomers { company: CompanyId, term: String },
    ListAddresses { customer: CustomerId, kind: AddressKind },
    SearchProducts { company: CompanyId, term: String },
    FindPriceList { customer: CustomerId, company: CompanyId },
    CreateOrder(NewOrder),
    CurrentProfile,
    ListUsers,
    GetUser(UserId),
    UpdateUser(UserId),
}

/// Collaborator calls that can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailurePoint {
    Companies,
    Customers,
    Addresses,
    Products,
    PriceList,
    Submit,
    Users,
}

#[derive(Debug)]
struct DemoState {
    companies: Vec<Company>,
    customers: Vec<Customer>,
    addresses: Vec<(CustomerId, Address)>,
    products: Vec<Product>,
    price_lists: Vec<(CustomerId, CompanyId, PriceList)>,
    users: Vec<UserProfile>,
    current_user: UserId,
    calls: Vec<RecordedCall>,
    failures: BTreeSet<FailurePoint>,
    orders: Vec<(OrderId, NewOrder)>,
    next_order_id: i64,
}

/// In-memory backend with the demo catalog. Clones share state, so a test
/// can keep one handle while the runtime owns another.
#[derive(Debug, Clone)]
pub struct DemoBackend {
    inner: Arc<Mutex<DemoState>>,
}

impl Default for DemoBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoBackend {
    pub fn new() -> Self {
        let companies = COMPANIES
            .iter()
            .map(|(id, name)| Company {
                id: CompanyId::new(*id),
                name: (*name).to_owned(),
            })
            .collect();
        let customers = CUSTOMERS
            .iter()
            .map(|(id, name, city, vat)| Customer {
                id: CustomerId::new(*id),
                name: (*name).to_owned(),
                city: Some((*city).to_owned()),
                vat: Some((*vat).to_owned()),
                email: None,
            })
            .collect();
        let products = PRODUCTS
            .iter()
            .map(|(id, name, unit)| Product {
                id: ProductId::new(*id),
                name: (*name).to_owned(),
                unit: (*unit).to_owned(),
                reference: Some(format!("REF-{id:03}")),
            })
            .collect();

        Self {
            inner: Arc::new(Mutex::new(DemoState {
                companies,
                customers,
                addresses: demo_addresses(),
                products,
                price_lists: vec![(
                    CustomerId::new(10),
                    CompanyId::new(1),
                    PriceList {
                        id: PriceListId::new(7),
                        name: "Lista mayoristas".to_owned(),
                    },
                )],
                users: demo_users(),
                current_user: UserId::new("auth0|admin-1"),
                calls: Vec::new(),
                failures: BTreeSet::new(),
                orders: Vec::new(),
                next_order_id: 1000,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, DemoState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn fail(&self, point: FailurePoint) {
        self.state().failures.insert(point);
    }

    pub fn recover(&self, point: FailurePoint) {
        self.state().failures.remove(&point);
    }

    pub fn orders(&self) -> Vec<(OrderId, NewOrder)> {
        self.state().orders.clone()
    }

    /// Signs the demo session in as another user.
    pub fn sign_in_as(&self, id: &UserId) {
        self.state().current_user = id.clone();
    }

    fn record(&self, call: RecordedCall, point: FailurePoint) -> Result<MutexGuard<'_, DemoState>> {
        let mut state = self.state();
        state.calls.push(call);
        if state.failures.contains(&point) {
            bail!("server error (503): demo backend unavailable");
        }
        Ok(state)
    }
}

fn demo_addresses() -> Vec<(CustomerId, Address)> {
    let address = |id: &str, name: &str, kind, street: &str, city: &str| Address {
        id: AddressId::new(id),
        name: name.to_owned(),
        kind,
        street: Some(street.to_owned()),
        city: Some(city.to_owned()),
        state: None,
        country: Some("Colombia".to_owned()),
    };
    vec![
        (
            CustomerId::new(10),
            address(
                "201",
                "Planta Soledad",
                AddressKind::Delivery,
                "Calle 30 #1-25",
                "Soledad",
            ),
        ),
        (
            CustomerId::new(10),
            address(
                "202",
                "Bodega Malambo",
                AddressKind::Delivery,
                "Km 3 Vía Malambo",
                "Malambo",
            ),
        ),
        (
            CustomerId::new(10),
            address(
                "203",
                "Oficina principal",
                AddressKind::Invoice,
                "Cra 54 #72-80",
                "Barranquilla",
            ),
        ),
        (
            CustomerId::new(11),
            address(
                "211",
                "Finca La Ceja",
                AddressKind::Delivery,
                "Vereda San Nicolás",
                "La Ceja",
            ),
        ),
    ]
}

fn demo_users() -> Vec<UserProfile> {
    let user = |id: &str, code: &str, name: &str, email: &str, user_type: &str, active| {
        UserProfile {
            id: UserId::new(id),
            code_erp: code.to_owned(),
            full_name: name.to_owned(),
            email: email.to_owned(),
            user_type: user_type.to_owned(),
            is_active: active,
        }
    };
    vec![
        user(
            "auth0|admin-1",
            "ADM-001",
            "Ana Torres",
            "ana@premex.example",
            "admin",
            true,
        ),
        user(
            "auth0|employee-1",
            "EMP-014",
            "Luis Gómez",
            "luis@premex.example",
            "employee",
            true,
        ),
        user(
            "auth0|customer-1",
            "CLI-220",
            "Compras Finca",
            "compras@finca.example",
            "customer",
            true,
        ),
        user(
            "auth0|pending-1",
            "",
            "Nuevo Usuario",
            "nuevo@example.com",
            "customer",
            false,
        ),
    ]
}

fn matches_term(name: &str, term: &str) -> bool {
    name.to_lowercase().contains(&term.trim().to_lowercase())
}

fn searchable(term: &str) -> bool {
    term.trim().chars().count() >= MIN_SEARCH_CHARS
}

impl CompanyLookup for DemoBackend {
    fn list_companies(&self) -> Result<Vec<Company>> {
        let state = self.record(RecordedCall::ListCompanies, FailurePoint::Companies)?;
        Ok(state.companies.clone())
    }
}

impl CustomerLookup for DemoBackend {
    fn search_customers(&self, company: CompanyId, term: &str) -> Result<Vec<Customer>> {
        let state = self.record(
            RecordedCall::SearchCustomers {
                company,
                term: term.to_owned(),
            },
            FailurePoint::Customers,
        )?;
        if !searchable(term) {
            return Ok(Vec::new());
        }
        Ok(state
            .customers
            .iter()
            .filter(|customer| matches_term(&customer.name, term))
            .cloned()
            .collect())
    }
}

impl AddressLookup for DemoBackend {
    fn list_addresses(&self, customer: CustomerId, kind: AddressKind) -> Result<Vec<Address>> {
        let state = self.record(
            RecordedCall::ListAddresses { customer, kind },
            FailurePoint::Addresses,
        )?;
        let addresses = state
            .addresses
            .iter()
            .filter(|(owner, address)| *owner == customer && address.kind == kind)
            .map(|(_, address)| address.clone())
            .collect::<Vec<_>>();
        if addresses.is_empty() {
            return Ok(vec![Address::default_for(kind)]);
        }
        Ok(addresses)
    }
}

impl ProductLookup for DemoBackend {
    fn search_products(&self, company: CompanyId, term: &str) -> Result<Vec<Product>> {
        let state = self.record(
            RecordedCall::SearchProducts {
                company,
                term: term.to_owned(),
            },
            FailurePoint::Products,
        )?;
        if !searchable(term) {
            return Ok(Vec::new());
        }
        Ok(state
            .products
            .iter()
            .filter(|product| matches_term(&product.name, term))
            .cloned()
            .collect())
    }
}

impl PriceListLookup for DemoBackend {
    fn find_price_list(
        &self,
        customer: CustomerId,
        company: CompanyId,
    ) -> Result<Option<PriceList>> {
        let state = self.record(
            RecordedCall::FindPriceList { customer, company },
            FailurePoint::PriceList,
        )?;
        Ok(state
            .price_lists
            .iter()
            .find(|(owner, seller, _)| *owner == customer && *seller == company)
            .map(|(_, _, list)| list.clone()))
    }
}

impl OrderSubmission for DemoBackend {
    fn create_order(&self, order: &NewOrder) -> Result<OrderReceipt> {
        let mut state = self.record(
            RecordedCall::CreateOrder(order.clone()),
            FailurePoint::Submit,
        )?;
        if order.lines.is_empty() {
            bail!("server error (422): order has no lines");
        }
        let id = OrderId::new(state.next_order_id);
        state.next_order_id += 1;
        state.orders.push((id, order.clone()));
        Ok(OrderReceipt {
            id,
            created_at: Some(fixture_datetime()?),
        })
    }
}

impl UserDirectory for DemoBackend {
    fn current_profile(&self) -> Result<UserProfile> {
        let state = self.record(RecordedCall::CurrentProfile, FailurePoint::Users)?;
        let current = state.current_user.clone();
        find_user(&state.users, &current)
    }

    fn list_users(&self) -> Result<Vec<UserProfile>> {
        let state = self.record(RecordedCall::ListUsers, FailurePoint::Users)?;
        Ok(state.users.clone())
    }

    fn get_user(&self, id: &UserId) -> Result<UserProfile> {
        let state = self.record(RecordedCall::GetUser(id.clone()), FailurePoint::Users)?;
        find_user(&state.users, id)
    }

    fn update_user(&self, profile: &UserProfile) -> Result<UserProfile> {
        let mut state = self.record(
            RecordedCall::UpdateUser(profile.id.clone()),
            FailurePoint::Users,
        )?;
        let Some(existing) = state.users.iter_mut().find(|user| user.id == profile.id) else {
            bail!("server error (404): user {} not found", profile.id);
        };
        *existing = profile.clone();
        Ok(profile.clone())
    }
}

fn find_user(users: &[UserProfile], id: &UserId) -> Result<UserProfile> {
    users
        .iter()
        .find(|user| &user.id == id)
        .cloned()
        .with_context(|| format!("server error (404): user {id} not found"))
}

pub fn fixture_datetime() -> Result<OffsetDateTime> {
    OffsetDateTime::parse(FIXTURE_DATETIME, &Rfc3339).context("parse fixture datetime")
}

pub fn temp_config_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join("config.toml");
    Ok((dir, path))
}

pub fn product(id: i64) -> Option<Product> {
    PRODUCTS
        .iter()
        .find(|(candidate, _, _)| *candidate == id)
        .map(|(id, name, unit)| Product {
            id: ProductId::new(*id),
            name: (*name).to_owned(),
            unit: (*unit).to_owned(),
            reference: Some(format!("REF-{id:03}")),
        })
}
