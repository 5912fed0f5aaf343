// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use pedidos_app::{
    Address, AddressId, AddressKind, AddressLookup, Company, CompanyId, CompanyLookup, Customer,
    CustomerId, CustomerLookup, IncompleteProfile, MIN_SEARCH_CHARS, NewOrder, OrderId, OrderReceipt,
    OrderSubmission, PriceList, PriceListId, PriceListLookup, Product, ProductId, ProductLookup,
    UserDirectory, UserId, UserProfile,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of the bearer credential attached to every call. Issuing and
/// refreshing tokens happens elsewhere.
pub trait SessionProvider: Send + Sync + fmt::Debug {
    fn access_token(&self) -> Result<String>;
}

#[derive(Clone, PartialEq, Eq)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(..)")
    }
}

impl SessionProvider for StaticToken {
    fn access_token(&self) -> Result<String> {
        let token = self.0.trim();
        if token.is_empty() {
            bail!("no access token available -- sign in and provide a bearer token");
        }
        Ok(token.to_owned())
    }
}

/// Reads the token from an environment variable on every call so a
/// refreshed token is picked up without a restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl SessionProvider for EnvToken {
    fn access_token(&self) -> Result<String> {
        match std::env::var(&self.var) {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_owned()),
            _ => bail!(
                "no access token available -- export {} with a valid bearer token",
                self.var
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    http: HttpClient,
    session: Arc<dyn SessionProvider>,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration, session: Arc<dyn SessionProvider>) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("api.base_url must not be empty");
        }
        let parsed = Url::parse(&base_url).with_context(|| {
            format!("api.base_url {base_url:?} is not a URL -- use something like {DEFAULT_BASE_URL}")
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "api.base_url must use http or https, got {:?}",
                parsed.scheme()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            http,
            session,
        })
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{path}", self.base_url))
            .with_context(|| format!("build URL for {path}"))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(key, value)| (*key, value.as_str())));
        }
        Ok(url)
    }

    fn execute<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let token = self.session.access_token()?;
        let response = request
            .bearer_auth(token)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(%status, what, "request rejected");
            return Err(clean_error_response(status, &body).into());
        }
        response.json().with_context(|| format!("decode {what}"))
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)], what: &str) -> Result<T> {
        let url = self.endpoint(path, query)?;
        debug!(%url, "GET");
        self.execute(self.http.get(url), what)
    }
}

/// Non-success reply from the backend, rendered as a remediation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub status: u16,
    message: String,
}

impl ServerError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ServerError {}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("request to {base_url} timed out -- check the backend or raise api.timeout");
    }
    anyhow!(
        "cannot reach {} -- check api.base_url and that the backend is running ({})",
        base_url,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> ServerError {
    if status == StatusCode::UNAUTHORIZED {
        return ServerError::new(
            status,
            "server error (401): session expired or token rejected -- sign in again and refresh the token",
        );
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(detail) = parsed.detail
        && let Some(message) = detail_message(&detail)
    {
        return ServerError::new(
            status,
            format!("server error ({}): {}", status.as_u16(), message),
        );
    }

    if !body.is_empty() && body.len() < 100 && !body.contains('{') {
        return ServerError::new(
            status,
            format!("server error ({}): {}", status.as_u16(), body.trim()),
        );
    }

    ServerError::new(status, format!("server returned {}", status.as_u16()))
}

fn detail_message(detail: &Value) -> Option<String> {
    match detail {
        Value::String(message) if !message.is_empty() => Some(message.clone()),
        Value::Array(items) => {
            let messages = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect::<Vec<_>>();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    detail: Option<Value>,
}

/// Text fields from the ERP arrive as strings, `false`, or `[id, name]`
/// pairs.
fn text(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(text) => text.as_str(),
        Value::Array(pair) => pair.get(1).and_then(Value::as_str)?,
        _ => return None,
    };
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

#[derive(Debug, Deserialize)]
struct WireCompany {
    id: i64,
    #[serde(default)]
    name: Value,
}

#[derive(Debug, Deserialize)]
struct WireCustomer {
    id: i64,
    #[serde(default)]
    name: Value,
    #[serde(default)]
    city: Value,
    #[serde(default)]
    vat: Value,
    #[serde(default)]
    email: Value,
}

#[derive(Debug, Deserialize)]
struct WireAddress {
    id: Value,
    #[serde(default)]
    name: Value,
    #[serde(default)]
    street: Value,
    #[serde(default)]
    city: Value,
    #[serde(default)]
    state: Value,
    #[serde(default)]
    country: Value,
}

#[derive(Debug, Deserialize)]
struct WireProduct {
    id: i64,
    #[serde(default)]
    name: Value,
    #[serde(default)]
    unit: Value,
    #[serde(default)]
    uom_id: Value,
    #[serde(default)]
    reference: Value,
    #[serde(default)]
    code: Value,
}

#[derive(Debug, Deserialize)]
struct WirePriceList {
    id: i64,
    #[serde(default)]
    name: Value,
}

#[derive(Debug, Deserialize)]
struct WireReceipt {
    id: i64,
    #[serde(default)]
    created_at: Option<String>,
}

impl WireCompany {
    fn into_company(self) -> Company {
        Company {
            id: CompanyId::new(self.id),
            name: text(&self.name).unwrap_or_else(|| format!("Company {}", self.id)),
        }
    }
}

impl WireCustomer {
    fn into_customer(self) -> Customer {
        Customer {
            id: CustomerId::new(self.id),
            name: text(&self.name).unwrap_or_else(|| format!("Customer {}", self.id)),
            city: text(&self.city),
            vat: text(&self.vat),
            email: text(&self.email),
        }
    }
}

impl WireAddress {
    fn into_address(self, kind: AddressKind) -> Result<Address> {
        let id = match &self.id {
            Value::String(id) => id.clone(),
            Value::Number(id) => id.to_string(),
            other => bail!("address id must be a string or number, got {other}"),
        };
        Ok(Address {
            id: AddressId::new(id),
            name: text(&self.name).unwrap_or_default(),
            kind,
            street: text(&self.street),
            city: text(&self.city),
            state: text(&self.state),
            country: text(&self.country),
        })
    }
}

impl WireProduct {
    fn into_product(self) -> Product {
        Product {
            id: ProductId::new(self.id),
            unit: text(&self.unit)
                .or_else(|| text(&self.uom_id))
                .unwrap_or_else(|| "unit".to_owned()),
            reference: text(&self.reference).or_else(|| text(&self.code)),
            name: text(&self.name).unwrap_or_else(|| format!("Product {}", self.id)),
        }
    }
}

impl WirePriceList {
    fn into_price_list(self) -> PriceList {
        PriceList {
            id: PriceListId::new(self.id),
            name: text(&self.name).unwrap_or_else(|| format!("Price list {}", self.id)),
        }
    }
}

fn searchable(term: &str) -> bool {
    term.trim().chars().count() >= MIN_SEARCH_CHARS
}

impl CompanyLookup for Client {
    fn list_companies(&self) -> Result<Vec<Company>> {
        let companies: Vec<WireCompany> = self.get("/companies", &[], "company list")?;
        Ok(companies.into_iter().map(WireCompany::into_company).collect())
    }
}

impl CustomerLookup for Client {
    fn search_customers(&self, company: CompanyId, term: &str) -> Result<Vec<Customer>> {
        if !searchable(term) {
            return Ok(Vec::new());
        }
        let customers: Vec<WireCustomer> = self.get(
            "/customers",
            &[
                ("company_id", company.to_string()),
                ("name", term.trim().to_owned()),
            ],
            "customer search",
        )?;
        Ok(customers
            .into_iter()
            .map(WireCustomer::into_customer)
            .collect())
    }
}

impl AddressLookup for Client {
    fn list_addresses(&self, customer: CustomerId, kind: AddressKind) -> Result<Vec<Address>> {
        let addresses: Vec<WireAddress> = self.get(
            "/interlocutors",
            &[
                ("parent_id", customer.to_string()),
                ("type", kind.as_str().to_owned()),
            ],
            "address list",
        )?;
        if addresses.is_empty() {
            debug!(%customer, kind = kind.as_str(), "no addresses, using default");
            return Ok(vec![Address::default_for(kind)]);
        }
        addresses
            .into_iter()
            .map(|address| address.into_address(kind))
            .collect()
    }
}

impl ProductLookup for Client {
    fn search_products(&self, company: CompanyId, term: &str) -> Result<Vec<Product>> {
        if !searchable(term) {
            return Ok(Vec::new());
        }
        let products: Vec<WireProduct> = self.get(
            "/products",
            &[
                ("company_id", company.to_string()),
                ("name", term.trim().to_owned()),
            ],
            "product search",
        )?;
        Ok(products.into_iter().map(WireProduct::into_product).collect())
    }
}

impl PriceListLookup for Client {
    fn find_price_list(
        &self,
        customer: CustomerId,
        company: CompanyId,
    ) -> Result<Option<PriceList>> {
        let lists: Vec<WirePriceList> = self.get(
            "/pricelists",
            &[
                ("customer_id", customer.to_string()),
                ("company_id", company.to_string()),
            ],
            "price list",
        )?;
        Ok(lists.into_iter().next().map(WirePriceList::into_price_list))
    }
}

impl OrderSubmission for Client {
    fn create_order(&self, order: &NewOrder) -> Result<OrderReceipt> {
        let url = self.endpoint("/orders", &[])?;
        debug!(%url, lines = order.lines.len(), "POST");
        let receipt: WireReceipt = self.execute(self.http.post(url).json(order), "order receipt")?;
        let created_at = receipt.created_at.as_deref().and_then(|raw| {
            OffsetDateTime::parse(raw, &Rfc3339)
                .inspect_err(|error| warn!(raw, %error, "unparseable order timestamp"))
                .ok()
        });
        Ok(OrderReceipt {
            id: OrderId::new(receipt.id),
            created_at,
        })
    }
}

impl UserDirectory for Client {
    /// A 404 means the account has signed in but nobody created its
    /// profile yet.
    fn current_profile(&self) -> Result<UserProfile> {
        self.get("/users/me", &[], "user profile").map_err(|error| {
            let missing = error
                .downcast_ref::<ServerError>()
                .is_some_and(|server| server.status == StatusCode::NOT_FOUND.as_u16());
            if missing {
                IncompleteProfile::NotFound.into()
            } else {
                error
            }
        })
    }

    fn list_users(&self) -> Result<Vec<UserProfile>> {
        self.get("/users/", &[], "user list")
    }

    fn get_user(&self, id: &UserId) -> Result<UserProfile> {
        let path = format!("/users/{}", encode_segment(id.as_str()));
        self.get(&path, &[], "user profile")
    }

    fn update_user(&self, profile: &UserProfile) -> Result<UserProfile> {
        let url = self.endpoint(
            &format!("/users/{}", encode_segment(profile.id.as_str())),
            &[],
        )?;
        debug!(%url, "PUT");
        self.execute(self.http.put(url).json(profile), "updated user profile")
    }
}

/// Percent-encodes a single path segment; user ids look like `auth0|abc`.
fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
