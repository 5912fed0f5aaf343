// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Local state of each wizard step: its dependent lookups, the options they
//! produced, and the selection being edited.

use anyhow::{Result, bail};

use crate::{
    Address, AddressFormInput, AddressKind, Company, CompanyFormInput, CompanyId, Customer,
    CustomerFormInput, CustomerId, DraftPatch, FetchPayload, FetchRequest, FetchResponse,
    FetchTicket, ObservationsStep, OrderDraft, PriceList, Product, ProductSelection, RequestIds,
    ResolveOutcome, SearchAction, SearchState, StepKind, StepPayload,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState<T> {
    Idle,
    Loading { request_id: u64 },
    Ready(T),
    Failed(String),
}

impl<T> Default for LoadState<T> {
    fn default() -> Self {
        Self::Idle
    }
}

impl<T> LoadState<T> {
    pub fn begin(&mut self, ids: &mut RequestIds) -> u64 {
        let request_id = ids.next();
        *self = Self::Loading { request_id };
        request_id
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn resolve(&mut self, request_id: u64, result: Result<T, String>) -> ResolveOutcome {
        match self {
            Self::Loading {
                request_id: pending,
            } if *pending == request_id => {}
            _ => return ResolveOutcome::Stale,
        }
        match result {
            Ok(value) => {
                *self = Self::Ready(value);
                ResolveOutcome::Applied
            }
            Err(message) => {
                *self = Self::Failed(message);
                ResolveOutcome::Failed
            }
        }
    }

    fn detach(&mut self) {
        if self.is_loading() {
            *self = Self::Idle;
        }
    }
}

fn ticket(ids_request: u64, request: FetchRequest) -> FetchTicket {
    FetchTicket {
        request_id: ids_request,
        request,
    }
}

fn precondition_message(step: StepKind, missing: &str) -> String {
    format!(
        "no {missing} selected -- go back and complete the {missing} step before {}",
        step.label()
    )
}

fn move_cursor(cursor: usize, len: usize, delta: isize) -> usize {
    if len == 0 {
        return 0;
    }
    let next = (cursor as isize + delta).clamp(0, len as isize - 1);
    next as usize
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompanyStep {
    pub options: LoadState<Vec<Company>>,
    pub cursor: usize,
    pub selected: Option<Company>,
}

impl CompanyStep {
    fn mount(draft: &OrderDraft, ids: &mut RequestIds) -> (Self, Vec<FetchTicket>) {
        let mut step = Self {
            selected: draft.company.clone(),
            ..Self::default()
        };
        let tickets = step.load(ids);
        (step, tickets)
    }

    fn load(&mut self, ids: &mut RequestIds) -> Vec<FetchTicket> {
        let request_id = self.options.begin(ids);
        vec![ticket(request_id, FetchRequest::Companies)]
    }

    pub fn visible_options(&self) -> &[Company] {
        self.options.ready().map(Vec::as_slice).unwrap_or(&[])
    }

    fn apply(&mut self, request_id: u64, payload: Result<FetchPayload, String>) -> ResolveOutcome {
        let result = match payload {
            Ok(FetchPayload::Companies(companies)) => Ok(companies),
            Ok(_) => return ResolveOutcome::Stale,
            Err(message) => Err(message),
        };
        let outcome = self.options.resolve(request_id, result);
        if outcome == ResolveOutcome::Applied {
            self.keep_selection_visible();
        }
        outcome
    }

    fn keep_selection_visible(&mut self) {
        let Some(selected) = &self.selected else {
            return;
        };
        if let LoadState::Ready(options) = &mut self.options {
            match options.iter().position(|company| company.id == selected.id) {
                Some(index) => self.cursor = index,
                None => {
                    options.insert(0, selected.clone());
                    self.cursor = 0;
                }
            }
        }
    }

    pub fn move_cursor(&mut self, delta: isize) {
        self.cursor = move_cursor(self.cursor, self.visible_options().len(), delta);
    }

    pub fn select_current(&mut self) -> Option<&Company> {
        let company = self.visible_options().get(self.cursor).cloned()?;
        self.selected = Some(company);
        self.selected.as_ref()
    }

    pub fn payload(&self) -> StepPayload {
        StepPayload::Company(CompanyFormInput {
            company: self.selected.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CustomerStep {
    pub company: Option<CompanyId>,
    pub search: SearchState<Customer>,
    pub cursor: usize,
    pub selected: Option<Customer>,
    pub precondition: Option<String>,
}

impl CustomerStep {
    fn mount(draft: &OrderDraft) -> Self {
        let mut step = Self {
            company: draft.company.as_ref().map(|company| company.id),
            selected: draft.customer.clone(),
            precondition: draft
                .missing_dependency(StepKind::Customer)
                .map(|missing| precondition_message(StepKind::Customer, missing)),
            ..Self::default()
        };
        step.keep_selection_visible();
        step
    }

    pub fn set_term(&mut self, term: impl Into<String>, ids: &mut RequestIds) -> SearchAction {
        let action = self.search.set_term(term, ids);
        self.cursor = 0;
        self.keep_selection_visible();
        action
    }

    pub fn fire(&mut self, request_id: u64) -> Option<FetchTicket> {
        let Some(company) = self.company else {
            self.search.detach();
            return None;
        };
        let term = self.search.fire(request_id)?;
        Some(ticket(request_id, FetchRequest::Customers { company, term }))
    }

    fn apply(&mut self, request_id: u64, payload: Result<FetchPayload, String>) -> ResolveOutcome {
        let result = match payload {
            Ok(FetchPayload::Customers(customers)) => Ok(customers),
            Ok(_) => return ResolveOutcome::Stale,
            Err(message) => Err(message),
        };
        let outcome = self.search.resolve(request_id, result);
        if outcome != ResolveOutcome::Stale {
            self.cursor = 0;
            self.keep_selection_visible();
        }
        outcome
    }

    /// A customer picked on an earlier visit stays listed even when the
    /// current search does not return it.
    fn keep_selection_visible(&mut self) {
        let Some(selected) = &self.selected else {
            return;
        };
        let results = self.search.results_mut();
        if !results.iter().any(|customer| customer.id == selected.id) {
            results.insert(0, selected.clone());
        }
    }

    pub fn move_cursor(&mut self, delta: isize) {
        self.cursor = move_cursor(self.cursor, self.search.results().len(), delta);
    }

    pub fn select_current(&mut self) -> Option<&Customer> {
        let customer = self.search.results().get(self.cursor).cloned()?;
        self.selected = Some(customer);
        self.selected.as_ref()
    }

    pub fn payload(&self) -> StepPayload {
        StepPayload::Customer(CustomerFormInput {
            customer: self.selected.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressField {
    #[default]
    Delivery,
    Invoice,
    Observations,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddressStep {
    pub customer: Option<CustomerId>,
    pub delivery_options: LoadState<Vec<Address>>,
    pub invoice_options: LoadState<Vec<Address>>,
    pub delivery: Option<Address>,
    pub invoice: Option<Address>,
    /// `Some` only when this step collects observations.
    pub observations: Option<String>,
    pub focus: AddressField,
    pub delivery_cursor: usize,
    pub invoice_cursor: usize,
    pub precondition: Option<String>,
}

impl AddressStep {
    fn mount(
        draft: &OrderDraft,
        observations: ObservationsStep,
        ids: &mut RequestIds,
    ) -> (Self, Vec<FetchTicket>) {
        let mut step = Self {
            customer: draft.customer.as_ref().map(|customer| customer.id),
            delivery: draft.delivery_address.clone(),
            invoice: draft.invoice_address.clone(),
            observations: (observations == ObservationsStep::Address)
                .then(|| draft.observations.clone().unwrap_or_default()),
            precondition: draft
                .missing_dependency(StepKind::Address)
                .map(|missing| precondition_message(StepKind::Address, missing)),
            ..Self::default()
        };
        let tickets = step.load(ids);
        (step, tickets)
    }

    fn load(&mut self, ids: &mut RequestIds) -> Vec<FetchTicket> {
        let Some(customer) = self.customer else {
            return Vec::new();
        };
        let mut tickets = Vec::new();
        for kind in AddressKind::ALL {
            let request_id = self.options_mut(kind).begin(ids);
            tickets.push(ticket(
                request_id,
                FetchRequest::Addresses { customer, kind },
            ));
        }
        tickets
    }

    fn retry(&mut self, ids: &mut RequestIds) -> Vec<FetchTicket> {
        let Some(customer) = self.customer else {
            return Vec::new();
        };
        let mut tickets = Vec::new();
        for kind in AddressKind::ALL {
            if self.options(kind).error().is_some() {
                let request_id = self.options_mut(kind).begin(ids);
                tickets.push(ticket(
                    request_id,
                    FetchRequest::Addresses { customer, kind },
                ));
            }
        }
        tickets
    }

    pub fn options(&self, kind: AddressKind) -> &LoadState<Vec<Address>> {
        match kind {
            AddressKind::Delivery => &self.delivery_options,
            AddressKind::Invoice => &self.invoice_options,
        }
    }

    fn options_mut(&mut self, kind: AddressKind) -> &mut LoadState<Vec<Address>> {
        match kind {
            AddressKind::Delivery => &mut self.delivery_options,
            AddressKind::Invoice => &mut self.invoice_options,
        }
    }

    pub fn visible_options(&self, kind: AddressKind) -> &[Address] {
        self.options(kind).ready().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn selected(&self, kind: AddressKind) -> Option<&Address> {
        match kind {
            AddressKind::Delivery => self.delivery.as_ref(),
            AddressKind::Invoice => self.invoice.as_ref(),
        }
    }

    pub fn cursor(&self, kind: AddressKind) -> usize {
        match kind {
            AddressKind::Delivery => self.delivery_cursor,
            AddressKind::Invoice => self.invoice_cursor,
        }
    }

    fn apply(&mut self, request_id: u64, payload: Result<FetchPayload, String>) -> ResolveOutcome {
        let (kind, result) = match payload {
            Ok(FetchPayload::Addresses { kind, addresses }) => (kind, Ok(addresses)),
            Ok(_) => return ResolveOutcome::Stale,
            Err(message) => {
                // Errors carry no kind; match the request id against both lists.
                let kind = AddressKind::ALL.into_iter().find(|kind| {
                    matches!(
                        self.options(*kind),
                        LoadState::Loading { request_id: pending } if *pending == request_id
                    )
                });
                let Some(kind) = kind else {
                    return ResolveOutcome::Stale;
                };
                (kind, Err(message))
            }
        };
        let outcome = self.options_mut(kind).resolve(request_id, result);
        if outcome == ResolveOutcome::Applied {
            self.keep_selection_visible(kind);
        }
        outcome
    }

    fn keep_selection_visible(&mut self, kind: AddressKind) {
        let selected = self.selected(kind).cloned();
        let LoadState::Ready(options) = self.options_mut(kind) else {
            return;
        };
        let index = match &selected {
            Some(selected) => match options.iter().position(|address| address.id == selected.id)
            {
                Some(index) => index,
                None => {
                    options.insert(0, selected.clone());
                    0
                }
            },
            None => 0,
        };
        let preselect = selected.is_none() && options.len() == 1;
        let only = options.first().cloned();
        match kind {
            AddressKind::Delivery => self.delivery_cursor = index,
            AddressKind::Invoice => self.invoice_cursor = index,
        }
        if preselect {
            match kind {
                AddressKind::Delivery => self.delivery = only,
                AddressKind::Invoice => self.invoice = only,
            }
        }
    }

    pub fn focus_next(&mut self) {
        self.focus = match self.focus {
            AddressField::Delivery => AddressField::Invoice,
            AddressField::Invoice if self.observations.is_some() => AddressField::Observations,
            AddressField::Invoice | AddressField::Observations => AddressField::Delivery,
        };
    }

    pub fn focus_prev(&mut self) {
        self.focus = match self.focus {
            AddressField::Delivery if self.observations.is_some() => AddressField::Observations,
            AddressField::Delivery => AddressField::Invoice,
            AddressField::Invoice => AddressField::Delivery,
            AddressField::Observations => AddressField::Invoice,
        };
    }

    pub fn focused_kind(&self) -> Option<AddressKind> {
        match self.focus {
            AddressField::Delivery => Some(AddressKind::Delivery),
            AddressField::Invoice => Some(AddressKind::Invoice),
            AddressField::Observations => None,
        }
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let Some(kind) = self.focused_kind() else {
            return;
        };
        let len = self.visible_options(kind).len();
        match kind {
            AddressKind::Delivery => {
                self.delivery_cursor = move_cursor(self.delivery_cursor, len, delta);
            }
            AddressKind::Invoice => {
                self.invoice_cursor = move_cursor(self.invoice_cursor, len, delta);
            }
        }
    }

    pub fn select_current(&mut self) -> Option<&Address> {
        let kind = self.focused_kind()?;
        let address = self
            .visible_options(kind)
            .get(self.cursor(kind))
            .cloned()?;
        match kind {
            AddressKind::Delivery => {
                self.delivery = Some(address);
                self.delivery.as_ref()
            }
            AddressKind::Invoice => {
                self.invoice = Some(address);
                self.invoice.as_ref()
            }
        }
    }

    pub fn payload(&self) -> StepPayload {
        StepPayload::Address(AddressFormInput {
            delivery: self.delivery.clone(),
            invoice: self.invoice.clone(),
            observations: self.observations.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductsStep {
    pub company: Option<CompanyId>,
    pub customer: Option<CustomerId>,
    pub search: SearchState<Product>,
    pub search_cursor: usize,
    pub line_cursor: usize,
    pub selection: ProductSelection,
    pub price_list: LoadState<Option<PriceList>>,
    pub collects_observations: bool,
    pub precondition: Option<String>,
}

impl ProductsStep {
    fn mount(
        draft: &OrderDraft,
        observations: ObservationsStep,
        ids: &mut RequestIds,
    ) -> (Self, Vec<FetchTicket>) {
        let mut step = Self {
            company: draft.company.as_ref().map(|company| company.id),
            customer: draft.customer.as_ref().map(|customer| customer.id),
            selection: ProductSelection::from_draft(draft),
            collects_observations: observations == ObservationsStep::Products,
            precondition: draft
                .missing_dependency(StepKind::Products)
                .map(|missing| precondition_message(StepKind::Products, missing)),
            ..Self::default()
        };
        if let Some(price_list) = &draft.price_list {
            step.price_list = LoadState::Ready(Some(price_list.clone()));
            return (step, Vec::new());
        }
        let tickets = step.load_price_list(ids);
        (step, tickets)
    }

    fn load_price_list(&mut self, ids: &mut RequestIds) -> Vec<FetchTicket> {
        let (Some(company), Some(customer)) = (self.company, self.customer) else {
            return Vec::new();
        };
        let request_id = self.price_list.begin(ids);
        vec![ticket(
            request_id,
            FetchRequest::PriceList { customer, company },
        )]
    }

    pub fn set_term(&mut self, term: impl Into<String>, ids: &mut RequestIds) -> SearchAction {
        self.search_cursor = 0;
        self.search.set_term(term, ids)
    }

    pub fn fire(&mut self, request_id: u64) -> Option<FetchTicket> {
        let Some(company) = self.company else {
            self.search.detach();
            return None;
        };
        let term = self.search.fire(request_id)?;
        Some(ticket(request_id, FetchRequest::Products { company, term }))
    }

    fn apply(&mut self, request_id: u64, payload: Result<FetchPayload, String>) -> ResolveOutcome {
        match payload {
            Ok(FetchPayload::Products(products)) => {
                let outcome = self.search.resolve(request_id, Ok(products));
                if outcome == ResolveOutcome::Applied {
                    self.search_cursor = 0;
                }
                outcome
            }
            Ok(FetchPayload::PriceList(price_list)) => {
                self.price_list.resolve(request_id, Ok(price_list))
            }
            Ok(_) => ResolveOutcome::Stale,
            Err(message) => {
                if matches!(
                    self.price_list,
                    LoadState::Loading { request_id: pending } if pending == request_id
                ) {
                    // A missing price list never blocks the order.
                    self.price_list.resolve(request_id, Ok(None));
                    return ResolveOutcome::Failed;
                }
                self.search.resolve(request_id, Err(message))
            }
        }
    }

    pub fn move_search_cursor(&mut self, delta: isize) {
        self.search_cursor = move_cursor(self.search_cursor, self.search.results().len(), delta);
    }

    pub fn move_line_cursor(&mut self, delta: isize) {
        self.line_cursor = move_cursor(self.line_cursor, self.selection.len(), delta);
    }

    pub fn highlighted_result(&self) -> Option<&Product> {
        self.search.results().get(self.search_cursor)
    }

    pub fn highlighted_line(&self) -> Option<&crate::LineItem> {
        self.selection.items().get(self.line_cursor)
    }

    pub fn clamp_line_cursor(&mut self) {
        self.line_cursor = move_cursor(self.line_cursor, self.selection.len(), 0);
    }

    pub fn payload(&self) -> StepPayload {
        self.selection.payload(self.collects_observations)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveStep {
    Company(CompanyStep),
    Customer(CustomerStep),
    Address(AddressStep),
    Products(ProductsStep),
}

impl ActiveStep {
    /// Builds the step's local state from the draft and returns the lookups
    /// it depends on.
    pub fn mount(
        kind: StepKind,
        draft: &OrderDraft,
        observations: ObservationsStep,
        ids: &mut RequestIds,
    ) -> (Self, Vec<FetchTicket>) {
        match kind {
            StepKind::Company => {
                let (step, tickets) = CompanyStep::mount(draft, ids);
                (Self::Company(step), tickets)
            }
            StepKind::Customer => (Self::Customer(CustomerStep::mount(draft)), Vec::new()),
            StepKind::Address => {
                let (step, tickets) = AddressStep::mount(draft, observations, ids);
                (Self::Address(step), tickets)
            }
            StepKind::Products => {
                let (step, tickets) = ProductsStep::mount(draft, observations, ids);
                (Self::Products(step), tickets)
            }
        }
    }

    pub fn kind(&self) -> StepKind {
        match self {
            Self::Company(_) => StepKind::Company,
            Self::Customer(_) => StepKind::Customer,
            Self::Address(_) => StepKind::Address,
            Self::Products(_) => StepKind::Products,
        }
    }

    pub fn precondition(&self) -> Option<&str> {
        match self {
            Self::Company(_) => None,
            Self::Customer(step) => step.precondition.as_deref(),
            Self::Address(step) => step.precondition.as_deref(),
            Self::Products(step) => step.precondition.as_deref(),
        }
    }

    pub fn apply(&mut self, response: FetchResponse) -> ResolveOutcome {
        if response.step != self.kind() {
            return ResolveOutcome::Stale;
        }
        let FetchResponse {
            request_id, result, ..
        } = response;
        match self {
            Self::Company(step) => step.apply(request_id, result),
            Self::Customer(step) => step.apply(request_id, result),
            Self::Address(step) => step.apply(request_id, result),
            Self::Products(step) => step.apply(request_id, result),
        }
    }

    pub fn set_search_term(
        &mut self,
        term: impl Into<String>,
        ids: &mut RequestIds,
    ) -> Option<SearchAction> {
        match self {
            Self::Customer(step) => Some(step.set_term(term, ids)),
            Self::Products(step) => Some(step.set_term(term, ids)),
            Self::Company(_) | Self::Address(_) => None,
        }
    }

    pub fn search_term(&self) -> Option<&str> {
        match self {
            Self::Customer(step) => Some(step.search.term()),
            Self::Products(step) => Some(step.search.term()),
            Self::Company(_) | Self::Address(_) => None,
        }
    }

    pub fn fire_search(&mut self, request_id: u64) -> Option<FetchTicket> {
        match self {
            Self::Customer(step) => step.fire(request_id),
            Self::Products(step) => step.fire(request_id),
            Self::Company(_) | Self::Address(_) => None,
        }
    }

    /// Re-issues lookups that failed or never ran.
    pub fn retry(&mut self, ids: &mut RequestIds) -> Vec<FetchTicket> {
        match self {
            Self::Company(step)
                if matches!(step.options, LoadState::Idle | LoadState::Failed(_)) =>
            {
                step.load(ids)
            }
            Self::Company(_) => Vec::new(),
            Self::Address(step) => step.retry(ids),
            Self::Customer(step) => {
                let term = step.search.term().to_owned();
                match step.set_term(term, ids) {
                    SearchAction::Schedule { request_id } => {
                        step.fire(request_id).into_iter().collect()
                    }
                    SearchAction::Idle | SearchAction::Cleared => Vec::new(),
                }
            }
            Self::Products(step) => {
                let term = step.search.term().to_owned();
                match step.set_term(term, ids) {
                    SearchAction::Schedule { request_id } => {
                        step.fire(request_id).into_iter().collect()
                    }
                    SearchAction::Idle | SearchAction::Cleared => Vec::new(),
                }
            }
        }
    }

    /// Discards pending lookups; replies that arrive later are ignored.
    pub fn detach(&mut self) {
        match self {
            Self::Company(step) => step.options.detach(),
            Self::Customer(step) => step.search.detach(),
            Self::Address(step) => {
                step.delivery_options.detach();
                step.invoice_options.detach();
            }
            Self::Products(step) => {
                step.search.detach();
                step.price_list.detach();
            }
        }
    }

    /// Why completion is currently impossible regardless of the form values.
    pub fn blocked_reason(&self) -> Option<String> {
        if let Some(precondition) = self.precondition() {
            return Some(precondition.to_owned());
        }
        match self {
            Self::Company(step) => match &step.options {
                LoadState::Loading { .. } => Some("companies are still loading".to_owned()),
                LoadState::Failed(message) => Some(format!(
                    "companies failed to load ({message}) -- press ctrl+r to retry"
                )),
                LoadState::Idle | LoadState::Ready(_) => None,
            },
            Self::Customer(step) => step.search.error().map(|message| {
                format!("customer search failed ({message}) -- edit the search to retry")
            }),
            Self::Address(step) => AddressKind::ALL.into_iter().find_map(|kind| {
                match step.options(kind) {
                    LoadState::Loading { .. } => {
                        Some(format!("{} options are still loading", kind.label()))
                    }
                    LoadState::Failed(message) => Some(format!(
                        "{} options failed to load ({message}) -- press ctrl+r to retry",
                        kind.label()
                    )),
                    LoadState::Idle | LoadState::Ready(_) => None,
                }
            }),
            Self::Products(step) => {
                if step.price_list.is_loading() {
                    return Some("price list is still loading".to_owned());
                }
                step.search.error().map(|message| {
                    format!("product search failed ({message}) -- edit the search to retry")
                })
            }
        }
    }

    pub fn payload(&self) -> StepPayload {
        match self {
            Self::Company(step) => step.payload(),
            Self::Customer(step) => step.payload(),
            Self::Address(step) => step.payload(),
            Self::Products(step) => step.payload(),
        }
    }

    /// Validated contribution of this step, ready for `UpdateDraft`.
    pub fn completion(&self) -> Result<DraftPatch> {
        if let Some(reason) = self.blocked_reason() {
            bail!(reason);
        }
        let mut patch = self.payload().into_patch()?;
        if let Self::Products(step) = self
            && let Some(Some(price_list)) = step.price_list.ready()
        {
            patch.price_list = Some(price_list.clone());
        }
        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::{ActiveStep, AddressField, LoadState};
    use crate::{
        Address, AddressKind, Company, CompanyId, Customer, CustomerId, FetchPayload,
        FetchRequest, FetchResponse, FieldError, ObservationsStep, OrderDraft, PriceList,
        PriceListId, Product, ProductId, RequestIds, ResolveOutcome, SearchAction, SearchPhase,
        StepKind,
    };

    fn premex() -> Company {
        Company {
            id: CompanyId::new(1),
            name: "Premex".to_owned(),
        }
    }

    fn amasa() -> Customer {
        Customer::named(CustomerId::new(30), "AMASA S.A.S")
    }

    fn response(step: StepKind, request_id: u64, payload: FetchPayload) -> FetchResponse {
        FetchResponse {
            request_id,
            step,
            result: Ok(payload),
        }
    }

    #[test]
    fn company_step_requests_companies_on_mount() {
        let mut ids = RequestIds::default();
        let (step, tickets) = ActiveStep::mount(
            StepKind::Company,
            &OrderDraft::default(),
            ObservationsStep::Products,
            &mut ids,
        );
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].request, FetchRequest::Companies);
        assert_eq!(
            step.blocked_reason().as_deref(),
            Some("companies are still loading")
        );
    }

    #[test]
    fn company_re_entry_keeps_previous_choice_highlighted() {
        let mut ids = RequestIds::default();
        let draft = OrderDraft {
            company: Some(Company {
                id: CompanyId::new(3),
                name: "Adiquim".to_owned(),
            }),
            ..OrderDraft::default()
        };
        let (mut step, tickets) =
            ActiveStep::mount(StepKind::Company, &draft, ObservationsStep::Products, &mut ids);
        step.apply(response(
            StepKind::Company,
            tickets[0].request_id,
            FetchPayload::Companies(vec![premex()]),
        ));

        let ActiveStep::Company(company) = &step else {
            panic!("company step expected");
        };
        assert_eq!(company.visible_options().len(), 2);
        assert_eq!(company.visible_options()[0].name, "Adiquim");
        assert_eq!(company.cursor, 0);
    }

    #[test]
    fn customer_step_without_company_reports_precondition() {
        let mut ids = RequestIds::default();
        let (step, tickets) = ActiveStep::mount(
            StepKind::Customer,
            &OrderDraft::default(),
            ObservationsStep::Products,
            &mut ids,
        );
        assert!(tickets.is_empty());
        let reason = step.blocked_reason().expect("precondition expected");
        assert!(reason.contains("no company selected"));
        assert!(step.completion().is_err());
    }

    #[test]
    fn customer_search_gates_and_targets_selected_company() {
        let mut ids = RequestIds::default();
        let draft = OrderDraft {
            company: Some(premex()),
            ..OrderDraft::default()
        };
        let (mut step, _) =
            ActiveStep::mount(StepKind::Customer, &draft, ObservationsStep::Products, &mut ids);

        assert_eq!(
            step.set_search_term("AB", &mut ids),
            Some(SearchAction::Cleared)
        );
        let Some(SearchAction::Schedule { request_id }) = step.set_search_term("ABC", &mut ids)
        else {
            panic!("schedule expected");
        };
        let ticket = step.fire_search(request_id).expect("ticket expected");
        assert_eq!(
            ticket.request,
            FetchRequest::Customers {
                company: CompanyId::new(1),
                term: "ABC".to_owned(),
            }
        );
    }

    #[test]
    fn previously_chosen_customer_survives_fresh_search() {
        let mut ids = RequestIds::default();
        let draft = OrderDraft {
            company: Some(premex()),
            customer: Some(amasa()),
            ..OrderDraft::default()
        };
        let (mut step, _) =
            ActiveStep::mount(StepKind::Customer, &draft, ObservationsStep::Products, &mut ids);
        let Some(SearchAction::Schedule { request_id }) = step.set_search_term("ALI", &mut ids)
        else {
            panic!("schedule expected");
        };
        step.fire_search(request_id);
        step.apply(response(
            StepKind::Customer,
            request_id,
            FetchPayload::Customers(vec![Customer::named(
                CustomerId::new(31),
                "ALIMENTOS FINCA S.A.S",
            )]),
        ));

        let ActiveStep::Customer(customer) = &step else {
            panic!("customer step expected");
        };
        let names = customer
            .search
            .results()
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["AMASA S.A.S", "ALIMENTOS FINCA S.A.S"]);
        assert!(step.completion().is_ok());
    }

    #[test]
    fn address_step_loads_both_kinds_and_preselects_single_option() {
        let mut ids = RequestIds::default();
        let draft = OrderDraft {
            company: Some(premex()),
            customer: Some(amasa()),
            ..OrderDraft::default()
        };
        let (mut step, tickets) =
            ActiveStep::mount(StepKind::Address, &draft, ObservationsStep::Products, &mut ids);
        assert_eq!(tickets.len(), 2);

        for ticket in &tickets {
            let FetchRequest::Addresses { kind, .. } = ticket.request else {
                panic!("address request expected");
            };
            step.apply(response(
                StepKind::Address,
                ticket.request_id,
                FetchPayload::Addresses {
                    kind,
                    addresses: vec![Address::default_for(kind)],
                },
            ));
        }

        let patch = step.completion().expect("both addresses preselected");
        assert_eq!(
            patch.delivery_address.map(|a| a.kind),
            Some(AddressKind::Delivery)
        );
        assert_eq!(
            patch.invoice_address.map(|a| a.kind),
            Some(AddressKind::Invoice)
        );
        assert_eq!(patch.observations, None);
    }

    #[test]
    fn failed_address_lookup_blocks_until_retried() {
        let mut ids = RequestIds::default();
        let draft = OrderDraft {
            company: Some(premex()),
            customer: Some(amasa()),
            ..OrderDraft::default()
        };
        let (mut step, tickets) =
            ActiveStep::mount(StepKind::Address, &draft, ObservationsStep::Address, &mut ids);
        let failing = &tickets[0];
        let outcome = step.apply(FetchResponse {
            request_id: failing.request_id,
            step: StepKind::Address,
            result: Err("server error (502)".to_owned()),
        });
        assert_eq!(outcome, ResolveOutcome::Failed);
        assert!(
            step.blocked_reason()
                .expect("blocked")
                .contains("failed to load")
        );

        let retried = step.retry(&mut ids);
        assert_eq!(retried.len(), 1);
        assert_ne!(retried[0].request_id, failing.request_id);
    }

    #[test]
    fn address_focus_cycles_through_observations_when_collected() {
        let mut ids = RequestIds::default();
        let (step, _) = ActiveStep::mount(
            StepKind::Address,
            &OrderDraft::default(),
            ObservationsStep::Address,
            &mut ids,
        );
        let ActiveStep::Address(mut address) = step else {
            panic!("address step expected");
        };
        address.focus_next();
        address.focus_next();
        assert_eq!(address.focus, AddressField::Observations);
        address.focus_next();
        assert_eq!(address.focus, AddressField::Delivery);
        address.focus_prev();
        assert_eq!(address.focus, AddressField::Observations);
    }

    #[test]
    fn products_step_folds_price_list_into_completion() {
        let mut ids = RequestIds::default();
        let draft = OrderDraft {
            company: Some(premex()),
            customer: Some(amasa()),
            ..OrderDraft::default()
        };
        let (mut step, tickets) =
            ActiveStep::mount(StepKind::Products, &draft, ObservationsStep::Products, &mut ids);
        assert_eq!(tickets.len(), 1);
        step.apply(response(
            StepKind::Products,
            tickets[0].request_id,
            FetchPayload::PriceList(Some(PriceList {
                id: PriceListId::new(8),
                name: "Mayoristas".to_owned(),
            })),
        ));

        let error = step.completion().expect_err("no products yet");
        assert!(error.downcast_ref::<FieldError>().is_some());

        if let ActiveStep::Products(products) = &mut step {
            products.selection.add(&Product {
                id: ProductId::new(1),
                name: "Producto A".to_owned(),
                unit: "kg".to_owned(),
                reference: None,
            });
        }
        let patch = step.completion().expect("products present");
        assert_eq!(patch.price_list.map(|list| list.id), Some(PriceListId::new(8)));
        assert_eq!(patch.observations.as_deref(), Some(""));
    }

    #[test]
    fn price_list_failure_does_not_block_products() {
        let mut ids = RequestIds::default();
        let draft = OrderDraft {
            company: Some(premex()),
            customer: Some(amasa()),
            ..OrderDraft::default()
        };
        let (mut step, tickets) =
            ActiveStep::mount(StepKind::Products, &draft, ObservationsStep::Products, &mut ids);
        step.apply(FetchResponse {
            request_id: tickets[0].request_id,
            step: StepKind::Products,
            result: Err("timeout".to_owned()),
        });
        let ActiveStep::Products(products) = &step else {
            panic!("products step expected");
        };
        assert_eq!(products.price_list, LoadState::Ready(None));
        assert_eq!(step.blocked_reason(), None);
    }

    #[test]
    fn responses_for_another_step_are_stale() {
        let mut ids = RequestIds::default();
        let (mut step, tickets) = ActiveStep::mount(
            StepKind::Company,
            &OrderDraft::default(),
            ObservationsStep::Products,
            &mut ids,
        );
        let outcome = step.apply(response(
            StepKind::Customer,
            tickets[0].request_id,
            FetchPayload::Customers(Vec::new()),
        ));
        assert_eq!(outcome, ResolveOutcome::Stale);
    }

    #[test]
    fn detached_step_ignores_late_reply() {
        let mut ids = RequestIds::default();
        let (mut step, tickets) = ActiveStep::mount(
            StepKind::Company,
            &OrderDraft::default(),
            ObservationsStep::Products,
            &mut ids,
        );
        step.detach();
        let outcome = step.apply(response(
            StepKind::Company,
            tickets[0].request_id,
            FetchPayload::Companies(vec![premex()]),
        ));
        assert_eq!(outcome, ResolveOutcome::Stale);
    }

    #[test]
    fn company_retry_reloads_only_failed_lists() {
        let mut ids = RequestIds::default();
        let (mut step, tickets) = ActiveStep::mount(
            StepKind::Company,
            &OrderDraft::default(),
            ObservationsStep::Products,
            &mut ids,
        );
        assert!(step.retry(&mut ids).is_empty(), "still loading");

        step.apply(response(
            StepKind::Company,
            tickets[0].request_id,
            FetchPayload::Companies(vec![premex()]),
        ));
        assert!(step.retry(&mut ids).is_empty(), "already loaded");

        let (mut step, tickets) = ActiveStep::mount(
            StepKind::Company,
            &OrderDraft::default(),
            ObservationsStep::Products,
            &mut ids,
        );
        let outcome = step.apply(FetchResponse {
            request_id: tickets[0].request_id,
            step: StepKind::Company,
            result: Err("server error (502)".to_owned()),
        });
        assert_eq!(outcome, ResolveOutcome::Failed);
        let retried = step.retry(&mut ids);
        assert_eq!(retried.len(), 1);
        assert_eq!(retried[0].request, FetchRequest::Companies);
    }

    #[test]
    fn search_without_company_settles_back_to_idle() {
        let mut ids = RequestIds::default();
        let (mut step, _) = ActiveStep::mount(
            StepKind::Customer,
            &OrderDraft::default(),
            ObservationsStep::Products,
            &mut ids,
        );
        let Some(SearchAction::Schedule { request_id }) = step.set_search_term("AMASA", &mut ids)
        else {
            panic!("schedule expected");
        };
        assert!(step.fire_search(request_id).is_none());

        let ActiveStep::Customer(customer) = &step else {
            panic!("customer step expected");
        };
        assert_eq!(customer.search.phase(), &SearchPhase::Idle);
        assert!(!customer.search.is_loading());
    }
}
