// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use pedidos_app::{
    ActiveStep, AddOutcome, Address, AddressField, AddressKind, AddressStep, CompanyStep,
    CustomerStep, DEFAULT_SEARCH_DEBOUNCE, FetchResponse, FetchTicket, FieldError, LoadState,
    NewOrder, Notification, NotificationLevel, ObservationsStep, OrderDraft, OrderReceipt,
    ProductsStep, RequestIds, ResolveOutcome, SearchAction, SearchPhase, StepKind,
    SubmissionStatus, TermClass, WizardCommand, WizardEvent, WizardState, classify_term,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(4);
const POLL_INTERVAL: Duration = Duration::from_millis(120);
const CURSOR_MARK: &str = ">";
const CHOSEN_MARK: &str = "*";
const DONE_MARK: &str = "✓";

/// Side effects the wizard needs from the outside world.
///
/// `fetch` and `submit_order` run a single call to completion. The `spawn_*`
/// methods report through `tx`; the defaults run inline, so runtimes backed
/// by a network client override them to keep the UI thread free.
pub trait WizardRuntime {
    fn fetch(&mut self, ticket: &FetchTicket) -> FetchResponse;
    fn submit_order(&mut self, order: &NewOrder) -> Result<OrderReceipt>;

    fn spawn_fetch(&mut self, ticket: FetchTicket, tx: Sender<InternalEvent>) -> Result<()> {
        let response = self.fetch(&ticket);
        tx.send(InternalEvent::Fetched(response))
            .map_err(|_| anyhow::anyhow!("lookup event channel closed"))?;
        Ok(())
    }

    fn spawn_submit(
        &mut self,
        request_id: u64,
        order: NewOrder,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let result = self
            .submit_order(&order)
            .map_err(|error| format!("{error:#}"));
        tx.send(InternalEvent::Submitted { request_id, result })
            .map_err(|_| anyhow::anyhow!("submit event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    /// Debounce window for a search elapsed.
    SearchDue {
        step: StepKind,
        request_id: u64,
    },
    Fetched(FetchResponse),
    Submitted {
        request_id: u64,
        result: Result<OrderReceipt, String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardOptions {
    pub search_debounce: Duration,
    pub status_timeout: Duration,
    pub observations_step: ObservationsStep,
    /// Shown in the header next to the app name.
    pub signed_in_as: Option<String>,
}

impl Default for WizardOptions {
    fn default() -> Self {
        Self {
            search_debounce: DEFAULT_SEARCH_DEBOUNCE,
            status_timeout: DEFAULT_STATUS_TIMEOUT,
            observations_step: ObservationsStep::default(),
            signed_in_as: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ProductsFocus {
    #[default]
    Search,
    Lines,
    Observations,
}

#[derive(Debug, Clone, PartialEq)]
struct ViewData {
    options: WizardOptions,
    step: ActiveStep,
    ids: RequestIds,
    products_focus: ProductsFocus,
    submit_request: Option<u64>,
    field_error: Option<FieldError>,
    help_visible: bool,
    status_token: u64,
}

impl ViewData {
    fn new(options: WizardOptions) -> Self {
        Self {
            options,
            step: ActiveStep::Company(CompanyStep::default()),
            ids: RequestIds::default(),
            products_focus: ProductsFocus::default(),
            submit_request: None,
            field_error: None,
            help_visible: false,
            status_token: 0,
        }
    }
}

enum EnterAction {
    Nothing,
    Complete,
    Notify(Notification),
}

pub fn run_app<R: WizardRuntime>(
    state: &mut WizardState,
    runtime: &mut R,
    options: WizardOptions,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::new(options);
    let (internal_tx, internal_rx) = mpsc::channel();
    mount_step(state, runtime, &mut view_data, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(POLL_INTERVAL).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events<R: WizardRuntime>(
    state: &mut WizardState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        handle_internal_event(state, runtime, view_data, tx, event);
    }
}

fn handle_internal_event<R: WizardRuntime>(
    state: &mut WizardState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    event: InternalEvent,
) {
    match event {
        InternalEvent::ClearStatus { token } if token == view_data.status_token => {
            state.dispatch(WizardCommand::ClearNotification);
        }
        InternalEvent::ClearStatus { .. } => {}
        InternalEvent::SearchDue { step, request_id } => {
            if view_data.step.kind() != step {
                return;
            }
            if let Some(ticket) = view_data.step.fire_search(request_id) {
                spawn_fetches(state, runtime, view_data, tx, vec![ticket]);
            }
        }
        InternalEvent::Fetched(response) => handle_fetched(state, view_data, tx, response),
        InternalEvent::Submitted { request_id, result } => {
            if view_data.submit_request != Some(request_id) {
                debug!(request_id, "ignored reply for a superseded submission");
                return;
            }
            view_data.submit_request = None;
            let command = match result {
                Ok(receipt) => WizardCommand::SubmitSucceeded(receipt),
                Err(message) => WizardCommand::SubmitFailed(message),
            };
            dispatch(state, runtime, view_data, tx, command);
        }
    }
}

fn handle_fetched(
    state: &mut WizardState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    response: FetchResponse,
) {
    let request_id = response.request_id;
    let step = response.step;
    let error = response.result.as_ref().err().cloned().unwrap_or_default();
    match view_data.step.apply(response) {
        ResolveOutcome::Applied => {}
        ResolveOutcome::Stale => {
            debug!(request_id, step = step.label(), "discarded stale lookup reply");
        }
        ResolveOutcome::Failed => {
            warn!(request_id, step = step.label(), %error, "lookup failed");
            let notification = match view_data.step.blocked_reason() {
                Some(reason) => Notification::error(reason),
                // Only the price list fails without blocking the step.
                None => Notification::info(format!(
                    "price list unavailable ({error}) -- the order will use default prices"
                )),
            };
            emit_status(state, view_data, tx, notification);
        }
    }
}

/// Replaces the active step with fresh state built from the draft and starts
/// its lookups. Replies addressed to the old step are dropped on arrival.
fn mount_step<R: WizardRuntime>(
    state: &mut WizardState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    view_data.step.detach();
    let (step, tickets) = ActiveStep::mount(
        state.step(),
        state.draft(),
        view_data.options.observations_step,
        &mut view_data.ids,
    );
    view_data.step = step;
    view_data.products_focus = ProductsFocus::default();
    view_data.field_error = None;

    if let Some(precondition) = view_data.step.precondition() {
        let notification = Notification::error(precondition);
        emit_status(state, view_data, tx, notification);
    }
    spawn_fetches(state, runtime, view_data, tx, tickets);
}

fn spawn_fetches<R: WizardRuntime>(
    state: &mut WizardState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    tickets: Vec<FetchTicket>,
) {
    for ticket in tickets {
        debug!(
            request_id = ticket.request_id,
            request = %ticket.request.describe(),
            "lookup started"
        );
        if let Err(error) = runtime.spawn_fetch(ticket, tx.clone()) {
            emit_status(
                state,
                view_data,
                tx,
                Notification::error(format!("lookup could not start: {error:#}")),
            );
        }
    }
}

/// Sends a command to the controller and carries out the side effects its
/// events ask for.
fn dispatch<R: WizardRuntime>(
    state: &mut WizardState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    command: WizardCommand,
) -> Vec<WizardEvent> {
    let mut pending = vec![command];
    let mut all_events = Vec::new();
    while let Some(command) = pending.pop() {
        let events = state.dispatch(command);
        let mut remount = false;
        for event in &events {
            match event {
                WizardEvent::StepChanged { from, to } => {
                    debug!(from = from.label(), to = to.label(), "step changed");
                    remount = true;
                }
                WizardEvent::Reset => remount = true,
                WizardEvent::SubmitRequested(order) => {
                    let request_id = view_data.ids.next();
                    view_data.submit_request = Some(request_id);
                    debug!(request_id, lines = order.lines.len(), "submitting order");
                    if let Err(error) = runtime.spawn_submit(request_id, order.clone(), tx.clone())
                    {
                        view_data.submit_request = None;
                        pending.push(WizardCommand::SubmitFailed(format!("{error:#}")));
                    }
                }
                WizardEvent::SubmitFailed(message) => {
                    warn!(%message, "order submission failed");
                    view_data.products_focus = ProductsFocus::Lines;
                }
                WizardEvent::Submitted(id) => debug!(order = %id, "order submitted"),
                WizardEvent::Rejected(message) => debug!(%message, "command rejected"),
                WizardEvent::Notified(_) => bump_status_token(view_data, tx),
                WizardEvent::DraftUpdated(_) | WizardEvent::NotificationCleared => {}
            }
        }
        if remount {
            mount_step(state, runtime, view_data, tx);
        }
        all_events.extend(events);
    }
    all_events
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64, delay: Duration) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(delay);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn schedule_search(
    internal_tx: &Sender<InternalEvent>,
    step: StepKind,
    request_id: u64,
    delay: Duration,
) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(delay);
        let _ = sender.send(InternalEvent::SearchDue { step, request_id });
    });
}

fn bump_status_token(view_data: &mut ViewData, internal_tx: &Sender<InternalEvent>) {
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(
        internal_tx,
        view_data.status_token,
        view_data.options.status_timeout,
    );
}

fn emit_status(
    state: &mut WizardState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    notification: Notification,
) {
    state.dispatch(WizardCommand::Notify(notification));
    bump_status_token(view_data, internal_tx);
}

fn handle_key_event<R: WizardRuntime>(
    state: &mut WizardState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && matches!(key.code, KeyCode::Char('q') | KeyCode::Char('c')) {
        return true;
    }

    if view_data.help_visible {
        if matches!(
            key.code,
            KeyCode::Esc | KeyCode::Char('?') | KeyCode::F(1)
        ) {
            view_data.help_visible = false;
        }
        return false;
    }

    if key.code == KeyCode::F(1) || (key.code == KeyCode::Char('?') && !accepts_text(view_data)) {
        view_data.help_visible = true;
        return false;
    }

    if ctrl {
        match key.code {
            KeyCode::Char('n') => {
                dispatch(
                    state,
                    runtime,
                    view_data,
                    internal_tx,
                    WizardCommand::StartNewOrder,
                );
            }
            KeyCode::Char('r') => retry_lookups(state, runtime, view_data, internal_tx),
            KeyCode::Char('s') => save_step(state, runtime, view_data, internal_tx),
            KeyCode::Char('f') => complete_step(state, runtime, view_data, internal_tx),
            KeyCode::Char('b') => {
                dispatch(state, runtime, view_data, internal_tx, WizardCommand::Retreat);
            }
            _ => {}
        }
        return false;
    }

    match key.code {
        KeyCode::Esc => {
            dispatch(state, runtime, view_data, internal_tx, WizardCommand::Retreat);
        }
        KeyCode::Up => move_cursor(view_data, -1),
        KeyCode::Down => move_cursor(view_data, 1),
        KeyCode::Tab => cycle_focus(view_data, true),
        KeyCode::BackTab => cycle_focus(view_data, false),
        KeyCode::Enter => match enter_action(view_data) {
            EnterAction::Nothing => {}
            EnterAction::Complete => complete_step(state, runtime, view_data, internal_tx),
            EnterAction::Notify(notification) => {
                emit_status(state, view_data, internal_tx, notification);
            }
        },
        _ => {
            if let Some(notification) = handle_step_key(view_data, internal_tx, key) {
                emit_status(state, view_data, internal_tx, notification);
            }
        }
    }
    false
}

/// Whether printable keys edit a text field on the focused control.
fn accepts_text(view_data: &ViewData) -> bool {
    match &view_data.step {
        ActiveStep::Company(_) => false,
        ActiveStep::Customer(_) => true,
        ActiveStep::Address(step) => step.focus == AddressField::Observations,
        ActiveStep::Products(_) => view_data.products_focus != ProductsFocus::Lines,
    }
}

fn move_cursor(view_data: &mut ViewData, delta: isize) {
    match &mut view_data.step {
        ActiveStep::Company(step) => step.move_cursor(delta),
        ActiveStep::Customer(step) => step.move_cursor(delta),
        ActiveStep::Address(step) => step.move_cursor(delta),
        ActiveStep::Products(step) => match view_data.products_focus {
            ProductsFocus::Search => step.move_search_cursor(delta),
            ProductsFocus::Lines => step.move_line_cursor(delta),
            ProductsFocus::Observations => {}
        },
    }
}

fn cycle_focus(view_data: &mut ViewData, forward: bool) {
    match &mut view_data.step {
        ActiveStep::Address(step) if forward => step.focus_next(),
        ActiveStep::Address(step) => step.focus_prev(),
        ActiveStep::Products(step) => {
            let with_observations = step.collects_observations;
            view_data.products_focus = match (view_data.products_focus, forward) {
                (ProductsFocus::Search, true) => ProductsFocus::Lines,
                (ProductsFocus::Lines, true) if with_observations => ProductsFocus::Observations,
                (ProductsFocus::Lines, true) | (ProductsFocus::Observations, true) => {
                    ProductsFocus::Search
                }
                (ProductsFocus::Search, false) if with_observations => {
                    ProductsFocus::Observations
                }
                (ProductsFocus::Search, false) => ProductsFocus::Lines,
                (ProductsFocus::Lines, false) => ProductsFocus::Search,
                (ProductsFocus::Observations, false) => ProductsFocus::Lines,
            };
        }
        ActiveStep::Company(_) | ActiveStep::Customer(_) => {}
    }
}

fn enter_action(view_data: &mut ViewData) -> EnterAction {
    match &mut view_data.step {
        ActiveStep::Company(step) => {
            step.select_current();
            EnterAction::Complete
        }
        ActiveStep::Customer(step) => {
            step.select_current();
            EnterAction::Complete
        }
        ActiveStep::Address(step) => {
            let was = step.focus;
            if was == AddressField::Observations {
                return EnterAction::Complete;
            }
            if step.select_current().is_none() {
                return EnterAction::Nothing;
            }
            step.focus_next();
            if was == AddressField::Invoice && step.observations.is_none() {
                EnterAction::Complete
            } else {
                EnterAction::Nothing
            }
        }
        ActiveStep::Products(step) => match view_data.products_focus {
            ProductsFocus::Search => {
                let Some(product) = step.highlighted_result().cloned() else {
                    return EnterAction::Complete;
                };
                match step.selection.add(&product) {
                    AddOutcome::Added => {
                        step.line_cursor = step.selection.len().saturating_sub(1);
                        EnterAction::Notify(Notification::info(format!(
                            "added {}",
                            product.name
                        )))
                    }
                    AddOutcome::Duplicate => EnterAction::Notify(Notification::info(format!(
                        "{} is already in the order -- adjust its quantity instead",
                        product.name
                    ))),
                }
            }
            ProductsFocus::Lines | ProductsFocus::Observations => EnterAction::Complete,
        },
    }
}

/// Keys that edit the focused control. Returns a notice for the status line.
fn handle_step_key(
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> Option<Notification> {
    let focus = view_data.products_focus;
    let search_focused = match &view_data.step {
        ActiveStep::Customer(_) => true,
        ActiveStep::Products(_) => focus == ProductsFocus::Search,
        ActiveStep::Company(_) | ActiveStep::Address(_) => false,
    };
    if search_focused {
        edit_search_term(view_data, internal_tx, key.code);
        return None;
    }

    match &mut view_data.step {
        ActiveStep::Company(step) => {
            match key.code {
                KeyCode::Char('j') => step.move_cursor(1),
                KeyCode::Char('k') => step.move_cursor(-1),
                _ => {}
            }
            None
        }
        ActiveStep::Address(step) => {
            if step.focus == AddressField::Observations {
                if let Some(observations) = step.observations.as_mut() {
                    edit_text(observations, key.code);
                }
                return None;
            }
            match key.code {
                KeyCode::Char('j') => step.move_cursor(1),
                KeyCode::Char('k') => step.move_cursor(-1),
                _ => {}
            }
            None
        }
        ActiveStep::Products(step) => match focus {
            ProductsFocus::Observations => {
                edit_text(step.selection.observations_mut(), key.code);
                None
            }
            ProductsFocus::Lines => edit_line(step, key.code),
            ProductsFocus::Search => None,
        },
        ActiveStep::Customer(_) => None,
    }
}

fn edit_text(text: &mut String, code: KeyCode) -> bool {
    match code {
        KeyCode::Char(ch) => {
            text.push(ch);
            true
        }
        KeyCode::Backspace => text.pop().is_some(),
        _ => false,
    }
}

fn edit_search_term(view_data: &mut ViewData, internal_tx: &Sender<InternalEvent>, code: KeyCode) {
    let Some(term) = view_data.step.search_term() else {
        return;
    };
    let mut term = term.to_owned();
    if !edit_text(&mut term, code) {
        return;
    }
    let step = view_data.step.kind();
    if let Some(SearchAction::Schedule { request_id }) =
        view_data.step.set_search_term(term, &mut view_data.ids)
    {
        schedule_search(
            internal_tx,
            step,
            request_id,
            view_data.options.search_debounce,
        );
    }
}

fn edit_line(step: &mut ProductsStep, code: KeyCode) -> Option<Notification> {
    match code {
        KeyCode::Char('j') => {
            step.move_line_cursor(1);
            return None;
        }
        KeyCode::Char('k') => {
            step.move_line_cursor(-1);
            return None;
        }
        _ => {}
    }
    let id = step.highlighted_line()?.product_id;
    match code {
        KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Right => {
            step.selection.increment(id);
            None
        }
        KeyCode::Char('-') | KeyCode::Left => match step.selection.decrement(id) {
            Some(_) => None,
            None => Some(Notification::info(
                "quantity cannot go below 1 -- press x to remove the line",
            )),
        },
        KeyCode::Char('x') | KeyCode::Delete => {
            let removed = step.selection.remove(id)?;
            step.clamp_line_cursor();
            Some(Notification::info(format!(
                "removed {}",
                removed.product_name
            )))
        }
        _ => None,
    }
}

fn retry_lookups<R: WizardRuntime>(
    state: &mut WizardState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let tickets = view_data.step.retry(&mut view_data.ids);
    if tickets.is_empty() {
        emit_status(
            state,
            view_data,
            internal_tx,
            Notification::info("nothing to retry"),
        );
        return;
    }
    spawn_fetches(state, runtime, view_data, internal_tx, tickets);
}

fn report_invalid(
    state: &mut WizardState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    error: anyhow::Error,
) {
    view_data.field_error = error.downcast_ref::<FieldError>().cloned();
    emit_status(
        state,
        view_data,
        internal_tx,
        Notification::error(format!("{error:#}")),
    );
}

/// Merges the step's contribution without leaving it.
fn save_step<R: WizardRuntime>(
    state: &mut WizardState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let from = view_data.step.kind();
    let patch = match view_data.step.completion() {
        Ok(patch) => patch,
        Err(error) => return report_invalid(state, view_data, internal_tx, error),
    };
    view_data.field_error = None;
    let events = dispatch(
        state,
        runtime,
        view_data,
        internal_tx,
        WizardCommand::UpdateDraft { from, patch },
    );
    let saved = events
        .iter()
        .any(|event| matches!(event, WizardEvent::DraftUpdated(_)));
    let warned = events
        .iter()
        .any(|event| matches!(event, WizardEvent::Notified(_)));
    if saved && !warned {
        emit_status(
            state,
            view_data,
            internal_tx,
            Notification::success(format!("{} saved", from.label())),
        );
    }
}

/// Validates and merges the step's contribution, then advances. On the last
/// step this submits the order.
fn complete_step<R: WizardRuntime>(
    state: &mut WizardState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let from = view_data.step.kind();
    match view_data.step.completion() {
        Ok(patch) => {
            view_data.field_error = None;
            dispatch(
                state,
                runtime,
                view_data,
                internal_tx,
                WizardCommand::Complete { from, patch },
            );
        }
        Err(error) => report_invalid(state, view_data, internal_tx, error),
    }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &WizardState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let titles = StepKind::ALL
        .iter()
        .map(|step| step_title(*step, state))
        .collect::<Vec<String>>();
    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .title(header_title(view_data))
                .borders(Borders::ALL),
        )
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(state.step().index());
    frame.render_widget(tabs, layout[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(layout[1]);

    let step = Paragraph::new(render_step_text(view_data))
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(state.step().title()),
        );
    frame.render_widget(step, body[0]);

    let summary = Paragraph::new(render_summary_text(state))
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("order"));
    frame.render_widget(summary, body[1]);

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(status_color(state)))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    if view_data.help_visible {
        let area = centered_rect(70, 70, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn header_title(view_data: &ViewData) -> String {
    match &view_data.options.signed_in_as {
        Some(who) => format!("pedidos | {who}"),
        None => "pedidos".to_owned(),
    }
}

fn step_title(step: StepKind, state: &WizardState) -> String {
    let mark = if state.is_completed(step) {
        DONE_MARK
    } else {
        " "
    };
    format!("{mark} {}. {}", step.index() + 1, step.label())
}

fn status_color(state: &WizardState) -> Color {
    match state.notification().map(|notification| notification.level) {
        Some(NotificationLevel::Error) => Color::Red,
        Some(NotificationLevel::Success) => Color::Green,
        Some(NotificationLevel::Info) | None => Color::Yellow,
    }
}

fn option_line(highlighted: bool, chosen: bool, text: &str) -> String {
    format!(
        "{}{} {text}",
        if highlighted { CURSOR_MARK } else { " " },
        if chosen { CHOSEN_MARK } else { " " },
    )
}

fn render_step_text(view_data: &ViewData) -> String {
    let mut lines = match &view_data.step {
        ActiveStep::Company(step) => render_company_lines(step),
        ActiveStep::Customer(step) => render_customer_lines(step),
        ActiveStep::Address(step) => render_address_lines(step),
        ActiveStep::Products(step) => render_products_lines(step, view_data.products_focus),
    };
    if let Some(precondition) = view_data.step.precondition() {
        lines.insert(0, format!("! {precondition}"));
        lines.insert(1, String::new());
    }
    if let Some(error) = &view_data.field_error {
        lines.push(String::new());
        lines.push(format!("! {error}"));
    }
    lines.join("\n")
}

fn render_company_lines(step: &CompanyStep) -> Vec<String> {
    match &step.options {
        LoadState::Idle => Vec::new(),
        LoadState::Loading { .. } => vec!["loading companies...".to_owned()],
        LoadState::Failed(message) => vec![
            format!("could not load companies: {message}"),
            "press ctrl+r to retry".to_owned(),
        ],
        LoadState::Ready(companies) if companies.is_empty() => {
            vec!["no companies available".to_owned()]
        }
        LoadState::Ready(companies) => companies
            .iter()
            .enumerate()
            .map(|(index, company)| {
                let chosen = step
                    .selected
                    .as_ref()
                    .is_some_and(|selected| selected.id == company.id);
                option_line(index == step.cursor, chosen, &company.name)
            })
            .collect(),
    }
}

fn search_status_line(phase: &SearchPhase, term: &str, noun: &str, empty: bool) -> Option<String> {
    match phase {
        SearchPhase::Pending { .. } | SearchPhase::InFlight { .. } => {
            Some("searching...".to_owned())
        }
        SearchPhase::Failed(message) => Some(format!("search failed: {message}")),
        SearchPhase::Ready if empty => Some(format!("no {noun} match {:?}", term.trim())),
        SearchPhase::Ready => None,
        SearchPhase::Idle => match classify_term(term) {
            TermClass::Empty => Some(format!("type to search {noun}")),
            TermClass::TooShort => Some("type at least 3 characters to search".to_owned()),
            TermClass::Searchable => None,
        },
    }
}

fn render_customer_lines(step: &CustomerStep) -> Vec<String> {
    let mut lines = vec![format!("search: {}_", step.search.term()), String::new()];
    let results = step.search.results();
    if let Some(line) = search_status_line(
        step.search.phase(),
        step.search.term(),
        "customers",
        results.is_empty(),
    ) {
        lines.push(line);
    }
    for (index, customer) in results.iter().enumerate() {
        let chosen = step
            .selected
            .as_ref()
            .is_some_and(|selected| selected.id == customer.id);
        let text = match &customer.city {
            Some(city) => format!("{} ({city})", customer.name),
            None => customer.name.clone(),
        };
        lines.push(option_line(index == step.cursor, chosen, &text));
    }
    lines
}

fn address_text(address: &Address) -> String {
    format!("{}: {}", address.name, address.display_line())
}

fn render_address_lines(step: &AddressStep) -> Vec<String> {
    let mut lines = Vec::new();
    for kind in AddressKind::ALL {
        let focused = step.focused_kind() == Some(kind);
        let heading = format!("{} address", kind.label());
        lines.push(if focused {
            format!("[{heading}]")
        } else {
            heading
        });
        match step.options(kind) {
            LoadState::Idle => {}
            LoadState::Loading { .. } => lines.push("  loading...".to_owned()),
            LoadState::Failed(message) => {
                lines.push(format!("  could not load: {message} -- press ctrl+r to retry"));
            }
            LoadState::Ready(options) => {
                for (index, address) in options.iter().enumerate() {
                    let chosen = step
                        .selected(kind)
                        .is_some_and(|selected| selected.id == address.id);
                    let highlighted = focused && index == step.cursor(kind);
                    lines.push(option_line(highlighted, chosen, &address_text(address)));
                }
            }
        }
        lines.push(String::new());
    }
    if let Some(observations) = &step.observations {
        let label = if step.focus == AddressField::Observations {
            "[observations]"
        } else {
            "observations"
        };
        lines.push(format!("{label}: {observations}_"));
    }
    lines
}

fn render_products_lines(step: &ProductsStep, focus: ProductsFocus) -> Vec<String> {
    let price_list = match &step.price_list {
        LoadState::Idle => "-".to_owned(),
        LoadState::Loading { .. } => "loading...".to_owned(),
        LoadState::Ready(Some(list)) => list.name.clone(),
        LoadState::Ready(None) => "none".to_owned(),
        LoadState::Failed(message) => format!("unavailable ({message})"),
    };
    let mut lines = vec![format!("price list: {price_list}"), String::new()];

    let search_label = if focus == ProductsFocus::Search {
        "[search]"
    } else {
        "search"
    };
    lines.push(format!("{search_label}: {}_", step.search.term()));
    let results = step.search.results();
    if let Some(line) = search_status_line(
        step.search.phase(),
        step.search.term(),
        "products",
        results.is_empty(),
    ) {
        lines.push(line);
    }
    for (index, product) in results.iter().enumerate() {
        let highlighted = focus == ProductsFocus::Search && index == step.search_cursor;
        let text = match &product.reference {
            Some(reference) => format!("{} [{reference}] ({})", product.name, product.unit),
            None => format!("{} ({})", product.name, product.unit),
        };
        lines.push(option_line(
            highlighted,
            step.selection.contains(product.id),
            &text,
        ));
    }

    lines.push(String::new());
    lines.push(if focus == ProductsFocus::Lines {
        "[lines]".to_owned()
    } else {
        "lines".to_owned()
    });
    if step.selection.is_empty() {
        lines.push("  no products added yet".to_owned());
    }
    for (index, item) in step.selection.items().iter().enumerate() {
        let highlighted = focus == ProductsFocus::Lines && index == step.line_cursor;
        let text = format!("{:>4} {:<4} {}", item.quantity, item.unit, item.product_name);
        lines.push(option_line(highlighted, false, &text));
    }

    if step.collects_observations {
        lines.push(String::new());
        let label = if focus == ProductsFocus::Observations {
            "[observations]"
        } else {
            "observations"
        };
        lines.push(format!("{label}: {}_", step.selection.observations()));
    }
    lines
}

fn render_summary_text(state: &WizardState) -> String {
    let draft: &OrderDraft = state.draft();
    let or_dash = |value: Option<String>| value.unwrap_or_else(|| "-".to_owned());
    let mut lines = vec![
        format!(
            "company: {}",
            or_dash(draft.company.as_ref().map(|company| company.name.clone()))
        ),
        format!(
            "customer: {}",
            or_dash(draft.customer.as_ref().map(|customer| customer.name.clone()))
        ),
        format!(
            "delivery: {}",
            or_dash(draft.delivery_address.as_ref().map(address_text))
        ),
        format!(
            "invoice: {}",
            or_dash(draft.invoice_address.as_ref().map(address_text))
        ),
        format!(
            "price list: {}",
            or_dash(draft.price_list.as_ref().map(|list| list.name.clone()))
        ),
        format!(
            "lines: {} ({} units)",
            draft.line_items.len(),
            draft.total_units()
        ),
    ];
    if let Some(observations) = draft.observations.as_deref().filter(|text| !text.is_empty()) {
        lines.push(format!("observations: {observations}"));
    }
    match state.submission() {
        SubmissionStatus::Idle => {}
        SubmissionStatus::InFlight => {
            lines.push(String::new());
            lines.push("submitting...".to_owned());
        }
        SubmissionStatus::Submitted(id) => {
            lines.push(String::new());
            lines.push(format!("submitted as order {id}"));
        }
    }
    lines.join("\n")
}

fn key_hints(state: &WizardState, view_data: &ViewData) -> &'static str {
    if matches!(state.submission(), SubmissionStatus::Submitted(_)) {
        return "ctrl+n new order | esc back | F1 help | ctrl+q quit";
    }
    match &view_data.step {
        ActiveStep::Company(_) => "j/k move | enter choose | ctrl+r retry | ? help | ctrl+q quit",
        ActiveStep::Customer(_) => {
            "type to search | up/down move | enter choose | esc back | F1 help | ctrl+q quit"
        }
        ActiveStep::Address(step) if step.focus == AddressField::Observations => {
            "type observations | tab field | enter next | esc back | F1 help"
        }
        ActiveStep::Address(_) => {
            "tab field | j/k move | enter choose | ctrl+f next | ctrl+r retry | esc back | ? help"
        }
        ActiveStep::Products(_) => match view_data.products_focus {
            ProductsFocus::Search => {
                "type to search | enter add | tab lines | ctrl+s save | ctrl+f submit | esc back"
            }
            ProductsFocus::Lines => {
                "+/- quantity | x remove | enter submit | tab field | ctrl+s save | esc back"
            }
            ProductsFocus::Observations => {
                "type observations | tab field | enter submit | ctrl+s save | esc back"
            }
        },
    }
}

fn status_text(state: &WizardState, view_data: &ViewData) -> String {
    if view_data.help_visible {
        return String::new();
    }
    let hints = key_hints(state, view_data);
    match state.notification() {
        Some(notification) => format!("{} | {hints}", notification.message),
        None => hints.to_owned(),
    }
}

fn help_overlay_text() -> String {
    [
        "navigation",
        "  enter        choose the highlighted option",
        "  ctrl+f       save this step and continue (submits on the last step)",
        "  esc, ctrl+b  back to the previous step",
        "  tab          next field",
        "  up/down j/k  move the highlight",
        "",
        "products",
        "  enter        add the highlighted search result",
        "  + / -        change the quantity of the highlighted line",
        "  x            remove the highlighted line",
        "  ctrl+s       save the product list without submitting",
        "",
        "other",
        "  ctrl+r       retry failed lookups",
        "  ctrl+n       start a new order",
        "  F1, ?        toggle this help",
        "  ctrl+q       quit",
    ]
    .join("\n")
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
