// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use crate::{
    DraftField, DraftPatch, NewOrder, Notification, OrderDraft, OrderId, OrderReceipt, StepKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionStatus {
    #[default]
    Idle,
    InFlight,
    Submitted(OrderId),
}

/// Wizard controller. Owns the draft and the active step; steps contribute
/// through `UpdateDraft` and never touch the draft directly.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WizardState {
    step: StepKind,
    draft: OrderDraft,
    completed: BTreeSet<StepKind>,
    submission: SubmissionStatus,
    notification: Option<Notification>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardCommand {
    Advance,
    Retreat,
    UpdateDraft { from: StepKind, patch: DraftPatch },
    /// Merge the step's contribution, then advance when the merge succeeds.
    Complete { from: StepKind, patch: DraftPatch },
    SubmitSucceeded(OrderReceipt),
    SubmitFailed(String),
    StartNewOrder,
    Notify(Notification),
    ClearNotification,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardEvent {
    StepChanged { from: StepKind, to: StepKind },
    DraftUpdated(Vec<DraftField>),
    SubmitRequested(NewOrder),
    Submitted(OrderId),
    SubmitFailed(String),
    Notified(Notification),
    Rejected(String),
    Reset,
    NotificationCleared,
}

impl WizardState {
    pub fn step(&self) -> StepKind {
        self.step
    }

    pub fn draft(&self) -> &OrderDraft {
        &self.draft
    }

    pub fn is_completed(&self, step: StepKind) -> bool {
        self.completed.contains(&step)
    }

    pub fn submission(&self) -> SubmissionStatus {
        self.submission
    }

    pub fn is_submitting(&self) -> bool {
        self.submission == SubmissionStatus::InFlight
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn dispatch(&mut self, command: WizardCommand) -> Vec<WizardEvent> {
        match command {
            WizardCommand::Advance => self.advance(),
            WizardCommand::Retreat => self.retreat(),
            WizardCommand::UpdateDraft { from, patch } => self.update_draft(from, patch),
            WizardCommand::Complete { from, patch } => {
                let mut events = self.update_draft(from, patch);
                if events
                    .iter()
                    .any(|event| matches!(event, WizardEvent::Rejected(_)))
                {
                    return events;
                }
                events.extend(self.advance());
                events
            }
            WizardCommand::SubmitSucceeded(receipt) => self.submit_succeeded(receipt),
            WizardCommand::SubmitFailed(message) => self.submit_failed(message),
            WizardCommand::StartNewOrder => self.start_new_order(),
            WizardCommand::Notify(notification) => self.notify(notification),
            WizardCommand::ClearNotification => {
                if self.notification.take().is_some() {
                    vec![WizardEvent::NotificationCleared]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn notify(&mut self, notification: Notification) -> Vec<WizardEvent> {
        self.notification = Some(notification.clone());
        vec![WizardEvent::Notified(notification)]
    }

    fn reject(&mut self, message: String) -> Vec<WizardEvent> {
        let mut events = self.notify(Notification::error(message.clone()));
        events.insert(0, WizardEvent::Rejected(message));
        events
    }

    fn advance(&mut self) -> Vec<WizardEvent> {
        if let Some(message) = self.locked_reason() {
            return self.reject(message);
        }
        if !self.is_completed(self.step) {
            return self.reject(format!(
                "complete the {} step before continuing",
                self.step.label()
            ));
        }
        if self.step.is_last() {
            return self.submit();
        }

        let from = self.step;
        let Some(to) = StepKind::from_index(from.index() + 1) else {
            return Vec::new();
        };
        self.step = to;
        vec![WizardEvent::StepChanged { from, to }]
    }

    fn retreat(&mut self) -> Vec<WizardEvent> {
        let from = self.step;
        let Some(to) = from.index().checked_sub(1).and_then(StepKind::from_index) else {
            return Vec::new();
        };
        self.step = to;
        vec![WizardEvent::StepChanged { from, to }]
    }

    fn locked_reason(&self) -> Option<String> {
        match self.submission {
            SubmissionStatus::Idle => None,
            SubmissionStatus::InFlight => {
                Some("order is being submitted -- wait for the result".to_owned())
            }
            SubmissionStatus::Submitted(id) => Some(format!(
                "order {id} was already submitted -- press ctrl+n to start a new order"
            )),
        }
    }

    fn update_draft(&mut self, from: StepKind, patch: DraftPatch) -> Vec<WizardEvent> {
        if from != self.step {
            return self.reject(format!(
                "the {} step is not active -- only the {} step can change the order",
                from.label(),
                self.step.label()
            ));
        }
        if let Some(message) = self.locked_reason() {
            return self.reject(message);
        }

        let warning = self.upstream_warning(&patch);
        let fields = match self.draft.merge(patch) {
            Ok(fields) => fields,
            Err(error) => return self.reject(format!("{error:#}")),
        };
        if self.draft.contributes(from) {
            self.completed.insert(from);
        }

        let mut events = vec![WizardEvent::DraftUpdated(fields)];
        if let Some(warning) = warning {
            events.extend(self.notify(Notification::info(warning)));
        }
        events
    }

    /// Downstream selections are kept when an upstream choice changes; the
    /// user is told to review them instead.
    fn upstream_warning(&self, patch: &DraftPatch) -> Option<String> {
        if let (Some(new), Some(old)) = (&patch.company, &self.draft.company)
            && new.id != old.id
            && self.draft.customer.is_some()
        {
            return Some(format!(
                "customer selection may not belong to {} -- review the later steps",
                new.name
            ));
        }
        if let (Some(new), Some(old)) = (&patch.customer, &self.draft.customer)
            && new.id != old.id
            && (self.draft.delivery_address.is_some() || !self.draft.line_items.is_empty())
        {
            return Some(format!(
                "addresses and products were chosen for {} -- review the later steps",
                old.name
            ));
        }
        None
    }

    fn submit(&mut self) -> Vec<WizardEvent> {
        match self.draft.to_new_order() {
            Ok(order) => {
                self.submission = SubmissionStatus::InFlight;
                let mut events = vec![WizardEvent::SubmitRequested(order)];
                events.extend(self.notify(Notification::info("submitting order...")));
                events
            }
            Err(error) => self.reject(format!("{error:#}")),
        }
    }

    fn submit_succeeded(&mut self, receipt: OrderReceipt) -> Vec<WizardEvent> {
        if !self.is_submitting() {
            return Vec::new();
        }
        self.submission = SubmissionStatus::Submitted(receipt.id);
        let mut events = vec![WizardEvent::Submitted(receipt.id)];
        events.extend(self.notify(Notification::success(format!(
            "order {} created -- press ctrl+n to start a new order",
            receipt.id
        ))));
        events
    }

    fn submit_failed(&mut self, message: String) -> Vec<WizardEvent> {
        if !self.is_submitting() {
            return Vec::new();
        }
        self.submission = SubmissionStatus::Idle;
        let mut events = vec![WizardEvent::SubmitFailed(message.clone())];
        events.extend(self.notify(Notification::error(format!(
            "order submission failed: {message} -- press enter to retry"
        ))));
        events
    }

    fn start_new_order(&mut self) -> Vec<WizardEvent> {
        if self.is_submitting() {
            return self.reject("order is being submitted -- wait for the result".to_owned());
        }
        *self = Self::default();
        vec![WizardEvent::Reset]
    }
}

#[cfg(test)]
mod tests {
    use super::{SubmissionStatus, WizardCommand, WizardEvent, WizardState};
    use crate::{
        Address, AddressKind, Company, CompanyId, Customer, CustomerId, DraftField, DraftPatch,
        LineItem, NotificationLevel, OrderId, OrderReceipt, ProductId, StepKind,
    };

    fn company(id: i64, name: &str) -> DraftPatch {
        DraftPatch {
            company: Some(Company {
                id: CompanyId::new(id),
                name: name.to_owned(),
            }),
            ..DraftPatch::default()
        }
    }

    fn customer(id: i64, name: &str) -> DraftPatch {
        DraftPatch {
            customer: Some(Customer::named(CustomerId::new(id), name)),
            ..DraftPatch::default()
        }
    }

    fn addresses() -> DraftPatch {
        DraftPatch {
            delivery_address: Some(Address::default_for(AddressKind::Delivery)),
            invoice_address: Some(Address::default_for(AddressKind::Invoice)),
            ..DraftPatch::default()
        }
    }

    fn products() -> DraftPatch {
        DraftPatch {
            line_items: Some(vec![LineItem {
                product_id: ProductId::new(1),
                product_name: "Producto A".to_owned(),
                unit: "kg".to_owned(),
                quantity: 2,
            }]),
            observations: Some("deliver before noon".to_owned()),
            ..DraftPatch::default()
        }
    }

    fn complete(state: &mut WizardState, from: StepKind, patch: DraftPatch) -> Vec<WizardEvent> {
        state.dispatch(WizardCommand::Complete { from, patch })
    }

    fn on_last_step() -> WizardState {
        let mut state = WizardState::default();
        complete(&mut state, StepKind::Company, company(1, "Premex"));
        complete(&mut state, StepKind::Customer, customer(7, "AMASA S.A.S"));
        complete(&mut state, StepKind::Address, addresses());
        state.dispatch(WizardCommand::UpdateDraft {
            from: StepKind::Products,
            patch: products(),
        });
        assert_eq!(state.step(), StepKind::Products);
        state
    }

    fn rejected(events: &[WizardEvent]) -> bool {
        events
            .iter()
            .any(|event| matches!(event, WizardEvent::Rejected(_)))
    }

    #[test]
    fn index_stays_in_range_for_any_sequence() {
        let mut state = WizardState::default();
        let patches = [
            (StepKind::Company, company(1, "Premex")),
            (StepKind::Customer, customer(7, "AMASA S.A.S")),
            (StepKind::Address, addresses()),
        ];
        for (step, patch) in patches {
            state.dispatch(WizardCommand::UpdateDraft { from: step, patch });
            for command in [
                WizardCommand::Retreat,
                WizardCommand::Retreat,
                WizardCommand::Retreat,
                WizardCommand::Retreat,
                WizardCommand::Advance,
                WizardCommand::Advance,
                WizardCommand::Advance,
                WizardCommand::Advance,
                WizardCommand::Advance,
            ] {
                state.dispatch(command);
                assert!(state.step().index() < StepKind::ALL.len());
            }
        }
        assert_eq!(state.step(), StepKind::Products);
        assert_eq!(state.submission(), SubmissionStatus::Idle);
    }

    #[test]
    fn retreat_at_first_step_is_a_no_op() {
        let mut state = WizardState::default();
        assert!(state.dispatch(WizardCommand::Retreat).is_empty());
        assert_eq!(state.step(), StepKind::Company);
    }

    #[test]
    fn retreat_then_advance_restores_step_and_draft() {
        let mut state = WizardState::default();
        complete(&mut state, StepKind::Company, company(1, "Premex"));
        complete(&mut state, StepKind::Customer, customer(7, "AMASA S.A.S"));
        let draft = state.draft().clone();

        state.dispatch(WizardCommand::Retreat);
        assert_eq!(state.step(), StepKind::Customer);
        assert_eq!(state.draft(), &draft);

        let events = state.dispatch(WizardCommand::Advance);
        assert_eq!(
            events,
            vec![WizardEvent::StepChanged {
                from: StepKind::Customer,
                to: StepKind::Address,
            }]
        );
        assert_eq!(state.draft(), &draft);
    }

    #[test]
    fn advance_without_completion_is_refused() {
        let mut state = WizardState::default();
        let events = state.dispatch(WizardCommand::Advance);
        assert!(rejected(&events));
        assert_eq!(state.step(), StepKind::Company);
        let notification = state.notification().expect("notification");
        assert_eq!(notification.level, NotificationLevel::Error);
        assert!(notification.message.contains("company"));
    }

    #[test]
    fn only_the_active_step_may_write() {
        let mut state = WizardState::default();
        let events = state.dispatch(WizardCommand::UpdateDraft {
            from: StepKind::Customer,
            patch: customer(7, "AMASA S.A.S"),
        });
        assert!(rejected(&events));
        assert!(state.draft().customer.is_none());
    }

    #[test]
    fn invalid_patch_leaves_draft_and_completion_untouched() {
        let mut state = WizardState::default();
        complete(&mut state, StepKind::Company, company(1, "Premex"));
        complete(&mut state, StepKind::Customer, customer(7, "AMASA S.A.S"));

        let events = complete(
            &mut state,
            StepKind::Address,
            DraftPatch {
                delivery_address: Some(Address::default_for(AddressKind::Invoice)),
                invoice_address: Some(Address::default_for(AddressKind::Invoice)),
                ..DraftPatch::default()
            },
        );
        assert!(rejected(&events));
        assert_eq!(state.step(), StepKind::Address);
        assert!(state.draft().delivery_address.is_none());
        assert!(!state.is_completed(StepKind::Address));
    }

    #[test]
    fn complete_merges_before_advancing() {
        let mut state = WizardState::default();
        let events = complete(&mut state, StepKind::Company, company(1, "Premex"));
        assert_eq!(
            events,
            vec![
                WizardEvent::DraftUpdated(vec![DraftField::Company]),
                WizardEvent::StepChanged {
                    from: StepKind::Company,
                    to: StepKind::Customer,
                },
            ]
        );
        assert!(state.is_completed(StepKind::Company));
    }

    #[test]
    fn changing_company_keeps_customer_and_warns() {
        let mut state = WizardState::default();
        complete(&mut state, StepKind::Company, company(1, "Premex"));
        complete(&mut state, StepKind::Customer, customer(7, "AMASA S.A.S"));
        state.dispatch(WizardCommand::Retreat);
        state.dispatch(WizardCommand::Retreat);

        let events = complete(&mut state, StepKind::Company, company(2, "Nutreo"));
        assert!(!rejected(&events));
        assert_eq!(
            state.draft().customer.as_ref().map(|c| c.id),
            Some(CustomerId::new(7))
        );
        let notification = state.notification().expect("warning expected");
        assert_eq!(notification.level, NotificationLevel::Info);
        assert!(notification.message.contains("may not belong to Nutreo"));
    }

    #[test]
    fn advance_on_last_step_requests_submission() {
        let mut state = on_last_step();
        let events = state.dispatch(WizardCommand::Advance);
        let Some(WizardEvent::SubmitRequested(order)) = events.first() else {
            panic!("submit request expected, got {events:?}");
        };
        assert_eq!(order.company_id, CompanyId::new(1));
        assert_eq!(order.lines.len(), 1);
        assert_eq!(order.observations.as_deref(), Some("deliver before noon"));
        assert!(state.is_submitting());
    }

    #[test]
    fn second_submit_while_in_flight_is_refused() {
        let mut state = on_last_step();
        state.dispatch(WizardCommand::Advance);
        let events = state.dispatch(WizardCommand::Advance);
        assert!(rejected(&events));
        assert!(
            !events
                .iter()
                .any(|event| matches!(event, WizardEvent::SubmitRequested(_)))
        );
    }

    #[test]
    fn successful_submit_notifies_and_keeps_draft() {
        let mut state = on_last_step();
        let draft = state.draft().clone();
        state.dispatch(WizardCommand::Advance);
        let events = state.dispatch(WizardCommand::SubmitSucceeded(OrderReceipt {
            id: OrderId::new(501),
            created_at: None,
        }));

        assert_eq!(events[0], WizardEvent::Submitted(OrderId::new(501)));
        assert_eq!(state.submission(), SubmissionStatus::Submitted(OrderId::new(501)));
        assert_eq!(state.draft(), &draft);
        let notification = state.notification().expect("success notification");
        assert_eq!(notification.level, NotificationLevel::Success);
        assert!(notification.message.contains("501"));

        assert!(rejected(&state.dispatch(WizardCommand::Advance)));
    }

    #[test]
    fn failed_submit_keeps_index_and_draft_and_allows_retry() {
        let mut state = on_last_step();
        let draft = state.draft().clone();
        state.dispatch(WizardCommand::Advance);
        state.dispatch(WizardCommand::SubmitFailed("server error (500)".to_owned()));

        assert_eq!(state.step(), StepKind::Products);
        assert_eq!(state.draft(), &draft);
        assert_eq!(state.submission(), SubmissionStatus::Idle);
        let notification = state.notification().expect("error notification");
        assert_eq!(notification.level, NotificationLevel::Error);
        assert!(notification.message.contains("server error (500)"));

        let retry = state.dispatch(WizardCommand::Advance);
        assert!(matches!(retry.first(), Some(WizardEvent::SubmitRequested(_))));
    }

    #[test]
    fn late_submit_reply_without_request_is_ignored() {
        let mut state = on_last_step();
        assert!(
            state
                .dispatch(WizardCommand::SubmitFailed("boom".to_owned()))
                .is_empty()
        );
        assert!(state.notification().is_none());
    }

    #[test]
    fn start_new_order_resets_everything() {
        let mut state = on_last_step();
        state.dispatch(WizardCommand::Advance);
        state.dispatch(WizardCommand::SubmitSucceeded(OrderReceipt {
            id: OrderId::new(9),
            created_at: None,
        }));

        assert_eq!(state.dispatch(WizardCommand::StartNewOrder), vec![WizardEvent::Reset]);
        assert_eq!(state, WizardState::default());
    }

    #[test]
    fn start_new_order_waits_for_in_flight_submit() {
        let mut state = on_last_step();
        state.dispatch(WizardCommand::Advance);
        assert!(rejected(&state.dispatch(WizardCommand::StartNewOrder)));
        assert!(state.is_submitting());
    }

    #[test]
    fn clear_notification_reports_only_when_something_cleared() {
        let mut state = WizardState::default();
        assert!(state.dispatch(WizardCommand::ClearNotification).is_empty());
        state.dispatch(WizardCommand::Notify(crate::Notification::info("hello")));
        assert_eq!(
            state.dispatch(WizardCommand::ClearNotification),
            vec![WizardEvent::NotificationCleared]
        );
    }
}
