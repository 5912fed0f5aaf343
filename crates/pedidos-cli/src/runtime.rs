// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use pedidos_app::{FetchResponse, FetchTicket, NewOrder, OrderBackend, OrderReceipt, run_fetch};
use pedidos_tui::{InternalEvent, WizardRuntime};
use std::sync::mpsc::Sender;
use std::thread;
use tracing::{debug, info, warn};

/// Runs every backend call on its own short-lived worker thread and reports
/// back over the wizard's event channel.
pub struct BackendRuntime<B> {
    backend: B,
}

impl<B> BackendRuntime<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

impl<B> WizardRuntime for BackendRuntime<B>
where
    B: OrderBackend + Clone + Send + 'static,
{
    fn fetch(&mut self, ticket: &FetchTicket) -> FetchResponse {
        run_fetch(&self.backend, ticket)
    }

    fn submit_order(&mut self, order: &NewOrder) -> Result<OrderReceipt> {
        self.backend.create_order(order)
    }

    fn spawn_fetch(&mut self, ticket: FetchTicket, tx: Sender<InternalEvent>) -> Result<()> {
        let backend = self.backend.clone();
        thread::spawn(move || {
            let response = run_fetch(&backend, &ticket);
            match &response.result {
                Ok(_) => debug!(
                    request_id = ticket.request_id,
                    request = %ticket.request.describe(),
                    "lookup finished"
                ),
                Err(error) => warn!(
                    request_id = ticket.request_id,
                    request = %ticket.request.describe(),
                    %error,
                    "lookup failed"
                ),
            }
            // The wizard may have exited; nobody is left to tell.
            let _ = tx.send(InternalEvent::Fetched(response));
        });
        Ok(())
    }

    fn spawn_submit(
        &mut self,
        request_id: u64,
        order: NewOrder,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let backend = self.backend.clone();
        thread::spawn(move || {
            let result = backend.create_order(&order);
            match &result {
                Ok(receipt) => info!(
                    request_id,
                    order = %receipt.id,
                    customer = %order.customer_id,
                    lines = order.lines.len(),
                    "order created"
                ),
                Err(error) => warn!(request_id, error = %format!("{error:#}"), "order rejected"),
            }
            let result = result.map_err(|error| format!("{error:#}"));
            let _ = tx.send(InternalEvent::Submitted { request_id, result });
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::BackendRuntime;
    use pedidos_app::{
        AddressId, CompanyId, CustomerId, FetchPayload, FetchRequest, FetchTicket, NewOrder,
        NewOrderLine, ProductId, StepKind,
    };
    use pedidos_testkit::{DemoBackend, FailurePoint};
    use pedidos_tui::{InternalEvent, WizardRuntime};
    use std::sync::mpsc;
    use std::time::Duration;

    fn order() -> NewOrder {
        NewOrder {
            company_id: CompanyId::new(1),
            customer_id: CustomerId::new(10),
            delivery_address_id: AddressId::new("201"),
            invoice_address_id: AddressId::new("203"),
            price_list_id: None,
            observations: None,
            lines: vec![NewOrderLine {
                product_id: ProductId::new(1),
                quantity: 2,
            }],
        }
    }

    #[test]
    fn lookups_report_back_from_a_worker_thread() {
        let mut runtime = BackendRuntime::new(DemoBackend::new());
        let (tx, rx) = mpsc::channel();
        runtime
            .spawn_fetch(
                FetchTicket {
                    request_id: 9,
                    request: FetchRequest::Companies,
                },
                tx,
            )
            .expect("worker should start");

        let event = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("lookup reply");
        let InternalEvent::Fetched(response) = event else {
            panic!("fetched event expected");
        };
        assert_eq!(response.request_id, 9);
        assert_eq!(response.step, StepKind::Company);
        assert!(matches!(
            response.result,
            Ok(FetchPayload::Companies(ref companies)) if companies.len() == 3
        ));
    }

    #[test]
    fn submissions_carry_their_request_id_and_outcome() {
        let backend = DemoBackend::new();
        let mut runtime = BackendRuntime::new(backend.clone());
        let (tx, rx) = mpsc::channel();

        runtime
            .spawn_submit(3, order(), tx.clone())
            .expect("worker should start");
        let event = rx.recv_timeout(Duration::from_secs(5)).expect("reply");
        assert!(matches!(
            event,
            InternalEvent::Submitted {
                request_id: 3,
                result: Ok(_)
            }
        ));
        assert_eq!(backend.orders().len(), 1);

        backend.fail(FailurePoint::Submit);
        runtime
            .spawn_submit(4, order(), tx)
            .expect("worker should start");
        let event = rx.recv_timeout(Duration::from_secs(5)).expect("reply");
        let InternalEvent::Submitted {
            request_id: 4,
            result: Err(message),
        } = event
        else {
            panic!("failed submission expected");
        };
        assert!(message.contains("503"));
    }
}
