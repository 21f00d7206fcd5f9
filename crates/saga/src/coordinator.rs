//! The saga state machine: event-to-transition dispatch, retry bookkeeping
//! and compensation.

use async_trait::async_trait;
use chrono::Utc;
use common::OrderId;
use domain::{
    InboundEvent, InventoryFailed, InventoryReservation, InventoryReserved, OrderCancelled,
    OrderCompleted, OrderCreated, OrderDeleted, OrderFailed, OrderStatusChanged,
    PaymentFailed, PaymentProcessed, PaymentProcessing, ShippingFailed, ShippingPreparation,
    ShippingPrepared, StatusChangedNotification,
};
use messaging::{EventContext, EventHandler, EventPublisher, HandlerError};
use saga_store::{
    EventLogEntry, ProcessingStatus, ProcessingStep, SagaRow, SagaStatus, SagaStore,
    SagaStoreError,
};
use serde::Serialize;

use crate::error::{CoordinatorError, Result};

/// Outcome of one stuck-saga sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// Stuck rows examined.
    pub examined: usize,
    /// Rows whose current step was re-emitted.
    pub retried: usize,
    /// Rows whose retry budget was exhausted and that entered compensation.
    pub failed: usize,
    /// Rows the sweep could not rescue (store or broker errors; they stay
    /// stuck and are picked up again next sweep).
    pub errors: usize,
}

/// Drives each order through payment → inventory reservation → shipping
/// preparation, persisting state so the workflow survives restarts.
///
/// Handlers follow one rule: one event, one transaction, one outcome. An
/// event either commits a state change (and usually a publish), is
/// idempotently dropped, or errors out for broker redelivery. Events whose
/// source step has already been passed are dropped with an `IGNORED` audit
/// entry and no publishes.
///
/// Outbound publishes always carry the correlation id stored on the saga
/// row, not the one resolved for the triggering delivery (step events
/// arrive without a correlation id and the ingress generates a fresh one).
/// The delivery's context is used only for audit rows.
pub struct SagaCoordinator<S: SagaStore> {
    store: S,
    publisher: EventPublisher,
    max_retries: i32,
}

impl<S: SagaStore> SagaCoordinator<S> {
    /// Creates a new coordinator.
    pub fn new(store: S, publisher: EventPublisher, max_retries: i32) -> Self {
        Self {
            store,
            publisher,
            max_retries,
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates the saga row for a new order and kicks off payment.
    #[tracing::instrument(skip(self, event, ctx), fields(order_id = %event.order_id))]
    pub async fn handle_order_created(
        &self,
        event: OrderCreated,
        ctx: &EventContext,
    ) -> Result<()> {
        if event.total_amount.is_negative() {
            tracing::warn!(amount = %event.total_amount, "rejecting order with negative amount");
            self.audit(None, event.order_id, domain::topics::ORDER_CREATED, &event,
                ProcessingStatus::Failed, ctx)
                .await?;
            return Ok(());
        }

        let mut saga = SagaRow::for_order(
            event.order_id,
            event.customer_id.clone(),
            event.order_number.clone(),
            event.total_amount,
            event.currency.clone(),
            ctx.correlation_id.clone(),
        );
        saga.order_items = event.items.clone();
        saga.shipping_address = event.shipping_address.clone();
        saga.billing_address = event.billing_address.clone();

        match self.store.create(&saga).await {
            Ok(()) => {}
            Err(SagaStoreError::AlreadyExists(order_id)) => {
                // Duplicate creation event; the unique order_id index is the guard.
                tracing::warn!(%order_id, "saga already exists, dropping duplicate");
                metrics::counter!("events_duplicate_total").increment(1);
                self.audit(None, order_id, domain::topics::ORDER_CREATED, &event,
                    ProcessingStatus::Ignored, ctx)
                    .await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        metrics::counter!("saga_started_total").increment(1);
        tracing::info!(saga_id = %saga.id, "saga started");
        self.audit(Some(&saga), event.order_id, domain::topics::ORDER_CREATED, &event,
            ProcessingStatus::Processed, ctx)
            .await?;

        // On creation the inbound context is what seeded saga.correlation_id.
        let command = self.payment_command(&saga);
        if let Err(e) = self.publisher.payment_processing(&command, ctx).await {
            tracing::error!(saga_id = %saga.id, error = %e, "failed to start payment processing");
            self.handle_saga_failure(saga, format!("Failed to start payment processing: {e}"))
                .await?;
        }
        Ok(())
    }

    /// Records the payment id and moves on to inventory reservation.
    #[tracing::instrument(skip(self, event, ctx), fields(order_id = %event.order_id))]
    pub async fn handle_payment_processed(
        &self,
        event: PaymentProcessed,
        ctx: &EventContext,
    ) -> Result<()> {
        let topic = domain::topics::PAYMENT_PROCESSED;
        let Some(mut saga) = self.store.find_by_order_id(event.order_id).await? else {
            return self.drop_unmatched(event.order_id, topic, &event, false, ctx).await;
        };
        if saga.status != SagaStatus::PaymentProcessing {
            return self.drop_ignored(&saga, topic, &event, ctx).await;
        }

        saga.payment_id = Some(event.payment_id.clone());
        saga.advance_to(SagaStatus::InventoryProcessing, ProcessingStep::Inventory);
        let saga = self.store.save(&saga).await?;

        tracing::info!(saga_id = %saga.id, payment_id = %event.payment_id, "payment completed");
        self.audit(Some(&saga), event.order_id, topic, &event, ProcessingStatus::Processed, ctx)
            .await?;
        self.notify_progress(&saga, SagaStatus::PaymentProcessing).await;

        let saga_ctx = EventContext::new(saga.correlation_id.clone());
        let command = self.inventory_command(&saga);
        if let Err(e) = self.publisher.inventory_reservation(&command, &saga_ctx).await {
            tracing::error!(saga_id = %saga.id, error = %e, "failed to start inventory reservation");
            self.handle_saga_failure(saga, format!("Failed to start inventory reservation: {e}"))
                .await?;
        }
        Ok(())
    }

    /// Retries payment or enters compensation when the budget is spent.
    #[tracing::instrument(skip(self, event, ctx), fields(order_id = %event.order_id))]
    pub async fn handle_payment_failed(
        &self,
        event: PaymentFailed,
        ctx: &EventContext,
    ) -> Result<()> {
        let topic = domain::topics::PAYMENT_FAILED;
        let Some(saga) = self.store.find_by_order_id(event.order_id).await? else {
            return self.drop_unmatched(event.order_id, topic, &event, false, ctx).await;
        };
        if saga.status != SagaStatus::PaymentProcessing {
            return self.drop_ignored(&saga, topic, &event, ctx).await;
        }

        self.audit(Some(&saga), event.order_id, topic, &event, ProcessingStatus::Processed, ctx)
            .await?;

        if saga.can_retry(self.max_retries) {
            self.retry_current_step(saga).await
        } else {
            self.handle_saga_failure(saga, format!("Payment failed: {}", event.reason))
                .await
        }
    }

    /// Records the reservation id and moves on to shipping preparation.
    #[tracing::instrument(skip(self, event, ctx), fields(order_id = %event.order_id))]
    pub async fn handle_inventory_reserved(
        &self,
        event: InventoryReserved,
        ctx: &EventContext,
    ) -> Result<()> {
        let topic = domain::topics::INVENTORY_RESERVED;
        let Some(mut saga) = self.store.find_by_order_id(event.order_id).await? else {
            return self.drop_unmatched(event.order_id, topic, &event, false, ctx).await;
        };
        if saga.status != SagaStatus::InventoryProcessing {
            return self.drop_ignored(&saga, topic, &event, ctx).await;
        }

        saga.inventory_reservation_id = Some(event.reservation_id.clone());
        saga.advance_to(SagaStatus::ShippingProcessing, ProcessingStep::Shipping);
        let saga = self.store.save(&saga).await?;

        tracing::info!(
            saga_id = %saga.id,
            reservation_id = %event.reservation_id,
            "inventory reserved"
        );
        self.audit(Some(&saga), event.order_id, topic, &event, ProcessingStatus::Processed, ctx)
            .await?;
        self.notify_progress(&saga, SagaStatus::InventoryProcessing).await;

        let saga_ctx = EventContext::new(saga.correlation_id.clone());
        let command = self.shipping_command(&saga);
        if let Err(e) = self.publisher.shipping_preparation(&command, &saga_ctx).await {
            tracing::error!(saga_id = %saga.id, error = %e, "failed to start shipping preparation");
            self.handle_saga_failure(saga, format!("Failed to start shipping preparation: {e}"))
                .await?;
        }
        Ok(())
    }

    /// Retries inventory reservation or enters compensation.
    #[tracing::instrument(skip(self, event, ctx), fields(order_id = %event.order_id))]
    pub async fn handle_inventory_failed(
        &self,
        event: InventoryFailed,
        ctx: &EventContext,
    ) -> Result<()> {
        let topic = domain::topics::INVENTORY_FAILED;
        let Some(saga) = self.store.find_by_order_id(event.order_id).await? else {
            return self.drop_unmatched(event.order_id, topic, &event, false, ctx).await;
        };
        if saga.status != SagaStatus::InventoryProcessing {
            return self.drop_ignored(&saga, topic, &event, ctx).await;
        }

        self.audit(Some(&saga), event.order_id, topic, &event, ProcessingStatus::Processed, ctx)
            .await?;

        if saga.can_retry(self.max_retries) {
            self.retry_current_step(saga).await
        } else {
            self.handle_saga_failure(
                saga,
                format!("Inventory reservation failed: {}", event.reason),
            )
            .await
        }
    }

    /// Records the shipping id and completes the saga.
    #[tracing::instrument(skip(self, event, ctx), fields(order_id = %event.order_id))]
    pub async fn handle_shipping_prepared(
        &self,
        event: ShippingPrepared,
        ctx: &EventContext,
    ) -> Result<()> {
        let topic = domain::topics::SHIPPING_PREPARED;
        let Some(mut saga) = self.store.find_by_order_id(event.order_id).await? else {
            return self.drop_unmatched(event.order_id, topic, &event, false, ctx).await;
        };
        if saga.status != SagaStatus::ShippingProcessing {
            return self.drop_ignored(&saga, topic, &event, ctx).await;
        }

        saga.shipping_id = Some(event.shipping_id.clone());
        saga.mark_completed();
        let saga = self.store.save(&saga).await?;

        metrics::counter!("saga_completed_total").increment(1);
        if let Some(completed_at) = saga.completed_at {
            let duration = (completed_at - saga.created_at).num_milliseconds() as f64 / 1000.0;
            metrics::histogram!("saga_duration_seconds").record(duration);
        }
        tracing::info!(saga_id = %saga.id, shipping_id = %event.shipping_id, "saga completed");
        self.audit(Some(&saga), event.order_id, topic, &event, ProcessingStatus::Processed, ctx)
            .await?;

        self.notify_progress(&saga, SagaStatus::ShippingProcessing).await;
        let saga_ctx = EventContext::new(saga.correlation_id.clone());
        let completed = OrderCompleted::new(saga.order_id);
        if let Err(e) = self.publisher.order_completed(&completed, &saga_ctx).await {
            tracing::warn!(saga_id = %saga.id, error = %e, "failed to publish order.completed");
        }
        Ok(())
    }

    /// Retries shipping preparation or enters compensation.
    #[tracing::instrument(skip(self, event, ctx), fields(order_id = %event.order_id))]
    pub async fn handle_shipping_failed(
        &self,
        event: ShippingFailed,
        ctx: &EventContext,
    ) -> Result<()> {
        let topic = domain::topics::SHIPPING_FAILED;
        let Some(saga) = self.store.find_by_order_id(event.order_id).await? else {
            return self.drop_unmatched(event.order_id, topic, &event, false, ctx).await;
        };
        if saga.status != SagaStatus::ShippingProcessing {
            return self.drop_ignored(&saga, topic, &event, ctx).await;
        }

        self.audit(Some(&saga), event.order_id, topic, &event, ProcessingStatus::Processed, ctx)
            .await?;

        if saga.can_retry(self.max_retries) {
            self.retry_current_step(saga).await
        } else {
            self.handle_saga_failure(
                saga,
                format!("Shipping preparation failed: {}", event.reason),
            )
            .await
        }
    }

    /// Starts compensation for a cancelled order.
    #[tracing::instrument(skip(self, event, ctx), fields(order_id = %event.order_id))]
    pub async fn handle_order_cancelled(
        &self,
        event: OrderCancelled,
        ctx: &EventContext,
    ) -> Result<()> {
        let topic = domain::topics::ORDER_CANCELLED;
        let Some(saga) = self.store.find_by_order_id(event.order_id).await? else {
            return self.drop_unmatched(event.order_id, topic, &event, true, ctx).await;
        };
        if saga.status.is_compensating() || saga.status.is_terminal() {
            return self.drop_ignored(&saga, topic, &event, ctx).await;
        }

        self.audit(Some(&saga), event.order_id, topic, &event, ProcessingStatus::Processed, ctx)
            .await?;
        metrics::counter!("saga_cancelled_total").increment(1);

        let reason = event.reason.as_deref().unwrap_or("User requested");
        self.handle_saga_failure(saga, format!("Order cancelled: {reason}"))
            .await
    }

    /// Routes a generic status change to the matching lifecycle handling.
    #[tracing::instrument(skip(self, event, ctx), fields(order_id = %event.order_id))]
    pub async fn handle_order_status_changed(
        &self,
        event: OrderStatusChanged,
        ctx: &EventContext,
    ) -> Result<()> {
        let topic = domain::topics::ORDER_STATUS_CHANGED;
        let Some(saga) = self.store.find_by_order_id(event.order_id).await? else {
            return self.drop_unmatched(event.order_id, topic, &event, true, ctx).await;
        };

        match event.new_status.to_ascii_lowercase().as_str() {
            "cancelled" => {
                if saga.status.is_compensating() || saga.status.is_terminal() {
                    return self.drop_ignored(&saga, topic, &event, ctx).await;
                }
                self.audit(Some(&saga), event.order_id, topic, &event,
                    ProcessingStatus::Processed, ctx)
                    .await?;
                let reason = event.reason.as_deref().unwrap_or("User requested");
                self.handle_saga_failure(
                    saga,
                    format!("Order cancelled via status change: {reason}"),
                )
                .await
            }
            "shipped" | "delivered" => {
                if saga.status.is_terminal() {
                    return self.drop_ignored(&saga, topic, &event, ctx).await;
                }
                self.audit(Some(&saga), event.order_id, topic, &event,
                    ProcessingStatus::Processed, ctx)
                    .await?;
                self.force_complete(saga, &event.new_status).await
            }
            other => {
                tracing::debug!(status = other, "status change requires no saga update");
                self.audit(Some(&saga), event.order_id, topic, &event,
                    ProcessingStatus::Processed, ctx)
                    .await
            }
        }
    }

    /// Force-advances the saga to completed when the order shipped or was
    /// delivered out of band.
    #[tracing::instrument(skip(self, event, ctx), fields(order_id = %event.order_id))]
    pub async fn handle_order_force_completed(
        &self,
        event: OrderStatusChanged,
        topic: &'static str,
        ctx: &EventContext,
    ) -> Result<()> {
        let Some(saga) = self.store.find_by_order_id(event.order_id).await? else {
            return self.drop_unmatched(event.order_id, topic, &event, true, ctx).await;
        };
        if saga.status.is_terminal() {
            return self.drop_ignored(&saga, topic, &event, ctx).await;
        }

        self.audit(Some(&saga), event.order_id, topic, &event, ProcessingStatus::Processed, ctx)
            .await?;
        self.force_complete(saga, &event.new_status).await
    }

    /// Compensates a non-terminal saga, then removes its row.
    #[tracing::instrument(skip(self, event, ctx), fields(order_id = %event.order_id))]
    pub async fn handle_order_deleted(
        &self,
        event: OrderDeleted,
        ctx: &EventContext,
    ) -> Result<()> {
        let topic = domain::topics::ORDER_DELETED;
        let Some(saga) = self.store.find_by_order_id(event.order_id).await? else {
            return self.drop_unmatched(event.order_id, topic, &event, true, ctx).await;
        };

        self.audit(Some(&saga), event.order_id, topic, &event, ProcessingStatus::Processed, ctx)
            .await?;

        let saga_id = saga.id;
        if !saga.status.is_terminal() {
            tracing::warn!(%saga_id, status = %saga.status, "compensating saga before deletion");
            let reason = event.reason.as_deref().unwrap_or("User requested");
            let mut saga = saga;
            saga.mark_compensating(format!("Order deleted: {reason}"));
            let mut saga = self.store.save(&saga).await?;
            if let Err(e) = self.compensate(&mut saga).await {
                // Deletion proceeds regardless; downstream release commands
                // are best-effort by contract.
                tracing::error!(%saga_id, error = %e, "compensation before deletion failed");
            }
        }

        self.store.delete(saga_id).await?;
        metrics::counter!("saga_deleted_total").increment(1);
        tracing::info!(%saga_id, "saga deleted");
        Ok(())
    }

    /// Sweeps sagas stuck in a processing status past the threshold,
    /// retrying where the budget allows and compensating the rest.
    #[tracing::instrument(skip(self))]
    pub async fn process_stuck_sagas(&self, stuck_threshold: chrono::Duration) -> Result<SweepReport> {
        let cutoff = Utc::now() - stuck_threshold;
        let stuck = self.store.find_stuck(SagaStatus::PROCESSING, cutoff).await?;

        let mut report = SweepReport {
            examined: stuck.len(),
            ..Default::default()
        };

        for saga in stuck {
            tracing::warn!(
                saga_id = %saga.id,
                status = %saga.status,
                updated_at = %saga.updated_at,
                "found stuck saga"
            );
            metrics::counter!("stuck_sagas_total").increment(1);

            let outcome = if saga.can_retry(self.max_retries) {
                report.retried += 1;
                self.retry_current_step(saga).await
            } else {
                report.failed += 1;
                self.handle_saga_failure(saga, "Saga stuck in processing state".to_string())
                    .await
            };

            // One broken row must not starve the rest of the sweep.
            if let Err(e) = outcome {
                tracing::error!(error = %e, "failed to rescue stuck saga");
                report.errors += 1;
            }
        }

        Ok(report)
    }

    /// Hook for cooled-down retries of `FAILED` sagas. Intentionally a
    /// no-op: failed sagas are operator-driven today.
    pub async fn retry_failed_sagas(&self) -> Result<()> {
        tracing::debug!("retry sweep: no eligible failed sagas");
        Ok(())
    }

    /// Refreshes the per-status gauges scraped from `/metrics`.
    pub async fn refresh_status_gauges(&self) -> Result<()> {
        for status in [
            SagaStatus::PaymentProcessing,
            SagaStatus::InventoryProcessing,
            SagaStatus::ShippingProcessing,
            SagaStatus::Completed,
            SagaStatus::Compensating,
            SagaStatus::Compensated,
            SagaStatus::Failed,
        ] {
            let count = self.store.count_by_status(status).await?;
            metrics::gauge!("sagas_by_status", "status" => status.as_str()).set(count as f64);
        }
        Ok(())
    }

    /// Marks the saga compensating and runs the compensation algorithm.
    /// A compensation publish failure parks the saga in `FAILED` for
    /// operator-driven recovery.
    async fn handle_saga_failure(&self, mut saga: SagaRow, error_message: String) -> Result<()> {
        tracing::error!(saga_id = %saga.id, error = %error_message, "saga failed, compensating");

        saga.mark_compensating(error_message);
        let mut saga = self.store.save(&saga).await?;

        if let Err(e) = self.compensate(&mut saga).await {
            tracing::error!(saga_id = %saga.id, error = %e, "compensation failed");
            saga.status = SagaStatus::Failed;
            self.store.save(&saga).await?;
            metrics::counter!("saga_failed_total").increment(1);
        }
        Ok(())
    }

    /// Publishes compensating commands in reverse order of resource
    /// acquisition, then the `order.failed` notification, then marks the
    /// saga compensated. Downstream services own the idempotent handling of
    /// release commands; no completion acks are awaited.
    async fn compensate(&self, saga: &mut SagaRow) -> Result<()> {
        let ctx = EventContext::new(saga.correlation_id.clone());

        if let Some(shipping_id) = &saga.shipping_id {
            self.publisher
                .shipping_cancellation(
                    &domain::ShippingCancellation::new(saga.order_id, shipping_id.clone()),
                    &ctx,
                )
                .await?;
        }
        if let Some(reservation_id) = &saga.inventory_reservation_id {
            self.publisher
                .inventory_release(
                    &domain::InventoryRelease::new(saga.order_id, reservation_id.clone()),
                    &ctx,
                )
                .await?;
        }
        if let Some(payment_id) = &saga.payment_id {
            self.publisher
                .payment_refund(
                    &domain::PaymentRefund::new(saga.order_id, payment_id.clone()),
                    &ctx,
                )
                .await?;
        }

        let reason = saga
            .error_message
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        let failed = OrderFailed::new(saga.order_id, reason, saga.failure_step());
        self.publisher.order_failed(&failed, &ctx).await?;

        saga.status = SagaStatus::Compensated;
        *saga = self.store.save(saga).await?;

        metrics::counter!("saga_compensated_total").increment(1);
        tracing::info!(saga_id = %saga.id, "compensation complete");
        Ok(())
    }

    /// Re-emits the current step's command and consumes one retry attempt.
    async fn retry_current_step(&self, mut saga: SagaRow) -> Result<()> {
        saga.increment_retry();
        let saga = self.store.save(&saga).await?;

        metrics::counter!("saga_retries_total").increment(1);
        tracing::info!(
            saga_id = %saga.id,
            step = %saga.current_step,
            attempt = saga.retry_count,
            "retrying step"
        );

        let ctx = EventContext::new(saga.correlation_id.clone());
        let outcome = match saga.current_step {
            ProcessingStep::Payment => {
                self.publisher
                    .payment_processing(&self.payment_command(&saga), &ctx)
                    .await
            }
            ProcessingStep::Inventory => {
                self.publisher
                    .inventory_reservation(&self.inventory_command(&saga), &ctx)
                    .await
            }
            ProcessingStep::Shipping => {
                self.publisher
                    .shipping_preparation(&self.shipping_command(&saga), &ctx)
                    .await
            }
            ProcessingStep::Completed => {
                tracing::warn!(saga_id = %saga.id, "retry requested for completed step");
                Ok(())
            }
        };

        if let Err(e) = outcome {
            self.handle_saga_failure(saga, format!("Step retry failed: {e}"))
                .await?;
        }
        Ok(())
    }

    async fn force_complete(&self, mut saga: SagaRow, cause: &str) -> Result<()> {
        saga.mark_completed();
        let saga = self.store.save(&saga).await?;

        metrics::counter!("saga_completed_total").increment(1);
        tracing::info!(saga_id = %saga.id, cause, "saga force-completed");
        Ok(())
    }

    /// Commands are rebuilt from stored saga fields so the engine never
    /// calls back to the origin service.
    fn payment_command(&self, saga: &SagaRow) -> PaymentProcessing {
        PaymentProcessing::new(
            saga.order_id,
            saga.customer_id.clone(),
            saga.total_amount,
            saga.currency.clone(),
        )
    }

    fn inventory_command(&self, saga: &SagaRow) -> InventoryReservation {
        let items = saga
            .order_items
            .clone()
            .unwrap_or(serde_json::Value::Array(Vec::new()));
        InventoryReservation::new(saga.order_id, items)
    }

    fn shipping_command(&self, saga: &SagaRow) -> ShippingPreparation {
        ShippingPreparation::new(
            saga.order_id,
            saga.customer_id.clone(),
            saga.shipping_address.clone(),
        )
    }

    /// Tells the originating order service a step completed. Progress
    /// notifications are best-effort; the saga state is already committed.
    async fn notify_progress(&self, saga: &SagaRow, previous: SagaStatus) {
        let ctx = EventContext::new(saga.correlation_id.clone());
        let notification = StatusChangedNotification::new(
            saga.order_id,
            previous.as_str(),
            saga.status.as_str(),
        );
        if let Err(e) = self.publisher.status_changed(&notification, &ctx).await {
            tracing::warn!(saga_id = %saga.id, error = %e, "failed to publish progress notification");
        }
    }

    async fn audit<E: Serialize>(
        &self,
        saga: Option<&SagaRow>,
        order_id: OrderId,
        topic: &str,
        event: &E,
        status: ProcessingStatus,
        ctx: &EventContext,
    ) -> Result<()> {
        let entry = EventLogEntry::new(
            saga.map(|s| s.id),
            Some(order_id),
            topic,
            serde_json::to_value(event)?,
            ctx.correlation_id.clone(),
            status,
        );
        self.store.log_event(&entry).await?;
        Ok(())
    }

    /// Idempotent drop: the event's source step has already been passed, the
    /// saga is terminal, or compensation owns the row. No state change, no
    /// publish.
    async fn drop_ignored<E: Serialize>(
        &self,
        saga: &SagaRow,
        topic: &'static str,
        event: &E,
        ctx: &EventContext,
    ) -> Result<()> {
        tracing::info!(saga_id = %saga.id, status = %saga.status, topic, "event ignored");
        metrics::counter!("events_ignored_total", "topic" => topic).increment(1);
        self.audit(Some(saga), saga.order_id, topic, event, ProcessingStatus::Ignored, ctx)
            .await
    }

    /// Drop for events that reference no saga row. Lifecycle events log at
    /// info (the saga may simply be gone already), step events at warn.
    async fn drop_unmatched<E: Serialize>(
        &self,
        order_id: OrderId,
        topic: &'static str,
        event: &E,
        lifecycle: bool,
        ctx: &EventContext,
    ) -> Result<()> {
        if lifecycle {
            tracing::info!(%order_id, topic, "no saga for order");
        } else {
            tracing::warn!(%order_id, topic, "no saga for order");
        }
        metrics::counter!("events_unmatched_total", "topic" => topic).increment(1);
        self.audit(None, order_id, topic, event, ProcessingStatus::Ignored, ctx)
            .await
    }
}

#[async_trait]
impl<S: SagaStore> EventHandler for SagaCoordinator<S> {
    async fn handle(
        &self,
        event: InboundEvent,
        ctx: &EventContext,
    ) -> std::result::Result<(), HandlerError> {
        let outcome = match event {
            InboundEvent::OrderCreated(e) => self.handle_order_created(e, ctx).await,
            InboundEvent::PaymentProcessed(e) => self.handle_payment_processed(e, ctx).await,
            InboundEvent::PaymentFailed(e) => self.handle_payment_failed(e, ctx).await,
            InboundEvent::InventoryReserved(e) => self.handle_inventory_reserved(e, ctx).await,
            InboundEvent::InventoryFailed(e) => self.handle_inventory_failed(e, ctx).await,
            InboundEvent::ShippingPrepared(e) => self.handle_shipping_prepared(e, ctx).await,
            InboundEvent::ShippingFailed(e) => self.handle_shipping_failed(e, ctx).await,
            InboundEvent::OrderCancelled(e) => self.handle_order_cancelled(e, ctx).await,
            InboundEvent::OrderShipped(e) => {
                self.handle_order_force_completed(e, domain::topics::ORDER_SHIPPED, ctx)
                    .await
            }
            InboundEvent::OrderDelivered(e) => {
                self.handle_order_force_completed(e, domain::topics::ORDER_DELIVERED, ctx)
                    .await
            }
            InboundEvent::OrderStatusChanged(e) => {
                self.handle_order_status_changed(e, ctx).await
            }
            InboundEvent::OrderDeleted(e) => self.handle_order_deleted(e, ctx).await,
        };
        outcome.map_err(CoordinatorError::into_handler_error)
    }
}
