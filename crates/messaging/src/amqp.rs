//! AMQP topic-broker variant of the broker adapter, plus the consumer loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind,
};
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;

use crate::adapter::{BrokerAdapter, MessageHeaders};
use crate::context::Disposition;
use crate::error::{MessagingError, Result};
use crate::ingress::{EventIngress, IngressError};

/// Connection settings for the AMQP variant.
#[derive(Debug, Clone)]
pub struct AmqpSettings {
    /// AMQP connection URL.
    pub url: String,
    /// Topic exchange both sides publish to.
    pub exchange: String,
    /// Queue this service consumes from.
    pub queue: String,
    /// Per-channel unacked delivery window.
    pub prefetch: u16,
    /// Upper bound on a single publish.
    pub publish_timeout: Duration,
}

impl AmqpSettings {
    /// Name of the dead-letter exchange derived from the main exchange.
    pub fn dead_letter_exchange(&self) -> String {
        format!("{}.dlx", self.exchange)
    }

    /// Name of the dead-letter queue derived from the consume queue.
    pub fn dead_letter_queue(&self) -> String {
        format!("{}.dlq", self.queue)
    }
}

struct AmqpState {
    connection: Connection,
    channel: Channel,
}

/// AMQP broker adapter backed by lapin.
///
/// `initialize` declares the full topology: the topic exchange, the
/// dead-letter exchange and queue, and the consume queue bound to every
/// consumed routing key.
pub struct AmqpBroker {
    settings: AmqpSettings,
    state: RwLock<Option<AmqpState>>,
}

impl AmqpBroker {
    /// Creates an unconnected adapter; call `initialize` before use.
    pub fn new(settings: AmqpSettings) -> Self {
        Self {
            settings,
            state: RwLock::new(None),
        }
    }

    /// Returns the adapter settings.
    pub fn settings(&self) -> &AmqpSettings {
        &self.settings
    }

    async fn declare_topology(&self, channel: &Channel) -> Result<()> {
        let durable = ExchangeDeclareOptions {
            durable: true,
            ..Default::default()
        };

        channel
            .exchange_declare(
                &self.settings.exchange,
                ExchangeKind::Topic,
                durable,
                FieldTable::default(),
            )
            .await?;

        let dlx = self.settings.dead_letter_exchange();
        let dlq = self.settings.dead_letter_queue();
        channel
            .exchange_declare(&dlx, ExchangeKind::Fanout, durable, FieldTable::default())
            .await?;

        let durable_queue = QueueDeclareOptions {
            durable: true,
            ..Default::default()
        };

        channel
            .queue_declare(&dlq, durable_queue, FieldTable::default())
            .await?;
        channel
            .queue_bind(
                &dlq,
                &dlx,
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        // Rejected deliveries route to the dead-letter exchange.
        let mut queue_args = FieldTable::default();
        queue_args.insert(
            "x-dead-letter-exchange".into(),
            AMQPValue::LongString(dlx.into()),
        );
        channel
            .queue_declare(&self.settings.queue, durable_queue, queue_args)
            .await?;

        for routing_key in domain::topics::CONSUMED {
            channel
                .queue_bind(
                    &self.settings.queue,
                    &self.settings.exchange,
                    routing_key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await?;
        }

        Ok(())
    }

    /// Opens a dedicated channel and consumer for one ingress worker.
    pub async fn create_consumer(&self, consumer_tag: &str) -> Result<Consumer> {
        let state = self.state.read().await;
        let state = state.as_ref().ok_or(MessagingError::NotInitialized)?;

        let channel = state.connection.create_channel().await?;
        channel
            .basic_qos(self.settings.prefetch, BasicQosOptions::default())
            .await?;

        let consumer = channel
            .basic_consume(
                &self.settings.queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(consumer)
    }
}

#[async_trait]
impl BrokerAdapter for AmqpBroker {
    async fn initialize(&self) -> Result<()> {
        let connection =
            Connection::connect(&self.settings.url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        self.declare_topology(&channel).await?;

        tracing::info!(
            exchange = %self.settings.exchange,
            queue = %self.settings.queue,
            "AMQP broker initialized"
        );

        *self.state.write().await = Some(AmqpState {
            connection,
            channel,
        });
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &serde_json::Value,
        headers: &MessageHeaders,
    ) -> Result<()> {
        let payload = serde_json::to_vec(body)?;

        let mut table = FieldTable::default();
        for (name, value) in headers.iter() {
            table.insert(name.into(), AMQPValue::LongString(value.into()));
        }
        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2)
            .with_headers(table);

        let state = self.state.read().await;
        let state = state.as_ref().ok_or(MessagingError::NotInitialized)?;

        let publish = async {
            state
                .channel
                .basic_publish(
                    exchange,
                    routing_key,
                    BasicPublishOptions::default(),
                    &payload,
                    properties,
                )
                .await?
                .await?;
            Ok::<_, MessagingError>(())
        };

        tokio::time::timeout(self.settings.publish_timeout, publish)
            .await
            .map_err(|_| MessagingError::PublishTimeout {
                routing_key: routing_key.to_string(),
            })?
    }

    async fn is_healthy(&self) -> bool {
        let state = self.state.read().await;
        state
            .as_ref()
            .is_some_and(|s| s.connection.status().connected())
    }

    fn provider_name(&self) -> &'static str {
        "amqp"
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(state) = self.state.write().await.take() {
            state.connection.close(200, "shutting down").await?;
        }
        Ok(())
    }
}

/// Spawns `workers` consumer loops feeding deliveries into the ingress.
///
/// Each worker has its own channel created from the shared connection. On a
/// shutdown signal workers stop taking new deliveries; an in-flight handler
/// always runs to completion before its worker exits.
pub async fn run_consumers(
    broker: Arc<AmqpBroker>,
    ingress: Arc<EventIngress>,
    workers: usize,
    shutdown: watch::Receiver<bool>,
) -> Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::with_capacity(workers);

    for worker in 0..workers {
        let consumer = broker
            .create_consumer(&format!("order-processor-{worker}"))
            .await?;
        let ingress = ingress.clone();
        let mut shutdown = shutdown.clone();

        handles.push(tokio::spawn(async move {
            consume_loop(consumer, ingress, &mut shutdown, worker).await;
        }));
    }

    Ok(handles)
}

async fn consume_loop(
    mut consumer: Consumer,
    ingress: Arc<EventIngress>,
    shutdown: &mut watch::Receiver<bool>,
    worker: usize,
) {
    tracing::info!(worker, "ingress worker started");

    loop {
        let delivery = tokio::select! {
            _ = shutdown.changed() => break,
            delivery = consumer.next() => delivery,
        };

        match delivery {
            Some(Ok(delivery)) => settle(&ingress, delivery).await,
            Some(Err(e)) => {
                tracing::error!(worker, error = %e, "consumer stream error");
                metrics::counter!("ingress_stream_errors_total").increment(1);
            }
            None => {
                tracing::warn!(worker, "consumer stream closed");
                break;
            }
        }
    }

    tracing::info!(worker, "ingress worker stopped");
}

async fn settle(ingress: &EventIngress, delivery: Delivery) {
    let routing_key = delivery.routing_key.as_str().to_string();
    let headers = headers_from_properties(&delivery);

    let outcome = ingress.process(&routing_key, &delivery.data, &headers).await;

    let result = match outcome {
        Ok(()) => delivery.ack(BasicAckOptions::default()).await,
        Err(IngressError::Decode(e)) => {
            tracing::error!(%routing_key, error = %e, "dead-lettering undecodable delivery");
            delivery
                .nack(BasicNackOptions {
                    requeue: false,
                    ..Default::default()
                })
                .await
        }
        Err(IngressError::Handler(e)) => {
            let requeue = e.disposition == Disposition::Redeliver;
            tracing::warn!(%routing_key, requeue, error = %e, "handler failed");
            delivery
                .nack(BasicNackOptions {
                    requeue,
                    ..Default::default()
                })
                .await
        }
    };

    if let Err(e) = result {
        tracing::error!(%routing_key, error = %e, "failed to settle delivery");
    }
}

fn headers_from_properties(delivery: &Delivery) -> MessageHeaders {
    let mut headers = MessageHeaders::new();
    if let Some(table) = delivery.properties.headers() {
        for (name, value) in table.inner() {
            if let AMQPValue::LongString(s) = value {
                headers.set(
                    name.as_str(),
                    String::from_utf8_lossy(s.as_bytes()).into_owned(),
                );
            }
        }
    }
    headers
}
