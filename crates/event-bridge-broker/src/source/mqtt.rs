// crates/event-bridge-broker/src/source/mqtt.rs
// ============================================================================
// Module: Event Bridge MQTT Source
// Description: MQTT 3.1.1 subscriber with manual acknowledgments.
// Purpose: Convert publishes into messages and acknowledge them at the QoS layer.
// Dependencies: rumqttc, event-bridge-core, tokio, tracing
// ============================================================================

//! ## Overview
//! [`MqttSource`] connects with manual acknowledgments enabled and subscribes
//! to each topic filter at its own QoS, waiting for every SUBACK before it
//! returns. A background task then drives the MQTT event loop and forwards
//! publishes into a channel bounded by the credit window, so arrival order is
//! preserved across filters.
//! Invariants:
//! - A refused subscription fails `connect`; the source never runs with a
//!   partial subscription set.
//! - A publish is acknowledged only after the loop settles it.
//! - MQTT has no negative acknowledgment; a reject acknowledges and logs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use event_bridge_config::ConfigError;
use event_bridge_config::ConnectionConfig;
use event_bridge_config::MIN_KEEP_ALIVE_SECS;
use event_bridge_config::SourceConfig;
use event_bridge_config::TopicFilter;
use event_bridge_core::CLOUDEVENTS_JSON;
use event_bridge_core::Message;
use event_bridge_core::looks_like_structured_event;
use rumqttc::AsyncClient;
use rumqttc::Event;
use rumqttc::EventLoop;
use rumqttc::MqttOptions;
use rumqttc::Packet;
use rumqttc::Publish;
use rumqttc::QoS;
use rumqttc::SubscribeReasonCode;
use rumqttc::TlsConfiguration;
use rumqttc::Transport as MqttTransport;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::connect;
use crate::connect::ConnectError;
use crate::credit::CreditWindow;
use crate::source::Received;
use crate::source::Source;
use crate::source::SourceError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Protocol label used in connection errors.
const PROTOCOL: &str = "mqtt";

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Session settings for an MQTT source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSettings {
    /// Client identifier.
    pub client_id: String,
    /// Keep-alive interval.
    pub keep_alive: Duration,
    /// Topic filters with their QoS.
    pub topics: Vec<(String, QoS)>,
    /// Unsettled message window.
    pub credit: u32,
}

impl MqttSettings {
    /// Derives settings from the source section and the resolved endpoint.
    ///
    /// With no configured topics the URI path becomes a single QoS 0 filter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when no topic can be determined or a
    /// QoS is out of range.
    pub fn from_config(
        source: &SourceConfig,
        connection: &ConnectionConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: source.client_id.clone(),
            keep_alive: Duration::from_secs(source.keep_alive_secs),
            topics: resolve_topics(&source.topics, connection.endpoint.address())?,
            credit: source.credit,
        })
    }
}

/// Resolves configured filters, falling back to the URI address at QoS 0.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] for an empty result or a bad QoS.
pub fn resolve_topics(
    configured: &[TopicFilter],
    address: &str,
) -> Result<Vec<(String, QoS)>, ConfigError> {
    if configured.is_empty() {
        if address.is_empty() {
            return Err(ConfigError::Invalid(
                "mqtt source needs [[source.topics]] or a topic in the uri path".to_string(),
            ));
        }
        return Ok(vec![(address.to_string(), QoS::AtMostOnce)]);
    }
    configured
        .iter()
        .map(|topic| Ok((topic.filter.clone(), qos_from_level(topic.qos)?)))
        .collect()
}

/// Maps a numeric QoS level.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] for levels above 2.
pub fn qos_from_level(level: u8) -> Result<QoS, ConfigError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(ConfigError::Invalid(format!("qos {other} must be 0, 1, or 2"))),
    }
}

// ============================================================================
// SECTION: MQTT Source
// ============================================================================

/// Item forwarded by the event loop task.
type Incoming = Result<Publish, String>;

/// MQTT subscriber source.
pub struct MqttSource {
    /// Client used for subscribe, ack, and disconnect.
    client: AsyncClient,
    /// Publishes that arrived while subscriptions were being acknowledged.
    early: VecDeque<Publish>,
    /// Publishes forwarded by the event loop task.
    incoming: mpsc::Receiver<Incoming>,
    /// Event loop task.
    task: JoinHandle<()>,
    /// Unsettled message window.
    credit: CreditWindow,
    /// Canonical endpoint for logs.
    endpoint: String,
    /// Whether the source has been closed.
    closed: bool,
}

impl MqttSource {
    /// Connects, subscribes, and waits for the CONNACK and every SUBACK.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Connect`] when the connection is refused or the
    /// broker refuses any subscription.
    pub async fn connect(
        config: &ConnectionConfig,
        settings: &MqttSettings,
    ) -> Result<Self, SourceError> {
        let endpoint = config.canonical();
        let port = config.endpoint.port.unwrap_or(1883);
        let mut options =
            MqttOptions::new(settings.client_id.clone(), config.endpoint.host.clone(), port);
        options.set_keep_alive(settings.keep_alive.max(Duration::from_secs(MIN_KEEP_ALIVE_SECS)));
        options.set_manual_acks(true);
        options.set_clean_session(true);
        if let Some(credentials) = &config.endpoint.credentials {
            options.set_credentials(credentials.username.clone(), credentials.password.clone());
        }
        if config.tls {
            let tls = connect::tls_client_config(config)?;
            options.set_transport(MqttTransport::tls_with_config(TlsConfiguration::Rustls(tls)));
        }

        let capacity = usize::try_from(settings.credit).unwrap_or(usize::MAX).max(1);
        let requests = capacity.max(settings.topics.len());
        let (client, mut eventloop) = AsyncClient::new(options, requests);
        wait_for_connack(&mut eventloop, &endpoint).await?;

        for (filter, qos) in &settings.topics {
            client.subscribe(filter.clone(), *qos).await.map_err(|err| {
                protocol_error(&endpoint, &format!("subscribe {filter}: {err}"))
            })?;
        }
        let early = wait_for_subacks(&mut eventloop, &settings.topics, &endpoint).await?;
        info!(
            endpoint = %endpoint,
            topics = settings.topics.len(),
            credit = settings.credit,
            "mqtt subscriptions acknowledged"
        );

        let (sender, incoming) = mpsc::channel(capacity);
        let task = tokio::spawn(drive_event_loop(eventloop, sender, endpoint.clone()));
        Ok(Self {
            client,
            early,
            incoming,
            task,
            credit: CreditWindow::new(settings.credit),
            endpoint,
            closed: false,
        })
    }

    /// Returns the current credit window.
    #[must_use]
    pub const fn credit(&self) -> CreditWindow {
        self.credit
    }
}

#[async_trait]
impl Source for MqttSource {
    type Handle = Publish;

    async fn receive(&mut self) -> Result<Option<Received<Publish>>, SourceError> {
        if self.closed {
            return Err(SourceError::Closed);
        }
        if self.credit.is_exhausted() {
            return Err(SourceError::CreditExhausted {
                outstanding: self.credit.outstanding(),
                max: self.credit.max(),
            });
        }
        let next = match self.early.pop_front() {
            Some(publish) => Some(Ok(publish)),
            None => self.incoming.recv().await,
        };
        match next {
            None => Ok(None),
            Some(Err(reason)) => Err(SourceError::Receive(reason)),
            Some(Ok(publish)) => {
                self.credit.issue()?;
                let message = message_from_publish(&publish);
                debug!(
                    endpoint = %self.endpoint,
                    topic = message.subject.as_deref().unwrap_or_default(),
                    "mqtt publish received"
                );
                Ok(Some(Received {
                    message,
                    handle: publish,
                }))
            }
        }
    }

    async fn accept(&mut self, handle: Publish) -> Result<(), SourceError> {
        self.credit.settle()?;
        self.client.ack(&handle).await.map_err(|err| SourceError::Acknowledge(err.to_string()))
    }

    async fn reject(&mut self, handle: Publish) -> Result<(), SourceError> {
        warn!(
            endpoint = %self.endpoint,
            "mqtt has no negative acknowledgment; acknowledging rejected publish"
        );
        self.credit.settle()?;
        self.client.ack(&handle).await.map_err(|err| SourceError::Acknowledge(err.to_string()))
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Err(err) = self.client.disconnect().await {
            debug!(endpoint = %self.endpoint, error = %err, "mqtt disconnect request failed");
        }
        self.task.abort();
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Drop for MqttSource {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ============================================================================
// SECTION: Conversion
// ============================================================================

/// Converts an MQTT publish into the bridge message model.
///
/// Payloads that are JSON objects with a `specversion` member are tagged as
/// structured CloudEvents.
#[must_use]
pub fn message_from_publish(publish: &Publish) -> Message {
    let topic = String::from_utf8_lossy(publish.topic.as_ref()).into_owned();
    let payload = publish.payload.to_vec();
    let structured = looks_like_structured_event(&payload);
    let message = Message::binary(payload).with_subject(topic);
    if structured { message.with_content_type(CLOUDEVENTS_JSON) } else { message }
}

// ============================================================================
// SECTION: Event Loop
// ============================================================================

/// Polls until the broker acknowledges the connection.
async fn wait_for_connack(eventloop: &mut EventLoop, endpoint: &str) -> Result<(), SourceError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!(endpoint = %endpoint, "mqtt connection acknowledged");
                return Ok(());
            }
            Ok(_) => {}
            Err(err) => return Err(protocol_error(endpoint, &format!("connect: {err}"))),
        }
    }
}

/// Polls until every subscription is acknowledged, keeping early publishes.
///
/// SUBACKs arrive in subscribe order, so the n-th SUBACK answers the n-th
/// filter.
async fn wait_for_subacks(
    eventloop: &mut EventLoop,
    topics: &[(String, QoS)],
    endpoint: &str,
) -> Result<VecDeque<Publish>, SourceError> {
    let mut early = VecDeque::new();
    let mut acknowledged = 0;
    while acknowledged < topics.len() {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                let filter = topics.get(acknowledged).map_or("", |(filter, _)| filter.as_str());
                if ack.return_codes.iter().any(|code| matches!(code, SubscribeReasonCode::Failure))
                {
                    return Err(protocol_error(
                        endpoint,
                        &format!("broker refused subscription to '{filter}'"),
                    ));
                }
                debug!(endpoint = %endpoint, filter = %filter, "mqtt subscription acknowledged");
                acknowledged += 1;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => early.push_back(publish),
            Ok(_) => {}
            Err(err) => return Err(protocol_error(endpoint, &format!("subscribe: {err}"))),
        }
    }
    Ok(early)
}

/// Drives the event loop and forwards publishes until the receiver is gone.
async fn drive_event_loop(
    mut eventloop: EventLoop,
    sender: mpsc::Sender<Incoming>,
    endpoint: String,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if sender.send(Ok(publish)).await.is_err() {
                    return;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                info!(endpoint = %endpoint, "mqtt broker disconnected");
                return;
            }
            Ok(_) => {}
            Err(err) => {
                let _ = sender.send(Err(err.to_string())).await;
                return;
            }
        }
    }
}

/// Builds a setup failure for this protocol.
fn protocol_error(endpoint: &str, reason: &str) -> SourceError {
    SourceError::Connect(ConnectError::Protocol {
        protocol: PROTOCOL,
        address: endpoint.to_string(),
        reason: reason.to_string(),
    })
}
