// crates/event-bridge-broker/src/source/amqp.rs
// ============================================================================
// Module: Event Bridge AMQP Source
// Description: AMQP 1.0 receiving link in client or server role.
// Purpose: Convert AMQP transfers into messages and settle them.
// Dependencies: fe2o3-amqp, event-bridge-core, time, tracing
// ============================================================================

//! ## Overview
//! [`AmqpSource`] owns one connection, one session and one receiving link.
//! [`AmqpSource::client`] dials the broker; [`AmqpSource::server`] waits for
//! a peer to connect and attach a sending link. Both use auto-replenished
//! link credit equal to the configured window and share the same contract.
//! Invariants:
//! - Each delivery is settled with `accepted` or `rejected`, exactly once.
//! - A clean remote detach or close is reported as end of stream.
//!
//! Security posture: credentials are sent only through SASL PLAIN and never
//! logged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use event_bridge_config::ConnectionConfig;
use event_bridge_config::DEFAULT_CONTAINER_ID;
use event_bridge_config::SourceConfig;
use event_bridge_core::Body as MessageBody;
use event_bridge_core::Message;
use event_bridge_core::MessageId;
use fe2o3_amqp::Connection;
use fe2o3_amqp::Delivery;
use fe2o3_amqp::Receiver;
use fe2o3_amqp::Session;
use fe2o3_amqp::acceptor::ConnectionAcceptor;
use fe2o3_amqp::acceptor::LinkAcceptor;
use fe2o3_amqp::acceptor::LinkEndpoint;
use fe2o3_amqp::acceptor::ListenerConnectionHandle;
use fe2o3_amqp::acceptor::ListenerSessionHandle;
use fe2o3_amqp::acceptor::SessionAcceptor;
use fe2o3_amqp::connection::ConnectionHandle;
use fe2o3_amqp::link::LinkStateError;
use fe2o3_amqp::link::RecvError;
use fe2o3_amqp::link::receiver::CreditMode;
use fe2o3_amqp::sasl_profile::SaslProfile;
use fe2o3_amqp::session::SessionHandle;
use fe2o3_amqp::types::definitions::Error as AmqpError;
use fe2o3_amqp::types::messaging::Body;
use fe2o3_amqp::types::messaging::Message as AmqpMessage;
use fe2o3_amqp::types::messaging::MessageId as AmqpMessageId;
use fe2o3_amqp::types::primitives::SimpleValue;
use fe2o3_amqp::types::primitives::Value;
use time::OffsetDateTime;
use tokio::net::TcpListener;
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
const PROTOCOL: &str = "amqp";

// ============================================================================
// SECTION: Options
// ============================================================================

/// Link settings shared by both roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmqpOptions {
    /// Link credit and unsettled window.
    pub credit: u32,
    /// AMQP container identifier.
    pub container_id: String,
}

impl AmqpOptions {
    /// Options with the default container id.
    #[must_use]
    pub fn new(credit: u32) -> Self {
        Self {
            credit,
            container_id: DEFAULT_CONTAINER_ID.to_string(),
        }
    }

    /// Options taken from the source section: credit and container id.
    #[must_use]
    pub fn from_config(source: &SourceConfig) -> Self {
        Self::new(source.credit).with_container_id(source.container_id.clone())
    }

    /// Replaces the container identifier.
    #[must_use]
    pub fn with_container_id(mut self, container_id: impl Into<String>) -> Self {
        self.container_id = container_id.into();
        self
    }
}

// ============================================================================
// SECTION: Endpoints
// ============================================================================

/// Connection and session handles for either role.
enum AmqpEndpoints {
    /// We dialed the broker.
    Client {
        /// Connection handle.
        connection: ConnectionHandle<()>,
        /// Session handle.
        session: SessionHandle<()>,
    },
    /// The peer dialed us.
    Server {
        /// Connection handle.
        connection: ListenerConnectionHandle,
        /// Session handle.
        session: ListenerSessionHandle,
    },
}

impl AmqpEndpoints {
    /// Ends the session and closes the connection.
    async fn close(&mut self) -> Result<(), String> {
        match self {
            Self::Client {
                connection,
                session,
            } => {
                session.end().await.map_err(|err| err.to_string())?;
                connection.close().await.map_err(|err| err.to_string())
            }
            Self::Server {
                connection,
                session,
            } => {
                session.end().await.map_err(|err| err.to_string())?;
                connection.close().await.map_err(|err| err.to_string())
            }
        }
    }
}

// ============================================================================
// SECTION: AMQP Source
// ============================================================================

/// AMQP 1.0 receiving link.
pub struct AmqpSource {
    /// Receiving link; `None` once closed.
    receiver: Option<Receiver>,
    /// Connection and session owning the link.
    endpoints: AmqpEndpoints,
    /// Unsettled message window.
    credit: CreditWindow,
    /// Canonical endpoint for logs.
    endpoint: String,
}

impl AmqpSource {
    /// Dials the broker and attaches a receiving link to the URI address.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Connect`] when any setup step fails.
    pub async fn client(
        config: &ConnectionConfig,
        options: &AmqpOptions,
    ) -> Result<Self, SourceError> {
        let endpoint = config.canonical();
        let address = config.endpoint.address().to_string();
        let stream = connect::dial(config).await?;

        let profile = match &config.endpoint.credentials {
            Some(credentials) => SaslProfile::Plain {
                username: credentials.username.clone(),
                password: credentials.password.clone(),
            },
            None => SaslProfile::Anonymous,
        };
        let mut connection = Connection::builder()
            .container_id(options.container_id.clone())
            .hostname(config.endpoint.host.as_str())
            .sasl_profile(profile)
            .open_with_stream(stream)
            .await
            .map_err(|err| protocol_error(&endpoint, "open", &err.to_string()))?;
        let mut session = Session::begin(&mut connection)
            .await
            .map_err(|err| protocol_error(&endpoint, "begin", &err.to_string()))?;
        let receiver = Receiver::builder()
            .name(format!("{}-receiver", options.container_id))
            .source(address.clone())
            .credit_mode(CreditMode::Auto(options.credit))
            .attach(&mut session)
            .await
            .map_err(|err| protocol_error(&endpoint, "attach", &err.to_string()))?;
        info!(
            endpoint = %endpoint,
            address = %address,
            credit = options.credit,
            "amqp receiver attached"
        );
        Ok(Self {
            receiver: Some(receiver),
            endpoints: AmqpEndpoints::Client {
                connection,
                session,
            },
            credit: CreditWindow::new(options.credit),
            endpoint,
        })
    }

    /// Accepts one inbound connection and the peer's sending link.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Connect`] when the handshake fails or the peer
    /// attaches a receiving link instead of a sending one.
    pub async fn server(
        listener: &TcpListener,
        options: &AmqpOptions,
    ) -> Result<Self, SourceError> {
        let endpoint = listener
            .local_addr()
            .map_or_else(|_| "amqp://<unbound>".to_string(), |addr| format!("amqp://{addr}"));
        let stream = connect::accept_one(listener).await?;

        let acceptor = ConnectionAcceptor::new(options.container_id.clone());
        let mut connection = acceptor
            .accept(stream)
            .await
            .map_err(|err| protocol_error(&endpoint, "open", &err.to_string()))?;
        let mut session = SessionAcceptor::new()
            .accept(&mut connection)
            .await
            .map_err(|err| protocol_error(&endpoint, "begin", &err.to_string()))?;
        let link = LinkAcceptor::builder()
            .credit_mode(CreditMode::Auto(options.credit))
            .build()
            .accept(&mut session)
            .await
            .map_err(|err| protocol_error(&endpoint, "attach", &err.to_string()))?;
        let LinkEndpoint::Receiver(receiver) = link else {
            return Err(protocol_error(&endpoint, "attach", "peer attached a receiving link"));
        };
        info!(endpoint = %endpoint, credit = options.credit, "amqp peer link accepted");
        Ok(Self {
            receiver: Some(receiver),
            endpoints: AmqpEndpoints::Server {
                connection,
                session,
            },
            credit: CreditWindow::new(options.credit),
            endpoint,
        })
    }

    /// Returns the current credit window.
    #[must_use]
    pub const fn credit(&self) -> CreditWindow {
        self.credit
    }

    /// Returns the open receiving link.
    fn link(&mut self) -> Result<&mut Receiver, SourceError> {
        self.receiver.as_mut().ok_or(SourceError::Closed)
    }
}

#[async_trait]
impl Source for AmqpSource {
    type Handle = Delivery<Body<Value>>;

    async fn receive(&mut self) -> Result<Option<Received<Self::Handle>>, SourceError> {
        if self.credit.is_exhausted() {
            return Err(SourceError::CreditExhausted {
                outstanding: self.credit.outstanding(),
                max: self.credit.max(),
            });
        }
        let delivery = match self.link()?.recv::<Body<Value>>().await {
            Ok(delivery) => delivery,
            Err(err) if is_remote_close(&err) => {
                info!(endpoint = %self.endpoint, "amqp peer closed the link");
                return Ok(None);
            }
            Err(err) => return Err(SourceError::Receive(err.to_string())),
        };
        self.credit.issue()?;
        let message = message_from_amqp(delivery.message());
        debug!(endpoint = %self.endpoint, body = message.body.kind(), "amqp delivery received");
        Ok(Some(Received {
            message,
            handle: delivery,
        }))
    }

    async fn accept(&mut self, handle: Self::Handle) -> Result<(), SourceError> {
        self.credit.settle()?;
        self.link()?
            .accept(&handle)
            .await
            .map_err(|err| SourceError::Acknowledge(err.to_string()))
    }

    async fn reject(&mut self, handle: Self::Handle) -> Result<(), SourceError> {
        self.credit.settle()?;
        self.link()?
            .reject(&handle, Option::<AmqpError>::None)
            .await
            .map_err(|err| SourceError::Acknowledge(err.to_string()))
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        let Some(receiver) = self.receiver.take() else {
            return Ok(());
        };
        if let Err(err) = receiver.close().await {
            warn!(endpoint = %self.endpoint, error = %err, "amqp link close failed");
        }
        self.endpoints.close().await.map_err(SourceError::Receive)
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

// ============================================================================
// SECTION: Conversion
// ============================================================================

/// Converts an AMQP message into the bridge message model.
#[must_use]
pub fn message_from_amqp(message: &AmqpMessage<Body<Value>>) -> Message {
    let mut converted = Message::new(body_from_amqp(&message.body));
    if let Some(properties) = &message.properties {
        if let Some(id) = &properties.message_id {
            converted.id = message_id_from_amqp(id);
        }
        if let Some(content_type) = &properties.content_type {
            converted.content_type = Some(content_type.0.clone());
        }
        if let Some(subject) = &properties.subject {
            converted.subject = Some(subject.clone());
        }
        if let Some(created) = &properties.creation_time {
            let nanos = i128::from(created.milliseconds()) * 1_000_000;
            converted.creation_time = OffsetDateTime::from_unix_timestamp_nanos(nanos).ok();
        }
    }
    if let Some(application) = &message.application_properties {
        for (key, value) in application.0.iter() {
            if let Some(text) = simple_value_text(value) {
                converted.headers.insert(key.clone(), text);
            }
        }
    }
    converted
}

/// Maps the AMQP body sections onto [`MessageBody`].
fn body_from_amqp(body: &Body<Value>) -> MessageBody {
    match body {
        Body::Value(value) => match &value.0 {
            Value::String(text) => MessageBody::Text(text.clone()),
            Value::Binary(bytes) => MessageBody::Binary(bytes.to_vec()),
            other => MessageBody::Unsupported(format!("amqp-value:{}", value_kind(other))),
        },
        Body::Data(sections) => {
            let mut bytes = Vec::new();
            for section in sections.iter() {
                bytes.extend_from_slice(&section.0);
            }
            MessageBody::Binary(bytes)
        }
        Body::Sequence(_) => MessageBody::Unsupported("amqp-sequence".to_string()),
        Body::Empty => MessageBody::Unsupported("empty".to_string()),
    }
}

/// Maps an AMQP message id onto [`MessageId`].
fn message_id_from_amqp(id: &AmqpMessageId) -> MessageId {
    match id {
        AmqpMessageId::String(text) => MessageId::String(text.clone()),
        AmqpMessageId::Ulong(value) => MessageId::Ulong(*value),
        AmqpMessageId::Uuid(uuid) => MessageId::Uuid(uuid.clone().into_inner()),
        AmqpMessageId::Binary(bytes) => MessageId::Binary(bytes.to_vec()),
    }
}

/// Renders scalar application properties as header text.
fn simple_value_text(value: &SimpleValue) -> Option<String> {
    match value {
        SimpleValue::String(text) => Some(text.clone()),
        SimpleValue::Symbol(symbol) => Some(symbol.0.clone()),
        SimpleValue::Bool(flag) => Some(flag.to_string()),
        SimpleValue::Ubyte(number) => Some(number.to_string()),
        SimpleValue::Ushort(number) => Some(number.to_string()),
        SimpleValue::Uint(number) => Some(number.to_string()),
        SimpleValue::Ulong(number) => Some(number.to_string()),
        SimpleValue::Byte(number) => Some(number.to_string()),
        SimpleValue::Short(number) => Some(number.to_string()),
        SimpleValue::Int(number) => Some(number.to_string()),
        SimpleValue::Long(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Short name of an `amqp-value` type for diagnostics.
const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Symbol(_) => "symbol",
        Value::List(_) => "list",
        Value::Map(_) => "map",
        Value::Array(_) => "array",
        _ => "scalar",
    }
}

/// Returns true when the peer detached or closed without an error.
const fn is_remote_close(err: &RecvError) -> bool {
    matches!(
        err,
        RecvError::LinkStateError(LinkStateError::RemoteDetached | LinkStateError::RemoteClosed)
    )
}

/// Builds a setup failure for this protocol.
fn protocol_error(endpoint: &str, step: &str, reason: &str) -> SourceError {
    SourceError::Connect(ConnectError::Protocol {
        protocol: PROTOCOL,
        address: endpoint.to_string(),
        reason: format!("{step}: {reason}"),
    })
}
