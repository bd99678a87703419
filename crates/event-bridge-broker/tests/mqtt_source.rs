// crates/event-bridge-broker/tests/mqtt_source.rs
// ============================================================================
// Module: MQTT Source Tests
// Description: Publish conversion, topic resolution, and broker sessions.
// Purpose: Validate the MQTT mapping and session against a scripted broker.
// Dependencies: event-bridge-broker, event-bridge-config, rumqttc, tokio, tiny_http
// ============================================================================

//! ## Overview
//! Exercises the MQTT helpers in [`event_bridge_broker::source::mqtt`] and
//! runs [`MqttSource`] against an in-process broker that speaks just enough
//! MQTT 3.1.1 to accept a session, answer subscriptions, publish a scripted
//! sequence at QoS 1, and record the acknowledgments it gets back.

#![allow(dead_code, reason = "Common module may have unused helpers.")]
#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::io;
use std::time::Duration;

use event_bridge_broker::Bridge;
use event_bridge_broker::BridgeError;
use event_bridge_broker::ErrorKind;
use event_bridge_broker::HttpSink;
use event_bridge_broker::MqttSettings;
use event_bridge_broker::MqttSource;
use event_bridge_broker::Source;
use event_bridge_broker::SourceError;
use event_bridge_broker::source::mqtt::message_from_publish;
use event_bridge_broker::source::mqtt::qos_from_level;
use event_bridge_broker::source::mqtt::resolve_topics;
use event_bridge_config::ConfigError;
use event_bridge_config::ConnectionConfig;
use event_bridge_config::FailurePolicy;
use event_bridge_config::SourceConfig;
use event_bridge_config::TopicFilter;
use event_bridge_core::Body;
use event_bridge_core::MessageId;
use event_bridge_core::Translator;
use rumqttc::Publish;
use rumqttc::QoS;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::common::RecordingServer;

// ============================================================================
// SECTION: Conversion
// ============================================================================

/// Tests a raw payload becomes a binary message with the topic as subject.
#[test]
fn publish_maps_to_binary_message() {
    let publish = Publish::new("sensors/temp", QoS::AtLeastOnce, b"21.5".to_vec());

    let message = message_from_publish(&publish);

    assert_eq!(message.body, Body::Binary(b"21.5".to_vec()));
    assert_eq!(message.subject.as_deref(), Some("sensors/temp"));
    assert_eq!(message.id, MessageId::None);
    assert!(message.content_type.is_none());
}

/// Tests a CloudEvents JSON payload is forwarded in structured mode.
#[test]
fn structured_payload_is_detected() {
    let payload = br#"{"specversion":"1.0","id":"e-1","type":"t","source":"/s"}"#.to_vec();
    let publish = Publish::new("events", QoS::AtMostOnce, payload.clone());

    let message = message_from_publish(&publish);
    assert_eq!(message.content_type.as_deref(), Some("application/cloudevents+json"));

    let request = Translator::new("mqtt.message.delivery", "mqtt://broker:1883/events")
        .translate(&message)
        .expect("translate");
    assert_eq!(request.body, payload);
    assert!(request.headers.is_empty());
}

/// Tests plain JSON without `specversion` stays in binary mode.
#[test]
fn plain_json_payload_stays_binary() {
    let publish = Publish::new("events", QoS::AtMostOnce, br#"{"temp":21}"#.to_vec());
    let message = message_from_publish(&publish);
    assert!(message.content_type.is_none());

    let request = Translator::new("mqtt.message.delivery", "mqtt://broker:1883/events")
        .translate(&message)
        .expect("translate");
    assert_eq!(request.header("ce-id"), Some(""));
    assert_eq!(request.header("ce-subject"), Some("events"));
    assert_eq!(request.content_type, "application/octet-stream");
}

// ============================================================================
// SECTION: Topics And Settings
// ============================================================================

/// Tests configured filters keep their QoS and order.
#[test]
fn configured_topics_are_resolved_in_order() {
    let configured = vec![
        TopicFilter {
            filter: "a/#".to_string(),
            qos: 2,
        },
        TopicFilter {
            filter: "b/+".to_string(),
            qos: 0,
        },
    ];
    let topics = resolve_topics(&configured, "ignored").expect("topics");
    assert_eq!(
        topics,
        vec![("a/#".to_string(), QoS::ExactlyOnce), ("b/+".to_string(), QoS::AtMostOnce)]
    );
}

/// Tests the URI path is used when no filters are configured.
#[test]
fn uri_address_is_the_fallback_topic() {
    let topics = resolve_topics(&[], "sensors/#").expect("topics");
    assert_eq!(topics, vec![("sensors/#".to_string(), QoS::AtMostOnce)]);
    assert!(matches!(resolve_topics(&[], ""), Err(ConfigError::Invalid(_))));
}

/// Tests QoS level mapping.
#[test]
fn qos_levels_map() {
    assert_eq!(qos_from_level(0).unwrap(), QoS::AtMostOnce);
    assert_eq!(qos_from_level(1).unwrap(), QoS::AtLeastOnce);
    assert_eq!(qos_from_level(2).unwrap(), QoS::ExactlyOnce);
    assert!(qos_from_level(3).is_err());
}

/// Tests settings are derived from the source section and endpoint.
#[test]
fn settings_follow_source_config() {
    let mut source = SourceConfig::new("mqtt://broker.example/plant/line-1");
    source.credit = 4;
    source.client_id = "bridge-7".to_string();
    source.keep_alive_secs = 45;
    let connection = ConnectionConfig::merge(&source.uri, None).expect("connection");

    let settings = MqttSettings::from_config(&source, &connection).expect("settings");

    assert_eq!(settings.client_id, "bridge-7");
    assert_eq!(settings.keep_alive, Duration::from_secs(45));
    assert_eq!(settings.credit, 4);
    assert_eq!(settings.topics, vec![("plant/line-1".to_string(), QoS::AtMostOnce)]);
    assert_eq!(connection.endpoint.port, Some(1883));
}

// ============================================================================
// SECTION: Connect Failures
// ============================================================================

/// Tests a refused connection surfaces as a connection error.
#[tokio::test]
async fn connect_failure_is_a_connection_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    let connection =
        ConnectionConfig::merge(&format!("mqtt://127.0.0.1:{port}/t"), None).expect("connection");
    let settings = MqttSettings {
        client_id: "bridge-test".to_string(),
        keep_alive: Duration::from_secs(5),
        topics: vec![("t".to_string(), QoS::AtMostOnce)],
        credit: 1,
    };

    let Err(err) = MqttSource::connect(&connection, &settings).await else {
        panic!("connect to a closed port should fail");
    };
    assert_eq!(BridgeError::from(err).kind(), ErrorKind::Connection);
}

// ============================================================================
// SECTION: Scripted Broker
// ============================================================================

/// Upper bound for any single step against the scripted broker.
const STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// MQTT control packet types used by the scripted broker.
const CONNECT: u8 = 1;
/// PUBACK packet type.
const PUBACK: u8 = 4;
/// SUBSCRIBE packet type.
const SUBSCRIBE: u8 = 8;
/// PINGREQ packet type.
const PINGREQ: u8 = 12;
/// DISCONNECT packet type.
const DISCONNECT: u8 = 14;

/// SUBACK return code for a refused filter.
const SUBACK_FAILURE: u8 = 0x80;

/// What the scripted broker does after CONNACK.
struct BrokerScript {
    /// Index of the subscription to refuse, if any.
    refuse: Option<usize>,
    /// Number of SUBSCRIBE packets to expect.
    subscriptions: usize,
    /// Publishes sent at QoS 1 once every subscription is answered.
    publishes: Vec<(&'static str, &'static [u8])>,
}

/// What the scripted broker observed.
#[derive(Debug, Default)]
struct BrokerLog {
    /// Filters in the order they were subscribed.
    subscribed: Vec<String>,
    /// Packet ids acknowledged by the client.
    pubacks: Vec<u16>,
}

/// In-process broker accepting a single client session.
struct ScriptedBroker {
    /// Connection URI for the source.
    uri: String,
    /// Broker task returning its log.
    task: JoinHandle<io::Result<BrokerLog>>,
}

impl ScriptedBroker {
    /// Binds a local listener and runs `script` for the first client.
    async fn start(script: BrokerScript) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind broker");
        let port = listener.local_addr().expect("broker addr").port();
        let task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await?;
            serve_session(stream, script).await
        });
        Self {
            uri: format!("mqtt://127.0.0.1:{port}/plant"),
            task,
        }
    }

    /// Waits for the session to end and returns what the broker saw.
    async fn finish(self) -> BrokerLog {
        timeout(STEP_TIMEOUT, self.task)
            .await
            .expect("broker finished in time")
            .expect("broker task")
            .expect("broker session")
    }
}

/// Runs one client session, then closes the socket.
async fn serve_session(mut stream: TcpStream, script: BrokerScript) -> io::Result<BrokerLog> {
    let mut log = BrokerLog::default();
    let (kind, _) = read_packet(&mut stream).await?;
    assert_eq!(kind, CONNECT, "first packet must be CONNECT");
    stream.write_all(&[0x20, 0x02, 0x00, 0x00]).await?;

    while log.subscribed.len() < script.subscriptions {
        let (kind, body) = read_packet(&mut stream).await?;
        match kind {
            SUBSCRIBE => {
                let pkid = [body[0], body[1]];
                let length = usize::from(u16::from_be_bytes([body[2], body[3]]));
                let filter = String::from_utf8(body[4 .. 4 + length].to_vec()).expect("filter");
                let granted = body[4 + length];
                let refused = script.refuse == Some(log.subscribed.len());
                log.subscribed.push(filter);
                let code = if refused { SUBACK_FAILURE } else { granted };
                stream.write_all(&[0x90, 0x03, pkid[0], pkid[1], code]).await?;
                if refused {
                    return Ok(log);
                }
            }
            PINGREQ => stream.write_all(&[0xD0, 0x00]).await?,
            other => panic!("unexpected packet type {other} while subscribing"),
        }
    }

    for (pkid, (topic, payload)) in (1_u16 ..).zip(&script.publishes) {
        let mut body = Vec::new();
        body.extend_from_slice(&u16::try_from(topic.len()).expect("topic length").to_be_bytes());
        body.extend_from_slice(topic.as_bytes());
        body.extend_from_slice(&pkid.to_be_bytes());
        body.extend_from_slice(payload);
        write_packet(&mut stream, 0x32, &body).await?;
    }

    while log.pubacks.len() < script.publishes.len() {
        let (kind, body) = read_packet(&mut stream).await?;
        match kind {
            PUBACK => log.pubacks.push(u16::from_be_bytes([body[0], body[1]])),
            PINGREQ => stream.write_all(&[0xD0, 0x00]).await?,
            DISCONNECT => break,
            other => panic!("unexpected packet type {other} while publishing"),
        }
    }
    stream.shutdown().await?;
    Ok(log)
}

/// Reads one packet and returns its type and variable header plus payload.
async fn read_packet(stream: &mut TcpStream) -> io::Result<(u8, Vec<u8>)> {
    let header = stream.read_u8().await?;
    let mut length = 0_usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await?;
        length |= usize::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    let mut body = vec![0; length];
    stream.read_exact(&mut body).await?;
    Ok((header >> 4, body))
}

/// Writes one packet with the given fixed header byte.
async fn write_packet(stream: &mut TcpStream, header: u8, body: &[u8]) -> io::Result<()> {
    let mut frame = vec![header];
    let mut remaining = body.len();
    loop {
        let mut byte = u8::try_from(remaining % 128).expect("length digit");
        remaining /= 128;
        if remaining > 0 {
            byte |= 0x80;
        }
        frame.push(byte);
        if remaining == 0 {
            break;
        }
    }
    frame.extend_from_slice(body);
    stream.write_all(&frame).await
}

/// Settings subscribing to `plant/a` and `plant/b` at QoS 1.
fn two_filter_settings(credit: u32) -> MqttSettings {
    MqttSettings {
        client_id: "bridge-test".to_string(),
        keep_alive: Duration::from_secs(30),
        topics: vec![
            ("plant/a".to_string(), QoS::AtLeastOnce),
            ("plant/b".to_string(), QoS::AtLeastOnce),
        ],
        credit,
    }
}

// ============================================================================
// SECTION: Broker Sessions
// ============================================================================

/// Tests publishes arrive in broker order across filters and every
/// settlement, accept or reject, is answered with a PUBACK.
#[tokio::test]
async fn publishes_arrive_in_order_and_are_acknowledged() {
    let broker = ScriptedBroker::start(BrokerScript {
        refuse: None,
        subscriptions: 2,
        publishes: vec![
            ("plant/a", b"first".as_slice()),
            ("plant/b", b"second".as_slice()),
            ("plant/a", b"third".as_slice()),
        ],
    })
    .await;
    let connection = ConnectionConfig::merge(&broker.uri, None).expect("connection");
    let mut source = timeout(STEP_TIMEOUT, MqttSource::connect(&connection, &two_filter_settings(3)))
        .await
        .expect("connect in time")
        .expect("connect");

    let mut received = Vec::new();
    for _ in 0 .. 3 {
        let next = timeout(STEP_TIMEOUT, source.receive()).await.expect("receive in time");
        received.push(next.expect("receive").expect("publish"));
    }
    assert_eq!(source.credit().outstanding(), 3);
    let seen: Vec<_> = received
        .iter()
        .map(|item| (item.message.subject.clone().unwrap_or_default(), item.message.body.clone()))
        .collect();
    assert_eq!(
        seen,
        vec![
            ("plant/a".to_string(), Body::Binary(b"first".to_vec())),
            ("plant/b".to_string(), Body::Binary(b"second".to_vec())),
            ("plant/a".to_string(), Body::Binary(b"third".to_vec())),
        ]
    );

    let mut handles = received.into_iter().map(|item| item.handle);
    source.accept(handles.next().expect("first")).await.expect("accept");
    source.reject(handles.next().expect("second")).await.expect("reject");
    source.accept(handles.next().expect("third")).await.expect("accept");
    assert_eq!(source.credit().outstanding(), 0);

    let log = broker.finish().await;
    assert_eq!(log.subscribed, vec!["plant/a".to_string(), "plant/b".to_string()]);
    assert_eq!(log.pubacks, vec![1, 2, 3]);

    let after_close = timeout(STEP_TIMEOUT, source.receive()).await.expect("receive in time");
    assert!(
        matches!(after_close, Err(SourceError::Receive(_))),
        "broker hang-up should surface as a receive error: {after_close:?}"
    );
}

/// Tests a refused subscription fails the connect instead of idling.
#[tokio::test]
async fn refused_subscription_fails_connect() {
    let broker = ScriptedBroker::start(BrokerScript {
        refuse: Some(1),
        subscriptions: 2,
        publishes: Vec::new(),
    })
    .await;
    let connection = ConnectionConfig::merge(&broker.uri, None).expect("connection");

    let result =
        timeout(STEP_TIMEOUT, MqttSource::connect(&connection, &two_filter_settings(1)))
            .await
            .expect("connect resolves in time");
    let Err(err) = result else {
        panic!("a refused subscription should fail connect");
    };
    assert!(err.to_string().contains("plant/b"), "error names the filter: {err}");
    assert_eq!(BridgeError::from(err).kind(), ErrorKind::Connection);

    let log = broker.finish().await;
    assert_eq!(log.subscribed, vec!["plant/a".to_string(), "plant/b".to_string()]);
}

/// Tests a bridge over an MQTT session delivers in order, acknowledges a
/// failed delivery too, and stops with a receive error when the broker
/// hangs up.
#[tokio::test]
async fn bridge_forwards_mqtt_publishes_until_broker_hangs_up() {
    let server = RecordingServer::start(vec![200, 500]);
    let broker = ScriptedBroker::start(BrokerScript {
        refuse: None,
        subscriptions: 2,
        publishes: vec![("plant/b", b"one".as_slice()), ("plant/a", b"two".as_slice())],
    })
    .await;
    let connection = ConnectionConfig::merge(&broker.uri, None).expect("connection");
    let source = timeout(STEP_TIMEOUT, MqttSource::connect(&connection, &two_filter_settings(1)))
        .await
        .expect("connect in time")
        .expect("connect");
    let translator = Translator::new("mqtt.message.delivery", connection.canonical());
    let sink = HttpSink::new(&server.url).expect("sink");

    let err = timeout(
        STEP_TIMEOUT,
        Bridge::new(source, translator, sink, FailurePolicy::default()).run(),
    )
    .await
    .expect("bridge stops in time")
    .expect_err("broker hang-up ends the run");

    assert_eq!(err.kind(), ErrorKind::Receive);
    let requests = server.finish();
    let delivered: Vec<_> = requests
        .iter()
        .map(|request| (request.header("ce-subject").map(str::to_string), request.body.clone()))
        .collect();
    assert_eq!(
        delivered,
        vec![
            (Some("plant/b".to_string()), b"one".to_vec()),
            (Some("plant/a".to_string()), b"two".to_vec()),
        ]
    );
    assert_eq!(broker.finish().await.pubacks, vec![1, 2]);
}
