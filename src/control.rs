//! The MQTT control channel.
//!
//! The printer's broker is event-driven: connection results, publish
//! acknowledgments, and report messages all arrive from the network loop.
//! This module bridges that into call/response semantics - each public
//! operation opens a private single-use session, blocks on channel
//! receives bounded by a deadline while a pump task drives the protocol,
//! and tears the session down on every exit path.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::mqttbytes::v4::{ConnAck, ConnectReturnCode, Packet};
use rumqttc::mqttbytes::QoS;
use rumqttc::{AsyncClient, Event, MqttOptions, TlsConfiguration, Transport};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};

use crate::ams::{ams_units, AmsStatusResult, AmsUnit};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::message::parse_report;
use crate::no_auth::NoAuth;
use crate::profile::ConnectionProfile;

const MQTT_PORT: u16 = 8883;
const MQTT_USER: &str = "bblp";
const KEEP_ALIVE: Duration = Duration::from_secs(60);
const MAX_PACKET_SIZE: usize = 1024 * 1024;

/// The default bound on every control-channel wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of a fire-and-forget control command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResult {
    /// Whether the printer's broker acknowledged the command.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Error detail. Always `None` today: command failures raise instead
    /// of returning a failed result.
    pub error: Option<String>,
}

/// Everything the pump task forwards to the calling task.
type SessionEvent = std::result::Result<Event, rumqttc::ConnectionError>;

/// The MQTT control channel for one printer.
///
/// Holds only the profile and the wait budget. Every operation opens a
/// fresh client identity and session (connect, act, disconnect); sessions
/// are never reused or kept warm, so two calls can never consume each
/// other's traffic.
#[derive(Debug, Clone)]
pub struct ControlChannel {
    profile: ConnectionProfile,
    timeout: Duration,
}

impl ControlChannel {
    /// Create a control channel with the default wait budget.
    pub fn new(profile: ConnectionProfile) -> Self {
        Self::with_timeout(profile, DEFAULT_TIMEOUT)
    }

    /// Create a control channel with an explicit wait budget.
    pub fn with_timeout(profile: ConnectionProfile, timeout: Duration) -> Self {
        Self { profile, timeout }
    }

    /// Publish a command at QoS 1 and wait for the broker to acknowledge
    /// the publish.
    ///
    /// Command issuance either succeeds or raises; a failed
    /// [`ControlResult`] is never returned, because the caller wants to
    /// know loudly that a command did not go out.
    ///
    /// # Errors
    ///
    /// [`Error::Control`] if the broker refuses the connection (naming
    /// the return code) or an acknowledgment misses the deadline;
    /// [`Error::Connection`] if the transport fails.
    pub async fn send_command(&self, command: Command) -> Result<ControlResult> {
        let topics = self.profile.topics();
        let deadline = Instant::now() + self.timeout;
        let mut session = Session::open(&self.profile);

        let outcome: Result<ControlResult> = async {
            wait_connected(&mut session.events, deadline).await?;

            let payload = serde_json::to_vec(&command)
                .map_err(|err| Error::Communication(format!("cannot encode command: {err}")))?;
            session
                .client
                .publish(&topics.request, QoS::AtLeastOnce, false, payload)
                .await
                .map_err(|err| Error::Control(format!("publish failed: {err}")))?;

            wait_published(&mut session.events, deadline).await?;

            Ok(ControlResult {
                success: true,
                message: "command acknowledged".to_string(),
                error: None,
            })
        }
        .await;

        session.shutdown().await;
        outcome
    }

    /// Start printing a file previously uploaded over FTP.
    pub async fn start_print(&self, filename: &str) -> Result<ControlResult> {
        self.send_command(Command::start_print(filename)).await
    }

    /// Query the AMS filament status.
    ///
    /// Subscribes to the report topic, requests a full status push, and
    /// accepts the first report carrying an AMS block. A printer that
    /// connects but never answers is a normal condition (no AMS
    /// installed, busy firmware): that is reported as a non-exceptional
    /// `success == false` result, not an error.
    ///
    /// # Errors
    ///
    /// [`Error::Control`] / [`Error::Connection`] for connect,
    /// subscribe, or transport failures - never for silence.
    pub async fn query_status(&self) -> Result<AmsStatusResult> {
        let topics = self.profile.topics();
        let deadline = Instant::now() + self.timeout;
        let mut session = Session::open(&self.profile);

        let outcome: Result<AmsStatusResult> = async {
            wait_connected(&mut session.events, deadline).await?;

            session
                .client
                .subscribe(&topics.report, QoS::AtMostOnce)
                .await
                .map_err(|err| Error::Control(format!("subscribe failed: {err}")))?;

            let payload = serde_json::to_vec(&Command::push_all())
                .map_err(|err| Error::Communication(format!("cannot encode request: {err}")))?;
            session
                .client
                .publish(&topics.request, QoS::AtLeastOnce, false, payload)
                .await
                .map_err(|err| Error::Control(format!("publish failed: {err}")))?;

            match wait_for_ams_report(&mut session.events, deadline, &topics.report).await? {
                Some(units) => Ok(AmsStatusResult::received(units)),
                None => Ok(AmsStatusResult::no_response(self.timeout)),
            }
        }
        .await;

        session.shutdown().await;
        outcome
    }
}

/// One private, short-lived MQTT session: a fresh client identity, its
/// event pump, and the receive side the calling task blocks on.
struct Session {
    client: AsyncClient,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    pump: JoinHandle<()>,
}

impl Session {
    /// Initiate a connection and start the pump task that drives the
    /// network loop, forwarding every event to the calling task.
    fn open(profile: &ConnectionProfile) -> Self {
        let client_id = format!("bambulink-{}", nanoid::nanoid!(8));

        let ssl_config = rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoAuth::new()))
            .with_no_client_auth();

        let mut opts = MqttOptions::new(client_id, &profile.address, MQTT_PORT);
        opts.set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);
        opts.set_keep_alive(KEEP_ALIVE);
        opts.set_credentials(MQTT_USER, &profile.access_code);
        opts.set_transport(Transport::Tls(TlsConfiguration::Rustls(Arc::new(ssl_config))));

        let (client, mut event_loop) = AsyncClient::new(opts, 25);
        let (tx, events) = mpsc::unbounded_channel();
        let pump = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(event) => {
                        if tx.send(Ok(event)).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        // One transport error ends the session; the
                        // operation will surface it, not retry it.
                        let _ = tx.send(Err(err));
                        break;
                    }
                }
            }
        });

        Self { client, events, pump }
    }

    /// Stop the network loop and close the transport. Runs on every exit
    /// path; teardown failures are swallowed.
    async fn shutdown(mut self) {
        let _ = self.client.disconnect().await;

        // Give the pump a moment to flush the disconnect, bounded so
        // teardown cannot hang on a dead broker.
        let deadline = Instant::now() + Duration::from_secs(2);
        while let Ok(Some(Ok(_))) = timeout_at(deadline, self.events.recv()).await {}

        self.pump.abort();
    }
}

/// Wait for the broker's connection acknowledgment - the hard barrier
/// before any publish or subscribe.
async fn wait_connected(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    deadline: Instant,
) -> Result<()> {
    loop {
        match next_event(events, deadline, "connection acknowledgment").await? {
            Event::Incoming(Packet::ConnAck(ConnAck {
                code: ConnectReturnCode::Success,
                ..
            })) => return Ok(()),
            Event::Incoming(Packet::ConnAck(ConnAck { code, .. })) => {
                return Err(Error::Control(format!(
                    "printer refused the MQTT connection: {code:?}"
                )));
            }
            _ => continue,
        }
    }
}

/// Wait for the broker to acknowledge a QoS 1 publish.
async fn wait_published(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    deadline: Instant,
) -> Result<()> {
    loop {
        match next_event(events, deadline, "publish acknowledgment").await? {
            Event::Incoming(Packet::PubAck(_)) => return Ok(()),
            _ => continue,
        }
    }
}

/// Wait for the first report-topic message carrying an AMS block and
/// extract its units. `Ok(None)` means the deadline passed in silence,
/// which the query path reports as a normal negative result.
async fn wait_for_ams_report(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    deadline: Instant,
    report_topic: &str,
) -> Result<Option<Vec<AmsUnit>>> {
    loop {
        let Ok(received) = timeout_at(deadline, events.recv()).await else {
            return Ok(None);
        };
        match received {
            Some(Ok(Event::Incoming(Packet::Publish(publish)))) if publish.topic == report_topic => {
                let Some(report) = parse_report(&publish.payload) else {
                    continue;
                };
                if report.has_ams() {
                    return Ok(Some(ams_units(&report)));
                }
                tracing::debug!("report without an AMS block, still waiting");
            }
            Some(Ok(_)) => continue,
            Some(Err(err)) => {
                return Err(Error::Connection(format!("MQTT transport failed: {err}")))
            }
            None => return Err(Error::Connection("MQTT event pump stopped".to_string())),
        }
    }
}

/// Pull the next event off the pump channel, mapping the deadline and
/// pump death onto the error taxonomy.
async fn next_event(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    deadline: Instant,
    waiting_for: &str,
) -> Result<Event> {
    match timeout_at(deadline, events.recv()).await {
        Err(_) => Err(Error::Control(format!("timed out waiting for {waiting_for}"))),
        Ok(None) => Err(Error::Connection("MQTT event pump stopped".to_string())),
        Ok(Some(Err(err))) => Err(Error::Connection(format!("MQTT transport failed: {err}"))),
        Ok(Some(Ok(event))) => Ok(event),
    }
}
