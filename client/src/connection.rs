//! Resilient server connection with reconnect and outbound buffering
//!
//! A [`ConnectionManager`] spawns one session task that exclusively owns the
//! transport, the phase machine and the outbound queue. The public handle
//! talks to the session over a command channel, so no component ever locks
//! connection state.

use std::collections::VecDeque;
use std::future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use shared::{decode_event, encode_event, Event, ProtocolError, OUTBOUND_QUEUE_LIMIT, RECONNECT_DELAY_MS};

use crate::transport::{Connector, Transport, TransportError};

/// Connection lifecycle phase. Starts `Closed`; `Open` is the only phase in
/// which frames move on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Closed,
    Connecting,
    Open,
}

pub type ConnectionListener = Box<dyn FnMut(bool) + Send>;
pub type MessageListener = Box<dyn FnMut(&Event) + Send>;

pub struct ConnectionConfig {
    pub reconnect_delay: Duration,
    pub queue_limit: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
            queue_limit: OUTBOUND_QUEUE_LIMIT,
        }
    }
}

enum Command {
    Connect { address: String },
    Register { event: Event },
    Send { event: Event },
    WatchConnection { listener: ConnectionListener },
    WatchMessages { listener: MessageListener },
    Shutdown,
}

/// Cheap clonable front to the session task. Handed to whatever needs to
/// emit events or observe connectivity.
#[derive(Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    connected: Arc<AtomicBool>,
}

impl ConnectionHandle {
    /// Requests a connection to `address`. Repeated calls while a connection
    /// is being established or already open are no-ops.
    pub fn connect(&self, address: impl Into<String>) {
        self.post(Command::Connect {
            address: address.into(),
        });
    }

    /// Stores the event announced to the server on every successful open.
    /// It goes out first, ahead of any buffered traffic.
    pub fn set_registration(&self, event: Event) {
        self.post(Command::Register { event });
    }

    /// Transmits `event` now if the connection is open, otherwise buffers it
    /// for the next open phase.
    pub fn send(&self, event: Event) {
        self.post(Command::Send { event });
    }

    pub fn on_connection_change(&self, listener: impl FnMut(bool) + Send + 'static) {
        self.post(Command::WatchConnection {
            listener: Box::new(listener),
        });
    }

    pub fn on_message(&self, listener: impl FnMut(&Event) + Send + 'static) {
        self.post(Command::WatchMessages {
            listener: Box::new(listener),
        });
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn post(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Connection session is gone, dropping command");
        }
    }
}

pub struct ConnectionManager {
    handle: ConnectionHandle,
    task: JoinHandle<()>,
}

impl ConnectionManager {
    /// Spawns the session task. The manager owns the task; handles cloned
    /// from it stay valid until `shutdown`.
    pub fn spawn(connector: impl Connector + 'static, config: ConnectionConfig) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));
        let session = Session::new(Box::new(connector), config, Arc::clone(&connected));
        let task = tokio::spawn(session.run(command_rx));

        Self {
            handle: ConnectionHandle { commands, connected },
            task,
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    pub fn connect(&self, address: impl Into<String>) {
        self.handle.connect(address);
    }

    pub fn set_registration(&self, event: Event) {
        self.handle.set_registration(event);
    }

    pub fn send(&self, event: Event) {
        self.handle.send(event);
    }

    pub fn on_connection_change(&self, listener: impl FnMut(bool) + Send + 'static) {
        self.handle.on_connection_change(listener);
    }

    pub fn on_message(&self, listener: impl FnMut(&Event) + Send + 'static) {
        self.handle.on_message(listener);
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_connected()
    }

    /// Deliberate teardown: closes the transport, cancels any pending
    /// reconnect and waits for the session task to finish.
    pub async fn shutdown(self) {
        let _ = self.handle.commands.send(Command::Shutdown);
        let _ = self.task.await;
    }
}

struct Session {
    connector: Box<dyn Connector>,
    config: ConnectionConfig,
    phase: Phase,
    address: Option<String>,
    transport: Option<Box<dyn Transport>>,
    registration: Option<Event>,
    outbound: VecDeque<Event>,
    connection_listeners: Vec<ConnectionListener>,
    message_listeners: Vec<MessageListener>,
    reconnect_at: Option<Instant>,
    connected_flag: Arc<AtomicBool>,
}

impl Session {
    fn new(connector: Box<dyn Connector>, config: ConnectionConfig, connected_flag: Arc<AtomicBool>) -> Self {
        Self {
            connector,
            config,
            phase: Phase::Closed,
            address: None,
            transport: None,
            registration: None,
            outbound: VecDeque::new(),
            connection_listeners: Vec::new(),
            message_listeners: Vec::new(),
            reconnect_at: None,
            connected_flag,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(Command::Connect { address }) => self.request_connect(address).await,
                        Some(Command::Register { event }) => self.registration = Some(event),
                        Some(Command::Send { event }) => self.submit(event).await,
                        Some(Command::WatchConnection { listener }) => {
                            self.connection_listeners.push(listener);
                        }
                        Some(Command::WatchMessages { listener }) => {
                            self.message_listeners.push(listener);
                        }
                        Some(Command::Shutdown) | None => {
                            self.teardown().await;
                            break;
                        }
                    }
                }
                frame = next_frame(&mut self.transport) => {
                    self.on_inbound(frame).await;
                }
                _ = retry_delay(self.reconnect_at) => {
                    self.retry_now().await;
                }
            }
        }
    }

    async fn request_connect(&mut self, address: String) {
        if self.phase != Phase::Closed {
            debug!("Connect requested while {:?}, ignoring", self.phase);
            return;
        }
        self.reconnect_at = None;
        self.address = Some(address.clone());
        self.open_connection(&address).await;
    }

    async fn open_connection(&mut self, address: &str) {
        self.set_phase(Phase::Connecting);
        info!("Connecting to {}", address);

        match self.connector.connect(address).await {
            Ok(transport) => {
                self.transport = Some(transport);
                self.set_phase(Phase::Open);
                info!("Connection open");
                self.notify_connection(true);
                if self.announce().await {
                    self.flush_outbound().await;
                }
            }
            Err(err) => {
                error!("Connecting to {} failed: {}", address, err);
                self.drop_connection().await;
            }
        }
    }

    /// Entering `Closed` from anywhere but a deliberate shutdown: notify
    /// listeners and arm the retry timer.
    async fn drop_connection(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        self.set_phase(Phase::Closed);
        self.notify_connection(false);

        if self.address.is_some() {
            let delay = self.config.reconnect_delay;
            self.reconnect_at = Some(Instant::now() + delay);
            info!("Retrying in {:?}", delay);
        }
    }

    /// Identifies this session to the server. Sent on every open, before the
    /// buffered backlog; if it fails the backlog stays queued for the next
    /// open.
    async fn announce(&mut self) -> bool {
        let Some(registration) = self.registration.clone() else {
            return true;
        };
        self.transmit(&registration).await
    }

    async fn retry_now(&mut self) {
        self.reconnect_at = None;
        if self.phase != Phase::Closed {
            return;
        }
        if let Some(address) = self.address.clone() {
            info!("Reconnecting to {}", address);
            self.open_connection(&address).await;
        }
    }

    async fn on_inbound(&mut self, frame: Option<Result<String, TransportError>>) {
        match frame {
            Some(Ok(text)) => self.dispatch_frame(&text),
            // Receive errors are transient; only end-of-stream closes.
            Some(Err(err)) => warn!("Transport receive error: {}", err),
            None => {
                info!("Connection lost");
                self.drop_connection().await;
            }
        }
    }

    fn dispatch_frame(&mut self, text: &str) {
        match decode_event(text) {
            Ok(event) => {
                for listener in &mut self.message_listeners {
                    listener(&event);
                }
            }
            Err(ProtocolError::UnknownTag(tag)) => {
                warn!("Ignoring frame with unknown event tag `{}`", tag);
            }
            Err(err) => warn!("Ignoring undecodable frame: {}", err),
        }
    }

    async fn submit(&mut self, event: Event) {
        if self.phase == Phase::Open {
            self.transmit(&event).await;
        } else {
            self.enqueue(event);
        }
    }

    fn enqueue(&mut self, event: Event) {
        if self.outbound.len() >= self.config.queue_limit {
            self.outbound.pop_front();
            warn!("Outbound queue full, dropping oldest event");
        }
        self.outbound.push_back(event);
    }

    /// Drains the queue oldest-first. The phase is re-checked before every
    /// element; a send failure leaves the failed element and everything
    /// behind it queued for the next open phase.
    async fn flush_outbound(&mut self) {
        let backlog = self.outbound.len();
        if backlog == 0 {
            return;
        }
        debug!("Flushing {} buffered events", backlog);

        while self.phase == Phase::Open {
            let Some(event) = self.outbound.front().cloned() else {
                break;
            };
            if self.transmit(&event).await {
                self.outbound.pop_front();
            } else {
                break;
            }
        }
    }

    async fn transmit(&mut self, event: &Event) -> bool {
        let frame = match encode_event(event) {
            Ok(frame) => frame,
            Err(err) => {
                error!("Failed to encode outbound event: {}", err);
                return true;
            }
        };
        let Some(transport) = self.transport.as_mut() else {
            return false;
        };
        match transport.send(frame).await {
            Ok(()) => true,
            Err(err) => {
                // Logged only; the receive side drives the phase change.
                error!("Send failed: {}", err);
                false
            }
        }
    }

    async fn teardown(&mut self) {
        self.reconnect_at = None;
        self.address = None;
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        let was_open = self.phase == Phase::Open;
        self.set_phase(Phase::Closed);
        if was_open {
            self.notify_connection(false);
        }
        info!("Connection session closed");
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.connected_flag.store(phase == Phase::Open, Ordering::SeqCst);
    }

    fn notify_connection(&mut self, open: bool) {
        for listener in &mut self.connection_listeners {
            listener(open);
        }
    }
}

async fn next_frame(transport: &mut Option<Box<dyn Transport>>) -> Option<Result<String, TransportError>> {
    match transport.as_mut() {
        Some(active) => active.recv().await,
        None => future::pending().await,
    }
}

async fn retry_delay(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => future::pending().await,
    }
}
