//! A single IRC session.
//!
//! An [`IrcConnection`] owns its transport, a receive queue filled by its
//! read task, a send queue drained by its writer task, and the channels it
//! is tracking. Parsing happens elsewhere: the read task only queues lines
//! and wakes the engine's parser.
//!
//! # Structure
//!
//! - `state` - lifecycle bitmask
//! - `transport` - TCP/TLS establishment behind the [`Connector`] seam
//! - `resolve` - server address lookup
//! - `io` - setup, connect, read loop, writer task and teardown
//! - `send` - the outgoing command family

mod io;
mod resolve;
mod send;
mod state;
mod transport;

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use sbi_proto::line::LineCodec;
use sbi_proto::rfc::MAX_BUF_IRC_MSG_CRLF;
use sbi_proto::ProtocolError;
use tokio::io::WriteHalf;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedWrite;

use crate::engine::IrcEngine;
use crate::error::{IrcResult, IrcStatus};
use crate::state::{IrcChannel, IrcNetwork};

pub use self::resolve::{Resolved, resolve_server};
pub use self::state::ConnState;
pub use self::transport::{
    BoxedStream, Connector, Endpoint, IrcStream, TcpConnector, Transport, certificate_fingerprint,
};

type LineWriter = FramedWrite<WriteHalf<BoxedStream>, LineCodec>;

/// CAP negotiation results, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapLists {
    pub ack: Vec<String>,
    pub nak: Vec<String>,
    pub ls: Vec<String>,
}

/// Transfer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub bytes_recv: u64,
    pub bytes_sent: u64,
    /// When data last arrived.
    pub last_data: Option<DateTime<Utc>>,
}

pub struct IrcConnection {
    id: u32,
    engine: Weak<IrcEngine>,
    network: Weak<IrcNetwork>,

    state: AtomicU32,
    bytes_recv: AtomicU64,
    bytes_sent: AtomicU64,
    last_data: Mutex<Option<DateTime<Utc>>>,
    lag_probe: Mutex<Option<Instant>>,
    /// Post-registration automation already ran on this session.
    auto_init_sent: AtomicBool,

    recv_queue: Mutex<VecDeque<String>>,
    send_queue: Mutex<VecDeque<String>>,
    send_ready: Notify,

    channels: RwLock<Vec<Arc<IrcChannel>>>,
    caps: RwLock<CapLists>,

    endpoint: RwLock<Endpoint>,
    fingerprint: RwLock<Option<String>>,
    connector: RwLock<Arc<dyn Connector>>,
    pending: Mutex<Option<BoxedStream>>,
    writer: tokio::sync::Mutex<Option<LineWriter>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    close_tx: broadcast::Sender<()>,
}

impl IrcConnection {
    pub(crate) fn new(id: u32, engine: Weak<IrcEngine>, network: Weak<IrcNetwork>) -> Self {
        let (close_tx, _) = broadcast::channel(1);
        Self {
            id,
            engine,
            network,
            state: AtomicU32::new(ConnState::DISCONNECTED.bits()),
            bytes_recv: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            last_data: Mutex::new(None),
            lag_probe: Mutex::new(None),
            auto_init_sent: AtomicBool::new(false),
            recv_queue: Mutex::new(VecDeque::new()),
            send_queue: Mutex::new(VecDeque::new()),
            send_ready: Notify::new(),
            channels: RwLock::new(Vec::new()),
            caps: RwLock::new(CapLists::default()),
            endpoint: RwLock::new(Endpoint::default()),
            fingerprint: RwLock::new(None),
            connector: RwLock::new(Arc::new(TcpConnector)),
            pending: Mutex::new(None),
            writer: tokio::sync::Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            close_tx,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// The owning network, if it still exists.
    pub fn network(&self) -> Option<Arc<IrcNetwork>> {
        self.network.upgrade()
    }

    pub(crate) fn engine(&self) -> Option<Arc<IrcEngine>> {
        self.engine.upgrade()
    }

    /// Replace the transport factory used by the next connect.
    pub fn set_connector(&self, connector: Arc<dyn Connector>) {
        *self.connector.write() = connector;
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint.read().clone()
    }

    /// Fingerprint of the peer certificate on TLS sessions.
    pub fn fingerprint(&self) -> Option<String> {
        self.fingerprint.read().clone()
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn state(&self) -> ConnState {
        ConnState::from_bits_retain(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: ConnState) {
        self.state.store(state.bits(), Ordering::Release);
    }

    pub(crate) fn insert_state(&self, bits: ConnState) {
        self.state.fetch_or(bits.bits(), Ordering::AcqRel);
    }

    pub(crate) fn remove_state(&self, bits: ConnState) {
        self.state.fetch_and(!bits.bits(), Ordering::AcqRel);
    }

    /// Switch the primary state, keeping `INIT_SENT`/`RECV_NAMES`.
    pub(crate) fn set_primary(&self, primary: ConnState) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some(ConnState::from_bits_retain(bits).with_primary(primary).bits())
            });
    }

    pub fn is_active(&self) -> bool {
        self.state().contains(ConnState::ACTIVE)
    }

    pub fn is_connecting(&self) -> bool {
        self.state().contains(ConnState::CONNECTING)
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            bytes_recv: self.bytes_recv.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            last_data: *self.last_data.lock(),
        }
    }

    fn record_recv(&self, bytes: usize) {
        *self.last_data.lock() = Some(Utc::now());
        self.bytes_recv.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Duration the current lag probe has been outstanding.
    pub fn lag(&self) -> Option<Duration> {
        self.lag_probe.lock().map(|sent| sent.elapsed())
    }

    pub(crate) fn clear_lag(&self) -> Option<Duration> {
        self.lag_probe.lock().take().map(|sent| sent.elapsed())
    }

    /// Claim the once-per-session automation slot.
    ///
    /// Returns true only for the first caller since the last cleanup.
    pub(crate) fn claim_auto_init(&self) -> bool {
        !self.auto_init_sent.swap(true, Ordering::AcqRel)
    }

    // ========================================================================
    // Receive queue
    // ========================================================================

    /// Queue one received line (CRLF already stripped) for the parser.
    ///
    /// Lines shorter than two bytes or as long as the CRLF-terminated
    /// maximum are refused.
    pub fn add_to_recv_queue(&self, line: String) -> IrcResult {
        if line.len() < 2 {
            return Err(ProtocolError::MessageTooShort(line.len()).into());
        }
        if line.len() >= MAX_BUF_IRC_MSG_CRLF {
            return Err(ProtocolError::MessageTooLong {
                actual: line.len(),
                limit: MAX_BUF_IRC_MSG_CRLF,
            }
            .into());
        }
        self.recv_queue.lock().push_back(line);
        Ok(())
    }

    pub(crate) fn pop_recv(&self) -> Option<String> {
        self.recv_queue.lock().pop_front()
    }

    pub fn recv_queue_len(&self) -> usize {
        self.recv_queue.lock().len()
    }

    // ========================================================================
    // Send queue
    // ========================================================================

    /// Queue one outgoing line for the writer task.
    pub fn add_to_send_queue(&self, data: impl Into<String>) -> IrcResult {
        let data = data.into();
        if data.is_empty() {
            return Err(IrcStatus::MissingParameter("data"));
        }
        self.send_queue.lock().push_back(data);
        self.send_ready.notify_one();
        Ok(())
    }

    /// Send ahead of everything already queued.
    pub fn send_bypass(&self, data: impl Into<String>) -> IrcResult {
        let data = data.into();
        if data.is_empty() {
            return Err(IrcStatus::MissingParameter("data"));
        }
        self.send_queue.lock().push_front(data);
        self.send_ready.notify_one();
        Ok(())
    }

    /// Snapshot of lines not yet written, in send order.
    pub fn pending_sends(&self) -> Vec<String> {
        self.send_queue.lock().iter().cloned().collect()
    }

    fn pop_send(&self) -> Option<String> {
        self.send_queue.lock().pop_front()
    }

    // ========================================================================
    // Channels
    // ========================================================================

    pub fn get_channel(&self, name: &str) -> Option<Arc<IrcChannel>> {
        self.channels.read().iter().find(|c| c.is(name)).cloned()
    }

    pub fn channels(&self) -> Vec<Arc<IrcChannel>> {
        self.channels.read().clone()
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels
            .read()
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    pub(crate) fn add_channel(&self, channel: Arc<IrcChannel>) -> IrcResult {
        let mut channels = self.channels.write();
        if channels.iter().any(|c| c.is(channel.name())) {
            return Err(IrcStatus::ObjectAddError(format!(
                "{} already tracked",
                channel.name()
            )));
        }
        channels.push(channel);
        Ok(())
    }

    /// Stop tracking every channel, returning them and their members to
    /// the engine pools.
    pub fn erase_channels(&self) {
        let channels = std::mem::take(&mut *self.channels.write());
        let engine = self.engine();
        for channel in channels {
            match &engine {
                Some(engine) => engine.factory().free_channel(&channel),
                None => drop(channel.cleanup()),
            }
        }
    }

    /// Stop tracking one channel, handing it back to the caller.
    pub(crate) fn remove_channel(&self, name: &str) -> Option<Arc<IrcChannel>> {
        let mut channels = self.channels.write();
        let idx = channels.iter().position(|c| c.is(name))?;
        Some(channels.remove(idx))
    }

    // ========================================================================
    // Capabilities
    // ========================================================================

    pub fn caps(&self) -> CapLists {
        self.caps.read().clone()
    }

    pub(crate) fn with_caps<R>(&self, f: impl FnOnce(&mut CapLists) -> R) -> R {
        f(&mut self.caps.write())
    }
}

impl fmt::Debug for IrcConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrcConnection")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("endpoint", &*self.endpoint.read())
            .field("channels", &self.channel_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> IrcConnection {
        IrcConnection::new(1, Weak::new(), Weak::new())
    }

    #[test]
    fn new_connection_is_disconnected() {
        let c = conn();
        assert_eq!(c.state(), ConnState::DISCONNECTED);
        assert!(c.network().is_none());
        assert_eq!(c.stats(), ConnectionStats::default());
    }

    #[test]
    fn recv_queue_length_bounds() {
        let c = conn();
        assert!(c.add_to_recv_queue("x".into()).is_err());
        assert!(c.add_to_recv_queue("a".repeat(511)).is_ok());
        assert!(c.add_to_recv_queue("a".repeat(512)).is_ok());
        assert_eq!(
            c.add_to_recv_queue("a".repeat(513)),
            Err(IrcStatus::InvalidData(String::new()))
        );
        assert_eq!(c.recv_queue_len(), 2);
        assert_eq!(c.pop_recv().map(|l| l.len()), Some(511));
    }

    #[test]
    fn bypass_jumps_the_queue() {
        let c = conn();
        c.add_to_send_queue("NICK trez").unwrap();
        c.add_to_send_queue("USER tirc 8 * :t").unwrap();
        c.send_bypass("PONG :x").unwrap();
        assert_eq!(c.pending_sends(), vec!["PONG :x", "NICK trez", "USER tirc 8 * :t"]);
        assert!(c.add_to_send_queue("").is_err());
    }

    #[test]
    fn auto_init_claimed_once() {
        let c = conn();
        assert!(c.claim_auto_init());
        assert!(!c.claim_auto_init());
    }

    #[test]
    fn primary_state_switch() {
        let c = conn();
        c.set_primary(ConnState::CONNECTING);
        c.insert_state(ConnState::INIT_SENT);
        c.set_primary(ConnState::ACTIVE);
        assert!(c.is_active());
        assert!(!c.is_connecting());
        assert!(c.state().contains(ConnState::INIT_SENT));
        c.remove_state(ConnState::INIT_SENT);
        assert_eq!(c.state(), ConnState::ACTIVE);
    }
}
