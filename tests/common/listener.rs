//! Listener that records every event it receives.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sbi_irc::{EventKind, IrcConnection, IrcEvent, IrcListener};
use tokio::sync::Notify;
use tokio::time::{Instant, timeout_at};

#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<(u32, IrcEvent)>>,
    arrived: Notify,
}

#[allow(dead_code)]
impl RecordingListener {
    /// Everything recorded so far, `NewData` excluded.
    pub fn events(&self) -> Vec<IrcEvent> {
        self.events
            .lock()
            .iter()
            .map(|(_, e)| e.clone())
            .filter(|e| e.kind() != EventKind::NewData)
            .collect()
    }

    /// Recorded events raised for connection `id`.
    pub fn events_for(&self, id: u32) -> Vec<IrcEvent> {
        self.events
            .lock()
            .iter()
            .filter(|(conn, e)| *conn == id && e.kind() != EventKind::NewData)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(IrcEvent::kind).collect()
    }

    pub fn last(&self) -> Option<IrcEvent> {
        self.events().pop()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Wait until an event of `kind` has been recorded.
    pub async fn wait_for(&self, kind: EventKind, dur: Duration) -> anyhow::Result<IrcEvent> {
        let deadline = Instant::now() + dur;
        loop {
            // register before checking so a concurrent delivery is not missed
            let notified = self.arrived.notified();
            if let Some(event) = self.events().into_iter().find(|e| e.kind() == kind) {
                return Ok(event);
            }
            timeout_at(deadline, notified)
                .await
                .map_err(|_| anyhow::anyhow!("timed out waiting for {kind:?}"))?;
        }
    }
}

impl IrcListener for RecordingListener {
    fn on_event(&self, connection: &Arc<IrcConnection>, event: &IrcEvent) {
        self.events.lock().push((connection.id(), event.clone()));
        self.arrived.notify_waiters();
    }
}
