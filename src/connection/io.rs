//! Connection lifecycle and the per-connection tasks.
//!
//! `setup` resolves, `connect_to_server` opens the transport and
//! `establish_connection` spawns two tasks: the read loop, which reassembles
//! lines and hands them to the parser, and the writer, which drains the
//! send queue. `cleanup` tears both down within the engine's join timeout.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures_util::SinkExt;
use sbi_proto::line::{LineAssembler, LineCodec, terminate_line};
use tokio::io::{AsyncReadExt, ReadHalf};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_util::codec::FramedWrite;
use tracing::{debug, info, warn};

use super::transport::{BoxedStream, Endpoint, IrcStream};
use super::{ConnState, IrcConnection, resolve_server};
use crate::config::{NetworkConfig, ServerConfig};
use crate::error::{IrcResult, IrcStatus};
use crate::listener::IrcEvent;

const READ_BUF_SIZE: usize = 4096;
const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_millis(1000);

impl IrcConnection {
    // ========================================================================
    // Establishment
    // ========================================================================

    /// Resolve `server` and prepare the endpoint for the next connect.
    pub async fn setup(&self, network: &NetworkConfig, server: &ServerConfig) -> IrcResult {
        let resolved = resolve_server(server).await?;

        if let Some(owner) = self.network() {
            owner.with_server(|info| {
                info.host = resolved.host.clone();
                info.ip_address = resolved.addr.ip().to_string();
                info.port = resolved.addr.port();
            });
        }

        *self.endpoint.write() = Endpoint {
            host: resolved.host,
            address: resolved.addr.to_string(),
            port: resolved.addr.port(),
            tls: server.ssl,
            allow_invalid_cert: network.allow_invalid_cert,
        };
        Ok(())
    }

    /// Open the transport prepared by [`setup`](Self::setup).
    pub async fn connect_to_server(&self) -> IrcResult {
        if self
            .state()
            .intersects(ConnState::ACTIVE | ConnState::CONNECTING)
        {
            return Err(IrcStatus::InvalidState("already connected"));
        }
        let endpoint = self.endpoint();
        if endpoint.address.is_empty() {
            return Err(IrcStatus::InvalidState("connection has not been set up"));
        }

        info!(
            connection = self.id,
            host = %endpoint.host,
            address = %endpoint.address,
            tls = endpoint.tls,
            "connecting"
        );

        let connector = Arc::clone(&*self.connector.read());
        let transport = match connector.connect(&endpoint).await {
            Ok(t) => t,
            Err(e) => {
                warn!(connection = self.id, error = %e, code = e.error_code(), "connect failed");
                self.set_primary(ConnState::DISCONNECTED);
                return Err(e);
            }
        };

        *self.fingerprint.write() = transport.fingerprint;
        self.attach_boxed(transport.stream)
    }

    /// Use an already open stream as the transport.
    pub fn attach_stream<S: IrcStream + 'static>(&self, stream: S) -> IrcResult {
        self.attach_boxed(Box::new(stream))
    }

    fn attach_boxed(&self, stream: BoxedStream) -> IrcResult {
        if self
            .state()
            .intersects(ConnState::ACTIVE | ConnState::CONNECTING)
        {
            return Err(IrcStatus::InvalidState("already connected"));
        }
        *self.pending.lock() = Some(stream);
        self.set_primary(ConnState::CONNECTING);
        Ok(())
    }

    /// Spawn the read loop and writer task over the attached transport.
    ///
    /// The registration handshake is queued first, before anything is read.
    pub async fn establish_connection(self: &Arc<Self>) -> IrcResult {
        let stream = self
            .pending
            .lock()
            .take()
            .ok_or(IrcStatus::InvalidState("no transport attached"))?;

        let (reader, writer) = tokio::io::split(stream);
        *self.writer.lock().await = Some(FramedWrite::new(writer, LineCodec));

        self.send_init()?;

        let write_task = tokio::spawn(Arc::clone(self).write_loop(self.close_tx.subscribe()));
        let read_task = tokio::spawn(Arc::clone(self).read_loop(reader, self.close_tx.subscribe()));
        self.tasks.lock().extend([write_task, read_task]);
        Ok(())
    }

    /// `setup`, `connect_to_server` and `establish_connection` in one call.
    pub async fn connect(self: &Arc<Self>, network: &NetworkConfig, server: &ServerConfig) -> IrcResult {
        self.setup(network, server).await?;
        self.connect_to_server().await?;
        self.establish_connection().await
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    async fn read_loop(
        self: Arc<Self>,
        mut reader: ReadHalf<BoxedStream>,
        mut close_rx: broadcast::Receiver<()>,
    ) {
        let mut assembler = LineAssembler::new();
        let mut buf = vec![0u8; READ_BUF_SIZE];

        while self
            .state()
            .intersects(ConnState::ACTIVE | ConnState::CONNECTING)
        {
            let n = tokio::select! {
                res = reader.read(&mut buf) => match res {
                    Ok(0) => {
                        info!(connection = self.id, "connection closed by server");
                        break;
                    }
                    Ok(n) => n,
                    Err(e) => {
                        warn!(connection = self.id, error = %e, "read failed");
                        break;
                    }
                },
                _ = close_rx.recv() => break,
            };

            self.record_recv(n);

            let mut queued = 0usize;
            for line in assembler.push(&buf[..n]) {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(connection = self.id, error = %e, "discarding malformed line");
                        continue;
                    }
                };

                if let Some(token) = line.strip_prefix("PING :") {
                    if let Err(e) = self.write_now(&format!("PONG :{token}")).await {
                        warn!(connection = self.id, error = %e, "PONG failed");
                    }
                    continue;
                }

                match self.add_to_recv_queue(line) {
                    Ok(()) => queued += 1,
                    Err(e) => debug!(connection = self.id, error = %e, "line rejected"),
                }
            }

            if queued > 0 {
                if let Some(engine) = self.engine() {
                    engine.notify_listeners(&self, &IrcEvent::NewData);
                    engine.trigger_sync();
                }
            }
        }

        if assembler.has_partial() {
            debug!(connection = self.id, "dropping unterminated line");
        }
        self.set_primary(ConnState::DISCONNECTED);
        let _ = self.close_tx.send(());
        debug!(connection = self.id, "read loop finished");
    }

    async fn write_loop(self: Arc<Self>, mut close_rx: broadcast::Receiver<()>) {
        loop {
            if let Err(e) = self.drain_send_queue().await {
                warn!(connection = self.id, error = %e, "write failed");
                break;
            }
            tokio::select! {
                _ = self.send_ready.notified() => {}
                _ = close_rx.recv() => break,
            }
        }
        debug!(connection = self.id, "writer finished");
    }

    /// Write every queued line, in order, then flush.
    async fn drain_send_queue(&self) -> IrcResult {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Ok(());
        };

        let mut wrote = false;
        while let Some(line) = self.pop_send() {
            let wire = self.frame(&line);
            let len = wire.len() as u64;
            writer.feed(wire).await?;
            self.bytes_sent.fetch_add(len, Ordering::Relaxed);
            wrote = true;
        }
        if wrote {
            writer.flush().await?;
        }
        Ok(())
    }

    /// Write one line straight to the transport, skipping the queue.
    async fn write_now(&self, line: &str) -> IrcResult {
        let wire = self.frame(line);
        let len = wire.len() as u64;

        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or(IrcStatus::InvalidState("not connected"))?;
        writer.send(wire).await?;
        self.bytes_sent.fetch_add(len, Ordering::Relaxed);
        Ok(())
    }

    fn frame(&self, line: &str) -> String {
        let (wire, truncated) = terminate_line(line);
        if truncated {
            debug!(connection = self.id, original = line.len(), "outgoing line truncated");
        }
        wire
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Disconnect and reset to a reusable, disconnected state.
    ///
    /// An active session is sent QUIT first. Channels are dropped without
    /// waiting for the server. The final flush and each task get the
    /// engine's join timeout; whatever is still queued after that is
    /// dropped and the tasks are aborted.
    pub async fn cleanup(&self) {
        if self.is_active() {
            if let Err(e) = self.send_quit(None) {
                debug!(connection = self.id, error = %e, "QUIT not queued");
            }
            self.set_primary(ConnState::DISCONNECTING);
        }

        self.erase_channels();

        let limit = self.join_timeout();
        match timeout(limit, self.flush_and_close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(connection = self.id, error = %e, "final flush failed"),
            Err(_) => warn!(
                connection = self.id,
                dropped = self.send_queue.lock().len(),
                "peer not reading, dropping queued lines"
            ),
        }
        let _ = self.close_tx.send(());

        self.join_tasks(limit).await;

        // no task is left to hold the writer
        if let Ok(mut writer) = self.writer.try_lock() {
            writer.take();
        }
        self.pending.lock().take();
        self.recv_queue.lock().clear();
        self.send_queue.lock().clear();
        self.lag_probe.lock().take();
        *self.last_data.lock() = None;
        self.auto_init_sent.store(false, Ordering::Release);

        self.set_state(ConnState::DISCONNECTED);
        info!(connection = self.id, "connection cleaned up");
    }

    /// Write out the send queue (the QUIT included), then close the transport.
    async fn flush_and_close(&self) -> IrcResult {
        self.drain_send_queue().await?;
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.close().await?;
        }
        Ok(())
    }

    fn join_timeout(&self) -> Duration {
        self.engine()
            .map(|e| Duration::from_millis(e.config().join_timeout_ms))
            .unwrap_or(DEFAULT_JOIN_TIMEOUT)
    }

    async fn join_tasks(&self, limit: Duration) {
        let tasks = std::mem::take(&mut *self.tasks.lock());

        for mut task in tasks {
            if timeout(limit, &mut task).await.is_err() {
                warn!(connection = self.id, "task did not stop in time, aborting");
                task.abort();
                let _ = task.await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    use super::*;
    use crate::config::ProfileConfig;
    use crate::state::IrcNetwork;

    fn connection() -> (Arc<IrcNetwork>, Arc<IrcConnection>) {
        let network = Arc::new(IrcNetwork::new("net"));
        let profile = ProfileConfig {
            nicknames: vec!["trez".into()],
            ..ProfileConfig::default()
        };
        network.configure(&NetworkConfig::default(), &profile);
        let conn = Arc::new(IrcConnection::new(1, Weak::new(), Arc::downgrade(&network)));
        (network, conn)
    }

    #[tokio::test]
    async fn handshake_written_then_ping_answered() {
        let (_network, conn) = connection();
        let (client, server) = tokio::io::duplex(4096);
        conn.attach_stream(client).unwrap();
        assert!(conn.is_connecting());
        conn.establish_connection().await.unwrap();

        let (rx, mut tx) = tokio::io::split(server);
        let mut rx = BufReader::new(rx);
        let mut line = String::new();
        let mut seen = Vec::new();
        for _ in 0..6 {
            line.clear();
            timeout(Duration::from_secs(2), rx.read_line(&mut line))
                .await
                .unwrap()
                .unwrap();
            seen.push(line.trim_end().to_string());
        }
        assert_eq!(seen[0], "CAP LS");
        assert_eq!(seen[4], "NICK trez");

        tx.write_all(b"PING :irc.example.org\r\n").await.unwrap();
        line.clear();
        timeout(Duration::from_secs(2), rx.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line, "PONG :irc.example.org\r\n");
        assert_eq!(conn.recv_queue_len(), 0);

        conn.cleanup().await;
        assert_eq!(conn.state(), ConnState::DISCONNECTED);
    }

    #[tokio::test]
    async fn split_lines_are_queued_whole() {
        let (_network, conn) = connection();
        let (client, server) = tokio::io::duplex(4096);
        conn.attach_stream(client).unwrap();
        conn.establish_connection().await.unwrap();

        let (_rx, mut tx) = tokio::io::split(server);
        tx.write_all(b":irc.example.org 001 trez :Wel").await.unwrap();
        tx.write_all(b"come\r\n:irc.example.org 002 trez :x\r\n").await.unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while conn.recv_queue_len() < 2 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            conn.pop_recv().as_deref(),
            Some(":irc.example.org 001 trez :Welcome")
        );
        assert!(conn.stats().bytes_recv > 0);
        assert!(conn.stats().last_data.is_some());
        conn.cleanup().await;
    }

    #[tokio::test]
    async fn peer_close_marks_disconnected() {
        let (_network, conn) = connection();
        let (client, server) = tokio::io::duplex(4096);
        conn.attach_stream(client).unwrap();
        conn.establish_connection().await.unwrap();
        drop(server);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while !conn.state().contains(ConnState::DISCONNECTED)
            && tokio::time::Instant::now() < deadline
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(conn.state().contains(ConnState::DISCONNECTED));
        conn.cleanup().await;
    }

    #[tokio::test]
    async fn cleanup_is_bounded_when_peer_stops_reading() {
        let (_network, conn) = connection();
        let (client, _server) = tokio::io::duplex(64);
        conn.attach_stream(client).unwrap();
        conn.establish_connection().await.unwrap();
        conn.set_primary(ConnState::ACTIVE);

        for i in 0..200 {
            conn.add_to_send_queue(format!("PRIVMSG #flood :line {i}")).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        timeout(Duration::from_secs(5), conn.cleanup())
            .await
            .expect("cleanup finished");
        assert_eq!(conn.state(), ConnState::DISCONNECTED);
        assert!(conn.pending_sends().is_empty());
    }

    #[tokio::test]
    async fn connect_requires_setup() {
        let (_network, conn) = connection();
        assert_eq!(
            conn.connect_to_server().await,
            Err(IrcStatus::InvalidState(""))
        );
        assert!(conn.establish_connection().await.is_err());
    }
}
