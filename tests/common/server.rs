//! Scripted IRC server.
//!
//! Listens on an ephemeral loopback port and hands each accepted connection
//! back as a [`MockPeer`] the test drives line by line.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

pub struct MockServer {
    listener: TcpListener,
}

#[allow(dead_code)]
impl MockServer {
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn port(&self) -> anyhow::Result<u16> {
        Ok(self.addr()?.port())
    }

    /// Accept the next client.
    pub async fn accept(&self) -> anyhow::Result<MockPeer> {
        let (stream, _) = timeout(Duration::from_secs(5), self.listener.accept()).await??;
        let (read_half, write_half) = stream.into_split();
        Ok(MockPeer {
            reader: BufReader::new(read_half),
            writer: Some(BufWriter::new(write_half)),
        })
    }
}

/// The server side of one client connection.
pub struct MockPeer {
    reader: BufReader<OwnedReadHalf>,
    writer: Option<BufWriter<OwnedWriteHalf>>,
}

#[allow(dead_code)]
impl MockPeer {
    /// Send a raw line, CRLF appended when missing.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("peer already closed"))?;
        writer.write_all(line.as_bytes()).await?;
        if !line.ends_with("\r\n") {
            writer.write_all(b"\r\n").await?;
        }
        writer.flush().await?;
        Ok(())
    }

    /// Receive one line, CRLF stripped.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<String> {
        let mut line = String::new();
        let n = timeout(dur, self.reader.read_line(&mut line)).await??;
        if n == 0 {
            anyhow::bail!("client closed the connection");
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Receive lines until one matches, returning everything read.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<String>>
    where
        F: FnMut(&str) -> bool,
    {
        let mut lines = Vec::new();
        loop {
            let line = self.recv().await?;
            let done = predicate(&line);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }

    /// Shut down the write side; the client sees end of stream.
    pub async fn close(&mut self) -> anyhow::Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }
}
