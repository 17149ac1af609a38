//! Line parser and dispatcher.
//!
//! One parser task serves the whole engine. On every wake it walks all live
//! connections and drains each receive queue completely before moving on,
//! so no two lines are ever handled at the same time. Handlers mutate
//! channel, user and network state and raise notifications; nothing else
//! in the crate mutates that state.
//!
//! # Dispatch
//!
//! A line is decoded into sender, code and data. Numeric codes in `1..1000`
//! go to the numeric table, everything else to the text command table.
//! Codes neither table knows are logged at debug level and dropped; they are
//! not errors.

mod commands;
mod context;
mod helpers;
mod numeric;

use std::sync::{Arc, Weak};

use sbi_proto::{RawLine, extract_irc_buf_data, split_sender};
use tokio::sync::{Notify, broadcast};
use tracing::{debug, debug_span, info, warn};

pub use context::Context;
pub use helpers::{has_channel_prefix, mode_has_argument};

use crate::connection::{ConnState, IrcConnection};
use crate::engine::IrcEngine;
use crate::error::{IrcResult, IrcStatus};

/// Prefix of a server-initiated disconnect.
const SERVER_ERROR: &str = "ERROR :";

type Handler = fn(&Context<'_>) -> IrcResult;

fn numeric_handler(numeric: u16) -> Option<Handler> {
    let handler: Handler = match numeric {
        1 => numeric::handle_001,
        2 => numeric::handle_002,
        3 => numeric::handle_003,
        4 => numeric::handle_004,
        5 => numeric::handle_005,
        331 => numeric::handle_331,
        332 => numeric::handle_332,
        333 => numeric::handle_333,
        353 => numeric::handle_353,
        366 => numeric::handle_366,
        372 | 375 => numeric::handle_motd,
        376 => numeric::handle_376,
        432 | 433 => numeric::handle_nick_rejected,
        _ => return None,
    };
    Some(handler)
}

fn command_handler(code: &str) -> Option<Handler> {
    let handler: Handler = match code {
        "CAP" => commands::handle_cap,
        "INVITE" => commands::handle_invite,
        "JOIN" => commands::handle_join,
        "KICK" => commands::handle_kick,
        "KILL" => commands::handle_kill,
        "MODE" => commands::handle_mode,
        "NICK" => commands::handle_nick,
        "NOTICE" => commands::handle_notice,
        "PART" => commands::handle_part,
        "PONG" => commands::handle_pong,
        "PRIVMSG" => commands::handle_privmsg,
        "QUIT" => commands::handle_quit,
        "TOPIC" => commands::handle_topic,
        _ => return None,
    };
    Some(handler)
}

/// Decode and handle one line, returning whatever the handler returned.
///
/// `ERROR :` lines mark the connection disconnected and yield
/// [`IrcStatus::ServerClosed`]. Undecodable lines yield
/// [`IrcStatus::ParsingError`], codes shorter than three characters
/// [`IrcStatus::InvalidData`].
pub fn process_line(engine: &IrcEngine, conn: &Arc<IrcConnection>, line: &str) -> IrcResult {
    let raw = decode(conn, line)?;
    dispatch(engine, conn, raw)
}

fn decode<'a>(conn: &IrcConnection, line: &'a str) -> IrcResult<RawLine<'a>> {
    if let Some(reason) = line.strip_prefix(SERVER_ERROR) {
        info!(connection = conn.id(), reason = %reason, "server closed the connection");
        conn.set_state(ConnState::DISCONNECTED);
        return Err(IrcStatus::ServerClosed(reason.to_string()));
    }

    let raw = extract_irc_buf_data(line).map_err(|e| IrcStatus::ParsingError(e.to_string()))?;
    split_sender(raw.sender).map_err(|e| IrcStatus::ParsingError(e.to_string()))?;
    if raw.code.len() < 3 {
        return Err(IrcStatus::invalid(format!("code {}", raw.code)));
    }
    Ok(raw)
}

fn dispatch(engine: &IrcEngine, conn: &Arc<IrcConnection>, raw: RawLine<'_>) -> IrcResult {
    let _span = debug_span!("line", connection = conn.id(), code = %raw.code).entered();

    let handler = match raw.numeric() {
        Some(numeric) => numeric_handler(numeric),
        None => command_handler(raw.code),
    };
    let Some(handler) = handler else {
        debug!(connection = conn.id(), code = %raw.code, "unhandled code");
        return Ok(());
    };

    let ctx = Context::new(engine, conn, raw.sender, raw.code, raw.data);
    handler(&ctx)
}

/// Pop and handle the next queued line of `conn`.
///
/// Returns [`IrcStatus::QueueEmpty`] when there is nothing left. Handler
/// failures are logged here and reported as success, so one bad line never
/// stalls the queue; decoding failures and server closes are returned.
pub fn parse_next_recv_queue_item(engine: &IrcEngine, conn: &Arc<IrcConnection>) -> IrcResult {
    let line = conn.pop_recv().ok_or(IrcStatus::QueueEmpty)?;
    debug!(connection = conn.id(), line = %line, "parsing");

    let raw = decode(conn, &line)?;
    match dispatch(engine, conn, raw) {
        Err(e) if e.is_sentinel() => {
            debug!(connection = conn.id(), code = e.error_code(), "{}", e);
        }
        Err(e) => {
            warn!(connection = conn.id(), code = e.error_code(), line = %line, "handler failed: {}", e);
        }
        Ok(()) => {}
    }
    Ok(())
}

/// Drain the receive queue of `conn` completely.
pub fn parse_connection_queues(engine: &IrcEngine, conn: &Arc<IrcConnection>) {
    loop {
        match parse_next_recv_queue_item(engine, conn) {
            Ok(()) => {}
            Err(IrcStatus::QueueEmpty) => break,
            Err(e) => debug!(connection = conn.id(), code = e.error_code(), "line dropped: {}", e),
        }
    }
}

/// Drain every live connection, then release pooled objects nobody holds.
pub fn parse_all(engine: &IrcEngine) {
    for conn in engine.pools().connections.allocated() {
        parse_connection_queues(engine, &conn);
    }
    let released = engine.pools().reclaim();
    if released > 0 {
        debug!(released, "reclaimed deferred objects");
    }
}

/// Body of the parser task.
///
/// Holds the engine weakly so the task never keeps it alive; exits when
/// the engine is gone, quitting, or the shutdown signal fires.
pub(crate) async fn run(engine: Weak<IrcEngine>, sync: Arc<Notify>, mut shutdown: broadcast::Receiver<()>) {
    loop {
        tokio::select! {
            _ = sync.notified() => {}
            _ = shutdown.recv() => break,
        }

        let Some(engine) = engine.upgrade() else {
            break;
        };
        if engine.is_quitting() {
            break;
        }
        parse_all(&engine);
    }
    debug!("parser task exiting");
}
