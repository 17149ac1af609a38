//! Text command handlers.
//!
//! Each handler receives the decoded line through [`Context`], mutates the
//! tracked state and raises exactly one notification for it. A handler error
//! aborts that line only.

use std::sync::Arc;

use sbi_proto::ctcp::{Ctcp, CtcpKind};
use sbi_proto::message::parse_parameters;
use sbi_proto::mode::split_mode_changes;
use sbi_proto::{ChanFlags, ModeChange, ModeUpdate, PrefixSpec, rfc};
use tracing::{debug, warn};

use crate::error::{IrcResult, IrcStatus};
use crate::listener::IrcEvent;
use crate::state::IrcChannel;

use super::context::Context;
use super::helpers::{has_channel_prefix, mode_has_argument};
use super::numeric::post_registration;

/// Pseudo-targets servers address before they know our nickname.
const PREAUTH_TARGETS: [&str; 2] = ["AUTH", "*"];

/// First token of a single-target command, `:` stripped.
fn first_token(data: &str) -> &str {
    let data = data.strip_prefix(':').unwrap_or(data);
    data.split(' ').next().unwrap_or_default()
}

// ============================================================================
// CAP / INVITE
// ============================================================================

/// `* ACK :multi-prefix`, `* LS * :a b c` (continued), `* NAK :uhnames`
pub fn handle_cap(ctx: &Context<'_>) -> IrcResult {
    let params = parse_parameters(ctx.data, &[false, true, true]);
    let subcommand = params[1].unwrap_or_default();
    let rest = params[2].unwrap_or_default();
    let rest = rest.strip_prefix("* ").unwrap_or(rest);
    let capability = rest.strip_prefix(':').unwrap_or(rest);

    ctx.conn.with_caps(|caps| -> IrcResult {
        let list = match subcommand {
            "ACK" => &mut caps.ack,
            "NAK" => &mut caps.nak,
            "LS" => &mut caps.ls,
            other => return Err(IrcStatus::UnknownResponse(format!("CAP {other}"))),
        };
        list.extend(capability.split_ascii_whitespace().map(str::to_string));
        Ok(())
    })?;

    ctx.notify(IrcEvent::Cap {
        subcommand: subcommand.to_string(),
        capability: capability.to_string(),
    });
    Ok(())
}

/// `trez :#channel`
pub fn handle_invite(ctx: &Context<'_>) -> IrcResult {
    let params = parse_parameters(ctx.data, &[false, true]);
    let channel = params[1].unwrap_or_default();
    if channel.is_empty() {
        return Err(IrcStatus::ParsingError("INVITE without channel".into()));
    }

    ctx.notify(IrcEvent::Invite {
        instigator: ctx.instigator()?,
        channel: channel.to_string(),
    });
    Ok(())
}

// ============================================================================
// Membership: JOIN / KICK / PART / QUIT
// ============================================================================

pub fn handle_join(ctx: &Context<'_>) -> IrcResult {
    let name = first_token(ctx.data);
    if name.is_empty() {
        return Err(IrcStatus::ParsingError("JOIN without channel".into()));
    }
    let instigator = ctx.instigator()?;

    if ctx.is_self(&instigator.nickname)? {
        let channel = match ctx.conn.get_channel(name) {
            Some(channel) => channel,
            None => ctx.engine.factory().create_channel(ctx.conn, name)?,
        };
        channel.insert_flags(ChanFlags::ACTIVE);
        ctx.network()?
            .with_client(|client| client.hostmask = instigator.hostmask.clone());

        ctx.notify(IrcEvent::WeJoined {
            channel: channel.name().to_string(),
        });
        return Ok(());
    }

    let channel = ctx.tracked_channel(name)?;
    if !channel.is_active() {
        return Err(IrcStatus::InvalidState("JOIN for a channel we are not in"));
    }
    let user = ctx.engine.factory().create_user(&channel, &instigator);
    if let Err(e) = channel.add_user(Arc::clone(&user)) {
        ctx.free_users(vec![user]);
        return Err(e);
    }

    ctx.notify(IrcEvent::Join {
        channel: channel.name().to_string(),
        user: instigator,
    });
    Ok(())
}

/// `#channel kicked :reason`
pub fn handle_kick(ctx: &Context<'_>) -> IrcResult {
    let params = parse_parameters(ctx.data, &[true, true, true]);
    let (name, kicked, message) = (
        params[0].unwrap_or_default(),
        params[1].unwrap_or_default(),
        params[2].unwrap_or_default(),
    );
    let channel = ctx.tracked_channel(name)?;
    let instigator = ctx.instigator()?;

    if ctx.is_self(kicked)? {
        // stays tracked, raw, until the rejoin lands
        ctx.free_users(channel.cleanup());
        ctx.notify(IrcEvent::GotKicked {
            channel: channel.name().to_string(),
            instigator,
            message: message.to_string(),
        });
        return ctx.conn.send_join(channel.name(), None);
    }

    let user = channel
        .remove_user(kicked)
        .ok_or_else(|| IrcStatus::not_found(kicked))?;
    ctx.free_users(vec![user]);

    let event = if ctx.is_self(&instigator.nickname)? {
        IrcEvent::WeKicked {
            channel: channel.name().to_string(),
            kicked: kicked.to_string(),
            message: message.to_string(),
        }
    } else {
        IrcEvent::Kick {
            channel: channel.name().to_string(),
            instigator,
            kicked: kicked.to_string(),
            message: message.to_string(),
        }
    };
    ctx.notify(event);
    Ok(())
}

/// `#channel :reason`
pub fn handle_part(ctx: &Context<'_>) -> IrcResult {
    let params = parse_parameters(ctx.data, &[true, true]);
    let name = params[0].unwrap_or_default();
    let name = name.strip_prefix(':').unwrap_or(name);
    let message = params[1].unwrap_or_default();
    let instigator = ctx.instigator()?;

    if ctx.is_self(&instigator.nickname)? {
        let channel = ctx
            .conn
            .remove_channel(name)
            .ok_or_else(|| IrcStatus::not_found(name))?;
        ctx.engine.factory().free_channel(&channel);
        ctx.notify(IrcEvent::WeParted {
            channel: channel.name().to_string(),
            message: message.to_string(),
        });
        return Ok(());
    }

    let channel = ctx.tracked_channel(name)?;
    let user = channel
        .remove_user(&instigator.nickname)
        .ok_or_else(|| IrcStatus::not_found(instigator.nickname.as_str()))?;
    ctx.free_users(vec![user]);

    ctx.notify(IrcEvent::Part {
        channel: channel.name().to_string(),
        instigator,
        message: message.to_string(),
    });
    Ok(())
}

/// `:reason`. Only this connection's channels are touched.
pub fn handle_quit(ctx: &Context<'_>) -> IrcResult {
    let message = ctx
        .data
        .strip_prefix(':')
        .ok_or_else(|| IrcStatus::invalid("QUIT without trailing reason"))?;
    let instigator = ctx.instigator()?;

    if ctx.is_self(&instigator.nickname)? {
        ctx.conn.erase_channels();
        ctx.notify(IrcEvent::WeQuit {
            message: message.to_string(),
        });
        return Ok(());
    }

    let affected: Vec<Arc<IrcChannel>> = ctx
        .conn
        .channels()
        .into_iter()
        .filter(|c| c.get_user(&instigator.nickname).is_some())
        .collect();

    // listeners see the membership as it was
    ctx.notify(IrcEvent::Quit {
        instigator: instigator.clone(),
        message: message.to_string(),
        channels: affected.iter().map(|c| c.name().to_string()).collect(),
    });

    if affected.is_empty() {
        warn!(
            connection = ctx.conn.id(),
            nickname = %instigator.nickname,
            "QUIT from a user in none of our channels"
        );
    }
    for channel in &affected {
        if let Some(user) = channel.remove_user(&instigator.nickname) {
            ctx.free_users(vec![user]);
        }
    }
    Ok(())
}

// ============================================================================
// KILL / NICK / PONG / TOPIC
// ============================================================================

/// `target :reason`
pub fn handle_kill(ctx: &Context<'_>) -> IrcResult {
    let params = parse_parameters(ctx.data, &[true, true]);
    let (target, message) = (params[0].unwrap_or_default(), params[1].unwrap_or_default());
    let instigator = ctx.instigator()?;

    if ctx.is_self(target)? {
        ctx.notify(IrcEvent::GotKilled {
            instigator,
            message: message.to_string(),
        });
        return Ok(());
    }

    ctx.notify(IrcEvent::Kill {
        instigator,
        target: target.to_string(),
        message: message.to_string(),
    });
    Err(IrcStatus::NickIsNotClient(target.to_string()))
}

/// `:newnick`. Renames the user in every channel of this connection.
pub fn handle_nick(ctx: &Context<'_>) -> IrcResult {
    let nickname = first_token(ctx.data);
    if nickname.is_empty() {
        return Err(IrcStatus::ParsingError("NICK without nickname".into()));
    }
    let instigator = ctx.instigator()?;

    for channel in ctx.conn.channels() {
        if let Some(user) = channel.get_user(&instigator.nickname) {
            user.update(Some(nickname), None, None, None);
        }
    }

    if ctx.is_self(&instigator.nickname)? {
        ctx.network()?.set_nickname(nickname);
        ctx.notify(IrcEvent::GotNickChanged {
            old: instigator.nickname,
            nickname: nickname.to_string(),
        });
    } else {
        ctx.notify(IrcEvent::Nick {
            instigator,
            nickname: nickname.to_string(),
        });
    }
    Ok(())
}

pub fn handle_pong(ctx: &Context<'_>) -> IrcResult {
    if let Some(lag) = ctx.conn.clear_lag() {
        debug!(connection = ctx.conn.id(), lag_ms = lag.as_millis() as u64, "lag probe answered");
    }
    Ok(())
}

/// `#channel :new topic`
pub fn handle_topic(ctx: &Context<'_>) -> IrcResult {
    let params = parse_parameters(ctx.data, &[true, true]);
    let (name, topic) = (params[0].unwrap_or_default(), params[1].unwrap_or_default());
    let channel = ctx.tracked_channel(name)?;
    channel.update_topic(topic);

    ctx.notify(IrcEvent::Topic {
        channel: channel.name().to_string(),
        instigator: ctx.instigator()?,
        topic: topic.to_string(),
    });
    Ok(())
}

// ============================================================================
// Messages: NOTICE / PRIVMSG
// ============================================================================

/// `target :text`
pub fn handle_notice(ctx: &Context<'_>) -> IrcResult {
    let params = parse_parameters(ctx.data, &[true, true]);
    let (target, message) = (params[0].unwrap_or_default(), params[1].unwrap_or_default());

    if PREAUTH_TARGETS.contains(&target) {
        // nickname not confirmed yet
        return Ok(());
    }
    if ctx.is_self(target)? {
        post_registration(ctx)?;
    }

    ctx.notify(IrcEvent::Notice {
        instigator: ctx.instigator()?,
        target: target.to_string(),
        message: message.to_string(),
    });
    Ok(())
}

/// `target :text`, with CTCP ACTION and VERSION handled here.
pub fn handle_privmsg(ctx: &Context<'_>) -> IrcResult {
    let params = parse_parameters(ctx.data, &[true, true]);
    let (target, message) = (params[0].unwrap_or_default(), params[1].unwrap_or_default());
    let instigator = ctx.instigator()?;

    if let Some(ctcp) = Ctcp::parse(message) {
        match ctcp.kind {
            CtcpKind::Action => {
                ctx.notify(IrcEvent::Action {
                    instigator,
                    target: target.to_string(),
                    message: ctcp.params.unwrap_or_default().to_string(),
                });
                return Ok(());
            }
            CtcpKind::Version => {
                debug!(connection = ctx.conn.id(), from = %instigator.nickname, "CTCP VERSION");
                return ctx.conn.send_bypass(format!(
                    "NOTICE {} :\x01VERSION {}\x01",
                    instigator.nickname,
                    ctx.engine.config().client_version
                ));
            }
            CtcpKind::Other(name) => {
                debug!(connection = ctx.conn.id(), ctcp = %name, "unhandled CTCP");
            }
        }
    }

    let server = ctx.network()?.server();
    let channel = if has_channel_prefix(&server, target) {
        Some(ctx.tracked_channel(target)?.name().to_string())
    } else {
        None
    };

    ctx.notify(IrcEvent::Privmsg {
        instigator,
        channel,
        target: target.to_string(),
        message: message.to_string(),
    });
    Ok(())
}

// ============================================================================
// MODE
// ============================================================================

/// `trez :+ix`, `#chan +nt`, `#chan +ov-b alice bob *!*@spam`
pub fn handle_mode(ctx: &Context<'_>) -> IrcResult {
    let params = parse_parameters(ctx.data, &[true, true, true]);
    let (target, changes, affected) = (
        params[0].unwrap_or_default(),
        params[1].unwrap_or_default(),
        params[2].unwrap_or_default(),
    );
    if target.is_empty() || changes.is_empty() {
        return Err(IrcStatus::ParsingError("MODE without changes".into()));
    }
    let changes = changes.strip_prefix(':').unwrap_or(changes);

    if ctx.is_self(target)? {
        ctx.notify(IrcEvent::GotUserMode {
            modes: changes.to_string(),
        });
        return Ok(());
    }

    let server = ctx.network()?.server();
    let list = if affected.is_empty() {
        let list = split_mode_changes(changes, |_, _| false)
            .ok_or_else(|| IrcStatus::invalid(changes))?;
        let limit = match server.max_num_modes {
            0 => rfc::RFC1459_MODES as usize,
            n => usize::from(n),
        };
        if list.len() > limit {
            return Err(IrcStatus::LimitExceeded(format!(
                "{} mode changes, server allows {limit}",
                list.len()
            )));
        }
        list
    } else {
        let mut list = split_mode_changes(changes, |is_set, mode| {
            mode_has_argument(&server, is_set, mode)
        })
        .ok_or_else(|| IrcStatus::invalid(changes))?;

        let mut args = affected.split_ascii_whitespace();
        for change in list.iter_mut().filter(|c| c.has_data) {
            match args.next() {
                Some(arg) => change.data = Some(arg.to_string()),
                None => debug!(
                    connection = ctx.conn.id(),
                    mode = %change.mode,
                    "no argument left for mode change"
                ),
            }
        }
        list
    };

    let instigator = ctx.instigator()?;
    if !has_channel_prefix(&server, target) {
        ctx.notify(IrcEvent::Mode {
            target: target.to_string(),
            instigator,
            changes: list,
        });
        return Ok(());
    }

    let channel = ctx.tracked_channel(target)?;
    apply_channel_modes(&channel, &server.prefix_spec(), &list);

    let network = ctx.network()?;
    let names_us = list
        .iter()
        .any(|c| c.data.as_deref().is_some_and(|d| network.is_own_nick(d)));

    let event = if names_us {
        IrcEvent::GotChannelMode {
            channel: channel.name().to_string(),
            instigator,
            changes: list,
        }
    } else {
        IrcEvent::Mode {
            target: channel.name().to_string(),
            instigator,
            changes: list,
        }
    };
    ctx.notify(event);
    Ok(())
}

/// Apply privilege changes to members and flag changes to the channel.
///
/// Which letters are privileges comes from the server's PREFIX.
fn apply_channel_modes(channel: &IrcChannel, prefix: &PrefixSpec<'_>, changes: &[ModeChange]) {
    for change in changes {
        if let Some(privilege) = prefix.privilege_for_mode(change.mode) {
            let Some(nickname) = change.data.as_deref() else {
                continue;
            };
            match channel.get_user(nickname) {
                Some(user) => {
                    let update = if change.is_set {
                        ModeUpdate::add(privilege)
                    } else {
                        ModeUpdate::remove(privilege)
                    };
                    user.update(None, None, None, Some(&update));
                }
                None => debug!(channel = %channel.name(), nickname = %nickname, "mode for unknown member"),
            }
        } else if let Some(flag) = ChanFlags::from_mode_char(change.mode) {
            if change.is_set {
                channel.insert_flags(flag);
            } else {
                channel.remove_flags(flag);
            }
        }
    }
}
