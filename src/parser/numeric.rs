//! Numeric reply handlers.
//!
//! Registration (001–005), channel topic and NAMES (331–366), MOTD
//! (372–376) and nickname collisions (432/433).

use sbi_proto::isupport::{IsupportLine, atoi};
use sbi_proto::message::parse_parameters;
use sbi_proto::{ChanModes, ModeUpdate, PrefixSpec, split_sender};
use tracing::{debug, info};

use crate::connection::ConnState;
use crate::error::{IrcResult, IrcStatus};
use crate::listener::IrcEvent;

use super::context::Context;

/// Text after the first `:` of the data, or nothing.
fn trailing(data: &str) -> &str {
    data.split_once(':').map_or("", |(_, rest)| rest)
}

// ============================================================================
// Registration
// ============================================================================

/// RPL_WELCOME: `trez :Welcome to the Example Network trez!tirc@host`
pub fn handle_001(ctx: &Context<'_>) -> IrcResult {
    let network = ctx.network()?;

    ctx.conn.set_primary(ConnState::ACTIVE);

    let (nick, message) = ctx
        .data
        .split_once(" :")
        .ok_or_else(|| IrcStatus::invalid("welcome without nickname"))?;

    network.with_server(|server| {
        server.reset_reported();
        server.server = ctx.sender.to_string();
    });

    if !network.is_own_nick(nick) {
        return Err(IrcStatus::NickIsNotClient(format!(
            "expected {}, server says {nick}",
            network.nickname()
        )));
    }

    info!(connection = ctx.conn.id(), nickname = %nick, server = %ctx.sender, "registered");
    ctx.notify(IrcEvent::Welcome {
        nickname: nick.to_string(),
        message: message.to_string(),
    });
    Ok(())
}

/// RPL_YOURHOST
pub fn handle_002(ctx: &Context<'_>) -> IrcResult {
    ctx.notify(IrcEvent::YourHost {
        message: trailing(ctx.data).to_string(),
    });
    Ok(())
}

/// RPL_CREATED
pub fn handle_003(ctx: &Context<'_>) -> IrcResult {
    ctx.notify(IrcEvent::Created {
        server: ctx.sender.to_string(),
        message: trailing(ctx.data).to_string(),
    });
    Ok(())
}

/// RPL_MYINFO: everything after our nickname.
pub fn handle_004(ctx: &Context<'_>) -> IrcResult {
    let message = ctx.data.split_once(' ').map_or("", |(_, rest)| rest);
    ctx.notify(IrcEvent::MyInfo {
        message: message.to_string(),
    });
    Ok(())
}

/// RPL_ISUPPORT. May arrive in several lines; values only ever overwrite.
pub fn handle_005(ctx: &Context<'_>) -> IrcResult {
    if !ctx.conn.is_active() {
        return Err(IrcStatus::InvalidState("005 before registration"));
    }
    let network = ctx.network()?;

    let (_nick, params) = ctx
        .data
        .split_once(' ')
        .ok_or_else(|| IrcStatus::invalid("005 without parameters"))?;
    let line = IsupportLine::parse(params);

    network.with_server(|server| -> IrcResult {
        for entry in &line.entries {
            let Some(value) = entry.value else {
                continue;
            };
            match entry.key {
                "NETWORK" => server.network = value.to_string(),
                "CHANTYPES" => server.chan_types = value.to_string(),
                "CASEMAPPING" => server.casemapping = value.to_string(),
                "NICKLEN" => server.max_len_nick = atoi(value),
                "KICKLEN" => server.max_len_kickmsg = atoi(value),
                "CHANNELLEN" => server.max_len_channel = atoi(value),
                "AWAYLEN" => server.max_len_away = atoi(value),
                "MODES" => server.max_num_modes = atoi(value),
                "TOPICLEN" => server.max_len_topic = atoi(value),
                "PREFIX" => {
                    let prefix = PrefixSpec::parse(value)?;
                    server.chan_mode_chars = prefix.modes.to_string();
                    server.chan_mode_symbols = prefix.prefixes.to_string();
                }
                "CHANLIMIT" => {
                    // #&:10,+:5 -> first listed limit
                    if let Some((_, limit)) = value.split(',').next().and_then(|p| p.split_once(':')) {
                        server.max_num_channels = atoi(limit);
                    }
                }
                "CHANMODES" => {
                    let modes = ChanModes::parse(value)?;
                    if modes.extra > 0 {
                        debug!(extra = modes.extra, "more CHANMODES classes than known");
                    }
                    server.supported_modes_a = modes.a.to_string();
                    server.supported_modes_b = modes.b.to_string();
                    server.supported_modes_c = modes.c.to_string();
                    server.supported_modes_d = modes.d.to_string();
                }
                _ => {}
            }
        }
        server.apply_rfc_defaults();
        Ok(())
    })?;

    let message = line
        .trailing
        .ok_or_else(|| IrcStatus::invalid("005 without trailing text"))?;

    ctx.notify(IrcEvent::ISupport {
        supported: line.supported(),
        message: message.to_string(),
    });
    Ok(())
}

// ============================================================================
// Topic
// ============================================================================

/// RPL_NOTOPIC
pub fn handle_331(ctx: &Context<'_>) -> IrcResult {
    let params = parse_parameters(ctx.data, &[false, true, true]);
    let name = params[1].unwrap_or_default();
    let channel = ctx.tracked_channel(name)?;
    channel.update_topic("");

    ctx.notify(IrcEvent::NoTopic {
        channel: channel.name().to_string(),
    });
    Ok(())
}

/// RPL_TOPIC, sent on join.
pub fn handle_332(ctx: &Context<'_>) -> IrcResult {
    let params = parse_parameters(ctx.data, &[false, true, true]);
    let (name, topic) = (params[1].unwrap_or_default(), params[2].unwrap_or_default());
    let channel = ctx.tracked_channel(name)?;
    channel.update_topic(topic);

    ctx.notify(IrcEvent::TopicOnJoin {
        channel: channel.name().to_string(),
        topic: topic.to_string(),
    });
    Ok(())
}

/// RPL_TOPICWHOTIME: `trez #chan setter!i@h 1349201058`
pub fn handle_333(ctx: &Context<'_>) -> IrcResult {
    let params = parse_parameters(ctx.data, &[false, true, true, true]);
    let channel = ctx.tracked_channel(params[1].unwrap_or_default())?;
    debug!(
        channel = %channel.name(),
        setter = %params[2].unwrap_or_default(),
        at = %params[3].unwrap_or_default(),
        "topic set"
    );
    Ok(())
}

// ============================================================================
// NAMES
// ============================================================================

/// RPL_NAMREPLY: `trez = #test :@op1 +voice1 plain1`
pub fn handle_353(ctx: &Context<'_>) -> IrcResult {
    let params = parse_parameters(ctx.data, &[false, false, true, true]);
    let (name, names) = (params[2].unwrap_or_default(), params[3].unwrap_or_default());
    let channel = ctx.tracked_channel(name)?;

    // the RFC 1459 mapping stands in for NAMES before 005
    let server = ctx.network()?.server();
    let prefix = server.prefix_spec();

    let mut count = 0;
    for entry in names.split_ascii_whitespace() {
        let mut update = ModeUpdate::default();
        let who = entry.trim_start_matches(|c: char| match prefix.privilege_for_symbol(c) {
            Some(privilege) => {
                update.to_add |= privilege;
                true
            }
            None => false,
        });
        if who.is_empty() {
            debug!(channel = %name, entry = %entry, "NAMES entry without nickname");
            continue;
        }

        let sender = split_sender(who)?;
        let user = ctx.engine.factory().create_user(&channel, &sender);
        let modes = (!update.to_add.is_empty()).then_some(&update);
        ctx.free_users(channel.add_names_user(user, modes));
        count += 1;
    }

    ctx.conn.insert_state(ConnState::RECV_NAMES);
    ctx.notify(IrcEvent::Names {
        channel: channel.name().to_string(),
        count,
    });
    Ok(())
}

/// RPL_ENDOFNAMES
pub fn handle_366(ctx: &Context<'_>) -> IrcResult {
    let params = parse_parameters(ctx.data, &[false, true, true]);
    let channel = ctx.tracked_channel(params[1].unwrap_or_default())?;

    ctx.free_users(channel.populate_userlist());
    ctx.conn.remove_state(ConnState::RECV_NAMES);

    let server = ctx.network()?.server();
    debug!(
        channel = %channel.name(),
        members = ?channel.nicklist(&server.prefix_spec()),
        "names complete"
    );

    ctx.notify(IrcEvent::EndOfNames {
        channel: channel.name().to_string(),
        members: channel.number_of_users(),
    });
    Ok(())
}

// ============================================================================
// MOTD
// ============================================================================

/// RPL_MOTD and RPL_MOTDSTART carry nothing we track.
pub fn handle_motd(_ctx: &Context<'_>) -> IrcResult {
    Ok(())
}

/// RPL_ENDOFMOTD: registration is complete.
pub fn handle_376(ctx: &Context<'_>) -> IrcResult {
    post_registration(ctx)
}

// ============================================================================
// Nickname collisions
// ============================================================================

/// ERR_ERRONEUSNICKNAME / ERR_NICKNAMEINUSE
pub fn handle_nick_rejected(ctx: &Context<'_>) -> IrcResult {
    let params = parse_parameters(ctx.data, &[false, true, true]);
    debug!(
        connection = ctx.conn.id(),
        code = %ctx.code,
        nickname = %params[1].unwrap_or_default(),
        "nickname rejected"
    );
    ctx.conn.auto_change_nick()
}

// ============================================================================
// Post-registration automation
// ============================================================================

/// Identify, run the configured commands and join the configured channels.
///
/// Runs at most once per connection between two cleanups, whichever of
/// 376 or the first NOTICE addressed to us comes first.
pub(super) fn post_registration(ctx: &Context<'_>) -> IrcResult {
    if !ctx.conn.is_active() || !ctx.conn.claim_auto_init() {
        return Ok(());
    }
    let network = ctx.network()?;
    let config = network.config();

    let password = network.client().autoauth_password;
    if network.profile().auto_identify && !password.is_empty() {
        ctx.conn.send_identify(&password)?;
    }
    if config.auto_exec_commands {
        for command in config.commands.iter().filter(|c| !c.is_empty()) {
            ctx.conn.send_raw(command)?;
        }
    }
    if config.auto_join_channels {
        for entry in &config.channels {
            let mut parts = entry.split_ascii_whitespace();
            if let Some(channel) = parts.next() {
                ctx.conn.send_join(channel, parts.next())?;
            }
        }
    }

    info!(
        connection = ctx.conn.id(),
        channels = config.channels.len(),
        "post-registration sequence sent"
    );
    ctx.notify(IrcEvent::ConnectionReady);
    Ok(())
}
