//! Classification helpers shared by the handlers.

use crate::state::ServerInfo;

/// True if `target` starts with one of the server's channel type characters.
///
/// Always false before 005 has been seen.
pub fn has_channel_prefix(server: &ServerInfo, target: &str) -> bool {
    target
        .chars()
        .next()
        .is_some_and(|c| server.chan_types.contains(c))
}

/// True if `mode` consumes an argument when set (`is_set`) or cleared.
///
/// Prefix modes and classes A and B always do, class C only when set,
/// class D and unknown modes never. Before 005 the prefix modes are the
/// RFC 1459 `o` and `v`.
pub fn mode_has_argument(server: &ServerInfo, is_set: bool, mode: char) -> bool {
    server.prefix_spec().is_prefix_mode(mode)
        || server.supported_modes_a.contains(mode)
        || server.supported_modes_b.contains(mode)
        || (is_set && server.supported_modes_c.contains(mode))
}
