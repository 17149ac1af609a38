//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_port() -> u16 {
    6667
}

// =============================================================================
// Profile Defaults
// =============================================================================

pub fn default_ident() -> String {
    "sbi".to_string()
}

pub fn default_real_name() -> String {
    "Social Bot Interface".to_string()
}

pub fn default_autoident_service() -> String {
    "NickServ".to_string()
}

/// RFC 2812 USER mode: 8 requests +i.
pub fn default_user_mode() -> u16 {
    8
}

// =============================================================================
// Network Defaults
// =============================================================================

pub fn default_encoding() -> String {
    "utf-8".to_string()
}

// =============================================================================
// Engine Defaults
// =============================================================================

pub fn default_client_version() -> String {
    format!("sbi-irc {}", env!("CARGO_PKG_VERSION"))
}

pub fn default_quit_reason() -> String {
    "Social Bot Interface".to_string()
}

pub fn default_join_timeout_ms() -> u64 {
    1000
}
