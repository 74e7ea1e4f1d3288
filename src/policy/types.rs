//! Policy Types
//!
//! Stored policy rows (guild-wide defaults, per-channel overrides) and the
//! derived effective policy used for one alerting decision.

use serde::{Deserialize, Serialize};

use crate::severity::Severity;

// ============================================================================
// STORED POLICY
// ============================================================================

/// Guild-wide monitoring policy. One row per guild, created lazily on the
/// first configuration write and never deleted (reset to defaults instead).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildPolicy {
    pub guild_id: u64,
    /// Master switch for message scanning in this guild
    pub enabled: bool,
    /// Default alert verbosity for channels without an override
    pub verbose: bool,
    /// Minimum severity a record must clear to be surfaced
    pub severity_threshold: Severity,
}

impl GuildPolicy {
    /// Defaults applied on first-touch auto-creation.
    pub fn defaults(guild_id: u64) -> Self {
        Self {
            guild_id,
            enabled: true,
            verbose: false,
            severity_threshold: Severity::All,
        }
    }
}

/// Per-channel policy row. The presence of any rows for a guild switches
/// that guild into allow-list mode; zero rows means every channel is
/// monitored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPolicy {
    pub guild_id: u64,
    pub channel_id: u64,
    pub enabled: bool,
    /// Tri-state verbosity: `None` inherits the guild default.
    pub verbose_override: Option<bool>,
}

// ============================================================================
// EFFECTIVE POLICY
// ============================================================================

/// Resolved policy for one (guild, channel) pair. Derived, never stored,
/// recomputed on every message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectivePolicy {
    pub enabled: bool,
    pub verbose: bool,
    pub severity_threshold: Severity,
}

impl EffectivePolicy {
    /// The fail-closed result: monitoring off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            verbose: false,
            severity_threshold: Severity::All,
        }
    }
}
