//! Policy Resolver
//!
//! Composes guild defaults and channel overrides into the effective
//! policy for one (guild, channel) pair. Fails closed: any store error or
//! missing guild row resolves to "disabled".

use super::store::PolicyStore;
use super::types::EffectivePolicy;

// ============================================================================
// PRECEDENCE
// ============================================================================

/// Pure precedence function for tri-state overrides: an explicit channel
/// value wins, otherwise the guild default applies.
pub fn effective_verbosity(global: bool, channel_override: Option<bool>) -> bool {
    channel_override.unwrap_or(global)
}

// ============================================================================
// RESOLVE
// ============================================================================

/// Resolve the effective alerting policy for a channel.
///
/// Allow-list semantics: if the guild has any channel rows, the channel
/// must appear with enabled=true; if it has none, every channel is
/// monitored. The severity threshold is guild-global (channel-level
/// severity overrides are not supported).
pub fn resolve(store: &PolicyStore, guild_id: u64, channel_id: u64) -> EffectivePolicy {
    let guild = match store.get_guild_policy(guild_id) {
        Ok(Some(g)) => g,
        Ok(None) => {
            log::debug!("No guild policy for guild {}, monitoring disabled", guild_id);
            return EffectivePolicy::disabled();
        }
        Err(e) => {
            log::error!(
                "Policy store unreachable resolving guild {}: {}. Failing closed.",
                guild_id,
                e
            );
            return EffectivePolicy::disabled();
        }
    };

    if !guild.enabled {
        return EffectivePolicy::disabled();
    }

    let channels = match store.list_channel_policies(guild_id) {
        Ok(rows) => rows,
        Err(e) => {
            log::error!(
                "Policy store unreachable listing channels for guild {}: {}. Failing closed.",
                guild_id,
                e
            );
            return EffectivePolicy::disabled();
        }
    };

    let channel_row = channels.iter().find(|c| c.channel_id == channel_id);

    // Non-empty row set means allow-list mode
    if !channels.is_empty() {
        match channel_row {
            Some(row) if row.enabled => {}
            _ => {
                log::debug!(
                    "Channel {} not in the monitored set for guild {}",
                    channel_id,
                    guild_id
                );
                return EffectivePolicy::disabled();
            }
        }
    }

    let verbose = effective_verbosity(
        guild.verbose,
        channel_row.and_then(|row| row.verbose_override),
    );

    EffectivePolicy {
        enabled: true,
        verbose,
        severity_threshold: guild.severity_threshold,
    }
}

// ============================================================================
// TESTS
// ============================================================================
