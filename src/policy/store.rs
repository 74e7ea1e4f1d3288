//! Policy Store
//!
//! SQLite-backed persistence for guild and channel alerting policy.
//! Individual reads/writes are atomic at the connection level; the
//! resolver's multi-read sequence is deliberately not transactional.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::severity::Severity;

use super::types::{ChannelPolicy, GuildPolicy};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt severity label in store: {0}")]
    CorruptSeverity(String),
}

// ============================================================================
// STORE
// ============================================================================

/// Default database location under the platform data directory.
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vulnwatch")
        .join("policy.db")
}

/// Layered policy configuration store.
pub struct PolicyStore {
    conn: Mutex<Connection>,
}

impl PolicyStore {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        log::info!("Opened policy store at {:?}", path);
        Ok(store)
    }

    /// In-memory store, used by tests and ephemeral deployments.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS guild_policy (
                guild_id           INTEGER PRIMARY KEY,
                enabled            INTEGER NOT NULL,
                verbose            INTEGER NOT NULL,
                severity_threshold TEXT NOT NULL,
                last_updated       TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE TABLE IF NOT EXISTS channel_policy (
                guild_id         INTEGER NOT NULL,
                channel_id       INTEGER NOT NULL,
                enabled          INTEGER NOT NULL,
                verbose_override INTEGER,
                last_updated     TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (guild_id, channel_id)
            );",
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Guild policy
    // ------------------------------------------------------------------

    pub fn get_guild_policy(&self, guild_id: u64) -> Result<Option<GuildPolicy>, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT guild_id, enabled, verbose, severity_threshold
                 FROM guild_policy WHERE guild_id = ?1",
                params![guild_id as i64],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, bool>(1)?,
                        row.get::<_, bool>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((gid, enabled, verbose, label)) => {
                let severity_threshold = label
                    .parse::<Severity>()
                    .map_err(|_| StoreError::CorruptSeverity(label))?;
                Ok(Some(GuildPolicy {
                    guild_id: gid as u64,
                    enabled,
                    verbose,
                    severity_threshold,
                }))
            }
        }
    }

    pub fn set_guild_policy(
        &self,
        guild_id: u64,
        enabled: bool,
        verbose: bool,
        severity_threshold: Severity,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO guild_policy (guild_id, enabled, verbose, severity_threshold, last_updated)
             VALUES (?1, ?2, ?3, ?4, datetime('now'))
             ON CONFLICT(guild_id) DO UPDATE SET
                 enabled = excluded.enabled,
                 verbose = excluded.verbose,
                 severity_threshold = excluded.severity_threshold,
                 last_updated = datetime('now')",
            params![
                guild_id as i64,
                enabled,
                verbose,
                severity_threshold.as_str()
            ],
        )?;
        log::info!("Set guild policy for guild {}", guild_id);
        Ok(())
    }

    /// Materialize a default guild row if none exists yet. Every write-path
    /// operation calls this first so reads never see a half-initialized
    /// guild.
    fn ensure_guild_policy(&self, guild_id: u64) -> Result<(), StoreError> {
        if self.get_guild_policy(guild_id)?.is_none() {
            let d = GuildPolicy::defaults(guild_id);
            self.set_guild_policy(guild_id, d.enabled, d.verbose, d.severity_threshold)?;
            log::info!("Initialized default guild policy for guild {}", guild_id);
        }
        Ok(())
    }

    pub fn set_guild_enabled(&self, guild_id: u64, enabled: bool) -> Result<(), StoreError> {
        self.ensure_guild_policy(guild_id)?;
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE guild_policy
             SET enabled = ?2, last_updated = datetime('now')
             WHERE guild_id = ?1",
            params![guild_id as i64, enabled],
        )?;
        log::info!(
            "{} monitoring for guild {}",
            if enabled { "Enabled" } else { "Disabled" },
            guild_id
        );
        Ok(())
    }

    pub fn set_guild_verbose(&self, guild_id: u64, verbose: bool) -> Result<(), StoreError> {
        self.ensure_guild_policy(guild_id)?;
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE guild_policy
             SET verbose = ?2, last_updated = datetime('now')
             WHERE guild_id = ?1",
            params![guild_id as i64, verbose],
        )?;
        Ok(())
    }

    pub fn set_guild_severity_threshold(
        &self,
        guild_id: u64,
        threshold: Severity,
    ) -> Result<(), StoreError> {
        self.ensure_guild_policy(guild_id)?;
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE guild_policy
             SET severity_threshold = ?2, last_updated = datetime('now')
             WHERE guild_id = ?1",
            params![guild_id as i64, threshold.as_str()],
        )?;
        log::info!(
            "Set severity threshold to '{}' for guild {}",
            threshold,
            guild_id
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Channel policy
    // ------------------------------------------------------------------

    pub fn get_channel_policy(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<Option<ChannelPolicy>, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT guild_id, channel_id, enabled, verbose_override
                 FROM channel_policy WHERE guild_id = ?1 AND channel_id = ?2",
                params![guild_id as i64, channel_id as i64],
                Self::map_channel_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_channel_policies(&self, guild_id: u64) -> Result<Vec<ChannelPolicy>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT guild_id, channel_id, enabled, verbose_override
             FROM channel_policy WHERE guild_id = ?1 ORDER BY channel_id",
        )?;
        let rows = stmt.query_map(params![guild_id as i64], Self::map_channel_row)?;
        let mut policies = Vec::new();
        for row in rows {
            policies.push(row?);
        }
        Ok(policies)
    }

    /// Insert or update a channel row. `None` fields keep the current value
    /// (or the default for a fresh row).
    pub fn upsert_channel_policy(
        &self,
        guild_id: u64,
        channel_id: u64,
        enabled: Option<bool>,
        verbose_override: Option<Option<bool>>,
    ) -> Result<(), StoreError> {
        self.ensure_guild_policy(guild_id)?;
        let existing = self.get_channel_policy(guild_id, channel_id)?;
        let current = existing.unwrap_or(ChannelPolicy {
            guild_id,
            channel_id,
            enabled: true,
            verbose_override: None,
        });
        let enabled = enabled.unwrap_or(current.enabled);
        let verbose_override = verbose_override.unwrap_or(current.verbose_override);

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO channel_policy (guild_id, channel_id, enabled, verbose_override, last_updated)
             VALUES (?1, ?2, ?3, ?4, datetime('now'))
             ON CONFLICT(guild_id, channel_id) DO UPDATE SET
                 enabled = excluded.enabled,
                 verbose_override = excluded.verbose_override,
                 last_updated = datetime('now')",
            params![guild_id as i64, channel_id as i64, enabled, verbose_override],
        )?;
        log::info!(
            "Upserted channel policy for guild {} channel {} (enabled: {})",
            guild_id,
            channel_id,
            enabled
        );
        Ok(())
    }

    /// Remove a channel from the monitored set entirely. Deleting the last
    /// row for a guild returns that guild to global (all channels) mode.
    pub fn delete_channel_policy(&self, guild_id: u64, channel_id: u64) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM channel_policy WHERE guild_id = ?1 AND channel_id = ?2",
            params![guild_id as i64, channel_id as i64],
        )?;
        if deleted > 0 {
            log::info!(
                "Deleted channel policy for guild {} channel {}",
                guild_id,
                channel_id
            );
        } else {
            log::debug!(
                "No channel policy to delete for guild {} channel {}",
                guild_id,
                channel_id
            );
        }
        Ok(())
    }

    /// Set or clear the verbosity override for one channel. `None` means
    /// inherit the guild default.
    pub fn set_channel_verbosity_override(
        &self,
        guild_id: u64,
        channel_id: u64,
        value: Option<bool>,
    ) -> Result<(), StoreError> {
        self.upsert_channel_policy(guild_id, channel_id, None, Some(value))
    }

    /// Set the verbosity override on every configured channel of a guild.
    pub fn set_all_channel_verbosity(&self, guild_id: u64, value: bool) -> Result<(), StoreError> {
        self.ensure_guild_policy(guild_id)?;
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE channel_policy
             SET verbose_override = ?2, last_updated = datetime('now')
             WHERE guild_id = ?1",
            params![guild_id as i64, value],
        )?;
        log::info!(
            "Set verbosity override to {} on {} channel(s) for guild {}",
            value,
            updated,
            guild_id
        );
        Ok(())
    }

    fn map_channel_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChannelPolicy> {
        Ok(ChannelPolicy {
            guild_id: row.get::<_, i64>(0)? as u64,
            channel_id: row.get::<_, i64>(1)? as u64,
            enabled: row.get(2)?,
            verbose_override: row.get(3)?,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
