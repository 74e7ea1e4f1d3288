//! Policy Module
//!
//! Layered alerting policy: guild-wide defaults plus per-channel
//! overrides, persisted in SQLite and composed into an effective policy
//! at resolve time.
//!
//! ## Structure
//! - `types`: GuildPolicy, ChannelPolicy, EffectivePolicy
//! - `store`: SQLite persistence (PolicyStore)
//! - `resolver`: Effective-policy computation, fails closed
//!
//! ## Usage
//! ```ignore
//! use vulnwatch::policy::{PolicyStore, resolve};
//!
//! let store = PolicyStore::open(&vulnwatch::policy::default_db_path())?;
//! let effective = resolve(&store, guild_id, channel_id);
//! if effective.enabled {
//!     // scan the message
//! }
//! ```

pub mod resolver;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use resolver::{effective_verbosity, resolve};
pub use store::{default_db_path, PolicyStore, StoreError};
pub use types::{ChannelPolicy, EffectivePolicy, GuildPolicy};
