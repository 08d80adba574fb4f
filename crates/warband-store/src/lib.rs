//! Durable state for the Warband simulation: combatants, locations,
//! adjacency, temples, calendar day, and the audit trail, backed by
//! Postgres via `sqlx`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod error;
#[cfg(feature = "test-util")]
pub mod memory;
mod pg;
mod traits;
mod types;

pub use error::map_sqlx_error;
pub use pg::PgStore;
pub use traits::Store;
pub use types::{
    CombatKind, CombatRecord, CombatResult, Combatant, Location, MoveRecord, OwnershipEvent,
    OwnershipRecord,
};
