//! Core types and error taxonomy for the Warband territorial combat simulation.
//!
//! This is the leaf crate with zero internal Warband dependencies. It
//! defines the fundamental identifiers, the three-faction closed set, and
//! the error enums shared across the tick engine, the resolver, the store,
//! and the command layer.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod faction;
pub mod id;

pub use error::{CommandError, ResolverError, StoreError, TickError};
pub use faction::Faction;
pub use id::{CombatantId, Day, LocationId};
