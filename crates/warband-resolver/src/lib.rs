//! Pure battle resolution (spec §4.4): given an RNG and a grouping of
//! combatants at one contested location, produces survivors, fatalities,
//! and an ordered combat-event trace. Touches no I/O and no shared state.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod aggregate;
mod gaussian;
mod initiative;
mod resolve;
mod types;

pub use gaussian::sample as gaussian_sample;
pub use resolve::BattleResolver;
pub use types::{
    BattleInput, BattleOutcome, CombatEvent, CombatantInBattle, EventKind, EventResult,
    ExperienceAward,
};
