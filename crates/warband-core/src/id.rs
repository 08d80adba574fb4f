//! Strongly-typed identifiers.

use std::fmt;

/// Internal numeric identifier for a combatant.
///
/// Assigned by the store at `create()` time; stable for the combatant's
/// lifetime, including across soft-delete (quit) and kill/revive cycles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CombatantId(pub i64);

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CombatantId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// Identifies a location within the adjacency graph.
///
/// Locations and temples are fixture data; ids are stable for the life
/// of the deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationId(pub i32);

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for LocationId {
    fn from(v: i32) -> Self {
        Self(v)
    }
}

/// The single monotonically increasing calendar day counter.
///
/// Incremented exactly once per tick, at the start of the tick pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Day(pub i64);

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Day {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

impl Day {
    /// The day following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_next_increments() {
        assert_eq!(Day(0).next(), Day(1));
        assert_eq!(Day(41).next(), Day(42));
    }

    #[test]
    fn ids_display_their_inner_value() {
        assert_eq!(CombatantId(7).to_string(), "7");
        assert_eq!(LocationId(3).to_string(), "3");
        assert_eq!(Day(12).to_string(), "12");
    }
}
