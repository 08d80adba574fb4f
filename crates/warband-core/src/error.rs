//! Error types for the Warband simulation, organized by subsystem.
//!
//! Maps the error taxonomy in spec §7 to Rust enums: store (persistence),
//! resolver (battle resolution invariants), tick (the daily pipeline), and
//! command (the per-command input/state errors the command layer surfaces
//! to a human principal).

use std::error::Error;
use std::fmt;

/// Errors from the persistence layer.
///
/// Corresponds to the `store/transient` and `store/fatal` codes in
/// spec §7.
#[derive(Debug)]
pub enum StoreError {
    /// The underlying driver reported a transient I/O failure (connection
    /// reset, timeout, pool exhaustion). Callers should log and fail the
    /// current operation; the next operation may succeed.
    Transient {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// A constraint violation implying data model corruption (`store/fatal`
    /// in spec §7) — e.g. a rank > cap row, or a combatant with exactly one
    /// of `location`/`next_location` null. Unrecoverable; the caller should
    /// treat this as fatal to the current tick or command.
    Fatal {
        /// Human-readable description of the violated constraint.
        reason: String,
    },
    /// The operation was cancelled via its ambient cancellation signal
    /// before completion.
    Cancelled,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient { reason } => write!(f, "transient store failure: {reason}"),
            Self::Fatal { reason } => write!(f, "fatal store failure: {reason}"),
            Self::Cancelled => write!(f, "store operation cancelled"),
        }
    }
}

impl Error for StoreError {}

/// Errors from the battle resolver.
///
/// Corresponds to `resolver/invariant` in spec §7: an unreachable branch,
/// such as exhausting the initiative-collision retry budget. The resolver
/// does not retry internally; this propagates to the tick engine, which
/// aborts the current tick (spec §7).
#[derive(Debug)]
pub enum ResolverError {
    /// Two combatants drew the same initiative value after the maximum
    /// number of re-draw attempts. Statistically near-impossible with a
    /// continuous Gaussian draw; treated as an invariant violation.
    InitiativeCollisionExhausted {
        /// Number of re-draw attempts made before giving up.
        attempts: u32,
    },
    /// A target was selected with a weighted draw that did not terminate
    /// (the aggro accounting and the iteration disagreed about who was
    /// still alive).
    TargetSelectionInconsistent {
        /// Description of the inconsistency.
        reason: String,
    },
}

impl fmt::Display for ResolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitiativeCollisionExhausted { attempts } => write!(
                f,
                "initiative collision not resolved after {attempts} attempts"
            ),
            Self::TargetSelectionInconsistent { reason } => {
                write!(f, "target selection inconsistent: {reason}")
            }
        }
    }
}

impl Error for ResolverError {}

/// Errors from one execution of the daily tick pipeline.
#[derive(Debug)]
pub enum TickError {
    /// A store operation failed during the tick. The tick is aborted at
    /// the step that failed; the writer lock is released; the next day's
    /// tick runs as normal (spec §7).
    Store(StoreError),
    /// The battle resolver hit an internal invariant violation. The
    /// current tick is lost.
    Resolver(ResolverError),
}

impl fmt::Display for TickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "tick aborted on store error: {e}"),
            Self::Resolver(e) => write!(f, "tick aborted on resolver error: {e}"),
        }
    }
}

impl Error for TickError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::Resolver(e) => Some(e),
        }
    }
}

impl From<StoreError> for TickError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<ResolverError> for TickError {
    fn from(e: ResolverError) -> Self {
        Self::Resolver(e)
    }
}

/// Errors surfaced to a human principal by the command layer.
///
/// Corresponds to `input/invalid`, `state/conflict`, and `busy` in
/// spec §7. These never cause a Store write; the command layer turns
/// each variant into reply text and the HTTP front door (out of scope)
/// always returns 200 regardless.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError {
    /// A write-locked tick is in progress; the probe reported busy.
    Busy,
    /// The command's faction argument did not match any known faction.
    UnknownFaction,
    /// The command's location argument did not resolve via the alias
    /// table, or did not resolve to a numeric id.
    UnknownLocation,
    /// The requested destination is neither the combatant's current
    /// location nor adjacent to it.
    NotAdjacent,
    /// The requested class is not reachable from the combatant's current
    /// class via the advance graph.
    UnknownAdvance,
    /// The combatant does not have the 100 experience required to advance.
    InsufficientExperience,
    /// The combatant's class/rank has no further class advances available
    /// (already at a capstone class awaiting a future expansion, or the
    /// advance graph has no children for this class).
    NoAdvancesAvailable,
    /// `join` was issued by a principal already active in some faction.
    AlreadyPlaying,
    /// `join` was issued by a principal that exists but was soft-deleted
    /// by a prior `quit` (rejoin-ban semantics, spec §3).
    GateClosed,
    /// A movement or advance command was issued by a combatant with no
    /// current location (dead).
    Dead,
    /// A command other than `join` was issued by a principal with no
    /// combatant at all (never joined).
    NotPlaying,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Busy => "the realm is mid-tick; try again in a moment",
            Self::UnknownFaction => "that isn't one of the three factions",
            Self::UnknownLocation => "unrecognized location",
            Self::NotAdjacent => "you can't reach that location from here",
            Self::UnknownAdvance => "that class isn't reachable from your current class",
            Self::InsufficientExperience => "not enough experience to advance",
            Self::NoAdvancesAvailable => "no class advances are available to you right now",
            Self::AlreadyPlaying => "you're already playing",
            Self::GateClosed => "that principal has quit and cannot rejoin",
            Self::Dead => "the dead cannot act",
            Self::NotPlaying => "you haven't joined a faction yet",
        };
        write!(f, "{msg}")
    }
}

impl Error for CommandError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_error_wraps_store_error() {
        let store_err = StoreError::Transient {
            reason: "timeout".into(),
        };
        let tick_err: TickError = store_err.into();
        assert!(matches!(tick_err, TickError::Store(_)));
        assert!(tick_err.source().is_some());
    }

    #[test]
    fn tick_error_wraps_resolver_error() {
        let resolver_err = ResolverError::InitiativeCollisionExhausted { attempts: 64 };
        let tick_err: TickError = resolver_err.into();
        assert!(matches!(tick_err, TickError::Resolver(_)));
    }

    #[test]
    fn command_error_display_is_human_readable() {
        assert_eq!(CommandError::Busy.to_string(), "the realm is mid-tick; try again in a moment");
        assert_eq!(CommandError::Dead.to_string(), "the dead cannot act");
    }
}
