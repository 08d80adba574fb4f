//! Row types for the durable state model (spec §3).

use warband_core::{CombatantId, Day, Faction, LocationId};

/// A combatant as read back from the store.
///
/// `location.is_none()` iff `next_location.is_none()` (invariant I1,
/// enforced by every Store method that touches either field — never by a
/// database constraint alone, since the two columns are nullable
/// independently at the schema level).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Combatant {
    /// Internal numeric id, stable for the combatant's lifetime.
    pub id: CombatantId,
    /// Opaque external principal id supplied at join.
    pub principal: String,
    /// Faction chosen at join; immutable thereafter.
    pub faction: Faction,
    /// Stable class slug; resolved to a [`warband_classes::Class`] by callers.
    pub class: String,
    /// Current rank, `1..=cap(class)`.
    pub rank: u16,
    /// Accrued experience, non-negative.
    pub experience: u16,
    /// Current location; `None` means dead.
    pub location: Option<LocationId>,
    /// Next-day destination; `None` iff `location` is `None`.
    pub next_location: Option<LocationId>,
    /// Whether this combatant is visible to queries (`false` after quit).
    pub active: bool,
    /// Whether this combatant should receive personal narrative events.
    pub receive_updates: bool,
}

/// A location as read back from the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    /// Numeric id.
    pub id: LocationId,
    /// Display name.
    pub name: String,
    /// Faction holding durable title, if any.
    pub owner: Option<Faction>,
    /// Faction that held the ground at the end of the most recent tick, if any.
    pub occupier: Option<Faction>,
}

/// One kind of ownership change recorded in the audit trail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OwnershipEvent {
    /// The location's owner changed.
    Capture,
    /// The location's occupier changed.
    Occupy,
}

/// One combat event recorded in the audit trail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CombatKind {
    /// A direct attack.
    Attack,
    /// A counter-attack following a failed defense.
    CounterAttack,
    /// A revive attempt.
    Revive,
}

/// The outcome of one combat event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CombatResult {
    /// The action succeeded.
    Success,
    /// The action was attempted and failed.
    Failure,
    /// No valid target existed; the action was not attempted.
    NoTarget,
}

/// A single combat-record row to append, as produced by the resolver and
/// applied by the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CombatRecord {
    /// Day the event occurred on.
    pub day: Day,
    /// Location the event occurred at.
    pub location: LocationId,
    /// Kind of combat action.
    pub kind: CombatKind,
    /// Attacking (or reviving) combatant.
    pub attacker: CombatantId,
    /// Defending (or revived) combatant.
    pub defender: CombatantId,
    /// Attacker's class slug at the time of the event.
    pub attacker_class: String,
    /// Defender's class slug at the time of the event.
    pub defender_class: String,
    /// Outcome.
    pub result: CombatResult,
}

/// A single move record, appended whenever a combatant's location changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveRecord {
    /// Day the move occurred on.
    pub day: Day,
    /// Location before the move, if any.
    pub location_before: Option<LocationId>,
    /// Location after the move; `None` means the combatant died.
    pub location_after: Option<LocationId>,
    /// The combatant that moved (or died).
    pub combatant: CombatantId,
}

/// A single ownership record, appended whenever an owner or occupier changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnershipRecord {
    /// Day the change occurred on.
    pub day: Day,
    /// Location whose owner or occupier changed.
    pub location: LocationId,
    /// Which field changed.
    pub event: OwnershipEvent,
    /// The faction that became the new owner or occupier.
    pub faction: Faction,
}
