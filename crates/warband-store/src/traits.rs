//! The [`Store`] trait: typed, atomic persistence operations (spec §4.2).
//!
//! Every method takes a [`CancellationToken`] and honors it (spec §5: "Store
//! operations must honor [the ambient cancellation signal] and abort
//! cleanly"). Every method that groups a state mutation with its matching
//! audit row does so inside one database transaction, so a crash mid-write
//! never leaves one without the other (I4, I5).

use std::future::Future;

use tokio_util::sync::CancellationToken;
use warband_core::{CombatantId, Day, Faction, LocationId, StoreError};

use crate::types::{CombatRecord, Combatant, Location};

/// Durable state operations for the simulation.
///
/// Implemented by [`crate::pg::PgStore`] against Postgres. Kept as a trait
/// so `warband-engine` and `warband-command` can be exercised in tests
/// against an in-memory double without a reachable database.
pub trait Store: Send + Sync {
    /// Fetch one location by id. `None` if it doesn't exist.
    fn get_location(
        &self,
        id: LocationId,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Option<Location>, StoreError>> + Send;

    /// The ids adjacent to `id` in the undirected adjacency graph.
    fn adjacent_locations(
        &self,
        id: LocationId,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<LocationId>, StoreError>> + Send;

    /// The fixed home location for a faction.
    fn temple_location(
        &self,
        faction: Faction,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<LocationId, StoreError>> + Send;

    /// Set a location's owner. Appends an ownership record with
    /// `event=capture` iff the owner's value actually changes; a same-value
    /// call is a no-op write with no audit row (Open Question resolution,
    /// `DESIGN.md`).
    fn set_owner(
        &self,
        id: LocationId,
        faction: Faction,
        day: Day,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Set a location's occupier. Appends an ownership record with
    /// `event=occupy` whenever the occupier's value changes, including a
    /// transition from `None`.
    fn set_occupier(
        &self,
        id: LocationId,
        faction: Faction,
        day: Day,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Clear a location's occupier to `None` (every combatant present died
    /// in the day's battle, so nobody holds the ground). No faction to
    /// name, so no ownership record is appended; the occupier column
    /// simply goes null. A no-op if the occupier is already `None`.
    fn clear_occupier(
        &self,
        id: LocationId,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Locations with at least one combat record for the given day.
    fn locations_with_combat_today(
        &self,
        day: Day,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<LocationId>, StoreError>> + Send;

    /// Create a new combatant for `principal` at `faction`'s temple,
    /// `class=recruit`, `rank=1`. Caller must have already confirmed the
    /// principal has no active combatant (state/conflict is a
    /// `warband-command` concern, not a `Store` one).
    fn create_combatant(
        &self,
        principal: &str,
        faction: Faction,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<CombatantId, StoreError>> + Send;

    /// The active combatant for `principal`, if any. Never errors on a
    /// miss — returns `Ok(None)`.
    fn find_active_by_principal(
        &self,
        principal: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Option<Combatant>, StoreError>> + Send;

    /// The combatant for `principal` regardless of `active`, if any. Used
    /// to distinguish "never joined" from "joined, then quit" at `join`
    /// time (rejoin-ban semantics).
    fn find_by_principal(
        &self,
        principal: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Option<Combatant>, StoreError>> + Send;

    /// Soft-delete: set `active=false`. The row and its principal id are
    /// retained permanently for rejoin-ban semantics.
    fn deactivate(
        &self,
        id: CombatantId,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Permanently remove a combatant row. Administrative use only; no
    /// command path calls this.
    fn hard_delete(
        &self,
        id: CombatantId,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Set a combatant's next-day destination.
    fn set_next_location(
        &self,
        id: CombatantId,
        destination: LocationId,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Copy `next_location` into `location` for every alive combatant whose
    /// two columns currently differ, appending a move record for each.
    /// Returns the number of combatants moved.
    fn commit_movement(
        &self,
        day: Day,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Every combatant, including inactive and dead ones.
    fn list_all(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<Combatant>, StoreError>> + Send;

    /// Every active, alive (`location` non-null) combatant.
    fn list_alive(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<Combatant>, StoreError>> + Send;

    /// Kill a combatant: append a move record with `location_after=None`,
    /// then null both `location` and `next_location`.
    fn kill(
        &self,
        id: CombatantId,
        day: Day,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Restore every dead combatant of `faction` to that faction's temple
    /// (both `location` and `next_location`), appending a move record for
    /// each. Caller is responsible for first checking the temple is
    /// currently owned by `faction`. Returns the number of combatants
    /// revived.
    fn revive_faction(
        &self,
        faction: Faction,
        day: Day,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Apply a class/rank advance: set `class` and `rank`, subtract 100
    /// experience (I7). Caller has already validated the advance against
    /// the class lattice and the experience threshold.
    fn advance(
        &self,
        id: CombatantId,
        class: &str,
        rank: u16,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Add (or, if negative, subtract, floored at 0) to a combatant's
    /// experience. Used to apply `ExperienceAward`s from the battle trace.
    fn add_experience(
        &self,
        id: CombatantId,
        delta: i32,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Flip the receive-updates flag, returning its new value.
    fn toggle_updates(
        &self,
        id: CombatantId,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// The current calendar day.
    fn get_day(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Day, StoreError>> + Send;

    /// Increment the calendar day by one, returning the new value.
    fn increment_day(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Day, StoreError>> + Send;

    /// Append one combat-record row.
    fn append_combat_record(
        &self,
        record: &CombatRecord,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
