//! An in-memory [`Store`] double, behind the `test-util` feature.
//!
//! Exercises `warband-engine` and `warband-command` against deterministic,
//! in-process state rather than a reachable Postgres instance.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use warband_core::{CombatantId, Day, Faction, LocationId, StoreError};

use crate::traits::Store;
use crate::types::{CombatRecord, Combatant, Location, MoveRecord, OwnershipEvent, OwnershipRecord};

#[derive(Default)]
struct State {
    combatants: HashMap<i64, Combatant>,
    next_combatant_id: i64,
    locations: HashMap<i32, Location>,
    adjacency: HashMap<i32, Vec<i32>>,
    temples: HashMap<Faction, i32>,
    day: i64,
    move_records: Vec<MoveRecord>,
    combat_records: Vec<CombatRecord>,
    ownership_records: Vec<OwnershipRecord>,
}

/// A `Send + Sync` in-memory [`Store`], guarded by a single [`Mutex`].
///
/// Every operation is synchronous under the hood; the `async fn`s never
/// actually await, matching the trait's shape without needing a runtime
/// to exercise. Seeded with a fixed map via [`InMemoryStore::seed`].
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    /// An empty store: no locations, no players, day 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed fixture locations, adjacency, and temples.
    ///
    /// `locations` is `(id, name)` pairs; `adjacency` is `(a, b)` undirected
    /// edges (inserted both directions); `temples` is `(faction, location)`.
    pub fn seed(
        &self,
        locations: impl IntoIterator<Item = (i32, &'static str)>,
        adjacency: impl IntoIterator<Item = (i32, i32)>,
        temples: impl IntoIterator<Item = (Faction, i32)>,
    ) {
        let mut state = self.state.lock().expect("in-memory store poisoned");
        for (id, name) in locations {
            state.locations.insert(
                id,
                Location {
                    id: LocationId(id),
                    name: name.to_string(),
                    owner: None,
                    occupier: None,
                },
            );
        }
        for (a, b) in adjacency {
            state.adjacency.entry(a).or_default().push(b);
            state.adjacency.entry(b).or_default().push(a);
        }
        for (faction, location) in temples {
            state.temples.insert(faction, location);
        }
    }

    /// Directly set a location's owner and occupier without auditing, for
    /// test setup (e.g. "set Staghorn temple owner to Gorgona").
    pub fn force_location(&self, id: LocationId, owner: Option<Faction>, occupier: Option<Faction>) {
        let mut state = self.state.lock().expect("in-memory store poisoned");
        if let Some(loc) = state.locations.get_mut(&id.0) {
            loc.owner = owner;
            loc.occupier = occupier;
        }
    }

    /// Snapshot every move record appended so far, for assertions.
    pub fn move_records(&self) -> Vec<MoveRecord> {
        self.state.lock().expect("in-memory store poisoned").move_records.clone()
    }

    /// Snapshot every ownership record appended so far, for assertions.
    pub fn ownership_records(&self) -> Vec<OwnershipRecord> {
        self.state
            .lock()
            .expect("in-memory store poisoned")
            .ownership_records
            .clone()
    }

    /// Snapshot every combat record appended so far, for assertions.
    pub fn combat_records(&self) -> Vec<CombatRecord> {
        self.state.lock().expect("in-memory store poisoned").combat_records.clone()
    }
}

fn check(cancel: &CancellationToken) -> Result<(), StoreError> {
    if cancel.is_cancelled() {
        Err(StoreError::Cancelled)
    } else {
        Ok(())
    }
}

impl Store for InMemoryStore {
    async fn get_location(&self, id: LocationId, cancel: &CancellationToken) -> Result<Option<Location>, StoreError> {
        check(cancel)?;
        let state = self.state.lock().expect("in-memory store poisoned");
        Ok(state.locations.get(&id.0).cloned())
    }

    async fn adjacent_locations(&self, id: LocationId, cancel: &CancellationToken) -> Result<Vec<LocationId>, StoreError> {
        check(cancel)?;
        let state = self.state.lock().expect("in-memory store poisoned");
        Ok(state
            .adjacency
            .get(&id.0)
            .map(|v| v.iter().map(|&a| LocationId(a)).collect())
            .unwrap_or_default())
    }

    async fn temple_location(&self, faction: Faction, cancel: &CancellationToken) -> Result<LocationId, StoreError> {
        check(cancel)?;
        let state = self.state.lock().expect("in-memory store poisoned");
        state
            .temples
            .get(&faction)
            .map(|&l| LocationId(l))
            .ok_or_else(|| StoreError::Fatal {
                reason: format!("no temple fixture for {faction}"),
            })
    }

    async fn set_owner(&self, id: LocationId, faction: Faction, day: Day, cancel: &CancellationToken) -> Result<(), StoreError> {
        check(cancel)?;
        let mut state = self.state.lock().expect("in-memory store poisoned");
        let changed = {
            let loc = state.locations.get_mut(&id.0).ok_or_else(|| StoreError::Fatal {
                reason: format!("set_owner: unknown location {id}"),
            })?;
            if loc.owner == Some(faction) {
                false
            } else {
                loc.owner = Some(faction);
                true
            }
        };
        if changed {
            state.ownership_records.push(OwnershipRecord {
                day,
                location: id,
                event: OwnershipEvent::Capture,
                faction,
            });
        }
        Ok(())
    }

    async fn set_occupier(&self, id: LocationId, faction: Faction, day: Day, cancel: &CancellationToken) -> Result<(), StoreError> {
        check(cancel)?;
        let mut state = self.state.lock().expect("in-memory store poisoned");
        let changed = {
            let loc = state.locations.get_mut(&id.0).ok_or_else(|| StoreError::Fatal {
                reason: format!("set_occupier: unknown location {id}"),
            })?;
            if loc.occupier == Some(faction) {
                false
            } else {
                loc.occupier = Some(faction);
                true
            }
        };
        if changed {
            state.ownership_records.push(OwnershipRecord {
                day,
                location: id,
                event: OwnershipEvent::Occupy,
                faction,
            });
        }
        Ok(())
    }

    async fn clear_occupier(&self, id: LocationId, cancel: &CancellationToken) -> Result<(), StoreError> {
        check(cancel)?;
        let mut state = self.state.lock().expect("in-memory store poisoned");
        if let Some(loc) = state.locations.get_mut(&id.0) {
            loc.occupier = None;
        }
        Ok(())
    }

    async fn locations_with_combat_today(&self, day: Day, cancel: &CancellationToken) -> Result<Vec<LocationId>, StoreError> {
        check(cancel)?;
        let state = self.state.lock().expect("in-memory store poisoned");
        let mut ids: Vec<LocationId> = state
            .combat_records
            .iter()
            .filter(|r| r.day == day)
            .map(|r| r.location)
            .collect();
        ids.sort_by_key(|l| l.0);
        ids.dedup();
        Ok(ids)
    }

    async fn create_combatant(&self, principal: &str, faction: Faction, cancel: &CancellationToken) -> Result<CombatantId, StoreError> {
        check(cancel)?;
        let mut state = self.state.lock().expect("in-memory store poisoned");
        let temple = *state.temples.get(&faction).ok_or_else(|| StoreError::Fatal {
            reason: format!("no temple fixture for {faction}"),
        })?;
        state.next_combatant_id += 1;
        let id = CombatantId(state.next_combatant_id);
        state.combatants.insert(
            id.0,
            Combatant {
                id,
                principal: principal.to_string(),
                faction,
                class: "recruit".to_string(),
                rank: 1,
                experience: 0,
                location: Some(LocationId(temple)),
                next_location: Some(LocationId(temple)),
                active: true,
                receive_updates: true,
            },
        );
        Ok(id)
    }

    async fn find_active_by_principal(&self, principal: &str, cancel: &CancellationToken) -> Result<Option<Combatant>, StoreError> {
        check(cancel)?;
        let state = self.state.lock().expect("in-memory store poisoned");
        Ok(state
            .combatants
            .values()
            .find(|c| c.active && c.principal == principal)
            .cloned())
    }

    async fn find_by_principal(&self, principal: &str, cancel: &CancellationToken) -> Result<Option<Combatant>, StoreError> {
        check(cancel)?;
        let state = self.state.lock().expect("in-memory store poisoned");
        Ok(state.combatants.values().find(|c| c.principal == principal).cloned())
    }

    async fn deactivate(&self, id: CombatantId, cancel: &CancellationToken) -> Result<(), StoreError> {
        check(cancel)?;
        let mut state = self.state.lock().expect("in-memory store poisoned");
        if let Some(c) = state.combatants.get_mut(&id.0) {
            c.active = false;
        }
        Ok(())
    }

    async fn hard_delete(&self, id: CombatantId, cancel: &CancellationToken) -> Result<(), StoreError> {
        check(cancel)?;
        let mut state = self.state.lock().expect("in-memory store poisoned");
        state.combatants.remove(&id.0);
        Ok(())
    }

    async fn set_next_location(&self, id: CombatantId, destination: LocationId, cancel: &CancellationToken) -> Result<(), StoreError> {
        check(cancel)?;
        let mut state = self.state.lock().expect("in-memory store poisoned");
        if let Some(c) = state.combatants.get_mut(&id.0) {
            c.next_location = Some(destination);
        }
        Ok(())
    }

    async fn commit_movement(&self, day: Day, cancel: &CancellationToken) -> Result<u64, StoreError> {
        check(cancel)?;
        let mut state = self.state.lock().expect("in-memory store poisoned");
        let mut moved = 0u64;
        let ids: Vec<i64> = state.combatants.keys().copied().collect();
        for id in ids {
            let (before, after, active) = {
                let c = &state.combatants[&id];
                (c.location, c.next_location, c.active)
            };
            if active && after.is_some() && before != after {
                state.combatants.get_mut(&id).unwrap().location = after;
                state.move_records.push(MoveRecord {
                    day,
                    location_before: before,
                    location_after: after,
                    combatant: CombatantId(id),
                });
                moved += 1;
            }
        }
        Ok(moved)
    }

    async fn list_all(&self, cancel: &CancellationToken) -> Result<Vec<Combatant>, StoreError> {
        check(cancel)?;
        let state = self.state.lock().expect("in-memory store poisoned");
        let mut out: Vec<Combatant> = state.combatants.values().cloned().collect();
        out.sort_by_key(|c| c.id);
        Ok(out)
    }

    async fn list_alive(&self, cancel: &CancellationToken) -> Result<Vec<Combatant>, StoreError> {
        check(cancel)?;
        let state = self.state.lock().expect("in-memory store poisoned");
        let mut out: Vec<Combatant> = state
            .combatants
            .values()
            .filter(|c| c.active && c.location.is_some())
            .cloned()
            .collect();
        out.sort_by_key(|c| c.id);
        Ok(out)
    }

    async fn kill(&self, id: CombatantId, day: Day, cancel: &CancellationToken) -> Result<(), StoreError> {
        check(cancel)?;
        let mut state = self.state.lock().expect("in-memory store poisoned");
        let before = state.combatants.get(&id.0).and_then(|c| c.location);
        state.move_records.push(MoveRecord {
            day,
            location_before: before,
            location_after: None,
            combatant: id,
        });
        if let Some(c) = state.combatants.get_mut(&id.0) {
            c.location = None;
            c.next_location = None;
        }
        Ok(())
    }

    async fn revive_faction(&self, faction: Faction, day: Day, cancel: &CancellationToken) -> Result<u64, StoreError> {
        check(cancel)?;
        let mut state = self.state.lock().expect("in-memory store poisoned");
        let temple = *state.temples.get(&faction).ok_or_else(|| StoreError::Fatal {
            reason: format!("no temple fixture for {faction}"),
        })?;
        let dead: Vec<i64> = state
            .combatants
            .values()
            .filter(|c| c.active && c.faction == faction && c.location.is_none())
            .map(|c| c.id.0)
            .collect();
        for id in &dead {
            let c = state.combatants.get_mut(id).unwrap();
            c.location = Some(LocationId(temple));
            c.next_location = Some(LocationId(temple));
            state.move_records.push(MoveRecord {
                day,
                location_before: None,
                location_after: Some(LocationId(temple)),
                combatant: CombatantId(*id),
            });
        }
        Ok(dead.len() as u64)
    }

    async fn advance(&self, id: CombatantId, class: &str, rank: u16, cancel: &CancellationToken) -> Result<(), StoreError> {
        check(cancel)?;
        let mut state = self.state.lock().expect("in-memory store poisoned");
        if let Some(c) = state.combatants.get_mut(&id.0) {
            c.class = class.to_string();
            c.rank = rank;
            c.experience = c.experience.saturating_sub(100);
        }
        Ok(())
    }

    async fn add_experience(&self, id: CombatantId, delta: i32, cancel: &CancellationToken) -> Result<(), StoreError> {
        check(cancel)?;
        let mut state = self.state.lock().expect("in-memory store poisoned");
        if let Some(c) = state.combatants.get_mut(&id.0) {
            let new_value = c.experience as i32 + delta;
            c.experience = new_value.max(0) as u16;
        }
        Ok(())
    }

    async fn toggle_updates(&self, id: CombatantId, cancel: &CancellationToken) -> Result<bool, StoreError> {
        check(cancel)?;
        let mut state = self.state.lock().expect("in-memory store poisoned");
        let c = state.combatants.get_mut(&id.0).ok_or_else(|| StoreError::Fatal {
            reason: format!("toggle_updates: unknown combatant {id}"),
        })?;
        c.receive_updates = !c.receive_updates;
        Ok(c.receive_updates)
    }

    async fn get_day(&self, cancel: &CancellationToken) -> Result<Day, StoreError> {
        check(cancel)?;
        let state = self.state.lock().expect("in-memory store poisoned");
        Ok(Day(state.day))
    }

    async fn increment_day(&self, cancel: &CancellationToken) -> Result<Day, StoreError> {
        check(cancel)?;
        let mut state = self.state.lock().expect("in-memory store poisoned");
        state.day += 1;
        Ok(Day(state.day))
    }

    async fn append_combat_record(&self, record: &CombatRecord, cancel: &CancellationToken) -> Result<(), StoreError> {
        check(cancel)?;
        let mut state = self.state.lock().expect("in-memory store poisoned");
        state.combat_records.push(record.clone());
        Ok(())
    }
}

/// Parse a faction slug stored as a plain string, used by test fixtures
/// that build [`Combatant`] rows without going through [`PgStore`](crate::pg::PgStore).
pub fn faction_from_slug(slug: &str) -> Faction {
    Faction::from_str(slug).expect("test fixture used an invalid faction slug")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_two_adjacent_locations() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.seed(
            [(1, "Staghorn Temple"), (2, "Gorgona Temple"), (3, "Borderlands")],
            [(1, 3), (2, 3)],
            [(Faction::StaghornSect, 1), (Faction::OrderGorgona, 2)],
        );
        store
    }

    #[tokio::test]
    async fn create_combatant_starts_at_temple() {
        let store = store_with_two_adjacent_locations();
        let cancel = CancellationToken::new();
        let id = store.create_combatant("p1", Faction::StaghornSect, &cancel).await.unwrap();
        let c = store.find_active_by_principal("p1", &cancel).await.unwrap().unwrap();
        assert_eq!(c.id, id);
        assert_eq!(c.location, Some(LocationId(1)));
        assert_eq!(c.next_location, Some(LocationId(1)));
    }

    #[tokio::test]
    async fn set_owner_is_idempotent_and_appends_no_record_on_noop() {
        let store = store_with_two_adjacent_locations();
        let cancel = CancellationToken::new();
        store.set_owner(LocationId(3), Faction::StaghornSect, Day(1), &cancel).await.unwrap();
        assert_eq!(store.ownership_records().len(), 1);
        store.set_owner(LocationId(3), Faction::StaghornSect, Day(2), &cancel).await.unwrap();
        assert_eq!(store.ownership_records().len(), 1);
    }

    #[tokio::test]
    async fn commit_movement_only_moves_combatants_with_a_pending_destination() {
        let store = store_with_two_adjacent_locations();
        let cancel = CancellationToken::new();
        let id = store.create_combatant("p1", Faction::StaghornSect, &cancel).await.unwrap();
        store.set_next_location(id, LocationId(3), &cancel).await.unwrap();
        let moved = store.commit_movement(Day(1), &cancel).await.unwrap();
        assert_eq!(moved, 1);
        let c = store.find_active_by_principal("p1", &cancel).await.unwrap().unwrap();
        assert_eq!(c.location, Some(LocationId(3)));
        assert_eq!(store.move_records().len(), 1);
    }

    #[tokio::test]
    async fn revive_faction_only_revives_dead_members_of_that_faction() {
        let store = store_with_two_adjacent_locations();
        let cancel = CancellationToken::new();
        let id = store.create_combatant("p1", Faction::StaghornSect, &cancel).await.unwrap();
        store.kill(id, Day(1), &cancel).await.unwrap();
        let revived = store.revive_faction(Faction::OrderGorgona, Day(2), &cancel).await.unwrap();
        assert_eq!(revived, 0);
        let revived = store.revive_faction(Faction::StaghornSect, Day(2), &cancel).await.unwrap();
        assert_eq!(revived, 1);
        let c = store.find_active_by_principal("p1", &cancel).await.unwrap().unwrap();
        assert_eq!(c.location, Some(LocationId(1)));
    }
}
