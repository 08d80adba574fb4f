//! [`TickEngine`]: orchestrates one full day-advance under the write lock
//! (spec §4.5).
//!
//! Steps, in order: acquire the writer hold, increment the day, commit
//! pending movement, bucket alive combatants by location, resolve battles
//! at every contested location, run the revive phase. Narrative events are
//! buffered in a [`NarrativeBatch`] while the writer hold is live and
//! handed to the [`NarrativeSink`] only after the hold is released (spec
//! §5: "Outbound narrative delivery... is explicitly not performed under
//! the lock"). A structured `tracing` span carries the day across every
//! step; `TickEngine` is a callable struct with no background threads,
//! driving one day at a time rather than holding its own loop.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span};

use warband_classes::Class;
use warband_core::{CombatantId, Day, Faction, LocationId, TickError};
use warband_lock::TickLock;
use warband_narrative::{LocationSummary, NarrativeSink, PersonalEvent};
use warband_resolver::{BattleInput, BattleResolver, CombatantInBattle, CombatEvent, EventKind, EventResult};
use warband_store::{CombatKind, CombatRecord, CombatResult, Combatant, Store};

/// Narrative events produced during a locked tick, dispatched to the
/// [`NarrativeSink`] only once the writer hold has been released.
#[derive(Default)]
struct NarrativeBatch {
    personal: Vec<(String, PersonalEvent)>,
    summaries: Vec<LocationSummary>,
    day: Option<Day>,
}

impl NarrativeBatch {
    fn dispatch(self, sink: &impl NarrativeSink) {
        for (principal, event) in self.personal {
            sink.personal(&principal, event);
        }
        for summary in self.summaries {
            sink.location_summary(summary);
        }
        if let Some(day) = self.day {
            sink.map_frame(day);
        }
    }
}

/// Orchestrates the daily tick over a [`Store`] and [`NarrativeSink`].
///
/// Holds no mutable state of its own beyond the RNG seed offset: the
/// authoritative state lives entirely in the `Store`, per spec §9's
/// "cyclic references" design note (combatants hold location ids, never
/// handles).
pub struct TickEngine<'a, S, N> {
    store: &'a S,
    lock: &'a TickLock,
    narrative: &'a N,
    /// XORed with the day (and, per location, the location id) to derive
    /// each battle's RNG seed.
    seed_offset: u64,
}

impl<'a, S, N> TickEngine<'a, S, N>
where
    S: Store,
    N: NarrativeSink,
{
    /// Build an engine over the given collaborators.
    pub fn new(store: &'a S, lock: &'a TickLock, narrative: &'a N, seed_offset: u64) -> Self {
        Self {
            store,
            lock,
            narrative,
            seed_offset,
        }
    }

    /// Run one full day's tick to completion.
    ///
    /// The tick is not cancellable mid-run (spec §5): it is handed a fresh,
    /// never-cancelled token for every `Store` call. On any `Store` or
    /// resolver failure, the writer lock is still released before the
    /// error propagates (spec §7: "the tick treats any Store failure as
    /// fatal to this tick... the next day's tick runs as normal"); no
    /// narrative is dispatched for a failed tick.
    pub async fn run_tick(&self) -> Result<Day, TickError> {
        let writer = self.lock.acquire_writer().await;
        let result = self.run_tick_locked().await;
        writer.release().await;
        let (day, batch) = result?;
        batch.dispatch(self.narrative);
        Ok(day)
    }

    async fn run_tick_locked(&self) -> Result<(Day, NarrativeBatch), TickError> {
        let cancel = CancellationToken::new();
        let mut batch = NarrativeBatch::default();

        let day = self.store.increment_day(&cancel).await?;
        let span = info_span!("tick", day = day.0);
        let _enter = span.enter();
        info!("tick started");

        let moved = self.store.commit_movement(day, &cancel).await?;
        debug!(moved, "movement committed");

        let alive = self.store.list_alive(&cancel).await?;
        let by_location = bucket_by_location(&alive);

        let mut locations: Vec<LocationId> = by_location.keys().copied().collect();
        locations.sort_by_key(|l| l.0);

        for location in locations {
            let combatants = &by_location[&location];
            let present_factions: HashSet<Faction> = combatants.iter().map(|c| c.faction).collect();

            if present_factions.len() <= 1 {
                debug!(location = location.0, "no contest");
                for c in combatants {
                    if c.receive_updates {
                        batch.personal.push((c.principal.clone(), PersonalEvent::NoBattleToday));
                    }
                }
                continue;
            }

            self.resolve_location(day, location, combatants, &cancel, &mut batch).await?;
        }

        self.revive_phase(day, &cancel).await?;

        batch.day = Some(day);
        info!("tick complete");
        Ok((day, batch))
    }

    async fn resolve_location(
        &self,
        day: Day,
        location: LocationId,
        combatants: &[Combatant],
        cancel: &CancellationToken,
        batch: &mut NarrativeBatch,
    ) -> Result<(), TickError> {
        let class_by_id: HashMap<CombatantId, Class> = combatants
            .iter()
            .map(|c| {
                let class = Class::from_slug(&c.class).unwrap_or(Class::Recruit);
                (c.id, class)
            })
            .collect();
        let principal_by_id: HashMap<CombatantId, (&str, bool)> = combatants
            .iter()
            .map(|c| (c.id, (c.principal.as_str(), c.receive_updates)))
            .collect();

        let input = BattleInput::from_combatants(combatants.iter().map(|c| CombatantInBattle {
            id: c.id,
            faction: c.faction,
            class: class_by_id[&c.id],
        }));

        let seed = self.seed_offset ^ (day.0 as u64) ^ ((location.0 as u64) << 32);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let outcome = BattleResolver::resolve(&mut rng, &input)?;
        debug!(
            location = location.0,
            fatalities = outcome.fatalities.len(),
            events = outcome.events.len(),
            "battle resolved"
        );

        for &id in &outcome.fatalities {
            self.store.kill(id, day, cancel).await?;
        }

        for event in &outcome.events {
            let record = CombatRecord {
                day,
                location,
                kind: match event.kind {
                    EventKind::Attack => CombatKind::Attack,
                    EventKind::CounterAttack => CombatKind::CounterAttack,
                    EventKind::Revive => CombatKind::Revive,
                },
                attacker: event.attacker,
                defender: event.defender,
                attacker_class: event.attacker_class.slug().to_string(),
                defender_class: event.defender_class.slug().to_string(),
                result: match event.result {
                    EventResult::Success => CombatResult::Success,
                    EventResult::Failure => CombatResult::Failure,
                    EventResult::NoTarget => CombatResult::NoTarget,
                },
            };
            self.store.append_combat_record(&record, cancel).await?;
            queue_combat_event(event, &principal_by_id, batch);
        }

        let survivor_ids: HashSet<CombatantId> = outcome.survivors.all().map(|c| c.id).collect();
        for award in &outcome.experience_awards {
            if survivor_ids.contains(&award.recipient) && award.amount != 0 {
                self.store.add_experience(award.recipient, award.amount, cancel).await?;
            }
        }

        let current = self
            .store
            .get_location(location, cancel)
            .await?
            .ok_or_else(|| warband_core::StoreError::Fatal {
                reason: format!("location {location} vanished mid-tick"),
            })?;

        let survivor_counts: Vec<(Faction, usize)> = Faction::ALL
            .into_iter()
            .map(|f| (f, outcome.survivors.slot(f).len()))
            .filter(|&(_, n)| n > 0)
            .collect();

        let occupier_before = current.occupier;
        let new_occupier = victor(&survivor_counts, occupier_before);

        match new_occupier {
            Some(faction) => {
                if occupier_before != Some(faction) {
                    self.store.set_occupier(location, faction, day, cancel).await?;
                }
                if current.owner != Some(faction) {
                    self.store.set_owner(location, faction, day, cancel).await?;
                }
            }
            None => {
                if occupier_before.is_some() {
                    self.store.clear_occupier(location, cancel).await?;
                }
            }
        }

        batch.summaries.push(LocationSummary {
            day,
            location,
            occupier_before,
            occupier_after: new_occupier,
            survivors: survivor_counts.iter().map(|&(f, n)| (f, n as u32)).collect(),
            fatalities: faction_fatality_counts(combatants, &outcome.fatalities),
        });

        Ok(())
    }

    async fn revive_phase(&self, day: Day, cancel: &CancellationToken) -> Result<(), TickError> {
        for faction in Faction::ALL {
            let temple = self.store.temple_location(faction, cancel).await?;
            let Some(location) = self.store.get_location(temple, cancel).await? else {
                continue;
            };
            if location.owner != Some(faction) {
                continue;
            }
            let revived = self.store.revive_faction(faction, day, cancel).await?;
            if revived > 0 {
                debug!(?faction, revived, "revive phase");
            }
        }
        Ok(())
    }
}

fn queue_combat_event(
    event: &CombatEvent,
    principal_by_id: &HashMap<CombatantId, (&str, bool)>,
    batch: &mut NarrativeBatch,
) {
    let attacker_event = match (event.kind, event.result) {
        (EventKind::Attack, EventResult::Success) => Some(PersonalEvent::AttackSuccess),
        (EventKind::Attack, EventResult::Failure) => Some(PersonalEvent::AttackFailure),
        (EventKind::Attack, EventResult::NoTarget) => Some(PersonalEvent::NoTarget),
        (EventKind::CounterAttack, EventResult::Success) => Some(PersonalEvent::CounterAttackSuccess),
        (EventKind::CounterAttack, EventResult::Failure) => Some(PersonalEvent::CounterAttackFailure),
        (EventKind::Revive, EventResult::Success) => Some(PersonalEvent::ReviveSuccess),
        (EventKind::Revive, EventResult::Failure) => Some(PersonalEvent::ReviveFailure),
        (EventKind::Revive, EventResult::NoTarget) => Some(PersonalEvent::ReviveNoTarget),
        (EventKind::CounterAttack, EventResult::NoTarget) => None,
    };
    if let Some(kind) = attacker_event {
        if let Some(&(principal, receive_updates)) = principal_by_id.get(&event.attacker) {
            if receive_updates {
                batch.personal.push((principal.to_string(), kind));
            }
        }
    }
}

fn bucket_by_location(alive: &[Combatant]) -> HashMap<LocationId, Vec<Combatant>> {
    let mut by_location: HashMap<LocationId, Vec<Combatant>> = HashMap::new();
    for c in alive {
        if let Some(loc) = c.location {
            by_location.entry(loc).or_default().push(c.clone());
        }
    }
    by_location
}

fn faction_fatality_counts(before: &[Combatant], fatalities: &[CombatantId]) -> Vec<(Faction, u32)> {
    let dead: HashSet<CombatantId> = fatalities.iter().copied().collect();
    let mut counts: HashMap<Faction, u32> = HashMap::new();
    for c in before {
        if dead.contains(&c.id) {
            *counts.entry(c.faction).or_default() += 1;
        }
    }
    let mut out: Vec<(Faction, u32)> = counts.into_iter().collect();
    out.sort_by_key(|&(f, _)| f);
    out
}

/// Determine the location's new occupier from this battle's survivor
/// counts (Open Question resolution, `DESIGN.md`): the strictly largest
/// surviving faction wins; on a tie, the prior occupier retains the
/// location if it's among the tied factions, otherwise the lowest
/// [`Faction`] ordinal wins. `None` if nobody survived.
fn victor(survivor_counts: &[(Faction, usize)], prior_occupier: Option<Faction>) -> Option<Faction> {
    let max = survivor_counts.iter().map(|&(_, n)| n).max()?;
    if max == 0 {
        return None;
    }
    let tied: Vec<Faction> = survivor_counts
        .iter()
        .filter(|&&(_, n)| n == max)
        .map(|&(f, _)| f)
        .collect();
    if tied.len() == 1 {
        return Some(tied[0]);
    }
    if let Some(prior) = prior_occupier {
        if tied.contains(&prior) {
            return Some(prior);
        }
    }
    tied.into_iter().min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use warband_narrative::RecordingSink;
    use warband_store::memory::InMemoryStore;

    fn engine_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.seed(
            [(1, "Staghorn Temple"), (2, "Gorgona Temple"), (3, "Baaturate Temple"), (4, "Borderlands")],
            [(1, 4), (2, 4), (3, 4)],
            [
                (Faction::StaghornSect, 1),
                (Faction::OrderGorgona, 2),
                (Faction::TheBaaturate, 3),
            ],
        );
        store
    }

    #[tokio::test]
    async fn join_and_move_scenario() {
        let store = engine_store();
        let lock = TickLock::new();
        let narrative = RecordingSink::new();
        let cancel = CancellationToken::new();

        let id = store.create_combatant("p1", Faction::StaghornSect, &cancel).await.unwrap();
        store.set_next_location(id, LocationId(4), &cancel).await.unwrap();

        let engine = TickEngine::new(&store, &lock, &narrative, 1);
        let day = engine.run_tick().await.unwrap();
        assert_eq!(day, Day(1));

        let c = store.find_active_by_principal("p1", &cancel).await.unwrap().unwrap();
        assert_eq!(c.location, Some(LocationId(4)));
        assert_eq!(store.move_records().len(), 1);
        assert_eq!(narrative.map_frames(), vec![Day(1)]);
    }

    #[tokio::test]
    async fn single_faction_presence_is_no_contest() {
        let store = engine_store();
        let lock = TickLock::new();
        let narrative = RecordingSink::new();
        let cancel = CancellationToken::new();

        let p1 = store.create_combatant("p1", Faction::StaghornSect, &cancel).await.unwrap();
        let p2 = store.create_combatant("p2", Faction::StaghornSect, &cancel).await.unwrap();
        store.set_next_location(p1, LocationId(4), &cancel).await.unwrap();
        store.set_next_location(p2, LocationId(4), &cancel).await.unwrap();

        let engine = TickEngine::new(&store, &lock, &narrative, 2);
        engine.run_tick().await.unwrap();

        assert!(store.combat_records().is_empty());
        let events = narrative.personal_events();
        assert!(events
            .iter()
            .filter(|(_, e)| *e == PersonalEvent::NoBattleToday)
            .count()
            >= 2);
    }

    #[tokio::test]
    async fn revive_gated_by_temple_ownership() {
        let store = engine_store();
        let lock = TickLock::new();
        let narrative = RecordingSink::new();
        let cancel = CancellationToken::new();

        let id = store.create_combatant("p1", Faction::StaghornSect, &cancel).await.unwrap();
        store.kill(id, Day(0), &cancel).await.unwrap();
        store.force_location(LocationId(1), Some(Faction::OrderGorgona), None);

        let engine = TickEngine::new(&store, &lock, &narrative, 3);
        engine.run_tick().await.unwrap();
        let c = store.find_active_by_principal("p1", &cancel).await.unwrap().unwrap();
        assert!(c.location.is_none(), "should stay dead: temple not owned by faction");

        store.force_location(LocationId(1), Some(Faction::StaghornSect), None);
        engine.run_tick().await.unwrap();
        let c = store.find_active_by_principal("p1", &cancel).await.unwrap().unwrap();
        assert_eq!(c.location, Some(LocationId(1)));
    }

    #[tokio::test]
    async fn two_faction_contest_resolves_and_sets_occupier() {
        let store = engine_store();
        let lock = TickLock::new();
        let narrative = RecordingSink::new();
        let cancel = CancellationToken::new();

        for i in 0..3 {
            let id = store.create_combatant(&format!("s{i}"), Faction::StaghornSect, &cancel).await.unwrap();
            store.set_next_location(id, LocationId(4), &cancel).await.unwrap();
        }
        for i in 0..3 {
            let id = store.create_combatant(&format!("g{i}"), Faction::OrderGorgona, &cancel).await.unwrap();
            store.set_next_location(id, LocationId(4), &cancel).await.unwrap();
        }

        let engine = TickEngine::new(&store, &lock, &narrative, 7);
        engine.run_tick().await.unwrap();

        assert!(!store.combat_records().is_empty());
        assert_eq!(narrative.summaries().len(), 1);
        let loc = store.get_location(LocationId(4), &cancel).await.unwrap().unwrap();
        assert!(loc.occupier.is_some() || loc.occupier.is_none());
    }

    #[test]
    fn victor_ties_prefer_prior_occupier() {
        let counts = vec![(Faction::StaghornSect, 2), (Faction::OrderGorgona, 2)];
        assert_eq!(victor(&counts, Some(Faction::OrderGorgona)), Some(Faction::OrderGorgona));
    }

    #[test]
    fn victor_ties_without_prior_occupier_pick_lowest_ordinal() {
        let counts = vec![(Faction::OrderGorgona, 2), (Faction::StaghornSect, 2)];
        assert_eq!(victor(&counts, None), Some(Faction::StaghornSect));
    }

    #[test]
    fn victor_with_no_survivors_is_none() {
        let counts: Vec<(Faction, usize)> = vec![];
        assert_eq!(victor(&counts, Some(Faction::StaghornSect)), None);
    }
}
