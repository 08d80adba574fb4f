//! The battle resolver itself (spec §4.4): initiative order, per-faction
//! aggregates, and the turn-action loop.

use std::collections::{HashMap, VecDeque};

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use warband_classes::Class;
use warband_core::{CombatantId, Faction, ResolverError};

use crate::aggregate::FactionAggregate;
use crate::gaussian::{sample, sample_rounded_nonneg};
use crate::initiative::InitiativeMap;
use crate::types::{BattleInput, BattleOutcome, CombatEvent, CombatantInBattle, EventKind, EventResult, ExperienceAward};

/// Three-slot, faction-indexed storage, the same shape as
/// [`BattleInput`](crate::types::BattleInput)'s internal layout.
struct ByFaction<T> {
    staghorn: T,
    gorgona: T,
    baaturate: T,
}

impl<T: Default> Default for ByFaction<T> {
    fn default() -> Self {
        Self {
            staghorn: T::default(),
            gorgona: T::default(),
            baaturate: T::default(),
        }
    }
}

impl<T> ByFaction<T> {
    fn get(&self, faction: Faction) -> &T {
        match faction {
            Faction::StaghornSect => &self.staghorn,
            Faction::OrderGorgona => &self.gorgona,
            Faction::TheBaaturate => &self.baaturate,
        }
    }

    fn get_mut(&mut self, faction: Faction) -> &mut T {
        match faction {
            Faction::StaghornSect => &mut self.staghorn,
            Faction::OrderGorgona => &mut self.gorgona,
            Faction::TheBaaturate => &mut self.baaturate,
        }
    }
}

/// Pure battle resolution given an RNG and a grouping of combatants.
pub struct BattleResolver;

impl BattleResolver {
    /// Resolve one battle to completion: runs every combatant's turn in
    /// initiative order until no one has any further action, and returns
    /// the survivors, fatalities, and combat trace.
    pub fn resolve(rng: &mut ChaCha8Rng, input: &BattleInput) -> Result<BattleOutcome, ResolverError> {
        let combatant_data: HashMap<CombatantId, CombatantInBattle> =
            input.all().map(|c| (c.id, *c)).collect();

        let mut initiative = InitiativeMap::build(
            rng,
            combatant_data.values().map(|c| (c.id, c.class.stats().speed)),
        )?;

        let mut aggregates: ByFaction<FactionAggregate> = ByFaction::default();
        for c in combatant_data.values() {
            aggregates.get_mut(c.faction).add(c.class);
        }

        let mut death_queues: ByFaction<VecDeque<CombatantId>> = ByFaction::default();
        let mut events = Vec::new();
        let mut awards = Vec::new();
        let mut fatalities = Vec::new();

        let mut cursor = None;
        loop {
            let Some((key, id)) = initiative.next_after(cursor) else {
                break;
            };
            cursor = Some(key);
            if !initiative.contains(id) {
                continue;
            }
            let actor = combatant_data[&id];

            if actor.class.is_reviver() {
                Self::attempt_revive(
                    rng,
                    actor,
                    &mut initiative,
                    &mut aggregates,
                    &mut death_queues,
                    &combatant_data,
                    &mut events,
                );
            }

            let attacks = if actor.class.is_triple_attacker() { 3 } else { 1 };
            for _ in 0..attacks {
                if !initiative.contains(id) {
                    break;
                }
                Self::attempt_attack(
                    rng,
                    actor,
                    &mut initiative,
                    &mut aggregates,
                    &mut death_queues,
                    &combatant_data,
                    &mut events,
                    &mut awards,
                    &mut fatalities,
                )?;
            }
        }

        let survivors = BattleInput::from_combatants(
            initiative.iter().map(|(_, id)| combatant_data[&id]),
        );

        Ok(BattleOutcome {
            survivors,
            fatalities,
            events,
            experience_awards: awards,
        })
    }

    fn attempt_revive(
        rng: &mut ChaCha8Rng,
        actor: CombatantInBattle,
        initiative: &mut InitiativeMap,
        aggregates: &mut ByFaction<FactionAggregate>,
        death_queues: &mut ByFaction<VecDeque<CombatantId>>,
        combatant_data: &HashMap<CombatantId, CombatantInBattle>,
        events: &mut Vec<CombatEvent>,
    ) {
        let queue = death_queues.get_mut(actor.faction);
        let Some(&ally) = queue.front() else {
            events.push(CombatEvent {
                kind: EventKind::Revive,
                attacker: actor.id,
                defender: actor.id,
                attacker_class: actor.class,
                defender_class: actor.class,
                result: EventResult::NoTarget,
            });
            return;
        };
        let ally_data = combatant_data[&ally];
        if rng.gen_bool(0.5) {
            queue.pop_front();
            initiative.revive(ally);
            aggregates.get_mut(actor.faction).add(ally_data.class);
            events.push(CombatEvent {
                kind: EventKind::Revive,
                attacker: actor.id,
                defender: ally,
                attacker_class: actor.class,
                defender_class: ally_data.class,
                result: EventResult::Success,
            });
        } else {
            events.push(CombatEvent {
                kind: EventKind::Revive,
                attacker: actor.id,
                defender: ally,
                attacker_class: actor.class,
                defender_class: ally_data.class,
                result: EventResult::Failure,
            });
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn attempt_attack(
        rng: &mut ChaCha8Rng,
        actor: CombatantInBattle,
        initiative: &mut InitiativeMap,
        aggregates: &mut ByFaction<FactionAggregate>,
        death_queues: &mut ByFaction<VecDeque<CombatantId>>,
        combatant_data: &HashMap<CombatantId, CombatantInBattle>,
        events: &mut Vec<CombatEvent>,
        awards: &mut Vec<ExperienceAward>,
        fatalities: &mut Vec<CombatantId>,
    ) -> Result<(), ResolverError> {
        let enemy_aggro_view: u64 = actor
            .faction
            .others()
            .into_iter()
            .map(|f| {
                let agg = aggregates.get(f);
                if actor.class.is_ranged() {
                    agg.ranged_view_aggro
                } else if actor.class == Class::HorseArcher {
                    agg.horsearcher_view_count
                } else {
                    agg.standard_aggro
                }
            })
            .sum();

        if enemy_aggro_view == 0 {
            events.push(CombatEvent {
                kind: EventKind::Attack,
                attacker: actor.id,
                defender: actor.id,
                attacker_class: actor.class,
                defender_class: actor.class,
                result: EventResult::NoTarget,
            });
            return Ok(());
        }

        // Draw r uniformly from [1, enemy_aggro_view], then decrement by each
        // candidate's contribution in turn order and stop at the first one
        // that brings r down to zero or below: candidate i is selected for a
        // draw in (C_{i-1}, C_i].
        let mut r = rng.gen_range(1..=enemy_aggro_view) as i64;
        let mut target = None;
        for (_, candidate_id) in initiative.iter() {
            if candidate_id == actor.id {
                continue;
            }
            let candidate = combatant_data[&candidate_id];
            if candidate.faction == actor.faction {
                continue;
            }
            if candidate.class == Class::MonsterKnight && !actor.class.is_ranged() {
                continue;
            }
            let contribution = if actor.class == Class::HorseArcher {
                1
            } else {
                candidate.class.stats().aggro as u64
            };
            r -= contribution as i64;
            if r <= 0 {
                target = Some(candidate_id);
                break;
            }
        }
        let Some(target_id) = target else {
            return Err(ResolverError::TargetSelectionInconsistent {
                reason: "weighted draw exhausted before reaching a target".to_string(),
            });
        };
        let target_data = combatant_data[&target_id];

        let target_medic_power = aggregates.get(target_data.faction).medic_power;
        let success = attack_roll(rng, actor, target_data, target_medic_power);

        events.push(CombatEvent {
            kind: EventKind::Attack,
            attacker: actor.id,
            defender: target_id,
            attacker_class: actor.class,
            defender_class: target_data.class,
            result: if success { EventResult::Success } else { EventResult::Failure },
        });
        awards.push(ExperienceAward {
            recipient: actor.id,
            amount: sample_rounded_nonneg(rng, if success { 30.0 } else { 20.0 }, 5.0),
        });

        if success {
            kill(target_id, target_data, initiative, aggregates, death_queues, fatalities);
            return Ok(());
        }

        if target_data.class.is_counter_attacker() {
            let attacker_medic_power = aggregates.get(actor.faction).medic_power;
            let counter_success = attack_roll(rng, target_data, actor, attacker_medic_power);
            events.push(CombatEvent {
                kind: EventKind::CounterAttack,
                attacker: target_id,
                defender: actor.id,
                attacker_class: target_data.class,
                defender_class: actor.class,
                result: if counter_success { EventResult::Success } else { EventResult::Failure },
            });
            awards.push(ExperienceAward {
                recipient: target_id,
                amount: sample_rounded_nonneg(rng, if counter_success { 30.0 } else { 20.0 }, 5.0),
            });
            if counter_success {
                kill(actor.id, actor, initiative, aggregates, death_queues, fatalities);
            }
        }

        Ok(())
    }
}

/// Attack resolution shared by direct attacks and counter-attacks
/// (spec §4.4.4): identical formula, attacker and defender swapped.
fn attack_roll(
    rng: &mut ChaCha8Rng,
    attacker: CombatantInBattle,
    defender: CombatantInBattle,
    defender_medic_power: u64,
) -> bool {
    let attack_power = attacker.class.stats().potency as f64
        + if attacker.class.is_spear_role() && defender.class.is_cavalry_role() {
            10.0
        } else {
            0.0
        };
    let defense_power = defender.class.stats().defense as f64
        + if attacker.class.is_cavalry_role() && defender.class.is_spear_role() {
            10.0
        } else {
            0.0
        };
    let defense = defense_power + defender_medic_power as f64 * 0.01;
    let attack = sample(rng, attack_power, 40.0);
    attack > defense
}

fn kill(
    id: CombatantId,
    data: CombatantInBattle,
    initiative: &mut InitiativeMap,
    aggregates: &mut ByFaction<FactionAggregate>,
    death_queues: &mut ByFaction<VecDeque<CombatantId>>,
    fatalities: &mut Vec<CombatantId>,
) {
    initiative.remove(id);
    aggregates.get_mut(data.faction).remove(data.class);
    death_queues.get_mut(data.faction).push_back(id);
    fatalities.push(id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn combatant(id: i64, faction: Faction, class: Class) -> CombatantInBattle {
        CombatantInBattle {
            id: CombatantId(id),
            faction,
            class,
        }
    }

    #[test]
    fn single_faction_battle_yields_only_no_target_events() {
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let input = BattleInput::from_combatants([
            combatant(1, Faction::StaghornSect, Class::Infantry),
            combatant(2, Faction::StaghornSect, Class::Infantry),
        ]);
        let outcome = BattleResolver::resolve(&mut rng, &input).unwrap();
        assert!(outcome.fatalities.is_empty());
        assert!(outcome
            .events
            .iter()
            .all(|e| e.result == EventResult::NoTarget || e.kind == EventKind::Revive));
    }

    #[test]
    fn two_faction_battle_produces_a_strict_partition() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let staghorn: Vec<_> = (0..3).map(|i| combatant(i, Faction::StaghornSect, Class::Infantry)).collect();
        let gorgona: Vec<_> = (3..6).map(|i| combatant(i, Faction::OrderGorgona, Class::Infantry)).collect();
        let input = BattleInput::from_combatants(staghorn.iter().chain(gorgona.iter()).copied());
        let outcome = BattleResolver::resolve(&mut rng, &input).unwrap();

        let total_in = 6;
        let total_out = outcome.survivors.all().count() + outcome.fatalities.len();
        assert_eq!(total_in, total_out);

        let mut seen: Vec<CombatantId> = outcome.survivors.all().map(|c| c.id).collect();
        seen.extend(outcome.fatalities.iter().copied());
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), total_in);
    }

    #[test]
    fn monsterknight_is_untargetable_by_melee_infantry() {
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let input = BattleInput::from_combatants([
            combatant(1, Faction::StaghornSect, Class::MonsterKnight),
            combatant(2, Faction::OrderGorgona, Class::Infantry),
        ]);
        let outcome = BattleResolver::resolve(&mut rng, &input).unwrap();
        let infantry_attacks_on_knight = outcome.events.iter().any(|e| {
            e.attacker == CombatantId(2) && e.defender == CombatantId(1) && e.result == EventResult::Success
        });
        assert!(!infantry_attacks_on_knight);
        assert!(outcome
            .events
            .iter()
            .filter(|e| e.attacker == CombatantId(2) && e.kind == EventKind::Attack)
            .all(|e| e.result == EventResult::NoTarget));
    }

    #[test]
    fn triple_attacker_gets_up_to_three_attack_events_per_turn() {
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let input = BattleInput::from_combatants([
            combatant(1, Faction::StaghornSect, Class::Mage),
            combatant(2, Faction::OrderGorgona, Class::Infantry),
            combatant(3, Faction::OrderGorgona, Class::Infantry),
            combatant(4, Faction::OrderGorgona, Class::Infantry),
        ]);
        let outcome = BattleResolver::resolve(&mut rng, &input).unwrap();
        let mage_attacks = outcome
            .events
            .iter()
            .filter(|e| e.attacker == CombatantId(1) && e.kind == EventKind::Attack)
            .count();
        assert!(mage_attacks >= 1 && mage_attacks <= 3);
    }

    #[test]
    fn experience_is_awarded_for_every_resolved_attack() {
        let mut rng = ChaCha8Rng::seed_from_u64(14);
        let input = BattleInput::from_combatants([
            combatant(1, Faction::StaghornSect, Class::Infantry),
            combatant(2, Faction::OrderGorgona, Class::Infantry),
        ]);
        let outcome = BattleResolver::resolve(&mut rng, &input).unwrap();
        let resolved_attacks = outcome
            .events
            .iter()
            .filter(|e| e.kind != EventKind::Revive && e.result != EventResult::NoTarget)
            .count();
        assert_eq!(resolved_attacks, outcome.experience_awards.len());
        assert!(outcome.experience_awards.iter().all(|a| a.amount >= 0));
    }
}
