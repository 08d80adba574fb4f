//! The initiative ordering: a `BTreeMap` keyed by a negated, totally
//! ordered initiative draw, so ascending iteration is descending
//! initiative — highest acts first (spec §4.4.1, redesign note in
//! spec.md §9 "Ordered collection with custom comparator").

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

use rand_chacha::ChaCha8Rng;
use warband_core::{CombatantId, ResolverError};

use crate::gaussian::sample;

/// Maximum re-draw attempts before an initiative collision is treated as
/// an invariant violation (statistically near-impossible with a
/// continuous draw).
const MAX_COLLISION_ATTEMPTS: u32 = 64;

/// A totally ordered initiative key. Wraps the *negated* drawn value so
/// that ascending `BTreeMap` order visits the highest initiative first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InitiativeKey(f64);

impl Eq for InitiativeKey {}

impl PartialOrd for InitiativeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InitiativeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// The ordered turn sequence for one battle: draws an initiative value
/// per combatant and inserts it into a `BTreeMap`, re-drawing on
/// collision.
pub struct InitiativeMap {
    living: BTreeMap<InitiativeKey, CombatantId>,
    original_key: std::collections::HashMap<CombatantId, InitiativeKey>,
}

impl InitiativeMap {
    /// Draw an initiative value for each `(combatant, speed)` pair and
    /// build the ordered turn sequence.
    pub fn build(
        rng: &mut ChaCha8Rng,
        combatants: impl IntoIterator<Item = (CombatantId, u32)>,
    ) -> Result<Self, ResolverError> {
        let mut map = Self {
            living: BTreeMap::new(),
            original_key: std::collections::HashMap::new(),
        };
        for (id, speed) in combatants {
            let key = map.draw_unique_key(rng, speed as f64)?;
            map.living.insert(key, id);
            map.original_key.insert(id, key);
        }
        Ok(map)
    }

    fn draw_unique_key(&self, rng: &mut ChaCha8Rng, speed: f64) -> Result<InitiativeKey, ResolverError> {
        for attempt in 0..MAX_COLLISION_ATTEMPTS {
            let draw = sample(rng, speed, 10.0);
            let key = InitiativeKey(-draw);
            if !self.living.contains_key(&key) {
                return Ok(key);
            }
            let _ = attempt;
        }
        Err(ResolverError::InitiativeCollisionExhausted {
            attempts: MAX_COLLISION_ATTEMPTS,
        })
    }

    /// Remove a combatant from the living turn order (they died).
    pub fn remove(&mut self, id: CombatantId) {
        if let Some(&key) = self.original_key.get(&id) {
            self.living.remove(&key);
        }
    }

    /// Reinsert a revived combatant at its original initiative key.
    pub fn revive(&mut self, id: CombatantId) {
        if let Some(&key) = self.original_key.get(&id) {
            self.living.insert(key, id);
        }
    }

    /// Iterate the currently-living turn order, ascending (highest
    /// initiative first).
    pub fn iter(&self) -> impl Iterator<Item = (InitiativeKey, CombatantId)> + '_ {
        self.living.iter().map(|(&k, &v)| (k, v))
    }

    /// Whether `id` currently holds a slot in the living turn order.
    pub fn contains(&self, id: CombatantId) -> bool {
        self.original_key
            .get(&id)
            .map(|k| self.living.get(k) == Some(&id))
            .unwrap_or(false)
    }

    /// The next living entry strictly after `after` in turn order, or the
    /// first entry if `after` is `None`. Used to drive the turn loop
    /// across mutations (deaths, revives) without losing place.
    pub fn next_after(&self, after: Option<InitiativeKey>) -> Option<(InitiativeKey, CombatantId)> {
        match after {
            None => self.living.iter().next().map(|(&k, &v)| (k, v)),
            Some(cursor) => self
                .living
                .range((Excluded(cursor), Unbounded))
                .next()
                .map(|(&k, &v)| (k, v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn build_assigns_every_combatant_a_unique_slot() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let combatants: Vec<_> = (0..20).map(|i| (CombatantId(i), 50)).collect();
        let map = InitiativeMap::build(&mut rng, combatants.clone()).unwrap();
        assert_eq!(map.living.len(), 20);
        for (id, _) in combatants {
            assert!(map.contains(id));
        }
    }

    #[test]
    fn higher_speed_tends_to_act_first() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let fast = CombatantId(1);
        let slow = CombatantId(2);
        let map = InitiativeMap::build(&mut rng, [(fast, 200), (slow, 1)]).unwrap();
        let order: Vec<_> = map.iter().map(|(_, id)| id).collect();
        assert_eq!(order[0], fast);
    }

    #[test]
    fn remove_then_revive_restores_original_slot() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let a = CombatantId(1);
        let b = CombatantId(2);
        let mut map = InitiativeMap::build(&mut rng, [(a, 50), (b, 60)]).unwrap();
        assert!(map.contains(a));
        map.remove(a);
        assert!(!map.contains(a));
        map.revive(a);
        assert!(map.contains(a));
    }

    #[test]
    fn next_after_walks_full_sequence_once() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let ids: Vec<_> = (0..5).map(|i| (CombatantId(i), 10 + i as u32)).collect();
        let map = InitiativeMap::build(&mut rng, ids).unwrap();
        let mut cursor = None;
        let mut visited = Vec::new();
        while let Some((key, id)) = map.next_after(cursor) {
            visited.push(id);
            cursor = Some(key);
        }
        assert_eq!(visited.len(), 5);
    }
}
