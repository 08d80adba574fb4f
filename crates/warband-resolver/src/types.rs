//! Input/output types for one battle resolution (spec §4.4).

use warband_classes::Class;
use warband_core::{CombatantId, Faction};

/// One combatant present at a contested location, as handed to the
/// resolver. The resolver consumes a copy; it never touches the Store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CombatantInBattle {
    /// Stable identifier, echoed back in the combat trace.
    pub id: CombatantId,
    /// Faction, used for targeting and the per-faction aggregates.
    pub faction: Faction,
    /// Class, which determines base stats and role predicates. Rank does
    /// not affect combat stats (spec §4.3): only class does.
    pub class: Class,
}

/// The grouping of combatants present at one contested location, by
/// faction. Any of the three may be empty, though the engine only invokes
/// the resolver when at least two are non-empty.
#[derive(Clone, Debug, Default)]
pub struct BattleInput {
    staghorn: Vec<CombatantInBattle>,
    gorgona: Vec<CombatantInBattle>,
    baaturate: Vec<CombatantInBattle>,
}

impl BattleInput {
    /// Build an input grouping from a flat list, bucketing by faction.
    pub fn from_combatants(combatants: impl IntoIterator<Item = CombatantInBattle>) -> Self {
        let mut input = Self::default();
        for c in combatants {
            input.slot_mut(c.faction).push(c);
        }
        input
    }

    /// The combatants belonging to one faction.
    pub fn slot(&self, faction: Faction) -> &[CombatantInBattle] {
        match faction {
            Faction::StaghornSect => &self.staghorn,
            Faction::OrderGorgona => &self.gorgona,
            Faction::TheBaaturate => &self.baaturate,
        }
    }

    fn slot_mut(&mut self, faction: Faction) -> &mut Vec<CombatantInBattle> {
        match faction {
            Faction::StaghornSect => &mut self.staghorn,
            Faction::OrderGorgona => &mut self.gorgona,
            Faction::TheBaaturate => &mut self.baaturate,
        }
    }

    /// Every combatant across all three factions.
    pub fn all(&self) -> impl Iterator<Item = &CombatantInBattle> {
        self.staghorn
            .iter()
            .chain(self.gorgona.iter())
            .chain(self.baaturate.iter())
    }

    /// Number of distinct factions with at least one combatant present.
    pub fn factions_present(&self) -> usize {
        Faction::ALL
            .into_iter()
            .filter(|&f| !self.slot(f).is_empty())
            .count()
    }
}

/// What kind of action a [`CombatEvent`] records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// A direct attack.
    Attack,
    /// An immediate counter-attack following a failed defense by a
    /// counter-attacker.
    CounterAttack,
    /// A revive attempt by a reviver.
    Revive,
}

/// The outcome of one [`CombatEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventResult {
    /// The action succeeded.
    Success,
    /// The action was attempted and failed.
    Failure,
    /// No valid target existed; the action was not attempted.
    NoTarget,
}

/// One entry in the battle's combat-event trace.
///
/// For `NoTarget` events, `defender` equals `attacker` — there was no
/// target to name, and every event needs a defender slot for the audit
/// schema (spec §3's combat record shape).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CombatEvent {
    /// What kind of action this is.
    pub kind: EventKind,
    /// The attacking, counter-attacking, or reviving combatant.
    pub attacker: CombatantId,
    /// The defending or revived combatant.
    pub defender: CombatantId,
    /// Attacker's class at the time of the event.
    pub attacker_class: Class,
    /// Defender's class at the time of the event.
    pub defender_class: Class,
    /// Outcome.
    pub result: EventResult,
}

/// One experience award resulting from a resolved attack (spec §3,
/// `SPEC_FULL.md`). Revive attempts award no experience.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExperienceAward {
    /// The combatant credited with the award.
    pub recipient: CombatantId,
    /// The amount to add to that combatant's experience. Never negative.
    pub amount: i32,
}

/// The full outcome of one battle resolution.
#[derive(Clone, Debug, Default)]
pub struct BattleOutcome {
    /// Combatants still alive at the end of the battle, partitioned by
    /// faction.
    pub survivors: BattleInput,
    /// Combatants killed during the battle, in the order they fell.
    pub fatalities: Vec<CombatantId>,
    /// The ordered combat-event trace.
    pub events: Vec<CombatEvent>,
    /// Experience awards to apply to survivors (spec `SPEC_FULL.md` §3).
    pub experience_awards: Vec<ExperienceAward>,
}
