//! The 16-class lattice: base stats, role predicates, and the advance graph.
//!
//! Everything here is fixture data reproduced verbatim from the game
//! design (spec §4.3). Re-expressed as an enum plus `const` lookup tables
//! rather than the original's string-keyed class names, so every rule —
//! "is this class ranged?", "is this a triple attacker?" — is an O(1)
//! array lookup, not a string compare.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

use std::fmt;

/// The 16 classes in the advance lattice.
///
/// Discriminants double as indices into the `const` lookup tables below;
/// do not reorder without updating [`Class::ALL`] and every table that's
/// indexed by `as usize`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(usize)]
pub enum Class {
    /// Starting class for every new combatant. Rank cap 1.
    Recruit = 0,
    /// First-tier melee class. Rank cap 3.
    Infantry,
    /// First-tier mounted class. Rank cap 3.
    Cavalry,
    /// First-tier support/scout class. Rank cap 3.
    Ranger,
    /// Second-tier melee, from Infantry. Rank cap 5.
    Spear,
    /// Second-tier melee, from Infantry. Rank cap 5.
    Sword,
    /// Second-tier mounted, from Cavalry. Rank cap 5.
    HeavyCavalry,
    /// Second-tier mounted, from Cavalry. Rank cap 5.
    LightCavalry,
    /// Second-tier ranged, from Ranger. Rank cap 5.
    Archer,
    /// Second-tier support, from Ranger. Rank cap 5.
    Medic,
    /// Capstone, from Spear. Rank cap 1. Counter-attacks on failed defense.
    GlaiveMaster,
    /// Capstone, from Sword. Rank cap 1.
    Legionary,
    /// Capstone, from HeavyCavalry. Rank cap 1. Untargetable by melee.
    MonsterKnight,
    /// Capstone, from LightCavalry. Rank cap 1.
    HorseArcher,
    /// Capstone, from Archer. Rank cap 1. Triple-attacker.
    Mage,
    /// Capstone, from Medic. Rank cap 1. Can revive fallen allies.
    Healer,
}

impl Class {
    /// All 16 classes, in discriminant order.
    pub const ALL: [Class; 16] = [
        Class::Recruit,
        Class::Infantry,
        Class::Cavalry,
        Class::Ranger,
        Class::Spear,
        Class::Sword,
        Class::HeavyCavalry,
        Class::LightCavalry,
        Class::Archer,
        Class::Medic,
        Class::GlaiveMaster,
        Class::Legionary,
        Class::MonsterKnight,
        Class::HorseArcher,
        Class::Mage,
        Class::Healer,
    ];

    /// The stable lowercase slug stored in the database's class column and
    /// accepted as an `advance` command argument.
    pub fn slug(self) -> &'static str {
        match self {
            Class::Recruit => "recruit",
            Class::Infantry => "infantry",
            Class::Cavalry => "cavalry",
            Class::Ranger => "ranger",
            Class::Spear => "spear",
            Class::Sword => "sword",
            Class::HeavyCavalry => "heavycavalry",
            Class::LightCavalry => "lightcavalry",
            Class::Archer => "archer",
            Class::Medic => "medic",
            Class::GlaiveMaster => "glaivemaster",
            Class::Legionary => "legionary",
            Class::MonsterKnight => "monsterknight",
            Class::HorseArcher => "horsearcher",
            Class::Mage => "mage",
            Class::Healer => "healer",
        }
    }

    /// Parse a class from its stable slug.
    pub fn from_slug(slug: &str) -> Option<Class> {
        Class::ALL.into_iter().find(|c| c.slug() == slug)
    }

    /// Base stats for this class: `(potency, defense, speed, aggro)`.
    pub fn stats(self) -> Stats {
        STATS[self as usize]
    }

    /// Maximum rank this class can reach before requiring a class advance.
    pub fn rank_cap(self) -> u16 {
        RANK_CAP[self as usize]
    }

    /// The classes directly reachable from this one via `advance`.
    ///
    /// Empty for the four capstone classes with no further children
    /// (Legionary, MonsterKnight, HorseArcher — Mage and Healer are also
    /// capstones with no children; Recruit through Medic/Ranger's
    /// second-tier classes each have entries).
    pub fn advances_from(self) -> &'static [Class] {
        match self {
            Class::Recruit => &[Class::Infantry, Class::Cavalry, Class::Ranger],
            Class::Infantry => &[Class::Spear, Class::Sword],
            Class::Cavalry => &[Class::HeavyCavalry, Class::LightCavalry],
            Class::Ranger => &[Class::Archer, Class::Medic],
            Class::Spear => &[Class::GlaiveMaster],
            Class::Sword => &[Class::Legionary],
            Class::HeavyCavalry => &[Class::MonsterKnight],
            Class::LightCavalry => &[Class::HorseArcher],
            Class::Archer => &[Class::Mage],
            Class::Medic => &[Class::Healer],
            Class::GlaiveMaster
            | Class::Legionary
            | Class::MonsterKnight
            | Class::HorseArcher
            | Class::Mage
            | Class::Healer => &[],
        }
    }

    /// `true` for Archer and Mage: may target MonsterKnight, and whose
    /// enemy-aggro view sums all living enemies including MonsterKnights.
    pub fn is_ranged(self) -> bool {
        matches!(self, Class::Archer | Class::Mage)
    }

    /// `true` for the five mounted classes, used for the spear-vs-cavalry
    /// attack/defense bonus.
    pub fn is_cavalry_role(self) -> bool {
        matches!(
            self,
            Class::Cavalry
                | Class::LightCavalry
                | Class::HeavyCavalry
                | Class::MonsterKnight
                | Class::HorseArcher
        )
    }

    /// `true` for Spear and GlaiveMaster, used for the spear-vs-cavalry bonus.
    pub fn is_spear_role(self) -> bool {
        matches!(self, Class::Spear | Class::GlaiveMaster)
    }

    /// `true` only for GlaiveMaster: counter-attacks immediately when its
    /// defense against an attack succeeds (the attack fails).
    pub fn is_counter_attacker(self) -> bool {
        matches!(self, Class::GlaiveMaster)
    }

    /// `true` for Medic and Healer: contribute to the defending faction's
    /// medic-power defense bonus.
    pub fn is_medic_role(self) -> bool {
        matches!(self, Class::Medic | Class::Healer)
    }

    /// `true` only for Healer: may attempt to revive a fallen ally each turn.
    pub fn is_reviver(self) -> bool {
        matches!(self, Class::Healer)
    }

    /// `true` only for Mage: performs 3 attack attempts per turn instead of 1.
    pub fn is_triple_attacker(self) -> bool {
        matches!(self, Class::Mage)
    }

    /// `true` only for MonsterKnight: may only be targeted by ranged attackers.
    pub fn is_untargetable_by_melee(self) -> bool {
        matches!(self, Class::MonsterKnight)
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

/// Base combat stats for a class: potency, defense, speed, aggro.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stats {
    /// Base attack power, used as the mean of the attack-roll Gaussian.
    pub potency: u32,
    /// Base defense value, compared against the attack roll.
    pub defense: u32,
    /// Base speed, used as the mean of the initiative-roll Gaussian.
    pub speed: u32,
    /// Aggro weight: how much this combatant contributes to its faction's
    /// enemy-targeting weight.
    pub aggro: u32,
}

const fn s(potency: u32, defense: u32, speed: u32, aggro: u32) -> Stats {
    Stats {
        potency,
        defense,
        speed,
        aggro,
    }
}

/// Base stats indexed by [`Class`] discriminant, reproduced verbatim from
/// spec §4.3.
const STATS: [Stats; 16] = [
    s(10, 10, 10, 10), // Recruit
    s(60, 60, 40, 60), // Infantry
    s(40, 40, 60, 50), // Cavalry
    s(50, 50, 50, 40), // Ranger
    s(70, 70, 50, 70), // Spear
    s(70, 70, 50, 70), // Sword
    s(50, 50, 70, 60), // HeavyCavalry
    s(50, 50, 70, 60), // LightCavalry
    s(60, 60, 60, 50), // Archer
    s(60, 60, 60, 50), // Medic
    s(80, 80, 60, 80), // GlaiveMaster
    s(80, 80, 60, 80), // Legionary
    s(60, 60, 80, 70), // MonsterKnight
    s(60, 60, 80, 70), // HorseArcher
    s(70, 70, 70, 60), // Mage
    s(70, 70, 70, 60), // Healer
];

/// Rank caps indexed by [`Class`] discriminant, reproduced verbatim from
/// spec §4.3's advance graph.
const RANK_CAP: [u16; 16] = [
    1, // Recruit
    3, // Infantry
    3, // Cavalry
    3, // Ranger
    5, // Spear
    5, // Sword
    5, // HeavyCavalry
    5, // LightCavalry
    5, // Archer
    5, // Medic
    1, // GlaiveMaster
    1, // Legionary
    1, // MonsterKnight
    1, // HorseArcher
    1, // Mage
    1, // Healer
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_round_trips_for_every_class() {
        for c in Class::ALL {
            assert_eq!(Class::from_slug(c.slug()), Some(c));
        }
    }

    #[test]
    fn from_slug_rejects_unknown() {
        assert_eq!(Class::from_slug("paladin"), None);
    }

    #[test]
    fn capstones_have_no_further_advances() {
        for c in [
            Class::GlaiveMaster,
            Class::Legionary,
            Class::MonsterKnight,
            Class::HorseArcher,
            Class::Mage,
            Class::Healer,
        ] {
            assert!(c.advances_from().is_empty());
        }
    }

    #[test]
    fn recruit_advances_to_three_first_tier_classes() {
        assert_eq!(
            Class::Recruit.advances_from(),
            &[Class::Infantry, Class::Cavalry, Class::Ranger]
        );
    }

    #[test]
    fn rank_caps_match_lattice_tiers() {
        assert_eq!(Class::Recruit.rank_cap(), 1);
        assert_eq!(Class::Infantry.rank_cap(), 3);
        assert_eq!(Class::Spear.rank_cap(), 5);
        assert_eq!(Class::GlaiveMaster.rank_cap(), 1);
    }

    #[test]
    fn role_predicates_match_spec_sets() {
        assert!(Class::Archer.is_ranged());
        assert!(Class::Mage.is_ranged());
        assert!(!Class::Cavalry.is_ranged());

        for c in [
            Class::Cavalry,
            Class::LightCavalry,
            Class::HeavyCavalry,
            Class::MonsterKnight,
            Class::HorseArcher,
        ] {
            assert!(c.is_cavalry_role(), "{c:?} should be cavalry-role");
        }

        assert!(Class::Spear.is_spear_role());
        assert!(Class::GlaiveMaster.is_spear_role());
        assert!(!Class::Sword.is_spear_role());

        assert!(Class::GlaiveMaster.is_counter_attacker());
        assert!(!Class::Legionary.is_counter_attacker());

        assert!(Class::Medic.is_medic_role());
        assert!(Class::Healer.is_medic_role());
        assert!(!Class::Archer.is_medic_role());

        assert!(Class::Healer.is_reviver());
        assert!(!Class::Medic.is_reviver());

        assert!(Class::Mage.is_triple_attacker());
        assert!(!Class::Archer.is_triple_attacker());

        assert!(Class::MonsterKnight.is_untargetable_by_melee());
        assert!(!Class::HorseArcher.is_untargetable_by_melee());
    }

    #[test]
    fn shared_stat_rows_match_across_sibling_classes() {
        assert_eq!(Class::Spear.stats(), Class::Sword.stats());
        assert_eq!(Class::HeavyCavalry.stats(), Class::LightCavalry.stats());
        assert_eq!(Class::Archer.stats(), Class::Medic.stats());
        assert_eq!(Class::Legionary.stats(), Class::GlaiveMaster.stats());
        assert_eq!(Class::MonsterKnight.stats(), Class::HorseArcher.stats());
        assert_eq!(Class::Mage.stats(), Class::Healer.stats());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_class() -> impl Strategy<Value = Class> {
            (0usize..16).prop_map(|i| Class::ALL[i])
        }

        proptest! {
            #[test]
            fn advances_from_are_all_distinct_from_source(c in arb_class()) {
                for next in c.advances_from() {
                    prop_assert_ne!(*next, c);
                }
            }

            #[test]
            fn rank_cap_is_always_positive(c in arb_class()) {
                prop_assert!(c.rank_cap() >= 1);
            }
        }
    }
}
