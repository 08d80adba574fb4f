//! The location fixture: names, aliases, and adjacency for the ~40-location
//! map (spec §4.6 — "fixed data... part of the configuration").
//!
//! This is the single source of truth for the map; `warband`'s seed
//! migration is generated from the same ids and adjacency (see
//! `warband/migrations/0002_seed_map.sql`). Kept as a process-wide
//! constant table, never mutated, matching spec §5's "class tables and
//! alias tables are process-wide constants, initialized once".

use warband_core::{Faction, LocationId};

/// One location's canonical name and the aliases it accepts, independent
/// of letter case and non-alphanumeric punctuation (spec §4.6: "strip
/// non-alphanumerics, lowercase").
pub struct LocationFixture {
    /// Stable numeric id.
    pub id: i32,
    /// Canonical display name.
    pub name: &'static str,
    /// Extra short aliases beyond the normalized canonical name, which is
    /// always accepted.
    pub aliases: &'static [&'static str],
}

/// The full fixture map: temples, each faction's ten-location home
/// territory, and seven contested border locations connecting all three.
pub const LOCATIONS: &[LocationFixture] = &[
    LocationFixture { id: 1, name: "Staghorn Temple", aliases: &["sstemple"] },
    LocationFixture { id: 2, name: "Gorgona Temple", aliases: &["ogtemple"] },
    LocationFixture { id: 3, name: "Baaturate Temple", aliases: &["tbtemple"] },
    LocationFixture { id: 4, name: "Antler Pass", aliases: &["antler"] },
    LocationFixture { id: 5, name: "Velvet Glade", aliases: &["velvet"] },
    LocationFixture { id: 6, name: "Mossbridge", aliases: &["moss"] },
    LocationFixture { id: 7, name: "Bramblewatch", aliases: &["bramble"] },
    LocationFixture { id: 8, name: "Thornfield", aliases: &["thorn"] },
    LocationFixture { id: 9, name: "Stagfall Hollow", aliases: &["stagfall"] },
    LocationFixture { id: 10, name: "Duskhorn Ridge", aliases: &["duskhorn"] },
    LocationFixture { id: 11, name: "Greywood March", aliases: &["greywood"] },
    LocationFixture { id: 12, name: "Fernholt", aliases: &["fern"] },
    LocationFixture { id: 13, name: "Hartshead Bluff", aliases: &["hartshead"] },
    LocationFixture { id: 14, name: "Serpent's Coil", aliases: &["serpent"] },
    LocationFixture { id: 15, name: "Medusa's Landing", aliases: &["medusa"] },
    LocationFixture { id: 16, name: "Stonescale Quay", aliases: &["stonescale"] },
    LocationFixture { id: 17, name: "Viper Hollow", aliases: &["viper"] },
    LocationFixture { id: 18, name: "Gorgon's Rest", aliases: &["gorgonsrest"] },
    LocationFixture { id: 19, name: "Petrified Row", aliases: &["petrified"] },
    LocationFixture { id: 20, name: "Basilisk Fen", aliases: &["basilisk"] },
    LocationFixture { id: 21, name: "Coldstare Marsh", aliases: &["coldstare"] },
    LocationFixture { id: 22, name: "Graven Shoal", aliases: &["graven"] },
    LocationFixture { id: 23, name: "Obsidian Spit", aliases: &["obsidian"] },
    LocationFixture { id: 24, name: "Brimstone Gate", aliases: &["brimstone"] },
    LocationFixture { id: 25, name: "Cinderfall", aliases: &["cinder"] },
    LocationFixture { id: 26, name: "Ashhollow", aliases: &["ash"] },
    LocationFixture { id: 27, name: "Emberreach", aliases: &["ember"] },
    LocationFixture { id: 28, name: "Slagpit", aliases: &["slag"] },
    LocationFixture { id: 29, name: "Sulfur Hollow", aliases: &["sulfur"] },
    LocationFixture { id: 30, name: "Charcrest", aliases: &["char"] },
    LocationFixture { id: 31, name: "Smolderwatch", aliases: &["smolder"] },
    LocationFixture { id: 32, name: "Pyreguard", aliases: &["pyre"] },
    LocationFixture { id: 33, name: "Scorchmere", aliases: &["scorch"] },
    LocationFixture { id: 34, name: "The Threeway Crossing", aliases: &["threeway", "crossing"] },
    LocationFixture { id: 35, name: "Wanderer's Rest", aliases: &["wanderer"] },
    LocationFixture { id: 36, name: "Old King's Bridge", aliases: &["oldkings", "kingsbridge"] },
    LocationFixture { id: 37, name: "Crowmarket", aliases: &["crow"] },
    LocationFixture { id: 38, name: "Salt Flats", aliases: &["salt"] },
    LocationFixture { id: 39, name: "The Sundered Vale", aliases: &["sundered"] },
    LocationFixture { id: 40, name: "Windward Tor", aliases: &["windward"] },
];

/// Undirected adjacency edges. Chains each faction's temple out to the
/// border, then closes the seven border locations into a ring so every
/// faction's territory is reachable from every other's.
pub const ADJACENCY: &[(i32, i32)] = &[
    (1, 4), (4, 5), (5, 6), (6, 7), (7, 8), (8, 9), (9, 10), (10, 11), (11, 12), (12, 13), (13, 34),
    (2, 14), (14, 15), (15, 16), (16, 17), (17, 18), (18, 19), (19, 20), (20, 21), (21, 22), (22, 23), (23, 35),
    (3, 24), (24, 25), (25, 26), (26, 27), (27, 28), (28, 29), (29, 30), (30, 31), (31, 32), (32, 33), (33, 36),
    (34, 35), (35, 36), (36, 37), (37, 38), (38, 39), (39, 40), (40, 34),
];

/// Each faction's home temple.
pub const TEMPLES: &[(Faction, i32)] = &[
    (Faction::StaghornSect, 1),
    (Faction::OrderGorgona, 2),
    (Faction::TheBaaturate, 3),
];

/// Strip non-alphanumeric characters and lowercase, the normalization
/// spec §4.6 specifies for a `move` argument.
pub fn normalize(raw: &str) -> String {
    raw.chars().filter(|c| c.is_alphanumeric()).flat_map(|c| c.to_lowercase()).collect()
}

/// Resolve a raw `move` argument to a location id: first by numeric id
/// (if it parses and names a known location), then by alias lookup
/// against the normalized canonical name or any normalized alias.
pub fn resolve_alias(raw: &str) -> Option<LocationId> {
    if let Ok(id) = raw.trim().parse::<i32>() {
        if LOCATIONS.iter().any(|l| l.id == id) {
            return Some(LocationId(id));
        }
    }
    let needle = normalize(raw);
    if needle.is_empty() {
        return None;
    }
    LOCATIONS
        .iter()
        .find(|l| normalize(l.name) == needle || l.aliases.iter().any(|a| *a == needle))
        .map(|l| LocationId(l.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_location_id_is_unique() {
        let ids: HashSet<i32> = LOCATIONS.iter().map(|l| l.id).collect();
        assert_eq!(ids.len(), LOCATIONS.len());
    }

    #[test]
    fn every_alias_resolves_to_exactly_one_location() {
        let mut seen = std::collections::HashMap::new();
        for loc in LOCATIONS {
            let canonical = normalize(loc.name);
            assert!(
                seen.insert(canonical.clone(), loc.id).is_none(),
                "duplicate normalized canonical name: {canonical}"
            );
            for alias in loc.aliases {
                assert!(
                    seen.insert(alias.to_string(), loc.id).is_none(),
                    "duplicate alias: {alias}"
                );
            }
        }
    }

    #[test]
    fn resolve_alias_accepts_numeric_id() {
        assert_eq!(resolve_alias("4"), Some(LocationId(4)));
        assert_eq!(resolve_alias("9999"), None);
    }

    #[test]
    fn resolve_alias_is_case_and_punctuation_insensitive() {
        assert_eq!(resolve_alias("Antler Pass"), Some(LocationId(4)));
        assert_eq!(resolve_alias("ANTLER-PASS!!"), Some(LocationId(4)));
        assert_eq!(resolve_alias("antler"), Some(LocationId(4)));
        assert_eq!(resolve_alias("nowhere"), None);
    }

    #[test]
    fn adjacency_is_symmetric_and_connects_every_temple_to_the_border_ring() {
        let mut adj: std::collections::HashMap<i32, Vec<i32>> = std::collections::HashMap::new();
        for &(a, b) in ADJACENCY {
            adj.entry(a).or_default().push(b);
            adj.entry(b).or_default().push(a);
        }
        // breadth-first reachability from the Staghorn temple should cover
        // every location, since the border ring links all three chains.
        let mut visited = HashSet::new();
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(1);
        visited.insert(1);
        while let Some(node) = queue.pop_front() {
            for &next in adj.get(&node).into_iter().flatten() {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        assert_eq!(visited.len(), LOCATIONS.len());
    }
}
