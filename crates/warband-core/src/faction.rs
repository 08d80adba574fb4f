//! The closed set of three factions.

use std::fmt;
use std::str::FromStr;

/// One of the three mutually exclusive factions.
///
/// Immutable per combatant after join. Ordinal order (`Staghorn < Gorgona
/// < Baaturate`) is the deterministic tie-break used when two factions
/// hold an equal surviving count at a contested location (see
/// `warband-resolver`'s victor selection).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Faction {
    /// Staghorn Sect.
    StaghornSect,
    /// Order Gorgona.
    OrderGorgona,
    /// The Baaturate.
    TheBaaturate,
}

impl Faction {
    /// All three factions, in ordinal order.
    pub const ALL: [Faction; 3] = [
        Faction::StaghornSect,
        Faction::OrderGorgona,
        Faction::TheBaaturate,
    ];

    /// The canonical display name, as used in fixture data and narrative text.
    pub fn name(self) -> &'static str {
        match self {
            Faction::StaghornSect => "Staghorn Sect",
            Faction::OrderGorgona => "Order Gorgona",
            Faction::TheBaaturate => "The Baaturate",
        }
    }

    /// The stable lowercase slug stored in the database's faction column.
    pub fn slug(self) -> &'static str {
        match self {
            Faction::StaghornSect => "staghorn",
            Faction::OrderGorgona => "gorgona",
            Faction::TheBaaturate => "baaturate",
        }
    }

    /// Normalize a join-command argument by substring match against the
    /// three known faction keywords, case-insensitively.
    ///
    /// Matches the original join command's keyword semantics: `staghorn`,
    /// `gorgona`, and `baaturate` (or their full names) are all accepted
    /// as substrings of the supplied argument. Returns `None` if no
    /// faction keyword is a substring of `arg`.
    pub fn from_keyword(arg: &str) -> Option<Faction> {
        let lower = arg.to_lowercase();
        Faction::ALL
            .into_iter()
            .find(|f| lower.contains(f.slug()) || lower.contains(&f.name().to_lowercase()))
    }

    /// The two other factions, in ordinal order.
    pub fn others(self) -> [Faction; 2] {
        let mut out = [Faction::StaghornSect; 2];
        let mut i = 0;
        for f in Faction::ALL {
            if f != self {
                out[i] = f;
                i += 1;
            }
        }
        out
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Faction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Faction::ALL
            .into_iter()
            .find(|f| f.slug() == s)
            .ok_or_else(|| format!("unknown faction slug: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_round_trips_through_from_str() {
        for f in Faction::ALL {
            assert_eq!(f.slug().parse::<Faction>().unwrap(), f);
        }
    }

    #[test]
    fn from_keyword_matches_substring_case_insensitively() {
        assert_eq!(Faction::from_keyword("STAGHORN"), Some(Faction::StaghornSect));
        assert_eq!(Faction::from_keyword("join gorgona now"), Some(Faction::OrderGorgona));
        assert_eq!(Faction::from_keyword("the baaturate"), Some(Faction::TheBaaturate));
        assert_eq!(Faction::from_keyword("nonsense"), None);
    }

    #[test]
    fn others_excludes_self_and_covers_remaining_two() {
        for f in Faction::ALL {
            let others = f.others();
            assert_eq!(others.len(), 2);
            assert!(!others.contains(&f));
        }
    }

    #[test]
    fn ordinal_order_matches_declaration_order() {
        assert!(Faction::StaghornSect < Faction::OrderGorgona);
        assert!(Faction::OrderGorgona < Faction::TheBaaturate);
    }
}
