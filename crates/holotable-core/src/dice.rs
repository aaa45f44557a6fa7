//! Narrative dice resolver.
//!
//! [`resolve`] maps a dice pool (die kind → count) to the faces rolled for
//! each kind. Every die is drawn independently and uniformly from its fixed
//! face table. Kinds that are not in the table roll a single face named after
//! the kind itself. The resolver holds no state and can be called from any
//! task concurrently.

use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;

/// Requested dice: kind name → number of dice.
pub type DicePool = BTreeMap<String, u32>;

/// Rolled faces: kind name → one face label per die, in roll order.
pub type RollOutcome = BTreeMap<String, Vec<String>>;

const BOOST_FACES: &[&str] = &[
    "empty",
    "empty",
    "success",
    "success_advantage",
    "advantage_advantage",
    "advantage",
];

const SETBACK_FACES: &[&str] = &["empty", "empty", "failure", "failure", "threat", "threat"];

const ABILITY_FACES: &[&str] = &[
    "empty",
    "success",
    "success",
    "success_success",
    "advantage",
    "advantage",
    "success_advantage",
    "advantage_advantage",
];

const DIFFICULTY_FACES: &[&str] = &[
    "empty",
    "failure",
    "failure_failure",
    "threat",
    "threat",
    "threat",
    "threat_threat",
    "failure_threat",
];

const PROFICIENCY_FACES: &[&str] = &[
    "empty",
    "success",
    "success",
    "success_success",
    "success_success",
    "advantage",
    "success_advantage",
    "success_advantage",
    "success_advantage",
    "advantage_advantage",
    "advantage_advantage",
    "triumph",
];

const CHALLENGE_FACES: &[&str] = &[
    "empty",
    "failure",
    "failure",
    "failure_failure",
    "failure_failure",
    "threat",
    "threat",
    "failure_threat",
    "failure_threat",
    "threat_threat",
    "threat_threat",
    "despair",
];

const FORCE_FACES: &[&str] = &[
    "dark",
    "dark",
    "dark",
    "dark",
    "dark",
    "dark",
    "dark_dark",
    "light",
    "light",
    "light_light",
    "light_light",
    "light_light",
];

/// A die kind with a known face table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DieKind {
    /// Blue d6.
    Boost,
    /// Black d6.
    Setback,
    /// Green d8.
    Ability,
    /// Purple d8.
    Difficulty,
    /// Yellow d12.
    Proficiency,
    /// Red d12.
    Challenge,
    /// White d12.
    Force,
}

/// Every die kind with a face table.
pub const ALL_DIE_KINDS: [DieKind; 7] = [
    DieKind::Boost,
    DieKind::Setback,
    DieKind::Ability,
    DieKind::Difficulty,
    DieKind::Proficiency,
    DieKind::Challenge,
    DieKind::Force,
];

impl DieKind {
    /// Pool key for this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boost => "boost",
            Self::Setback => "setback",
            Self::Ability => "ability",
            Self::Difficulty => "difficulty",
            Self::Proficiency => "proficiency",
            Self::Challenge => "challenge",
            Self::Force => "force",
        }
    }

    /// Look up a kind by pool key.
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_DIE_KINDS.iter().copied().find(|k| k.as_str() == name)
    }

    /// The face multiset of this die.
    pub const fn faces(self) -> &'static [&'static str] {
        match self {
            Self::Boost => BOOST_FACES,
            Self::Setback => SETBACK_FACES,
            Self::Ability => ABILITY_FACES,
            Self::Difficulty => DIFFICULTY_FACES,
            Self::Proficiency => PROFICIENCY_FACES,
            Self::Challenge => CHALLENGE_FACES,
            Self::Force => FORCE_FACES,
        }
    }

    /// Roll one die.
    pub fn roll<R: Rng + ?Sized>(self, rng: &mut R) -> &'static str {
        let faces = self.faces();
        faces[rng.random_range(0..faces.len())]
    }
}

impl fmt::Display for DieKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Roll every die in `pool` with the thread-local RNG.
pub fn resolve(pool: &DicePool) -> RollOutcome {
    resolve_with(pool, &mut rand::rng())
}

/// Roll every die in `pool` with the given RNG.
pub fn resolve_with<R: Rng + ?Sized>(pool: &DicePool, rng: &mut R) -> RollOutcome {
    pool.iter()
        .map(|(kind, &count)| {
            let faces = match DieKind::from_name(kind) {
                Some(die) => (0..count).map(|_| die.roll(rng).to_owned()).collect(),
                None => vec![kind.clone(); count as usize],
            };
            (kind.clone(), faces)
        })
        .collect()
}

/// Total number of dice in a pool.
pub fn pool_size(pool: &DicePool) -> u64 {
    pool.values().map(|&n| u64::from(n)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn pool(entries: &[(&str, u32)]) -> DicePool {
        entries.iter().map(|(k, n)| ((*k).to_owned(), *n)).collect()
    }

    #[test]
    fn face_table_sizes() {
        assert_eq!(DieKind::Boost.faces().len(), 6);
        assert_eq!(DieKind::Setback.faces().len(), 6);
        assert_eq!(DieKind::Ability.faces().len(), 8);
        assert_eq!(DieKind::Difficulty.faces().len(), 8);
        assert_eq!(DieKind::Proficiency.faces().len(), 12);
        assert_eq!(DieKind::Challenge.faces().len(), 12);
        assert_eq!(DieKind::Force.faces().len(), 12);
    }

    #[test]
    fn only_proficiency_and_challenge_carry_triumph_and_despair() {
        for kind in ALL_DIE_KINDS {
            let faces = kind.faces();
            assert_eq!(faces.contains(&"triumph"), kind == DieKind::Proficiency);
            assert_eq!(faces.contains(&"despair"), kind == DieKind::Challenge);
        }
    }

    #[test]
    fn force_die_has_eight_dark_and_eight_light_pips() {
        let pips = |side: &str| -> usize {
            FORCE_FACES
                .iter()
                .map(|f| f.split('_').filter(|p| *p == side).count())
                .sum()
        };
        assert_eq!(pips("dark"), 8);
        assert_eq!(pips("light"), 8);
    }

    #[test]
    fn kind_names_roundtrip() {
        for kind in ALL_DIE_KINDS {
            assert_eq!(DieKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(DieKind::from_name("percentile"), None);
    }

    #[test]
    fn boost_pool_returns_requested_count() {
        let outcome = resolve(&pool(&[("boost", 2)]));
        assert_eq!(outcome.len(), 1);
        assert_eq!(outcome["boost"].len(), 2);
        for face in &outcome["boost"] {
            assert!(BOOST_FACES.contains(&face.as_str()), "unexpected face {face}");
        }
    }

    #[test]
    fn boost_faces_stay_in_table_over_many_rolls() {
        let p = pool(&[("boost", 2)]);
        for _ in 0..1000 {
            let outcome = resolve(&p);
            assert_eq!(outcome["boost"].len(), 2);
            assert!(outcome["boost"].iter().all(|f| BOOST_FACES.contains(&f.as_str())));
        }
    }

    #[test]
    fn every_kind_rolls_from_its_own_table() {
        let mut rng = StdRng::seed_from_u64(7);
        let p: DicePool = ALL_DIE_KINDS.iter().map(|k| (k.as_str().to_owned(), 25)).collect();
        let outcome = resolve_with(&p, &mut rng);
        for kind in ALL_DIE_KINDS {
            let faces = &outcome[kind.as_str()];
            assert_eq!(faces.len(), 25);
            assert!(faces.iter().all(|f| kind.faces().contains(&f.as_str())));
        }
    }

    #[test]
    fn unknown_kind_rolls_its_own_name() {
        let outcome = resolve(&pool(&[("percentile", 3)]));
        assert_eq!(outcome["percentile"], vec!["percentile"; 3]);
    }

    #[test]
    fn zero_count_yields_empty_sequence() {
        let outcome = resolve(&pool(&[("force", 0)]));
        assert!(outcome["force"].is_empty());
    }

    #[test]
    fn empty_pool_yields_empty_outcome() {
        assert!(resolve(&DicePool::new()).is_empty());
    }

    #[test]
    fn seeded_rolls_are_deterministic() {
        let p = pool(&[("ability", 3), ("difficulty", 2)]);
        let a = resolve_with(&p, &mut StdRng::seed_from_u64(42));
        let b = resolve_with(&p, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn many_rolls_hit_every_face() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..2000 {
            let _ = seen.insert(DieKind::Proficiency.roll(&mut rng));
        }
        let distinct: std::collections::HashSet<_> = PROFICIENCY_FACES.iter().copied().collect();
        assert_eq!(seen, distinct);
    }

    #[test]
    fn pool_size_sums_counts() {
        assert_eq!(pool_size(&pool(&[("boost", 2), ("force", 3)])), 5);
        assert_eq!(pool_size(&DicePool::new()), 0);
    }
}
