//! Question selection for a single game.

use std::collections::BTreeSet;

use rand::{Rng, seq::SliceRandom};
use thiserror::Error;
use tracing::warn;

use crate::{
    dao::models::CatalogEntity,
    state::game::{Provenance, Question},
};

/// Category names meaning "every category".
const ALL_CATEGORY_ALIASES: [&str; 2] = ["all", "todas"];

/// Playable snapshot of the question bank.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Every playable question.
    pub questions: Vec<Question>,
    /// Declared categories.
    pub categories: Vec<String>,
}

impl From<CatalogEntity> for Catalog {
    fn from(value: CatalogEntity) -> Self {
        let questions = value
            .questions
            .into_iter()
            .filter_map(|entity| match Question::try_from(entity) {
                Ok(question) => Some(question),
                Err(err) => {
                    warn!(error = %err, "skipping unplayable question");
                    None
                }
            })
            .collect();

        Self {
            questions,
            categories: value.categories,
        }
    }
}

/// Which categories a game draws from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    /// No restriction.
    All,
    /// Only these lowercase category names.
    Only(BTreeSet<String>),
}

impl CategoryFilter {
    /// Build a filter from raw names; `all`/`todas` or an empty list mean every category.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selected = BTreeSet::new();
        for name in names {
            let name = name.as_ref().trim().to_lowercase();
            if name.is_empty() {
                continue;
            }
            if ALL_CATEGORY_ALIASES.contains(&name.as_str()) {
                return CategoryFilter::All;
            }
            selected.insert(name);
        }

        if selected.is_empty() {
            CategoryFilter::All
        } else {
            CategoryFilter::Only(selected)
        }
    }

    /// Whether `category` passes the filter.
    pub fn matches(&self, category: &str) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(names) => names.contains(&category.trim().to_lowercase()),
        }
    }
}

/// Reasons a selection can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// No question matches the requested categories.
    #[error("no questions available for the selected categories")]
    EmptyPool,
}

/// Pick `requested` questions (clamped to the pool size) for one game.
///
/// Half the draw (rounded up) targets curated questions and the rest
/// user-submitted ones. A short user pool is topped up from curated questions,
/// then a short curated pool is topped up from user questions. The result is
/// shuffled so provenance does not show in play order.
pub fn select<R: Rng + ?Sized>(
    questions: &[Question],
    requested: usize,
    filter: &CategoryFilter,
    rng: &mut R,
) -> Result<Vec<Question>, SelectionError> {
    let (mut curated, mut user): (Vec<&Question>, Vec<&Question>) = questions
        .iter()
        .filter(|question| filter.matches(&question.category))
        .partition(|question| question.provenance == Provenance::Curated);

    let pool_size = curated.len() + user.len();
    if pool_size == 0 {
        return Err(SelectionError::EmptyPool);
    }

    let total = requested.clamp(1, pool_size);
    let curated_target = total.div_ceil(2);
    let user_target = total - curated_target;

    curated.shuffle(rng);
    user.shuffle(rng);

    let mut user_take = user_target.min(user.len());
    let user_deficit = user_target - user_take;
    let curated_take = (curated_target + user_deficit).min(curated.len());
    let curated_deficit = total - user_take - curated_take;
    user_take = (user_take + curated_deficit).min(user.len());

    let mut selection: Vec<Question> = curated
        .into_iter()
        .take(curated_take)
        .chain(user.into_iter().take(user_take))
        .cloned()
        .collect();
    selection.shuffle(rng);

    Ok(selection)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::state::game::Difficulty;

    fn question(id: usize, category: &str, provenance: Provenance) -> Question {
        Question {
            text: format!("question {id}"),
            options: ["a".into(), "b".into(), "c".into(), "d".into()],
            correct_index: id % 4,
            category: category.into(),
            difficulty: Difficulty::Medium,
            provenance,
        }
    }

    fn bank(curated: usize, user: usize, category: &str, offset: usize) -> Vec<Question> {
        (0..curated)
            .map(|i| question(offset + i, category, Provenance::Curated))
            .chain((0..user).map(|i| question(offset + curated + i, category, Provenance::User)))
            .collect()
    }

    fn count(selection: &[Question], provenance: Provenance) -> usize {
        selection
            .iter()
            .filter(|q| q.provenance == provenance)
            .count()
    }

    #[test]
    fn even_split_between_sub_pools() {
        let questions = bank(10, 10, "history", 0);
        let mut rng = StdRng::seed_from_u64(1);

        let selection = select(&questions, 5, &CategoryFilter::All, &mut rng).unwrap();
        assert_eq!(selection.len(), 5);
        assert_eq!(count(&selection, Provenance::Curated), 3);
        assert_eq!(count(&selection, Provenance::User), 2);
    }

    #[test]
    fn short_user_pool_is_backfilled_from_curated() {
        let questions = bank(10, 1, "history", 0);
        let mut rng = StdRng::seed_from_u64(2);

        let selection = select(&questions, 6, &CategoryFilter::All, &mut rng).unwrap();
        assert_eq!(count(&selection, Provenance::Curated), 5);
        assert_eq!(count(&selection, Provenance::User), 1);
    }

    #[test]
    fn short_curated_pool_is_backfilled_from_user() {
        let questions = bank(1, 10, "music", 0);
        let mut rng = StdRng::seed_from_u64(3);

        let selection = select(&questions, 6, &CategoryFilter::All, &mut rng).unwrap();
        assert_eq!(count(&selection, Provenance::Curated), 1);
        assert_eq!(count(&selection, Provenance::User), 5);
    }

    #[test]
    fn requested_count_is_clamped_to_pool() {
        let questions = bank(2, 1, "music", 0);
        let mut rng = StdRng::seed_from_u64(4);

        assert_eq!(
            select(&questions, 50, &CategoryFilter::All, &mut rng)
                .unwrap()
                .len(),
            3
        );
        assert_eq!(
            select(&questions, 0, &CategoryFilter::All, &mut rng)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn selection_respects_categories_without_duplicates() {
        let mut questions = bank(6, 6, "history", 0);
        questions.extend(bank(6, 6, "music", 100));
        questions.extend(bank(6, 6, "sports", 200));
        let filter = CategoryFilter::from_names(["History", "music "]);

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let selection = select(&questions, 15, &filter, &mut rng).unwrap();

            assert_eq!(selection.len(), 15);
            assert!(selection.iter().all(|q| q.category != "sports"));
            let unique: HashSet<_> = selection.iter().map(|q| q.text.as_str()).collect();
            assert_eq!(unique.len(), selection.len());
        }
    }

    #[test]
    fn empty_pool_is_an_error() {
        let questions = bank(3, 3, "history", 0);
        let mut rng = StdRng::seed_from_u64(5);
        let filter = CategoryFilter::from_names(["geography"]);

        assert_eq!(
            select(&questions, 3, &filter, &mut rng),
            Err(SelectionError::EmptyPool)
        );
        assert_eq!(
            select(&[], 3, &CategoryFilter::All, &mut rng),
            Err(SelectionError::EmptyPool)
        );
    }

    #[test]
    fn all_aliases_disable_filtering() {
        assert_eq!(CategoryFilter::from_names(["todas"]), CategoryFilter::All);
        assert_eq!(CategoryFilter::from_names(["music", "ALL"]), CategoryFilter::All);
        assert_eq!(CategoryFilter::from_names(Vec::<String>::new()), CategoryFilter::All);
        assert_eq!(CategoryFilter::from_names(["  "]), CategoryFilter::All);
    }

    #[test]
    fn play_order_reaches_every_permutation() {
        let questions = bank(2, 1, "history", 0);
        let mut rng = StdRng::seed_from_u64(6);
        let mut seen = HashSet::new();
        for _ in 0..2_000 {
            let selection = select(&questions, 3, &CategoryFilter::All, &mut rng).unwrap();
            seen.insert(selection.into_iter().map(|q| q.text).collect::<Vec<_>>());
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn play_order_mixes_provenance() {
        let questions = bank(20, 20, "history", 0);
        let mut rng = StdRng::seed_from_u64(7);

        let selection = select(&questions, 20, &CategoryFilter::All, &mut rng).unwrap();
        let first_half_curated = count(&selection[..10], Provenance::Curated);
        assert!(first_half_curated < 10, "curated questions were not shuffled in");
    }
}
