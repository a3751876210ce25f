// src/training/split.rs

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;

use super::TrainingRow;
use crate::models::AppraisalId;

/// Train/validation assignment of whole appraisals.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSplit {
    pub train_ids: Vec<AppraisalId>,
    pub validation_ids: Vec<AppraisalId>,
}

impl GroupSplit {
    /// Partitions rows by their appraisal. Rows of one appraisal never span
    /// both sides.
    pub fn partition<'a>(
        &self,
        rows: &'a [TrainingRow],
    ) -> (Vec<&'a TrainingRow>, Vec<&'a TrainingRow>) {
        let validation: HashSet<&AppraisalId> = self.validation_ids.iter().collect();
        rows.iter().partition(|row| !validation.contains(&row.appraisal_id))
    }
}

/// Shuffles the distinct appraisal ids with a seeded RNG and assigns
/// `ceil(n * validation_fraction)` of them to validation.
///
/// At least one appraisal always stays in training.
pub fn split_by_appraisal(
    rows: &[TrainingRow],
    validation_fraction: f64,
    seed: u64,
) -> GroupSplit {
    let mut seen = HashSet::new();
    let mut ids: Vec<AppraisalId> = rows
        .iter()
        .filter(|row| seen.insert(row.appraisal_id.clone()))
        .map(|row| row.appraisal_id.clone())
        .collect();

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    ids.shuffle(&mut rng);

    let n = ids.len();
    let n_validation = ((n as f64 * validation_fraction).ceil() as usize).min(n.saturating_sub(1));
    let train_ids = ids.split_off(n_validation);

    GroupSplit {
        train_ids,
        validation_ids: ids,
    }
}
