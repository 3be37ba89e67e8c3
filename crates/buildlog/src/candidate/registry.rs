use std::collections::{BTreeMap, HashMap};

use super::model::BuildStep;

/// Lookup maps from stream identifiers to a candidate's declared steps.
///
/// Values are positions in `BuildCandidate::build_steps`, so the registry
/// never borrows the candidate. `by_slug` is fixed at construction;
/// `by_index` starts empty and fills as start lines are observed, so it
/// only ever reflects the current parse invocation.
#[derive(Debug, Default)]
pub struct StepRegistry {
    by_slug: HashMap<String, usize>,
    by_index: BTreeMap<u32, usize>,
}

impl StepRegistry {
    pub fn new(steps: &[BuildStep]) -> Self {
        let by_slug = steps
            .iter()
            .enumerate()
            .map(|(pos, step)| (step.step_slug.clone(), pos))
            .collect();

        Self {
            by_slug,
            by_index: BTreeMap::new(),
        }
    }

    pub fn by_slug(&self, step_slug: &str) -> Option<usize> {
        self.by_slug.get(step_slug).copied()
    }

    pub fn by_index(&self, index: u32) -> Option<usize> {
        self.by_index.get(&index).copied()
    }

    /// Index a step position was activated under during this invocation.
    pub fn active_index_of(&self, pos: usize) -> Option<u32> {
        self.by_index
            .iter()
            .find_map(|(&index, &p)| (p == pos).then_some(index))
    }

    /// Numerically highest active index.
    ///
    /// Known approximation: assumes only the most recently announced step is
    /// printing, which does not hold when stages run concurrently.
    pub fn latest_index(&self) -> Option<u32> {
        self.by_index.last_key_value().map(|(&index, _)| index)
    }

    pub fn activate(&mut self, index: u32, pos: usize) {
        self.by_index.insert(index, pos);
    }
}
