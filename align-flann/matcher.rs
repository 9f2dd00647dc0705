use align_core::{Descriptor, Match};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::error::{MatchError, MatchResult};
use crate::kdtree::KdForest;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Approximate nearest-neighbour search settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MatcherConfig {
    /// Randomized KD-trees in the forest
    pub trees: usize,
    /// Maximum distinct descriptors examined per query
    pub checks: usize,
    /// Fixed seed for tree construction; fresh entropy when `None`
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub seed: Option<u64>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            trees: 5,
            checks: 50,
            seed: None,
        }
    }
}

impl MatcherConfig {
    pub fn fast_preset() -> Self {
        Self {
            trees: 4,
            checks: 32,
            ..Self::default()
        }
    }

    pub fn balanced_preset() -> Self {
        Self::default()
    }

    pub fn precise_preset() -> Self {
        Self {
            trees: 8,
            checks: 128,
            ..Self::default()
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "MatcherConfig: trees={}, checks={}, seed={:?}",
            self.trees, self.checks, self.seed
        )
    }

    pub fn validate(&self) -> MatchResult<()> {
        if self.trees == 0 {
            return Err(MatchError::InvalidTrees(self.trees));
        }
        if self.checks == 0 {
            return Err(MatchError::InvalidChecks(self.checks));
        }
        Ok(())
    }
}

/// k-nearest-neighbour descriptor matcher over a randomized KD-forest
#[derive(Debug, Clone)]
pub struct FlannMatcher {
    cfg: MatcherConfig,
}

impl FlannMatcher {
    pub fn new(cfg: MatcherConfig) -> MatchResult<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.cfg
    }

    /// For every query descriptor, its `k` nearest train descriptors by
    /// Euclidean distance, closest first.
    ///
    /// The index over `train` lives only for this call. When `train` holds
    /// fewer than `k` descriptors every inner list is empty.
    pub fn knn_match(
        &self,
        query: &[Descriptor],
        train: &[Descriptor],
        k: usize,
    ) -> MatchResult<Vec<Vec<Match>>> {
        if k == 0 {
            return Err(MatchError::InvalidK(k));
        }
        if train.len() < k {
            log::debug!(
                "{} train descriptors, fewer than k={}; no matches",
                train.len(),
                k
            );
            return Ok(vec![Vec::new(); query.len()]);
        }

        let mut rng = match self.cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let forest = KdForest::build(train, self.cfg.trees, &mut rng);

        let matches: Vec<Vec<Match>> = query
            .par_iter()
            .enumerate()
            .map(|(query_idx, q)| {
                forest
                    .knn(q, k, self.cfg.checks)
                    .into_iter()
                    .map(|(train_idx, dist_sq)| Match {
                        query_idx,
                        train_idx,
                        distance: dist_sq.sqrt(),
                    })
                    .collect()
            })
            .collect();

        log::debug!(
            "matched {} query descriptors against {} ({} trees, {} checks)",
            query.len(),
            train.len(),
            self.cfg.trees,
            self.cfg.checks
        );
        Ok(matches)
    }
}
