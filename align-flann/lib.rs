//! Approximate descriptor matching with a forest of randomized KD-trees,
//! followed by Lowe's ratio test.

pub mod error;
pub mod filter;
pub mod kdtree;
pub mod matcher;

pub use error::{MatchError, MatchResult};
pub use filter::{correspondences, ratio_test};
pub use kdtree::KdForest;
pub use matcher::{FlannMatcher, MatcherConfig};

/// Default ratio for [`ratio_test`]
pub const DEFAULT_RATIO: f32 = 0.7;
