//! Outcome analysis
//!
//! Pure reductions from raw trial data to clinical metrics:
//!
//! - [`confusion`]: confusion matrices and accuracy
//! - [`levels`]: per-level accuracy and scale-correction recommendations
//! - [`spatial`]: per-region localisation accuracy
//! - [`discrimination`]: aggregate discrimination result across motors

pub mod confusion;
pub mod discrimination;
pub mod levels;
pub mod spatial;

pub use confusion::ConfusionMatrix;
pub use discrimination::DiscriminationResult;
pub use levels::{analyse_levels, recommend, LevelAnalysis, Recommendation};
pub use spatial::{analyse_spatial, RegionStats, SpatialOutcome};
