//! VibroBox Core - test profiles, stimulus sequencing and outcome analysis
//!
//! This crate holds everything about the tactile test suite that does not
//! touch hardware or time: the data model, validated test profiles, the
//! stimulus sequencing policies of the three procedures, and the reductions
//! from raw trials to clinical metrics.
//!
//! # Modules
//!
//! - [`types`]: Stimuli, trials, regions and run results
//! - [`config`]: Test profiles and their validation
//! - [`sequencer`]: Staircase, spatial and discrimination sequencing
//! - [`analysis`]: Confusion matrices, accuracy and scale recommendations
//! - [`report`]: Patient-level summary
//! - [`error`]: Configuration and analysis errors
//!
//! # Example
//!
//! ```rust
//! use vibrobox_core::analysis::{analyse_levels, ConfusionMatrix, Recommendation};
//!
//! let cm = ConfusionMatrix::from_pairs(2, [(1, 1), (1, 1), (2, 2), (2, 2)]).unwrap();
//! let analysis = analyse_levels(&cm, &[20, 60]).unwrap();
//! assert_eq!(analysis.mean_accuracy, 1.0);
//! assert_eq!(analysis.recommendations, vec![Recommendation::NoCorrection]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod analysis;
pub mod config;
pub mod error;
pub mod report;
pub mod sequencer;
pub mod types;

// Re-export commonly used types at crate root
pub use analysis::{ConfusionMatrix, DiscriminationResult, LevelAnalysis, Recommendation, SpatialOutcome};
pub use config::{
    DiscriminationConfig, IndicatorConfig, MotorRange, SpatialConfig, TestProfile,
    ThresholdConfig, TimingConfig,
};
pub use error::{AnalysisError, AnalysisResult, ConfigError, ConfigResult};
pub use report::Summary;
pub use types::{
    Category, Intensity, MotorIndex, Region, SamplingMode, SpatialResult, StaircaseDirection,
    StaircaseStep, Stimulus, ThresholdResult, Trial,
};
