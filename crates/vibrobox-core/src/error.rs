//! Error types for configuration and analysis
//!
//! Both are detected without touching hardware: a malformed profile is
//! rejected before a run starts, and analysis errors only arise from data that
//! does not belong to the configured category set.

use thiserror::Error;

/// Configuration errors raised by [`crate::config::TestProfile::validate`]
/// and the per-test validators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Motor range is empty or reversed
    #[error("Empty motor range: start {start} > end {end}")]
    EmptyMotorRange {
        /// First motor index
        start: usize,
        /// Last motor index (inclusive)
        end: usize,
    },

    /// Motor range reaches beyond the physical array
    #[error("Motor {motor} is outside the array of {motor_count} motors")]
    MotorOutOfRange {
        /// Offending motor index
        motor: usize,
        /// Number of motors on the device
        motor_count: usize,
    },

    /// Selection step is zero
    #[error("Motor step must be at least 1")]
    ZeroStep,

    /// Hardware reports no motors
    #[error("Motor count must be at least 1")]
    NoMotors,

    /// A repeat/sample counter is zero
    #[error("Parameter {parameter} must be at least 1")]
    ZeroCount {
        /// Parameter name
        parameter: &'static str,
    },

    /// Spatial test has no regions to present
    #[error("No regions for {mode} mode in motor range {start}..={end}")]
    NoRegions {
        /// Sampling mode name
        mode: &'static str,
        /// First motor index
        start: usize,
        /// Last motor index (inclusive)
        end: usize,
    },

    /// Discrimination test has no intensity levels
    #[error("Intensity schedule is empty")]
    EmptySchedule,

    /// Same intensity listed twice, so levels would be ambiguous
    #[error("Intensity {intensity} appears more than once in the schedule")]
    DuplicateLevel {
        /// Repeated intensity
        intensity: u8,
    },

    /// Staircase parameter is out of range
    #[error("Invalid staircase parameter {parameter}: {reason}")]
    InvalidStaircase {
        /// Parameter name
        parameter: &'static str,
        /// Why the value is rejected
        reason: String,
    },
}

/// Errors raised while reducing trial data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// A category outside `1..=categories` was supplied
    #[error("Category {category} is outside 1..={categories}")]
    CategoryOutOfRange {
        /// Offending 1-based category
        category: u32,
        /// Number of categories in the matrix
        categories: usize,
    },

    /// Category list and intensity list disagree in length
    #[error("Matrix has {categories} categories but {intensities} intensities were given")]
    IntensityCountMismatch {
        /// Number of categories in the matrix
        categories: usize,
        /// Number of intensities supplied
        intensities: usize,
    },

    /// A count matrix whose rows do not all match its row count
    #[error("Confusion matrix row {row} has {len} cells, expected {categories}")]
    NotSquare {
        /// 0-based offending row
        row: usize,
        /// Cells in that row
        len: usize,
        /// Number of rows
        categories: usize,
    },
}

/// Result type for configuration validation
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;
