//! Stimulus sequencing policies
//!
//! Pure functions that turn a profile into the stimuli of a run. Nothing here
//! touches hardware; randomness is always drawn from a caller-supplied
//! generator so runs can be seeded.
//!
//! - **Staircase** (threshold test): adaptive, one [`StaircasePass`] at a time
//! - **Spatial**: balanced region sampling with [`spatial_schedule`]
//! - **Discrimination**: shuffled repeats of the level schedule with
//!   [`discrimination_schedule`]

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::{MotorRange, ThresholdConfig};
use crate::types::{Category, Intensity, Region, SamplingMode, StaircaseDirection};

// ============================================================================
// Staircase
// ============================================================================

/// Intensity where the descending walk switches to the fine step
pub const DESCENDING_ANCHOR: Intensity = 20;

/// Fine step used below [`DESCENDING_ANCHOR`]
pub const FINE_DESCENDING_STEP: Intensity = 2;

/// Possible descending start intensities
pub const DESCENDING_STARTS: [Intensity; 2] = [30, 40];

/// Lowest ascending start intensity
pub const ASCENDING_START_MIN: Intensity = 2;

/// Highest ascending start intensity
pub const ASCENDING_START_MAX: Intensity = 8;

/// Shuffled pass order for one motor: `repeats` passes in each direction.
pub fn pass_order<R: Rng + ?Sized>(rng: &mut R, repeats: usize) -> Vec<StaircaseDirection> {
    let mut order: Vec<StaircaseDirection> = (0..repeats)
        .flat_map(|_| [StaircaseDirection::Descending, StaircaseDirection::Ascending])
        .collect();
    order.shuffle(rng);
    order
}

/// Descending walk from `start`: coarse steps of `|delta_down|` down to the
/// anchor (exclusive), then fine steps from the anchor down to `end_down`
/// (exclusive).
#[must_use]
pub fn descending_sequence(start: Intensity, config: &ThresholdConfig) -> Vec<Intensity> {
    let coarse = i32::from(config.down_step().max(1));
    let anchor = i32::from(DESCENDING_ANCHOR);
    let fine = i32::from(FINE_DESCENDING_STEP);
    let end = i32::from(config.end_down);

    let mut sequence = Vec::new();
    let mut value = i32::from(start);
    while value > anchor {
        sequence.push(value);
        value -= coarse;
    }
    let mut value = anchor;
    while value > end {
        sequence.push(value);
        value -= fine;
    }
    sequence
        .into_iter()
        .filter_map(|v| Intensity::try_from(v).ok())
        .collect()
}

/// Ascending walk from `start` in steps of `delta_up` up to `end_up`
/// (exclusive).
#[must_use]
pub fn ascending_sequence(start: Intensity, config: &ThresholdConfig) -> Vec<Intensity> {
    let step = usize::from(config.delta_up.max(1));
    (start..config.end_up).step_by(step).collect()
}

/// Outcome of feeding one answer into a [`StaircasePass`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassStep {
    /// Present this intensity next
    Next(Intensity),
    /// Pass finished with this threshold estimate
    Done(Intensity),
}

/// One adaptive staircase pass over a precomputed intensity walk.
#[derive(Clone, Debug)]
pub struct StaircasePass {
    direction: StaircaseDirection,
    sequence: Vec<Intensity>,
    position: usize,
    down_step: Intensity,
    end_up: Intensity,
    result: Option<Intensity>,
}

impl StaircasePass {
    /// Pass over an explicit walk.
    #[must_use]
    pub fn new(
        direction: StaircaseDirection,
        sequence: Vec<Intensity>,
        config: &ThresholdConfig,
    ) -> Self {
        Self {
            direction,
            sequence,
            position: 0,
            down_step: config.down_step(),
            end_up: config.end_up,
            result: None,
        }
    }

    /// Pass with a randomly drawn start intensity.
    pub fn generate<R: Rng + ?Sized>(
        rng: &mut R,
        direction: StaircaseDirection,
        config: &ThresholdConfig,
    ) -> Self {
        let sequence = match direction {
            StaircaseDirection::Descending => {
                let start = *DESCENDING_STARTS
                    .choose(rng)
                    .unwrap_or(&DESCENDING_STARTS[0]);
                descending_sequence(start, config)
            }
            StaircaseDirection::Ascending => {
                let start = rng.gen_range(ASCENDING_START_MIN..=ASCENDING_START_MAX);
                ascending_sequence(start, config)
            }
        };
        Self::new(direction, sequence, config)
    }

    /// Pass direction
    #[must_use]
    pub fn direction(&self) -> StaircaseDirection {
        self.direction
    }

    /// Full intensity walk
    #[must_use]
    pub fn sequence(&self) -> &[Intensity] {
        &self.sequence
    }

    /// Threshold once the pass has finished
    #[must_use]
    pub fn result(&self) -> Option<Intensity> {
        self.result
    }

    /// Threshold reported when the walk runs out without a stop.
    #[must_use]
    pub fn exhausted_threshold(&self) -> Intensity {
        match self.direction {
            StaircaseDirection::Descending => self.down_step,
            StaircaseDirection::Ascending => self.end_up,
        }
    }

    /// First step of the pass.
    pub fn start(&mut self) -> PassStep {
        self.position = 0;
        self.result = None;
        self.step_at_position()
    }

    /// Feed the answer for the intensity last returned as [`PassStep::Next`].
    pub fn respond(&mut self, felt: bool) -> PassStep {
        if let Some(result) = self.result {
            return PassStep::Done(result);
        }
        let Some(&presented) = self.sequence.get(self.position) else {
            return self.finish(self.exhausted_threshold());
        };
        if felt == self.direction.stopping_response() {
            let threshold = match self.direction {
                StaircaseDirection::Descending => presented.saturating_add(self.down_step),
                StaircaseDirection::Ascending => presented,
            };
            return self.finish(threshold);
        }
        self.position += 1;
        self.step_at_position()
    }

    fn step_at_position(&mut self) -> PassStep {
        match self.sequence.get(self.position) {
            Some(&next) => PassStep::Next(next),
            None => self.finish(self.exhausted_threshold()),
        }
    }

    fn finish(&mut self, threshold: Intensity) -> PassStep {
        self.result = Some(threshold);
        PassStep::Done(threshold)
    }
}

/// Mean of the pass results, rounded half to even.
#[must_use]
pub fn mean_threshold(results: &[Intensity]) -> Option<Intensity> {
    if results.is_empty() {
        return None;
    }
    let sum: f64 = results.iter().map(|&v| f64::from(v)).sum();
    let mean = (sum / results.len() as f64).round_ties_even();
    Some(mean.clamp(0.0, f64::from(Intensity::MAX)) as Intensity)
}

// ============================================================================
// Spatial
// ============================================================================

/// Region pool for a motor range.
///
/// `Pairs`: adjacent pairs starting at every `step`-th motor from `start` up
/// to but excluding `end`. `Single`: every motor of `start..=end`.
#[must_use]
pub fn spatial_regions(range: &MotorRange, mode: SamplingMode) -> Vec<Region> {
    if range.start > range.end {
        return Vec::new();
    }
    match mode {
        SamplingMode::Pairs => {
            if range.step == 0 {
                return Vec::new();
            }
            (range.start..range.end)
                .step_by(range.step)
                .map(|first| Region {
                    index: region_index(first, range.start, range.step),
                    motors: vec![first, first + 1],
                })
                .collect()
        }
        SamplingMode::Single => (range.start..=range.end)
            .map(|motor| Region {
                index: region_index(motor, range.start, 1),
                motors: vec![motor],
            })
            .collect(),
    }
}

fn region_index(first_motor: usize, start: usize, step: usize) -> Category {
    Category::try_from((first_motor - start) / step + 1).unwrap_or(Category::MAX)
}

/// Balanced presentation order over `regions`.
///
/// With `q, r = divmod(samples, regions.len())`, every region appears `q`
/// times, `r` distinct regions appear once more, and the whole list is
/// shuffled.
pub fn spatial_schedule<R: Rng + ?Sized>(
    rng: &mut R,
    regions: &[Region],
    samples: usize,
) -> Vec<Region> {
    if regions.is_empty() {
        return Vec::new();
    }
    let full_cycles = samples / regions.len();
    let extra = samples % regions.len();

    let mut schedule = Vec::with_capacity(samples);
    for _ in 0..full_cycles {
        schedule.extend(regions.iter().cloned());
    }
    schedule.extend(regions.choose_multiple(rng, extra).cloned());
    schedule.shuffle(rng);
    schedule
}

// ============================================================================
// Discrimination
// ============================================================================

/// One scheduled discrimination presentation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelPresentation {
    /// 1-based rank of the intensity in the sorted schedule
    pub level: Category,
    /// Intensity to present
    pub intensity: Intensity,
}

/// 1-based rank of `intensity` within the sorted schedule.
#[must_use]
pub fn level_of(sorted_levels: &[Intensity], intensity: Intensity) -> Option<Category> {
    sorted_levels
        .binary_search(&intensity)
        .ok()
        .and_then(|i| Category::try_from(i + 1).ok())
}

/// Every level `repeats` times, shuffled.
pub fn discrimination_schedule<R: Rng + ?Sized>(
    rng: &mut R,
    levels: &[Intensity],
    repeats: usize,
) -> Vec<LevelPresentation> {
    let mut sorted = levels.to_vec();
    sorted.sort_unstable();

    let mut schedule: Vec<LevelPresentation> = (0..repeats)
        .flat_map(|_| levels.iter().copied())
        .filter_map(|intensity| {
            level_of(&sorted, intensity).map(|level| LevelPresentation { level, intensity })
        })
        .collect();
    schedule.shuffle(rng);
    schedule
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_descending_sequence_shape() {
        let config = ThresholdConfig::default();
        assert_eq!(
            descending_sequence(30, &config),
            vec![30, 25, 20, 18, 16, 14, 12, 10, 8, 6, 4, 2]
        );
        assert_eq!(descending_sequence(40, &config)[..4], [40, 35, 30, 25]);
    }

    #[test]
    fn test_ascending_sequence_shape() {
        let config = ThresholdConfig::default();
        assert_eq!(
            ascending_sequence(5, &config),
            vec![5, 7, 9, 11, 13, 15, 17, 19, 21, 23, 25, 27, 29]
        );
    }

    #[test]
    fn test_descending_stop_returns_last_felt() {
        let config = ThresholdConfig::default();
        let mut pass = StaircasePass::new(
            StaircaseDirection::Descending,
            vec![35, 30, 25, 20, 18, 16],
            &config,
        );
        assert_eq!(pass.start(), PassStep::Next(35));
        assert_eq!(pass.respond(true), PassStep::Next(30));
        assert_eq!(pass.respond(true), PassStep::Next(25));
        assert_eq!(pass.respond(true), PassStep::Next(20));
        assert_eq!(pass.respond(false), PassStep::Done(25));
        assert_eq!(pass.result(), Some(25));
    }

    #[test]
    fn test_descending_exhausted_reports_floor() {
        let config = ThresholdConfig::default();
        let mut pass = StaircasePass::new(
            StaircaseDirection::Descending,
            vec![35, 30, 25, 20, 18, 16],
            &config,
        );
        let mut step = pass.start();
        while let PassStep::Next(_) = step {
            step = pass.respond(true);
        }
        assert_eq!(step, PassStep::Done(5));
    }

    #[test]
    fn test_ascending_stop_and_exhaustion() {
        let config = ThresholdConfig::default();
        let mut pass =
            StaircasePass::new(StaircaseDirection::Ascending, vec![4, 6, 8], &config);
        assert_eq!(pass.start(), PassStep::Next(4));
        assert_eq!(pass.respond(false), PassStep::Next(6));
        assert_eq!(pass.respond(true), PassStep::Done(6));

        let mut pass =
            StaircasePass::new(StaircaseDirection::Ascending, vec![4, 6], &config);
        pass.start();
        pass.respond(false);
        assert_eq!(pass.respond(false), PassStep::Done(config.end_up));
    }

    #[test]
    fn test_empty_walk_finishes_immediately() {
        let config = ThresholdConfig::default();
        let mut pass = StaircasePass::new(StaircaseDirection::Ascending, Vec::new(), &config);
        assert_eq!(pass.start(), PassStep::Done(30));
    }

    #[test]
    fn test_generated_starts_within_bounds() {
        let config = ThresholdConfig::default();
        let mut rng = rng();
        for _ in 0..50 {
            let down = StaircasePass::generate(&mut rng, StaircaseDirection::Descending, &config);
            assert!(DESCENDING_STARTS.contains(&down.sequence()[0]));
            let up = StaircasePass::generate(&mut rng, StaircaseDirection::Ascending, &config);
            assert!((ASCENDING_START_MIN..=ASCENDING_START_MAX).contains(&up.sequence()[0]));
        }
    }

    #[test]
    fn test_pass_order_balanced() {
        let order = pass_order(&mut rng(), 3);
        assert_eq!(order.len(), 6);
        let down = order
            .iter()
            .filter(|d| **d == StaircaseDirection::Descending)
            .count();
        assert_eq!(down, 3);
    }

    #[test]
    fn test_mean_threshold_rounding() {
        assert_eq!(mean_threshold(&[10, 11]), Some(10));
        assert_eq!(mean_threshold(&[11, 12]), Some(12));
        assert_eq!(mean_threshold(&[10, 13, 13]), Some(12));
        assert_eq!(mean_threshold(&[]), None);
    }

    #[test]
    fn test_pair_regions() {
        let range = MotorRange {
            start: 0,
            end: 5,
            step: 2,
        };
        let regions = spatial_regions(&range, SamplingMode::Pairs);
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].motors, vec![0, 1]);
        assert_eq!(regions[2].motors, vec![4, 5]);
        assert_eq!(
            regions.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_single_regions_use_unit_step() {
        let range = MotorRange {
            start: 2,
            end: 5,
            step: 2,
        };
        let regions = spatial_regions(&range, SamplingMode::Single);
        assert_eq!(regions.len(), 4);
        assert_eq!(regions[3].index, 4);
        assert_eq!(regions[3].motors, vec![5]);
    }

    #[test]
    fn test_spatial_schedule_balanced_remainder() {
        let range = MotorRange {
            start: 0,
            end: 3,
            step: 1,
        };
        let regions = spatial_regions(&range, SamplingMode::Single);
        assert_eq!(regions.len(), 4);

        let schedule = spatial_schedule(&mut rng(), &regions, 10);
        assert_eq!(schedule.len(), 10);

        let mut counts: HashMap<Category, usize> = HashMap::new();
        for region in &schedule {
            *counts.entry(region.index).or_default() += 1;
        }
        assert_eq!(counts.len(), 4);
        assert!(counts.values().all(|&c| c == 2 || c == 3));
        assert_eq!(counts.values().filter(|&&c| c == 3).count(), 2);
    }

    #[test]
    fn test_spatial_schedule_fewer_samples_than_regions() {
        let range = MotorRange {
            start: 0,
            end: 5,
            step: 1,
        };
        let regions = spatial_regions(&range, SamplingMode::Single);
        let schedule = spatial_schedule(&mut rng(), &regions, 4);
        let mut seen: Vec<Category> = schedule.iter().map(|r| r.index).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_discrimination_schedule_levels_are_ranks() {
        let levels = [60, 14, 36];
        let schedule = discrimination_schedule(&mut rng(), &levels, 2);
        assert_eq!(schedule.len(), 6);
        for item in &schedule {
            let expected = match item.intensity {
                14 => 1,
                36 => 2,
                60 => 3,
                other => panic!("unexpected intensity {other}"),
            };
            assert_eq!(item.level, expected);
        }
        for level in 1..=3 {
            assert_eq!(schedule.iter().filter(|p| p.level == level).count(), 2);
        }
    }

    #[test]
    fn test_level_of_missing_intensity() {
        assert_eq!(level_of(&[10, 20], 15), None);
        assert_eq!(level_of(&[10, 20], 20), Some(2));
    }
}
