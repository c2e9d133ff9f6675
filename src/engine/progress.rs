//! Progress fan-in from engine sub-steps into one reported fraction

use std::sync::{Arc, Mutex};

use crate::ports::ProgressCallback;

/// Highest value reported before a tracker is finished
pub const MAX_UNFINISHED: f64 = 0.999;

/// Sub-steps of a segment export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Copy,
    Encode,
    Concat,
}

/// Weight of each sub-step in a segment's progress
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    entries: Vec<(Step, f64)>,
}

impl WeightTable {
    /// A single step carrying all the weight
    pub fn single(step: Step) -> Self {
        Self {
            entries: vec![(step, 1.0)],
        }
    }

    /// Remainder copy and boundary encode average into the first half,
    /// the concatenation fills the second half.
    pub fn hybrid() -> Self {
        Self {
            entries: vec![(Step::Copy, 0.25), (Step::Encode, 0.25), (Step::Concat, 0.5)],
        }
    }

    pub fn steps(&self) -> impl Iterator<Item = Step> + '_ {
        self.entries.iter().map(|(step, _)| *step)
    }

    fn position(&self, step: Step) -> Option<usize> {
        self.entries.iter().position(|(s, _)| *s == step)
    }
}

/// Weighted sum of per-step fractions, each clamped to `[0, 1]`
pub fn aggregate(weights: &WeightTable, fractions: &[f64]) -> f64 {
    weights
        .entries
        .iter()
        .zip(fractions)
        .map(|((_, weight), fraction)| weight * fraction.clamp(0.0, 1.0))
        .sum()
}

/// Mean of segment fractions; an empty batch is complete
pub fn batch_fraction(segments: &[f64]) -> f64 {
    if segments.is_empty() {
        return 1.0;
    }
    segments.iter().sum::<f64>() / segments.len() as f64
}

struct TrackerState {
    fractions: Vec<f64>,
    reported: f64,
    finished: bool,
}

/// Per-segment progress tracker.
///
/// Reported values never decrease and stay below 1.0 until [`finish`]
/// is called.
///
/// [`finish`]: SegmentProgress::finish
#[derive(Clone)]
pub struct SegmentProgress {
    weights: Arc<WeightTable>,
    state: Arc<Mutex<TrackerState>>,
    sink: Arc<dyn ProgressCallback>,
}

impl SegmentProgress {
    pub fn new(weights: WeightTable, sink: Arc<dyn ProgressCallback>) -> Self {
        let steps = weights.entries.len();
        Self {
            weights: Arc::new(weights),
            state: Arc::new(Mutex::new(TrackerState {
                fractions: vec![0.0; steps],
                reported: 0.0,
                finished: false,
            })),
            sink,
        }
    }

    /// Callback feeding one sub-step
    pub fn step(&self, step: Step) -> StepProgress {
        StepProgress {
            tracker: self.clone(),
            slot: self.weights.position(step),
        }
    }

    /// Last reported value
    pub fn current(&self) -> f64 {
        self.state.lock().map(|s| s.reported).unwrap_or(0.0)
    }

    /// Mark the segment complete and report 1.0
    pub fn finish(&self) {
        if let Ok(mut state) = self.state.lock() {
            if state.finished {
                return;
            }
            state.finished = true;
            state.reported = 1.0;
        }
        self.sink.on_progress(1.0);
    }

    fn update(&self, slot: usize, fraction: f64) {
        let report = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            if state.finished {
                return;
            }
            if let Some(current) = state.fractions.get_mut(slot) {
                *current = current.max(fraction.clamp(0.0, 1.0));
            }
            let value = aggregate(&self.weights, &state.fractions).min(MAX_UNFINISHED);
            if value <= state.reported {
                return;
            }
            state.reported = value;
            value
        };
        self.sink.on_progress(report);
    }
}

/// Progress callback for one sub-step of a segment
pub struct StepProgress {
    tracker: SegmentProgress,
    slot: Option<usize>,
}

impl ProgressCallback for StepProgress {
    fn on_progress(&self, fraction: f64) {
        if let Some(slot) = self.slot {
            self.tracker.update(slot, fraction);
        }
    }
}

/// Fan-in of segment progress into `sum / count` for a whole batch
#[derive(Clone)]
pub struct BatchProgress {
    slots: Arc<Mutex<Vec<f64>>>,
    sink: Arc<dyn ProgressCallback>,
}

impl BatchProgress {
    pub fn new(segment_count: usize, sink: Arc<dyn ProgressCallback>) -> Self {
        Self {
            slots: Arc::new(Mutex::new(vec![0.0; segment_count])),
            sink,
        }
    }

    /// Sink receiving the progress of segment `index`
    pub fn segment(&self, index: usize) -> Arc<dyn ProgressCallback> {
        Arc::new(BatchSlot {
            batch: self.clone(),
            index,
        })
    }

    pub fn current(&self) -> f64 {
        self.slots
            .lock()
            .map(|slots| batch_fraction(&slots))
            .unwrap_or(0.0)
    }

    fn update(&self, index: usize, fraction: f64) {
        let overall = {
            let Ok(mut slots) = self.slots.lock() else {
                return;
            };
            if let Some(slot) = slots.get_mut(index) {
                *slot = fraction.clamp(0.0, 1.0);
            }
            batch_fraction(&slots)
        };
        self.sink.on_progress(overall);
    }
}

struct BatchSlot {
    batch: BatchProgress,
    index: usize,
}

impl ProgressCallback for BatchSlot {
    fn on_progress(&self, fraction: f64) {
        self.batch.update(self.index, fraction);
    }
}

/// Progress sink that drops every report
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_progress(&self, _fraction: f64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        values: Mutex<Vec<f64>>,
    }

    impl ProgressCallback for Recorder {
        fn on_progress(&self, fraction: f64) {
            self.values.lock().unwrap().push(fraction);
        }
    }

    #[test]
    fn test_hybrid_weights_sum_to_one() {
        let weights = WeightTable::hybrid();
        assert!((aggregate(&weights, &[1.0, 1.0, 1.0]) - 1.0).abs() < 1e-12);
        assert!((aggregate(&weights, &[1.0, 1.0, 0.0]) - 0.5).abs() < 1e-12);
        assert!((aggregate(&weights, &[0.5, 0.0, 0.0]) - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_batch_fraction() {
        assert_eq!(batch_fraction(&[]), 1.0);
        assert_eq!(batch_fraction(&[1.0, 0.0]), 0.5);
        assert_eq!(batch_fraction(&[0.25, 0.25, 0.25, 0.25]), 0.25);
    }

    #[test]
    fn test_segment_progress_is_monotonic_and_capped() {
        let recorder = Arc::new(Recorder::default());
        let tracker = SegmentProgress::new(WeightTable::hybrid(), recorder.clone());
        let copy = tracker.step(Step::Copy);
        let encode = tracker.step(Step::Encode);
        let concat = tracker.step(Step::Concat);

        copy.on_progress(1.0);
        copy.on_progress(0.2);
        encode.on_progress(1.0);
        concat.on_progress(1.0);
        assert!(tracker.current() < 1.0);

        tracker.finish();
        tracker.finish();
        copy.on_progress(0.0);

        let values = recorder.values.lock().unwrap().clone();
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(values.iter().filter(|v| **v == 1.0).count(), 1);
        assert_eq!(*values.last().unwrap(), 1.0);
    }

    #[test]
    fn test_unknown_step_is_ignored() {
        let recorder = Arc::new(Recorder::default());
        let tracker = SegmentProgress::new(WeightTable::single(Step::Copy), recorder.clone());
        tracker.step(Step::Concat).on_progress(0.9);
        assert!(recorder.values.lock().unwrap().is_empty());
    }

    #[test]
    fn test_batch_progress_fans_in() {
        let recorder = Arc::new(Recorder::default());
        let batch = BatchProgress::new(2, recorder.clone());
        batch.segment(0).on_progress(1.0);
        batch.segment(1).on_progress(0.5);
        assert_eq!(batch.current(), 0.75);
        assert_eq!(*recorder.values.lock().unwrap(), vec![0.5, 0.75]);
    }
}
