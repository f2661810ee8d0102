use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::pipeline::PipelineStage;

/// One progress tick, handed to the caller's callback.
#[derive(Debug, Clone)]
pub struct PipelineProgress {
    pub stage: PipelineStage,
    pub current: usize,
    pub total: usize,
    pub message: String,
    pub stage_elapsed: Duration,
    pub stage_remaining: Option<Duration>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StageTiming {
    pub stage: PipelineStage,
    pub elapsed_ms: u64,
}

/// Stage clock plus callback. Owned by the pipeline context, never global.
pub struct ProgressTracker<'a> {
    run_started: Instant,
    stage: PipelineStage,
    stage_started: Instant,
    timings: Vec<StageTiming>,
    sink: Box<dyn FnMut(&PipelineProgress) + 'a>,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(sink: impl FnMut(&PipelineProgress) + 'a) -> Self {
        let now = Instant::now();
        Self {
            run_started: now,
            stage: PipelineStage::Initialized,
            stage_started: now,
            timings: Vec::new(),
            sink: Box::new(sink),
        }
    }

    pub fn silent() -> Self {
        Self::new(|_| {})
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Close the current stage's clock and start `stage`.
    pub fn enter(&mut self, stage: PipelineStage) {
        self.close_stage();
        self.stage = stage;
        self.stage_started = Instant::now();
        self.report(0, 0, format!("{stage}"));
    }

    pub fn report(&mut self, current: usize, total: usize, message: impl Into<String>) {
        let stage_elapsed = self.stage_started.elapsed();
        let tick = PipelineProgress {
            stage: self.stage,
            current,
            total,
            message: message.into(),
            stage_elapsed,
            stage_remaining: estimate_remaining(stage_elapsed, current, total),
        };
        debug!(stage = %tick.stage, current, total, message = %tick.message, "progress");
        (self.sink)(&tick);
    }

    /// Stop the clock for good and return every stage's duration.
    pub fn finish(&mut self, terminal: PipelineStage) -> Vec<StageTiming> {
        self.close_stage();
        self.stage = terminal;
        self.stage_started = Instant::now();
        std::mem::take(&mut self.timings)
    }

    pub fn elapsed(&self) -> Duration {
        self.run_started.elapsed()
    }

    fn close_stage(&mut self) {
        if self.stage.is_terminal() || self.stage == PipelineStage::Initialized {
            return;
        }
        self.timings.push(StageTiming {
            stage: self.stage,
            elapsed_ms: self.stage_started.elapsed().as_millis() as u64,
        });
    }
}

/// Linear extrapolation from the work done so far; `None` until something
/// has been done.
pub fn estimate_remaining(elapsed: Duration, current: usize, total: usize) -> Option<Duration> {
    if current == 0 || total == 0 || current > total {
        return None;
    }
    let per_unit = elapsed.as_secs_f64() / current as f64;
    Some(Duration::from_secs_f64(per_unit * (total - current) as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_is_linear() {
        let eta = estimate_remaining(Duration::from_secs(10), 25, 100).expect("eta");
        assert_eq!(eta.as_secs(), 30);
        assert_eq!(estimate_remaining(Duration::from_secs(1), 0, 10), None);
        assert_eq!(
            estimate_remaining(Duration::from_secs(1), 10, 10),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn records_each_stage_once() {
        let mut ticks = Vec::new();
        {
            let mut tracker = ProgressTracker::new(|p: &PipelineProgress| ticks.push(p.stage));
            tracker.enter(PipelineStage::Loading);
            tracker.report(1, 2, "players");
            tracker.enter(PipelineStage::Processing);
            let timings = tracker.finish(PipelineStage::Done);
            let stages: Vec<_> = timings.iter().map(|t| t.stage).collect();
            assert_eq!(stages, vec![PipelineStage::Loading, PipelineStage::Processing]);
            assert_eq!(tracker.stage(), PipelineStage::Done);
        }
        assert_eq!(
            ticks,
            vec![
                PipelineStage::Loading,
                PipelineStage::Loading,
                PipelineStage::Processing
            ]
        );
    }
}
