use std::time::Duration;

/// Pipeline stages the collector can account for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pyramid,
    Detect,
    Scan,
    Distribute,
    Describe,
}

const STAGES: [Stage; 5] = [
    Stage::Pyramid,
    Stage::Detect,
    Stage::Scan,
    Stage::Distribute,
    Stage::Describe,
];

impl Stage {
    fn index(self) -> usize {
        match self {
            Stage::Pyramid => 0,
            Stage::Detect => 1,
            Stage::Scan => 2,
            Stage::Distribute => 3,
            Stage::Describe => 4,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Stage::Pyramid => "pyramid",
            Stage::Detect => "detect",
            Stage::Scan => "scan",
            Stage::Distribute => "distribute",
            Stage::Describe => "describe",
        }
    }
}

/// Per-stage timing accumulator, passed explicitly into extraction calls.
/// Reporting is caller-triggered; nothing is emitted implicitly.
#[derive(Debug, Default, Clone)]
pub struct PerfCollector {
    totals: [Duration; 5],
    calls: [u64; 5],
}

impl PerfCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        let i = stage.index();
        self.totals[i] += elapsed;
        self.calls[i] += 1;
    }

    pub fn total(&self, stage: Stage) -> Duration {
        self.totals[stage.index()]
    }

    pub fn calls(&self, stage: Stage) -> u64 {
        self.calls[stage.index()]
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Human-readable accounting of accumulated stage timings.
    pub fn summary(&self) -> String {
        let mut lines = Vec::with_capacity(STAGES.len());
        for stage in STAGES {
            let i = stage.index();
            if self.calls[i] == 0 {
                continue;
            }
            lines.push(format!(
                "{:>10}: {:>9.3?} over {} calls",
                stage.label(),
                self.totals[i],
                self.calls[i]
            ));
        }
        if lines.is_empty() {
            "no stages recorded".to_string()
        } else {
            lines.join("\n")
        }
    }
}
