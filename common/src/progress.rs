use std::fmt;

/// Long-running batch phases that report progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    DevicePool,
    SerialNumbers,
    Warranty,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::DevicePool => "Processing device pool",
            Phase::SerialNumbers => "Getting serial numbers",
            Phase::Warranty => "Checking warranty info",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub trait ProgressReporter: Send + Sync {
    fn start(&self, phase: Phase, total: usize);
    fn advance(&self, phase: Phase);
    fn finish(&self, phase: Phase);
}

/// Discards all progress.
pub struct Silent;

impl ProgressReporter for Silent {
    fn start(&self, _phase: Phase, _total: usize) {}
    fn advance(&self, _phase: Phase) {}
    fn finish(&self, _phase: Phase) {}
}
