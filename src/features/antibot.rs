use rand::distr::{Distribution, Uniform};
use std::time::Duration;
use tracing::info;

/// Pause between two jobs, drawn uniformly from `[min_secs, max_secs]`.
///
/// Configured as the `"min-max"` string of `waitTime`; defaults to 3–10 s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitRange {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl Default for WaitRange {
    fn default() -> Self {
        Self {
            min_secs: 3,
            max_secs: 10,
        }
    }
}

impl WaitRange {
    /// Bounds are swapped into order if given backwards.
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs: min_secs.min(max_secs),
            max_secs: min_secs.max(max_secs),
        }
    }

    /// Parse `"3-10"` (whitespace tolerated). `None` when malformed or `min > max`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (lo, hi) = raw.split_once('-')?;
        let lo: u64 = lo.trim().parse().ok()?;
        let hi: u64 = hi.trim().parse().ok()?;
        (lo <= hi).then_some(Self {
            min_secs: lo,
            max_secs: hi,
        })
    }

    /// Random whole number of seconds within the inclusive range.
    pub fn random_secs(&self) -> u64 {
        if self.min_secs >= self.max_secs {
            return self.min_secs;
        }
        let mut rng = rand::rng();
        match Uniform::new_inclusive(self.min_secs, self.max_secs) {
            Ok(dist) => dist.sample(&mut rng),
            Err(_) => self.min_secs,
        }
    }
}

/// Rate limiter applied after every processed job, sent or not.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    range: WaitRange,
    /// Length of one "second"; shortened in tests.
    unit: Duration,
}

impl Pacer {
    pub fn new(range: WaitRange) -> Self {
        Self {
            range,
            unit: Duration::from_secs(1),
        }
    }

    pub fn with_unit(mut self, unit: Duration) -> Self {
        self.unit = unit;
        self
    }

    pub fn range(&self) -> WaitRange {
        self.range
    }

    /// Sleep for a freshly drawn delay and return the drawn seconds.
    pub async fn pause(&self) -> u64 {
        let secs = self.range.random_secs();
        info!("pacing: waiting {}s before the next job", secs);
        tokio::time::sleep(self.delay_for(secs)).await;
        secs
    }

    /// `secs` pacing units, saturating instead of overflowing.
    pub fn delay_for(&self, secs: u64) -> Duration {
        self.unit.saturating_mul(u32::try_from(secs).unwrap_or(u32::MAX))
    }
}
