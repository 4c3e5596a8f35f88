//! Open-loop arrival pacing.
//!
//! The scheduler decides when to launch independently of completions.
//! Poisson mode draws inter-arrival delays from an exponential distribution
//! so the offered load matches a target rate instead of reacting to server
//! latency.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// How successive launches are spaced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PacingMode {
    /// Launch as soon as the concurrency limiter admits.
    Unbounded,
    /// Poisson arrival process with the given mean rate (requests/second).
    Poisson { rate: f64 },
}

impl PacingMode {
    /// `rate <= 0` means unbounded.
    pub fn from_rate(rate: f64) -> Self {
        if rate > 0.0 {
            PacingMode::Poisson { rate }
        } else {
            PacingMode::Unbounded
        }
    }
}

/// Draws inter-arrival delays. The RNG is injectable via `seed` so tests
/// are deterministic.
pub struct Pacer {
    mode: PacingMode,
    rng: StdRng,
}

impl Pacer {
    pub fn new(mode: PacingMode, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { mode, rng }
    }

    /// Delay to wait before the next launch; `None` in unbounded mode.
    pub fn next_delay(&mut self) -> Option<Duration> {
        match self.mode {
            PacingMode::Unbounded => None,
            PacingMode::Poisson { rate } => {
                // Exp(rate): -ln(U)/rate, U ~ Uniform(0,1). Clamp U away
                // from zero so ln never produces infinity.
                let u: f64 = self.rng.gen::<f64>().max(f64::MIN_POSITIVE);
                Some(Duration::from_secs_f64(-u.ln() / rate))
            }
        }
    }
}
