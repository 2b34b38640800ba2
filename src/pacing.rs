//! Human-like pacing between actions.
//!
//! Each delay is uniform in `[min, max]`; with the configured chance an
//! extended break, uniform in `[extended_min, extended_max]`, is added on
//! top.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::CampaignConfig;

/// A computed pause before the next action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delay {
    pub duration: Duration,
    /// An extended break was layered on top of the base delay.
    pub extended: bool,
}

/// Compute the next delay.
pub fn next_delay<R: Rng + ?Sized>(
    rng: &mut R,
    min_delay: f64,
    max_delay: f64,
    extended_break_chance_pct: f64,
    extended_min: f64,
    extended_max: f64,
) -> Delay {
    let mut secs = uniform(rng, min_delay, max_delay);
    let chance = (extended_break_chance_pct / 100.0).clamp(0.0, 1.0);
    let extended = rng.r#gen::<f64>() < chance;
    if extended {
        secs += uniform(rng, extended_min, extended_max);
    }
    Delay {
        duration: Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX),
        extended,
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, a: f64, b: f64) -> f64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let lo = lo.max(0.0);
    let hi = hi.max(lo);
    if lo == hi {
        lo
    } else {
        rng.gen_range(lo..=hi)
    }
}

/// Owns the randomness source used for pacing.
#[derive(Debug)]
pub struct Pacer {
    rng: StdRng,
}

impl Pacer {
    /// Entropy-seeded pacer for production use.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic pacer.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_delay(&mut self, config: &CampaignConfig) -> Delay {
        next_delay(
            &mut self.rng,
            config.min_delay_sec,
            config.max_delay_sec,
            config.extended_break_chance_pct,
            config.extended_break_min_sec,
            config.extended_break_max_sec,
        )
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new()
    }
}
