//! Gillespie sampling with piecewise-constant, time-varying propensities.
//!
//! The waiting time is drawn with the propensity active at the current time.
//! If the tentative event falls at or beyond the next checkpoint, the draw is
//! discarded and redrawn from that checkpoint with the new propensity. By
//! memorylessness of the exponential distribution this is exact.

use rand::distributions::Open01;
use rand::Rng;

use super::rates::AggregatedRates;
use crate::error::{Error, Result};

/// Exponential waiting time for total propensity `total_rate > 0`.
#[inline]
pub fn waiting_time<R: Rng + ?Sized>(total_rate: f64, rng: &mut R) -> f64 {
    let u: f64 = rng.sample(Open01);
    -u.ln() / total_rate
}

/// Pick a channel proportionally to its propensity.
///
/// Returns the first channel whose cumulative propensity strictly exceeds
/// `u * total_rate`. Zero-propensity channels are never chosen.
pub fn choose_channel<R, I>(rates: I, total_rate: f64, rng: &mut R) -> Result<usize>
where
    R: Rng + ?Sized,
    I: IntoIterator<Item = f64>,
{
    let target = rng.gen::<f64>() * total_rate;
    let mut cumsum = 0.0;
    let mut n_channels = 0;
    for (i, rate) in rates.into_iter().enumerate() {
        cumsum += rate;
        n_channels = i + 1;
        if cumsum > target {
            return Ok(i);
        }
    }
    Err(Error::invariant(format!(
        "no channel among {} reached the draw {} (total propensity {}, cumulative {})",
        n_channels, target, total_rate, cumsum
    )))
}

/// Event drawn from a rate schedule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduledEvent {
    /// Absolute event time.
    pub time: f64,
    pub channel: usize,
}

/// Sampler over an aggregated rate schedule.
///
/// Owns the schedule cursor, which only moves forward across calls.
#[derive(Clone, Debug)]
pub struct RateSampler<'a> {
    rates: &'a AggregatedRates,
    horizon: f64,
    cursor: usize,
}

impl<'a> RateSampler<'a> {
    pub fn new(rates: &'a AggregatedRates, horizon: f64) -> Self {
        Self {
            rates,
            horizon,
            cursor: 0,
        }
    }

    /// Index of the checkpoint interval the last draw was made in.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn horizon(&self) -> f64 {
        self.horizon
    }

    /// End of checkpoint interval `k`, clipped to the horizon.
    fn interval_end(&self, k: usize) -> f64 {
        match self.rates.times().get(k + 1) {
            Some(&next) => next.min(self.horizon),
            None => self.horizon,
        }
    }

    /// Draw the next event after time `t`.
    ///
    /// Returns `None` if no event happens before the horizon; the caller
    /// should advance to the horizon and stop.
    pub fn next_event<R: Rng + ?Sized>(
        &mut self,
        t: f64,
        rng: &mut R,
    ) -> Result<Option<ScheduledEvent>> {
        let times = self.rates.times();
        let mut now = t;

        while self.cursor + 1 < times.len() && times[self.cursor + 1] <= now {
            self.cursor += 1;
        }

        loop {
            if now >= self.horizon {
                return Ok(None);
            }
            let end = self.interval_end(self.cursor);
            let total = self.rates.total(self.cursor);

            if total > 0.0 {
                let candidate = now + waiting_time(total, rng);
                if candidate < end {
                    let channel =
                        choose_channel(self.rates.channel_rates(self.cursor), total, rng)?;
                    return Ok(Some(ScheduledEvent {
                        time: candidate,
                        channel,
                    }));
                }
            }

            // Deferred: restart from the boundary with the next propensity.
            if self.cursor + 1 >= times.len() || end >= self.horizon {
                return Ok(None);
            }
            now = end;
            self.cursor += 1;
        }
    }
}
