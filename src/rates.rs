//! Exponential smoothing of per-entity throughput samples. Each entity is
//! seeded with its first sample, so there is no cold-start bias toward zero.

use std::{collections::HashMap, time::Duration};

use anyhow::{ensure, Result};

use crate::model::EntryId;

/// How the smoothing factor is obtained per update.
#[derive(Debug, Clone, Copy)]
pub enum Smoothing {
    /// Fixed factor in `(0, 1]`; elapsed time is ignored.
    Alpha(f64),
    /// `alpha = 1 - exp(-elapsed / half_life)`; the estimate converges at the
    /// same pace regardless of how often samples arrive.
    HalfLife(Duration),
}

impl Smoothing {
    fn alpha(self, elapsed: Duration) -> f64 {
        match self {
            Smoothing::Alpha(alpha) => alpha,
            Smoothing::HalfLife(half_life) => {
                let half_life = half_life.as_secs_f64();
                if half_life <= 0.0 {
                    return 1.0;
                }
                1.0 - (-elapsed.as_secs_f64() / half_life).exp()
            }
        }
    }
}

#[derive(Debug)]
pub struct RateEstimator {
    smoothing: Smoothing,
    estimates: HashMap<EntryId, f64>,
}

impl RateEstimator {
    pub fn new(smoothing: Smoothing) -> Result<Self> {
        if let Smoothing::Alpha(alpha) = smoothing {
            ensure!(
                alpha > 0.0 && alpha <= 1.0,
                "smoothing alpha must be in (0, 1], got {alpha}"
            );
        }
        Ok(Self {
            smoothing,
            estimates: HashMap::new(),
        })
    }

    /// Folds one sample into the entity's estimate and returns the new value.
    /// The first sample for an entity becomes the estimate as-is.
    pub fn update(&mut self, entity: EntryId, sample: f64, elapsed: Duration) -> f64 {
        let sample = sample.max(0.0);
        let estimate = match self.estimates.get(&entity) {
            None => sample,
            Some(previous) => {
                let alpha = self.smoothing.alpha(elapsed);
                (previous + alpha * (sample - previous)).max(0.0)
            }
        };
        self.estimates.insert(entity, estimate);
        estimate
    }

    /// Last computed estimate; entities keep it between updates until evicted.
    pub fn current_estimate(&self, entity: EntryId) -> Option<f64> {
        self.estimates.get(&entity).copied()
    }

    /// Drops one entity's state (the entity disappeared from the backend).
    pub fn evict(&mut self, entity: EntryId) {
        self.estimates.remove(&entity);
    }

    /// Drops every entity not present in the latest snapshot.
    pub fn retain_live(&mut self, live: impl Fn(EntryId) -> bool) {
        let dead: Vec<EntryId> = self
            .estimates
            .keys()
            .copied()
            .filter(|id| !live(*id))
            .collect();
        for id in dead {
            self.evict(id);
        }
    }

    pub fn tracked(&self) -> usize {
        self.estimates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: Duration = Duration::from_secs(1);

    #[test]
    fn first_sample_seeds_without_warm_up_bias() {
        let mut rates = RateEstimator::new(Smoothing::Alpha(0.3)).unwrap();
        assert_eq!(rates.update(1, 500.0, DT), 500.0);
        assert_eq!(rates.current_estimate(1), Some(500.0));
    }

    #[test]
    fn residual_shrinks_by_one_minus_alpha_per_update() {
        let alpha = 0.25;
        let target = 1000.0;
        let mut rates = RateEstimator::new(Smoothing::Alpha(alpha)).unwrap();
        rates.update(1, 0.0, DT);
        let mut residual = target;
        for _ in 0..10 {
            let estimate = rates.update(1, target, DT);
            let next_residual = target - estimate;
            assert!((next_residual - residual * (1.0 - alpha)).abs() < 1e-9);
            assert!(next_residual < residual);
            residual = next_residual;
        }
    }

    #[test]
    fn half_life_mode_is_frame_rate_independent() {
        let smoothing = Smoothing::HalfLife(Duration::from_secs(2));
        let mut slow = RateEstimator::new(smoothing).unwrap();
        let mut fast = RateEstimator::new(smoothing).unwrap();
        slow.update(1, 0.0, DT);
        fast.update(1, 0.0, DT);
        // One 4s update vs four 1s updates toward the same target.
        slow.update(1, 100.0, Duration::from_secs(4));
        for _ in 0..4 {
            fast.update(1, 100.0, DT);
        }
        let a = slow.current_estimate(1).unwrap();
        let b = fast.current_estimate(1).unwrap();
        assert!((a - b).abs() < 1e-9, "slow={a} fast={b}");
    }

    #[test]
    fn estimates_stay_non_negative() {
        let mut rates = RateEstimator::new(Smoothing::Alpha(1.0)).unwrap();
        rates.update(1, -42.0, DT);
        assert_eq!(rates.current_estimate(1), Some(0.0));
    }

    #[test]
    fn absent_entities_keep_their_estimate_until_evicted() {
        let mut rates = RateEstimator::new(Smoothing::Alpha(0.5)).unwrap();
        rates.update(1, 80.0, DT);
        rates.update(2, 20.0, DT);
        assert_eq!(rates.current_estimate(1), Some(80.0));
        rates.retain_live(|id| id == 2);
        assert_eq!(rates.current_estimate(1), None);
        assert_eq!(rates.current_estimate(2), Some(20.0));
        rates.evict(2);
        assert_eq!(rates.tracked(), 0);
    }

    #[test]
    fn alpha_outside_unit_interval_is_rejected() {
        assert!(RateEstimator::new(Smoothing::Alpha(0.0)).is_err());
        assert!(RateEstimator::new(Smoothing::Alpha(1.5)).is_err());
        assert!(RateEstimator::new(Smoothing::Alpha(1.0)).is_ok());
    }
}
