//! Load predictor — exponentially smoothed demand signal.

use std::sync::Mutex;

/// Exponential moving average over periodic load observations.
///
/// The first observation seeds the average exactly; each later one folds
/// in as `alpha * v + (1 - alpha) * ema`. Higher `alpha` weighs recent
/// load heavier (responsiveness over smoothness). Both methods are
/// thread-safe and non-blocking beyond the leaf mutex.
pub struct LoadPredictor {
    alpha: f64,
    state: Mutex<EmaState>,
}

#[derive(Default)]
struct EmaState {
    ema: f64,
    seeded: bool,
}

impl LoadPredictor {
    /// Create a predictor. `alpha` must lie in (0, 1); config validation
    /// enforces this before construction.
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            state: Mutex::new(EmaState::default()),
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Fold a non-negative load observation into the average.
    pub fn observe(&self, v: f64) {
        let mut state = self.state.lock().expect("predictor state lock poisoned");
        if state.seeded {
            state.ema = self.alpha * v + (1.0 - self.alpha) * state.ema;
        } else {
            state.ema = v;
            state.seeded = true;
        }
    }

    /// Current smoothed demand. Zero until the first observation.
    pub fn forecast(&self) -> f64 {
        self.state
            .lock()
            .expect("predictor state lock poisoned")
            .ema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseeded_forecast_is_zero() {
        let predictor = LoadPredictor::new(0.6);
        assert_eq!(predictor.forecast(), 0.0);
    }

    #[test]
    fn first_observation_seeds_exactly() {
        let predictor = LoadPredictor::new(0.6);
        predictor.observe(42.0);
        assert_eq!(predictor.forecast(), 42.0);
    }

    #[test]
    fn fold_matches_the_ema_formula() {
        let predictor = LoadPredictor::new(0.6);
        predictor.observe(10.0);
        predictor.observe(20.0);
        // 0.6 * 20 + 0.4 * 10
        assert!((predictor.forecast() - 16.0).abs() < 1e-9);
        predictor.observe(0.0);
        // 0.6 * 0 + 0.4 * 16
        assert!((predictor.forecast() - 6.4).abs() < 1e-9);
    }

    #[test]
    fn converges_to_a_constant_stream() {
        let predictor = LoadPredictor::new(0.3);
        predictor.observe(100.0);
        for _ in 0..50 {
            predictor.observe(7.0);
        }
        assert!((predictor.forecast() - 7.0).abs() < 1e-6);
    }

    #[test]
    fn observations_are_thread_safe() {
        use std::sync::Arc;
        use std::thread;

        let predictor = Arc::new(LoadPredictor::new(0.5));
        let mut handles = vec![];
        for _ in 0..4 {
            let p = Arc::clone(&predictor);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    p.observe(5.0);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        // Every observation was 5 after the seed, so the EMA is exactly 5.
        assert!((predictor.forecast() - 5.0).abs() < 1e-9);
    }
}
