// Exponential epsilon decay

/// Epsilon as a pure function of the step count:
/// `min + (max - min) * exp(-lambda * step)` with
/// `lambda = -ln(0.01) / horizon`, so the schedule has covered 99% of its
/// range once `step == horizon`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsilonSchedule {
    max: f64,
    min: f64,
    lambda: f64,
}

impl EpsilonSchedule {
    pub fn new(max: f64, min: f64, horizon: u64) -> Self {
        let lambda = -(0.01f64).ln() / horizon.max(1) as f64;
        Self { max, min, lambda }
    }

    pub fn value(&self, step: u64) -> f64 {
        self.min + (self.max - self.min) * (-self.lambda * step as f64).exp()
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn min(&self) -> f64 {
        self.min
    }
}
