use crate::rng::SimRng;
use crate::sensor::Sensor;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockSensorBehavior {
    pub detect_ok: bool,
    /// Reported rate; `None` reports the true rate.
    pub measured_rate: Option<f64>,
}

impl MockSensorBehavior {
    pub fn passthrough() -> Self {
        Self {
            detect_ok: true,
            measured_rate: None,
        }
    }

    pub fn miss() -> Self {
        Self {
            detect_ok: false,
            measured_rate: None,
        }
    }

    pub fn with_reading(measured_rate: f64) -> Self {
        Self {
            detect_ok: true,
            measured_rate: Some(measured_rate),
        }
    }
}

/// Sensor replaying a scripted sequence of behaviours, one per survey.
///
/// Once the script runs out every survey behaves like `passthrough`.
#[derive(Debug, Clone)]
pub struct MockSensor {
    behaviors: Vec<MockSensorBehavior>,
    next_index: usize,
    current: MockSensorBehavior,
}

impl MockSensor {
    pub fn new(behaviors: Vec<MockSensorBehavior>) -> Self {
        Self {
            behaviors,
            next_index: 0,
            current: MockSensorBehavior::passthrough(),
        }
    }

    fn next_behavior(&mut self) -> MockSensorBehavior {
        let behavior = self
            .behaviors
            .get(self.next_index)
            .copied()
            .unwrap_or_else(MockSensorBehavior::passthrough);
        self.next_index += 1;
        behavior
    }
}

impl Sensor for MockSensor {
    fn detect(&mut self, _rate: f64, _rng: &mut SimRng) -> bool {
        self.current = self.next_behavior();
        self.current.detect_ok
    }

    fn measure(&mut self, rate: f64, _rng: &mut SimRng) -> f64 {
        self.current.measured_rate.unwrap_or(rate)
    }

    fn kind(&self) -> &'static str {
        "mock"
    }
}
