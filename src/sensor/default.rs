use crate::rng::SimRng;
use crate::sensor::{DEFAULT_SENSOR_TYPE, QuantificationError, Sensor};

/// Detects every emission at or above a fixed minimum detection limit.
#[derive(Debug, Clone)]
pub struct DefaultSensor {
    mdl: f64,
    quantification: QuantificationError,
}

impl DefaultSensor {
    pub fn new(mdl: f64, quantification: QuantificationError) -> Self {
        Self {
            mdl,
            quantification,
        }
    }
}

impl Sensor for DefaultSensor {
    fn detect(&mut self, rate: f64, _rng: &mut SimRng) -> bool {
        rate > 0.0 && rate >= self.mdl
    }

    fn measure(&mut self, rate: f64, rng: &mut SimRng) -> f64 {
        self.quantification.apply(rate, rng)
    }

    fn kind(&self) -> &'static str {
        DEFAULT_SENSOR_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_limit_is_inclusive() {
        let mut sensor = DefaultSensor::new(0.5, QuantificationError::exact());
        let mut rng = SimRng::default();

        assert!(sensor.detect(0.5, &mut rng));
        assert!(!sensor.detect(0.49, &mut rng));
    }

    #[test]
    fn zero_rate_is_never_detected() {
        let mut sensor = DefaultSensor::new(0.0, QuantificationError::exact());

        assert!(!sensor.detect(0.0, &mut SimRng::default()));
    }

    #[test]
    fn exact_quantification_reports_true_rate() {
        let mut sensor = DefaultSensor::new(0.0, QuantificationError::exact());

        assert_eq!(sensor.measure(4.2, &mut SimRng::default()), 4.2);
    }
}
