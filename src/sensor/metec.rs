use crate::rng::SimRng;
use crate::sensor::{METEC_NO_WIND_SENSOR_TYPE, QuantificationError, Sensor};
use rand::Rng;

/// g/s to kg/h.
const GS_TO_KGH: f64 = 3.6;

/// Logistic probability of detection fitted to METEC controlled releases,
/// without a wind term.
#[derive(Debug, Clone)]
pub struct MetecNoWindSensor {
    /// Logistic intercept and slope.
    mdl: [f64; 2],
    quantification: QuantificationError,
}

impl MetecNoWindSensor {
    pub fn new(mdl: [f64; 2], quantification: QuantificationError) -> Self {
        Self {
            mdl,
            quantification,
        }
    }

    pub fn probability_of_detection(&self, rate: f64) -> f64 {
        let rate_kgh = rate * GS_TO_KGH;
        1.0 / (1.0 + (self.mdl[0] - self.mdl[1] * rate_kgh).exp())
    }
}

impl Sensor for MetecNoWindSensor {
    fn detect(&mut self, rate: f64, rng: &mut SimRng) -> bool {
        if rate <= 0.0 {
            return false;
        }
        let probability = self.probability_of_detection(rate);
        probability >= 1.0 || rng.0.gen_bool(probability.clamp(0.0, 1.0))
    }

    fn measure(&mut self, rate: f64, rng: &mut SimRng) -> f64 {
        self.quantification.apply(rate, rng)
    }

    fn kind(&self) -> &'static str {
        METEC_NO_WIND_SENSOR_TYPE
    }
}
