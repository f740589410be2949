use crate::config::SensorSettings;
use crate::rng::SimRng;
use rand::Rng;
use thiserror::Error;

pub mod default;
pub mod metec;
pub mod mock;

use default::DefaultSensor;
use metec::MetecNoWindSensor;

pub const DEFAULT_SENSOR_TYPE: &str = "default";
pub const METEC_NO_WIND_SENSOR_TYPE: &str = "METEC_no_wind";

/// Capability every screening sensor provides.
pub trait Sensor: Send + std::fmt::Debug {
    /// Whether an emission of `rate` (g/s) is detected.
    fn detect(&mut self, rate: f64, rng: &mut SimRng) -> bool;

    /// Measured rate (g/s) reported for a detected emission.
    fn measure(&mut self, rate: f64, rng: &mut SimRng) -> f64;

    /// Configuration key this sensor was built from.
    fn kind(&self) -> &'static str;
}

#[derive(Debug, Error, PartialEq)]
pub enum SensorError {
    #[error("unknown sensor type: {0}")]
    UnknownType(String),
    #[error("sensor {kind} expects {expected} mdl value(s), got {actual}")]
    InvalidMdl {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("quantification error must be within [0, 1], got {0}")]
    InvalidQuantificationError(f64),
}

/// Multiplicative uniform measurement error of `±fraction`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantificationError {
    fraction: f64,
}

impl QuantificationError {
    pub fn new(fraction: f64) -> Result<Self, SensorError> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(SensorError::InvalidQuantificationError(fraction));
        }
        Ok(Self { fraction })
    }

    pub fn exact() -> Self {
        Self { fraction: 0.0 }
    }

    pub fn apply(&self, rate: f64, rng: &mut SimRng) -> f64 {
        if self.fraction == 0.0 {
            return rate;
        }
        let error = rng.0.gen_range(-self.fraction..=self.fraction);
        (rate * (1.0 + error)).max(0.0)
    }
}

// Sensor registry
pub fn create_sensor(settings: &SensorSettings) -> Result<Box<dyn Sensor>, SensorError> {
    let quantification = QuantificationError::new(settings.quantification_error)?;

    match settings.kind.as_str() {
        DEFAULT_SENSOR_TYPE => {
            let [mdl] = expect_mdl::<1>(DEFAULT_SENSOR_TYPE, &settings.mdl)?;
            Ok(Box::new(DefaultSensor::new(mdl, quantification)))
        }
        METEC_NO_WIND_SENSOR_TYPE => {
            let mdl = expect_mdl::<2>(METEC_NO_WIND_SENSOR_TYPE, &settings.mdl)?;
            Ok(Box::new(MetecNoWindSensor::new(mdl, quantification)))
        }
        other => Err(SensorError::UnknownType(other.to_owned())),
    }
}

fn expect_mdl<const N: usize>(kind: &'static str, mdl: &[f64]) -> Result<[f64; N], SensorError> {
    mdl.try_into().map_err(|_| SensorError::InvalidMdl {
        kind,
        expected: N,
        actual: mdl.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(kind: &str, mdl: Vec<f64>) -> SensorSettings {
        SensorSettings {
            kind: kind.to_owned(),
            mdl,
            quantification_error: 0.0,
        }
    }

    #[test]
    fn registry_builds_known_sensors() -> Result<(), SensorError> {
        let default = create_sensor(&settings("default", vec![0.5]))?;
        let metec = create_sensor(&settings("METEC_no_wind", vec![3.0, 1.5]))?;

        assert_eq!(default.kind(), DEFAULT_SENSOR_TYPE);
        assert_eq!(metec.kind(), METEC_NO_WIND_SENSOR_TYPE);
        Ok(())
    }

    #[test]
    fn unknown_sensor_type_fails() {
        let err = create_sensor(&settings("infrared", vec![1.0])).unwrap_err();

        assert_eq!(err, SensorError::UnknownType("infrared".to_string()));
    }

    #[test]
    fn wrong_mdl_arity_fails() {
        let err = create_sensor(&settings("METEC_no_wind", vec![1.0])).unwrap_err();

        assert_eq!(
            err.to_string(),
            "sensor METEC_no_wind expects 2 mdl value(s), got 1"
        );
    }

    #[test]
    fn quantification_error_stays_within_bounds() -> Result<(), SensorError> {
        let quantification = QuantificationError::new(0.2)?;
        let mut rng = SimRng::from_seed_u64(3);

        for _ in 0..200 {
            let measured = quantification.apply(10.0, &mut rng);
            assert!((8.0..=12.0).contains(&measured));
        }
        assert!(QuantificationError::new(1.5).is_err());
        Ok(())
    }
}
