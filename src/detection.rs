use crate::error::AppError;
use crate::site::SiteId;
use std::collections::BTreeMap;
use time::Date;

/// A single screening result handed from a sensor to its method.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRecord {
    site_id: SiteId,
    rate_detected: f64,
    detection_date: Date,
    method: String,
}

impl DetectionRecord {
    pub fn new(
        site_id: impl Into<SiteId>,
        rate_detected: f64,
        detection_date: Date,
        method: impl Into<String>,
    ) -> Result<Self, AppError> {
        let site_id = site_id.into();
        if !rate_detected.is_finite() || rate_detected < 0.0 {
            return Err(AppError::InvalidRate {
                site_id,
                rate: rate_detected,
            });
        }
        Ok(Self {
            site_id,
            rate_detected,
            detection_date,
            method: method.into(),
        })
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn rate_detected(&self) -> f64 {
        self.rate_detected
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

/// Detection records waiting to become actionable, keyed by survey date.
#[derive(Debug, Default)]
pub struct DetectionLedger {
    pending: BTreeMap<Date, Vec<DetectionRecord>>,
}

impl DetectionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: DetectionRecord) {
        self.pending
            .entry(record.detection_date)
            .or_default()
            .push(record);
    }

    /// Remove and return every record made on `date`, in arrival order.
    pub fn pop(&mut self, date: Date) -> Vec<DetectionRecord> {
        self.pending.remove(&date).unwrap_or_default()
    }

    pub fn pending(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn negative_and_nan_rates_are_rejected() {
        let day = date!(2024 - 01 - 01);

        assert!(matches!(
            DetectionRecord::new("s1", -0.1, day, "aerial"),
            Err(AppError::InvalidRate { .. })
        ));
        assert!(DetectionRecord::new("s1", f64::NAN, day, "aerial").is_err());
        assert!(DetectionRecord::new("s1", 0.0, day, "aerial").is_ok());
    }

    #[test]
    fn pop_returns_records_for_one_date_only() -> Result<(), AppError> {
        let mut ledger = DetectionLedger::new();
        ledger.record(DetectionRecord::new("s1", 1.0, date!(2024 - 01 - 01), "m")?);
        ledger.record(DetectionRecord::new("s2", 2.0, date!(2024 - 01 - 01), "m")?);
        ledger.record(DetectionRecord::new("s3", 3.0, date!(2024 - 01 - 02), "m")?);

        let first = ledger.pop(date!(2024 - 01 - 01));

        assert_eq!(
            first
                .iter()
                .map(DetectionRecord::site_id)
                .collect::<Vec<_>>(),
            vec!["s1", "s2"]
        );
        assert!(ledger.pop(date!(2024 - 01 - 01)).is_empty());
        assert_eq!(ledger.pending(), 1);
        Ok(())
    }
}
