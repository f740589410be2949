use crate::detection::DetectionRecord;
use crate::site::SiteId;
use std::collections::VecDeque;
use time::Date;

/// How repeated measurements at a site collapse into one representative rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedundancyFilter {
    /// Latest measurement wins.
    Recent,
    /// Highest measurement seen while tracked.
    Max,
    /// Mean of every measurement seen while tracked.
    Average,
    /// Mean of the small rolling window (stationary monitors).
    RollingAverage,
}

impl RedundancyFilter {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "recent" => Some(Self::Recent),
            "max" => Some(Self::Max),
            "average" => Some(Self::Average),
            "rolling_average" => Some(Self::RollingAverage),
            _ => None,
        }
    }
}

/// Fixed-capacity window of the most recent measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingWindow {
    capacity: usize,
    samples: VecDeque<f64>,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: f64) {
        self.samples.push_back(sample);
        if self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Mean of the retained samples. A window of equal samples averages to
    /// exactly that sample.
    pub fn average(&self) -> f64 {
        self.samples
            .iter()
            .zip(1u32..)
            .fold(0.0, |mean, (sample, count)| {
                mean + (sample - mean) / f64::from(count)
            })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RollingWindows {
    pub small: RollingWindow,
    pub large: RollingWindow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurveyPlanner {
    site_id: SiteId,
    rate_at_site: f64,
    detected_rates: Vec<f64>,
    detection_dates: Vec<Date>,
    first_queued_date: Date,
    windows: Option<RollingWindows>,
}

impl SurveyPlanner {
    /// Planner for a mobile method, seeded from its first detection.
    pub fn new(record: &DetectionRecord, date: Date) -> Self {
        Self {
            site_id: record.site_id().to_owned(),
            rate_at_site: record.rate_detected(),
            detected_rates: vec![record.rate_detected()],
            detection_dates: vec![date],
            first_queued_date: date,
            windows: None,
        }
    }

    /// Planner for a stationary method; the rate is the small-window average.
    pub fn stationary(
        record: &DetectionRecord,
        date: Date,
        small_window: usize,
        large_window: usize,
    ) -> Self {
        let mut windows = RollingWindows {
            small: RollingWindow::new(small_window),
            large: RollingWindow::new(large_window),
        };
        windows.small.push(record.rate_detected());
        windows.large.push(record.rate_detected());
        Self {
            rate_at_site: windows.small.average(),
            windows: Some(windows),
            ..Self::new(record, date)
        }
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn rate_at_site(&self) -> f64 {
        self.rate_at_site
    }

    pub fn first_queued_date(&self) -> Date {
        self.first_queued_date
    }

    pub fn detection_dates(&self) -> &[Date] {
        &self.detection_dates
    }

    /// Fold a new detection into the planner and refresh `rate_at_site`.
    ///
    /// A rolling-average filter on a planner without windows falls back to
    /// the plain average.
    pub fn update_with_latest_survey(
        &mut self,
        record: &DetectionRecord,
        filter: RedundancyFilter,
        date: Date,
    ) {
        let rate = record.rate_detected();
        self.detected_rates.push(rate);
        self.detection_dates.push(date);
        if let Some(windows) = self.windows.as_mut() {
            windows.small.push(rate);
            windows.large.push(rate);
        }

        self.rate_at_site = match (filter, self.windows.as_ref()) {
            (RedundancyFilter::Recent, _) => rate,
            (RedundancyFilter::Max, _) => self.rate_at_site.max(rate),
            (RedundancyFilter::RollingAverage, Some(windows)) => windows.small.average(),
            (RedundancyFilter::Average | RedundancyFilter::RollingAverage, _) => {
                self.detected_rates.iter().sum::<f64>() / self.detected_rates.len() as f64
            }
        };
    }

    /// Short-window check. Planners without windows compare `rate_at_site`.
    pub fn should_follow_up(&self, threshold: f64) -> bool {
        match &self.windows {
            Some(windows) => windows.small.average() >= threshold,
            None => self.rate_at_site >= threshold,
        }
    }

    /// Long-window check. Planners without windows compare `rate_at_site`.
    pub fn should_follow_up_long(&self, threshold: f64) -> bool {
        match &self.windows {
            Some(windows) => windows.large.average() >= threshold,
            None => self.rate_at_site >= threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use time::macros::date;

    fn record(rate: f64) -> Result<DetectionRecord, AppError> {
        DetectionRecord::new("site-1", rate, date!(2024 - 05 - 01), "m")
    }

    #[test]
    fn rolling_window_drops_oldest_sample() {
        let mut window = RollingWindow::new(2);
        window.push(1.0);
        window.push(3.0);
        window.push(5.0);

        assert_eq!(window.len(), 2);
        assert_eq!(window.average(), 4.0);
    }

    #[test]
    fn zero_capacity_window_holds_one_sample() {
        let mut window = RollingWindow::new(0);
        window.push(2.0);
        window.push(6.0);

        assert_eq!(window.capacity(), 1);
        assert_eq!(window.average(), 6.0);
    }

    #[test]
    fn redundancy_filters_refresh_rate() -> Result<(), AppError> {
        let day = date!(2024 - 05 - 02);
        let cases = [
            (RedundancyFilter::Recent, 2.0),
            (RedundancyFilter::Max, 8.0),
            (RedundancyFilter::Average, 5.0),
            (RedundancyFilter::RollingAverage, 5.0),
        ];
        for (filter, expected) in cases {
            let mut plan = SurveyPlanner::new(&record(8.0)?, day);
            plan.update_with_latest_survey(&record(2.0)?, filter, day);
            assert_eq!(plan.rate_at_site(), expected, "{filter:?}");
        }
        Ok(())
    }

    #[test]
    fn stationary_rate_tracks_small_window() -> Result<(), AppError> {
        let day = date!(2024 - 05 - 01);
        let mut plan = SurveyPlanner::stationary(&record(10.0)?, day, 2, 4);
        for rate in [0.0, 2.0, 4.0] {
            plan.update_with_latest_survey(&record(rate)?, RedundancyFilter::RollingAverage, day);
        }

        assert_eq!(plan.rate_at_site(), 3.0);
        assert!(plan.should_follow_up(3.0));
        assert!(!plan.should_follow_up(3.5));
        // large window holds 10, 0, 2, 4
        assert!(plan.should_follow_up_long(4.0));
        assert!(!plan.should_follow_up_long(4.5));
        Ok(())
    }

    #[test]
    fn window_of_equal_samples_meets_its_own_threshold() -> Result<(), AppError> {
        let day = date!(2024 - 05 - 01);
        for level in [0.1, 0.7, 1.3] {
            let mut plan = SurveyPlanner::stationary(&record(level * 7.0)?, day, 3, 3);
            for _ in 0..3 {
                let next = record(level)?;
                plan.update_with_latest_survey(&next, RedundancyFilter::RollingAverage, day);
            }

            assert_eq!(plan.rate_at_site(), level);
            assert!(plan.should_follow_up(level), "small window at {level}");
            assert!(plan.should_follow_up_long(level), "large window at {level}");
        }
        Ok(())
    }

    #[test]
    fn long_run_leaves_no_residue_from_evicted_samples() {
        let mut window = RollingWindow::new(4);
        for day in 0..365 {
            window.push(f64::from(day % 17) * 0.37);
        }
        for _ in 0..4 {
            window.push(0.3);
        }

        assert_eq!(window.average(), 0.3);
    }

    #[test]
    fn filter_names_resolve() {
        assert_eq!(
            RedundancyFilter::from_name("rolling_average"),
            Some(RedundancyFilter::RollingAverage)
        );
        assert_eq!(RedundancyFilter::from_name("median"), None);
    }
}
