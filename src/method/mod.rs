use crate::config::MethodSettings;
use crate::detection::{DetectionLedger, DetectionRecord};
use crate::error::AppError;
use crate::planner::{RedundancyFilter, SurveyPlanner};
use crate::rng::SimRng;
use crate::schedule::{FollowUpSchedule, TaggingFlaggingStats};
use crate::sensor::{Sensor, SensorError, create_sensor};
use crate::site::{Site, SiteId, Sites};
use std::collections::HashSet;
use thiserror::Error;
use time::{Date, Duration};
use tracing::{debug, info, warn};

pub mod candidates;

use candidates::CandidateSet;

pub const THRESHOLD_INTERACTION_PRIORITY: &str = "threshold";
pub const PROPORTION_INTERACTION_PRIORITY: &str = "proportion";
pub const MOBILE_DEPLOYMENT: &str = "mobile";
pub const STATIONARY_DEPLOYMENT: &str = "stationary";

const DAYS_PER_YEAR: u32 = 365;

#[derive(Debug, Error, PartialEq)]
pub enum MethodError {
    #[error("invalid interaction_priority of {priority} set for method: {method}")]
    InvalidInteractionPriority { priority: String, method: String },
    #[error("unknown deployment type {deployment} for method: {method}")]
    UnknownDeploymentType { deployment: String, method: String },
    #[error("unknown redundancy filter {filter} for method: {method}")]
    UnknownRedundancyFilter { filter: String, method: String },
    #[error("stationary method {0} requires a rolling_average section")]
    MissingRollingAverage(String),
    #[error("rolling average windows must hold at least one day for method: {0}")]
    ZeroWindow(String),
    #[error("proportion {proportion} outside [0, 1] for method: {method}")]
    InvalidProportion { proportion: f64, method: String },
    #[error("sensor for method {method}: {source}")]
    Sensor {
        method: String,
        #[source]
        source: SensorError,
    },
}

/// How the proportion rule counts the detections it trims against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionPriority {
    /// Proportion of the qualifying candidates.
    ThresholdFirst,
    /// Proportion of every non-zero detection, qualifying or not.
    ProportionFirst,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RollingAverageThresholds {
    pub small_window: usize,
    pub large_window: usize,
    pub small_window_threshold: f64,
    pub large_window_threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Deployment {
    Mobile {
        threshold: f64,
        redundancy_filter: RedundancyFilter,
    },
    Stationary(RollingAverageThresholds),
}

/// Where a site stands relative to one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteState {
    Untracked,
    Candidate,
    Queued,
}

/// Screening method turning sensor detections into follow-up commitments.
///
/// Candidates are batched for `delay` days, trimmed by the proportion rule
/// and then flushed into the shared schedule.
#[derive(Debug)]
pub struct SiteLevelMethod {
    name: String,
    deployment: Deployment,
    priority: InteractionPriority,
    delay: i64,
    proportion: f64,
    instant_threshold: f64,
    reporting_delay: i64,
    surveys_per_year: Option<u32>,
    sensor: Box<dyn Sensor>,
    detections: DetectionLedger,
    candidates: CandidateSet,
    known_sites: HashSet<SiteId>,
    first_candidate_date: Option<Date>,
    detection_count: usize,
    warned_missing_frequency: HashSet<SiteId>,
}

impl SiteLevelMethod {
    /// Build a method from its settings, registering every site it may see.
    ///
    /// Unknown priorities, deployment types, filters or sensors fail here so a
    /// misconfigured method never reaches the simulation loop.
    pub fn new(settings: &MethodSettings, sites: &Sites) -> Result<Self, MethodError> {
        let sensor = create_sensor(&settings.sensor).map_err(|source| MethodError::Sensor {
            method: settings.name.clone(),
            source,
        })?;
        Self::with_sensor(settings, sites, sensor)
    }

    /// Like `new`, with an already built sensor.
    pub fn with_sensor(
        settings: &MethodSettings,
        sites: &Sites,
        sensor: Box<dyn Sensor>,
    ) -> Result<Self, MethodError> {
        let name = settings.name.clone();
        let follow_up = &settings.follow_up;

        let priority = match follow_up.interaction_priority.as_str() {
            THRESHOLD_INTERACTION_PRIORITY => InteractionPriority::ThresholdFirst,
            PROPORTION_INTERACTION_PRIORITY => InteractionPriority::ProportionFirst,
            other => {
                return Err(MethodError::InvalidInteractionPriority {
                    priority: other.to_owned(),
                    method: name,
                });
            }
        };

        if !(0.0..=1.0).contains(&follow_up.proportion) {
            return Err(MethodError::InvalidProportion {
                proportion: follow_up.proportion,
                method: name,
            });
        }

        let deployment = match settings.deployment_type.as_str() {
            MOBILE_DEPLOYMENT => {
                let filter = &follow_up.redundancy_filter;
                let Some(redundancy_filter) = RedundancyFilter::from_name(filter) else {
                    return Err(MethodError::UnknownRedundancyFilter {
                        filter: filter.clone(),
                        method: name,
                    });
                };
                Deployment::Mobile {
                    threshold: follow_up.threshold,
                    redundancy_filter,
                }
            }
            STATIONARY_DEPLOYMENT => {
                let Some(rolling) = settings.rolling_average.as_ref() else {
                    return Err(MethodError::MissingRollingAverage(name));
                };
                if rolling.small_window == 0 || rolling.large_window == 0 {
                    return Err(MethodError::ZeroWindow(name));
                }
                Deployment::Stationary(RollingAverageThresholds {
                    small_window: rolling.small_window,
                    large_window: rolling.large_window,
                    small_window_threshold: rolling.small_window_threshold,
                    large_window_threshold: rolling.large_window_threshold,
                })
            }
            other => {
                return Err(MethodError::UnknownDeploymentType {
                    deployment: other.to_owned(),
                    method: name,
                });
            }
        };

        debug!(
            method = %name,
            deployment = settings.deployment_type.as_str(),
            sensor = sensor.kind(),
            "Configured screening method"
        );
        Ok(Self {
            name,
            deployment,
            priority,
            delay: i64::from(follow_up.delay),
            proportion: follow_up.proportion,
            instant_threshold: follow_up.instant_threshold.unwrap_or(f64::INFINITY),
            reporting_delay: i64::from(settings.reporting_delay),
            surveys_per_year: settings.surveys_per_year,
            sensor,
            detections: DetectionLedger::new(),
            candidates: CandidateSet::new(),
            known_sites: sites.ids().map(str::to_owned).collect(),
            first_candidate_date: None,
            detection_count: 0,
            warned_missing_frequency: HashSet::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_stationary(&self) -> bool {
        matches!(self.deployment, Deployment::Stationary(_))
    }

    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    pub fn detection_count(&self) -> usize {
        self.detection_count
    }

    pub fn first_candidate_date(&self) -> Option<Date> {
        self.first_candidate_date
    }

    pub fn pending_detections(&self) -> usize {
        self.detections.pending()
    }

    /// Current state of a site for this method.
    pub fn site_state(
        &self,
        site_id: &str,
        schedule: &FollowUpSchedule,
    ) -> Result<SiteState, AppError> {
        if !self.known_sites.contains(site_id) {
            return Err(AppError::UnknownSite(site_id.to_owned()));
        }
        if self.candidates.contains(site_id) {
            Ok(SiteState::Candidate)
        } else if schedule.is_queued(site_id) {
            Ok(SiteState::Queued)
        } else {
            Ok(SiteState::Untracked)
        }
    }

    /// Queue a detection to be acted on `reporting_delay` days after it was made.
    pub fn record_detection(&mut self, record: DetectionRecord) {
        self.detections.record(record);
    }

    /// Survey every site due today and record what the sensor reports.
    pub fn screen(
        &mut self,
        date: Date,
        start_date: Date,
        sites: &Sites,
        rng: &mut SimRng,
    ) -> Result<usize, AppError> {
        let mut recorded = 0;
        for (position, site) in sites.iter().enumerate() {
            if !self.is_due(site, position, date, start_date) {
                continue;
            }
            if let Some(record) = self.survey_site(site, date, rng)? {
                self.record_detection(record);
                recorded += 1;
            }
        }
        Ok(recorded)
    }

    /// Run the sensor over one site.
    ///
    /// Stationary monitors report every day, zeros included; mobile surveys
    /// only report detections.
    pub fn survey_site(
        &mut self,
        site: &Site,
        date: Date,
        rng: &mut SimRng,
    ) -> Result<Option<DetectionRecord>, AppError> {
        let rate = site.emission_rate();
        let measured = if self.sensor.detect(rate, rng) {
            self.sensor.measure(rate, rng)
        } else if self.is_stationary() {
            0.0
        } else {
            return Ok(None);
        };
        DetectionRecord::new(site.id(), measured, date, self.name.as_str()).map(Some)
    }

    fn is_due(&mut self, site: &Site, position: usize, date: Date, start_date: Date) -> bool {
        if self.is_stationary() {
            return true;
        }
        let Some(per_year) = site.survey_frequency(&self.name).or(self.surveys_per_year) else {
            if self.warned_missing_frequency.insert(site.id().to_owned()) {
                warn!(
                    method = %self.name,
                    site_id = site.id(),
                    "No survey frequency was provided for method at site"
                );
            }
            return false;
        };
        if per_year == 0 {
            return false;
        }
        let interval = i64::from((DAYS_PER_YEAR / per_year).max(1));
        let elapsed = (date - start_date).whole_days();
        elapsed >= 0 && (elapsed + position as i64) % interval == 0
    }

    /// Act on the detections that became actionable today.
    pub fn update(
        &mut self,
        current_date: Date,
        sites: &Sites,
        schedule: &mut FollowUpSchedule,
    ) -> Result<TaggingFlaggingStats, AppError> {
        let date_to_check = current_date.saturating_sub(Duration::days(self.reporting_delay));
        for record in self.detections.pop(date_to_check) {
            let site = sites
                .get(record.site_id())
                .ok_or_else(|| AppError::UnknownSite(record.site_id().to_owned()))?;
            if !site.untagged_since(date_to_check) {
                debug!(
                    method = record.method(),
                    site_id = record.site_id(),
                    "Discarding detection superseded by a tagging survey"
                );
                continue;
            }
            if self.is_stationary() {
                self.update_stationary(date_to_check, &record, schedule)?;
            } else {
                self.update_mobile(date_to_check, &record, schedule)?;
            }
        }

        Ok(TaggingFlaggingStats {
            sites_flagged: self.update_candidates_for_flags(current_date, schedule),
        })
    }

    fn update_mobile(
        &mut self,
        date_to_check: Date,
        record: &DetectionRecord,
        schedule: &mut FollowUpSchedule,
    ) -> Result<(), AppError> {
        let Deployment::Mobile {
            threshold,
            redundancy_filter,
        } = self.deployment
        else {
            return Ok(());
        };
        let site_id = record.site_id();
        let rate = record.rate_detected();

        match self.site_state(site_id, schedule)? {
            SiteState::Candidate => {
                let mut plan = self.take_candidate(site_id)?;
                plan.update_with_latest_survey(record, redundancy_filter, date_to_check);
                if plan.rate_at_site() >= self.instant_threshold {
                    debug!(
                        method = %self.name,
                        site_id,
                        rate = plan.rate_at_site(),
                        "Candidate passed instant threshold"
                    );
                    schedule.add_previous_queued_to_survey_queue(plan);
                } else if plan.rate_at_site() >= threshold {
                    self.candidates.insert(plan);
                } else {
                    debug!(
                        method = %self.name,
                        site_id,
                        rate = plan.rate_at_site(),
                        "Candidate fell below threshold"
                    );
                }
            }
            SiteState::Queued => {
                let refreshed =
                    self.refresh_queued(record, redundancy_filter, date_to_check, schedule)?;
                if refreshed >= self.instant_threshold {
                    schedule.promote_to_front(site_id);
                } else if refreshed < threshold {
                    debug!(
                        method = %self.name,
                        site_id,
                        rate = refreshed,
                        "Queued site fell below threshold"
                    );
                    schedule.remove_from_survey_queue(site_id);
                }
            }
            SiteState::Untracked => {
                if rate >= self.instant_threshold {
                    debug!(
                        method = %self.name,
                        site_id,
                        rate,
                        "Detection passed instant threshold"
                    );
                    let plan = SurveyPlanner::new(record, date_to_check);
                    schedule.add_previous_queued_to_survey_queue(plan);
                } else if rate > 0.0 && rate >= threshold {
                    self.detection_count += 1;
                    self.candidates.insert(SurveyPlanner::new(record, date_to_check));
                } else if rate > 0.0 {
                    self.detection_count += 1;
                }
            }
        }
        Ok(())
    }

    fn update_stationary(
        &mut self,
        date_to_check: Date,
        record: &DetectionRecord,
        schedule: &mut FollowUpSchedule,
    ) -> Result<(), AppError> {
        let Deployment::Stationary(rolling) = &self.deployment else {
            return Ok(());
        };
        let (small_window, large_window) = (rolling.small_window, rolling.large_window);
        let site_id = record.site_id();
        let filter = RedundancyFilter::RollingAverage;

        match self.site_state(site_id, schedule)? {
            SiteState::Candidate => {
                let mut plan = self.take_candidate(site_id)?;
                plan.update_with_latest_survey(record, filter, date_to_check);
                if plan.rate_at_site() >= self.instant_threshold {
                    schedule.add_previous_queued_to_survey_queue(plan);
                } else {
                    self.candidates.insert(plan);
                }
            }
            SiteState::Queued => {
                let refreshed = self.refresh_queued(record, filter, date_to_check, schedule)?;
                if refreshed >= self.instant_threshold {
                    schedule.promote_to_front(site_id);
                }
            }
            SiteState::Untracked => {
                let plan =
                    SurveyPlanner::stationary(record, date_to_check, small_window, large_window);
                if record.rate_detected() >= self.instant_threshold {
                    schedule.add_previous_queued_to_survey_queue(plan);
                } else {
                    if record.rate_detected() > 0.0 {
                        self.detection_count += 1;
                    }
                    self.candidates.insert(plan);
                }
            }
        }
        Ok(())
    }

    fn take_candidate(&mut self, site_id: &str) -> Result<SurveyPlanner, AppError> {
        self.candidates
            .remove(site_id)
            .ok_or_else(|| AppError::UnknownSite(site_id.to_owned()))
    }

    fn refresh_queued(
        &self,
        record: &DetectionRecord,
        filter: RedundancyFilter,
        date_to_check: Date,
        schedule: &mut FollowUpSchedule,
    ) -> Result<f64, AppError> {
        let plan = schedule
            .get_plan_from_queue_mut(record.site_id())
            .ok_or_else(|| AppError::UnknownSite(record.site_id().to_owned()))?;
        plan.update_with_latest_survey(record, filter, date_to_check);
        Ok(plan.rate_at_site())
    }

    /// Commit the current candidate batch once its delay window has elapsed.
    ///
    /// Returns the number of sites added to the follow-up schedule.
    pub fn update_candidates_for_flags(
        &mut self,
        current_date: Date,
        schedule: &mut FollowUpSchedule,
    ) -> u32 {
        let opened = match self.first_candidate_date {
            Some(opened) => opened,
            None if self.candidates.is_empty() => return 0,
            None => {
                self.first_candidate_date = Some(current_date);
                current_date
            }
        };
        if (current_date - opened).whole_days() < self.delay {
            return 0;
        }

        let rejected = self.filter_candidates_by_proportion();
        let batch = self.take_candidates();

        let mut carried = 0;
        if let Deployment::Stationary(rolling) = &self.deployment {
            for plan in rejected {
                if passes_rolling_check(&plan, rolling) {
                    self.candidates.insert(plan);
                    carried += 1;
                }
            }
        }
        // carried candidates belong to the next batch
        self.detection_count = carried;

        let mut n_flags = 0;
        for plan in batch {
            if let Deployment::Stationary(rolling) = &self.deployment {
                if !passes_rolling_check(&plan, rolling) {
                    debug!(
                        method = %self.name,
                        site_id = plan.site_id(),
                        "Candidate failed both rolling checks"
                    );
                    continue;
                }
            }
            schedule.add_to_survey_queue(plan);
            n_flags += 1;
        }

        info!(
            method = %self.name,
            date = %current_date,
            flagged = n_flags,
            carried,
            "Committed follow-up candidates"
        );
        n_flags
    }

    /// Trim the candidates to the proportion kept, returning the rejected ones.
    fn filter_candidates_by_proportion(&mut self) -> Vec<SurveyPlanner> {
        let total_candidates = self.candidates.len();
        let candidates_to_keep = match self.priority {
            InteractionPriority::ThresholdFirst => {
                ceil_proportion(total_candidates, self.proportion)
            }
            InteractionPriority::ProportionFirst => {
                ceil_proportion(self.detection_count, self.proportion)
            }
        }
        .min(total_candidates);
        self.candidates.truncate(candidates_to_keep)
    }

    /// Take the whole batch and close the window.
    fn take_candidates(&mut self) -> Vec<SurveyPlanner> {
        self.detection_count = 0;
        self.first_candidate_date = None;
        self.candidates.drain()
    }
}

fn passes_rolling_check(plan: &SurveyPlanner, rolling: &RollingAverageThresholds) -> bool {
    plan.should_follow_up(rolling.small_window_threshold)
        || plan.should_follow_up_long(rolling.large_window_threshold)
}

fn ceil_proportion(count: usize, proportion: f64) -> usize {
    (count as f64 * proportion).ceil() as usize
}
