use crate::planner::SurveyPlanner;
use crate::site::SiteId;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// Per-day outcome of a method update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaggingFlaggingStats {
    pub sites_flagged: u32,
}

/// Ordered queue of sites committed to a follow-up visit.
///
/// A site appears at most once; re-adding a queued site replaces its plan.
#[derive(Debug, Default)]
pub struct FollowUpSchedule {
    queue: VecDeque<SiteId>,
    plans: HashMap<SiteId, SurveyPlanner>,
}

impl FollowUpSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a site, or refresh the plan of an already queued site in place.
    pub fn add_to_survey_queue(&mut self, plan: SurveyPlanner) {
        if !self.plans.contains_key(plan.site_id()) {
            self.queue.push_back(plan.site_id().to_owned());
        }
        self.plans.insert(plan.site_id().to_owned(), plan);
    }

    /// Put a site at the head of the queue, moving it if already queued.
    pub fn add_previous_queued_to_survey_queue(&mut self, plan: SurveyPlanner) {
        self.detach(plan.site_id());
        self.queue.push_front(plan.site_id().to_owned());
        self.plans.insert(plan.site_id().to_owned(), plan);
    }

    /// Move an already queued site to the head. Returns false if not queued.
    pub fn promote_to_front(&mut self, site_id: &str) -> bool {
        if !self.plans.contains_key(site_id) {
            return false;
        }
        self.detach(site_id);
        self.queue.push_front(site_id.to_owned());
        true
    }

    pub fn get_plan_from_queue(&self, site_id: &str) -> Option<&SurveyPlanner> {
        self.plans.get(site_id)
    }

    pub fn get_plan_from_queue_mut(&mut self, site_id: &str) -> Option<&mut SurveyPlanner> {
        self.plans.get_mut(site_id)
    }

    pub fn remove_from_survey_queue(&mut self, site_id: &str) -> Option<SurveyPlanner> {
        let plan = self.plans.remove(site_id)?;
        self.detach(site_id);
        Some(plan)
    }

    /// Queued site ids in visiting order.
    pub fn get_site_id_queue_list(&self) -> Vec<&str> {
        self.queue.iter().map(String::as_str).collect()
    }

    pub fn is_queued(&self, site_id: &str) -> bool {
        self.plans.contains_key(site_id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Pop up to `capacity` plans from the head for today's crew visits.
    pub fn dispatch(&mut self, capacity: usize) -> Vec<SurveyPlanner> {
        let mut visits = Vec::with_capacity(capacity.min(self.queue.len()));
        while visits.len() < capacity {
            let Some(site_id) = self.queue.pop_front() else {
                break;
            };
            if let Some(plan) = self.plans.remove(&site_id) {
                visits.push(plan);
            }
        }
        visits
    }

    fn detach(&mut self, site_id: &str) {
        if let Some(position) = self.queue.iter().position(|queued| queued == site_id) {
            self.queue.remove(position);
        }
    }
}
