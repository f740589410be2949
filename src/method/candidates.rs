use crate::planner::SurveyPlanner;
use crate::site::SiteId;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Sort key: descending rate, then insertion order for equal rates.
#[derive(Debug, Clone, Copy)]
struct RateKey {
    rate: f64,
    seq: u64,
}

impl Ord for RateKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .rate
            .total_cmp(&self.rate)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for RateKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RateKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RateKey {}

/// Survey planners ordered by descending `rate_at_site`, indexed by site id.
///
/// Holds at most one planner per site. Re-inserting a site moves it behind
/// every other candidate with the same rate.
#[derive(Debug, Default)]
pub struct CandidateSet {
    ordered: BTreeMap<RateKey, SurveyPlanner>,
    index: HashMap<SiteId, RateKey>,
    next_seq: u64,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a planner, returning the one it replaced for the same site.
    pub fn insert(&mut self, plan: SurveyPlanner) -> Option<SurveyPlanner> {
        let replaced = self.remove(plan.site_id());
        let key = RateKey {
            rate: plan.rate_at_site(),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.index.insert(plan.site_id().to_owned(), key);
        self.ordered.insert(key, plan);
        replaced
    }

    pub fn remove(&mut self, site_id: &str) -> Option<SurveyPlanner> {
        let key = self.index.remove(site_id)?;
        self.ordered.remove(&key)
    }

    pub fn contains(&self, site_id: &str) -> bool {
        self.index.contains_key(site_id)
    }

    pub fn get(&self, site_id: &str) -> Option<&SurveyPlanner> {
        self.index
            .get(site_id)
            .and_then(|key| self.ordered.get(key))
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Planners from highest to lowest rate.
    pub fn iter(&self) -> impl Iterator<Item = &SurveyPlanner> {
        self.ordered.values()
    }

    /// Keep the `keep` highest-rate planners and return the rest in order.
    pub fn truncate(&mut self, keep: usize) -> Vec<SurveyPlanner> {
        let Some(split) = self.ordered.keys().nth(keep).copied() else {
            return Vec::new();
        };
        let rejected = self.ordered.split_off(&split);
        rejected
            .into_values()
            .inspect(|plan| {
                self.index.remove(plan.site_id());
            })
            .collect()
    }

    /// Empty the set, returning every planner from highest to lowest rate.
    pub fn drain(&mut self) -> Vec<SurveyPlanner> {
        self.index.clear();
        std::mem::take(&mut self.ordered).into_values().collect()
    }
}
