use crate::config::SiteSettings;
use std::collections::{BTreeMap, HashMap};
use time::Date;

pub type SiteId = String;

#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    id: SiteId,
    /// Current emission rate in g/s.
    emission_rate: f64,
    latest_tagging_survey_date: Option<Date>,
    /// Required surveys per year, keyed by method name.
    survey_frequency: BTreeMap<String, u32>,
}

impl Site {
    pub fn new(id: impl Into<SiteId>, emission_rate: f64) -> Self {
        Self {
            id: id.into(),
            emission_rate: emission_rate.max(0.0),
            latest_tagging_survey_date: None,
            survey_frequency: BTreeMap::new(),
        }
    }

    pub fn with_survey_frequency(mut self, method: impl Into<String>, per_year: u32) -> Self {
        self.survey_frequency.insert(method.into(), per_year);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn emission_rate(&self) -> f64 {
        self.emission_rate
    }

    pub fn is_emitting(&self) -> bool {
        self.emission_rate > 0.0
    }

    pub fn survey_frequency(&self, method: &str) -> Option<u32> {
        self.survey_frequency.get(method).copied()
    }

    pub fn latest_tagging_survey_date(&self) -> Option<Date> {
        self.latest_tagging_survey_date
    }

    /// True when no tagging-capable survey happened after `date`.
    pub fn untagged_since(&self, date: Date) -> bool {
        self.latest_tagging_survey_date.is_none_or(|tagged| tagged <= date)
    }

    pub fn record_tagging_survey(&mut self, date: Date) {
        self.latest_tagging_survey_date = Some(date);
    }

    pub fn repair(&mut self) {
        self.emission_rate = 0.0;
    }
}

impl From<&SiteSettings> for Site {
    fn from(settings: &SiteSettings) -> Self {
        let mut site = Site::new(settings.id.clone(), settings.emission_rate);
        site.survey_frequency = settings
            .survey_frequency
            .iter()
            .map(|(method, per_year)| (method.clone(), *per_year))
            .collect();
        site
    }
}

/// Ordered site registry with lookup by id.
#[derive(Debug, Clone, Default)]
pub struct Sites {
    sites: Vec<Site>,
    index: HashMap<SiteId, usize>,
}

impl Sites {
    pub fn new(sites: Vec<Site>) -> Self {
        let index = sites
            .iter()
            .enumerate()
            .map(|(position, site)| (site.id.clone(), position))
            .collect();
        Self { sites, index }
    }

    pub fn get(&self, site_id: &str) -> Option<&Site> {
        self.index
            .get(site_id)
            .map(|&position| &self.sites[position])
    }

    pub fn get_mut(&mut self, site_id: &str) -> Option<&mut Site> {
        self.index
            .get(site_id)
            .map(|&position| &mut self.sites[position])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Site> {
        self.sites.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sites.iter().map(Site::id)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Total emission rate across all sites, in g/s.
    pub fn total_emission_rate(&self) -> f64 {
        self.sites.iter().map(Site::emission_rate).sum()
    }
}

impl FromIterator<Site> for Sites {
    fn from_iter<I: IntoIterator<Item = Site>>(iter: I) -> Self {
        Sites::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn never_tagged_site_is_untagged_since_any_date() {
        let site = Site::new("site-1", 1.0);

        assert!(site.untagged_since(date!(2024 - 01 - 01)));
    }

    #[test]
    fn tagging_on_the_check_date_still_counts_as_untagged() {
        let mut site = Site::new("site-1", 1.0);
        site.record_tagging_survey(date!(2024 - 03 - 10));

        assert!(site.untagged_since(date!(2024 - 03 - 10)));
        assert!(!site.untagged_since(date!(2024 - 03 - 09)));
    }

    #[test]
    fn registry_preserves_order_and_lookup() {
        let sites: Sites = vec![Site::new("b", 2.0), Site::new("a", 0.5)]
            .into_iter()
            .collect();

        assert_eq!(sites.ids().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(sites.get("b").map(Site::emission_rate), Some(2.0));
        assert!(sites.get("c").is_none());
        assert_eq!(sites.total_emission_rate(), 2.5);
    }

    #[test]
    fn repair_stops_emissions() {
        let mut site = Site::new("site-1", 3.0);
        site.repair();

        assert!(!site.is_emitting());
    }
}
