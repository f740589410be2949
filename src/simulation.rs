use crate::config::{Config, ProgramSettings};
use crate::error::AppError;
use crate::method::SiteLevelMethod;
use crate::rng::SimRng;
use crate::schedule::FollowUpSchedule;
use crate::site::{Site, Sites};
use serde::Serialize;
use time::Date;
use tracing::{debug, info};

const SECONDS_PER_DAY: f64 = 86_400.0;
const GRAMS_PER_KG: f64 = 1_000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramSummary {
    pub program: String,
    pub sites_flagged: u64,
    pub follow_up_surveys: u64,
    pub repairs: u64,
    pub total_emissions_kg: f64,
    pub queue_length_at_end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramComparison {
    pub program: String,
    pub emissions_reduction_kg: f64,
    /// `None` when the baseline emitted nothing.
    pub emissions_reduction_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub start_date: String,
    pub end_date: String,
    pub seed: u64,
    pub baseline: Option<String>,
    pub programs: Vec<ProgramSummary>,
    pub comparisons: Vec<ProgramComparison>,
}

/// One program's methods, its shared follow-up schedule and its sites.
#[derive(Debug)]
pub struct ProgramRun {
    name: String,
    methods: Vec<SiteLevelMethod>,
    schedule: FollowUpSchedule,
    follow_up_daily_capacity: usize,
    sites: Sites,
    rng: SimRng,
    start_date: Date,
    summary: ProgramSummary,
}

impl ProgramRun {
    /// Build every method up front so configuration errors surface before day one.
    pub fn new(
        settings: &ProgramSettings,
        sites: Sites,
        start_date: Date,
        seed: u64,
    ) -> Result<Self, AppError> {
        let methods = settings
            .methods
            .iter()
            .map(|method| SiteLevelMethod::new(method, &sites))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::with_methods(
            settings.name.clone(),
            methods,
            settings.follow_up_daily_capacity(),
            sites,
            start_date,
            seed,
        ))
    }

    pub fn with_methods(
        name: String,
        methods: Vec<SiteLevelMethod>,
        follow_up_daily_capacity: usize,
        sites: Sites,
        start_date: Date,
        seed: u64,
    ) -> Self {
        Self {
            summary: ProgramSummary {
                program: name.clone(),
                sites_flagged: 0,
                follow_up_surveys: 0,
                repairs: 0,
                total_emissions_kg: 0.0,
                queue_length_at_end: 0,
            },
            name,
            methods,
            schedule: FollowUpSchedule::new(),
            follow_up_daily_capacity,
            sites,
            rng: SimRng::from_seed_u64(seed),
            start_date,
        }
    }

    pub fn sites(&self) -> &Sites {
        &self.sites
    }

    pub fn schedule(&self) -> &FollowUpSchedule {
        &self.schedule
    }

    pub fn methods(&self) -> &[SiteLevelMethod] {
        &self.methods
    }

    /// Advance one simulated day.
    pub fn step(&mut self, date: Date) -> Result<(), AppError> {
        for method in &mut self.methods {
            method.screen(date, self.start_date, &self.sites, &mut self.rng)?;
        }

        for method in &mut self.methods {
            let stats = method.update(date, &self.sites, &mut self.schedule)?;
            self.summary.sites_flagged += u64::from(stats.sites_flagged);
        }

        for plan in self.schedule.dispatch(self.follow_up_daily_capacity) {
            let Some(site) = self.sites.get_mut(plan.site_id()) else {
                return Err(AppError::UnknownSite(plan.site_id().to_owned()));
            };
            site.record_tagging_survey(date);
            self.summary.follow_up_surveys += 1;
            if site.is_emitting() {
                debug!(
                    program = %self.name,
                    site_id = site.id(),
                    rate = site.emission_rate(),
                    queued_since = %plan.first_queued_date(),
                    detections = plan.detection_dates().len(),
                    "Follow-up survey tagged emission"
                );
                site.repair();
                self.summary.repairs += 1;
            }
        }

        self.summary.total_emissions_kg +=
            self.sites.total_emission_rate() * SECONDS_PER_DAY / GRAMS_PER_KG;
        Ok(())
    }

    /// Run every day from the start date through `end_date` inclusive.
    pub fn run_until(mut self, end_date: Date) -> Result<ProgramSummary, AppError> {
        let mut date = self.start_date;
        while date <= end_date {
            self.step(date)?;
            match date.next_day() {
                Some(next) => date = next,
                None => break,
            }
        }
        self.summary.queue_length_at_end = self.schedule.len();
        info!(
            program = %self.name,
            flagged = self.summary.sites_flagged,
            follow_ups = self.summary.follow_up_surveys,
            repairs = self.summary.repairs,
            emissions_kg = self.summary.total_emissions_kg,
            "Program run complete"
        );
        Ok(self.summary)
    }
}

/// Run every configured program and compare each against the first.
pub fn run(config: &Config) -> Result<SimulationSummary, AppError> {
    let (start_date, end_date) = config.simulation_dates()?;
    let seed = config.seed();
    let sites: Sites = config.sites.iter().map(Site::from).collect();

    // construct all programs before running any of them
    let runs = config
        .programs
        .iter()
        .map(|program| {
            if program.methods.is_empty() {
                info!(
                    program = %program.name,
                    "Program has no methods; running as a no-LDAR baseline"
                );
            }
            ProgramRun::new(program, sites.clone(), start_date, seed)
        })
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        programs = runs.len(),
        sites = sites.len(),
        start = %start_date,
        end = %end_date,
        seed,
        "Starting simulation"
    );

    let programs = runs
        .into_iter()
        .map(|run| run.run_until(end_date))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(summarize(start_date, end_date, seed, programs))
}

pub fn summarize(
    start_date: Date,
    end_date: Date,
    seed: u64,
    programs: Vec<ProgramSummary>,
) -> SimulationSummary {
    let comparisons = match programs.split_first() {
        Some((baseline, alternatives)) => alternatives
            .iter()
            .map(|program| compare(baseline, program))
            .collect(),
        None => Vec::new(),
    };
    SimulationSummary {
        start_date: start_date.to_string(),
        end_date: end_date.to_string(),
        seed,
        baseline: programs.first().map(|baseline| baseline.program.clone()),
        programs,
        comparisons,
    }
}

fn compare(baseline: &ProgramSummary, program: &ProgramSummary) -> ProgramComparison {
    let reduction = baseline.total_emissions_kg - program.total_emissions_kg;
    ProgramComparison {
        program: program.program.clone(),
        emissions_reduction_kg: reduction,
        emissions_reduction_percent: (baseline.total_emissions_kg > 0.0)
            .then(|| reduction / baseline.total_emissions_kg * 100.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn summary(program: &str, total_emissions_kg: f64) -> ProgramSummary {
        ProgramSummary {
            program: program.to_string(),
            sites_flagged: 0,
            follow_up_surveys: 0,
            repairs: 0,
            total_emissions_kg,
            queue_length_at_end: 0,
        }
    }

    #[test]
    fn no_method_program_accumulates_daily_emissions() -> Result<(), AppError> {
        let sites: Sites = vec![Site::new("s1", 1.0), Site::new("s2", 0.5)]
            .into_iter()
            .collect();
        let run = ProgramRun::with_methods(
            "baseline".to_string(),
            Vec::new(),
            5,
            sites,
            date!(2024 - 01 - 01),
            1,
        );

        let result = run.run_until(date!(2024 - 01 - 02))?;

        // 1.5 g/s over two days
        assert!((result.total_emissions_kg - 259.2).abs() < 1e-9);
        assert_eq!(result.repairs, 0);
        Ok(())
    }

    #[test]
    fn comparisons_are_relative_to_first_program() {
        let result = summarize(
            date!(2024 - 01 - 01),
            date!(2024 - 01 - 31),
            9,
            vec![
                summary("baseline", 200.0),
                summary("aerial", 150.0),
                summary("ogi", 250.0),
            ],
        );

        assert_eq!(result.baseline.as_deref(), Some("baseline"));
        assert_eq!(result.start_date, "2024-01-01");
        assert_eq!(result.comparisons.len(), 2);
        assert_eq!(result.comparisons[0].emissions_reduction_kg, 50.0);
        assert_eq!(
            result.comparisons[0].emissions_reduction_percent,
            Some(25.0)
        );
        assert_eq!(
            result.comparisons[1].emissions_reduction_percent,
            Some(-25.0)
        );
    }

    #[test]
    fn zero_baseline_has_no_percentage() {
        let result = summarize(
            date!(2024 - 01 - 01),
            date!(2024 - 01 - 01),
            1,
            vec![summary("baseline", 0.0), summary("aerial", 0.0)],
        );

        assert_eq!(result.comparisons[0].emissions_reduction_percent, None);
    }

    #[test]
    fn empty_program_list_has_no_baseline() {
        let result = summarize(date!(2024 - 01 - 01), date!(2024 - 01 - 01), 1, Vec::new());

        assert!(result.baseline.is_none());
        assert!(result.comparisons.is_empty());
    }
}
