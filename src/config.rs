use crate::rng::DEFAULT_SEED;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use time::Date;
use time::macros::format_description;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_FOLLOW_UP_DAILY_CAPACITY: usize = 10;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    pub simulation: SimulationSection,
    #[serde(default)]
    pub sites: Vec<SiteSettings>,
    #[serde(default)]
    pub programs: Vec<ProgramSettings>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulationSection {
    /// First simulated day, `YYYY-MM-DD`
    pub start_date: String,
    /// Last simulated day (inclusive), `YYYY-MM-DD`
    pub end_date: String,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SiteSettings {
    pub id: String,
    /// Emission rate in g/s
    #[serde(default)]
    pub emission_rate: f64,
    /// Required surveys per year, keyed by method name
    #[serde(default)]
    pub survey_frequency: BTreeMap<String, u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProgramSettings {
    pub name: String,
    /// Follow-up visits crews can make per day (default: 10)
    #[serde(default)]
    pub follow_up_daily_capacity: Option<usize>,
    #[serde(default)]
    pub methods: Vec<MethodSettings>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MethodSettings {
    pub name: String,
    /// "mobile" or "stationary"
    pub deployment_type: String,
    /// Days between a detection and the method acting on it
    #[serde(default)]
    pub reporting_delay: u32,
    /// Default survey frequency for mobile methods; sites may override it
    #[serde(default)]
    pub surveys_per_year: Option<u32>,
    pub sensor: SensorSettings,
    pub follow_up: FollowUpSettings,
    /// Required for stationary methods
    #[serde(default)]
    pub rolling_average: Option<RollingAverageSettings>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SensorSettings {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub mdl: Vec<f64>,
    #[serde(default)]
    pub quantification_error: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FollowUpSettings {
    /// "threshold" or "proportion"
    pub interaction_priority: String,
    /// Days a candidate batch stays open before it is committed
    #[serde(default)]
    pub delay: u32,
    #[serde(default = "default_proportion")]
    pub proportion: f64,
    /// Unset means no instant threshold
    #[serde(default)]
    pub instant_threshold: Option<f64>,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default = "default_redundancy_filter")]
    pub redundancy_filter: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RollingAverageSettings {
    pub small_window: usize,
    pub large_window: usize,
    pub small_window_threshold: f64,
    pub large_window_threshold: f64,
}

fn default_proportion() -> f64 {
    1.0
}

fn default_redundancy_filter() -> String {
    "recent".to_string()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid {field}: {value} (expected YYYY-MM-DD)")]
    InvalidDate { field: &'static str, value: String },
    #[error("simulation ends ({end}) before it starts ({start})")]
    EmptyDateRange { start: Date, end: Date },
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

fn parse_date(field: &'static str, value: &str) -> Result<Date, ConfigError> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(value, format).map_err(|_| ConfigError::InvalidDate {
        field,
        value: value.to_owned(),
    })
}

impl Config {
    /// Returns the inclusive simulated date range.
    pub fn simulation_dates(&self) -> Result<(Date, Date), ConfigError> {
        let start = parse_date("start_date", &self.simulation.start_date)?;
        let end = parse_date("end_date", &self.simulation.end_date)?;
        if end < start {
            return Err(ConfigError::EmptyDateRange { start, end });
        }
        Ok((start, end))
    }

    pub fn seed(&self) -> u64 {
        self.simulation.seed.unwrap_or(DEFAULT_SEED)
    }

    /// Returns the configured log level, or `None` if it is not a valid level.
    pub fn log_level(&self) -> Option<tracing::Level> {
        self.logging.level.parse().ok()
    }
}

impl ProgramSettings {
    pub fn follow_up_daily_capacity(&self) -> usize {
        self.follow_up_daily_capacity.unwrap_or(DEFAULT_FOLLOW_UP_DAILY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};
    use time::macros::date;

    const MINIMAL: &str = r#"
[app]
name = "ldar-sim"

[logging]
level = "debug"

[simulation]
start_date = "2024-01-01"
end_date = "2024-12-31"
"#;

    fn write_temp(
        name: &str,
        contents: &str,
    ) -> Result<std::path::PathBuf, Box<dyn std::error::Error>> {
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let path = std::env::temp_dir().join(format!("ldar-config-{name}-{unique}.toml"));
        fs::write(&path, contents)?;
        Ok(path)
    }

    #[test]
    fn default_config_has_programs_and_sites() -> Result<(), Box<dyn std::error::Error>> {
        let config = load_default()?;

        assert!(!config.sites.is_empty());
        assert!(!config.programs.is_empty());
        assert!(config.simulation_dates().is_ok());
        Ok(())
    }

    #[test]
    fn minimal_config_uses_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp("minimal", MINIMAL)?;

        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);
        let config = result?;

        assert!(config.sites.is_empty());
        assert!(config.programs.is_empty());
        assert_eq!(config.seed(), DEFAULT_SEED);
        assert_eq!(config.log_level(), Some(tracing::Level::DEBUG));
        assert_eq!(
            config.simulation_dates()?,
            (date!(2024 - 01 - 01), date!(2024 - 12 - 31))
        );
        Ok(())
    }

    #[test]
    fn method_sections_fill_follow_up_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let contents = format!(
            r#"{MINIMAL}
[[programs]]
name = "aerial"

[[programs.methods]]
name = "plane"
deployment_type = "mobile"
sensor = {{ type = "default", mdl = [1.0] }}
follow_up = {{ interaction_priority = "threshold" }}
"#
        );
        let path = write_temp("method", &contents)?;

        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);
        let config = result?;

        let program = &config.programs[0];
        let follow_up = &program.methods[0].follow_up;
        assert_eq!(
            program.follow_up_daily_capacity(),
            DEFAULT_FOLLOW_UP_DAILY_CAPACITY
        );
        assert_eq!(follow_up.proportion, 1.0);
        assert_eq!(follow_up.delay, 0);
        assert_eq!(follow_up.instant_threshold, None);
        assert_eq!(follow_up.redundancy_filter, "recent");
        assert!(program.methods[0].rolling_average.is_none());
        Ok(())
    }

    #[test]
    fn reversed_dates_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let contents = MINIMAL.replace("2024-12-31", "2023-12-31");
        let config: Config = toml::from_str(&contents)?;

        assert!(matches!(
            config.simulation_dates(),
            Err(ConfigError::EmptyDateRange { .. })
        ));
        Ok(())
    }

    #[test]
    fn malformed_date_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let contents = MINIMAL.replace("2024-01-01", "01/01/2024");
        let config: Config = toml::from_str(&contents)?;

        assert!(matches!(
            config.simulation_dates(),
            Err(ConfigError::InvalidDate { field: "start_date", .. })
        ));
        Ok(())
    }

    #[test]
    fn missing_config_file_returns_read_error() {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("ldar-config-missing-{unique}.toml"));

        let result = load_from_path(&path);

        assert!(matches!(result, Err(ConfigError::Read(_))));
    }

    #[test]
    fn invalid_toml_returns_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp("invalid", "not = [valid")?;

        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        Ok(())
    }
}
