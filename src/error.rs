use crate::config::ConfigError;
use crate::method::MethodError;
use crate::site::SiteId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("site {0} is not registered")]
    UnknownSite(SiteId),
    #[error("invalid detected rate {rate} at site {site_id}")]
    InvalidRate { site_id: SiteId, rate: f64 },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Method(#[from] MethodError),
}
