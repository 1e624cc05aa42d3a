use http::StatusCode;
use serde::Deserialize;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;
use thiserror::Error;
use volley_client::Target;
use volley_metrics::stats::{default_percentiles, Percentile, StatsError};

/// Settings as read from a config file or the command line; everything optional.
#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
pub struct FileConfig {
    pub url: Option<String>,
    pub workers: Option<usize>,
    pub requests: Option<usize>,
    pub success_status: Option<u16>,
    pub percentiles: Option<Vec<u8>>,
    pub keep_alive: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub url: String,
    pub workers: usize,
    pub requests: usize,
    pub success_status: StatusCode,
    pub percentiles: Vec<Percentile>,
    pub keep_alive: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing URL")]
    MissingUrl,
    #[error("must use at least one worker")]
    NoWorkers,
    #[error("must perform at least one request")]
    NoRequests,
    #[error("{0} is not a valid HTTP status code")]
    InvalidStatus(u16),
    #[error("must report at least one percentile")]
    NoPercentiles,
    #[error("invalid percentile list '{0}'")]
    InvalidPercentileList(String),
    #[error(transparent)]
    InvalidPercentile(#[from] StatsError),
}

impl FileConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<FileConfig, ConfigError> {
        let mut f = File::open(path.as_ref())?;
        let mut contents = String::new();
        f.read_to_string(&mut contents)?;
        FileConfig::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<FileConfig, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Layer `over` on top of `self`; values set in `over` win.
    pub fn merge(self, over: FileConfig) -> FileConfig {
        FileConfig {
            url: over.url.or(self.url),
            workers: over.workers.or(self.workers),
            requests: over.requests.or(self.requests),
            success_status: over.success_status.or(self.success_status),
            percentiles: over.percentiles.or(self.percentiles),
            keep_alive: over.keep_alive.or(self.keep_alive),
        }
    }
}

/// Parse a comma separated list of ranks such as `50,90,99`.
pub fn parse_percentiles(list: &str) -> Result<Vec<u8>, ConfigError> {
    list.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u8>()
                .map_err(|_| ConfigError::InvalidPercentileList(list.to_string()))
        })
        .collect()
}

impl Config {
    /// Validate a fully merged `FileConfig`, filling in defaults.
    pub fn resolve(unresolved: FileConfig) -> Result<Config, ConfigError> {
        let url = match unresolved.url {
            Some(url) if !url.trim().is_empty() => url,
            _ => return Err(ConfigError::MissingUrl),
        };
        let workers = unresolved.workers.unwrap_or(1);
        if workers < 1 {
            return Err(ConfigError::NoWorkers);
        }
        let requests = unresolved.requests.unwrap_or(1);
        if requests < 1 {
            return Err(ConfigError::NoRequests);
        }
        let success_status = match unresolved.success_status {
            Some(code) => {
                StatusCode::from_u16(code).map_err(|_| ConfigError::InvalidStatus(code))?
            }
            None => StatusCode::OK,
        };
        let percentiles = match unresolved.percentiles {
            Some(ranks) if ranks.is_empty() => return Err(ConfigError::NoPercentiles),
            Some(ranks) => ranks
                .into_iter()
                .map(Percentile::new)
                .collect::<Result<Vec<_>, _>>()?,
            None => default_percentiles(),
        };

        Ok(Config {
            url,
            workers,
            requests,
            success_status,
            percentiles,
            keep_alive: unresolved.keep_alive.unwrap_or(true),
        })
    }

    pub fn target(&self) -> Target {
        Target::new(self.url.clone(), self.success_status)
    }
}
