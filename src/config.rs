use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use url::Url;

use crate::auth::Token;
use crate::error::{CIMinutesError, Result};

pub const DEFAULT_DAYS: u32 = 30;
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Settings for one usage run, built once at startup.
///
/// Empty `group_ids` and `project_ids` together mean "every project the
/// token can see".
#[derive(Debug, Clone)]
pub struct UsageConfig {
    pub base_url: String,
    pub token: Option<Token>,
    pub days: u32,
    pub group_ids: Vec<u64>,
    pub project_ids: Vec<u64>,
    pub concurrency: usize,
    pub request_timeout: Option<Duration>,
}

impl UsageConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            days: DEFAULT_DAYS,
            group_ids: Vec::new(),
            project_ids: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(CIMinutesError::Config(
                "GitLab URL must not be empty".to_string(),
            ));
        }

        Url::parse(&self.base_url)
            .map_err(|e| CIMinutesError::Config(format!("Invalid base URL: {e}")))?;

        if self.days == 0 {
            return Err(CIMinutesError::Config(
                "Lookback window must be at least one day".to_string(),
            ));
        }

        if self.concurrency == 0 {
            return Err(CIMinutesError::Config(
                "Concurrency must be at least 1".to_string(),
            ));
        }

        self.window_start(Utc::now())?;

        Ok(())
    }

    /// First day of the lookback window, used as the `updated_after` filter.
    pub fn window_start(&self, now: DateTime<Utc>) -> Result<NaiveDate> {
        TimeDelta::try_days(i64::from(self.days))
            .and_then(|window| now.checked_sub_signed(window))
            .map(|start| start.date_naive())
            .ok_or_else(|| {
                CIMinutesError::Config(format!(
                    "Lookback window of {} days reaches before the earliest supported date",
                    self.days
                ))
            })
    }
}
