use chrono::Utc;
use log::info;
use tokio_util::sync::CancellationToken;

use super::usage::UsageProgress;
use crate::config::UsageConfig;
use crate::error::{CIMinutesError, Result};
use crate::models::UsageReport;
use crate::providers::gitlab::client::GitLabClient;

pub struct GitLabProvider {
    pub client: GitLabClient,
    pub concurrency: usize,
}

impl GitLabProvider {
    pub fn new(config: &UsageConfig) -> Result<Self> {
        let client = GitLabClient::new(
            &config.base_url,
            config.token.clone(),
            config.request_timeout,
        )?;

        Ok(Self {
            client,
            concurrency: config.concurrency.max(1),
        })
    }

    /// Resolve the configured projects, aggregate their usage and build the report.
    ///
    /// Only project resolution can fail the run; pipeline and job failures
    /// degrade to zero usage. Cancelling `cancel` stops the run with
    /// [`CIMinutesError::Cancelled`].
    pub async fn collect_usage<F>(
        &self,
        config: &UsageConfig,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<UsageReport>
    where
        F: FnMut(UsageProgress<'_>),
    {
        let date_from = config.window_start(Utc::now())?;

        let projects = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CIMinutesError::Cancelled),
            projects = self.resolve_projects(config) => projects?,
        };

        info!("Found {} projects", projects.len());
        on_progress(UsageProgress::ProjectsResolved(projects.len()));

        let entries = self
            .aggregate_usage(&projects, date_from, cancel, &mut on_progress)
            .await?;

        Ok(UsageReport::assemble(config.days, date_from, entries))
    }
}
