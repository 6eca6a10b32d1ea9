use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use super::core::GitLabClient;
use super::pagination::{PagePolicy, PER_PAGE};
use crate::error::Result;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GitLabPipelineDto {
    pub id: u64,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GitLabJobDto {
    pub status: String,
    pub duration: Option<f64>,
}

const BILLABLE_STATUS: &str = "success";

impl GitLabJobDto {
    /// Seconds this job counts towards usage, if any.
    pub fn billable_seconds(&self) -> Option<f64> {
        if self.status != BILLABLE_STATUS {
            return None;
        }
        self.duration.filter(|d| *d > 0.0)
    }
}

impl GitLabClient {
    /// Fetch pipelines updated on or after `updated_after`.
    ///
    /// A failing page ends the listing; whatever was fetched before it is kept.
    pub async fn fetch_pipelines(
        &self,
        project_id: u64,
        updated_after: NaiveDate,
    ) -> Vec<GitLabPipelineDto> {
        self.paginate(
            &format!("projects/{project_id}/pipelines"),
            &[(
                "updated_after",
                updated_after.format("%Y-%m-%d").to_string(),
            )],
            PagePolicy::DegradeOnError,
        )
        .await
        // DegradeOnError already logged and truncated the listing
        .unwrap_or_default()
    }

    /// Fetch the jobs of a pipeline in a single request
    pub async fn fetch_pipeline_jobs(
        &self,
        project_id: u64,
        pipeline_id: u64,
    ) -> Result<Vec<GitLabJobDto>> {
        self.get(
            &format!("projects/{project_id}/pipelines/{pipeline_id}/jobs"),
            &[("per_page", PER_PAGE.to_string())],
        )
        .await
    }
}
