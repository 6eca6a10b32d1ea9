use chrono::NaiveDate;
use futures::{stream, StreamExt};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use super::core::GitLabProvider;
use crate::error::{CIMinutesError, Result};
use crate::models::{Project, UsageReportEntry};
use crate::providers::gitlab::client::{GitLabJobDto, GitLabPipelineDto};

/// Job listings fetched at once within a single project.
const JOB_CONCURRENCY: usize = 4;

#[derive(Debug)]
pub enum UsageProgress<'a> {
    ProjectsResolved(usize),
    ProjectCompleted {
        completed: usize,
        total: usize,
        entry: &'a UsageReportEntry,
    },
}

impl GitLabProvider {
    /// Compute CI minutes for every project, in the order given.
    ///
    /// Up to `concurrency` projects are processed at once, but entries and
    /// progress events are emitted in input order. Failed pipeline or job
    /// listings count as zero usage, so every project yields an entry.
    pub async fn aggregate_usage<F>(
        &self,
        projects: &[Project],
        date_from: NaiveDate,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<Vec<UsageReportEntry>>
    where
        F: FnMut(UsageProgress<'_>),
    {
        let total = projects.len();
        info!("Calculating CI minutes for {total} projects since {date_from}...");

        let mut entries = Vec::with_capacity(total);
        let mut usage = std::pin::pin!(stream::iter(projects)
            .map(|project| self.project_usage(project, date_from))
            .buffered(self.concurrency));

        loop {
            let entry = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    warn!("Cancelled after {} of {total} projects", entries.len());
                    return Err(CIMinutesError::Cancelled);
                }
                next = usage.next() => match next {
                    Some(entry) => entry,
                    None => break,
                },
            };

            entries.push(entry);
            if let Some(entry) = entries.last() {
                on_progress(UsageProgress::ProjectCompleted {
                    completed: entries.len(),
                    total,
                    entry,
                });
            }
        }

        Ok(entries)
    }

    async fn project_usage(&self, project: &Project, date_from: NaiveDate) -> UsageReportEntry {
        let pipelines = self.client.fetch_pipelines(project.id, date_from).await;

        // Sum in pipeline order so repeated runs give identical totals
        let total_seconds = stream::iter(&pipelines)
            .map(|pipeline| self.pipeline_seconds(project, pipeline))
            .buffered(JOB_CONCURRENCY)
            .fold(0.0, |acc, seconds| async move { acc + seconds })
            .await;

        let entry = UsageReportEntry::new(project, total_seconds);
        info!(
            "{} ({}): {} pipelines, {} minutes",
            project.name,
            project.id,
            pipelines.len(),
            entry.ci_minutes_used
        );

        entry
    }

    async fn pipeline_seconds(&self, project: &Project, pipeline: &GitLabPipelineDto) -> f64 {
        debug!(
            "Pipeline {} of {} is {}, updated at {}",
            pipeline.id, project.name, pipeline.status, pipeline.updated_at
        );

        match self
            .client
            .fetch_pipeline_jobs(project.id, pipeline.id)
            .await
        {
            Ok(jobs) => billable_seconds(&jobs),
            Err(e) => {
                warn!(
                    "Couldn't fetch jobs of pipeline {} in {}, counting none: {e}",
                    pipeline.id, project.name
                );
                0.0
            }
        }
    }
}

fn billable_seconds(jobs: &[GitLabJobDto]) -> f64 {
    jobs.iter().filter_map(GitLabJobDto::billable_seconds).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UsageConfig;
    use mockito::{Matcher, Mock, ServerGuard};

    fn date_from() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 14).unwrap()
    }

    fn project(id: u64) -> Project {
        Project {
            id,
            name: format!("Group / p{id}"),
        }
    }

    fn pipelines_body(ids: &[u64]) -> String {
        let pipelines: Vec<_> = ids
            .iter()
            .map(|id| {
                format!(r#"{{"id": {id}, "status": "success", "updated_at": "2024-03-01T10:00:00.000Z"}}"#)
            })
            .collect();
        format!("[{}]", pipelines.join(","))
    }

    async fn mock_pipelines_page(
        server: &mut ServerGuard,
        project_id: u64,
        page: u32,
        status: usize,
        body: &str,
    ) -> Mock {
        server
            .mock("GET", format!("/api/v4/projects/{project_id}/pipelines").as_str())
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("updated_after".into(), "2024-02-14".into()),
                Matcher::UrlEncoded("page".into(), page.to_string()),
            ]))
            .with_status(status)
            .with_body(body)
            .create_async()
            .await
    }

    /// Mocks a complete pipeline listing: one page of `ids`, then an empty page.
    async fn mock_pipelines(
        server: &mut ServerGuard,
        project_id: u64,
        ids: &[u64],
    ) -> Vec<Mock> {
        vec![
            mock_pipelines_page(server, project_id, 1, 200, &pipelines_body(ids)).await,
            mock_pipelines_page(server, project_id, 2, 200, "[]").await,
        ]
    }

    async fn mock_jobs(
        server: &mut ServerGuard,
        project_id: u64,
        pipeline_id: u64,
        status: usize,
        body: &str,
    ) -> Mock {
        server
            .mock(
                "GET",
                format!("/api/v4/projects/{project_id}/pipelines/{pipeline_id}/jobs").as_str(),
            )
            .match_query(Matcher::Any)
            .with_status(status)
            .with_body(body)
            .create_async()
            .await
    }

    fn provider(server: &ServerGuard, concurrency: usize) -> GitLabProvider {
        let mut config = UsageConfig::new(server.url());
        config.concurrency = concurrency;
        GitLabProvider::new(&config).unwrap()
    }

    async fn aggregate(provider: &GitLabProvider, projects: &[Project]) -> Vec<UsageReportEntry> {
        provider
            .aggregate_usage(projects, date_from(), &CancellationToken::new(), |_| {})
            .await
            .unwrap()
    }

    #[test]
    fn test_billable_seconds_sums_successful_jobs() {
        let jobs: Vec<GitLabJobDto> = serde_json::from_str(
            r#"[{"status": "success", "duration": 600.0},
                {"status": "success", "duration": 300.0},
                {"status": "failed", "duration": 120.0},
                {"status": "success", "duration": null},
                {"status": "skipped"}]"#,
        )
        .unwrap();

        assert_eq!(billable_seconds(&jobs), 900.0);
        assert_eq!(billable_seconds(&[]), 0.0);
    }

    #[tokio::test]
    async fn test_successful_jobs_fold_into_minutes() {
        let mut server = mockito::Server::new_async().await;
        let _pipelines = mock_pipelines(&mut server, 42, &[100]).await;
        let _jobs = mock_jobs(
            &mut server,
            42,
            100,
            200,
            r#"[{"status": "success", "duration": 600.0},
                {"status": "success", "duration": 300.0},
                {"status": "failed", "duration": 120.0}]"#,
        )
        .await;

        let entries = aggregate(&provider(&server, 4), &[project(42)]).await;

        assert_eq!(
            entries,
            vec![UsageReportEntry {
                project_id: 42,
                project_name: "Group / p42".to_string(),
                ci_minutes_used: 15.0,
            }]
        );
    }

    #[tokio::test]
    async fn test_project_without_pipelines_reports_zero() {
        let mut server = mockito::Server::new_async().await;
        let _pipelines = mock_pipelines_page(&mut server, 7, 1, 200, "[]").await;

        let entries = aggregate(&provider(&server, 4), &[project(7)]).await;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].project_id, 7);
        assert_eq!(entries[0].ci_minutes_used, 0.0);
    }

    #[tokio::test]
    async fn test_jobs_across_pipelines_are_summed() {
        let mut server = mockito::Server::new_async().await;
        let _pipelines = mock_pipelines(&mut server, 1, &[10, 11, 12]).await;
        let _jobs10 = mock_jobs(
            &mut server,
            1,
            10,
            200,
            r#"[{"status": "success", "duration": 30}]"#,
        )
        .await;
        let _jobs11 = mock_jobs(
            &mut server,
            1,
            11,
            200,
            r#"[{"status": "success", "duration": 45.5}]"#,
        )
        .await;
        let _jobs12 = mock_jobs(&mut server, 1, 12, 200, "[]").await;

        let entries = aggregate(&provider(&server, 4), &[project(1)]).await;

        // 75.5s = 1.258.. minutes
        assert_eq!(entries[0].ci_minutes_used, 1.26);
    }

    #[tokio::test]
    async fn test_failing_pipeline_page_keeps_earlier_pages() {
        let mut server = mockito::Server::new_async().await;
        let _page1 =
            mock_pipelines_page(&mut server, 1, 1, 200, &pipelines_body(&[10])).await;
        let _page2 = mock_pipelines_page(&mut server, 1, 2, 500, "internal error").await;
        let _jobs10 = mock_jobs(
            &mut server,
            1,
            10,
            200,
            r#"[{"status": "success", "duration": 120}]"#,
        )
        .await;
        let _p2 = mock_pipelines(&mut server, 2, &[20]).await;
        let _jobs20 = mock_jobs(
            &mut server,
            2,
            20,
            200,
            r#"[{"status": "success", "duration": 60}]"#,
        )
        .await;

        let entries = aggregate(&provider(&server, 1), &[project(1), project(2)]).await;

        assert_eq!(entries[0].ci_minutes_used, 2.0);
        assert_eq!(entries[1].ci_minutes_used, 1.0);
    }

    #[tokio::test]
    async fn test_failing_first_pipeline_page_reports_zero() {
        let mut server = mockito::Server::new_async().await;
        let _page1 = mock_pipelines_page(&mut server, 3, 1, 403, "forbidden").await;

        let entries = aggregate(&provider(&server, 4), &[project(3)]).await;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ci_minutes_used, 0.0);
    }

    #[tokio::test]
    async fn test_failing_job_listing_counts_as_zero() {
        let mut server = mockito::Server::new_async().await;
        let _pipelines = mock_pipelines(&mut server, 5, &[50, 51]).await;
        let _jobs50 = mock_jobs(&mut server, 5, 50, 500, "internal error").await;
        let _jobs51 = mock_jobs(
            &mut server,
            5,
            51,
            200,
            r#"[{"status": "success", "duration": 60}]"#,
        )
        .await;

        let entries = aggregate(&provider(&server, 4), &[project(5)]).await;

        assert_eq!(entries[0].ci_minutes_used, 1.0);
    }

    #[tokio::test]
    async fn test_malformed_job_listing_counts_as_zero() {
        let mut server = mockito::Server::new_async().await;
        let _pipelines = mock_pipelines(&mut server, 5, &[50]).await;
        let _jobs50 = mock_jobs(&mut server, 5, 50, 200, r#"[{"duration": 60}]"#).await;

        let entries = aggregate(&provider(&server, 4), &[project(5)]).await;

        assert_eq!(entries[0].ci_minutes_used, 0.0);
    }

    #[tokio::test]
    async fn test_entries_follow_input_order_and_are_repeatable() {
        let mut server = mockito::Server::new_async().await;
        let mut mocks = Vec::new();
        for (project_id, seconds) in [(3, 180), (1, 60), (2, 120)] {
            let pipeline_id = project_id * 10;
            mocks.extend(mock_pipelines(&mut server, project_id, &[pipeline_id]).await);
            mocks.push(
                mock_jobs(
                    &mut server,
                    project_id,
                    pipeline_id,
                    200,
                    &format!(r#"[{{"status": "success", "duration": {seconds}}}]"#),
                )
                .await,
            );
        }

        let provider = provider(&server, 3);
        let projects = [project(3), project(1), project(2)];
        let first = aggregate(&provider, &projects).await;
        let second = aggregate(&provider, &projects).await;

        let ids: Vec<_> = first.iter().map(|e| e.project_id).collect();
        let minutes: Vec<_> = first.iter().map(|e| e.ci_minutes_used).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(minutes, vec![3.0, 1.0, 2.0]);
        assert_eq!(first, second);
        drop(mocks);
    }

    #[tokio::test]
    async fn test_progress_reported_per_project() {
        let mut server = mockito::Server::new_async().await;
        let _p1 = mock_pipelines_page(&mut server, 1, 1, 200, "[]").await;
        let _p2 = mock_pipelines_page(&mut server, 2, 1, 200, "[]").await;

        let provider = provider(&server, 2);
        let mut events = Vec::new();
        provider
            .aggregate_usage(
                &[project(1), project(2)],
                date_from(),
                &CancellationToken::new(),
                |event| {
                    if let UsageProgress::ProjectCompleted {
                        completed,
                        total,
                        entry,
                    } = event
                    {
                        events.push((completed, total, entry.project_id));
                    }
                },
            )
            .await
            .unwrap();

        assert_eq!(events, vec![(1, 2, 1), (2, 2, 2)]);
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_without_requests() {
        let mut server = mockito::Server::new_async().await;
        let pipelines = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = provider(&server, 4)
            .aggregate_usage(&[project(1), project(2)], date_from(), &cancel, |_| {})
            .await;

        assert!(matches!(result, Err(CIMinutesError::Cancelled)));
        pipelines.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_project_list() {
        let server = mockito::Server::new_async().await;

        let entries = aggregate(&provider(&server, 4), &[]).await;

        assert!(entries.is_empty());
    }
}
