use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::auth::Token;
use crate::config::{UsageConfig, DEFAULT_CONCURRENCY, DEFAULT_DAYS};
use crate::output::{self, OutputFormat};
use crate::providers::gitlab::{GitLabProvider, UsageProgress};

#[derive(Parser)]
#[command(name = "ciminutes")]
#[command(author, version, about = "Calculate CI minutes used by GitLab projects", long_about = None)]
pub struct Cli {
    /// Number of days to calculate CI minutes for
    #[arg(short, long, default_value_t = DEFAULT_DAYS)]
    days: u32,

    /// GitLab instance URL
    #[arg(short, long, env = "GITLAB_URL", default_value = "https://gitlab.com")]
    url: String,

    /// GitLab API token
    #[arg(short, long, env = "GITLAB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Group ID whose projects, subgroups included, are reported (repeatable)
    #[arg(short, long = "group", env = "GITLAB_GROUP_IDS", value_delimiter = ',')]
    groups: Vec<u64>,

    /// Project ID to report (repeatable)
    #[arg(short = 'P', long = "project", env = "GITLAB_PROJECT_IDS", value_delimiter = ',')]
    projects: Vec<u64>,

    /// Number of projects processed at the same time
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Timeout for each API request, in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Output file path (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty print JSON output
    #[arg(short, long, default_value_t = false)]
    pretty: bool,
}

impl Cli {
    fn usage_config(&self) -> UsageConfig {
        let mut config = UsageConfig::new(self.url.clone());
        config.token = self
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(Token::from);
        config.days = self.days;
        config.group_ids = self.groups.clone();
        config.project_ids = self.projects.clone();
        config.concurrency = self.concurrency;
        config.request_timeout = (self.timeout > 0).then(|| Duration::from_secs(self.timeout));
        config
    }

    pub async fn execute(&self) -> Result<()> {
        let config = self.usage_config();
        config.validate()?;

        info!("Collecting CI minutes from {}", config.base_url);

        let provider = GitLabProvider::new(&config)?;

        let cancel = CancellationToken::new();
        let interrupt = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling outstanding requests");
                    cancel.cancel();
                }
            }
        });

        let report = provider
            .collect_usage(&config, &cancel, print_progress)
            .await;
        interrupt.abort();
        let report = report?;

        output::write(&report, self.format, self.pretty, self.output.as_deref())?;

        Ok(())
    }
}

/// Progress goes to stderr so stdout carries only the report.
fn print_progress(event: UsageProgress<'_>) {
    match event {
        UsageProgress::ProjectsResolved(total) => {
            eprintln!("Found {total} projects.");
        }
        UsageProgress::ProjectCompleted {
            completed,
            total,
            entry,
        } => {
            debug!(
                "[{completed}/{total}] {}: {} minutes",
                entry.project_name, entry.ci_minutes_used
            );
            eprint!(".");
            if completed == total {
                eprintln!();
            }
            let _ = std::io::stderr().flush();
        }
    }
}
