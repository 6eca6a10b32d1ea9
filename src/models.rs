use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: u64,
    /// Full namespace path, e.g. `Group / Subgroup / Project`.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReportEntry {
    pub project_id: u64,
    pub project_name: String,
    pub ci_minutes_used: f64,
}

impl UsageReportEntry {
    pub fn new(project: &Project, total_seconds: f64) -> Self {
        Self {
            project_id: project.id,
            project_name: project.name.clone(),
            ci_minutes_used: seconds_to_minutes(total_seconds),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub days: u32,
    pub date_from: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub total_ci_minutes: f64,
    pub projects: Vec<UsageReportEntry>,
}

impl UsageReport {
    /// Totals are summed from the already rounded entries.
    pub fn assemble(days: u32, date_from: NaiveDate, projects: Vec<UsageReportEntry>) -> Self {
        let total_ci_minutes = round_two_places(projects.iter().map(|e| e.ci_minutes_used).sum());

        Self {
            days,
            date_from,
            generated_at: Utc::now(),
            total_ci_minutes,
            projects,
        }
    }
}

/// Converts seconds to minutes rounded to two decimals, half away from zero.
pub fn seconds_to_minutes(seconds: f64) -> f64 {
    round_two_places(seconds.max(0.0) / 60.0)
}

fn round_two_places(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
