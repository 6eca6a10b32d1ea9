use indexmap::map::Entry;
use indexmap::IndexMap;
use log::{debug, info, warn};

use super::core::GitLabProvider;
use crate::config::UsageConfig;
use crate::error::Result;
use crate::models::Project;

impl GitLabProvider {
    /// Turn the configured group and project IDs into a list of projects.
    ///
    /// Groups come first, then standalone projects, each in configuration
    /// order. A project reachable several ways is kept once, at its first
    /// position. With no IDs configured every accessible project is listed.
    pub async fn resolve_projects(&self, config: &UsageConfig) -> Result<Vec<Project>> {
        let mut resolved: IndexMap<u64, Project> = IndexMap::new();

        if !config.group_ids.is_empty() {
            info!("Fetching projects from {} groups...", config.group_ids.len());

            for &group_id in &config.group_ids {
                let projects = self.client.fetch_group_projects(group_id).await?;
                debug!("Group {group_id}: {} projects", projects.len());
                extend_unique(&mut resolved, projects.into_iter().map(Project::from));
            }
        }

        if !config.project_ids.is_empty() {
            info!(
                "Fetching {} standalone projects...",
                config.project_ids.len()
            );

            for &project_id in &config.project_ids {
                match self.client.fetch_project(project_id).await {
                    Ok(project) => extend_unique(&mut resolved, [Project::from(project)]),
                    Err(e) => warn!("Couldn't fetch project {project_id}, skipping: {e}"),
                }
            }
        }

        if config.group_ids.is_empty() && config.project_ids.is_empty() {
            info!("No group or project IDs specified, fetching all accessible projects...");

            let projects = self.client.fetch_all_projects().await?;
            extend_unique(&mut resolved, projects.into_iter().map(Project::from));
        }

        Ok(resolved.into_values().collect())
    }
}

fn extend_unique(
    resolved: &mut IndexMap<u64, Project>,
    projects: impl IntoIterator<Item = Project>,
) {
    for project in projects {
        match resolved.entry(project.id) {
            Entry::Occupied(_) => debug!("Project {} already resolved, skipping", project.id),
            Entry::Vacant(slot) => {
                slot.insert(project);
            }
        }
    }
}
