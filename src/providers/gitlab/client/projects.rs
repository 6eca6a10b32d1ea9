use serde::Deserialize;

use super::core::GitLabClient;
use super::pagination::PagePolicy;
use crate::error::Result;
use crate::models::Project;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GitLabProjectDto {
    pub id: u64,
    pub name_with_namespace: String,
}

impl From<GitLabProjectDto> for Project {
    fn from(dto: GitLabProjectDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name_with_namespace,
        }
    }
}

impl GitLabClient {
    /// Fetch a single project
    pub async fn fetch_project(&self, project_id: u64) -> Result<GitLabProjectDto> {
        self.get(&format!("projects/{project_id}"), &[]).await
    }

    /// Fetch every project of a group, subgroups included
    pub async fn fetch_group_projects(&self, group_id: u64) -> Result<Vec<GitLabProjectDto>> {
        self.paginate(
            &format!("groups/{group_id}/projects"),
            &[("include_subgroups", "true".to_string())],
            PagePolicy::AbortOnError,
        )
        .await
    }

    /// Fetch every project visible to the configured token
    pub async fn fetch_all_projects(&self) -> Result<Vec<GitLabProjectDto>> {
        self.paginate(
            "projects",
            &[("simple", "true".to_string())],
            PagePolicy::AbortOnError,
        )
        .await
    }
}
