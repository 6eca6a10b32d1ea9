mod core;
mod pagination;
mod pipelines;
mod projects;

pub use self::core::GitLabClient;
pub use pipelines::{GitLabJobDto, GitLabPipelineDto};
