mod core;
mod projects;
mod usage;

pub use self::core::GitLabProvider;
pub use usage::UsageProgress;
