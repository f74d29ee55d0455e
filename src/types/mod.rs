//! Core domain types: identifiers and status enums.

mod ids;
mod status;

pub use ids::{
    CommitId, DeliveryId, FileId, HookId, RemoteId, RepoFullName, RepositoryId, Sha, UserId,
    VersionId,
};
pub use status::{ChangeType, Permission, SubscriptionStatus, SyncStatus, VersionStatus};
