//! The repository mirror store: relational entities and the in-memory store
//! that holds them.

pub mod entities;
pub mod mirror;

pub use entities::{
    Branch, CodeVersion, Collaborator, Commit, File, FileChange, LastCommit, NewCommit,
    NewFileChange, NewRepository, NewVersion, Repository, VersionStats, WebhookSubscription,
};
pub use mirror::{BranchUpdate, MirrorStore, StoreError};
