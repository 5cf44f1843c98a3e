//! Workspace domain: memberships, restricted mode and the cascade rule.

mod cascade;
mod membership;

pub use cascade::{decide as decide_cascade, CascadeDecision, HolderCoverage};
pub use membership::{Privilege, Workspace, WorkspaceMembership};
