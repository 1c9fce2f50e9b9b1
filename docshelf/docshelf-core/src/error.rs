//! Error kinds shared across the engines.
//!
//! Validation failures (move cycles, follow invariants, alert windows) get
//! their own variants so callers can react to them differently than to a
//! generic service failure.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("node not found: {0}")]
    NotFound(Uuid),
    #[error("target parent is not a folder")]
    NotAFolder,
    #[error("a node cannot be moved into itself")]
    MoveIntoSelf,
    #[error("a folder cannot be moved into its own descendant")]
    MoveIntoDescendant,
    #[error("only files can be followed")]
    NotAFile,
    #[error("already following this document")]
    AlreadyFollowing,
    #[error("not following this document")]
    NotFollowing,
    #[error("the owner of a document cannot unfollow it")]
    OwnerUnfollow,
    #[error("only the owner may manage followers")]
    NotOwner,
    #[error("alert window must be at most {max} days, got {got}")]
    AlertWindowOutOfRange { got: u16, max: u16 },
    #[error("no account matches email {0}")]
    UnknownEmail(String),
    #[error("permission denied")]
    PermissionDenied,
    #[error(transparent)]
    Service(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
