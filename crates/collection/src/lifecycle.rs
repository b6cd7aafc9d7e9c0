//! Collection status and the transitions allowed between statuses.

use std::fmt;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Status of a collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionStatus {
    /// Created, sync not started.
    Idle,
    /// Sync started, initial data not yet marked ready.
    Loading,
    /// Sync marked the collection ready.
    Ready,
    /// An unrecoverable error occurred.
    Error,
    /// State cleared after garbage collection or an explicit cleanup.
    CleanedUp,
}

impl CollectionStatus {
    /// Returns true if `self -> to` is an allowed transition.
    pub fn can_transition_to(self, to: CollectionStatus) -> bool {
        use CollectionStatus::*;
        match self {
            Idle => matches!(to, Loading | Error | CleanedUp),
            Loading => matches!(to, Ready | Error | CleanedUp),
            Ready => matches!(to, CleanedUp | Error),
            Error => matches!(to, CleanedUp | Idle),
            CleanedUp => matches!(to, Loading | Error),
        }
    }

    /// Mutations are rejected in these statuses.
    pub fn rejects_mutations(self) -> bool {
        matches!(self, CollectionStatus::Error | CollectionStatus::CleanedUp)
    }
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CollectionStatus::Idle => "idle",
            CollectionStatus::Loading => "loading",
            CollectionStatus::Ready => "ready",
            CollectionStatus::Error => "error",
            CollectionStatus::CleanedUp => "cleaned-up",
        })
    }
}

/// Tracks the current status of one collection.
#[derive(Debug)]
pub struct Lifecycle {
    collection: String,
    status: CollectionStatus,
}

impl Lifecycle {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            status: CollectionStatus::Idle,
        }
    }

    #[inline]
    pub fn status(&self) -> CollectionStatus {
        self.status
    }

    /// Moves to `to`, failing on a transition the status graph does not
    /// allow. Transitioning to the current status is a no-op.
    pub fn transition(&mut self, to: CollectionStatus) -> Result<()> {
        if self.status == to {
            return Ok(());
        }
        if !self.status.can_transition_to(to) {
            return Err(Error::InvalidStatusTransition {
                collection: self.collection.clone(),
                from: self.status,
                to,
            });
        }
        tracing::debug!(collection = %self.collection, from = %self.status, to = %to, "status change");
        self.status = to;
        Ok(())
    }

    pub fn check_mutable(&self) -> Result<()> {
        if self.status.rejects_mutations() {
            return Err(Error::CollectionInErrorState {
                collection: self.collection.clone(),
                status: self.status,
            });
        }
        Ok(())
    }
}
