//! Collaborator ports supplied by the host application
//!
//! The engine owns no OS notification facility, no persistent storage and no
//! wall clock of its own; hosts implement these traits and hand them to the
//! trigger service. All port methods that touch I/O are async.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::Event;
use crate::state::{CampaignStateSnapshot, QueuedMessage};

/// Current-time source
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// One entry in the host scheduler's live listing
#[derive(Debug, Clone, PartialEq)]
pub struct PendingNotification {
    /// Queued-message id (the engine's id is carried through to the OS entry)
    pub id: String,
    pub campaign_id: String,
    pub execute_at: DateTime<Utc>,
}

/// The host's local-notification facility
///
/// `list_pending` is the reconciliation source of truth: the engine's
/// queued-message ledger is only a cache of what this scheduler holds.
#[async_trait]
pub trait MessageScheduler: Send + Sync {
    /// Schedule a local notification for the message's execute time
    async fn schedule(&self, message: &QueuedMessage) -> Result<()>;

    /// Cancel a previously scheduled notification by id
    async fn cancel(&self, message_id: &str) -> Result<()>;

    /// List notifications currently pending in the OS scheduler
    async fn list_pending(&self) -> Result<Vec<PendingNotification>>;
}

/// Host key-value persistence for the state aggregate
///
/// The store is non-transactional; the trigger service serializes all
/// load-mutate-save cycles so no cross-key atomicity is required here.
#[async_trait]
pub trait CampaignStateRepository: Send + Sync {
    /// Load the snapshot, creating an empty one on first use
    async fn load_snapshot(&self, now: DateTime<Utc>) -> Result<CampaignStateSnapshot>;

    /// Persist the snapshot
    async fn save_snapshot(&self, snapshot: &CampaignStateSnapshot) -> Result<()>;

    /// Drop all persisted campaign state
    async fn clear_campaign_state(&self) -> Result<()>;

    /// Append a tracked event to the host's event log, if it keeps one
    async fn append_event(&self, _event: &Event) -> Result<()> {
        Ok(())
    }
}

/// Host-side app foreground state
#[async_trait]
pub trait LifecycleStateReader: Send + Sync {
    async fn is_foregrounded(&self) -> bool;

    async fn set_foregrounded(&self, foregrounded: bool);
}
