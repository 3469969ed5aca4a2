//! Persisted campaign state aggregate and its mutation operations
//!
//! The snapshot is the single shared mutable resource of the engine. It is
//! loaded, mutated in place during one evaluation, and saved through the
//! repository port. Every operation here is a pure in-memory mutation; no
//! operation performs I/O.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::TriggerType;

/// Maximum trigger-history rows retained (oldest dropped first)
///
/// Only the rolling frequency cap reads this ledger, so a short bound is
/// sufficient for any realistic cap window.
pub const MAX_TRIGGER_HISTORY: usize = 200;

/// The full persisted mutable state of all campaigns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignStateSnapshot {
    /// One record per campaign ever triggered
    pub campaign_states: HashMap<String, CampaignProgress>,
    /// Local cache of what the host scheduler should contain
    pub queued_messages: Vec<QueuedMessage>,
    /// Append-only ledger feeding the rolling frequency cap
    pub trigger_history: Vec<TriggerHistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mutable per-campaign progress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignProgress {
    /// Latched true for one-shot trigger types; always false for recurring
    pub triggered: bool,
    pub delivery_count: u32,
    pub last_triggered_at: Option<DateTime<Utc>>,
    /// Recurring only: seed for future occurrence math
    pub anchor: Option<DateTime<Utc>>,
    /// Recurring only: the last occurrence handed to the scheduler
    pub last_scheduled_at: Option<DateTime<Utc>>,
}

/// One locally scheduled message not yet resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub id: String,
    pub campaign_id: String,
    pub channel: crate::models::ChannelType,
    pub title: String,
    pub body: String,
    pub media_url: Option<String>,
    pub link_url: Option<String>,
    pub execute_at: DateTime<Utc>,
    pub trigger_type: TriggerType,
    /// Originating event, for event-triggered campaigns
    pub event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One (campaign, triggered-at) row in the frequency-cap ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerHistoryEntry {
    pub campaign_id: String,
    pub triggered_at: DateTime<Utc>,
}

impl CampaignStateSnapshot {
    /// Create an empty snapshot (first load)
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            campaign_states: HashMap::new(),
            queued_messages: Vec::new(),
            trigger_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Progress record for a campaign, if it ever triggered
    pub fn progress(&self, campaign_id: &str) -> Option<&CampaignProgress> {
        self.campaign_states.get(campaign_id)
    }

    /// Count history entries with `triggered_at >= since`, across all campaigns
    pub fn triggers_since(&self, since: DateTime<Utc>) -> usize {
        self.trigger_history
            .iter()
            .filter(|entry| entry.triggered_at >= since)
            .count()
    }

    /// The queued message for an exact (campaign, execute time) pair
    pub fn queued_at(&self, campaign_id: &str, execute_at: DateTime<Utc>) -> Option<&QueuedMessage> {
        self.queued_messages
            .iter()
            .find(|m| m.campaign_id == campaign_id && m.execute_at == execute_at)
    }

    /// The first queued message for a campaign firing strictly after `now`
    pub fn future_queued(&self, campaign_id: &str, now: DateTime<Utc>) -> Option<&QueuedMessage> {
        self.queued_messages
            .iter()
            .find(|m| m.campaign_id == campaign_id && m.execute_at > now)
    }

    /// Record a successful schedule call for a campaign
    ///
    /// Latches the one-shot `triggered` flag for event/scheduled campaigns,
    /// records the recurring anchor/occurrence seed, appends to the
    /// frequency-cap ledger (bounded) and upserts the queued-message ledger.
    pub fn record_trigger(
        &mut self,
        message: QueuedMessage,
        anchor: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) {
        let progress = self
            .campaign_states
            .entry(message.campaign_id.clone())
            .or_default();

        match message.trigger_type {
            TriggerType::Event | TriggerType::Scheduled => progress.triggered = true,
            TriggerType::Recurring => {
                progress.triggered = false;
                progress.anchor = anchor.or(progress.anchor);
                progress.last_scheduled_at = Some(message.execute_at);
            }
        }
        progress.delivery_count += 1;
        progress.last_triggered_at = Some(now);

        self.push_history(TriggerHistoryEntry {
            campaign_id: message.campaign_id.clone(),
            triggered_at: now,
        });
        self.upsert_queued(message);
        self.updated_at = now;
    }

    /// Append a history row, dropping the oldest beyond the bound
    pub fn push_history(&mut self, entry: TriggerHistoryEntry) {
        self.trigger_history.push(entry);
        if self.trigger_history.len() > MAX_TRIGGER_HISTORY {
            let excess = self.trigger_history.len() - MAX_TRIGGER_HISTORY;
            self.trigger_history.drain(..excess);
        }
    }

    /// Insert or replace the row for the message's (campaign, execute time)
    ///
    /// Invariant: at most one queued message per (campaign id, fire time).
    pub fn upsert_queued(&mut self, message: QueuedMessage) {
        if let Some(existing) = self
            .queued_messages
            .iter_mut()
            .find(|m| m.campaign_id == message.campaign_id && m.execute_at == message.execute_at)
        {
            *existing = message;
        } else {
            self.queued_messages.push(message);
        }
    }

    /// Remove a queued message by id; returns the removed row
    pub fn remove_queued(&mut self, message_id: &str) -> Option<QueuedMessage> {
        let idx = self.queued_messages.iter().position(|m| m.id == message_id)?;
        Some(self.queued_messages.remove(idx))
    }

    /// Retain only queued messages whose ids appear in `live_ids`
    ///
    /// Returns the ids of the dropped rows. This is the local half of
    /// reconciliation; the host scheduler's listing is the source of truth.
    pub fn retain_queued(&mut self, live_ids: &[String]) -> Vec<String> {
        let mut dropped = Vec::new();
        self.queued_messages.retain(|m| {
            if live_ids.iter().any(|id| *id == m.id) {
                true
            } else {
                dropped.push(m.id.clone());
                false
            }
        });
        dropped
    }

    /// Un-latch a campaign's one-shot flag after a cancellation
    pub fn unlatch(&mut self, campaign_id: &str) {
        if let Some(progress) = self.campaign_states.get_mut(campaign_id) {
            progress.triggered = false;
        }
    }

    /// Clear all three ledgers (full-state reset)
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.campaign_states.clear();
        self.queued_messages.clear();
        self.trigger_history.clear();
        self.updated_at = now;
    }
}
