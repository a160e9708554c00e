//! Client-side reconciliation of the three message sources.
//!
//! A conversation view receives the same logical message up to three
//! times: as the optimistic local echo appended the instant a send is
//! accepted, as part of a history fetch, and as a push-delivered event.
//! The echo carries a client-generated provisional id and a best-guess
//! timestamp, so until the durable write completes there is no shared id
//! to deduplicate on: two records are the same logical message when they
//! agree on sender, recipient, and content and their epoch timestamps lie
//! within [`DEDUP_WINDOW_MS`]. History rows are additionally bucketed by
//! whole-second truncation to absorb sub-second jitter between duplicate
//! writes.
//!
//! Ordering within the view is strictly by `epoch_ms` ascending, never by
//! arrival order: push delivery may race ahead of or behind the history
//! fetch. Day separators are placed wherever the civil date changes
//! between consecutive messages.

use std::collections::HashSet;

use crate::logging::civil_date;
use crate::store::MessageRecord;

/// Two records within this many milliseconds of each other can be the
/// same logical message.
pub const DEDUP_WINDOW_MS: i64 = 2_000;

/// One message as shown in a conversation view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewMessage {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    pub epoch_ms: i64,
    /// Still a local echo; cleared when the durable record arrives.
    pub provisional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewItem {
    DaySeparator { year: i64, month: u64, day: u64 },
    Message(ViewMessage),
}

fn day_of(epoch_ms: i64) -> (i64, u64, u64) {
    civil_date(epoch_ms.div_euclid(1000).max(0) as u64)
}

fn durable_id(msg: &MessageRecord) -> String {
    format!("m-{}-{}", msg.sender_id, msg.epoch_ms)
}

fn same_logical(entry: &ViewMessage, msg: &MessageRecord) -> bool {
    entry.sender_id == msg.sender_id
        && entry.recipient_id == msg.recipient_id
        && entry.content == msg.content
        && (entry.epoch_ms - msg.epoch_ms).abs() < DEDUP_WINDOW_MS
}

/// Per-session reconciler: one open conversation view at a time plus the
/// per-peer unread flags.
///
/// Unread state is ephemeral: held only by the live client
/// session, set when a push arrives for a peer whose conversation is not
/// open, and cleared the instant that conversation opens. The
/// server-side last-read marker is the persistent counterpart.
pub struct ChatReconciler {
    me: String,
    open_peer: Option<String>,
    entries: Vec<ViewMessage>,
    unread: HashSet<String>,
    next_echo: u64,
}

impl ChatReconciler {
    pub fn new(me: &str) -> Self {
        Self {
            me: me.to_string(),
            open_peer: None,
            entries: Vec::new(),
            unread: HashSet::new(),
            next_echo: 1,
        }
    }

    pub fn open_peer(&self) -> Option<&str> {
        self.open_peer.as_deref()
    }

    /// Open the conversation with `peer`, seeding the view from a history
    /// fetch. Any previous view is discarded wholesale so nothing leaks
    /// between peers, and the unread flag for `peer` clears immediately.
    pub fn open_conversation(&mut self, peer: &str, history: &[MessageRecord]) {
        self.entries.clear();
        self.open_peer = Some(peer.to_string());
        self.unread.remove(peer);
        self.merge_history(history);
    }

    /// Close the current view. Subsequent push events for this peer set
    /// the unread flag again.
    pub fn close_conversation(&mut self) {
        self.open_peer = None;
        self.entries.clear();
    }

    /// Append the optimistic echo for a send the server just accepted.
    /// Returns the provisional id, or `None` when no conversation is open.
    pub fn local_echo(&mut self, content: &str, epoch_ms: i64) -> Option<String> {
        let peer = self.open_peer.clone()?;
        let id = format!("echo-{}", self.next_echo);
        self.next_echo += 1;
        self.entries.push(ViewMessage {
            id: id.clone(),
            sender_id: self.me.clone(),
            recipient_id: peer,
            content: content.to_string(),
            epoch_ms,
            provisional: true,
        });
        self.resort();
        Some(id)
    }

    /// Handle a push-delivered message. Merges into the open view when it
    /// belongs there; otherwise flags the sending peer as unread.
    pub fn on_push(&mut self, msg: &MessageRecord) {
        let peer = if msg.sender_id == self.me {
            msg.recipient_id.clone()
        } else {
            msg.sender_id.clone()
        };
        if self.open_peer.as_deref() == Some(peer.as_str()) {
            self.absorb(msg);
            self.resort();
        } else if msg.recipient_id == self.me {
            self.unread.insert(peer);
        }
    }

    /// Merge a (re-)fetched history into the open view.
    ///
    /// History is authoritative for ordering. Duplicate rows inside the
    /// fetch itself are grouped by (sender, recipient, content,
    /// whole-second bucket) before the per-record merge.
    pub fn merge_history(&mut self, history: &[MessageRecord]) {
        if self.open_peer.is_none() {
            return;
        }
        let mut seen_buckets: HashSet<(String, String, String, i64)> = HashSet::new();
        let mut deduped: Vec<&MessageRecord> = Vec::new();
        for msg in history {
            let bucket = (
                msg.sender_id.clone(),
                msg.recipient_id.clone(),
                msg.content.clone(),
                msg.epoch_ms.div_euclid(1000),
            );
            if seen_buckets.insert(bucket) {
                deduped.push(msg);
            }
        }
        for msg in deduped {
            self.absorb(msg);
        }
        self.resort();
    }

    /// Merge one durable record into the entries, replacing a matching
    /// local echo or dropping the record when it is already present.
    fn absorb(&mut self, msg: &MessageRecord) {
        if let Some(existing) = self.entries.iter_mut().find(|e| same_logical(e, msg)) {
            if existing.provisional {
                // The durable record supersedes the echo: adopt its id and
                // authoritative timestamp.
                existing.id = durable_id(msg);
                existing.epoch_ms = msg.epoch_ms;
                existing.provisional = false;
            }
            return;
        }
        self.entries.push(ViewMessage {
            id: durable_id(msg),
            sender_id: msg.sender_id.clone(),
            recipient_id: msg.recipient_id.clone(),
            content: msg.content.clone(),
            epoch_ms: msg.epoch_ms,
            provisional: false,
        });
    }

    fn resort(&mut self) {
        self.entries
            .sort_by(|a, b| a.epoch_ms.cmp(&b.epoch_ms).then_with(|| a.id.cmp(&b.id)));
    }

    /// The ordered view: messages ascending by `epoch_ms` with a day
    /// separator wherever the civil date changes between consecutive
    /// messages.
    pub fn view(&self) -> Vec<ViewItem> {
        let mut items = Vec::with_capacity(self.entries.len());
        let mut prev_day: Option<(i64, u64, u64)> = None;
        for entry in &self.entries {
            let day = day_of(entry.epoch_ms);
            if prev_day.is_some() && prev_day != Some(day) {
                items.push(ViewItem::DaySeparator {
                    year: day.0,
                    month: day.1,
                    day: day.2,
                });
            }
            prev_day = Some(day);
            items.push(ViewItem::Message(entry.clone()));
        }
        items
    }

    /// Messages currently in the open view, in order.
    pub fn messages(&self) -> &[ViewMessage] {
        &self.entries
    }

    pub fn has_unread(&self, peer: &str) -> bool {
        self.unread.contains(peer)
    }

    pub fn unread_peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.unread.iter().cloned().collect();
        peers.sort();
        peers
    }
}
