//! Event-set reconciliation
//!
//! Set-diff between a freshly parsed feed and the persisted events of one
//! source, keyed by `(uid, recurrence_id)`. Unchanged events produce no
//! mutation, so the counts reflect real upstream changes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hearth_domain::{
    CalendarEvent, EventChangeSet, EventContent, EventKey, EventTiming, ParsedEvent, SourceId,
};
use tracing::debug;

const FIELD_SEPARATOR: &[u8] = &[0x1f];

/// Compute the create/update/delete operations for one source.
///
/// An empty `parsed` set is a legitimate empty feed and deletes every
/// persisted event; callers must not pass an empty set for a failed parse.
/// When a feed repeats a key, the last occurrence wins.
pub fn reconcile(
    source_id: SourceId,
    parsed: Vec<ParsedEvent>,
    persisted: &[CalendarEvent],
    now: DateTime<Utc>,
) -> EventChangeSet {
    let mut incoming: BTreeMap<EventKey, EventContent> = BTreeMap::new();
    for event in parsed {
        if incoming.insert(event.key, event.content).is_some() {
            debug!(source_id = %source_id, "duplicate event key in feed, keeping last occurrence");
        }
    }

    let existing: BTreeMap<&EventKey, &CalendarEvent> =
        persisted.iter().map(|event| (&event.key, event)).collect();

    let mut changes = EventChangeSet::default();

    for (key, content) in incoming.iter() {
        let hash = content_hash(content);
        match existing.get(key) {
            None => changes.to_create.push(CalendarEvent {
                source_id,
                key: key.clone(),
                content: content.clone(),
                content_hash: hash,
                first_seen_at: now,
                updated_at: now,
            }),
            Some(current) if current.content_hash != hash => {
                changes.to_update.push(CalendarEvent {
                    source_id,
                    key: key.clone(),
                    content: content.clone(),
                    content_hash: hash,
                    first_seen_at: current.first_seen_at,
                    updated_at: now,
                })
            }
            Some(_) => {}
        }
    }

    changes.to_delete = existing
        .keys()
        .filter(|key| !incoming.contains_key(**key))
        .map(|key| (*key).clone())
        .collect();

    changes
}

/// Stable blake3 digest over the canonical content fields.
pub fn content_hash(content: &EventContent) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(content.title.as_bytes());
    hasher.update(FIELD_SEPARATOR);
    match &content.timing {
        EventTiming::Timed { start, end } => {
            hasher.update(b"timed");
            hasher.update(FIELD_SEPARATOR);
            hasher.update(start.to_rfc3339().as_bytes());
            hasher.update(FIELD_SEPARATOR);
            hasher.update(end.to_rfc3339().as_bytes());
        }
        EventTiming::AllDay { start, end } => {
            hasher.update(b"all_day");
            hasher.update(FIELD_SEPARATOR);
            hasher.update(start.to_string().as_bytes());
            hasher.update(FIELD_SEPARATOR);
            hasher.update(end.to_string().as_bytes());
        }
    }
    hasher.update(FIELD_SEPARATOR);
    match &content.location {
        Some(location) => {
            hasher.update(b"L");
            hasher.update(location.as_bytes());
        }
        None => {
            hasher.update(b"-");
        }
    }
    hasher.finalize().to_hex().to_string()
}
