//! Move inference over one aggregation window.
//!
//! The watcher pipeline reports a move as a delete at the old path followed
//! by a create at the new one. Within a window, a delete and a create that
//! carry the same content hash are two halves of one move; this module
//! merges them and leaves every ambiguous case untouched.
//!
//! Filenames are deliberately not part of the grouping key: two files can
//! swap names inside one window, and only content identity can safely link
//! a deletion to the resulting creation.

use sync_types::{ContentHash, FileMove, SemanticEvent};

use crate::lookup::VersionLookup;

/// Merges matching delete+create pairs in a batch of semantic events.
///
/// Hash-less deletes are first enriched from the version history; a failed
/// lookup is not an error, the event simply cannot take part in move
/// inference.
pub struct MoveAggregator<V> {
    versions: V,
}

impl<V: VersionLookup> MoveAggregator<V> {
    /// Create an aggregator reading last-version hashes from `versions`.
    pub fn new(versions: V) -> Self {
        Self { versions }
    }

    /// Transform one window's batch.
    ///
    /// The result is sorted by timestamp (ties keep arrival order) and
    /// contains every input event except delete+create pairs that were
    /// replaced by a synthesized [`SemanticEvent::Move`].
    pub fn aggregate(&self, mut events: Vec<SemanticEvent>) -> Vec<SemanticEvent> {
        events.sort_by_key(|e| e.timestamp());

        let enriched: Vec<SemanticEvent> = events.into_iter().map(|e| self.enrich(e)).collect();

        // Buckets keyed by hash, in first-seen order so equal timestamps
        // stay deterministic through the final sort. Windows are small;
        // the linear key scan is fine.
        let mut buckets: Vec<(Option<ContentHash>, Vec<SemanticEvent>)> = Vec::new();
        for event in enriched {
            let key = event.hash();
            match buckets.iter_mut().find(|(k, _)| *k == key) {
                Some((_, bucket)) => bucket.push(event),
                None => buckets.push((key, vec![event])),
            }
        }

        let mut out = Vec::new();
        for (_, bucket) in buckets {
            merge_bucket(bucket, &mut out);
        }

        out.sort_by_key(|e| e.timestamp());
        out
    }

    /// Fill in a hash-less delete from the version history.
    fn enrich(&self, event: SemanticEvent) -> SemanticEvent {
        match event {
            SemanticEvent::Delete(mut change) if change.hash.is_none() => {
                match self.versions.last_version_hash(&change.path) {
                    Ok(hash) => change.hash = Some(hash),
                    Err(err) => {
                        tracing::debug!(path = %change.path, %err, "delete enrichment failed, event stays hash-less");
                    }
                }
                SemanticEvent::Delete(change)
            }
            other => other,
        }
    }
}

/// Apply the merge rules to one hash bucket, appending results to `out`.
fn merge_bucket(bucket: Vec<SemanticEvent>, out: &mut Vec<SemanticEvent>) {
    if bucket.len() < 2 {
        out.extend(bucket);
        return;
    }

    // Modifies and moves are never merged further.
    let mut deletes = Vec::new();
    let mut creates = Vec::new();
    for event in bucket {
        match event {
            SemanticEvent::Delete(change) => deletes.push(change),
            SemanticEvent::Create(change) => creates.push(change),
            other => out.push(other),
        }
    }

    // Exactly one delete and one create can be attributed to each other,
    // and only when the delete strictly precedes the create. More of
    // either kind is ambiguous: everything passes through, nothing is
    // dropped. Hash-less pairs never merge (no content identity to link
    // them).
    if deletes.len() == 1 && creates.len() == 1 {
        if let Some(hash) = creates[0].hash {
            if deletes[0].timestamp < creates[0].timestamp {
                let create = creates.pop().expect("checked length");
                let delete = deletes.pop().expect("checked length");
                out.push(SemanticEvent::Move(FileMove {
                    path: delete.path,
                    dest: create.path,
                    name: create.name,
                    hash,
                    timestamp: create.timestamp,
                }));
            }
        }
    }

    out.extend(deletes.into_iter().map(SemanticEvent::Delete));
    out.extend(creates.into_iter().map(SemanticEvent::Create));
}
