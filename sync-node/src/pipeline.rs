//! The aggregation pipeline.
//!
//! Raw semantic events collected over one window go through move
//! inference once, then every subscribed listener sees the aggregated
//! batch. Listeners are where downstream synchronization triggers attach.

use std::sync::Arc;
use sync_core::{MoveAggregator, VersionLookup};
use sync_types::SemanticEvent;

/// Receives the aggregated batch of each window.
pub trait EventListener: Send + Sync {
    /// Called once per aggregation window with the aggregator's output.
    fn on_events(&self, batch: &[SemanticEvent]);
}

/// Runs move inference over each window and fans the result out.
pub struct EventPipeline<V> {
    aggregator: MoveAggregator<V>,
    listeners: Vec<Arc<dyn EventListener>>,
}

impl<V: VersionLookup> EventPipeline<V> {
    /// Create a pipeline enriching deletes from `versions`.
    pub fn new(versions: V) -> Self {
        Self {
            aggregator: MoveAggregator::new(versions),
            listeners: Vec::new(),
        }
    }

    /// Subscribe a listener to aggregated batches.
    pub fn subscribe(&mut self, listener: Arc<dyn EventListener>) {
        self.listeners.push(listener);
    }

    /// Process one window's raw events and return the aggregated batch.
    pub fn process_window(&self, raw: Vec<SemanticEvent>) -> Vec<SemanticEvent> {
        let batch = self.aggregator.aggregate(raw);
        tracing::debug!(events = batch.len(), "aggregation window closed");
        for listener in &self.listeners {
            listener.on_events(&batch);
        }
        batch
    }
}
