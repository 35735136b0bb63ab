//! Observer interface for processed stream output

use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::trace;

use crate::store::ParameterStore;
use crate::types::{ParameterSample, StatsSnapshot, StreamEvent, TextLine};

/// Receives everything the processor carves out of the stream.
///
/// All methods default to doing nothing so implementors only pick what they
/// need.
pub trait StreamSink {
    fn on_text_line(&mut self, _line: &TextLine) {}

    fn on_parameter_sample(&mut self, _sample: &ParameterSample) {}

    fn on_stats_snapshot(&mut self, _snapshot: &StatsSnapshot) {}
}

/// Sink used by the draining task.
///
/// Records samples in the shared [`ParameterStore`], publishes every item
/// on the event broadcast and keeps the stats watch current.
pub struct ChannelSink {
    events: broadcast::Sender<StreamEvent>,
    stats: watch::Sender<StatsSnapshot>,
    store: Arc<ParameterStore>,
}

impl ChannelSink {
    pub fn new(
        events: broadcast::Sender<StreamEvent>,
        stats: watch::Sender<StatsSnapshot>,
        store: Arc<ParameterStore>,
    ) -> Self {
        Self { events, stats, store }
    }

    /// Publish the terminal event.
    pub fn disconnected(&self, reason: Option<String>) {
        self.publish(StreamEvent::Disconnected { reason });
    }

    fn publish(&self, event: StreamEvent) {
        // No subscribers is fine; observers come and go.
        if self.events.send(event).is_err() {
            trace!("No event subscribers");
        }
    }
}

impl StreamSink for ChannelSink {
    fn on_text_line(&mut self, line: &TextLine) {
        self.publish(StreamEvent::Text(Arc::new(line.clone())));
    }

    fn on_parameter_sample(&mut self, sample: &ParameterSample) {
        self.store.record(sample);
        self.publish(StreamEvent::Sample(Arc::new(sample.clone())));
    }

    fn on_stats_snapshot(&mut self, snapshot: &StatsSnapshot) {
        self.stats.send_replace(*snapshot);
        self.publish(StreamEvent::Stats(*snapshot));
    }
}
