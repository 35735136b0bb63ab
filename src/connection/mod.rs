//! User-facing connection handle

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::driver::Driver;
use crate::registry::ParameterRegistry;
use crate::store::ParameterStore;
use crate::stream::CoalesceExt;
use crate::transport::Transport;
use crate::types::{ConnectionState, ParameterSample, StatsSnapshot, StreamEvent, TextLine, UpdateRate};
use crate::{Result, StreamError};


/// A running connection to an ECU bridge
///
/// Owns the driver tasks. Every stream handed out ends once the connection
/// is disconnected, whether by request or by a transport failure. Dropping
/// the handle cancels the tasks without waiting for them.
pub struct StreamConnection {
    /// Template receiver; every subscription resubscribes from it
    events: broadcast::Receiver<StreamEvent>,

    stats: watch::Receiver<StatsSnapshot>,

    state: watch::Receiver<ConnectionState>,

    store: Arc<ParameterStore>,

    registry: Arc<ParameterRegistry>,

    /// Cancellation token for stopping tasks
    cancel: CancellationToken,

    tasks: Vec<JoinHandle<()>>,

    shutdown_timeout: Duration,
}

impl StreamConnection {
    /// Start streaming from `transport`.
    ///
    /// The configuration is validated first; nothing is spawned if it is
    /// rejected.
    pub async fn open<T: Transport>(transport: T, config: StreamConfig) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(config.registry()?);

        let channels = Driver::spawn(transport, &config, Arc::clone(&registry));
        info!(
            parameters = registry.len(),
            requests = config.requests_enabled,
            "Stream connection established"
        );

        Ok(Self {
            events: channels.events.subscribe(),
            stats: channels.stats,
            state: channels.state,
            store: channels.store,
            registry,
            cancel: channels.cancel,
            tasks: channels.tasks,
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    /// Every event, ending after [`StreamEvent::Disconnected`].
    ///
    /// A subscriber that falls more than the event capacity behind skips the
    /// oldest events (logged) rather than stalling the draining task.
    pub fn events(&self) -> impl Stream<Item = StreamEvent> + Send + 'static {
        BroadcastStream::new(self.events.resubscribe()).filter_map(|result| async move {
            match result {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, skipped {} events", skipped);
                    None
                }
            }
        })
    }

    /// All decoded samples, optionally rate limited per parameter.
    pub fn samples(&self, rate: UpdateRate) -> BoxStream<'static, Arc<ParameterSample>> {
        let samples = self.events().filter_map(|event| async move {
            match event {
                StreamEvent::Sample(sample) => Some(sample),
                _ => None,
            }
        });

        match rate.interval() {
            None => samples.boxed(),
            Some(period) => samples.coalesce(period).boxed(),
        }
    }

    /// Samples of one parameter.
    ///
    /// Fails if `tag` is not registered, since no sample could ever arrive.
    pub fn subscribe(&self, tag: u32, rate: UpdateRate) -> Result<BoxStream<'static, Arc<ParameterSample>>> {
        if !self.registry.contains(tag) {
            return Err(StreamError::config_error(
                "subscribe",
                format!("tag {:#010x} is not a registered parameter", tag),
            ));
        }

        let samples = self.events().filter_map(move |event| async move {
            match event {
                StreamEvent::Sample(sample) if sample.tag == tag => Some(sample),
                _ => None,
            }
        });

        Ok(match rate.interval() {
            None => samples.boxed(),
            Some(period) => samples.coalesce(period).boxed(),
        })
    }

    /// Debug text printed by the device.
    pub fn text_lines(&self) -> impl Stream<Item = Arc<TextLine>> + Send + 'static {
        self.events().filter_map(|event| async move {
            match event {
                StreamEvent::Text(line) => Some(line),
                _ => None,
            }
        })
    }

    /// Stats snapshots; yields the current snapshot first.
    pub fn stats_updates(&self) -> impl Stream<Item = StatsSnapshot> + 'static {
        WatchStream::new(self.stats.clone())
    }

    /// State changes; yields the current state first.
    pub fn state_updates(&self) -> impl Stream<Item = ConnectionState> + 'static {
        WatchStream::new(self.state.clone())
    }

    pub fn stats(&self) -> StatsSnapshot {
        *self.stats.borrow()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state(), ConnectionState::Connected | ConnectionState::Draining)
    }

    /// Most recent sample for `tag`.
    pub fn latest(&self, tag: u32) -> Option<ParameterSample> {
        self.store.latest(tag)
    }

    /// Latest sample of every parameter seen so far, ordered by tag.
    pub fn latest_all(&self) -> Vec<ParameterSample> {
        self.store.latest_all()
    }

    /// Recent samples for `tag`, oldest first.
    pub fn history(&self, tag: u32) -> Vec<ParameterSample> {
        self.store.history(tag)
    }

    pub fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    /// Wait until the state becomes `Disconnected`.
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        // Err means the draining task is gone, which only happens after it
        // has published Disconnected
        let _ = state.wait_for(|s| *s == ConnectionState::Disconnected).await;
    }

    /// Stop both tasks and release the transport.
    ///
    /// Waits at most the configured shutdown timeout; tasks still running
    /// after that are aborted and [`StreamError::Timeout`] is returned.
    /// Returns the final stats snapshot otherwise.
    pub async fn disconnect(mut self) -> Result<StatsSnapshot> {
        info!("Disconnecting stream connection");
        self.cancel.cancel();

        let tasks = std::mem::take(&mut self.tasks);
        let aborts: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();
        let joined = tokio::time::timeout(self.shutdown_timeout, futures::future::join_all(tasks)).await;

        match joined {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        warn!("Driver task ended abnormally: {}", e);
                    }
                }
                debug!("Driver tasks joined");
                Ok(self.stats())
            }
            Err(_) => {
                warn!("Driver tasks did not stop within {:?}, aborting", self.shutdown_timeout);
                for abort in aborts {
                    abort.abort();
                }
                Err(StreamError::Timeout { duration: self.shutdown_timeout })
            }
        }
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        debug!("Dropping stream connection");
        // Cancel tasks on drop for clean shutdown
        self.cancel.cancel();
    }
}
