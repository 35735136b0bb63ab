//! Driver spawns and manages the stream processing tasks

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::codec::{ParameterCodec, RequestIdSequence};
use crate::config::StreamConfig;
use crate::processor::StreamProcessor;
use crate::registry::ParameterRegistry;
use crate::sink::ChannelSink;
use crate::store::ParameterStore;
use crate::transport::Transport;
use crate::types::{ConnectionState, StatsSnapshot, StreamEvent};

/// Result of spawning driver tasks
pub struct DriverChannels {
    /// Sender side of the event broadcast, for creating subscribers
    pub events: broadcast::Sender<StreamEvent>,
    /// Receiver for stats snapshots
    pub stats: watch::Receiver<StatsSnapshot>,
    /// Receiver for connection state changes
    pub state: watch::Receiver<ConnectionState>,
    /// Latest values and history, written by the draining task
    pub store: Arc<ParameterStore>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    /// Draining task first, then the request task if one was started
    pub tasks: Vec<JoinHandle<()>>,
}

/// Timing for the draining task
struct DrainTiming {
    poll_interval: Duration,
    stats_interval: Duration,
}

/// Timing and codec for the request task
struct RequestPlan {
    codec: ParameterCodec,
    tags: Vec<u32>,
    request_interval: Duration,
    inter_request_delay: Duration,
}

/// Driver spawns and manages stream processing tasks
///
/// Spawns a draining task that owns the processor and a request task that
/// polls every registered parameter. Both share the transport and stop on
/// the same cancellation token. A fatal transport error in either task ends
/// the connection; nothing is retried.
pub struct Driver;

impl Driver {
    /// Spawn driver tasks for the given transport
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T>(transport: T, config: &StreamConfig, registry: Arc<ParameterRegistry>) -> DriverChannels
    where
        T: Transport,
    {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let (stats_tx, stats_rx) = watch::channel(StatsSnapshot::default());

        let store = Arc::new(ParameterStore::new(config.history_len));
        let cancel = CancellationToken::new();

        let transport = Arc::new(Mutex::new(transport));
        let requests_sent = Arc::new(AtomicU64::new(0));
        // Request task reports fatal write failures here
        let (failure_tx, failure_rx) = mpsc::channel::<String>(1);

        let codec = ParameterCodec::new(registry).with_sender_channel(config.sender_channel);
        let mut processor = StreamProcessor::new(codec.clone(), config.buffer_capacity);
        processor.connect();
        let (state_tx, state_rx) = watch::channel(processor.state());
        let sink = ChannelSink::new(event_tx.clone(), stats_tx, Arc::clone(&store));

        let mut tasks = Vec::with_capacity(2);

        let drain_transport = Arc::clone(&transport);
        let drain_requests = Arc::clone(&requests_sent);
        let drain_cancel = cancel.clone();
        let timing =
            DrainTiming { poll_interval: config.poll_interval(), stats_interval: config.stats_interval() };
        tasks.push(tokio::spawn(async move {
            Self::drain_task(
                drain_transport,
                processor,
                sink,
                state_tx,
                drain_requests,
                failure_rx,
                timing,
                drain_cancel,
            )
            .await;
        }));

        if config.requests_enabled {
            let plan = RequestPlan {
                tags: codec.registry().tags().collect(),
                codec,
                request_interval: config.request_interval(),
                inter_request_delay: config.inter_request_delay(),
            };
            let request_cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                Self::request_task(transport, plan, requests_sent, failure_tx, request_cancel).await;
            }));
        } else {
            debug!("Request task disabled by configuration");
        }

        DriverChannels { events: event_tx, stats: stats_rx, state: state_rx, store, cancel, tasks }
    }

    /// Draining task - polls the transport and runs the processor
    #[allow(clippy::too_many_arguments)]
    async fn drain_task<T>(
        transport: Arc<Mutex<T>>,
        mut processor: StreamProcessor,
        mut sink: ChannelSink,
        state_tx: watch::Sender<ConnectionState>,
        requests_sent: Arc<AtomicU64>,
        mut failures: mpsc::Receiver<String>,
        timing: DrainTiming,
        cancel: CancellationToken,
    ) where
        T: Transport,
    {
        info!("Draining task started");

        let mut stats_ticker = interval_at(Instant::now() + timing.stats_interval, timing.stats_interval);
        stats_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reason = loop {
            // Use select to allow cancellation and stats emission while polling
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Draining task cancelled");
                    break None;
                }
                Some(reason) = failures.recv() => break Some(reason),
                _ = stats_ticker.tick() => {
                    processor.set_requests_sent(requests_sent.load(Ordering::Relaxed));
                    let snapshot = processor.emit_snapshot(&mut sink);
                    trace!("Stats: {} frames/s, {} samples", snapshot.frames_per_second, snapshot.stats.successful_responses);
                    continue;
                }
                polled = Self::poll_once(&transport) => polled,
            };

            match polled {
                Ok((bytes, open)) => {
                    if !bytes.is_empty() {
                        processor.ingest(&bytes, &mut sink);
                    }
                    if !open {
                        warn!("Transport closed after {} bytes", processor.stats().bytes_received);
                        break Some("transport closed".to_string());
                    }
                    if bytes.is_empty() {
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                info!("Draining task cancelled while idle");
                                break None;
                            }
                            _ = sleep(timing.poll_interval) => {}
                        }
                    }
                }
                Err(e) => {
                    error!("Transport error: {}", e);
                    break Some(e.to_string());
                }
            }
        };

        processor.set_requests_sent(requests_sent.load(Ordering::Relaxed));
        processor.emit_snapshot(&mut sink);
        processor.disconnect();
        state_tx.send_replace(ConnectionState::Disconnected);
        sink.disconnected(reason);

        // Stop the request task too
        cancel.cancel();
        info!("Draining task ended");
    }

    async fn poll_once<T: Transport>(transport: &Mutex<T>) -> crate::Result<(bytes::Bytes, bool)> {
        let mut transport = transport.lock().await;
        let bytes = transport.poll_available().await?;
        Ok((bytes, transport.is_open()))
    }

    /// Request task - asks for every registered parameter once per cycle
    async fn request_task<T>(
        transport: Arc<Mutex<T>>,
        plan: RequestPlan,
        requests_sent: Arc<AtomicU64>,
        failures: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) where
        T: Transport,
    {
        info!("Request task started ({} parameters)", plan.tags.len());
        let mut ids = RequestIdSequence::new();
        let mut cycle = interval(plan.request_interval);
        cycle.set_missed_tick_behavior(MissedTickBehavior::Delay);

        'cycles: loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = cycle.tick() => {}
            }

            for (i, &tag) in plan.tags.iter().enumerate() {
                if i > 0 {
                    tokio::select! {
                        _ = cancel.cancelled() => break 'cycles,
                        _ = sleep(plan.inter_request_delay) => {}
                    }
                }

                let request_id = ids.next_id();
                let frame = plan.codec.request_frame(tag, request_id, epoch_millis());

                let result = tokio::select! {
                    _ = cancel.cancelled() => break 'cycles,
                    result = async { transport.lock().await.write(&frame).await } => result,
                };

                match result {
                    Ok(()) => {
                        requests_sent.fetch_add(1, Ordering::Relaxed);
                        debug!(tag = format!("{:#010x}", tag), request_id, "Sent read request");
                    }
                    Err(e) => {
                        error!("Request write failed: {}", e);
                        let _ = failures.try_send(format!("request write failed: {}", e));
                        break 'cycles;
                    }
                }
            }
        }

        info!("Request task ended ({} requests sent)", requests_sent.load(Ordering::Relaxed));
    }
}

/// Low 32 bits of milliseconds since the Unix epoch
fn epoch_millis() -> u32 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u32).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CURRENT_GEAR, FLUID_TEMPERATURE, VEHICLE_SPEED};
    use crate::test_utils::{mixed_stream, response_frame};
    use crate::transports::MemoryTransport;

    fn fast_config() -> StreamConfig {
        StreamConfig {
            poll_interval_ms: 1,
            stats_interval_ms: 20,
            request_interval_ms: 50,
            inter_request_delay_ms: 1,
            ..StreamConfig::default()
        }
    }

    async fn wait_for_state(
        state: &mut watch::Receiver<ConnectionState>,
        wanted: ConnectionState,
    ) -> ConnectionState {
        let reached = async { state.wait_for(|s| *s == wanted).await.map(|_| ()) };
        let _ = tokio::time::timeout(Duration::from_secs(2), reached).await;
        *state.borrow()
    }

    #[tokio::test]
    async fn samples_reach_store_and_events() {
        let _ = tracing_subscriber::fmt::try_init();
        let (transport, handle) = MemoryTransport::pair();
        let channels = Driver::spawn(transport, &fast_config(), Arc::new(ParameterRegistry::default()));
        let mut events = channels.events.subscribe();

        handle.push(mixed_stream(1));

        let mut samples = 0;
        while samples < 3 {
            match tokio::time::timeout(Duration::from_secs(2), events.recv()).await {
                Ok(Ok(StreamEvent::Sample(_))) => samples += 1,
                Ok(Ok(_)) => {}
                other => panic!("expected samples, got {other:?}"),
            }
        }

        for tag in [FLUID_TEMPERATURE, CURRENT_GEAR, VEHICLE_SPEED] {
            assert!(channels.store.latest(tag).is_some(), "missing {tag:#x}");
        }
        channels.cancel.cancel();
    }

    #[tokio::test]
    async fn requests_are_written_for_every_tag() {
        let (transport, handle) = MemoryTransport::pair();
        let channels = Driver::spawn(transport, &fast_config(), Arc::new(ParameterRegistry::default()));

        let deadline = Instant::now() + Duration::from_secs(2);
        while handle.write_count() < 3 && Instant::now() < deadline {
            sleep(Duration::from_millis(5)).await;
        }

        let writes = handle.writes();
        assert!(writes.len() >= 3);
        let ids: Vec<u8> = writes.iter().take(3).map(|w| w[2 + 12 + 6]).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(writes.iter().all(|w| w.len() == crate::framing::WIRE_FRAME_SIZE));
        channels.cancel.cancel();
    }

    #[tokio::test]
    async fn transport_failure_disconnects() {
        let (transport, handle) = MemoryTransport::pair();
        let mut channels = Driver::spawn(transport, &fast_config(), Arc::new(ParameterRegistry::default()));
        let mut events = channels.events.subscribe();

        handle.push(response_frame(CURRENT_GEAR, 3.0, 9));
        handle.fail("cable pulled");

        let state = wait_for_state(&mut channels.state, ConnectionState::Disconnected).await;
        assert_eq!(state, ConnectionState::Disconnected);
        assert!(channels.cancel.is_cancelled());

        let mut reason = None;
        while let Ok(event) = events.try_recv() {
            if let StreamEvent::Disconnected { reason: r } = event {
                reason = r;
            }
        }
        assert!(reason.is_some_and(|r| r.contains("cable pulled")));
    }

    #[tokio::test]
    async fn clean_close_disconnects() {
        let (transport, handle) = MemoryTransport::pair();
        let config = StreamConfig { requests_enabled: false, ..fast_config() };
        let mut channels = Driver::spawn(transport, &config, Arc::new(ParameterRegistry::default()));
        assert_eq!(channels.tasks.len(), 1);

        handle.push(response_frame(VEHICLE_SPEED, 30.0, 1));
        handle.close();

        let state = wait_for_state(&mut channels.state, ConnectionState::Disconnected).await;
        assert_eq!(state, ConnectionState::Disconnected);
        assert_eq!(channels.store.latest(VEHICLE_SPEED).map(|s| s.value), Some(30.0));
        assert_eq!(handle.write_count(), 0);
    }

    #[tokio::test]
    async fn stats_snapshots_are_published() {
        let (transport, handle) = MemoryTransport::pair();
        let mut channels = Driver::spawn(transport, &fast_config(), Arc::new(ParameterRegistry::default()));
        handle.push(mixed_stream(2));

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            channels.stats.wait_for(|s| s.stats.successful_responses == 6 && s.stats.requests_sent > 0),
        )
        .await;
        assert!(matches!(result, Ok(Ok(_))), "stats never caught up");
        channels.cancel.cancel();
    }
}
