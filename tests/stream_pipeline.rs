//! End-to-end tests: transport in, samples and requests out.

use canstream::codec::{READ_REQUEST, encode_response};
use canstream::framing::{SENTINEL, WIRE_FRAME_SIZE, encode_frame};
use canstream::registry::{CURRENT_GEAR, FLUID_TEMPERATURE, VEHICLE_SPEED};
use canstream::transports::{MemoryTransport, ReplayTransport};
use canstream::{
    BinaryMessage, ByteOrder, CanStream, ConnectionState, StreamConfig, StreamEvent, UpdateRate,
};
use futures::StreamExt;
use std::io::Write;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};

fn response(tag: u32, value: f32, request_id: u8, order: ByteOrder) -> Vec<u8> {
    let data = encode_response(value, 1, request_id, order);
    encode_frame(&BinaryMessage::new(tag, 0, data)).to_vec()
}

fn fast_config() -> StreamConfig {
    StreamConfig {
        poll_interval_ms: 1,
        stats_interval_ms: 20,
        request_interval_ms: 40,
        inter_request_delay_ms: 2,
        ..StreamConfig::default()
    }
}

/// What the bench bridge prints during one polling cycle.
fn capture(cycles: usize) -> Vec<u8> {
    let mut out = b"ParameterRegistry: 3 parameters registered\r\n".to_vec();
    for i in 0..cycles {
        let id = (i % 255) as u8 + 1;
        out.extend_from_slice(b"SerialBridge: Sending binary response\n");
        // Some firmware builds send big-endian floats
        out.extend(response(FLUID_TEMPERATURE, 150.0 + i as f32, id, ByteOrder::Big));
        out.extend(response(VEHICLE_SPEED, 45.0, id, ByteOrder::Little));
        out.extend_from_slice(b"MessageBus: tick\n");
        out.extend(response(CURRENT_GEAR, 3.0, id, ByteOrder::Little));
    }
    out
}

#[tokio::test]
async fn capture_replay_recovers_every_sample() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(&capture(20))?;

    // Odd chunk size so frames straddle poll boundaries
    let transport = ReplayTransport::open(file.path(), 7, Duration::ZERO)?;
    let config = StreamConfig { requests_enabled: false, ..fast_config() };
    let connection = CanStream::attach(transport, config).await?;
    let events = connection.events();
    futures::pin_mut!(events);

    let mut samples = Vec::new();
    let mut texts = 0;
    let mut reason = None;
    while let Some(event) = timeout(Duration::from_secs(5), events.next()).await? {
        match event {
            StreamEvent::Sample(sample) => samples.push(sample),
            StreamEvent::Text(_) => texts += 1,
            StreamEvent::Stats(_) => {}
            StreamEvent::Disconnected { reason: r } => reason = r,
        }
    }

    assert_eq!(samples.len(), 60);
    assert_eq!(texts, 1 + 20 * 2);
    assert_eq!(reason.as_deref(), Some("transport closed"));
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    let temps: Vec<_> = samples.iter().filter(|s| s.tag == FLUID_TEMPERATURE).collect();
    assert_eq!(temps.len(), 20);
    assert!(temps.iter().all(|s| s.byte_order == ByteOrder::Big));
    assert_eq!(temps.last().map(|s| s.value), Some(169.0));

    let stats = connection.stats().stats;
    assert_eq!(stats.successful_responses, 60);
    assert_eq!(stats.decode_errors, 0);
    assert_eq!(stats.resync_drops, 0);
    assert_eq!(connection.history(FLUID_TEMPERATURE).len(), 20);
    Ok(())
}

#[tokio::test]
async fn responses_match_outstanding_request_ids() -> anyhow::Result<()> {
    let (transport, handle) = MemoryTransport::pair();
    let connection = CanStream::attach(transport, fast_config()).await?;
    let mut samples = connection.samples(UpdateRate::Native);

    // Wait for one full request cycle
    let deadline = Instant::now() + Duration::from_secs(2);
    while handle.write_count() < 3 && Instant::now() < deadline {
        sleep(Duration::from_millis(2)).await;
    }
    let requests: Vec<_> = handle.writes().into_iter().take(3).collect();
    assert_eq!(requests.len(), 3);

    // Play the ECU: answer each request with its own id
    for request in &requests {
        assert_eq!(request.len(), WIRE_FRAME_SIZE);
        assert_eq!(&request[..2], &SENTINEL);
        let tag = u32::from_le_bytes([request[2], request[3], request[4], request[5]]);
        let data = &request[14..22];
        assert_eq!(request[13], 8);
        assert_eq!(data[0], READ_REQUEST);
        assert_eq!(data[5], 1, "sender channel");
        let value = if tag == FLUID_TEMPERATURE { 200.0 } else { 5.0 };
        handle.push(response(tag, value, data[6], ByteOrder::Little));
    }

    let mut answered = Vec::new();
    for _ in 0..3 {
        let sample = timeout(Duration::from_secs(2), samples.next()).await?.expect("sample");
        answered.push((sample.tag, sample.request_id));
    }
    answered.sort();
    let mut expected: Vec<_> = requests
        .iter()
        .map(|r| (u32::from_le_bytes([r[2], r[3], r[4], r[5]]), r[20]))
        .collect();
    expected.sort();
    assert_eq!(answered, expected);

    let stats = connection.disconnect().await?;
    assert!(stats.stats.requests_sent >= 3);
    Ok(())
}

#[tokio::test]
async fn garbage_between_frames_is_survived() -> anyhow::Result<()> {
    let (transport, handle) = MemoryTransport::pair();
    let config = StreamConfig { requests_enabled: false, ..fast_config() };
    let connection = CanStream::attach(transport, config).await?;
    let mut gear = connection.subscribe(CURRENT_GEAR, UpdateRate::Native)?;

    let mut corrupt = response(CURRENT_GEAR, 1.0, 1, ByteOrder::Little);
    corrupt[13] = 0xEE; // length field
    handle.push(corrupt);
    handle.push(&b"\x00\x01noise"[..]);
    handle.push(response(CURRENT_GEAR, 2.0, 2, ByteOrder::Little));

    let sample = timeout(Duration::from_secs(2), gear.next()).await?.expect("sample");
    assert_eq!(sample.value, 2.0);
    assert_eq!(sample.request_id, 2);

    connection.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn transport_failure_ends_connection() -> anyhow::Result<()> {
    let (transport, handle) = MemoryTransport::pair();
    let connection = CanStream::attach(transport, fast_config()).await?;
    let mut state = Box::pin(connection.state_updates());

    assert_eq!(state.next().await, Some(ConnectionState::Connected));
    handle.fail("USB device re-enumerated");

    let next = timeout(Duration::from_secs(2), state.next()).await?;
    assert_eq!(next, Some(ConnectionState::Disconnected));
    assert!(!connection.is_connected());

    // Shutdown after a failure is still clean
    connection.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn disconnect_is_bounded_by_shutdown_timeout() -> anyhow::Result<()> {
    let (transport, handle) = MemoryTransport::pair();
    let config = StreamConfig { shutdown_timeout_ms: 200, ..fast_config() };
    let connection = CanStream::attach(transport, config).await?;
    handle.push(capture(5));
    sleep(Duration::from_millis(20)).await;

    let started = Instant::now();
    connection.disconnect().await?;
    assert!(started.elapsed() < Duration::from_millis(300));
    Ok(())
}
