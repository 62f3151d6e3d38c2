//! End-to-end tests for the dual reader poller.
//!
//! Two mock readers feed a poller running on tokio's paused clock, so the
//! cooldown window, stagger delay and poll interval are exercised without
//! real waiting.

use std::time::Duration;

use kartscan_core::{SourceId, TagId};
use kartscan_hardware::AnyTransport;
use kartscan_hardware::mock::{MockTransport, MockTransportHandle};
use kartscan_reader::{ChannelSink, DualReaderPoller, MemorySink, PollerConfig};
use tokio_util::sync::CancellationToken;

fn tag(s: &str) -> TagId {
    TagId::new(s).unwrap()
}

/// Helper function to build a poller with two mock readers.
fn dual_poller(
    config: PollerConfig,
) -> (
    DualReaderPoller<MemorySink>,
    MemorySink,
    MockTransportHandle,
    MockTransportHandle,
) {
    let sink = MemorySink::new();
    let mut poller = DualReaderPoller::new(config, sink.clone()).unwrap();

    let (reader1, handle1) = MockTransport::new("reader1");
    let (reader2, handle2) = MockTransport::new("reader2");
    poller
        .add_source(SourceId::new("reader1").unwrap(), Some(AnyTransport::from(reader1)))
        .unwrap();
    poller
        .add_source(SourceId::new("reader2").unwrap(), Some(AnyTransport::from(reader2)))
        .unwrap();

    (poller, sink, handle1, handle2)
}

#[tokio::test(start_paused = true)]
async fn test_same_tag_on_both_readers_yields_one_event() {
    let (mut poller, sink, reader1, reader2) = dual_poller(PollerConfig::default());

    reader1.present_tag(&tag("AABBCCDDEE")).unwrap();
    poller.poll_cycle().await;

    tokio::time::advance(Duration::from_millis(500)).await;
    reader2.present_tag(&tag("AABBCCDDEE")).unwrap();
    poller.poll_cycle().await;

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source.as_str(), "reader1");
    assert_eq!(events[0].tag.as_str(), "AABBCCDDEE");

    let stats = poller.stats();
    assert_eq!(stats.source("reader2").unwrap().tags_suppressed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_tag_accepted_again_after_window() {
    let (mut poller, sink, reader1, reader2) = dual_poller(PollerConfig::default());

    reader1.present_tag(&tag("AABBCCDDEE")).unwrap();
    poller.poll_cycle().await;

    tokio::time::advance(Duration::from_secs(3)).await;
    reader2.present_tag(&tag("AABBCCDDEE")).unwrap();
    poller.poll_cycle().await;

    let sources: Vec<_> = sink.events().iter().map(|e| e.source.to_string()).collect();
    assert_eq!(sources, vec!["reader1", "reader2"]);
}

#[tokio::test(start_paused = true)]
async fn test_distinct_tags_in_same_cycle() {
    let (mut poller, sink, reader1, reader2) = dual_poller(PollerConfig::default());

    reader1.present_tag(&tag("1111111111")).unwrap();
    reader2.present_tag(&tag("2222222222")).unwrap();

    let published = poller.poll_cycle().await;
    assert_eq!(published.len(), 2);
    assert_eq!(sink.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_lingering_tag_fires_once_per_window() {
    let (mut poller, sink, reader1, _reader2) = dual_poller(PollerConfig::default());

    // Tag held on reader 1 for 7 seconds, one frame per 50ms cycle
    for _ in 0..140 {
        reader1.present_tag(&tag("1A2B3C4D5E")).unwrap();
        poller.poll_cycle().await;
        tokio::time::advance(Duration::from_millis(40)).await;
    }

    // Accepted at 0s, 3s and 6s
    assert_eq!(sink.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_overflow_on_one_reader_does_not_affect_other() {
    let (mut poller, sink, reader1, reader2) = dual_poller(PollerConfig::default());

    reader2.send_bytes(vec![0xFF; 150]).unwrap();
    reader1.present_tag(&tag("1A2B3C4D5E")).unwrap();
    poller.poll_cycle().await;

    assert_eq!(reader2.resets(), 1);
    assert_eq!(sink.len(), 1);

    // Reader 2 reads normally after the reset
    reader2.present_tag(&tag("AABBCCDDEE")).unwrap();
    poller.poll_cycle().await;
    assert_eq!(sink.len(), 2);

    let stats = poller.stats();
    assert_eq!(stats.source("reader2").unwrap().overflow_resets, 1);
}

#[tokio::test(start_paused = true)]
async fn test_unplugged_reader_keeps_loop_alive() {
    let (mut poller, sink, reader1, reader2) = dual_poller(PollerConfig::default());

    reader1.unplug().unwrap();
    for _ in 0..3 {
        poller.poll_cycle().await;
    }
    reader2.present_tag(&tag("AABBCCDDEE")).unwrap();
    poller.poll_cycle().await;

    assert_eq!(sink.len(), 1);
    let stats = poller.stats();
    assert_eq!(stats.source("reader1").unwrap().degraded_cycles, 4);
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_runs_on_schedule() {
    let config = PollerConfig {
        cleanup_cycles: 10,
        ..PollerConfig::default()
    };
    let (mut poller, _sink, reader1, _reader2) = dual_poller(config);

    reader1.present_tag(&tag("1A2B3C4D5E")).unwrap();
    poller.poll_cycle().await;
    assert_eq!(poller.cooldown().len(), 1);

    tokio::time::advance(Duration::from_secs(4)).await;
    for _ in 0..8 {
        poller.poll_cycle().await;
    }
    assert_eq!(poller.cooldown().len(), 1);

    // Tenth cycle evicts the stale entry
    poller.poll_cycle().await;
    assert!(poller.cooldown().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_on_cancel_and_closes_readers() {
    let (sink, mut rx) = ChannelSink::new(16);
    let mut poller = DualReaderPoller::new(PollerConfig::default(), sink).unwrap();

    let (reader1, handle1) = MockTransport::new("reader1");
    poller
        .add_source(SourceId::new("reader1").unwrap(), Some(AnyTransport::from(reader1)))
        .unwrap();
    poller
        .add_source(SourceId::new("reader2").unwrap(), None)
        .unwrap();

    let shutdown = CancellationToken::new();
    let driver = async {
        handle1.present_tag(&tag("AABBCCDDEE")).unwrap();
        let event = rx.recv().await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        shutdown.cancel();
        event
    };
    let (stats, event) = tokio::join!(poller.run(shutdown.clone()), driver);

    assert_eq!(event.tag.as_str(), "AABBCCDDEE");
    assert!(stats.cycles >= 5);
    assert_eq!(stats.events_published(), 1);
    assert!(handle1.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_reader_faster_than_polling_loses_no_tags() {
    let (mut poller, sink, reader1, _reader2) = dual_poller(PollerConfig::default());
    let tags: Vec<TagId> = (0..120u32).map(|i| tag(&format!("{i:010X}"))).collect();

    // Three frames (42 bytes) per cycle, under the overflow threshold
    for burst in tags.chunks(3) {
        for t in burst {
            reader1.present_tag(t).unwrap();
        }
        poller.poll_cycle().await;
    }
    let framer = poller.sources()[0].framer();
    assert!(framer.stats().overflows > 0);
    assert!(framer.buffered() <= framer.config().max_buffer);

    // One tag leaves the framer per cycle; the backlog drains in order
    for _ in 0..80 {
        poller.poll_cycle().await;
    }

    let published: Vec<TagId> = sink.events().into_iter().map(|e| e.tag).collect();
    assert_eq!(published, tags);
    assert_eq!(poller.stats().source("reader1").unwrap().overflow_resets, 0);
}
