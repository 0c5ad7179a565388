//! End-to-end tests for segment delivery over HTTP.

mod common;

use common::TestHarness;
use sc_core::events::EventPayload;
use sc_core::StreamId;
use sc_hls::StreamHandle;

#[tokio::test]
async fn serves_segment_and_playlist() {
    let (h, addr) = TestHarness::with_server().await;
    h.register("s1");
    h.write_segment("s1", "output.m3u8", b"#EXTM3U\n");
    h.write_segment("s1", "output-0.ts", b"segment-zero");

    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{addr}/hls/s1/output.m3u8"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"],
        "application/vnd.apple.mpegurl"
    );
    assert_eq!(resp.text().await.unwrap(), "#EXTM3U\n");

    let resp = client
        .get(format!("http://{addr}/hls/s1/output-0.ts"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"segment-zero");
}

#[tokio::test]
async fn late_segment_polls_until_written() {
    let (h, addr) = TestHarness::with_server().await;
    let stream = h.register("s1");
    stream.mark_segment_created(2);
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/hls/s1/output-3.ts");

    // First poll creates the marker.
    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    assert!(h.lock_exists("s1", "output-3.ts"));

    // Second poll sees the marker.
    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "segment_pending");

    // Transcoder catches up.
    h.write_segment("s1", "output-3.ts", b"three");
    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"three");
    assert!(!h.lock_exists("s1", "output-3.ts"));

    assert_eq!(stream.info().reset_count, 0);
    assert!(h.ctx.event_bus.recent_events(10).is_empty());
}

#[tokio::test]
async fn seek_past_window_resets_once() {
    let (h, addr) = TestHarness::with_server().await;
    let stream = h.register("s1");
    stream.mark_segment_created(4);
    let mut rx = h.ctx.event_bus.subscribe();
    let client = reqwest::Client::new();

    // Default window: 10 segments of 6 s.
    let resp = client
        .get(format!("http://{addr}/hls/s1/output-50.ts"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "stream_reset");

    let event = rx.recv().await.unwrap();
    assert_eq!(
        event.payload,
        EventPayload::StreamReset {
            start_time: 300.0,
            stream_id: StreamId::from("s1"),
        }
    );
    assert!(stream.is_resetting());

    // While resetting every missing segment is a plain 404.
    let resp = client
        .get(format!("http://{addr}/hls/s1/output-51.ts"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "stream_resetting");

    // Repeat poll of the reset segment sees its marker.
    let resp = client
        .get(format!("http://{addr}/hls/s1/output-50.ts"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    assert_eq!(stream.info().reset_count, 1);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn transcoder_output_after_reset_is_served() {
    let (h, addr) = TestHarness::with_server().await;
    let stream = h.register("s1");
    stream.mark_segment_created(0);
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{addr}/hls/s1/output-30.ts"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);

    // The restarted encode begins five segments early.
    assert_eq!(stream.info().start_ordinal, 25);
    h.write_segment("s1", "output-30.ts", b"thirty");
    stream.mark_segment_created(30);
    assert!(!stream.is_resetting());

    let resp = client
        .get(format!("http://{addr}/hls/s1/output-30.ts"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(!h.lock_exists("s1", "output-30.ts"));
}

#[tokio::test]
async fn unknown_stream_is_server_error() {
    let (h, addr) = TestHarness::with_server().await;
    std::fs::create_dir_all(h.root().join("ghost")).unwrap();

    let resp = reqwest::get(format!("http://{addr}/hls/ghost/output-1.ts"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "unknown_stream");
}

#[tokio::test]
async fn missing_playlist_is_pending_even_for_unknown_stream() {
    let (h, addr) = TestHarness::with_server().await;
    std::fs::create_dir_all(h.root().join("ghost")).unwrap();

    let resp = reqwest::get(format!("http://{addr}/hls/ghost/output.m3u8"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn concurrent_polls_publish_at_most_one_reset() {
    let (h, addr) = TestHarness::with_server().await;
    let stream = h.register("s1");
    stream.mark_segment_created(0);
    let client = reqwest::Client::new();

    let requests: Vec<_> = (0..10)
        .map(|_| {
            let client = client.clone();
            let url = format!("http://{addr}/hls/s1/output-90.ts");
            tokio::spawn(async move { client.get(url).send().await.unwrap().status() })
        })
        .collect();

    let mut server_errors = 0;
    for r in requests {
        if r.await.unwrap() == 500 {
            server_errors += 1;
        }
    }

    assert_eq!(server_errors, 1);
    assert_eq!(h.ctx.event_bus.recent_events(10).len(), 1);
    assert_eq!(stream.info().reset_count, 1);
}

#[tokio::test]
async fn traversal_is_rejected() {
    let (_h, addr) = TestHarness::with_server().await;

    let resp = reqwest::get(format!("http://{addr}/hls/s1/..%2Fsecret.ts"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn successful_delivery_touches_stream() {
    let (h, addr) = TestHarness::with_server().await;
    let stream = h.register("s1");
    let before = stream.info().last_seen;
    h.write_segment("s1", "output-0.ts", b"x");

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let resp = reqwest::get(format!("http://{addr}/hls/s1/output-0.ts"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(stream.info().last_seen > before);
}
