#![allow(dead_code)]

use futures::StreamExt;
use pdm_data_api::{web, AppState, DatasetLoader, StreamerConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::Instant;

pub const SENSOR_CSV: &str = "\
Timestamp,Machine_ID,Vibration_X,Bearing_Temperature,Alarm_Count_24hr,Failure_Within_24h
2024-03-01 08:00:00,M001,0.512,61.2,0,0
2024-03-01 08:01:00,M002,0.498,,2,0
2024-03-01 08:02:00,M003,0.731,74.9,5,1
2024-03-01 08:03:00,M004,0.455,58.0,1,0
";

/// Serve `csv` on an ephemeral port with the given replay interval.
pub async fn spawn_server(csv: &str, interval: Duration) -> SocketAddr {
    let config = StreamerConfig {
        interval_secs: interval.as_secs_f64(),
        ..StreamerConfig::default()
    };
    spawn_server_with(csv, config).await
}

/// Serve `csv` on an ephemeral port; `config`'s host and port are ignored.
pub async fn spawn_server_with(csv: &str, config: StreamerConfig) -> SocketAddr {
    let dataset = DatasetLoader::from_reader(csv.as_bytes()).expect("fixture csv");
    let state = AppState::new(config, dataset.into_shared());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        web::serve(listener, state).await.expect("server");
    });
    addr
}

/// A `data:` payload and when it arrived.
#[derive(Debug)]
pub struct ReceivedEvent {
    pub data: String,
    pub at: Instant,
}

/// Everything read from one stream response.
#[derive(Debug, Default)]
pub struct StreamCapture {
    pub events: Vec<ReceivedEvent>,
    /// Lines starting with `:` (keep-alive comments).
    pub comments: usize,
}

/// Read the whole stream, splitting it into SSE events.
pub async fn collect_events(addr: SocketAddr) -> Vec<ReceivedEvent> {
    collect_stream(addr).await.events
}

pub async fn collect_stream(addr: SocketAddr) -> StreamCapture {
    let response = reqwest::get(format!("http://{addr}/api/stream"))
        .await
        .expect("request");
    assert!(response.status().is_success());
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"), "got {content_type}");

    let mut body = response.bytes_stream();
    let mut buffer = String::new();
    let mut capture = StreamCapture::default();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.expect("chunk");
        buffer.push_str(std::str::from_utf8(&chunk).expect("utf-8"));

        while let Some(end) = buffer.find("\n\n") {
            let block: String = buffer.drain(..end + 2).collect();
            capture.comments += block.lines().filter(|line| line.starts_with(':')).count();
            let data: Vec<&str> = block
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
                .collect();
            if !data.is_empty() {
                capture.events.push(ReceivedEvent {
                    data: data.join("\n"),
                    at: Instant::now(),
                });
            }
        }
    }
    capture
}
