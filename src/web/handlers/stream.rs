//! Dataset replay endpoint

use crate::state::AppState;
use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::stream::StreamExt;
use std::convert::Infallible;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

/// Replay the dataset from row zero, one `data:` event per row.
pub async fn stream_rows(State(state): State<AppState>) -> Response {
    let connection_id = Uuid::new_v4();
    tracing::info!("📡 SSE connection established: {}", connection_id);

    let handle = state.replay.spawn(connection_id);
    let stream = ReceiverStream::new(handle.receiver)
        .map(|event| Ok::<Event, Infallible>(event.to_sse_event()));

    let sse = Sse::new(stream);
    match state.config.keep_alive() {
        Some(interval) => sse
            .keep_alive(KeepAlive::new().interval(interval))
            .into_response(),
        None => sse.into_response(),
    }
}
