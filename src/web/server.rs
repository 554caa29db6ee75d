use crate::state::AppState;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("🌐 Stream server listening on http://{}/api/stream", listener.local_addr()?);

    serve(listener, state).await
}

/// Serve on an already bound listener.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, create_app(state)).await?;
    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(crate::web::routes::create_routes(state))
        .layer(TraceLayer::new_for_http())
}
