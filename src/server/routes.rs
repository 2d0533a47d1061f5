//! HTTP routes
//!
//! Every path answers `GET` with an event stream fed by the hub. The
//! handler starts [`stream_events`] on its own task over a [`BodySink`] and
//! returns the response that task produces, so the HTTP connection dropping
//! the body is what ends the subscription.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, MethodRouter};
use axum::Router;

use crate::error::Error;
use crate::hub::Hub;
use crate::server::adapter::stream_events;
use crate::server::sink::BodySink;
use crate::stats::ServerStats;

#[derive(Clone)]
struct EventsState {
    hub: Hub,
    stats: Arc<ServerStats>,
}

/// Router serving the hub's event stream on every path
///
/// Can be merged or nested into a larger axum application.
pub fn router(hub: Hub) -> Router {
    routes(hub, Arc::new(ServerStats::new()))
}

pub(crate) fn routes(hub: Hub, stats: Arc<ServerStats>) -> Router {
    let stream: MethodRouter<EventsState> = get(events).fallback(method_not_allowed);

    Router::new()
        .route("/", stream.clone())
        .route("/{*path}", stream)
        .with_state(EventsState { hub, stats })
}

async fn events(State(state): State<EventsState>) -> Response {
    let (mut sink, response) = BodySink::new();
    let disconnected = sink.disconnected();

    tokio::spawn(async move {
        let result = stream_events(&state.hub, &mut sink, Some(disconnected)).await;
        state.stats.add_bytes_sent(sink.bytes_sent());

        match result {
            Ok(()) => {}
            Err(e @ (Error::Transport(_) | Error::Hub(_))) => {
                state.stats.connection_rejected();
                tracing::debug!(error = %e, "Event stream refused");
            }
            Err(e) => tracing::debug!(error = %e, "Event stream ended"),
        }
    });

    match response.await {
        Ok(response) => response,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn method_not_allowed(State(state): State<EventsState>) -> impl IntoResponse {
    state.stats.connection_rejected();
    (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed\n")
}
