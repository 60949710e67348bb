use anyhow::Result;
use std::time::Duration;

use axum::{middleware, response::IntoResponse, routing::get, Extension, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::info;

use super::session::{attach_session, Session};
use super::{log_requests, metrics::metrics_handler, state::ServerState, ServerConfig};
use axum::extract::State;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub logged_in: bool,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(
    session: Option<Extension<Session>>,
    State(state): State<ServerState>,
) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        logged_in: session.is_some(),
    };
    Json(stats)
}

/// Owns the HTTP router. Other components mount their routes on it before
/// it starts serving.
pub struct HttpServer {
    state: ServerState,
    routes: Router,
}

impl HttpServer {
    pub fn new(config: ServerConfig) -> Self {
        let state = ServerState::new(config);
        let routes = Router::new().route("/", get(home)).with_state(state.clone());
        Self { state, routes }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    pub fn merge(&mut self, routes: Router) {
        self.routes = std::mem::take(&mut self.routes).merge(routes);
    }

    /// The complete application, with session and logging middleware applied
    /// to every mounted route.
    pub fn into_router(self) -> Router {
        self.routes
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                attach_session,
            ))
            .layer(middleware::from_fn_with_state(self.state, log_requests))
    }

    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!("Serving on {}", addr);
        }
        Ok(axum::serve(listener, self.into_router()).await?)
    }
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serve Prometheus metrics on their own port.
pub async fn run_metrics_server(port: u16) -> Result<()> {
    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Metrics available at port {}!", port);
    Ok(axum::serve(listener, make_metrics_app()).await?)
}
