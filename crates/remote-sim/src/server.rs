use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Form, Router,
};
use rand::Rng;
use remote_proto::protocol::{paths, ActionList, StatusResponse, RESYNC_ACTION_ID};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

use crate::state::Simulation;

#[derive(Debug, Clone, Copy, Default)]
pub struct SimOptions {
    /// Probability in `0.0..=1.0` that a status request fails with 503.
    pub failure_rate: f64,
}

#[derive(Clone)]
struct HttpState {
    sim: Arc<RwLock<Simulation>>,
    options: SimOptions,
}

#[derive(Deserialize)]
struct StatusQuery {
    #[serde(rename = "actionId")]
    action_id: Option<i64>,
}

type Fields = Form<HashMap<String, String>>;

pub fn router(sim: Arc<RwLock<Simulation>>, options: SimOptions) -> Router {
    Router::new()
        .route(paths::STATUS, get(get_status))
        .route(paths::ACTION_LIST, get(list_actions))
        .route(paths::ACTION_DO, post(do_action))
        .route(paths::LOCATION_LIST, get(list_locations))
        .route(paths::LOCATION_SET, post(set_location))
        .route(paths::FOV, post(set_fov))
        .route(paths::TIME, post(set_time))
        .layer(CorsLayer::permissive())
        .with_state(HttpState { sim, options })
}

/// Bind `addr` and serve in the background.  Returns the bound address, so
/// port 0 can be used to pick a free port.
pub async fn start_server(
    addr: SocketAddr,
    sim: Arc<RwLock<Simulation>>,
    options: SimOptions,
) -> anyhow::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!("simulator listening on http://{}", local);

    let app = router(sim, options);
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("simulator server error: {}", e);
        }
    });
    Ok((local, handle))
}

fn should_fail(rate: f64) -> bool {
    rate > 0.0 && rand::thread_rng().gen_bool(rate.clamp(0.0, 1.0))
}

async fn get_status(
    State(state): State<HttpState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, StatusCode> {
    if should_fail(state.options.failure_rate) {
        warn!("status: injected failure");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    let action_id = query.action_id.unwrap_or(RESYNC_ACTION_ID);
    let status = state.sim.read().await.status(action_id);
    debug!(
        "status: client at {}, server at {}",
        action_id, status.action_changes.id
    );
    Ok(Json(status))
}

async fn list_actions(State(state): State<HttpState>) -> Json<ActionList> {
    Json(state.sim.read().await.actions().clone())
}

async fn list_locations(State(state): State<HttpState>) -> Json<Vec<String>> {
    Json(state.sim.read().await.locations().to_vec())
}

async fn do_action(State(state): State<HttpState>, Form(fields): Fields) -> String {
    let Some(id) = fields.get("id") else {
        return crate::state::INVALID_PARAMETER.to_string();
    };
    info!("action: {}", id);
    state.sim.write().await.trigger(id)
}

async fn set_location(State(state): State<HttpState>, Form(fields): Fields) -> String {
    info!("location: {:?}", fields.get("id"));
    state
        .sim
        .write()
        .await
        .set_location(fields.get("id").map(String::as_str))
}

async fn set_fov(State(state): State<HttpState>, Form(fields): Fields) -> String {
    info!("fov: {:?}", fields.get("fov"));
    state
        .sim
        .write()
        .await
        .set_fov(fields.get("fov").map(String::as_str))
}

async fn set_time(State(state): State<HttpState>, Form(fields): Fields) -> String {
    info!(
        "time: time={:?} timerate={:?}",
        fields.get("time"),
        fields.get("timerate")
    );
    state.sim.write().await.set_time(
        fields.get("time").map(String::as_str),
        fields.get("timerate").map(String::as_str),
    )
}
