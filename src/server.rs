//! HTTP surface of the assignment service.
//!
//! Every handler follows the same shape: load the full document from
//! the blob store, apply one roster operation, and (for mutations)
//! persist the document back conditional on the version it was read at.
//! A failed save discards the in-memory mutation.
//!
//! ## Endpoints
//!
//! - `GET /` — full roster, ordered by date
//! - `GET /users/{username}` — one user's entry
//! - `PUT /users/{username}` — add a user
//! - `DELETE /users/{username}` — remove a user and re-tighten dates
//! - `POST /new` — reset all dates, keeping membership order
//! - `GET /lookup` — entries in a period (default `next`)
//! - `POST /delay` — shift dates forward
//! - `POST /swap` — exchange two users' dates
//! - `POST /dialogflow` — chatbot fulfillment webhook

use crate::config::Config;
use crate::dialogflow;
use crate::error::{Result, RotaError};
use crate::period::Period;
use crate::roster::{DelayTarget, Entry};
use crate::schedule::Schedule;
use crate::store::{self, BlobStore};
use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

/// Shared state for axum handlers.
#[derive(Clone)]
struct AppState {
    store: Arc<dyn BlobStore>,
    schedule: Schedule,
}

/// Success body shared by every roster endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct RosterResponse {
    pub assignments: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct LookupQuery {
    period: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DelayRequest {
    /// Days to shift forward (>= 1).
    #[serde(default = "default_delay_days")]
    days: u32,
    /// Shift this user and everyone after them; absent = whole schedule.
    #[serde(default)]
    user: Option<String>,
}

fn default_delay_days() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct SwapRequest {
    /// Exactly two user names.
    users: Vec<String>,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_all))
        .route("/users/{username}", get(get_user))
        .route("/users/{username}", put(add_user))
        .route("/users/{username}", delete(remove_user))
        .route("/new", post(reset_dates))
        .route("/lookup", get(lookup))
        .route("/delay", post(delay))
        .route("/swap", post(swap))
        .route("/dialogflow", post(dialogflow_webhook))
        .with_state(state)
}

/// Serve the API in the foreground until the process exits.
pub async fn run(config: &Config, store: Arc<dyn BlobStore>) -> Result<()> {
    let state = AppState {
        store,
        schedule: config.schedule,
    };
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| RotaError::Config(format!("cannot bind {addr}: {e}")))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| RotaError::Config(format!("cannot resolve local addr: {e}")))?;

    info!("rota listening on http://{local_addr}");
    axum::serve(listener, router(state))
        .await
        .map_err(|e| RotaError::Config(format!("server error: {e}")))
}

/// API server running in a background task (used by tests).
pub struct RotaServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl RotaServer {
    /// Bind `{config.host}:{config.port}` (port 0 auto-assigns) and
    /// serve in a background tokio task.
    pub async fn start(config: &Config, store: Arc<dyn BlobStore>) -> Result<Self> {
        let state = AppState {
            store,
            schedule: config.schedule,
        };
        let bind_addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| RotaError::Config(format!("cannot bind {bind_addr}: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| RotaError::Config(format!("cannot resolve local addr: {e}")))?;

        info!("rota listening on http://{addr}");
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router(state)).await {
                tracing::error!("server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    /// The address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for RotaServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn roster_response(entries: Vec<Entry>) -> Json<RosterResponse> {
    Json(RosterResponse {
        assignments: entries,
    })
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// `GET /` — full roster ordered by date.
async fn list_all(State(state): State<AppState>) -> Result<Json<RosterResponse>> {
    let (roster, _) = store::load_roster(state.store.as_ref()).await?;
    Ok(roster_response(roster.entries().to_vec()))
}

/// `GET /users/{username}` — one user's assignment date.
async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<RosterResponse>> {
    let (roster, _) = store::load_roster(state.store.as_ref()).await?;
    let entry = roster.get(&username)?.clone();
    Ok(roster_response(vec![entry]))
}

/// `PUT /users/{username}` — add a user at the end of the rotation.
async fn add_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<RosterResponse>> {
    let (mut roster, version) = store::load_roster(state.store.as_ref()).await?;
    let entry = roster.add(&username, today(), &state.schedule)?;
    store::save_roster(state.store.as_ref(), &roster, &version).await?;
    info!(user = %entry.user, date = %entry.date, "user added");
    Ok(roster_response(roster.entries().to_vec()))
}

/// `DELETE /users/{username}` — remove a user and re-tighten dates.
async fn remove_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<RosterResponse>> {
    let (mut roster, version) = store::load_roster(state.store.as_ref()).await?;
    let removed = roster.remove(&username, &state.schedule)?;
    store::save_roster(state.store.as_ref(), &roster, &version).await?;
    info!(user = %removed.user, "user removed");
    Ok(roster_response(roster.entries().to_vec()))
}

/// `POST /new` — reassign all dates from the anchor, keeping order.
async fn reset_dates(State(state): State<AppState>) -> Result<Json<RosterResponse>> {
    let (mut roster, version) = store::load_roster(state.store.as_ref()).await?;
    roster.reset(today(), &state.schedule);
    store::save_roster(state.store.as_ref(), &roster, &version).await?;
    info!(users = roster.len(), "assignment series reset");
    Ok(roster_response(roster.entries().to_vec()))
}

/// `GET /lookup` — entries whose date falls in the requested period.
async fn lookup(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<RosterResponse>> {
    let now = today();
    let period = Period::from_query(
        query.period.as_deref(),
        query.from.as_deref(),
        query.to.as_deref(),
        now,
    )?;
    let (roster, _) = store::load_roster(state.store.as_ref()).await?;
    let found = roster.lookup(period.resolve(now, &state.schedule));
    Ok(roster_response(found))
}

/// `POST /delay` — shift dates forward by a number of days.
async fn delay(
    State(state): State<AppState>,
    Json(request): Json<DelayRequest>,
) -> Result<Json<RosterResponse>> {
    let (mut roster, version) = store::load_roster(state.store.as_ref()).await?;
    let target = match request.user.as_deref() {
        Some(user) => DelayTarget::User(user),
        None => DelayTarget::All,
    };
    roster.delay(target, request.days)?;
    store::save_roster(state.store.as_ref(), &roster, &version).await?;
    info!(days = request.days, "assignments delayed");
    Ok(roster_response(roster.entries().to_vec()))
}

/// `POST /swap` — exchange two users' dates.
async fn swap(
    State(state): State<AppState>,
    Json(request): Json<SwapRequest>,
) -> Result<Json<RosterResponse>> {
    let [a, b] = request.users.as_slice() else {
        return Err(RotaError::InvalidInput(
            "swap requires exactly two users".to_owned(),
        ));
    };
    let (mut roster, version) = store::load_roster(state.store.as_ref()).await?;
    roster.swap(a, b)?;
    store::save_roster(state.store.as_ref(), &roster, &version).await?;
    info!(a = %a, b = %b, "users swapped");
    Ok(roster_response(roster.entries().to_vec()))
}

/// `POST /dialogflow` — chatbot fulfillment webhook.
async fn dialogflow_webhook(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>> {
    let reply =
        dialogflow::handle(state.store.as_ref(), &state.schedule, today(), &payload).await?;
    Ok(Json(reply))
}
