use crate::api::{LogsResponse, UpdateMode, UpdaterClient};
use crate::config::AppConfig;
use crate::format::format_file_size;
use crate::launcher::{LaunchError, UpdateLauncher};
use crate::notify::NotificationChannel;
use crate::poller::{PollOutcome, StatusPoller};
use crate::presenter::{DisplaySurface, NotificationKind, START_BUTTON_LABEL};
use crate::session::ConsoleSession;
use crate::status::UpdateStatusSnapshot;
use crate::ui;
use anyhow::Result;
use axum::{
    Form, Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub client: UpdaterClient,
    pub session: Arc<ConsoleSession>,
    pub poller: Arc<StatusPoller>,
    pub launcher: Arc<UpdateLauncher>,
    pub notifications: Arc<NotificationChannel>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/launch", post(launch))
        .route("/api/console", get(console))
        .route("/api/refresh", post(refresh))
        .route("/api/check_file", get(check_file))
        .route("/api/download", get(download))
        .route("/api/logs", get(logs))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState) -> Result<()> {
    let addr: SocketAddr = state.config.http_bind.parse()?;
    let router = router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Console listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(graceful_shutdown())
        .await?;

    Ok(())
}

async fn graceful_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutting down http server");
}

async fn index(State(state): State<AppState>) -> impl IntoResponse {
    let poll = state.session.poll_state();
    Html(ui::render_html(
        state.client.base_url(),
        state.session.presenter().surface(),
        poll.last_snapshot,
        poll.in_progress,
    ))
}

#[derive(Serialize)]
struct ConsoleResponse {
    in_progress: bool,
    completion_fired: bool,
    push_channel_running: bool,
    last_snapshot: Option<UpdateStatusSnapshot>,
    surface: Option<DisplaySurface>,
}

async fn console(State(state): State<AppState>) -> impl IntoResponse {
    let poll = state.session.poll_state();
    Json(ConsoleResponse {
        in_progress: poll.in_progress,
        completion_fired: poll.completion_fired,
        push_channel_running: state.notifications.is_running(),
        last_snapshot: poll.last_snapshot,
        surface: state.session.presenter().surface(),
    })
}

async fn refresh(State(state): State<AppState>) -> impl IntoResponse {
    let outcome: PollOutcome = state.poller.poll_once().await;
    Json(outcome)
}

#[derive(Deserialize)]
struct LaunchForm {
    #[serde(default)]
    devices: String,
    #[serde(default)]
    build_dir: String,
    update_mode: UpdateMode,
    stall_timeout: u64,
}

/// Splits the free-form device field on commas and whitespace.
pub fn parse_devices(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|device| !device.is_empty())
        .map(str::to_string)
        .collect()
}

async fn launch(State(state): State<AppState>, Form(form): Form<LaunchForm>) -> Redirect {
    let devices = parse_devices(&form.devices);
    let presenter = state.session.presenter();
    presenter.set_start_button(true, "Updating...");

    match state
        .launcher
        .launch(&devices, &form.build_dir, form.update_mode, form.stall_timeout)
        .await
    {
        Ok(ack) => {
            let message = ack
                .message
                .unwrap_or_else(|| "Update process started".to_string());
            presenter.show_toast(NotificationKind::Success, &message);
            presenter.append_log(&format!("Started update for {} device(s)", devices.len()));
        }
        Err(err) => {
            if !matches!(err, LaunchError::EmptySelection) {
                tracing::warn!("Failed to start update: {err}");
            }
            presenter.show_toast(
                NotificationKind::Error,
                &format!("Failed to start update: {err}"),
            );
            presenter.set_start_button(false, START_BUTTON_LABEL);
        }
    }
    Redirect::to("/")
}

#[derive(Deserialize)]
struct PathQuery {
    path: String,
    filename: Option<String>,
}

#[derive(Serialize)]
struct CheckFileResponse {
    exists: bool,
}

async fn check_file(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> impl IntoResponse {
    Json(CheckFileResponse {
        exists: state.client.check_file(&query.path).await,
    })
}

async fn download(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let file = state
        .client
        .download(&query.path, query.filename.as_deref())
        .await
        .map_err(|err| {
            (
                StatusCode::BAD_GATEWAY,
                format!("Failed to download {}: {err}", query.path),
            )
        })?;

    tracing::info!(
        "Downloaded {} ({})",
        file.filename,
        format_file_size(file.bytes.len() as u64)
    );
    let disposition = format!(
        "attachment; filename=\"{}\"",
        file.filename.replace('"', "")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    ))
}

#[derive(Deserialize)]
struct LogsQuery {
    log_file: Option<String>,
}

async fn logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<LogsResponse>, (StatusCode, String)> {
    state
        .client
        .fetch_logs(query.log_file.as_deref())
        .await
        .map(Json)
        .map_err(|err| {
            (
                StatusCode::BAD_GATEWAY,
                format!("Failed to fetch logs: {err}"),
            )
        })
}
