#![cfg(feature = "web")]

use axum::{
    Json, Router,
    extract::{FromRequest, Query, State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{Value, json};
use std::fmt::Display;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::changeset::{self, ChangeSet};
use crate::chart::{ChartOptions, render_chart};
use crate::config::{Backend, Config};
use crate::downloader;
use crate::error::StatsError;
use crate::login::{self, Session, SessionStore};
use crate::sheets::{SpreadsheetService, load_table};
use crate::stats::{self, Stats};
use crate::update::{UpdateOutcome, apply_changes};

/// Tabs the statistics dashboard offers, when the spreadsheet has them
pub const DASHBOARD_SHEETS: &[&str] = &["FINAL_FOCUS_SELECTION", "LOG_FOCUS_MODEL_A"];

pub struct AppState {
    pub service: Arc<dyn SpreadsheetService>,
    pub sessions: SessionStore,
    pub config: Config,
    pub account_lock: Mutex<()>,
}

impl AppState {
    pub fn new(config: Config, service: Arc<dyn SpreadsheetService>) -> Arc<Self> {
        Arc::new(AppState {
            service,
            sessions: SessionStore::new(config.session_duration),
            config,
            account_lock: Mutex::new(()),
        })
    }
}

/// `{"success": true, "data": ...}`
pub fn success(data: Value) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

/// `{"success": false, "error": "..."}`
pub fn failure(error: impl Display) -> Json<Value> {
    Json(json!({ "success": false, "error": error.to_string() }))
}

/// JSON request body whose rejection is answered with the failure envelope
///
/// Malformed or mistyped bodies get `{"success": false, "error": ...}` with
/// HTTP 200 like every other business failure.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(BodyRejection))]
pub struct ApiJson<T>(pub T);

pub struct BodyRejection(JsonRejection);

impl From<JsonRejection> for BodyRejection {
    fn from(rejection: JsonRejection) -> Self {
        BodyRejection(rejection)
    }
}

impl IntoResponse for BodyRejection {
    fn into_response(self) -> Response {
        log::debug!("Rejected request body: {}", self.0.body_text());
        failure(self.0.body_text()).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/sheets", get(list_sheets))
        .route("/api/dashboard-sheets", get(dashboard_sheets))
        .route("/api/load-sheet", post(load_sheet))
        .route("/api/update-cells", post(update_cells))
        .route("/api/create-account", post(login::handle_create_account))
        .route("/api/login", post(login::handle_login))
        .route("/api/logout", post(login::handle_logout))
        .route("/api/session", get(login::handle_session))
        .route("/api/stats", get(get_stats))
        .route("/api/stats/chart.svg", get(get_chart))
        .route("/api/stats/export", get(export_stats))
        .fallback_service(ServeDir::new(&state.config.static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let service = config.build_service();
    let bind = config.bind.clone();
    log::info!(
        "Static files served from: {} (backend: {})",
        config.static_dir,
        match config.backend {
            Backend::Google { .. } => "google",
            Backend::Memory => "memory",
        }
    );

    let app = router(AppState::new(config, service));

    let listener = TcpListener::bind(&bind).await?;
    log::info!("FPM Server running at http://{}", bind);
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetIdQuery {
    sheet_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadSheetRequest {
    sheet_id: Option<String>,
    sheet_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateCellsRequest {
    sheet_id: Option<String>,
    sheet_name: Option<String>,
    #[serde(default, deserialize_with = "changeset::deserialize_scalars")]
    changes: Option<ChangeSet>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsQuery {
    sheet_id: Option<String>,
    sheet: Option<String>,
    format: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn missing_parameters() -> Response {
    failure("Missing parameters").into_response()
}

fn sheet_id_or_default(state: &AppState, sheet_id: Option<String>) -> Option<String> {
    non_empty(sheet_id).or_else(|| state.config.data_sheet_id.clone())
}

async fn list_sheets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SheetIdQuery>,
) -> Response {
    let Some(sheet_id) = sheet_id_or_default(&state, query.sheet_id) else {
        return missing_parameters();
    };

    match state.service.list_sheets(&sheet_id).await {
        Ok(sheets) => Json(json!({ "success": true, "sheets": sheets })).into_response(),
        Err(e) => {
            log::error!("Sheet list error: {}", e);
            failure(e).into_response()
        }
    }
}

async fn dashboard_sheets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SheetIdQuery>,
) -> Response {
    let Some(sheet_id) = sheet_id_or_default(&state, query.sheet_id) else {
        return missing_parameters();
    };

    match state.service.list_sheets(&sheet_id).await {
        Ok(sheets) => {
            let offered: Vec<&str> = DASHBOARD_SHEETS
                .iter()
                .copied()
                .filter(|name| sheets.iter().any(|s| s == name))
                .collect();
            Json(json!({ "success": true, "sheets": offered })).into_response()
        }
        Err(e) => {
            log::error!("Sheet list error: {}", e);
            failure(e).into_response()
        }
    }
}

async fn load_sheet(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<LoadSheetRequest>,
) -> Response {
    let (Some(sheet_id), Some(sheet_name)) =
        (non_empty(request.sheet_id), non_empty(request.sheet_name))
    else {
        return missing_parameters();
    };

    match load_table(state.service.as_ref(), &sheet_id, &sheet_name).await {
        Ok(table) => success(Value::Array(table.records())).into_response(),
        Err(e) => {
            log::error!("sheet load error: {}", e);
            failure(e).into_response()
        }
    }
}

async fn update_cells(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ApiJson(request): ApiJson<UpdateCellsRequest>,
) -> Response {
    let (Some(sheet_id), Some(sheet_name), Some(changes)) = (
        non_empty(request.sheet_id),
        non_empty(request.sheet_name),
        request.changes,
    ) else {
        return missing_parameters();
    };

    let Some(session) = state.sessions.from_jar(&jar) else {
        return failure("Not logged in").into_response();
    };

    match apply_changes(
        state.service.as_ref(),
        &sheet_id,
        &sheet_name,
        &changes,
        &session.role,
    )
    .await
    {
        Ok(UpdateOutcome::Applied { updated }) => {
            Json(json!({ "success": true, "result": { "updated": updated } })).into_response()
        }
        Ok(UpdateOutcome::Denied(reason)) => failure(reason).into_response(),
        Err(e) => {
            log::error!("Update error: {}", e);
            failure(e).into_response()
        }
    }
}

/// Admin session or the JSON failure to send back
fn require_admin(state: &AppState, jar: &CookieJar) -> Result<Session, Response> {
    match state.sessions.from_jar(jar) {
        Some(session) if session.role.is_admin() => Ok(session),
        Some(_) => Err(failure("Only Admin can view this page.").into_response()),
        None => Err(failure("Not logged in").into_response()),
    }
}

async fn load_stats(
    service: &dyn SpreadsheetService,
    sheet_id: &str,
    sheet_name: &str,
) -> Result<Stats, StatsError> {
    let table = load_table(service, sheet_id, sheet_name).await?;
    stats::aggregate(
        &table.headers,
        &table.rows,
        stats::STATUS_HEADER,
        stats::DEFAULT_DATE_PATTERNS,
    )
}

/// Load a tab and aggregate it, for the dashboard endpoints
async fn compute_stats(state: &AppState, query: StatsQuery) -> Result<(String, Stats), Response> {
    let sheet_id = sheet_id_or_default(state, query.sheet_id);
    let (Some(sheet_id), Some(sheet_name)) = (sheet_id, non_empty(query.sheet)) else {
        return Err(missing_parameters());
    };

    match load_stats(state.service.as_ref(), &sheet_id, &sheet_name).await {
        Ok(stats) => Ok((sheet_name, stats)),
        Err(e) => {
            if matches!(e, StatsError::Sheet(_)) {
                log::error!("Statistics load error: {}", e);
            }
            Err(failure(e).into_response())
        }
    }
}

async fn get_stats(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<StatsQuery>,
) -> Response {
    if let Err(denied) = require_admin(&state, &jar) {
        return denied;
    }
    match compute_stats(&state, query).await {
        Ok((_, stats)) => success(json!(stats.report())).into_response(),
        Err(response) => response,
    }
}

async fn get_chart(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<StatsQuery>,
) -> Response {
    if let Err(denied) = require_admin(&state, &jar) {
        return denied;
    }
    let stats = match compute_stats(&state, query).await {
        Ok((_, stats)) => stats,
        Err(response) => return response,
    };

    match render_chart(&stats.series(), &ChartOptions::default()) {
        Ok(svg) => ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response(),
        Err(e) => {
            log::error!("Chart rendering failed: {}", e);
            failure(e).into_response()
        }
    }
}

async fn export_stats(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(mut query): Query<StatsQuery>,
) -> Response {
    if let Err(denied) = require_admin(&state, &jar) {
        return denied;
    }
    let format = query.format.take().unwrap_or_else(|| "csv".to_string());
    let (sheet_name, stats) = match compute_stats(&state, query).await {
        Ok(computed) => computed,
        Err(response) => return response,
    };

    let disposition = |ext: &str| {
        format!(
            "attachment; filename=\"{}-stats.{}\"",
            sheet_name.replace('"', ""),
            ext
        )
    };

    match format.as_str() {
        "csv" => (
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (header::CONTENT_DISPOSITION, disposition("csv")),
            ],
            downloader::to_csv(&stats),
        )
            .into_response(),
        "xlsx" => match downloader::to_xlsx(&stats) {
            Ok(bytes) => (
                [
                    (
                        header::CONTENT_TYPE,
                        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                            .to_string(),
                    ),
                    (header::CONTENT_DISPOSITION, disposition("xlsx")),
                ],
                bytes,
            )
                .into_response(),
            Err(e) => {
                log::error!("XLSX export failed: {}", e);
                failure(e).into_response()
            }
        },
        other => failure(format!("Unsupported export format: {}", other)).into_response(),
    }
}
