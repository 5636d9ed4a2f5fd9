//! HTTP route definitions

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, warn};

use crate::app::AppState;
use crate::game::{GameError, GameSession, Leaderboard, MapSize, Point, Round, RoundPosition};
use crate::store::{ImageKind, LibraryItem};
use crate::util::time::uptime_secs;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let cors = match &state.config.client_origin {
        Some(origins) => {
            let allowed_origins: Vec<header::HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE])
        }
        None => CorsLayer::permissive(),
    };

    let api_routes = Router::new()
        .route("/players", get(list_players_handler).post(add_player_handler))
        .route("/players/:name", delete(remove_player_handler))
        .route("/reset", post(reset_handler))
        .route("/rounds", get(list_rounds_handler).post(create_round_handler))
        .route("/rounds/upload", post(upload_round_handler))
        .route("/rounds/:id", get(round_state_handler))
        .route("/rounds/:id/answer", post(set_answer_handler))
        .route("/rounds/:id/guess", post(guess_handler))
        .route("/current", get(current_round_handler))
        .route("/goto", post(goto_round_handler))
        .route("/leaderboard", get(leaderboard_handler))
        .route("/library/:kind", get(library_handler));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api_routes)
        .nest_service("/uploads", ServeDir::new(state.uploads.root()))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    players: usize,
    rounds: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let game = state.game.lock();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        players: game.players().len(),
        rounds: game.rounds().len(),
    })
}

// ============================================================================
// Player endpoints
// ============================================================================

#[derive(Deserialize)]
struct AddPlayerRequest {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Serialize)]
struct PlayersResponse {
    ok: bool,
    players: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    added: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    removed: Option<bool>,
}

impl PlayersResponse {
    fn of(session: &GameSession) -> Self {
        Self {
            ok: true,
            players: session.players().to_vec(),
            added: None,
            removed: None,
        }
    }
}

async fn list_players_handler(State(state): State<AppState>) -> Json<PlayersResponse> {
    Json(PlayersResponse::of(&state.game.lock()))
}

async fn add_player_handler(
    State(state): State<AppState>,
    Json(req): Json<AddPlayerRequest>,
) -> Result<Json<PlayersResponse>, AppError> {
    let mut game = state.game.lock();
    let added = game.add_player(req.name.as_deref().unwrap_or_default())?;

    Ok(Json(PlayersResponse {
        added: Some(added),
        ..PlayersResponse::of(&game)
    }))
}

async fn remove_player_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<PlayersResponse> {
    let mut game = state.game.lock();
    let removed = game.remove_player(&name);

    Json(PlayersResponse {
        removed: Some(removed),
        ..PlayersResponse::of(&game)
    })
}

#[derive(Serialize)]
struct OkResponse {
    ok: bool,
}

async fn reset_handler(State(state): State<AppState>) -> Json<OkResponse> {
    state.game.lock().reset();
    Json(OkResponse { ok: true })
}

// ============================================================================
// Round endpoints
// ============================================================================

/// A round plus what a player screen needs to render it
#[derive(Serialize)]
struct RoundView {
    #[serde(flatten)]
    round: Round,
    #[serde(flatten)]
    position: RoundPosition,
    answer_set: bool,
    players: Vec<String>,
}

impl RoundView {
    fn build(session: &GameSession, id: &str) -> Result<Self, GameError> {
        let round = session.get_round(id)?.clone();
        let position = session.rounds().position(id)?;

        Ok(Self {
            answer_set: round.has_answer(),
            round,
            position,
            players: session.players().to_vec(),
        })
    }
}

#[derive(Serialize)]
struct RoundsResponse {
    ok: bool,
    rounds: Vec<Round>,
    current_index: usize,
}

async fn list_rounds_handler(State(state): State<AppState>) -> Json<RoundsResponse> {
    let game = state.game.lock();

    Json(RoundsResponse {
        ok: true,
        rounds: game.rounds().list().to_vec(),
        current_index: game.rounds().current_index(),
    })
}

#[derive(Serialize)]
struct RoundResponse {
    ok: bool,
    round: Round,
}

#[derive(Deserialize)]
struct CreateRoundRequest {
    #[serde(default)]
    existing_map: Option<String>,
    #[serde(default)]
    existing_scene: Option<String>,
}

/// Treat blank form values as absent
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Stored image name plus its dimensions, rejecting unreadable files
fn inspect_image(state: &AppState, kind: ImageKind, filename: String) -> Result<(String, MapSize), GameError> {
    let size = state.images.dimensions(&state.uploads.path(kind, &filename))?;
    Ok((filename, size))
}

fn existing_image(state: &AppState, kind: ImageKind, name: &str) -> Result<(String, MapSize), GameError> {
    let filename = state.uploads.resolve_existing(kind, name)?;
    inspect_image(state, kind, filename)
}

fn insert_round(
    state: &AppState,
    (map_filename, map_size): (String, MapSize),
    scene: Option<String>,
) -> Json<RoundResponse> {
    let mut game = state.game.lock();
    let round = game.create_round(map_filename, map_size, scene).clone();
    Json(RoundResponse { ok: true, round })
}

async fn create_round_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateRoundRequest>,
) -> Result<Json<RoundResponse>, AppError> {
    let existing_map = non_blank(req.existing_map).ok_or_else(|| {
        AppError::BadRequest("Select an existing map or upload one.".to_string())
    })?;
    let map = existing_image(&state, ImageKind::Maps, &existing_map)?;

    let scene = match non_blank(req.existing_scene) {
        Some(name) => Some(existing_image(&state, ImageKind::Scenes, &name)?.0),
        None => None,
    };

    Ok(insert_round(&state, map, scene))
}

struct UploadedFile {
    filename: String,
    data: Bytes,
}

#[derive(Default)]
struct RoundForm {
    existing_map: Option<String>,
    existing_scene: Option<String>,
    map_image: Option<UploadedFile>,
    scene_image: Option<UploadedFile>,
}

impl RoundForm {
    async fn read(mut multipart: Multipart) -> Result<Self, MultipartError> {
        let mut form = RoundForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "existing_map" => form.existing_map = Some(field.text().await?),
                "existing_scene" => form.existing_scene = Some(field.text().await?),
                "map_image" | "scene_image" => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let data = field.bytes().await?;
                    let file = Some(UploadedFile { filename, data });
                    if name == "map_image" {
                        form.map_image = file;
                    } else {
                        form.scene_image = file;
                    }
                }
                _ => {}
            }
        }

        Ok(form)
    }
}

/// Create a round from a multipart form: an uploaded `map_image` or the
/// name of an `existing_map`, plus an optional scene given the same way.
async fn upload_round_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<RoundResponse>, AppError> {
    let form = RoundForm::read(multipart).await?;

    // Resolve a named scene before anything is written to disk
    let existing_scene = match non_blank(form.existing_scene) {
        Some(name) => Some(existing_image(&state, ImageKind::Scenes, &name)?.0),
        None => None,
    };
    if let Some(file) = form.scene_image.as_ref() {
        if existing_scene.is_none() && !file.filename.is_empty() {
            state.uploads.namer(ImageKind::Scenes).name_for(&file.filename)?;
        }
    }

    let map = match non_blank(form.existing_map) {
        Some(name) => existing_image(&state, ImageKind::Maps, &name)?,
        None => {
            let file = form.map_image.unwrap_or(UploadedFile {
                filename: String::new(),
                data: Bytes::new(),
            });
            let stored = state.uploads.save(ImageKind::Maps, &file.filename, &file.data)?;
            inspect_image(&state, ImageKind::Maps, stored)?
        }
    };

    let scene = match (existing_scene, form.scene_image) {
        (Some(name), _) => Some(name),
        (None, Some(file)) if !file.filename.is_empty() => {
            let stored = state.uploads.save(ImageKind::Scenes, &file.filename, &file.data)?;
            Some(inspect_image(&state, ImageKind::Scenes, stored)?.0)
        }
        _ => None,
    };

    Ok(insert_round(&state, map, scene))
}

#[derive(Serialize)]
struct RoundStateResponse {
    ok: bool,
    #[serde(flatten)]
    view: RoundView,
}

async fn round_state_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RoundStateResponse>, AppError> {
    let view = RoundView::build(&state.game.lock(), &id)?;
    Ok(Json(RoundStateResponse { ok: true, view }))
}

#[derive(Serialize)]
struct CurrentRoundResponse {
    ok: bool,
    round: Option<RoundView>,
}

async fn current_round_handler(
    State(state): State<AppState>,
) -> Result<Json<CurrentRoundResponse>, AppError> {
    let game = state.game.lock();
    let round = match game.current_round() {
        Some(current) => Some(RoundView::build(&game, &current.id)?),
        None => None,
    };
    Ok(Json(CurrentRoundResponse { ok: true, round }))
}

#[derive(Deserialize)]
struct GotoRoundRequest {
    index: i64,
}

#[derive(Serialize)]
struct GotoRoundResponse {
    ok: bool,
    current_index: usize,
}

async fn goto_round_handler(
    State(state): State<AppState>,
    Json(req): Json<GotoRoundRequest>,
) -> Result<Json<GotoRoundResponse>, AppError> {
    let index = usize::try_from(req.index).map_err(|_| GameError::invalid_round_index())?;

    let mut game = state.game.lock();
    game.goto_round(index)?;
    Ok(Json(GotoRoundResponse {
        ok: true,
        current_index: game.rounds().current_index(),
    }))
}

// ============================================================================
// Answer and guess endpoints
// ============================================================================

/// Accept integers, floats (truncated) and numeric strings
fn parse_coord(value: &Value) -> Option<i32> {
    let raw = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    raw.and_then(|v| i32::try_from(v).ok())
}

fn parse_point(x: Option<&Value>, y: Option<&Value>, missing: &str) -> Result<Point, GameError> {
    let (Some(x), Some(y)) = (x, y) else {
        return Err(GameError::Validation(missing.to_string()));
    };
    match (parse_coord(x), parse_coord(y)) {
        (Some(x), Some(y)) => Ok(Point::new(x, y)),
        _ => Err(GameError::Validation("Invalid x/y.".to_string())),
    }
}

#[derive(Deserialize)]
struct PointRequest {
    #[serde(default)]
    x: Option<Value>,
    #[serde(default)]
    y: Option<Value>,
}

#[derive(Serialize)]
struct AnswerResponse {
    ok: bool,
    answer: Point,
}

async fn set_answer_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PointRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    let mut game = state.game.lock();
    game.get_round(&id)?;

    let answer = parse_point(
        req.x.as_ref(),
        req.y.as_ref(),
        "You should select a point on the map before saving.",
    )?;
    game.set_answer(&id, answer)?;
    Ok(Json(AnswerResponse { ok: true, answer }))
}

#[derive(Deserialize)]
struct GuessRequest {
    #[serde(default)]
    player: Option<String>,
    #[serde(flatten)]
    point: PointRequest,
}

#[derive(Serialize)]
struct GuessResponse {
    ok: bool,
    guesses: std::collections::BTreeMap<String, Point>,
}

async fn guess_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<GuessRequest>,
) -> Result<Json<GuessResponse>, AppError> {
    let mut game = state.game.lock();
    game.get_round(&id)?;

    let guess = parse_point(req.point.x.as_ref(), req.point.y.as_ref(), "Missing x/y.")?;
    let player = req.player.unwrap_or_default();
    let guesses = game.submit_guess(&id, &player, guess)?.clone();
    Ok(Json(GuessResponse { ok: true, guesses }))
}

// ============================================================================
// Leaderboard and library endpoints
// ============================================================================

#[derive(Serialize)]
struct LeaderboardResponse {
    ok: bool,
    #[serde(flatten)]
    leaderboard: Leaderboard,
}

async fn leaderboard_handler(State(state): State<AppState>) -> Json<LeaderboardResponse> {
    let leaderboard = state.game.lock().leaderboard();
    Json(LeaderboardResponse {
        ok: true,
        leaderboard,
    })
}

#[derive(Serialize)]
struct LibraryResponse {
    ok: bool,
    kind: ImageKind,
    items: Vec<LibraryItem>,
}

async fn library_handler(
    State(state): State<AppState>,
    Path(kind): Path<ImageKind>,
) -> Json<LibraryResponse> {
    let items = state.uploads.library(kind, &state.images);
    Json(LibraryResponse {
        ok: true,
        kind,
        items,
    })
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<GameError> for AppError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::Validation(msg) => AppError::BadRequest(msg),
            GameError::NotFound(msg) => AppError::NotFound(msg),
            GameError::Image(e) => {
                warn!(error = %e, "Rejected image");
                AppError::BadRequest(e.user_message().to_string())
            }
            GameError::Storage(e) => {
                error!(error = %e, "Failed to store upload");
                AppError::Internal("Failed to store the uploaded file.".to_string())
            }
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::BadRequest(err.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "ok": false,
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::config::Config;

    const BOUNDARY: &str = "geoparty-test-boundary";

    fn test_app() -> (Router, AppState, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(Config::with_upload_dir(dir.path()));
        state.uploads.setup_dirs().unwrap();
        (build_router(state.clone()), state, dir)
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut out = std::io::Cursor::new(Vec::new());
        image::RgbImage::new(width, height)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        send(app, request).await
    }

    /// (field name, optional filename, content)
    fn multipart(fields: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, filename, content) in fields {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/api/rounds/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn create_round_with(app: &Router, state: &AppState, name: &str, w: u32, h: u32) -> String {
        std::fs::write(state.uploads.path(ImageKind::Maps, name), png_bytes(w, h)).unwrap();
        let (status, body) = call(
            app,
            Method::POST,
            "/api/rounds",
            Some(json!({ "existing_map": name })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["round"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_counts() {
        let (app, _state, _dir) = test_app();
        let (status, body) = call(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["players"], 0);
        assert_eq!(body["rounds"], 0);
    }

    #[tokio::test]
    async fn player_management() {
        let (app, _state, _dir) = test_app();

        let (status, body) = call(&app, Method::POST, "/api/players", Some(json!({ "name": " Bob " }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["added"], "Bob");

        let (status, body) = call(&app, Method::POST, "/api/players", Some(json!({ "name": "bob" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "That player name already exists.");

        let (status, _) = call(&app, Method::POST, "/api/players", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        call(&app, Method::POST, "/api/players", Some(json!({ "name": "Ann Lee" }))).await;
        let (_, body) = call(&app, Method::GET, "/api/players", None).await;
        assert_eq!(body["players"], json!(["Bob", "Ann Lee"]));

        let (status, body) = call(&app, Method::DELETE, "/api/players/Ann%20Lee", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], true);
        assert_eq!(body["players"], json!(["Bob"]));

        let (status, body) = call(&app, Method::DELETE, "/api/players/ghost", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], false);
    }

    #[tokio::test]
    async fn full_game_flow_scores_leaderboard() {
        let (app, state, _dir) = test_app();
        for name in ["B", "A"] {
            call(&app, Method::POST, "/api/players", Some(json!({ "name": name }))).await;
        }
        let id = create_round_with(&app, &state, "world.png", 1000, 1000).await;

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/rounds/{id}/answer"),
            Some(json!({ "x": 500, "y": "500" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], json!({ "x": 500, "y": 500 }));

        let guess_uri = format!("/api/rounds/{id}/guess");
        call(&app, Method::POST, &guess_uri, Some(json!({ "player": "A", "x": 500, "y": 500 }))).await;
        let (status, body) = call(
            &app,
            Method::POST,
            &guess_uri,
            Some(json!({ "player": "B", "x": 1000.9, "y": 1000 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["guesses"]["B"], json!({ "x": 1000, "y": 1000 }));
        assert_eq!(body["guesses"]["A"], json!({ "x": 500, "y": 500 }));

        let (status, body) = call(&app, Method::GET, "/api/leaderboard", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["ranked"],
            json!([{ "player": "A", "total": 1000 }, { "player": "B", "total": 368 }])
        );
        assert_eq!(body["rounds"][0]["scores"][0]["player"], "B");
        assert_eq!(
            body["rounds"][0]["scores"][0]["result"],
            json!({ "score": 368, "distance": 707 })
        );
        assert_eq!(body["back_round_id"], id.as_str());
    }

    #[tokio::test]
    async fn guess_validation() {
        let (app, state, _dir) = test_app();
        call(&app, Method::POST, "/api/players", Some(json!({ "name": "A" }))).await;
        let id = create_round_with(&app, &state, "m.png", 10, 10).await;
        let uri = format!("/api/rounds/{id}/guess");

        let (status, body) = call(&app, Method::POST, &uri, Some(json!({ "player": "Z", "x": 1, "y": 1 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid player.");

        let (_, body) = call(&app, Method::POST, &uri, Some(json!({ "player": "A", "x": 1 }))).await;
        assert_eq!(body["error"], "Missing x/y.");

        let (_, body) = call(&app, Method::POST, &uri, Some(json!({ "player": "A", "x": "left", "y": 1 }))).await;
        assert_eq!(body["error"], "Invalid x/y.");

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/rounds/deadbeef/guess",
            Some(json!({ "player": "A", "x": 1, "y": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Round lookup comes before coordinate parsing
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/rounds/deadbeef/guess",
            Some(json!({ "player": "A", "x": "left" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{body}");

        // Outside the image is fine
        let (status, _) = call(&app, Method::POST, &uri, Some(json!({ "player": "A", "x": -40, "y": 9000 }))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn answer_requires_point_and_round() {
        let (app, state, _dir) = test_app();
        let id = create_round_with(&app, &state, "m.png", 10, 10).await;

        let (status, body) = call(&app, Method::POST, &format!("/api/rounds/{id}/answer"), Some(json!({ "x": 3 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "You should select a point on the map before saving.");

        let (status, _) = call(&app, Method::POST, "/api/rounds/missing/answer", Some(json!({ "x": 3, "y": 4 }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn round_navigation_and_goto() {
        let (app, state, _dir) = test_app();
        let first = create_round_with(&app, &state, "one.png", 20, 10).await;
        let second = create_round_with(&app, &state, "two.png", 20, 10).await;

        let (_, body) = call(&app, Method::GET, "/api/current", None).await;
        assert_eq!(body["round"]["id"], second.as_str());
        assert_eq!(body["round"]["number"], 2);
        assert_eq!(body["round"]["prev_round_id"], first.as_str());
        assert_eq!(body["round"]["next_round_id"], Value::Null);
        assert_eq!(body["round"]["answer_set"], false);
        assert_eq!(body["round"]["map_size"], json!({ "width": 20, "height": 10 }));

        let (status, _) = call(&app, Method::POST, "/api/goto", Some(json!({ "index": 2 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&app, Method::POST, "/api/goto", Some(json!({ "index": -1 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = call(&app, Method::POST, "/api/goto", Some(json!({ "index": 0 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["current_index"], 0);

        let (_, body) = call(&app, Method::GET, &format!("/api/rounds/{first}"), None).await;
        assert_eq!(body["number"], 1);
        assert_eq!(body["total_rounds"], 2);
        assert_eq!(body["next_round_id"], second.as_str());

        let (status, _) = call(&app, Method::GET, "/api/rounds/unknown", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = call(&app, Method::GET, "/api/rounds", None).await;
        assert_eq!(body["rounds"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reset_clears_game() {
        let (app, state, _dir) = test_app();
        call(&app, Method::POST, "/api/players", Some(json!({ "name": "A" }))).await;
        create_round_with(&app, &state, "m.png", 10, 10).await;

        let (status, _) = call(&app, Method::POST, "/api/reset", None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(&app, Method::GET, "/api/current", None).await;
        assert_eq!(body["round"], Value::Null);
        let (_, body) = call(&app, Method::GET, "/api/players", None).await;
        assert_eq!(body["players"], json!([]));
    }

    #[tokio::test]
    async fn existing_map_must_be_available_and_valid() {
        let (app, state, _dir) = test_app();

        let (status, body) = call(&app, Method::POST, "/api/rounds", Some(json!({ "existing_map": "nope.png" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Selected map is not available anymore.");

        std::fs::write(state.uploads.path(ImageKind::Maps, "junk.png"), b"junk").unwrap();
        let (status, body) = call(&app, Method::POST, "/api/rounds", Some(json!({ "existing_map": "junk.png" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "The selected image file appears to be corrupted or invalid.");
    }

    #[tokio::test]
    async fn upload_creates_round_with_unique_names() {
        let (app, state, _dir) = test_app();
        let png = png_bytes(40, 30);
        let scene = png_bytes(4, 4);

        let (status, body) = send(&app, multipart(&[("map_image", Some("../My Map.png"), png.as_slice())])).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["round"]["map_filename"], "My_Map.png");
        assert_eq!(body["round"]["map_size"], json!({ "width": 40, "height": 30 }));

        let (_, body) = send(
            &app,
            multipart(&[
                ("map_image", Some("My Map.png"), png.as_slice()),
                ("scene_image", Some("scene.png"), scene.as_slice()),
            ]),
        )
        .await;
        assert_eq!(body["round"]["map_filename"], "My_Map(1).png");
        assert_eq!(body["round"]["scene_filename"], "scene.png");
        assert!(state.uploads.path(ImageKind::Scenes, "scene.png").is_file());

        let (_, body) = call(&app, Method::GET, "/api/library/maps", None).await;
        let names: Vec<&str> = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["filename"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["My_Map(1).png", "My_Map.png"]);
    }

    #[tokio::test]
    async fn upload_rejects_missing_and_unsupported_files() {
        let (app, _state, _dir) = test_app();

        let (status, body) = send(&app, multipart(&[("existing_map", None, b"".as_slice())])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file selected.");

        let (status, body) = send(&app, multipart(&[("map_image", Some("notes.txt"), b"hello".as_slice())])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unsupported file type. Use png/jpg/jpeg/webp.");

        let (status, body) = send(&app, multipart(&[("map_image", Some("fake.png"), b"hello".as_slice())])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "The selected image file appears to be corrupted or invalid.");
    }

    #[tokio::test]
    async fn rejected_scene_leaves_no_map_behind() {
        let (app, _state, _dir) = test_app();
        let png = png_bytes(8, 8);

        let (status, body) = send(
            &app,
            multipart(&[
                ("map_image", Some("map.png"), png.as_slice()),
                ("existing_scene", None, b"gone.png".as_slice()),
            ]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Selected scene is not available anymore.");

        let (status, body) = send(
            &app,
            multipart(&[
                ("map_image", Some("map.png"), png.as_slice()),
                ("scene_image", Some("scene.gif"), png.as_slice()),
            ]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unsupported file type. Use png/jpg/jpeg/webp.");

        let (_, body) = call(&app, Method::GET, "/api/library/maps", None).await;
        assert_eq!(body["items"], json!([]));
        let (_, body) = call(&app, Method::GET, "/api/rounds", None).await;
        assert_eq!(body["rounds"], json!([]));
    }

    #[tokio::test]
    async fn uploads_are_served() {
        let (app, state, _dir) = test_app();
        let png = png_bytes(3, 3);
        std::fs::write(state.uploads.path(ImageKind::Maps, "tiny.png"), &png).unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/uploads/maps/tiny.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), png.as_slice());
    }
}
