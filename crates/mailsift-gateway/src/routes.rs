//! API route handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use base64::Engine;
use chrono::{DateTime, Utc};
use mailsift_core::error::MailSiftError;
use mailsift_core::types::{Interval, User, UserPatch};
use mailsift_scheduler::NOTHING_NEW;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::error::ApiError;
use crate::server::AppState;

type ApiResult = Result<Json<Value>, ApiError>;

fn default_imap_port() -> u16 {
    993
}

fn parse_interval(raw: &str) -> Result<Interval, ApiError> {
    raw.parse::<Interval>().map_err(ApiError::from)
}

/// System information endpoint.
pub async fn system_info(State(state): State<Arc<AppState>>) -> Json<Value> {
    let groups = state.scheduler.groups();
    Json(json!({
        "name": "mailsift",
        "version": env!("CARGO_PKG_VERSION"),
        "platform": format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "scheduled_groups": groups.len(),
        "scheduled_users": groups.iter().map(|g| g.members.len()).sum::<usize>(),
        "require_token": state.gateway_config.api_token.is_some(),
    }))
}

// ── Users ──────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub receiving_email: Option<String>,
    pub password: String,
    pub imap_host: String,
    #[serde(default = "default_imap_port")]
    pub imap_port: u16,
}

pub async fn create_user(State(state): State<Arc<AppState>>, Json(body): Json<CreateUser>) -> ApiResult {
    let email = body.email.trim();
    if !email.contains('@') {
        return Err(ApiError::BadRequest("A valid email is required".into()));
    }
    if body.password.is_empty() || body.imap_host.trim().is_empty() {
        return Err(ApiError::BadRequest("Password and IMAP host are required".into()));
    }
    if state.store.find_by_email(email).await?.is_some() {
        return Err(ApiError::Conflict(format!("User {email} already exists")));
    }

    let receiving = body
        .receiving_email
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(email);
    let encrypted = state.cipher.encrypt(&body.password)?;
    let id = uuid::Uuid::new_v4().to_string();
    let user = User::new(&id, body.name.trim(), email, receiving, &encrypted, body.imap_host.trim(), body.imap_port);
    state.store.create(&user).await?;

    tracing::info!(user_id = %id, "👤 User registered: {email}");
    Ok(Json(json!({"ok": true, "user": user.redacted()})))
}

pub async fn get_user(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let user = state.store.read(&id).await?;
    Ok(Json(json!({"ok": true, "user": user.redacted()})))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub receiving_email: Option<String>,
    pub imap_host: Option<String>,
    pub imap_port: Option<u16>,
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateProfile>,
) -> ApiResult {
    let user = state.store.read(&id).await?;
    let mut patch = UserPatch {
        name: body.name,
        email: body.email,
        receiving_email: body.receiving_email,
        imap_host: body.imap_host,
        imap_port: body.imap_port,
        ..UserPatch::default()
    };

    if let Some(new_password) = body.new_password.filter(|p| !p.is_empty()) {
        let current = state.cipher.decrypt(&user.password)?;
        if body.old_password.as_deref() != Some(current.as_str()) {
            return Err(ApiError::Unauthorized("Old password is incorrect".into()));
        }
        patch.password = Some(state.cipher.encrypt(&new_password)?);
    }
    if patch.is_empty() {
        return Err(ApiError::BadRequest("Nothing to update".into()));
    }

    state.store.update(&id, patch).await?;
    let user = state.store.read(&id).await?;
    Ok(Json(json!({"ok": true, "user": user.redacted()})))
}

pub async fn delete_user(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    state.store.read(&id).await?;
    state.scheduler.delete_task_for_user(&id).await?;
    state.store.delete(&id).await?;
    tracing::info!(user_id = %id, "👤 User deleted");
    Ok(Json(json!({"ok": true, "message": format!("User {id} deleted")})))
}

// ── Mailbox settings ───────────────────────────

pub async fn list_folders(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let user = state.store.read(&id).await?;
    let folders = state.pipeline.folders(&user).await?;
    Ok(Json(json!({"ok": true, "folders": folders, "selected": user.folder})))
}

#[derive(Debug, Deserialize)]
pub struct FolderBody {
    pub folder: String,
}

pub async fn update_folder(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<FolderBody>,
) -> ApiResult {
    let folder = body.folder.trim();
    if folder.is_empty() {
        return Err(ApiError::BadRequest("Folder name is required".into()));
    }
    state
        .store
        .update(&id, UserPatch { folder: Some(folder.to_string()), ..UserPatch::default() })
        .await?;
    Ok(Json(json!({"ok": true, "folder": folder})))
}

#[derive(Debug, Deserialize)]
pub struct TagsBody {
    pub tags: Vec<String>,
}

/// Trimmed, non-empty, case-insensitively unique, first spelling wins.
fn normalize_tags(raw: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .collect()
}

pub async fn update_tags(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<TagsBody>,
) -> ApiResult {
    let tags = normalize_tags(body.tags);
    if tags.is_empty() {
        return Err(MailSiftError::NoTagsConfigured.into());
    }
    state
        .store
        .update(&id, UserPatch { tags: Some(tags.clone()), ..UserPatch::default() })
        .await?;
    Ok(Json(json!({"ok": true, "tags": tags})))
}

#[derive(Debug, Deserialize)]
pub struct BlacklistBody {
    pub senders: Vec<String>,
}

pub async fn update_blacklist(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<BlacklistBody>,
) -> ApiResult {
    let senders: Vec<String> = body
        .senders
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    state
        .store
        .update(&id, UserPatch { blacklist_senders: Some(senders.clone()), ..UserPatch::default() })
        .await?;
    Ok(Json(json!({"ok": true, "blacklist": senders})))
}

#[derive(Debug, Deserialize)]
pub struct StartTimeBody {
    /// RFC 3339, or empty to clear.
    #[serde(default)]
    pub start_time: String,
}

pub async fn update_start_time(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<StartTimeBody>,
) -> ApiResult {
    let raw = body.start_time.trim();
    let start = if raw.is_empty() {
        None
    } else {
        Some(
            DateTime::parse_from_rfc3339(raw)
                .map_err(|e| ApiError::BadRequest(format!("Invalid start time: {e}")))?
                .with_timezone(&Utc),
        )
    };
    state
        .store
        .update(&id, UserPatch { start_time: Some(start), ..UserPatch::default() })
        .await?;
    Ok(Json(json!({"ok": true, "start_time": start})))
}

#[derive(Debug, Deserialize)]
pub struct SummaryCountBody {
    pub summary_count: u32,
}

pub async fn update_summary_count(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<SummaryCountBody>,
) -> ApiResult {
    if body.summary_count == 0 {
        return Err(ApiError::BadRequest("Summary count must be at least 1".into()));
    }
    state
        .store
        .update(&id, UserPatch { summary_count: Some(body.summary_count), ..UserPatch::default() })
        .await?;
    Ok(Json(json!({"ok": true, "summary_count": body.summary_count})))
}

// ── Scheduling ─────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ScheduleBody {
    pub interval: String,
}

pub async fn schedule_new(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ScheduleBody>,
) -> ApiResult {
    let interval = parse_interval(&body.interval)?;
    state.scheduler.schedule_new_task(&id, interval).await?;
    Ok(Json(json!({"ok": true, "interval": interval})))
}

#[derive(Debug, Deserialize)]
pub struct RescheduleBody {
    pub old_interval: String,
    pub new_interval: String,
}

pub async fn schedule_update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<RescheduleBody>,
) -> ApiResult {
    let old = parse_interval(&body.old_interval)?;
    let new = parse_interval(&body.new_interval)?;
    state.scheduler.update_task(&id, old, new).await?;
    Ok(Json(json!({"ok": true, "interval": new})))
}

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub interval: Option<String>,
}

/// Without `?interval=` the user is removed from whichever group holds them.
pub async fn schedule_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ScheduleQuery>,
) -> ApiResult {
    match query.interval.as_deref() {
        Some(raw) => state.scheduler.delete_task(&id, parse_interval(raw)?).await?,
        None => state.scheduler.delete_task_for_user(&id).await?,
    }
    Ok(Json(json!({"ok": true, "interval": Interval::Disabled})))
}

/// Run the sync once, now, and return the digest inline.
pub async fn generate(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let digest = match state.pipeline.run(&id).await {
        Ok(digest) => digest,
        Err(e) if e.is_informational() => {
            return Ok(Json(json!({"ok": true, "message": NOTHING_NEW})));
        }
        Err(e) => return Err(e.into()),
    };

    let image = tokio::fs::read(&digest.artifact)
        .await
        .map_err(|e| ApiError::Internal(format!("Read word cloud: {e}")))?;
    if let Err(e) = tokio::fs::remove_file(&digest.artifact).await {
        tracing::debug!("Artifact cleanup failed for {}: {e}", digest.artifact.display());
    }

    Ok(Json(json!({
        "ok": true,
        "summary": digest.summary,
        "matched": digest.matched,
        "content_type": "image/svg+xml",
        "image": base64::engine::general_purpose::STANDARD.encode(image),
    })))
}

/// Registry diagnostic: interval → members, with worker state.
pub async fn task_list(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "tasks": state.scheduler.snapshot(),
        "groups": state.scheduler.groups(),
    }))
}
