use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use coachline_core::notification::Channel;
use coachline_core::user::{DeviceToken, NotificationPreferences, Platform, PreferenceUpdate};
use coachline_notify::{DispatchResult, NotificationEvent};
use coachline_shared::pii::Masked;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::{admin_auth_middleware, customer_auth_middleware, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceRequest {
    pub token: String,
    pub platform: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub user_id: Uuid,
    pub event_type: String,
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let customer = Router::new()
        .route("/v1/notifications/preferences", get(get_preferences).put(update_preferences))
        .route("/v1/notifications/devices", post(register_device))
        .route_layer(from_fn_with_state(state.clone(), customer_auth_middleware));

    let internal = Router::new()
        .route("/v1/notifications/dispatch", post(dispatch))
        .route_layer(from_fn_with_state(state, admin_auth_middleware));

    customer.merge(internal)
}

/// GET /v1/notifications/preferences
pub async fn get_preferences(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<NotificationPreferences>, AppError> {
    Ok(Json(state.preferences.get_preferences(user.id).await?))
}

/// PUT /v1/notifications/preferences
pub async fn update_preferences(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(update): Json<PreferenceUpdate>,
) -> Result<Json<NotificationPreferences>, AppError> {
    let preferences = state.preferences.update_preferences(user.id, update).await?;
    info!("Notification preferences updated for user {}", user.id);
    Ok(Json(preferences))
}

/// POST /v1/notifications/devices
pub async fn register_device(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<RegisterDeviceRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let token = req.token.trim();
    if token.is_empty() {
        return Err(AppError::ValidationError("Device token must not be empty".to_string()));
    }
    let platform = Platform::parse(&req.platform.to_uppercase())
        .ok_or_else(|| AppError::ValidationError(format!("Unknown platform: {}", req.platform)))?;

    state
        .users
        .register_device(DeviceToken {
            user_id: user.id,
            token: Masked(token.to_string()),
            platform,
            is_active: true,
            updated_at: Utc::now(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "platform": platform, "isActive": true })),
    ))
}

/// POST /v1/notifications/dispatch (internal)
pub async fn dispatch(
    State(state): State<AppState>,
    Json(req): Json<DispatchRequest>,
) -> Result<Json<DispatchResult>, AppError> {
    if req.event_type.trim().is_empty() {
        return Err(AppError::ValidationError("eventType must not be empty".to_string()));
    }

    let event = NotificationEvent {
        user_id: req.user_id,
        event_type: req.event_type,
        channels: req.channels,
        title: req.title,
        body: req.body,
        data: if req.data.is_null() { json!({}) } else { req.data },
    };

    Ok(Json(state.dispatcher.dispatch(&event).await?))
}
