use crate::ports::KvStore;
use crate::registrar::{self, NewSubscription, TimesPatch};
use crate::state::AppState;
use crate::store::SubscriptionStore;
use crate::vapid::{VapidConfigStatus, load_vapid_config};

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use super::ErrorResponse;

fn configured_store<K: KvStore>(state: &AppState<K>) -> Option<&SubscriptionStore<K>> {
    if !matches!(load_vapid_config(&state.config), VapidConfigStatus::Ready(_)) {
        return None;
    }
    state.store.as_ref()
}

fn not_configured() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: "push not configured (missing VAPID or store)",
        }),
    )
}

#[derive(Serialize)]
pub(crate) struct PublicKeyResponse {
    #[serde(rename = "publicKey")]
    pub(crate) public_key: String,
}

pub(crate) async fn public_key<K: KvStore>(
    State(state): State<AppState<K>>,
) -> Result<Json<PublicKeyResponse>, (StatusCode, Json<ErrorResponse>)> {
    let key = state
        .config
        .vapid_public_key
        .as_deref()
        .map(str::trim)
        .unwrap_or("");
    if key.is_empty() {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "VAPID public key not configured",
            }),
        ));
    }
    Ok(Json(PublicKeyResponse {
        public_key: key.to_string(),
    }))
}

#[derive(Deserialize)]
pub(crate) struct SubscribeRequest {
    subscription: SubscriptionBody,
    times: TimesBody,
    #[serde(default)]
    timezone: Option<String>,
}

#[derive(Deserialize)]
struct SubscriptionBody {
    endpoint: String,
    keys: KeysBody,
}

#[derive(Deserialize)]
struct KeysBody {
    p256dh: String,
    auth: String,
}

#[derive(Deserialize)]
struct TimesBody {
    morning: String,
    #[serde(rename = "beforeWork")]
    before_work: String,
    #[serde(rename = "streakRisk")]
    streak_risk: String,
}

#[derive(Serialize)]
pub(crate) struct SubscribeResponse {
    pub(crate) ok: bool,
    #[serde(rename = "subsCount")]
    pub(crate) subs_count: usize,
}

pub(crate) async fn subscribe<K: KvStore>(
    State(state): State<AppState<K>>,
    Json(request): Json<SubscribeRequest>,
) -> Result<Json<SubscribeResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Some(store) = configured_store(&state) else {
        return Err(not_configured());
    };
    let outcome = registrar::subscribe(
        store,
        NewSubscription {
            endpoint: request.subscription.endpoint,
            p256dh: request.subscription.keys.p256dh,
            auth: request.subscription.keys.auth,
            morning: request.times.morning,
            before_work: request.times.before_work,
            streak_risk: request.times.streak_risk,
            timezone: request.timezone,
        },
        OffsetDateTime::now_utc(),
    )
    .await
    .map_err(|err| (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: err.as_str() })))?;
    Ok(Json(SubscribeResponse {
        ok: outcome.persisted,
        subs_count: outcome.subs_count,
    }))
}

#[derive(Deserialize)]
pub(crate) struct UnsubscribeRequest {
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct UnsubscribeResponse {
    pub(crate) ok: bool,
    pub(crate) removed: bool,
}

pub(crate) async fn unsubscribe<K: KvStore>(
    State(state): State<AppState<K>>,
    Json(request): Json<UnsubscribeRequest>,
) -> Result<Json<UnsubscribeResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Some(store) = configured_store(&state) else {
        return Err(not_configured());
    };
    let key = request
        .endpoint
        .as_deref()
        .filter(|endpoint| !endpoint.is_empty())
        .or(request.id.as_deref().filter(|id| !id.is_empty()));
    let Some(key) = key else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "missing endpoint or id",
            }),
        ));
    };
    let removed = registrar::unsubscribe(store, key).await;
    Ok(Json(UnsubscribeResponse { ok: true, removed }))
}

#[derive(Deserialize)]
pub(crate) struct UpdateTimesRequest {
    endpoint: String,
    times: PartialTimesBody,
}

#[derive(Deserialize)]
struct PartialTimesBody {
    #[serde(default)]
    morning: Option<String>,
    #[serde(default, rename = "beforeWork")]
    before_work: Option<String>,
    #[serde(default, rename = "streakRisk")]
    streak_risk: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct UpdateTimesResponse {
    pub(crate) ok: bool,
    pub(crate) updated: bool,
}

pub(crate) async fn update_times<K: KvStore>(
    State(state): State<AppState<K>>,
    Json(request): Json<UpdateTimesRequest>,
) -> Result<Json<UpdateTimesResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Some(store) = configured_store(&state) else {
        return Err(not_configured());
    };
    if request.endpoint.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "missing endpoint",
            }),
        ));
    }
    let updated = registrar::update_reminder_times(
        store,
        &request.endpoint,
        TimesPatch {
            morning: request.times.morning,
            before_work: request.times.before_work,
            streak_risk: request.times.streak_risk,
        },
    )
    .await;
    Ok(Json(UpdateTimesResponse { ok: true, updated }))
}
