use crate::adapters::{TokioTimeProvider, WebPushTransport};
use crate::config::AppConfig;
use crate::ports::KvStore;
use crate::reminders::{ReminderScheduler, TickReport};
use crate::state::AppState;
use crate::vapid::{VapidConfigStatus, load_vapid_config};

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use serde::Deserialize;
use serde::Serialize;

use super::ErrorResponse;

#[derive(Deserialize)]
pub(crate) struct CronQuery {
    #[serde(default)]
    secret: Option<String>,
}

/// Trigger auth: a bearer header from the cron infrastructure, or the same
/// secret as a query parameter for triggers that cannot set headers. No
/// configured secret means every trigger call is rejected.
fn is_authorized(config: &AppConfig, headers: &HeaderMap, query_secret: Option<&str>) -> bool {
    let Some(secret) = config.cron_secret.as_deref() else {
        return false;
    };
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    bearer == Some(secret) || query_secret == Some(secret)
}

fn unauthorized() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: "unauthorized",
        }),
    )
}

pub(crate) async fn send_reminders<K: KvStore>(
    State(state): State<AppState<K>>,
    Query(query): Query<CronQuery>,
    headers: HeaderMap,
) -> Result<Json<TickReport>, (StatusCode, Json<ErrorResponse>)> {
    if !is_authorized(&state.config, &headers, query.secret.as_deref()) {
        return Err(unauthorized());
    }
    let Some(store) = state.store.as_ref() else {
        // No store configured: zero subscriptions, nothing to do.
        return Ok(Json(TickReport {
            persisted: true,
            ..TickReport::default()
        }));
    };
    let vapid = match load_vapid_config(&state.config) {
        VapidConfigStatus::Ready(vapid) => vapid,
        VapidConfigStatus::Incomplete | VapidConfigStatus::Missing => {
            return Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: "push notifications are not configured",
                }),
            ));
        }
    };
    let transport = WebPushTransport::new(vapid).map_err(|err| {
        eprintln!("failed to init web-push: {err}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "failed to initialize push sender",
            }),
        )
    })?;
    let scheduler = ReminderScheduler::new(TokioTimeProvider, transport, state.config.due_policy);
    Ok(Json(scheduler.tick(store).await))
}

#[derive(Serialize)]
pub(crate) struct StoreStatusResponse {
    pub(crate) store: &'static str,
    #[serde(rename = "subsCount")]
    pub(crate) subs_count: usize,
}

/// Deployment diagnostics: confirms which backing store this process reads
/// and how many subscribers it currently sees.
pub(crate) async fn check_store<K: KvStore>(
    State(state): State<AppState<K>>,
    Query(query): Query<CronQuery>,
    headers: HeaderMap,
) -> Result<Json<StoreStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    if !is_authorized(&state.config, &headers, query.secret.as_deref()) {
        return Err(unauthorized());
    }
    let Some(store) = state.store.as_ref() else {
        return Ok(Json(StoreStatusResponse {
            store: "unconfigured",
            subs_count: 0,
        }));
    };
    match store.try_list().await {
        Ok(subscriptions) => Ok(Json(StoreStatusResponse {
            store: "ok",
            subs_count: subscriptions.len(),
        })),
        Err(err) => {
            eprintln!("store check failed: {err}");
            Ok(Json(StoreStatusResponse {
                store: "error",
                subs_count: 0,
            }))
        }
    }
}
