use crate::config::AppConfig;
use crate::ports::KvStore;
use crate::state::AppState;

use axum::Router;
use axum::routing::get;
use axum::routing::post;
use serde::Serialize;

mod reminders;
mod subscriptions;

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: &'static str,
}

pub fn app(config: AppConfig) -> Router {
    router(AppState::from_config(config))
}

pub(crate) fn router<K: KvStore>(state: AppState<K>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/push/public-key", get(subscriptions::public_key::<K>))
        .route("/api/push/subscribe", post(subscriptions::subscribe::<K>))
        .route(
            "/api/push/unsubscribe",
            post(subscriptions::unsubscribe::<K>),
        )
        .route(
            "/api/push/update-times",
            post(subscriptions::update_times::<K>),
        )
        .route(
            "/api/cron/send-reminders",
            get(reminders::send_reminders::<K>),
        )
        .route("/api/cron/check-store", get(reminders::check_store::<K>))
        .with_state(state)
}

pub(crate) async fn health() -> &'static str {
    "ok"
}
