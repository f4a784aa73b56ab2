use time::OffsetDateTime;

use crate::ports::KvStore;
use crate::store::SubscriptionStore;
use crate::types::push::{
    LastSent, ReminderTime, ReminderTimes, Slot, Subscription, SubscriptionKeys, sanitize_timezone,
};

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub morning: String,
    pub before_work: String,
    pub streak_risk: String,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrarError {
    MissingEndpoint,
    MissingKeys,
    InvalidTimes,
}

impl RegistrarError {
    pub fn as_str(self) -> &'static str {
        match self {
            RegistrarError::MissingEndpoint => "missing or empty subscription endpoint",
            RegistrarError::MissingKeys => "missing subscription keys",
            RegistrarError::InvalidTimes => "missing or invalid reminder times",
        }
    }
}

impl std::fmt::Display for RegistrarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SubscribeOutcome {
    pub persisted: bool,
    pub subs_count: usize,
}

/// Registering an endpoint that already exists replaces its record but keeps
/// `lastSent`, so a time-preference update cannot re-arm slots already
/// delivered today.
pub async fn subscribe<K: KvStore>(
    store: &SubscriptionStore<K>,
    request: NewSubscription,
    now: OffsetDateTime,
) -> Result<SubscribeOutcome, RegistrarError> {
    let endpoint = request.endpoint.trim().to_string();
    if endpoint.is_empty() {
        return Err(RegistrarError::MissingEndpoint);
    }
    if request.p256dh.is_empty() || request.auth.is_empty() {
        return Err(RegistrarError::MissingKeys);
    }
    let times = ReminderTimes {
        morning: Some(
            ReminderTime::parse(&request.morning).ok_or(RegistrarError::InvalidTimes)?,
        ),
        before_work: Some(
            ReminderTime::parse(&request.before_work).ok_or(RegistrarError::InvalidTimes)?,
        ),
        streak_risk: Some(
            ReminderTime::parse(&request.streak_risk).ok_or(RegistrarError::InvalidTimes)?,
        ),
    };

    let existing = store
        .list()
        .await
        .into_iter()
        .find(|subscription| subscription.endpoint == endpoint);
    let (last_sent, created_at) = match existing {
        Some(existing) => (existing.last_sent, existing.created_at),
        None => (LastSent::default(), Some(now)),
    };

    let record = Subscription {
        id: Subscription::id_for_endpoint(&endpoint),
        endpoint,
        keys: SubscriptionKeys {
            p256dh: request.p256dh,
            auth: request.auth,
        },
        times,
        timezone: sanitize_timezone(request.timezone.as_deref()),
        last_sent,
        created_at,
    };

    let persisted = store.upsert_by_endpoint(record).await;
    let subs_count = store.list().await.len();
    Ok(SubscribeOutcome {
        persisted,
        subs_count,
    })
}

pub async fn unsubscribe<K: KvStore>(store: &SubscriptionStore<K>, key: &str) -> bool {
    store.delete_by_id_or_endpoint(key).await
}

#[derive(Debug, Clone, Default)]
pub struct TimesPatch {
    pub morning: Option<String>,
    pub before_work: Option<String>,
    pub streak_risk: Option<String>,
}

/// Merges only the provided slots; values that fail to parse are dropped
/// without rejecting the rest of the patch.
pub async fn update_reminder_times<K: KvStore>(
    store: &SubscriptionStore<K>,
    endpoint_or_id: &str,
    patch: TimesPatch,
) -> bool {
    let mut subscriptions = store.list().await;
    let Some(record) = subscriptions
        .iter_mut()
        .find(|s| s.endpoint == endpoint_or_id || s.id == endpoint_or_id)
    else {
        return false;
    };

    let updates = [
        (Slot::Morning, patch.morning),
        (Slot::BeforeWork, patch.before_work),
        (Slot::StreakRisk, patch.streak_risk),
    ];
    for (slot, raw) in updates {
        if let Some(parsed) = raw.as_deref().and_then(ReminderTime::parse) {
            record.times.set(slot, parsed);
        }
    }

    store.replace_all(&subscriptions).await
}
