use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::ports::KvStore;
use crate::types::push::{
    LastSent, ReminderTime, ReminderTimes, Subscription, SubscriptionKeys, parse_date_key,
    sanitize_timezone,
};

/// The whole collection is the only consistency unit: one JSON array under
/// one key, read at the start and written back at the end of an operation.
#[derive(Clone)]
pub struct SubscriptionStore<K> {
    kv: K,
    key: String,
}

impl<K: KvStore> SubscriptionStore<K> {
    pub fn new(kv: K, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    /// Raw load, surfacing store errors. The scheduler uses this to tell a
    /// read failure apart from an empty collection and skip its end-of-tick
    /// persist instead of overwriting with a stale empty pre-image.
    pub async fn try_list(&self) -> Result<Vec<Subscription>, K::Error> {
        let raw = self.kv.get(&self.key).await?;
        Ok(match raw {
            Some(raw) => decode_collection(&raw),
            None => Vec::new(),
        })
    }

    pub async fn list(&self) -> Vec<Subscription> {
        match self.try_list().await {
            Ok(subscriptions) => subscriptions,
            Err(err) => {
                eprintln!("subscription store read failed, treating as empty: {err}");
                Vec::new()
            }
        }
    }

    pub async fn replace_all(&self, subscriptions: &[Subscription]) -> bool {
        let encoded = match serde_json::to_string(subscriptions) {
            Ok(encoded) => encoded,
            Err(err) => {
                eprintln!("subscription store encode failed: {err}");
                return false;
            }
        };
        match self.kv.set(&self.key, &encoded).await {
            Ok(()) => true,
            Err(err) => {
                eprintln!("subscription store write failed: {err}");
                false
            }
        }
    }

    pub async fn upsert_by_endpoint(&self, record: Subscription) -> bool {
        let mut subscriptions = self.list().await;
        subscriptions.retain(|existing| existing.endpoint != record.endpoint);
        subscriptions.push(record);
        self.replace_all(&subscriptions).await
    }

    pub async fn delete_by_id_or_endpoint(&self, key: &str) -> bool {
        let subscriptions = self.list().await;
        let remaining: Vec<Subscription> = subscriptions
            .iter()
            .filter(|subscription| subscription.id != key && subscription.endpoint != key)
            .cloned()
            .collect();
        if remaining.len() == subscriptions.len() {
            return false;
        }
        self.replace_all(&remaining).await
    }
}

fn decode_collection(raw: &str) -> Vec<Subscription> {
    let parsed: serde_json::Value = match serde_json::from_str(raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("subscription store holds malformed JSON, treating as empty: {err}");
            return Vec::new();
        }
    };
    let values = match parsed {
        serde_json::Value::Array(values) => values,
        _ => {
            eprintln!("subscription store holds non-array data, treating as empty");
            return Vec::new();
        }
    };
    let total = values.len();
    let subscriptions: Vec<Subscription> = values.into_iter().filter_map(normalize_record).collect();
    let dropped = total - subscriptions.len();
    if dropped > 0 {
        eprintln!("subscription store: dropped {dropped} record(s) that failed validation");
    }
    subscriptions
}

// Stored records come in several historical shapes: flat (current), nested
// under `subscription` (legacy), and with `lastSent` as either per-slot
// dates (current) or a day plus booleans (legacy). All are upgraded to the
// canonical shape here, once, at load time.

#[derive(Deserialize)]
struct RawRecord {
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    subscription: Option<RawNestedSubscription>,
    #[serde(default)]
    keys: Option<RawKeys>,
    #[serde(default)]
    times: Option<RawTimes>,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default, rename = "lastSent")]
    last_sent: Option<RawLastSent>,
    #[serde(default, rename = "createdAt")]
    created_at: Option<String>,
}

#[derive(Deserialize)]
struct RawNestedSubscription {
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    keys: Option<RawKeys>,
}

#[derive(Deserialize)]
struct RawKeys {
    #[serde(default)]
    p256dh: Option<String>,
    #[serde(default)]
    auth: Option<String>,
}

#[derive(Deserialize)]
struct RawTimes {
    #[serde(default)]
    morning: Option<String>,
    #[serde(default, rename = "beforeWork")]
    before_work: Option<String>,
    #[serde(default, rename = "streakRisk")]
    streak_risk: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLastSent {
    PerSlotDates {
        #[serde(default)]
        morning: Option<String>,
        #[serde(default, rename = "beforeWork")]
        before_work: Option<String>,
        #[serde(default, rename = "streakRisk")]
        streak_risk: Option<String>,
    },
    DayFlags {
        date: String,
        #[serde(default)]
        morning: bool,
        #[serde(default, rename = "beforeWork")]
        before_work: bool,
        #[serde(default, rename = "streakRisk")]
        streak_risk: bool,
    },
}

fn normalize_record(value: serde_json::Value) -> Option<Subscription> {
    let raw: RawRecord = serde_json::from_value(value).ok()?;
    let nested = raw.subscription;
    let endpoint = raw
        .endpoint
        .or_else(|| nested.as_ref().and_then(|nested| nested.endpoint.clone()))
        .filter(|endpoint| !endpoint.trim().is_empty())?;
    let keys = raw.keys.or_else(|| nested.and_then(|nested| nested.keys))?;
    let (p256dh, auth) = match (keys.p256dh, keys.auth) {
        (Some(p256dh), Some(auth)) if !p256dh.is_empty() && !auth.is_empty() => (p256dh, auth),
        _ => return None,
    };
    let times = raw.times?;
    // A time that fails to parse leaves its slot unset, so it never fires.
    let times = ReminderTimes {
        morning: times.morning.as_deref().and_then(ReminderTime::parse),
        before_work: times.before_work.as_deref().and_then(ReminderTime::parse),
        streak_risk: times.streak_risk.as_deref().and_then(ReminderTime::parse),
    };
    let last_sent = raw.last_sent.map(normalize_last_sent).unwrap_or_default();
    let created_at = raw
        .created_at
        .as_deref()
        .and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok());
    Some(Subscription {
        id: Subscription::id_for_endpoint(&endpoint),
        endpoint,
        keys: SubscriptionKeys { p256dh, auth },
        times,
        timezone: sanitize_timezone(raw.timezone.as_deref()),
        last_sent,
        created_at,
    })
}

fn normalize_last_sent(raw: RawLastSent) -> LastSent {
    match raw {
        RawLastSent::PerSlotDates {
            morning,
            before_work,
            streak_risk,
        } => LastSent {
            morning: morning.as_deref().and_then(parse_date_key),
            before_work: before_work.as_deref().and_then(parse_date_key),
            streak_risk: streak_risk.as_deref().and_then(parse_date_key),
        },
        RawLastSent::DayFlags {
            date,
            morning,
            before_work,
            streak_risk,
        } => {
            let date = parse_date_key(&date);
            LastSent {
                morning: if morning { date } else { None },
                before_work: if before_work { date } else { None },
                streak_risk: if streak_risk { date } else { None },
            }
        }
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::adapters::MemoryKvStore;
    use crate::ports;
    use std::future::{Ready, ready};
    use time::macros::date;

    #[derive(Clone, Default)]
    struct FailingKvStore;

    impl ports::KvStore for FailingKvStore {
        type Error = String;
        type GetFut<'a>
            = Ready<Result<Option<String>, String>>
        where
            Self: 'a;
        type SetFut<'a>
            = Ready<Result<(), String>>
        where
            Self: 'a;

        fn get<'a>(&'a self, _key: &'a str) -> Self::GetFut<'a> {
            ready(Err("kv offline".to_string()))
        }

        fn set<'a>(&'a self, _key: &'a str, _value: &'a str) -> Self::SetFut<'a> {
            ready(Err("kv offline".to_string()))
        }
    }

    fn subscription(endpoint: &str) -> Subscription {
        Subscription {
            id: Subscription::id_for_endpoint(endpoint),
            endpoint: endpoint.to_string(),
            keys: SubscriptionKeys {
                p256dh: "p256".to_string(),
                auth: "auth".to_string(),
            },
            times: ReminderTimes {
                morning: ReminderTime::parse("06:30"),
                before_work: ReminderTime::parse("08:00"),
                streak_risk: ReminderTime::parse("20:00"),
            },
            timezone: Some("Asia/Karachi".to_string()),
            last_sent: LastSent::default(),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn list__should_return_empty_when_backing_store_has_no_data() {
        // Given
        let store = SubscriptionStore::new(MemoryKvStore::default(), "subs");

        // Then
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn list__should_degrade_to_empty_when_backing_store_is_unreachable() {
        // Given
        let store = SubscriptionStore::new(FailingKvStore, "subs");

        // Then
        assert!(store.list().await.is_empty());
        assert!(store.try_list().await.is_err());
    }

    #[tokio::test]
    async fn replace_all__should_report_write_failures() {
        // Given
        let store = SubscriptionStore::new(FailingKvStore, "subs");

        // Then
        assert!(!store.replace_all(&[subscription("https://push.example/1")]).await);
    }

    #[tokio::test]
    async fn upsert_by_endpoint__should_round_trip_a_record() {
        // Given
        let store = SubscriptionStore::new(MemoryKvStore::default(), "subs");
        let mut record = subscription("https://push.example/1");
        record.last_sent.set(crate::types::push::Slot::Morning, date!(2026 - 08 - 05));

        // When
        assert!(store.upsert_by_endpoint(record.clone()).await);
        let listed = store.list().await;

        // Then
        assert_eq!(listed, vec![record]);
    }

    #[tokio::test]
    async fn upsert_by_endpoint__should_replace_the_record_for_the_same_endpoint() {
        // Given
        let store = SubscriptionStore::new(MemoryKvStore::default(), "subs");
        let first = subscription("https://push.example/1");
        let mut second = subscription("https://push.example/1");
        second.times.morning = ReminderTime::parse("07:45");

        // When
        store.upsert_by_endpoint(first).await;
        store.upsert_by_endpoint(second.clone()).await;
        let listed = store.list().await;

        // Then
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].times.morning, ReminderTime::parse("07:45"));
    }

    #[tokio::test]
    async fn delete_by_id_or_endpoint__should_match_either_key() {
        // Given
        let store = SubscriptionStore::new(MemoryKvStore::default(), "subs");
        store.upsert_by_endpoint(subscription("https://push.example/1")).await;
        store.upsert_by_endpoint(subscription("https://push.example/2")).await;

        // When
        let removed_by_id = store
            .delete_by_id_or_endpoint(&Subscription::id_for_endpoint("https://push.example/1"))
            .await;
        let removed_by_endpoint = store.delete_by_id_or_endpoint("https://push.example/2").await;
        let removed_missing = store.delete_by_id_or_endpoint("https://push.example/3").await;

        // Then
        assert!(removed_by_id);
        assert!(removed_by_endpoint);
        assert!(!removed_missing);
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn list__should_upgrade_legacy_nested_records_with_day_flags() {
        // Given
        let kv = MemoryKvStore::default();
        let raw = r#"[{
            "endpoint": "https://push.example/legacy",
            "subscription": {
                "endpoint": "https://push.example/legacy",
                "keys": {"p256dh": "p256", "auth": "auth"},
                "expirationTime": null
            },
            "times": {"morning": "6:30", "beforeWork": "08:00", "streakRisk": "20:00"},
            "timezone": "Asia/Karachi",
            "lastSent": {"date": "2026-08-05", "morning": true, "beforeWork": false}
        }]"#;
        ports::KvStore::set(&kv, "subs", raw).await.expect("seed kv");
        let store = SubscriptionStore::new(kv, "subs");

        // When
        let listed = store.list().await;

        // Then
        assert_eq!(listed.len(), 1);
        let record = &listed[0];
        assert_eq!(record.id, Subscription::id_for_endpoint("https://push.example/legacy"));
        assert_eq!(record.times.morning, ReminderTime::parse("06:30"));
        assert_eq!(record.last_sent.morning, Some(date!(2026 - 08 - 05)));
        assert_eq!(record.last_sent.before_work, None);
        assert_eq!(record.last_sent.streak_risk, None);
        assert_eq!(record.timezone.as_deref(), Some("Asia/Karachi"));
    }

    #[tokio::test]
    async fn list__should_drop_records_that_fail_minimal_validation() {
        // Given
        let kv = MemoryKvStore::default();
        let raw = r#"[
            {"endpoint": "", "keys": {"p256dh": "p", "auth": "a"}, "times": {"morning": "06:30"}},
            {"endpoint": "https://push.example/nokeys", "times": {"morning": "06:30"}},
            {"endpoint": "https://push.example/notimes", "keys": {"p256dh": "p", "auth": "a"}},
            {"endpoint": "https://push.example/ok", "keys": {"p256dh": "p", "auth": "a"},
             "times": {"morning": "06:30", "beforeWork": "08:00", "streakRisk": "20:00"}}
        ]"#;
        ports::KvStore::set(&kv, "subs", raw).await.expect("seed kv");
        let store = SubscriptionStore::new(kv, "subs");

        // When
        let listed = store.list().await;

        // Then
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].endpoint, "https://push.example/ok");
    }

    #[tokio::test]
    async fn list__should_keep_records_with_malformed_slot_times_but_never_arm_those_slots() {
        // Given
        let kv = MemoryKvStore::default();
        let raw = r#"[{
            "endpoint": "https://push.example/1",
            "keys": {"p256dh": "p", "auth": "a"},
            "times": {"morning": "25:99", "beforeWork": "08:00", "streakRisk": "junk"}
        }]"#;
        ports::KvStore::set(&kv, "subs", raw).await.expect("seed kv");
        let store = SubscriptionStore::new(kv, "subs");

        // When
        let listed = store.list().await;

        // Then
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].times.morning, None);
        assert_eq!(listed[0].times.before_work, ReminderTime::parse("08:00"));
        assert_eq!(listed[0].times.streak_risk, None);
    }

    #[tokio::test]
    async fn list__should_treat_non_array_payloads_as_empty() {
        // Given
        let kv = MemoryKvStore::default();
        ports::KvStore::set(&kv, "subs", "{\"oops\": true}").await.expect("seed kv");
        let store = SubscriptionStore::new(kv, "subs");

        // Then
        assert!(store.list().await.is_empty());
    }
}
