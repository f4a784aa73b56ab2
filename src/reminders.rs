use std::time::Duration;

use time::OffsetDateTime;

use crate::adapters::{TokioTimeProvider, WebPushTransport};
use crate::ports::{KvStore, TimeProvider};
use crate::state::AppState;
use crate::types::push::{ReminderPayload, Slot};
use crate::vapid::{VapidConfigStatus, load_vapid_config};

mod scheduler;

pub use scheduler::{DuePolicy, ReminderScheduler, TickReport};

pub fn payload_for(slot: Slot) -> ReminderPayload {
    match slot {
        Slot::Morning => ReminderPayload {
            title: "Before Work",
            body: "Workout = commute. Start now.",
            url: "/",
        },
        Slot::BeforeWork => ReminderPayload {
            title: "Before Work",
            body: "Log your workout before work starts.",
            url: "/",
        },
        Slot::StreakRisk => ReminderPayload {
            title: "Before Work",
            body: "Streak at risk. 10 minutes still counts.",
            url: "/",
        },
    }
}

/// Optional in-process trigger: one tick per minute, aligned to minute
/// boundaries, for deployments without an external cron. The HTTP trigger
/// endpoint stays available either way.
pub fn maybe_start_ticker<K: KvStore>(state: &AppState<K>) -> Option<tokio::task::JoinHandle<()>> {
    if !state.config.internal_ticker {
        return None;
    }
    let Some(store) = state.store.clone() else {
        eprintln!("internal ticker disabled: no key-value store configured");
        return None;
    };
    let vapid = match load_vapid_config(&state.config) {
        VapidConfigStatus::Ready(vapid) => vapid,
        VapidConfigStatus::Incomplete => {
            eprintln!("internal ticker disabled: incomplete VAPID configuration");
            return None;
        }
        VapidConfigStatus::Missing => {
            eprintln!("internal ticker disabled: missing VAPID configuration");
            return None;
        }
    };
    let transport = match WebPushTransport::new(vapid) {
        Ok(transport) => transport,
        Err(err) => {
            eprintln!("internal ticker disabled: failed to init web-push ({err})");
            return None;
        }
    };

    let scheduler = ReminderScheduler::new(TokioTimeProvider, transport, state.config.due_policy);
    Some(tokio::spawn(async move {
        let time = TokioTimeProvider;
        loop {
            time.sleep(delay_until_next_minute(time.now())).await;
            let report = scheduler.tick(&store).await;
            if report.sent > 0 || report.deleted > 0 || report.failed > 0 || !report.persisted {
                eprintln!(
                    "reminder tick: sent {}, deleted {}, failed {}, persisted {}",
                    report.sent, report.deleted, report.failed, report.persisted
                );
            }
        }
    }))
}

fn delay_until_next_minute(now: OffsetDateTime) -> Duration {
    let second = u64::from(now.second()).min(59);
    Duration::from_secs(60 - second)
}
