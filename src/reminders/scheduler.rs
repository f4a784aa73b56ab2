use serde::Serialize;
use time::{Date, OffsetDateTime};
use time_tz::{OffsetDateTimeExt, timezones};

use crate::ports::{KvStore, PushTransport, SendError, TimeProvider};
use crate::store::SubscriptionStore;
use crate::types::push::{ReminderTime, Slot};

use super::payload_for;

/// Exact-minute is the primary policy and assumes a reliable per-minute
/// trigger. Catch-up fires any time past the schedule and exists for coarser
/// cadences; after downtime it can fire several backlogged slots in close
/// succession. The two are never mixed within a deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuePolicy {
    #[default]
    ExactMinute,
    CatchUp,
}

impl DuePolicy {
    fn is_due(self, now: ReminderTime, scheduled: ReminderTime) -> bool {
        match self {
            DuePolicy::ExactMinute => now == scheduled,
            DuePolicy::CatchUp => now >= scheduled,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub processed: usize,
    pub sent: usize,
    pub deleted: usize,
    pub failed: usize,
    pub persisted: bool,
}

#[derive(Debug, Clone)]
pub struct ReminderScheduler<T, P> {
    time: T,
    transport: P,
    policy: DuePolicy,
}

impl<T, P> ReminderScheduler<T, P>
where
    T: TimeProvider,
    P: PushTransport,
{
    pub fn new(time: T, transport: P, policy: DuePolicy) -> Self {
        Self {
            time,
            transport,
            policy,
        }
    }

    /// One tick: evaluate every subscription against its local clock, send
    /// at most one due slot each, and persist the whole collection once at
    /// the end. Sends that land before a failed persist are not rolled
    /// back; the un-advanced `lastSent` is retried on a later tick.
    pub async fn tick<K: KvStore>(&self, store: &SubscriptionStore<K>) -> TickReport {
        let subscriptions = match store.try_list().await {
            Ok(subscriptions) => subscriptions,
            Err(err) => {
                // Persisting after a failed read would overwrite the
                // collection with a stale pre-image; skip the whole tick.
                eprintln!("reminder tick skipped: store read failed: {err}");
                return TickReport::default();
            }
        };

        let now_utc = self.time.now();
        let mut report = TickReport {
            processed: subscriptions.len(),
            ..TickReport::default()
        };
        let mut remaining = Vec::with_capacity(subscriptions.len());

        for mut subscription in subscriptions {
            let (today, now) = local_clock(now_utc, subscription.timezone.as_deref());
            let mut expired = false;

            for slot in Slot::ORDER {
                let Some(scheduled) = subscription.times.get(slot) else {
                    continue;
                };
                if subscription.last_sent.get(slot) == Some(today) {
                    continue;
                }
                if !self.policy.is_due(now, scheduled) {
                    continue;
                }

                match self.transport.send(&subscription, &payload_for(slot)).await {
                    Ok(()) => {
                        subscription.last_sent.set(slot, today);
                        report.sent += 1;
                        break;
                    }
                    Err(SendError::Expired) => {
                        eprintln!("removing expired subscription {}", subscription.id);
                        report.deleted += 1;
                        expired = true;
                        break;
                    }
                    Err(SendError::Transient(detail)) => {
                        eprintln!(
                            "push failed for {} ({}): {detail}",
                            subscription.id,
                            slot.as_str()
                        );
                        report.failed += 1;
                    }
                }
            }

            if !expired {
                remaining.push(subscription);
            }
        }

        report.persisted = store.replace_all(&remaining).await;
        report
    }
}

/// Calendar date and wall-clock minute in the subscriber's zone; unknown or
/// absent zones evaluate in UTC.
fn local_clock(now_utc: OffsetDateTime, timezone: Option<&str>) -> (Date, ReminderTime) {
    let local = timezone
        .and_then(timezones::get_by_name)
        .map(|tz| now_utc.to_timezone(tz))
        .unwrap_or(now_utc);
    (
        local.date(),
        ReminderTime {
            hour: local.hour(),
            minute: local.minute(),
        },
    )
}
