use serde::Serialize;
use sha2::{Digest, Sha256};
use time::{Date, OffsetDateTime};

time::serde::format_description!(date_key, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Morning,
    BeforeWork,
    StreakRisk,
}

impl Slot {
    /// Fixed evaluation order for one tick.
    pub const ORDER: [Slot; 3] = [Slot::Morning, Slot::BeforeWork, Slot::StreakRisk];

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Morning => "morning",
            Slot::BeforeWork => "beforeWork",
            Slot::StreakRisk => "streakRisk",
        }
    }
}

/// Wall-clock reminder time. Compared numerically, never as strings, so an
/// unpadded "9:15" and "09:15" are the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub struct ReminderTime {
    pub hour: u8,
    pub minute: u8,
}

impl ReminderTime {
    pub fn parse(raw: &str) -> Option<Self> {
        let (hour, minute) = raw.split_once(':')?;
        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return None;
        }
        if !hour.bytes().all(|b| b.is_ascii_digit()) || !minute.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let hour: u8 = hour.parse().ok()?;
        let minute: u8 = minute.parse().ok()?;
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self { hour, minute })
    }
}

impl std::fmt::Display for ReminderTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl From<ReminderTime> for String {
    fn from(time: ReminderTime) -> Self {
        time.to_string()
    }
}

/// A slot with no parseable time is `None` and never fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReminderTimes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub morning: Option<ReminderTime>,
    #[serde(rename = "beforeWork", skip_serializing_if = "Option::is_none")]
    pub before_work: Option<ReminderTime>,
    #[serde(rename = "streakRisk", skip_serializing_if = "Option::is_none")]
    pub streak_risk: Option<ReminderTime>,
}

impl ReminderTimes {
    pub fn get(&self, slot: Slot) -> Option<ReminderTime> {
        match slot {
            Slot::Morning => self.morning,
            Slot::BeforeWork => self.before_work,
            Slot::StreakRisk => self.streak_risk,
        }
    }

    pub fn set(&mut self, slot: Slot, time: ReminderTime) {
        match slot {
            Slot::Morning => self.morning = Some(time),
            Slot::BeforeWork => self.before_work = Some(time),
            Slot::StreakRisk => self.streak_risk = Some(time),
        }
    }
}

/// Last calendar date (in the subscriber's zone) each slot was delivered.
/// A dated record self-expires when the date rolls over; no reset step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LastSent {
    #[serde(skip_serializing_if = "Option::is_none", with = "date_key::option")]
    pub morning: Option<Date>,
    #[serde(
        rename = "beforeWork",
        skip_serializing_if = "Option::is_none",
        with = "date_key::option"
    )]
    pub before_work: Option<Date>,
    #[serde(
        rename = "streakRisk",
        skip_serializing_if = "Option::is_none",
        with = "date_key::option"
    )]
    pub streak_risk: Option<Date>,
}

impl LastSent {
    pub fn get(&self, slot: Slot) -> Option<Date> {
        match slot {
            Slot::Morning => self.morning,
            Slot::BeforeWork => self.before_work,
            Slot::StreakRisk => self.streak_risk,
        }
    }

    pub fn set(&mut self, slot: Slot, date: Date) {
        match slot {
            Slot::Morning => self.morning = Some(date),
            Slot::BeforeWork => self.before_work = Some(date),
            Slot::StreakRisk => self.streak_risk = Some(date),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.morning.is_none() && self.before_work.is_none() && self.streak_risk.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub endpoint: String,
    pub keys: SubscriptionKeys,
    pub times: ReminderTimes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "LastSent::is_empty")]
    pub last_sent: LastSent,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub created_at: Option<OffsetDateTime>,
}

impl Subscription {
    /// Content-addressed identifier: re-subscribing the same endpoint always
    /// resolves to the same id.
    pub fn id_for_endpoint(endpoint: &str) -> String {
        hex::encode(Sha256::digest(endpoint.as_bytes()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderPayload {
    pub title: &'static str,
    pub body: &'static str,
    pub url: &'static str,
}

#[derive(Debug, Clone)]
pub struct VapidConfig {
    pub private_key: String,
    pub public_key: String,
    pub subject: String,
}

pub fn parse_date_key(raw: &str) -> Option<Date> {
    let format = time::macros::format_description!("[year]-[month]-[day]");
    Date::parse(raw, &format).ok()
}

pub fn sanitize_timezone(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() || raw.len() > 64 {
        return None;
    }
    Some(raw.to_string())
}
