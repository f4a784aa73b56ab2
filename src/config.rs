use crate::reminders::DuePolicy;

#[derive(Clone)]
pub struct AppConfig {
    pub cron_secret: Option<String>,
    pub vapid_private_key: Option<String>,
    pub vapid_public_key: Option<String>,
    pub vapid_subject: Option<String>,
    pub kv_url: Option<String>,
    pub kv_token: Option<String>,
    pub kv_key: String,
    pub due_policy: DuePolicy,
    pub internal_ticker: bool,
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cron_secret: None,
            vapid_private_key: None,
            vapid_public_key: None,
            vapid_subject: None,
            kv_url: None,
            kv_token: None,
            kv_key: "beforework:subscriptions".to_string(),
            due_policy: DuePolicy::default(),
            internal_ticker: false,
        }
    }
}
