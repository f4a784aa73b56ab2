use crate::adapters::RestKvStore;
use crate::config::AppConfig;
use crate::store::SubscriptionStore;

#[derive(Clone)]
pub struct AppState<K> {
    pub config: AppConfig,
    pub store: Option<SubscriptionStore<K>>,
}

impl AppState<RestKvStore> {
    pub fn from_config(config: AppConfig) -> Self {
        let store = match (config.kv_url.as_deref(), config.kv_token.as_deref()) {
            (Some(url), Some(token)) => Some(SubscriptionStore::new(
                RestKvStore::new(url, token),
                config.kv_key.clone(),
            )),
            _ => {
                eprintln!("key-value store not configured: subscriptions are unavailable");
                None
            }
        };
        Self { config, store }
    }
}
