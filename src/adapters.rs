use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use time::OffsetDateTime;

use crate::ports;
use crate::ports::SendError;
use crate::types::push::{ReminderPayload, Subscription, VapidConfig};

const PAYLOAD_TTL_SECONDS: u32 = 60;

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimeProvider;

impl ports::TimeProvider for TokioTimeProvider {
    type Sleep<'a>
        = tokio::time::Sleep
    where
        Self: 'a;

    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a> {
        tokio::time::sleep(duration)
    }
}

#[derive(Clone)]
pub struct WebPushTransport {
    vapid: VapidConfig,
    client: Arc<web_push::WebPushClient>,
}

impl WebPushTransport {
    pub fn new(vapid: VapidConfig) -> Result<Self, web_push::WebPushError> {
        let client = web_push::WebPushClient::new()?;
        Ok(Self {
            vapid,
            client: Arc::new(client),
        })
    }
}

impl ports::PushTransport for WebPushTransport {
    type Fut<'a>
        = Pin<Box<dyn Future<Output = Result<(), SendError>> + Send + 'a>>
    where
        Self: 'a;

    fn send<'a>(
        &'a self,
        subscription: &'a Subscription,
        payload: &'a ReminderPayload,
    ) -> Self::Fut<'a> {
        Box::pin(async move {
            let subscription_info = web_push::SubscriptionInfo::new(
                subscription.endpoint.clone(),
                subscription.keys.p256dh.clone(),
                subscription.keys.auth.clone(),
            );
            let body = serde_json::to_vec(payload)
                .map_err(|err| SendError::Transient(err.to_string()))?;
            let mut builder =
                web_push::WebPushMessageBuilder::new(&subscription_info).map_err(classify)?;
            builder.set_payload(web_push::ContentEncoding::Aes128Gcm, &body);
            builder.set_ttl(PAYLOAD_TTL_SECONDS);
            let mut signature_builder = web_push::VapidSignatureBuilder::from_base64(
                &self.vapid.private_key,
                web_push::URL_SAFE_NO_PAD,
                &subscription_info,
            )
            .map_err(classify)?;
            signature_builder.add_claim("sub", self.vapid.subject.as_str());
            builder.set_vapid_signature(signature_builder.build().map_err(classify)?);
            self.client
                .send(builder.build().map_err(classify)?)
                .await
                .map_err(classify)
        })
    }
}

fn classify(err: web_push::WebPushError) -> SendError {
    match err {
        web_push::WebPushError::EndpointNotValid | web_push::WebPushError::EndpointNotFound => {
            SendError::Expired
        }
        other => SendError::Transient(other.to_string()),
    }
}

/// Upstash-style Redis REST API: `GET {base}/get/{key}` and
/// `POST {base}/set/{key}` with a bearer token, responses wrapped in
/// `{"result": ...}`.
#[derive(Clone)]
pub struct RestKvStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl RestKvStore {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum RestKvError {
    Request(reqwest::Error),
    Status(reqwest::StatusCode),
}

impl std::fmt::Display for RestKvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestKvError::Request(err) => write!(f, "kv request failed: {err}"),
            RestKvError::Status(status) => write!(f, "kv request returned {status}"),
        }
    }
}

#[derive(Deserialize)]
struct KvGetResponse {
    result: Option<String>,
}

impl ports::KvStore for RestKvStore {
    type Error = RestKvError;
    type GetFut<'a>
        = Pin<Box<dyn Future<Output = Result<Option<String>, RestKvError>> + Send + 'a>>
    where
        Self: 'a;
    type SetFut<'a>
        = Pin<Box<dyn Future<Output = Result<(), RestKvError>> + Send + 'a>>
    where
        Self: 'a;

    fn get<'a>(&'a self, key: &'a str) -> Self::GetFut<'a> {
        Box::pin(async move {
            let response = self
                .client
                .get(format!("{}/get/{key}", self.base_url))
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(RestKvError::Request)?;
            if !response.status().is_success() {
                return Err(RestKvError::Status(response.status()));
            }
            let body: KvGetResponse = response.json().await.map_err(RestKvError::Request)?;
            Ok(body.result)
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> Self::SetFut<'a> {
        Box::pin(async move {
            let response = self
                .client
                .post(format!("{}/set/{key}", self.base_url))
                .bearer_auth(&self.token)
                .body(value.to_string())
                .send()
                .await
                .map_err(RestKvError::Request)?;
            if !response.status().is_success() {
                return Err(RestKvError::Status(response.status()));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
pub(crate) use testing::MemoryKvStore;
