use crate::types::push::{ReminderPayload, Subscription};

/// Expired means the push service reported the endpoint permanently gone
/// (the 404/410 class); everything else is transient. Retry policy belongs
/// to the scheduler, not the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    Expired,
    Transient(String),
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::Expired => f.write_str("subscription endpoint is gone"),
            SendError::Transient(detail) => write!(f, "push delivery failed: {detail}"),
        }
    }
}

pub trait PushTransport: Clone + Send + Sync + 'static {
    type Fut<'a>: Future<Output = Result<(), SendError>> + Send + 'a
    where
        Self: 'a;

    fn send<'a>(
        &'a self,
        subscription: &'a Subscription,
        payload: &'a ReminderPayload,
    ) -> Self::Fut<'a>;
}
