pub mod kv;
pub mod push;
pub mod time;

pub use kv::KvStore;
pub use push::{PushTransport, SendError};
pub use time::TimeProvider;
