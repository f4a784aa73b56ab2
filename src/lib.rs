use std::net::SocketAddr;

pub mod adapters;
pub mod app;
pub mod config;
pub mod ports;
pub mod registrar;
pub mod reminders;
pub mod state;
pub mod store;
pub mod types;
pub mod vapid;

pub use app::app;
pub use vapid::generate_vapid_credentials;

pub async fn serve(addr: SocketAddr, config: config::AppConfig) {
    let state = state::AppState::from_config(config);
    let _ticker = reminders::maybe_start_ticker(&state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app::router(state))
        .await
        .expect("server error");
}
