pub mod config;
pub mod digits;
pub mod engine;
pub mod error;
pub mod executor;
pub mod feed;
pub mod registry;
pub mod reporter;
pub mod state;
pub mod stats;
pub mod types;

/// Deriv WebSocket API endpoint. The app id is appended as a query parameter.
pub const DERIV_WS_BASE: &str = "wss://ws.derivws.com/websockets/v3";

/// Registered application id used when none is configured.
pub const DEFAULT_APP_ID: u32 = 71979;

/// Build the full WebSocket URL for the given app id.
pub fn ws_url(app_id: u32) -> String {
    format!("{DERIV_WS_BASE}?app_id={app_id}")
}
