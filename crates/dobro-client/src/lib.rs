//! Headless client for the Dobro volunteer platform.
//!
//! One persistent WebSocket carries all realtime traffic, multiplexed by
//! action name; HTTP covers auth and file uploads; SQLite persists the
//! session between runs.  [`AppState::init`] wires everything and the
//! [`commands`] modules expose the user-facing operations.

pub mod commands;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod state;

mod bridge;

pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use http::{HttpApi, LoginReply, UploadFile};
pub use session::SessionManager;
pub use state::AppState;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the default log subscriber.  `RUST_LOG` overrides the filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("dobro_client=debug,dobro_net=debug,dobro_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
