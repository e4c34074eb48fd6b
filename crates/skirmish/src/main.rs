//! Skirmish server binary.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: 0.0.0.0:9190, 60 Hz, in-memory storage
//! skirmish
//!
//! # With a JSON config file
//! RUST_LOG=skirmish=debug skirmish config.json
//! ```

use skirmish::prelude::*;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!(path = %path, "loading config");
            ServerConfig::load(&path)?
        }
        None => ServerConfig::default(),
    };

    let server = SkirmishServer::builder().config(config).start()?;
    tracing::info!(addr = %server.local_addr(), "press Ctrl-C to stop");
    server.run_until_ctrl_c()?;
    Ok(())
}
