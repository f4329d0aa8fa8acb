//! Example of loading logger configuration from TOML.
//!
//! This example demonstrates how to embed `LoggerConfig` in an application's
//! configuration file and initialize the process logger from it.
//!
//! Run with:
//! ```bash
//! cargo run --example config_toml
//! ```

use serde::Deserialize;

const CONFIG: &str = r#"
[log]
log_file = "log/service.log"
level = "debug"
format = "text"
enable_color = false

[log.rotation]
rotation_time = "1d"
max_age = "3d"
"#;

#[derive(Deserialize)]
struct Config {
    log: oncelog::LoggerConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let root: Config = toml::from_str(CONFIG)?;

    let logger = oncelog::LogBuilder::from_config(root.log).init()?;

    logger.in_scope(|| {
        tracing::trace!("This is a trace message (not visible)");
        tracing::debug!("This is a debug message (visible because level is debug)");
        tracing::info!(
            user = "bob",
            action = "logout",
            duration_ms = 1234,
            "User session ended"
        );
    });

    println!("Writing to {:?}", logger.current_log_file());
    Ok(())
}
