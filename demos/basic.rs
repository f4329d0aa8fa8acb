//! Basic console logging example.
//!
//! This example demonstrates the simplest way to set up the process logger
//! and reach it from anywhere in the program.

fn main() {
    // Console only, text output, colors on
    let logger = oncelog::init_logger("", "info", "text", true);
    logger
        .install_global()
        .expect("no other global dispatcher is set");

    tracing::info!("This is an info message");
    tracing::warn!("This is a warning message");
    tracing::error!("This is an error message");

    // Any module can reach the same logger later on
    oncelog::logger().in_scope(|| tracing::info!("Still the same logger"));
}
