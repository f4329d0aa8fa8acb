//! JSON structured logging example.
//!
//! This example demonstrates JSON output with additional fields and
//! span-based function names.

#[tracing::instrument]
fn login(user_id: u64) {
    tracing::info!(user_id, action = "login", "User logged in");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logger = oncelog::builder()
        .with_format("json")
        .with_level("info")
        .init()?;

    logger.in_scope(|| {
        login(123);
        tracing::warn!(error_code = 404, "Resource not found");
        tracing::error!(component = "auth", error = "Authentication failed");
    });

    Ok(())
}
