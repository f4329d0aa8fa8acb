//! Daily rotation example.
//!
//! Simulates ten days of traffic with a manual clock and shows which files
//! the 7-day retention leaves behind.

use std::sync::Arc;
use std::time::Duration;

use oncelog::{Clock, ManualClock, RotationPolicy};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempfile::tempdir()?;
    let log_path = temp_dir.path().join("info.log");
    let clock = Arc::new(ManualClock::new(time::OffsetDateTime::now_utc()));

    let logger = oncelog::builder()
        .with_file(&log_path)
        .with_format("text")
        .with_color(false)
        .with_rotation(RotationPolicy::daily().with_max_age(Duration::from_secs(7 * 24 * 3600)))
        .with_clock(Arc::clone(&clock) as Arc<dyn Clock>)
        .build()?;

    for day in 0..10 {
        logger.in_scope(|| tracing::info!(day, "Log message for day {}", day));
        // Retention looks at modification times, so age the file with the simulated clock
        if let Some(path) = logger.current_log_file() {
            std::fs::File::options()
                .append(true)
                .open(&path)?
                .set_modified(clock.now().into())?;
        }
        clock.advance(Duration::from_secs(24 * 3600));
    }

    let mut files: Vec<_> = std::fs::read_dir(temp_dir.path())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    println!("Files in {}:", temp_dir.path().display());
    for name in files {
        println!("  {}", name);
    }
    println!("Current file: {:?}", logger.current_log_file());

    Ok(())
}
