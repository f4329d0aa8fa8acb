use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::sync::Mutex;
use std::time::Duration;
use time::{OffsetDateTime, UtcOffset};

use crate::{Error, Result};

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Parse a duration string with an optional unit (s/m/h/d, case-insensitive), defaulting to hours if no unit.
fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    let (num_str, unit) = match s.chars().last() {
        None => return Err("empty duration string".to_string()),
        Some(c) if c.is_alphabetic() => (&s[..s.len() - c.len_utf8()], c.to_ascii_lowercase()),
        Some(_) => (s, 'h'),
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("invalid number: {}", num_str))?;

    let multiplier = match unit {
        's' => 1,
        'm' => MINUTE,
        'h' => HOUR,
        'd' => DAY,
        _ => return Err(format!("invalid unit: {}, supported: s/m/h/d", unit)),
    };

    num.checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| "duration too large".to_string())
}

/// Render a duration in the largest whole unit, e.g. `7d` or `90m`.
fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    match secs {
        0 => "0s".to_string(),
        s if s % DAY == 0 => format!("{}d", s / DAY),
        s if s % HOUR == 0 => format!("{}h", s / HOUR),
        s if s % MINUTE == 0 => format!("{}m", s / MINUTE),
        s => format!("{}s", s),
    }
}

/// Duration value that can be a number (hours) or string with units.
#[derive(Deserialize)]
#[serde(untagged)]
enum DurationValue {
    Number(u64),
    String(String),
}

impl DurationValue {
    fn to_duration(&self) -> std::result::Result<Duration, String> {
        match self {
            DurationValue::Number(n) => parse_duration(&n.to_string()),
            DurationValue::String(s) => parse_duration(s),
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    DurationValue::deserialize(deserializer)?
        .to_duration()
        .map_err(de::Error::custom)
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_duration(*value))
}

fn default_rotation_time() -> Duration {
    Duration::from_secs(DAY)
}

fn default_max_age() -> Duration {
    Duration::from_secs(7 * DAY)
}

/// When the file sink starts a new file and how long old files are kept.
///
/// Intervals are counted on the local wall clock, so the default daily
/// policy rolls over at local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationPolicy {
    /// Length of one rotation interval.
    #[serde(
        default = "default_rotation_time",
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub rotation_time: Duration,
    /// Rotated files last modified longer ago than this are deleted. Zero keeps everything.
    #[serde(
        default = "default_max_age",
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub max_age: Duration,
}

impl RotationPolicy {
    /// Create a policy from an interval and a retention age.
    pub fn new(rotation_time: Duration, max_age: Duration) -> Self {
        Self {
            rotation_time,
            max_age,
        }
    }

    /// One file per day, kept for a week.
    pub fn daily() -> Self {
        Self::default()
    }

    /// Set the retention age.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Reject policies the file sink cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.rotation_time.as_secs() == 0 {
            return Err(Error::Config(
                "rotation_time must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether expired files are deleted on rotation.
    pub fn purges(&self) -> bool {
        !self.max_age.is_zero()
    }

    fn interval_secs(&self) -> i64 {
        i64::try_from(self.rotation_time.as_secs().max(1)).unwrap_or(i64::MAX)
    }

    /// Index of the rotation interval containing `now`.
    pub fn generation(&self, now: OffsetDateTime) -> i64 {
        let local = now.unix_timestamp() + i64::from(now.offset().whole_seconds());
        local.div_euclid(self.interval_secs())
    }

    /// Start of the rotation interval containing `now`, in `now`'s offset.
    pub fn generation_start(&self, now: OffsetDateTime) -> OffsetDateTime {
        let offset = now.offset();
        let start_local = self.generation(now).saturating_mul(self.interval_secs());
        OffsetDateTime::from_unix_timestamp(start_local - i64::from(offset.whole_seconds()))
            .map(|t| t.to_offset(offset))
            .unwrap_or(now)
    }

    /// File name suffix for the interval containing `now`.
    ///
    /// `YYYYMMDD` for intervals of a day or longer, `YYYYMMDDHHMM` otherwise.
    pub fn suffix(&self, now: OffsetDateTime) -> String {
        let start = self.generation_start(now);
        let date = format!(
            "{:04}{:02}{:02}",
            start.year(),
            u8::from(start.month()),
            start.day()
        );
        if self.rotation_time.as_secs() >= DAY {
            date
        } else {
            format!("{}{:02}{:02}", date, start.hour(), start.minute())
        }
    }
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::new(default_rotation_time(), default_max_age())
    }
}

/// Source of the current time for timestamps and rotation.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock in the local offset, falling back to UTC when the offset is unknown.
///
/// The offset is resolved once, when the clock is created. `time` refuses to
/// read the local offset once the process has several threads, so resolving
/// it per call would flip a running service from local time to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    /// A clock in the current local offset, or UTC if it cannot be determined.
    pub fn new() -> Self {
        Self::with_offset(UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
    }

    /// A clock pinned to `offset`.
    pub fn with_offset(offset: UtcOffset) -> Self {
        Self { offset }
    }

    /// The offset every reading is expressed in.
    pub fn offset(&self) -> UtcOffset {
        self.offset
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }
}

/// A clock that only moves when told to. Useful for driving rotation in tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    /// Create a clock stopped at `now`.
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Jump to `now`.
    pub fn set(&self, now: OffsetDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    #[test]
    fn test_default_policy() {
        let policy = RotationPolicy::default();
        assert_eq!(policy.rotation_time, Duration::from_secs(24 * 3600));
        assert_eq!(policy.max_age, Duration::from_secs(7 * 24 * 3600));
        assert!(policy.purges());
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_zero_rotation_rejected() {
        let policy = RotationPolicy::new(Duration::ZERO, Duration::ZERO);
        assert!(matches!(policy.validate(), Err(Error::Config(_))));
        assert!(!policy.purges());
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("24"), Ok(Duration::from_secs(24 * 3600)));
        assert_eq!(parse_duration("7d"), Ok(Duration::from_secs(7 * 86400)));
        assert_eq!(parse_duration("90M"), Ok(Duration::from_secs(90 * 60)));
        assert_eq!(parse_duration("15s"), Ok(Duration::from_secs(15)));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("3w").is_err());
        assert!(parse_duration("abc").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(7 * 86400)), "7d");
        assert_eq!(format_duration(Duration::from_secs(3 * 3600)), "3h");
        assert_eq!(format_duration(Duration::from_secs(90 * 60)), "90m");
        assert_eq!(format_duration(Duration::from_secs(61)), "61s");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }

    #[test]
    fn test_policy_deserialize() {
        let yaml = r#"
rotation_time: 12h
max_age: "3d"
"#;
        let policy: RotationPolicy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy.rotation_time, Duration::from_secs(12 * 3600));
        assert_eq!(policy.max_age, Duration::from_secs(3 * 86400));

        let policy: RotationPolicy = toml::from_str("rotation_time = 48").unwrap();
        assert_eq!(policy.rotation_time, Duration::from_secs(48 * 3600));
        assert_eq!(policy.max_age, Duration::from_secs(7 * 86400));

        assert!(serde_yaml::from_str::<RotationPolicy>("max_age: 2y").is_err());
    }

    #[test]
    fn test_policy_serialize() {
        let yaml = serde_yaml::to_string(&RotationPolicy::default()).unwrap();
        assert!(yaml.contains("rotation_time: 1d"));
        assert!(yaml.contains("max_age: 7d"));
    }

    #[test]
    fn test_generation_changes_at_local_midnight() {
        let policy = RotationPolicy::daily();
        let before = datetime!(2026-10-16 23:59:59 +8);
        let after = datetime!(2026-10-17 00:00:00 +8);
        assert_eq!(policy.generation(before) + 1, policy.generation(after));
        assert_eq!(policy.suffix(before), "20261016");
        assert_eq!(policy.suffix(after), "20261017");
    }

    #[test]
    fn test_generation_start() {
        let policy = RotationPolicy::daily();
        let now = datetime!(2026-10-16 13:45:10 -5);
        assert_eq!(policy.generation_start(now), datetime!(2026-10-16 00:00:00 -5));
    }

    #[test]
    fn test_sub_daily_suffix() {
        let policy = RotationPolicy::new(Duration::from_secs(3600), Duration::ZERO);
        let now = datetime!(2026-10-16 13:45:10 UTC);
        assert_eq!(policy.suffix(now), "202610161300");
    }

    #[test]
    fn test_system_clock_keeps_its_offset() {
        let clock = SystemClock::with_offset(offset!(+8));
        assert_eq!(clock.offset(), offset!(+8));

        let readings: Vec<_> = std::thread::scope(|s| {
            (0..4)
                .map(|_| s.spawn(|| clock.now()))
                .collect::<Vec<_>>()
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect()
        });
        assert!(readings.iter().all(|now| now.offset() == offset!(+8)));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(datetime!(2026-10-16 08:00 UTC));
        clock.advance(Duration::from_secs(86400));
        assert_eq!(clock.now(), datetime!(2026-10-17 08:00 UTC));
        clock.set(datetime!(2026-01-01 00:00 UTC));
        assert_eq!(clock.now(), datetime!(2026-01-01 00:00 UTC));
    }
}
