//! Record layouts for JSON and text output.
//!
//! Both layouts carry a `YYYY-MM-DD HH:MM:SS` timestamp and the caller
//! location as a short function name plus `file.rs:line`.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use time::macros::format_description;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use crate::rotation::Clock;

/// Keys owned by the record itself. User fields with these names are
/// emitted as `fields.<name>`.
const RESERVED_KEYS: &[&str] = &["timestamp", "time", "level", "msg", "func", "file"];

/// Event fields split into the message and everything else, sorted by key.
#[derive(Default)]
struct EventFields {
    message: String,
    fields: BTreeMap<String, Value>,
}

impl EventFields {
    fn collect(event: &Event<'_>) -> Self {
        let mut fields = Self::default();
        event.record(&mut fields);
        fields
    }

    fn insert(&mut self, field: &Field, value: Value) {
        let name = field.name();
        if name == "message" {
            self.message = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            return;
        }
        let key = if RESERVED_KEYS.contains(&name) {
            format!("fields.{}", name)
        } else {
            name.to_string()
        };
        self.fields.insert(key, value);
    }
}

impl Visit for EventFields {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));
    }
}

/// Caller location of an event: `(function, "file.rs:line")`.
///
/// The function is the innermost span's name (what `#[instrument]` uses),
/// or the last module path segment outside any span.
fn caller<S, N>(ctx: &FmtContext<'_, S, N>, event: &Event<'_>) -> (String, String)
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    let meta = event.metadata();
    let func = match ctx.event_scope().and_then(|mut scope| scope.next()) {
        Some(span) => span.name().to_string(),
        None => meta
            .module_path()
            .and_then(|path| path.rsplit("::").next())
            .unwrap_or_default()
            .to_string(),
    };
    let file = match meta.file() {
        Some(file) => {
            let base = Path::new(file)
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or(file);
            format!("{}:{}", base, meta.line().unwrap_or(0))
        }
        None => String::new(),
    };
    (func, file)
}

fn timestamp(clock: &dyn Clock) -> String {
    clock
        .now()
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .unwrap_or_default()
}

fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warning",
        _ => "error",
    }
}

fn level_color(level: &Level) -> u8 {
    match *level {
        Level::TRACE | Level::DEBUG => 37,
        Level::INFO => 36,
        Level::WARN => 33,
        _ => 31,
    }
}

fn write_value(writer: &mut Writer<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::String(s) => writer.write_str(s),
        other => write!(writer, "{}", other),
    }
}

/// One JSON object per record, keys sorted.
pub struct JsonFormat {
    clock: Arc<dyn Clock>,
}

impl JsonFormat {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl<S, N> FormatEvent<S, N> for JsonFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let fields = EventFields::collect(event);
        let (func, file) = caller(ctx, event);

        let mut record: Map<String, Value> = fields.fields.into_iter().collect();
        record.insert("timestamp".into(), timestamp(self.clock.as_ref()).into());
        record.insert("level".into(), level_name(event.metadata().level()).into());
        record.insert("msg".into(), fields.message.into());
        record.insert("func".into(), func.into());
        record.insert("file".into(), file.into());

        let line = serde_json::to_string(&record).map_err(|_| fmt::Error)?;
        writeln!(writer, "{}", line)
    }
}

/// `key=value` lines with unquoted values, optionally colorized.
pub struct TextFormat {
    clock: Arc<dyn Clock>,
    color: bool,
}

impl TextFormat {
    pub fn new(clock: Arc<dyn Clock>, color: bool) -> Self {
        Self { clock, color }
    }

    fn write_plain(
        &self,
        writer: &mut Writer<'_>,
        level: &Level,
        fields: &EventFields,
        func: &str,
        file: &str,
    ) -> fmt::Result {
        write!(
            writer,
            "time={} level={} msg={}",
            timestamp(self.clock.as_ref()),
            level_name(level),
            fields.message
        )?;
        if !func.is_empty() {
            write!(writer, " func={}", func)?;
        }
        if !file.is_empty() {
            write!(writer, " file={}", file)?;
        }
        for (key, value) in &fields.fields {
            write!(writer, " {}=", key)?;
            write_value(writer, value)?;
        }
        writeln!(writer)
    }

    fn write_colored(
        &self,
        writer: &mut Writer<'_>,
        level: &Level,
        fields: &EventFields,
        func: &str,
        file: &str,
    ) -> fmt::Result {
        let color = level_color(level);
        let label: String = level_name(level)
            .to_ascii_uppercase()
            .chars()
            .take(4)
            .collect();
        let location = match (func.is_empty(), file.is_empty()) {
            (false, false) => format!("{} {}", file, func),
            (false, true) => func.to_string(),
            (true, _) => file.to_string(),
        };
        write!(
            writer,
            "\x1b[{}m{}\x1b[0m[{}]{} {:<44} ",
            color,
            label,
            timestamp(self.clock.as_ref()),
            location,
            fields.message.trim_end_matches('\n')
        )?;
        for (key, value) in &fields.fields {
            write!(writer, " \x1b[{}m{}\x1b[0m=", color, key)?;
            write_value(writer, value)?;
        }
        writeln!(writer)
    }
}

impl<S, N> FormatEvent<S, N> for TextFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let fields = EventFields::collect(event);
        let (func, file) = caller(ctx, event);
        let level = event.metadata().level();

        if self.color {
            self.write_colored(&mut writer, level, &fields, &func, &file)
        } else {
            self.write_plain(&mut writer, level, &fields, &func, &file)
        }
    }
}
