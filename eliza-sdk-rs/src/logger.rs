use chrono::Local;
use colored::*;
use std::fmt::Write as _;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber used by the gateway and the agent binaries.
///
/// `RUST_LOG` controls filtering; when unset the given default directive applies
/// (for example `info` or `eliza_sdk_rs=debug,info`).
pub fn init_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    colored::control::set_override(true);

    // A second init (tests, embedded use) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(true)
        .with_writer(std::io::stdout)
        .event_format(ComponentFormatter)
        .try_init();
}

/// `2026-01-01T12:00:00.000Z INFO [socket] message key=value`
struct ComponentFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ComponentFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = Local::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        let metadata = event.metadata();

        let level_str = match *metadata.level() {
            tracing::Level::ERROR => "ERROR".red().bold().to_string(),
            tracing::Level::WARN => "WARN".yellow().bold().to_string(),
            tracing::Level::INFO => "INFO".green().bold().to_string(),
            tracing::Level::DEBUG => "DEBUG".blue().bold().to_string(),
            tracing::Level::TRACE => "TRACE".magenta().bold().to_string(),
        };

        write!(
            writer,
            "{} {} {} ",
            now.dimmed(),
            level_str,
            component(metadata.target()).cyan()
        )?;

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        write!(writer, "{}", visitor.message)?;
        if !visitor.fields.is_empty() {
            write!(writer, "{}", visitor.fields.dimmed())?;
        }
        writeln!(writer)
    }
}

/// Last path segment of the event target, e.g. `eliza_sdk_rs::socket` -> `[socket]`.
fn component(target: &str) -> String {
    let last = target.rsplit("::").next().unwrap_or(target);
    format!("[{}]", last)
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: String,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_uses_last_target_segment() {
        assert_eq!(component("eliza_sdk_rs::socket"), "[socket]");
        assert_eq!(component("sip_agent_rs"), "[sip_agent_rs]");
    }

    #[test]
    fn init_logging_is_idempotent() {
        init_logging("info");
        init_logging("debug");
    }
}
