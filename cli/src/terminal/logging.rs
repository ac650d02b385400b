use std::fmt;

use colored::*;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::{self, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::terminal::{print, progress};

/// Terminal output and progress bars stay visible whatever the log level.
const ALWAYS_ON: &str = "sweepr::print=info,sweepr::progress=info";

pub struct SweeprFormatter;

impl<S, N> FormatEvent<S, N> for SweeprFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> format::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();

        if meta.target() == print::TARGET {
            let mut raw = RawMessage::default();
            event.record(&mut raw);
            return writeln!(writer, "{}", raw.0.unwrap_or_default());
        }

        let (symbol, color_func): (&str, fn(ColoredString) -> ColoredString) = match *meta.level() {
            Level::TRACE => ("[ ]", |s| s.dimmed()),
            Level::DEBUG => ("[?]", |s| s.blue()),
            Level::INFO => ("[+]", |s| s.green().bold()),
            Level::WARN => ("[*]", |s| s.yellow().bold()),
            Level::ERROR => ("[-]", |s| s.red().bold()),
        };

        write!(writer, "{} ", color_func(symbol.into()))?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

#[derive(Default)]
struct RawMessage(Option<String>);

impl Visit for RawMessage {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == print::RAW_FIELD {
            self.0 = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
}

/// `RUST_LOG` wins over `default_level`; terminal output stays on either way.
fn directives(rust_log: Option<&str>, default_level: &str) -> String {
    let base: &str = rust_log
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(default_level);
    format!("{base},{ALWAYS_ON}")
}

pub fn env_filter(default_level: &str) -> EnvFilter {
    let rust_log: Option<String> = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    EnvFilter::try_new(directives(rust_log.as_deref(), default_level))
        .unwrap_or_else(|_| EnvFilter::new(format!("info,{ALWAYS_ON}")))
}

pub fn init_logging(default_level: &str) {
    let indicatif_layer = IndicatifLayer::new().with_progress_style(progress::bar_style());

    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(SweeprFormatter)
                .with_writer(indicatif_layer.get_stderr_writer()),
        )
        .with(indicatif_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_keeps_terminal_output() {
        assert_eq!(
            directives(Some("warn"), "info"),
            "warn,sweepr::print=info,sweepr::progress=info"
        );
    }

    #[test]
    fn blank_rust_log_falls_back_to_default_level() {
        assert_eq!(
            directives(Some("  "), "debug"),
            "debug,sweepr::print=info,sweepr::progress=info"
        );
        assert_eq!(
            directives(None, "info"),
            "info,sweepr::print=info,sweepr::progress=info"
        );
    }
}
