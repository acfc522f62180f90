// Copyright (c) The gtest-engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal output: color choice, stderr styles and the log formatter.
//!
//! Diagnostics go through `tracing`. Each event is printed on its own line as `heading: message`,
//! where the heading is the event's level (`error`, `warning`, ...). Events logged to
//! [`NO_HEADING_TARGET`] are printed as-is, for continuation lines like error causes.

use clap::{Args, ValueEnum};
use owo_colors::{OwoColorize, Style, style};
use std::{fmt, sync::Once};
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
    level_filters::LevelFilter,
    warn,
};
use tracing_subscriber::{
    Layer,
    filter::Targets,
    fmt::{FmtContext, FormatEvent, FormatFields, format::Writer},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// Environment variable holding a [`Targets`] directive string, e.g. `gtest_results=trace`.
pub(crate) static LOG_ENV: &str = "GTEST_ENGINE_LOG";

/// Log target whose events are printed without a heading.
pub(crate) static NO_HEADING_TARGET: &str = "gtest_engine::no_heading";

#[derive(Copy, Clone, Debug, Args)]
#[must_use]
pub(crate) struct OutputOpts {
    /// Show debug logs and per-file coverage
    #[arg(long, short, global = true, env = "GTEST_ENGINE_VERBOSE")]
    pub(crate) verbose: bool,

    /// When to use colors: auto, always, never
    #[arg(
        long,
        value_enum,
        default_value_t,
        hide_possible_values = true,
        global = true,
        value_name = "WHEN",
        env = "GTEST_ENGINE_COLOR"
    )]
    pub(crate) color: Color,
}

impl OutputOpts {
    /// Installs the global logger and returns the resolved settings.
    pub(crate) fn init(self) -> OutputContext {
        init_logger(self.verbose, self.color);
        OutputContext {
            verbose: self.verbose,
            color: self.color,
        }
    }
}

/// Resolved output settings for an invocation.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct OutputContext {
    pub(crate) verbose: bool,
    pub(crate) color: Color,
}

impl OutputContext {
    /// Returns the styles used when printing errors to stderr.
    pub fn stderr_styles(&self) -> StderrStyles {
        if self.color.should_colorize(supports_color::Stream::Stderr) {
            StderrStyles::colored()
        } else {
            StderrStyles::default()
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
#[must_use]
pub(crate) enum Color {
    #[default]
    Auto,
    Always,
    Never,
}

impl Color {
    pub(crate) fn should_colorize(self, stream: supports_color::Stream) -> bool {
        match self {
            Self::Auto => supports_color::on_cached(stream).is_some(),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

/// Styles for messages written to stderr.
#[derive(Debug, Default)]
pub struct StderrStyles {
    pub(crate) bold: Style,
    pub(crate) captured_header: Style,
}

impl StderrStyles {
    fn colored() -> Self {
        Self {
            bold: style().bold(),
            captured_header: style().dimmed(),
        }
    }
}

static LOGGER: Once = Once::new();

/// Installs the stderr logger. Later calls do nothing.
fn init_logger(verbose: bool, color: Color) {
    let headings = if color.should_colorize(supports_color::Stream::Stderr) {
        Headings::colored()
    } else {
        Headings::default()
    };

    LOGGER.call_once(|| {
        let directives = std::env::var(LOG_ENV).unwrap_or_default();
        let (filter, rejected) = log_filter(&directives, verbose);

        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .event_format(HeadingFormatter { headings })
                    .with_writer(std::io::stderr)
                    .with_filter(filter),
            )
            .init();

        // Reported once the logger exists to print it.
        if let Some(error) = rejected {
            warn!("ignoring invalid {LOG_ENV} value `{directives}`: {error}");
        }
    });
}

/// Builds the log filter from `GTEST_ENGINE_LOG` directives.
///
/// Empty or invalid directives fall back to `debug` when verbose and `info` otherwise; the parse
/// error, if any, is returned alongside.
fn log_filter(directives: &str, verbose: bool) -> (Targets, Option<String>) {
    let fallback = || {
        let level = if verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };
        Targets::new().with_default(level)
    };

    if directives.is_empty() {
        return (fallback(), None);
    }
    match directives.parse::<Targets>() {
        Ok(targets) => (targets, None),
        Err(error) => (fallback(), Some(error.to_string())),
    }
}

/// Per-level styles for log headings.
#[derive(Debug, Default)]
struct Headings {
    error: Style,
    warn: Style,
    info: Style,
    debug: Style,
    trace: Style,
}

impl Headings {
    fn colored() -> Self {
        Self {
            error: style().red().bold(),
            warn: style().yellow().bold(),
            info: style().bold(),
            debug: style().bold(),
            trace: style().dimmed(),
        }
    }

    fn for_level(&self, level: Level) -> (&'static str, Style) {
        match level {
            Level::ERROR => ("error", self.error),
            Level::WARN => ("warning", self.warn),
            Level::INFO => ("info", self.info),
            Level::DEBUG => ("debug", self.debug),
            Level::TRACE => ("trace", self.trace),
        }
    }
}

struct HeadingFormatter {
    headings: Headings,
}

impl<S, N> FormatEvent<S, N> for HeadingFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        if metadata.target() != NO_HEADING_TARGET {
            let (label, style) = self.headings.for_level(*metadata.level());
            write!(writer, "{}: ", label.style(style))?;
        }

        let mut message = MessageText::default();
        event.record(&mut message);
        writeln!(writer, "{}", message.0)
    }
}

/// Collects an event's `message` field. Other fields are dropped.
#[derive(Default)]
struct MessageText(String);

impl Visit for MessageText {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0.push_str(value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}
