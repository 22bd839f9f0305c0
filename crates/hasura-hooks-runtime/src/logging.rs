//! Subscriber setup for the `[logging]` configuration section.
//!
//! Dispatches run inside `dispatch_event` / `dispatch_action` spans, so
//! [`SpanEvents::LIFECYCLE`] prints one line when a dispatch starts and one,
//! with its duration, when it ends.
//!
//! ```rust,ignore
//! use hasura_hooks_runtime::logging::{LoggingBuilder, SpanEvents};
//!
//! LoggingBuilder::new()
//!     .directive("hasura_hooks_framework=debug")
//!     .span_events(SpanEvents::LIFECYCLE)
//!     .init();
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing_subscriber::fmt::format::{FmtSpan, PrettyFields};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LoggingConfig, SpanEventConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Span lifecycle events to print.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEvents {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

impl SpanEvents {
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Creation and close of each span.
    pub const LIFECYCLE: Self = Self {
        new: true,
        close: true,
        ..Self::NONE
    };

    pub const FULL: Self = Self {
        new: true,
        enter: true,
        exit: true,
        close: true,
    };
}

impl From<SpanEvents> for FmtSpan {
    fn from(events: SpanEvents) -> Self {
        [
            (events.new, FmtSpan::NEW),
            (events.enter, FmtSpan::ENTER),
            (events.exit, FmtSpan::EXIT),
            (events.close, FmtSpan::CLOSE),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .fold(FmtSpan::NONE, |acc, (_, flag)| acc | flag)
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(config: &SpanEventConfig) -> Self {
        Self {
            new: config.new,
            enter: config.enter,
            exit: config.exit,
            close: config.close,
        }
    }
}

/// Installs the global subscriber described by `config`.
///
/// A no-op when the application installed its own subscriber first.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

/// Which metadata each log line carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineFields {
    target: bool,
    thread_ids: bool,
    location: bool,
}

impl Default for LineFields {
    fn default() -> Self {
        Self {
            target: true,
            thread_ids: false,
            location: false,
        }
    }
}

/// Builder for the global tracing subscriber.
#[derive(Debug, Default)]
pub struct LoggingBuilder {
    level: Option<tracing::Level>,
    directives: Vec<String>,
    format: LogFormat,
    output: LogOutput,
    file_path: Option<PathBuf>,
    span_events: SpanEvents,
    fields: LineFields,
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut filters: Vec<_> = config.filters.iter().collect();
        filters.sort_by(|a, b| a.0.cmp(b.0));

        let builder = Self {
            level: Some(config.level.to_tracing_level()),
            format: config.format,
            output: config.output,
            file_path: config.file_path.clone(),
            span_events: SpanEvents::from(&config.span_events),
            fields: LineFields {
                target: true,
                thread_ids: config.thread_ids,
                location: config.file_location,
            },
            ..Self::default()
        };
        filters
            .into_iter()
            .fold(builder, |builder, (module, level)| {
                builder.directive(&format!("{module}={level}"))
            })
    }

    /// Level used when `RUST_LOG` is unset. Defaults to `info`.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Adds a directive such as `hasura_hooks_framework=debug`.
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Log file for [`LogOutput::File`].
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    pub fn show_target(mut self, enabled: bool) -> Self {
        self.fields.target = enabled;
        self
    }

    pub fn show_thread_ids(mut self, enabled: bool) -> Self {
        self.fields.thread_ids = enabled;
        self
    }

    /// Prints the source file and line of each event.
    pub fn show_location(mut self, enabled: bool) -> Self {
        self.fields.location = enabled;
        self
    }

    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the global subscriber.
    ///
    /// # Errors
    ///
    /// Fails if a global subscriber is already set.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.env_filter();
        let layer = self.fmt_layer();
        tracing_subscriber::registry()
            .with(layer)
            .with(filter)
            .try_init()
    }

    /// `RUST_LOG` replaces the configured level; directives apply on top.
    fn env_filter(&self) -> EnvFilter {
        let level = self.level.unwrap_or(tracing::Level::INFO);
        let base = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

        self.directives
            .iter()
            .fold(base, |filter, directive| match directive.parse() {
                Ok(directive) => filter.add_directive(directive),
                Err(err) => {
                    eprintln!("Ignoring invalid log directive `{directive}`: {err}");
                    filter
                }
            })
    }

    fn fmt_layer(&self) -> BoxedLayer {
        let format = fmt::format()
            .with_target(self.fields.target)
            .with_thread_ids(self.fields.thread_ids)
            .with_file(self.fields.location)
            .with_line_number(self.fields.location);
        let layer = fmt::layer()
            .with_span_events(self.span_events.into())
            .with_writer(self.make_writer());

        match self.format {
            LogFormat::Compact => layer.event_format(format.compact()).boxed(),
            LogFormat::Pretty => layer
                .event_format(format.pretty())
                .fmt_fields(PrettyFields::new())
                .boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer
                .event_format(format.json())
                .fmt_fields(fmt::format::JsonFields::new())
                .boxed(),
            #[cfg(not(feature = "json-log"))]
            LogFormat::Json => {
                eprintln!("JSON logs need the `json-log` feature, using the full format");
                layer.event_format(format).boxed()
            }
            LogFormat::Full => layer.event_format(format).boxed(),
        }
    }

    fn make_writer(&self) -> BoxMakeWriter {
        match (self.output, &self.file_path) {
            (LogOutput::Stdout, _) => BoxMakeWriter::new(std::io::stdout),
            (LogOutput::Stderr, _) => BoxMakeWriter::new(std::io::stderr),
            (LogOutput::File, Some(path)) => {
                let dir = path.parent().unwrap_or_else(|| Path::new("."));
                let file = path
                    .file_name()
                    .unwrap_or_else(|| OsStr::new("hasura-hooks.log"));
                BoxMakeWriter::new(tracing_appender::rolling::never(dir, file))
            }
            (LogOutput::File, None) => {
                eprintln!("File log output has no file path, logging to stdout");
                BoxMakeWriter::new(std::io::stdout)
            }
        }
    }
}
