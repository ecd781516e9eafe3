use clap::{ArgAction, ArgGroup, Parser};
use lazy_static::lazy_static;
use tracing::{self, level_filters::LevelFilter, Metadata};
use tracing_subscriber::{
    filter::filter_fn,
    fmt::format::{Format, JsonFields, PrettyFields},
    layer::SubscriberExt,
    Layer, Registry,
};

lazy_static! {
    static ref IGNORED_MODULES: &'static [&'static str] = &[
        "want",
        "hyper",
        "mio",
        "tokio_threadpool",
        "tokio_reactor",
        "tower",
        "h2",
    ];
}

#[derive(Parser, Debug)]
#[clap(group = ArgGroup::new("logging"))]
pub struct LoggingOpts {
    /// A level of verbosity, and can be used multiple times
    #[clap(short, long, action = ArgAction::Count, global(true), group = "logging")]
    pub debug: u8,

    /// Enable warn logging
    #[clap(short, long, global(true), group = "logging")]
    pub warn: bool,

    /// Disable everything but error logging
    #[clap(short, long, global(true), group = "logging")]
    pub error: bool,
}

impl From<&LoggingOpts> for LevelFilter {
    fn from(opts: &LoggingOpts) -> Self {
        if opts.error {
            LevelFilter::ERROR
        } else if opts.warn {
            LevelFilter::WARN
        } else if opts.debug == 0 {
            LevelFilter::INFO
        } else if opts.debug == 1 {
            LevelFilter::DEBUG
        } else {
            LevelFilter::TRACE
        }
    }
}

fn is_ignored(metadata: &Metadata<'_>) -> bool {
    metadata
        .module_path()
        .map(|x| IGNORED_MODULES.iter().any(|module| x.starts_with(module)))
        .unwrap_or(true)
}

pub fn configure_logging(logging_opts: &LoggingOpts) -> Result<(), anyhow::Error> {
    let is_terminal = atty::is(atty::Stream::Stdout) && cfg!(debug_assertions);
    let pretty_logger = if is_terminal {
        Some(
            tracing_subscriber::fmt::layer()
                .event_format(Format::default().pretty())
                .fmt_fields(PrettyFields::new())
                .with_filter(filter_fn(|metadata| !is_ignored(metadata))),
        )
    } else {
        None
    };

    let json_logger = if !is_terminal {
        Some(
            tracing_subscriber::fmt::layer()
                .event_format(Format::default().json().flatten_event(true))
                .fmt_fields(JsonFields::new())
                .with_filter(filter_fn(|metadata| !is_ignored(metadata))),
        )
    } else {
        None
    };

    let subscriber = Registry::default()
        .with(LevelFilter::from(logging_opts))
        .with(json_logger)
        .with(pretty_logger);

    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;

    Ok(())
}

#[test]
fn test_level_from_flags() {
    let opts = LoggingOpts {
        debug: 0,
        warn: false,
        error: false,
    };
    assert_eq!(LevelFilter::INFO, LevelFilter::from(&opts));

    let opts = LoggingOpts {
        debug: 2,
        warn: false,
        error: false,
    };
    assert_eq!(LevelFilter::TRACE, LevelFilter::from(&opts));

    let opts = LoggingOpts {
        debug: 0,
        warn: false,
        error: true,
    };
    assert_eq!(LevelFilter::ERROR, LevelFilter::from(&opts));
}
