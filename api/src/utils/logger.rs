use sentry::{types::Dsn, SessionMode};
use std::{
    borrow::Cow,
    env,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

pub struct Guard {
    _sentry: sentry::ClientInitGuard,
    _file: Option<WorkerGuard>,
}

pub fn setup() -> Guard {
    let sentry = sentry::init(sentry::ClientOptions {
        traces_sample_rate: 1.0,
        attach_stacktrace: true,
        session_mode: SessionMode::Request,
        release: Some(Cow::Borrowed(env!("STATIC_BUILD_DATE"))),
        dsn: env::var("SENTRY_DSN")
            .map(|s| Dsn::from_str(&s).expect("Invalid Sentry DSN"))
            .ok(),
        ..sentry::ClientOptions::default()
    });

    let (file_writer, file_guard) = file_writer().unzip();

    tracing_subscriber::registry()
        .with(sentry_tracing::layer())
        .with(tracing_subscriber::fmt::layer().with_filter(filter()))
        .with(file_writer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter())
        }))
        .init();

    Guard {
        _sentry: sentry,
        _file: file_guard,
    }
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| "api=info,parley=info".into())
}

/// Opens `$APP_LOG_FILE` for appending, when set.
fn file_writer() -> Option<(NonBlocking, WorkerGuard)> {
    let path = PathBuf::from(env::var("APP_LOG_FILE").ok().filter(|p| !p.is_empty())?);
    let file_name = path.file_name()?.to_owned();
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    Some(tracing_appender::non_blocking(
        tracing_appender::rolling::never(directory, file_name),
    ))
}
