use tracing::Subscriber;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn filter_for(verbose: bool) -> EnvFilter {
    let default_directive = if verbose {
        "isu_etl=debug,info"
    } else {
        "isu_etl=info,warn"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

fn cli_subscriber(verbose: bool) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry().with(filter_for(verbose)).with(
        fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .compact(),
    )
}

/// JSON lines, one event per line, for log shippers
fn json_subscriber(verbose: bool) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry()
        .with(filter_for(verbose))
        .with(fmt::layer().with_target(true).json().with_current_span(false))
}

pub fn init_cli_logger(verbose: bool) {
    cli_subscriber(verbose).init();
}

pub fn init_json_logger(verbose: bool) {
    json_subscriber(verbose).init();
}

pub fn init_logger(verbose: bool, json: bool) {
    if json {
        init_json_logger(verbose);
    } else {
        init_cli_logger(verbose);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_subscriber_handles_events() {
        tracing::subscriber::with_default(json_subscriber(true), || {
            let span = tracing::info_span!("enrich", groups = 3);
            let _guard = span.enter();
            tracing::info!("🌦️ json line");
        });
    }

    #[test]
    fn test_cli_subscriber_handles_events() {
        tracing::subscriber::with_default(cli_subscriber(false), || {
            tracing::warn!("⚠️ compact line");
        });
    }
}
