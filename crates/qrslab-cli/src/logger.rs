use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the stderr logger. `RUST_LOG` overrides the verbosity flag.
pub fn init_cli_logger(verbose: bool) {
    let default = if verbose {
        "qrslab=debug,qrslab_matrix=debug,qrslab_geometry=debug,qrslab_export=debug,info"
    } else {
        "warn,qrslab=info,qrslab_export=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}
