use tracing_subscriber::{fmt, EnvFilter};

/// Default filter for a `-v` count: warnings only, `-v` info, `-vv` debug.
pub fn filter_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "warn,snbcube=info",
        _ => "info,snbcube=debug",
    }
}

/// Install the global fmt subscriber on stderr. `RUST_LOG` wins over the
/// verbosity flag.
pub fn init(verbosity: u8) {
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_for_verbosity(verbosity)));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .with_target(verbosity > 1)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(filter_for_verbosity(0), "warn");
        assert_eq!(filter_for_verbosity(1), "warn,snbcube=info");
        assert_eq!(filter_for_verbosity(2), "info,snbcube=debug");
        assert_eq!(filter_for_verbosity(7), "info,snbcube=debug");
        for v in 0..3 {
            assert!(EnvFilter::try_new(filter_for_verbosity(v)).is_ok());
        }
    }
}
