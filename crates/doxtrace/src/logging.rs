//! Logging setup
//!
//! `DOXTRACE_LOG` (or `RUST_LOG`) overrides the level chosen from the
//! command-line flags. Logs always go to stderr; stdout carries the report.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }

    fn to_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::DEBUG,
        }
    }

    fn to_filter(self) -> String {
        let level = self.to_level().as_str().to_lowercase();
        format!("doxtrace={level},doxtrace_core={level}")
    }
}

fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_env("DOXTRACE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(verbosity.to_filter()))
}

pub fn init(verbosity: Verbosity) {
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(verbosity >= Verbosity::Verbose)
        .with_line_number(verbosity >= Verbosity::Verbose)
        .compact();

    match verbosity {
        Verbosity::Verbose => subscriber.init(),
        _ => subscriber.without_time().init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(true, false), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Quiet);
    }

    #[test]
    fn test_quiet_overrides_verbose() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
    }

    #[test]
    fn test_filter_covers_both_crates() {
        assert_eq!(
            Verbosity::Verbose.to_filter(),
            "doxtrace=debug,doxtrace_core=debug"
        );
        assert_eq!(Verbosity::Normal.to_filter(), "doxtrace=warn,doxtrace_core=warn");
    }
}
