use clap::{ArgAction, Parser, Subcommand};
use tracing::Level;

#[derive(Debug, Clone)]
pub enum Command {
    Init,
    Fetch {
        url: String,
        filename: Option<String>,
    },
    List {
        json: bool,
    },
    Records {
        json: bool,
    },
    Delete {
        filename: String,
    },
    Sweep,
    Interval {
        minutes: Option<u32>,
    },
}

pub struct Args {
    pub command: Command,
    pub config_path: Option<String>,
    pub log_level: Level,
}

#[derive(Debug, Parser)]
#[command(
    name = "fetchcache",
    version,
    about = "Fetch remote files once, keep them under a local name and evict them after a while"
)]
struct Cli {
    #[arg(
        short = 'v',
        long = "verbose",
        help = "Sets the level of verbosity",
        action = ArgAction::Count,
        global = true
    )]
    verbose: u8,

    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        help = "Optional config file; FETCHCACHE__* environment variables take precedence",
        global = true
    )]
    config: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Create the database schema and default settings
    Init,

    /// Fetch a remote file into the cache and wait for it to be committed
    Fetch {
        #[arg(value_name = "URL")]
        url: String,

        #[arg(
            short = 'f',
            long = "filename",
            value_name = "NAME",
            help = "Store under this name instead of the one advertised by the remote"
        )]
        filename: Option<String>,
    },

    /// List committed files in the storage directory
    List {
        #[arg(long = "json", help = "Print JSON instead of a table")]
        json: bool,
    },

    /// List registered downloads, newest first
    Records {
        #[arg(long = "json", help = "Print JSON instead of a table")]
        json: bool,
    },

    /// Delete a download record and its stored file
    Delete {
        #[arg(value_name = "NAME")]
        filename: String,
    },

    /// Evict stored files older than the configured interval
    Sweep,

    /// Show the eviction interval, or set it when MINUTES is given
    Interval {
        #[arg(value_name = "MINUTES")]
        minutes: Option<u32>,
    },
}

pub fn parse_args() -> Args {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let mut env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();
    if let Ok(directive) = "sqlx=warn".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let command = match cli.command {
        CliCommand::Init => Command::Init,
        CliCommand::Fetch { url, filename } => Command::Fetch { url, filename },
        CliCommand::List { json } => Command::List { json },
        CliCommand::Records { json } => Command::Records { json },
        CliCommand::Delete { filename } => Command::Delete { filename },
        CliCommand::Sweep => Command::Sweep,
        CliCommand::Interval { minutes } => Command::Interval { minutes },
    };

    Args {
        command,
        config_path: cli.config,
        log_level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fetch_accepts_filename_override() {
        let cli = Cli::try_parse_from([
            "fetchcache",
            "fetch",
            "https://example.com/a.bin",
            "--filename",
            "b.bin",
        ])
        .unwrap();

        match cli.command {
            CliCommand::Fetch { url, filename } => {
                assert_eq!(url, "https://example.com/a.bin");
                assert_eq!(filename.as_deref(), Some("b.bin"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["fetchcache", "sweep", "-vv", "-c", "cache.toml"]).unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config.as_deref(), Some("cache.toml"));
    }

    #[test]
    fn test_interval_rejects_non_numeric_minutes() {
        assert!(Cli::try_parse_from(["fetchcache", "interval", "soon"]).is_err());
    }
}
