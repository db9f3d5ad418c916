use crate::cli::args::Command;
use crate::cli::params::{DeleteParams, FetchParams, IntervalParams, ListParams, OutputFormat};
use crate::config::{Config, load_config};
use crate::download::DownloadRequest;
use crate::error::FetchCacheError;

#[derive(Debug, Clone)]
pub enum ResolvedCommand {
    Init(Config),
    Fetch(FetchParams),
    List(ListParams),
    Records(ListParams),
    Delete(DeleteParams),
    Sweep(Config),
    Interval(IntervalParams),
}

pub fn resolve_command(
    command: Command,
    config_path: Option<&str>,
) -> Result<ResolvedCommand, FetchCacheError> {
    let config = load_config(config_path)?;

    match command {
        Command::Init => Ok(ResolvedCommand::Init(config)),
        Command::Fetch { url, filename } => {
            if url.trim().is_empty() {
                return Err(FetchCacheError::CliArgumentValidation {
                    details: "URL must not be empty.".to_string(),
                });
            }

            let mut request = DownloadRequest::new(url);
            if let Some(filename) = filename {
                if filename.trim().is_empty() {
                    return Err(FetchCacheError::CliArgumentValidation {
                        details: "--filename must not be empty.".to_string(),
                    });
                }
                request = request.with_filename(filename);
            }

            Ok(ResolvedCommand::Fetch(FetchParams { config, request }))
        }
        Command::List { json } => Ok(ResolvedCommand::List(ListParams {
            config,
            format: OutputFormat::from_json_flag(json),
        })),
        Command::Records { json } => Ok(ResolvedCommand::Records(ListParams {
            config,
            format: OutputFormat::from_json_flag(json),
        })),
        Command::Delete { filename } => {
            if filename.trim().is_empty() {
                return Err(FetchCacheError::CliArgumentValidation {
                    details: "NAME must not be empty.".to_string(),
                });
            }
            Ok(ResolvedCommand::Delete(DeleteParams { config, filename }))
        }
        Command::Sweep => Ok(ResolvedCommand::Sweep(config)),
        Command::Interval { minutes } => {
            if minutes == Some(0) {
                return Err(FetchCacheError::CliArgumentValidation {
                    details: "MINUTES must be greater than 0.".to_string(),
                });
            }
            Ok(ResolvedCommand::Interval(IntervalParams { config, minutes }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_is_rejected() {
        let result = resolve_command(Command::Interval { minutes: Some(0) }, None);

        assert!(matches!(
            result,
            Err(FetchCacheError::CliArgumentValidation { .. })
        ));
    }

    #[test]
    fn test_blank_filename_override_is_rejected() {
        let result = resolve_command(
            Command::Fetch {
                url: "https://example.com/a.bin".to_string(),
                filename: Some("  ".to_string()),
            },
            None,
        );

        assert!(matches!(
            result,
            Err(FetchCacheError::CliArgumentValidation { .. })
        ));
    }

    #[test]
    fn test_fetch_carries_filename_override() {
        let resolved = resolve_command(
            Command::Fetch {
                url: "https://example.com/a.bin".to_string(),
                filename: Some("b.bin".to_string()),
            },
            None,
        )
        .unwrap();

        match resolved {
            ResolvedCommand::Fetch(params) => {
                assert_eq!(params.request.url, "https://example.com/a.bin");
                assert_eq!(params.request.filename.as_deref(), Some("b.bin"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
