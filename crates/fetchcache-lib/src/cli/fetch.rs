use crate::cli::FetchParams;
use crate::download::{Coordinator, StartOutcome};
use crate::error::FetchCacheError;
use crate::init::open_store;
use eyre::eyre;
use std::time::Duration;

const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(5);

pub async fn run_fetch(params: FetchParams) -> Result<(), FetchCacheError> {
    let FetchParams { config, request } = params;

    let store = open_store(&config).await?;
    let coordinator = Coordinator::new(&config, store)?;

    let outcome = coordinator.start_download(request).await?;
    let filename = match outcome {
        StartOutcome::Duplicate { filename } => {
            tracing::info!(%filename, "Already cached or being fetched, nothing to do");
            println!("{}", coordinator.storage().final_path(&filename).display());
            return Ok(());
        }
        StartOutcome::Accepted(record) => record.filename,
    };

    tracing::info!(%filename, "Waiting for the transfer to finish");
    let tracker = coordinator.tracker();
    let finished = tracker.wait_until_finished(&filename);
    tokio::pin!(finished);
    let mut ticker = tokio::time::interval(PROGRESS_LOG_INTERVAL);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut finished => break,
            _ = ticker.tick() => {
                if let Some(fetch) = tracker.get(&filename) {
                    tracing::info!(
                        %filename,
                        transferred = fetch.bytes_transferred,
                        declared = fetch.declared_size,
                        percent = ?fetch.percent().map(|p| format!("{p:.1}")),
                        "Transfer in progress"
                    );
                }
            }
        }
    }

    let committed = coordinator
        .list_stored_files()
        .await?
        .into_iter()
        .find(|file| file.filename == filename);

    match committed {
        Some(file) => {
            tracing::info!(%filename, size = file.size_bytes, "Fetch completed");
            println!("{}", coordinator.storage().final_path(&filename).display());
            Ok(())
        }
        // The worker logged the cause; the record stays registered.
        None => Err(eyre!("Transfer of {filename} did not complete").into()),
    }
}
