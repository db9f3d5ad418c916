use crate::cli::{DeleteParams, ListParams, OutputFormat};
use crate::download::{Coordinator, StorageSummary};
use crate::error::FetchCacheError;
use crate::init::open_store;
use crate::storage::StoredFile;
use serde::Serialize;

#[derive(Serialize)]
struct Listing<'a> {
    files: &'a [StoredFile],
    summary: StorageSummary,
}

pub async fn run_list(params: ListParams) -> Result<(), FetchCacheError> {
    let ListParams { config, format } = params;
    let coordinator = Coordinator::new(&config, open_store(&config).await?)?;

    let files = coordinator.list_stored_files().await?;
    let summary = coordinator.storage_summary().await?;

    match format {
        OutputFormat::Json => print_json(&Listing {
            files: &files,
            summary,
        })?,
        OutputFormat::Table => {
            for file in &files {
                println!("{:>14}  {}", file.size_bytes, file.filename);
            }
            println!(
                "{} file(s), {} byte(s) total",
                summary.file_count, summary.total_bytes
            );
        }
    }
    Ok(())
}

pub async fn run_records(params: ListParams) -> Result<(), FetchCacheError> {
    let ListParams { config, format } = params;
    let coordinator = Coordinator::new(&config, open_store(&config).await?)?;

    let records = coordinator.list_records().await?;

    match format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Table => {
            for record in &records {
                println!(
                    "{}  {:>14}  {}  {}",
                    record.created_at.format("%Y-%m-%d %H:%M:%S"),
                    record.size_bytes,
                    record.filename,
                    record.remote_url
                );
            }
        }
    }
    Ok(())
}

pub async fn run_delete(params: DeleteParams) -> Result<(), FetchCacheError> {
    let DeleteParams { config, filename } = params;
    let coordinator = Coordinator::new(&config, open_store(&config).await?)?;

    coordinator.delete(&filename).await?;
    println!("Deleted {filename}");
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), FetchCacheError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
