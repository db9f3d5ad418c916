use fetchcache_lib::cli::{
    ResolvedCommand, parse_args, resolve_command, run_delete, run_fetch, run_init, run_interval,
    run_list, run_records, run_sweep,
};
use fetchcache_lib::error::FetchCacheError;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), FetchCacheError> {
    color_eyre::install()?;

    let args = parse_args();
    let command = resolve_command(args.command, args.config_path.as_deref())?;

    match command {
        ResolvedCommand::Init(config) => run_init(config).await?,
        ResolvedCommand::Fetch(params) => run_fetch(params).await?,
        ResolvedCommand::List(params) => run_list(params).await?,
        ResolvedCommand::Records(params) => run_records(params).await?,
        ResolvedCommand::Delete(params) => run_delete(params).await?,
        ResolvedCommand::Sweep(config) => run_sweep(config).await?,
        ResolvedCommand::Interval(params) => run_interval(params).await?,
    }

    Ok(())
}
