mod args;
mod fetch;
mod files;
mod maintenance;
mod params;
mod resolved_command;

pub use args::{Args, Command, parse_args};
pub use fetch::run_fetch;
pub use files::{run_delete, run_list, run_records};
pub use maintenance::{run_init, run_interval, run_sweep};
pub use params::{DeleteParams, FetchParams, IntervalParams, ListParams, OutputFormat};
pub use resolved_command::{ResolvedCommand, resolve_command};
