use super::Config;
use crate::error::FetchCacheError;
use config::Config as ConfigBuilder;

pub const ENV_PREFIX: &str = "FETCHCACHE";

/// Loads the configuration, layering `FETCHCACHE__SECTION__KEY` environment
/// variables over the optional file.
pub fn load_config(config_path: Option<&str>) -> Result<Config, FetchCacheError> {
    let mut builder = ConfigBuilder::builder();
    if let Some(config_path) = config_path {
        builder = builder.add_source(config::File::with_name(config_path));
    }

    let config_builder = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config_builder.try_deserialize().map_err(Into::into)
}
