use crate::config::auth::ServiceConfig;
use crate::config::settings::LoggingConfig;

pub fn initiate_default_values(mut config: ServiceConfig) -> ServiceConfig {
    if config.settings.logging.is_none() {
        config.settings.logging = Some(LoggingConfig::default());
    }

    // request paths are appended to the address as `/v1/...`
    config.vault.address = config.vault.address.trim_end_matches('/').to_owned();

    config.vault.namespace = config
        .vault
        .namespace
        .take()
        .map(|ns| ns.trim().trim_matches('/').to_owned())
        .filter(|ns| !ns.is_empty());

    config
}
