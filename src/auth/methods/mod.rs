use std::sync::Arc;

use crate::auth::AuthMethod;
use crate::config::auth::MethodConfig;

pub mod alicloud;
pub mod approle;
pub mod jwt;

use alicloud::AliCloudMethod;
use approle::AppRoleMethod;
use jwt::JwtMethod;

/// Build the configured auth method.
///
/// Must run inside a tokio runtime: the jwt method may start a file watcher.
pub fn build_method(cfg: &MethodConfig) -> Arc<dyn AuthMethod> {
    let mount_path = cfg.mount_path();
    match cfg {
        MethodConfig::Alicloud { config, .. } => {
            Arc::new(AliCloudMethod::new(mount_path, config.clone()))
        }
        MethodConfig::Approle { config, .. } => {
            Arc::new(AppRoleMethod::new(mount_path, config.clone()))
        }
        MethodConfig::Jwt { config, .. } => Arc::new(JwtMethod::new(mount_path, config.clone())),
    }
}
