//! Instance descriptor construction

use crate::{
    config::InstanceConfig,
    models::{ClientState, DataCenterInfo, InstanceDescriptor, PortInfo},
};

/// Build a fresh descriptor from local configuration.
///
/// Pure: no I/O and no shared state. Every registration attempt builds a
/// new descriptor rather than reusing the previous one.
pub fn build_descriptor(config: &InstanceConfig) -> InstanceDescriptor {
    let app = config.app_name.trim();
    let base = format!("http://{}:{}", config.host_name, config.port);

    let instance_id = config
        .instance_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("{}:{}:{}", config.host_name, app.to_lowercase(), config.port));

    InstanceDescriptor {
        instance_id,
        host_name: config.host_name.clone(),
        app: app.to_uppercase(),
        ip_addr: config.ip_addr.clone(),
        status: ClientState::Up,
        port: PortInfo::enabled(config.port),
        secure_port: match config.secure_port {
            Some(port) => PortInfo::enabled(port),
            None => PortInfo::disabled(443),
        },
        home_page_url: join_url(&base, &config.home_page_path),
        status_page_url: join_url(&base, &config.status_page_path),
        health_check_url: join_url(&base, &config.health_check_path),
        vip_address: config
            .vip_address
            .clone()
            .unwrap_or_else(|| app.to_lowercase()),
        data_center_info: DataCenterInfo::default(),
        metadata: config.metadata.clone(),
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}
