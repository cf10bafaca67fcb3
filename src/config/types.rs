use derive_yaml::FromYaml;
use std::collections::HashMap;

use crate::config::parser::FromYaml;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SERVER_NAME: &str = "_";
pub const DEFAULT_MAX_BODY_SIZE: usize = 1_048_576; // 1MB

/// One virtual host, resolved from the request's `Host` header.
///
/// `server_name == "_"` (the default) marks the wildcard entry used when no
/// other host matches.
#[derive(Debug, Clone, FromYaml)]
pub struct HostConfig {
    pub server_name: String,
    pub home_dir: String,
    pub cgi_dir: String,
    pub proxy_host: String,
    pub aliases: HashMap<String, String>,
    pub error_pages: HashMap<u16, String>,
    pub client_max_body_size: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            server_name: DEFAULT_SERVER_NAME.to_string(),
            home_dir: String::new(),
            cgi_dir: String::new(),
            proxy_host: String::new(),
            aliases: HashMap::new(),
            error_pages: HashMap::new(),
            client_max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl HostConfig {
    pub fn is_wildcard(&self) -> bool {
        self.server_name == "_" || self.server_name.is_empty()
    }
}

#[derive(Debug, Clone, FromYaml)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub hosts: Vec<HostConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            hosts: Vec::new(),
        }
    }
}

impl Config {
    /// Resolves the `HostConfig` for an incoming `Host` header value, falling
    /// back to the wildcard entry (if any).
    pub fn resolve<'a>(&'a self, host_header: Option<&str>) -> Option<&'a HostConfig> {
        let hostname = host_header
            .and_then(|h| h.split(':').next())
            .unwrap_or("");

        self.hosts
            .iter()
            .find(|h| h.server_name == hostname)
            .or_else(|| self.hosts.iter().find(|h| h.is_wildcard()))
    }
}
