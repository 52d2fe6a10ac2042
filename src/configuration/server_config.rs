use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addresses: Vec<String>,
    pub port: u16,
    /// Listen on every interface instead of `bind_addresses`.
    pub listen_any: bool,
    pub max_clients: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addresses: vec!["127.0.0.1".to_string(), "::1".to_string()],
            port: 2947,
            listen_any: false,
            max_clients: 64,
        }
    }
}

impl ServerConfig {
    /// Addresses to bind, both wildcards when listening on any interface.
    pub fn addresses(&self) -> Vec<String> {
        if self.listen_any {
            vec!["0.0.0.0".to_string(), "::".to_string()]
        } else {
            self.bind_addresses.clone()
        }
    }
}
