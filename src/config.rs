//! Dump run configuration

/// Settings for one dump run
///
/// Owned by the CLI layer and consumed by the connector and the exporter
/// as plain parameters.
#[derive(Debug, Clone)]
pub struct DumpConfig {
    /// Store address (host:port)
    pub address: String,
    /// Password; empty means no AUTH handshake
    pub password: String,
    /// Logical database index
    pub db: u32,
    /// Glob-style key filter, understood by the store
    pub filter: String,
}

impl Default for DumpConfig {
    fn default() -> Self {
        DumpConfig {
            address: "127.0.0.1:6379".to_string(),
            password: String::new(),
            db: 0,
            filter: "*".to_string(),
        }
    }
}
