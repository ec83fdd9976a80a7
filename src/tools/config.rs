//! Tool server configuration.

use super::bridge::ToolBridgeError;
use super::transport::TransportFactory;

/// Environment variable listing tool servers, e.g.
/// `search=http://localhost:9100/rpc,calc=http://localhost:9200/rpc`.
pub const TOOL_SERVERS_ENV: &str = "BRAIDFLOW_TOOL_SERVERS";

/// One configured tool server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolServerEntry {
    pub name: String,
    pub url: String,
}

/// Ordered list of tool servers.
///
/// Order matters: when two servers advertise a tool with the same name, the
/// later entry wins during bridge registration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolServerConfig {
    servers: Vec<ToolServerEntry>,
}

impl ToolServerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read servers from `BRAIDFLOW_TOOL_SERVERS` as comma-separated
    /// `name=url` pairs. Malformed entries are skipped with a warning
    /// rather than failing startup.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let raw = std::env::var(TOOL_SERVERS_ENV).unwrap_or_default();
        Self::parse(&raw)
    }

    fn parse(raw: &str) -> Self {
        let mut config = Self::new();
        for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match item.split_once('=') {
                Some((name, url)) if !name.trim().is_empty() && !url.trim().is_empty() => {
                    config = config.with_server(name.trim(), url.trim());
                }
                _ => {
                    tracing::warn!(entry = %item, "skipping malformed tool server entry");
                }
            }
        }
        config
    }

    #[must_use]
    pub fn with_server(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.servers.push(ToolServerEntry {
            name: name.into(),
            url: url.into(),
        });
        self
    }

    pub fn servers(&self) -> &[ToolServerEntry] {
        &self.servers
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Probe every configured server: connect, fetch the first listing
    /// page, and disconnect. Nothing is registered; this only confirms the
    /// configuration is usable.
    pub async fn validate(&self, factory: &dyn TransportFactory) -> Result<(), ToolBridgeError> {
        for entry in &self.servers {
            let transport =
                factory
                    .connect(&entry.url)
                    .await
                    .map_err(|source| ToolBridgeError::Connect {
                        server: entry.name.clone(),
                        source,
                    })?;
            transport
                .list_tools(None)
                .await
                .map_err(|source| ToolBridgeError::Connect {
                    server: entry.name.clone(),
                    source,
                })?;
            if let Err(err) = transport.close().await {
                tracing::warn!(server = %entry.name, error = %err, "transport close failed during validation");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reads_ordered_pairs() {
        let config = ToolServerConfig::parse("a=http://one/rpc, b=http://two/rpc");
        assert_eq!(config.servers().len(), 2);
        assert_eq!(config.servers()[0].name, "a");
        assert_eq!(config.servers()[1].url, "http://two/rpc");
    }

    #[test]
    fn parse_skips_malformed_entries() {
        let config = ToolServerConfig::parse("good=http://ok/rpc,broken,=nourl,noname=");
        assert_eq!(config.servers().len(), 1);
        assert_eq!(config.servers()[0].name, "good");
    }

    #[test]
    fn parse_of_empty_input_is_empty() {
        assert!(ToolServerConfig::parse("").is_empty());
        assert!(ToolServerConfig::parse("  ,, ").is_empty());
    }
}
