use std::net::SocketAddr;

use anyhow::Result;
use blob_store::BlobStorageConfig;
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Path segment naming the file collection in every route,
    /// `/api/v1/{container}/{resource_segment}/...`.
    pub resource_segment: String,
    pub blob_storage: BlobStorageConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: "0.0.0.0:8900".to_string(),
            resource_segment: "contentfiles".to_string(),
            blob_storage: Default::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_path(path: &str) -> Result<ServerConfig> {
        let config_str = std::fs::read_to_string(path)?;
        let config: ServerConfig = Figment::new().merge(Yaml::string(&config_str)).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(anyhow::anyhow!(
                "invalid listen address: {}",
                self.listen_addr
            ));
        }
        if self.resource_segment.is_empty()
            || self.resource_segment.contains(['/', '{', '}'])
        {
            return Err(anyhow::anyhow!(
                "invalid resource segment: {}",
                self.resource_segment
            ));
        }
        if self.blob_storage.path.is_none() {
            return Err(anyhow::anyhow!("blob storage path must be configured"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        ServerConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_yaml_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen_addr: 127.0.0.1:9901").unwrap();
        writeln!(file, "resource_segment: files").unwrap();
        let config = ServerConfig::from_path(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9901");
        assert_eq!(config.resource_segment, "files");
        assert!(config.blob_storage.path.is_some());
    }

    #[test]
    fn rejects_bad_listen_addr() {
        let config = ServerConfig {
            listen_addr: "not-an-addr".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_resource_segment() {
        let config = ServerConfig {
            resource_segment: "content/files".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
