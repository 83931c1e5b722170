use super::types::*;
use crate::error_handling::types::ConfigError;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

/// Application configuration structure that defines all runtime parameters.
///
/// This structure holds the complete configuration for the honeypot: the address every
/// capability binds to, the reporting relay settings and one block per emulated protocol.
/// It is read from a TOML file with `serde` and `toml`.
///
/// # Examples
///
/// ```
/// use rucher::configuration::Config;
///
/// let config = Config::from_toml_str(
///     r#"
///     [capabilities.imap]
///     port = 143
///     timeout = 30
///
///     [capabilities.imap.protocol_specific_data]
///     max_attempts = 3
///     banner = "* OK IMAP4rev1 Server Ready"
///     "#,
/// )
/// .unwrap();
/// assert_eq!(config.capabilities.imap.unwrap().port, 143);
/// ```
///
/// # Fields Overview
///
/// - `bind_address`: address every capability listener binds to, `0.0.0.0` by default
/// - `reporting`: queue bound and the sinks attached to the reporting relay
/// - `capabilities`: one `CapabilityConfig` per protocol, absent means disabled
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    #[serde(default)]
    pub reporting: ReportingConfig,

    #[serde(default)]
    pub capabilities: CapabilitiesConfig,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

impl Config {
    /// Reads, parses and validates a TOML configuration file.
    ///
    /// # Errors
    ///
    /// - `ConfigError::IoError` if the file cannot be read
    /// - `ConfigError::TomlError` if the content is not valid TOML for this structure
    /// - any error returned by [`Config::validate`]
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        debug!("Reading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Config, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value against the ranges the capabilities and the relay accept.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reporting.queue_capacity == 0 {
            return Err(ConfigError::NotInRange(
                "reporting.queue_capacity must be greater than 0".to_string(),
            ));
        }

        if let Some(path) = &self.reporting.json_log_file {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.is_dir() {
                    return Err(ConfigError::DirectoryDoesNotExist(format!(
                        "{} does not exist",
                        parent.display()
                    )));
                }
            }
        }

        let mut enabled = 0;
        if let Some(imap) = &self.capabilities.imap {
            validate_imap(imap)?;
            if imap.enabled {
                enabled += 1;
            }
        }

        if enabled == 0 {
            return Err(ConfigError::ServicesEmpty(
                "at least one capability must be enabled".to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_common<P>(name: &str, capability: &CapabilityConfig<P>) -> Result<(), ConfigError> {
    if capability.port == 0 {
        return Err(ConfigError::BadPortsRange(format!(
            "{}.port must be between 1 and 65535",
            name
        )));
    }
    if capability.timeout == 0 {
        return Err(ConfigError::NotInRange(format!(
            "{}.timeout must be greater than 0",
            name
        )));
    }
    Ok(())
}

fn validate_imap(imap: &CapabilityConfig<ImapOptions>) -> Result<(), ConfigError> {
    validate_common("imap", imap)?;

    let options = &imap.protocol_specific_data;
    if options.max_attempts == 0 {
        return Err(ConfigError::NotInRange(
            "imap.max_attempts must be at least 1".to_string(),
        ));
    }
    if !(options.banner.starts_with("* OK") || options.banner.starts_with("* PREAUTH")) {
        return Err(ConfigError::InvalidBanner(format!(
            "imap banner must start with '* OK', got '{}'",
            options.banner
        )));
    }
    if options.banner.contains(['\r', '\n']) {
        return Err(ConfigError::InvalidBanner(
            "imap banner must be a single line".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
        bind_address = "127.0.0.1"

        [reporting]
        queue_capacity = 16
        log_events = false

        [capabilities.imap]
        enabled = true
        port = 143
        timeout = 30

        [capabilities.imap.protocol_specific_data]
        max_attempts = 3
        banner = "* OK IMAP4rev1 Server Ready"
    "#;

    fn sim_configuration() -> Config {
        Config {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            reporting: ReportingConfig {
                queue_capacity: 16,
                log_events: false,
                json_log_file: None,
            },
            capabilities: CapabilitiesConfig {
                imap: Some(CapabilityConfig {
                    enabled: true,
                    port: 143,
                    timeout: 30,
                    protocol_specific_data: ImapOptions::default(),
                }),
            },
        }
    }

    #[test]
    fn test_from_toml_str() {
        let config = Config::from_toml_str(SAMPLE).unwrap_or_else(|e| panic!("{}", e));
        assert_eq!(config, sim_configuration());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        let imap = config.capabilities.imap.unwrap();
        assert_eq!(imap.timeout(), std::time::Duration::from_secs(30));
        assert_eq!(imap.protocol_specific_data.max_attempts, 3);
    }

    #[test]
    fn test_from_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/rucher.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_toml_str(
            r#"
            [capabilities.imap]
            port = 1143
            timeout = 5
            [capabilities.imap.protocol_specific_data]
            max_attempts = 1
            banner = "* OK ready"
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_address, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.reporting, ReportingConfig::default());
        assert!(config.capabilities.imap.unwrap().enabled);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let mut config = sim_configuration();
        config.capabilities.imap.as_mut().unwrap().port = 0;
        assert!(matches!(config.validate(), Err(ConfigError::BadPortsRange(_))));

        let mut config = sim_configuration();
        config.capabilities.imap.as_mut().unwrap().timeout = 0;
        assert!(matches!(config.validate(), Err(ConfigError::NotInRange(_))));

        let mut config = sim_configuration();
        config
            .capabilities
            .imap
            .as_mut()
            .unwrap()
            .protocol_specific_data
            .max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::NotInRange(_))));

        let mut config = sim_configuration();
        config.reporting.queue_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::NotInRange(_))));
    }

    #[test]
    fn test_rejects_bad_banner() {
        let mut config = sim_configuration();
        config
            .capabilities
            .imap
            .as_mut()
            .unwrap()
            .protocol_specific_data
            .banner = "IMAP4rev1 Server Ready".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBanner(_))));

        let mut config = sim_configuration();
        config
            .capabilities
            .imap
            .as_mut()
            .unwrap()
            .protocol_specific_data
            .banner = "* OK one\r\n* OK two".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBanner(_))));
    }

    #[test]
    fn test_requires_enabled_capability() {
        let mut config = sim_configuration();
        config.capabilities.imap.as_mut().unwrap().enabled = false;
        assert!(matches!(config.validate(), Err(ConfigError::ServicesEmpty(_))));

        let mut config = sim_configuration();
        config.capabilities.imap = None;
        assert!(matches!(config.validate(), Err(ConfigError::ServicesEmpty(_))));
    }

    #[test]
    fn test_rejects_missing_log_directory() {
        let mut config = sim_configuration();
        config.reporting.json_log_file =
            Some(std::path::PathBuf::from("/nonexistent/dir/events.jsonl"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DirectoryDoesNotExist(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = Config::from_toml_str("capabilities = 3").unwrap_err();
        assert!(matches!(err, ConfigError::TomlError(_)));
    }
}
