use serde::Deserialize;
use std::path::Path;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override the environment.
///
/// # Example YAML structure
/// ```yaml
/// nls:
///   url: "wss://nls-gateway.cn-shanghai.aliyuncs.com/ws/v1"
///   token: "your-token"
///   appkey: "your-appkey"
///   transport: "arraybuffer"
///   sample_rate: 16000
///   connect_timeout_ms: 10000
///
/// relay:
///   url: "http://localhost:3000/api/whisper"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub nls: Option<NlsYaml>,
    pub relay: Option<RelayYaml>,
}

/// Gateway connection settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct NlsYaml {
    pub url: Option<String>,
    pub token: Option<String>,
    pub appkey: Option<String>,
    /// `blob` or `arraybuffer`
    pub transport: Option<String>,
    pub sample_rate: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
}

/// Transcription relay settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RelayYaml {
    pub url: Option<String>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
nls:
  url: "ws://127.0.0.1:9000/ws/v1"
  token: "yaml-token"
  appkey: "yaml-appkey"
  transport: "arraybuffer"
  sample_rate: 8000
  connect_timeout_ms: 2500

relay:
  url: "http://localhost:3000/api/whisper"
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        let nls = config.nls.unwrap();

        assert_eq!(nls.url.as_deref(), Some("ws://127.0.0.1:9000/ws/v1"));
        assert_eq!(nls.token.as_deref(), Some("yaml-token"));
        assert_eq!(nls.appkey.as_deref(), Some("yaml-appkey"));
        assert_eq!(nls.transport.as_deref(), Some("arraybuffer"));
        assert_eq!(nls.sample_rate, Some(8000));
        assert_eq!(nls.connect_timeout_ms, Some(2500));
        assert_eq!(
            config.relay.unwrap().url.as_deref(),
            Some("http://localhost:3000/api/whisper")
        );
    }

    #[test]
    fn test_yaml_config_partial() {
        let yaml = r#"
nls:
  appkey: "only-appkey"
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        let nls = config.nls.unwrap();

        assert_eq!(nls.appkey.as_deref(), Some("only-appkey"));
        assert!(nls.url.is_none());
        assert!(nls.sample_rate.is_none());
        assert!(config.relay.is_none());
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.nls.is_none());
        assert!(config.relay.is_none());
    }

    #[test]
    fn test_yaml_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "nls:\n  token: \"file-token\"\n").unwrap();

        let config = YamlConfig::from_file(&path).unwrap();
        assert_eq!(config.nls.unwrap().token.as_deref(), Some("file-token"));
    }

    #[test]
    fn test_yaml_from_file_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "nls:\n  sample_rate: \"fast\"\n").unwrap();

        let err = YamlConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse YAML config"));
    }
}
