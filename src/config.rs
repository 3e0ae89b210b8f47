use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, VisionError};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    #[serde(default)]
    pub image: ImageConfig,
}

// -- Server ------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Name reported to MCP clients in `serverInfo`.
    #[serde(default = "default_server_name")]
    pub name: String,

    /// Free-form instructions returned from `initialize`.
    #[serde(default = "default_instructions")]
    pub instructions: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            instructions: default_instructions(),
        }
    }
}

// -- OpenRouter --------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct OpenRouterConfig {
    /// API key. Usually supplied through `OPENROUTER_API_KEY` instead.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used when a tool call does not name one. Any identifier the
    /// remote service accepts is valid.
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sent as `HTTP-Referer` for OpenRouter analytics.
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Sent as `X-Title` for the OpenRouter dashboard.
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            default_model: default_model(),
            timeout_secs: default_timeout_secs(),
            site_url: default_site_url(),
            app_name: default_app_name(),
        }
    }
}

// -- Image -------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    /// Upper bound on downloading a remote image.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Root for relative image paths when a call omits `project_root`.
    #[serde(default)]
    pub default_project_root: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            default_project_root: String::new(),
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_server_name() -> String {
    "OpenVision".to_string()
}
fn default_instructions() -> String {
    "Vision analysis tool for images using OpenRouter".to_string()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_model() -> String {
    "qwen/qwen2.5-vl-32b-instruct:free".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_site_url() -> String {
    "https://github.com/modelcontextprotocol/mcp-openvision".to_string()
}
fn default_app_name() -> String {
    "MCP OpenVision".to_string()
}
fn default_fetch_timeout_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            openrouter: OpenRouterConfig::default(),
            image: ImageConfig::default(),
        }
    }
}

// -- Config impl ---------------------------------------------------------

impl Config {
    /// Load config from the given path, or the default XDG config location,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path(),
        };

        let mut config = if config_path.exists() {
            info!("loading config from {}", config_path.display());
            let contents = std::fs::read_to_string(&config_path).map_err(VisionError::Io)?;
            toml::from_str(&contents)
                .map_err(|e| VisionError::Config(format!("parse error: {e}")))?
        } else {
            info!("no config file found, using defaults");
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overlay environment variables onto the file configuration. Empty
    /// values are ignored.
    ///
    /// The lookup is injected so tests need not mutate the process
    /// environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("OPENROUTER_API_KEY") {
            self.openrouter.api_key = v;
        }
        if let Some(v) = var("OPENROUTER_BASE_URL") {
            self.openrouter.base_url = v;
        }
        if let Some(v) = var("OPENROUTER_DEFAULT_MODEL") {
            self.openrouter.default_model = v;
        }
        if let Some(v) = var("OPENROUTER_SITE_URL") {
            self.openrouter.site_url = v;
        }
        if let Some(v) = var("OPENROUTER_APP_NAME") {
            self.openrouter.app_name = v;
        }
        if let Some(v) = var("OPENVISION_PROJECT_ROOT") {
            self.image.default_project_root = v;
        }
    }

    /// Returns the default config file path: `$XDG_CONFIG_HOME/openvision/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("openvision")
            .join("config.toml")
    }

    /// The API key, or a configuration error naming where to set it.
    pub fn api_key(&self) -> Result<&str> {
        if self.openrouter.api_key.is_empty() {
            return Err(VisionError::Config(
                "OPENROUTER_API_KEY environment variable not set. \
                 Please set it to your OpenRouter API key."
                    .into(),
            ));
        }
        Ok(&self.openrouter.api_key)
    }

    /// Generate the default config file contents.
    pub fn default_config_contents() -> &'static str {
        include_str!("../config.example.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_expected_values() {
        let c = Config::default();
        assert_eq!(c.server.name, "OpenVision");
        assert_eq!(c.openrouter.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(c.openrouter.default_model, "qwen/qwen2.5-vl-32b-instruct:free");
        assert_eq!(c.openrouter.timeout_secs, 120);
        assert_eq!(c.openrouter.app_name, "MCP OpenVision");
        assert_eq!(c.image.fetch_timeout_secs, 10);
        assert!(c.openrouter.api_key.is_empty());
        assert!(c.image.default_project_root.is_empty());
    }

    #[test]
    fn parse_minimal_toml() {
        let toml_str = r#"
        [openrouter]
        default_model = "anthropic/claude-3-5-sonnet"
        "#;
        let c: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(c.openrouter.default_model, "anthropic/claude-3-5-sonnet");
        assert_eq!(c.openrouter.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(c.image.fetch_timeout_secs, 10);
    }

    #[test]
    fn parse_image_section() {
        let toml_str = r#"
        [image]
        fetch_timeout_secs = 30
        default_project_root = "/srv/app"
        "#;
        let c: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(c.image.fetch_timeout_secs, 30);
        assert_eq!(c.image.default_project_root, "/srv/app");
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENROUTER_API_KEY", "sk-or-test"),
            ("OPENROUTER_DEFAULT_MODEL", "openai/gpt-4o"),
            ("OPENROUTER_BASE_URL", ""),
            ("OPENVISION_PROJECT_ROOT", "/work"),
        ]);
        let mut c = Config::default();
        c.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(c.openrouter.api_key, "sk-or-test");
        // Any model identifier is accepted, including ones unknown to us.
        assert_eq!(c.openrouter.default_model, "openai/gpt-4o");
        // empty values do not clobber
        assert_eq!(c.openrouter.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(c.image.default_project_root, "/work");
    }

    #[test]
    fn missing_api_key_is_config_error() {
        let c = Config::default();
        let err = c.api_key().unwrap_err();
        assert!(matches!(err, VisionError::Config(_)));
        assert!(err.to_string().contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn load_nonexistent_returns_defaults() {
        let c = Config::load(Some(Path::new("/tmp/nonexistent-openvision-test.toml"))).unwrap();
        assert_eq!(c.server.name, "OpenVision");
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad-openvision.toml");
        std::fs::write(&path, "this is not valid %%% toml").unwrap();
        let result = Config::load(Some(&path));
        assert!(matches!(result, Err(VisionError::Config(_))));
    }

    #[test]
    fn default_config_path_has_openvision() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("openvision"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn default_config_contents_parse() {
        let contents = Config::default_config_contents();
        let c: Config = toml::from_str(contents).unwrap();
        assert_eq!(c.openrouter.default_model, Config::default().openrouter.default_model);
    }
}
