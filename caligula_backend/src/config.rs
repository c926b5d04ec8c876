use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    // HTTP listener
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,

    // LLM configuration (OpenAI-compatible chat completions)
    #[serde(default = "default_llm_url")]
    pub llm_api_url: String,
    #[serde(default)]
    pub llm_api_key: Option<String>,
    #[serde(default = "default_llm_model")]
    pub generation_model: String,
    #[serde(default = "default_llm_model")]
    pub verification_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    // Persona and canned replies
    #[serde(default = "default_persona")]
    pub persona: String,
    #[serde(default)]
    pub local_responses_path: Option<String>,
}

fn default_bind_addr() -> String {
    "127.0.0.1:5174".to_string()
}

fn default_allowed_origin() -> String {
    "http://localhost:5173".to_string()
}

fn default_llm_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
}

fn default_llm_model() -> String {
    "gemma-3-27b-it".to_string()
}

fn default_temperature() -> Option<f32> {
    Some(0.7)
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_persona() -> String {
    "caligula".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            allowed_origin: default_allowed_origin(),
            llm_api_url: default_llm_url(),
            llm_api_key: None,
            generation_model: default_llm_model(),
            verification_model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: None,
            request_timeout_secs: default_request_timeout_secs(),
            persona: default_persona(),
            local_responses_path: None,
        }
    }
}

impl BackendConfig {
    /// Get the directory containing the executable
    fn get_base_dir() -> PathBuf {
        match std::env::current_exe() {
            Ok(exe_path) => exe_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")),
            Err(_) => PathBuf::from("."),
        }
    }

    /// Get the path to the config file (relative to executable)
    pub fn config_path() -> PathBuf {
        Self::get_base_dir().join("caligula_config.toml")
    }

    /// Load `caligula_config.toml` (next to the executable) if present, then
    /// apply environment overrides.
    pub fn load() -> Self {
        let path = Self::config_path();
        let mut config = match Self::load_from(&path) {
            Ok(Some(config)) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Ok(None) => {
                tracing::info!("No config file at {:?}, using defaults + env vars", path);
                Self::default()
            }
            Err(e) => {
                tracing::error!("{:#}", e);
                Self::default()
            }
        };
        config.apply_env_overrides(|name| env::var(name).ok());
        config
    }

    /// `Ok(None)` when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read config {:?}", path));
            }
        };
        toml::from_str::<BackendConfig>(&contents)
            .map(Some)
            .with_context(|| format!("Failed to parse {:?}", path))
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(bind) = non_blank("CALIGULA_BIND") {
            self.bind_addr = bind;
        }

        if let Some(port) = non_blank("PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.bind_addr = replace_port(&self.bind_addr, port),
                Err(_) => tracing::warn!("Ignoring invalid PORT '{}'", port),
            }
        }

        if let Some(origin) = non_blank("CALIGULA_ALLOWED_ORIGIN") {
            self.allowed_origin = origin;
        }

        if let Some(url) = non_blank("LLM_API_URL") {
            self.llm_api_url = url;
        }

        if let Some(key) = non_blank("LLM_API_KEY").or_else(|| non_blank("GOOGLE_API_KEY")) {
            self.llm_api_key = Some(key);
        }

        if let Some(model) = non_blank("LLM_MODEL") {
            self.generation_model = model;
        }

        if let Some(model) = non_blank("LLM_VERIFY_MODEL") {
            self.verification_model = model;
        }

        if let Some(timeout) = non_blank("LLM_TIMEOUT_SECS") {
            match timeout.parse() {
                Ok(seconds) => self.request_timeout_secs = seconds,
                Err(_) => tracing::warn!("Ignoring invalid LLM_TIMEOUT_SECS '{}'", timeout),
            }
        }

        if let Some(persona) = non_blank("CALIGULA_PERSONA") {
            self.persona = persona;
        }

        if let Some(path) = non_blank("CALIGULA_RESPONSES_PATH") {
            self.local_responses_path = Some(path);
        }
    }

    /// The configured key, treating a blank value as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.llm_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

fn replace_port(bind_addr: &str, port: u16) -> String {
    let host = bind_addr
        .rsplit_once(':')
        .map(|(host, _)| host)
        .unwrap_or(bind_addr);
    format!("{}:{}", host, port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_target_gemma_on_port_5174() {
        let config = BackendConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:5174");
        assert_eq!(config.generation_model, "gemma-3-27b-it");
        assert_eq!(config.verification_model, "gemma-3-27b-it");
        assert_eq!(config.persona, "caligula");
        assert!(config.api_key().is_none());
    }

    #[test]
    fn env_overrides_replace_fields() {
        let mut config = BackendConfig::default();
        config.apply_env_overrides(env_of(&[
            ("LLM_API_URL", "http://localhost:11434/v1"),
            ("LLM_API_KEY", "secret"),
            ("LLM_MODEL", "llama3.2"),
            ("LLM_VERIFY_MODEL", "llama3.2:1b"),
            ("LLM_TIMEOUT_SECS", "5"),
            ("PORT", "8080"),
        ]));
        assert_eq!(config.llm_api_url, "http://localhost:11434/v1");
        assert_eq!(config.api_key(), Some("secret"));
        assert_eq!(config.generation_model, "llama3.2");
        assert_eq!(config.verification_model, "llama3.2:1b");
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
    }

    #[test]
    fn google_key_is_a_fallback_and_blank_keys_are_missing() {
        let mut config = BackendConfig::default();
        config.apply_env_overrides(env_of(&[("LLM_API_KEY", "  "), ("GOOGLE_API_KEY", "g-key")]));
        assert_eq!(config.api_key(), Some("g-key"));

        let config = BackendConfig {
            llm_api_key: Some("   ".to_string()),
            ..BackendConfig::default()
        };
        assert!(config.api_key().is_none());
    }

    #[test]
    fn invalid_port_is_ignored() {
        let mut config = BackendConfig::default();
        config.apply_env_overrides(env_of(&[("PORT", "not-a-port")]));
        assert_eq!(config.bind_addr, "127.0.0.1:5174");
    }

    #[test]
    fn invalid_timeout_keeps_the_previous_value() {
        let mut config = BackendConfig {
            request_timeout_secs: 12,
            ..BackendConfig::default()
        };
        config.apply_env_overrides(env_of(&[("LLM_TIMEOUT_SECS", "soon")]));
        assert_eq!(config.request_timeout_secs, 12);

        config.apply_env_overrides(env_of(&[("LLM_TIMEOUT_SECS", "-3")]));
        assert_eq!(config.request_timeout_secs, 12);
    }

    #[test]
    fn load_from_reads_partial_toml_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caligula_config.toml");
        fs::write(
            &path,
            "generation_model = \"gemini-2.5-pro\"\nlocal_responses_path = \"table.json\"\n",
        )
        .unwrap();

        let config = BackendConfig::load_from(&path).unwrap().unwrap();
        assert_eq!(config.generation_model, "gemini-2.5-pro");
        assert_eq!(config.verification_model, "gemma-3-27b-it");
        assert_eq!(config.local_responses_path.as_deref(), Some("table.json"));
    }

    #[test]
    fn load_from_missing_file_is_none_and_bad_toml_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(BackendConfig::load_from(&dir.path().join("absent.toml"))
            .unwrap()
            .is_none());

        let path = dir.path().join("broken.toml");
        fs::write(&path, "bind_addr = [").unwrap();
        assert!(BackendConfig::load_from(&path).is_err());
    }
}
