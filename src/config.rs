use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Base address of the news backend; `/api/news` is appended to it
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub speech: SpeechConfig,
}

fn default_backend_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SpeechConfig {
    #[serde(default = "default_speech_enabled")]
    pub enabled: bool,
    /// Synthesizer executable, looked up on PATH
    #[serde(default = "default_speech_program")]
    pub program: String,
    /// Speaking rate at 1x
    #[serde(default = "default_words_per_minute")]
    pub words_per_minute: u32,
}

fn default_speech_enabled() -> bool {
    true
}

fn default_speech_program() -> String {
    "espeak-ng".to_string()
}

fn default_words_per_minute() -> u32 {
    175
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: default_speech_enabled(),
            program: default_speech_program(),
            words_per_minute: default_words_per_minute(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            listen_addr: default_listen_addr(),
            speech: SpeechConfig::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply an override for the backend address, e.g. from `NEWS_BACKEND_URL`
    pub fn with_backend_url(mut self, backend_url: Option<String>) -> Self {
        if let Some(url) = backend_url.filter(|u| !u.trim().is_empty()) {
            self.backend_url = url;
        }
        self
    }
}
