use crate::error::VoiceError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_STT_URL: &str = "https://fal.run/freya-mypsdi253hbk/freya-stt";
pub const DEFAULT_TTS_URL: &str = "https://fal.run/freya-mypsdi253hbk/freya-tts";
pub const DEFAULT_LLM_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_LLM_MODEL: &str = "google/gemini-2.5-flash";

fn default_stt_url() -> String {
    DEFAULT_STT_URL.to_string()
}

fn default_tts_url() -> String {
    DEFAULT_TTS_URL.to_string()
}

fn default_llm_url() -> String {
    DEFAULT_LLM_URL.to_string()
}

fn default_llm_model() -> String {
    DEFAULT_LLM_MODEL.to_string()
}

fn default_site_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_app_name() -> String {
    "Wingman AI Interview".to_string()
}

/// Endpoints and credentials for the three remote voice services.
///
/// The fal key authorizes both transcription and synthesis; the OpenRouter
/// key authorizes completions. Keys are never serialized and are redacted
/// from `Debug` output.
#[derive(Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_stt_url")]
    pub stt_url: String,
    #[serde(default = "default_tts_url")]
    pub tts_url: String,
    #[serde(default = "default_llm_url")]
    pub llm_url: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default, skip_serializing)]
    pub fal_key: String,
    #[serde(default, skip_serializing)]
    pub openrouter_api_key: String,
    /// Sent as `HTTP-Referer` on completion requests.
    #[serde(default = "default_site_url")]
    pub site_url: String,
    /// Sent as `X-Title` on completion requests.
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            stt_url: default_stt_url(),
            tts_url: default_tts_url(),
            llm_url: default_llm_url(),
            llm_model: default_llm_model(),
            fal_key: String::new(),
            openrouter_api_key: String::new(),
            site_url: default_site_url(),
            app_name: default_app_name(),
        }
    }
}

impl fmt::Debug for VoiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceConfig")
            .field("stt_url", &self.stt_url)
            .field("tts_url", &self.tts_url)
            .field("llm_url", &self.llm_url)
            .field("llm_model", &self.llm_model)
            .field("fal_key", &"[REDACTED]")
            .field("openrouter_api_key", &"[REDACTED]")
            .field("site_url", &self.site_url)
            .field("app_name", &self.app_name)
            .finish()
    }
}

impl VoiceConfig {
    /// Checks that every endpoint is an absolute http(s) URL and that a model is set.
    ///
    /// Missing keys are not an error here: the remote services reject the
    /// request and the session reports the failure to the client.
    pub fn validate(&self) -> Result<(), VoiceError> {
        for (name, url) in [
            ("stt_url", &self.stt_url),
            ("tts_url", &self.tts_url),
            ("llm_url", &self.llm_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(VoiceError::Config(format!(
                    "{name} must be an http(s) URL, got '{url}'"
                )));
            }
        }
        if self.llm_model.trim().is_empty() {
            return Err(VoiceError::Config("llm_model must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn has_credentials(&self) -> bool {
        !self.fal_key.is_empty() && !self.openrouter_api_key.is_empty()
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_keys() {
        let config = VoiceConfig {
            fal_key: "fal-secret".to_string(),
            openrouter_api_key: "or-secret".to_string(),
            ..VoiceConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("fal-secret"));
        assert!(!debug.contains("or-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn keys_are_not_serialized() {
        let config = VoiceConfig {
            fal_key: "fal-secret".to_string(),
            ..VoiceConfig::default()
        };
        let toml = toml::to_string(&config).unwrap();
        assert!(!toml.contains("fal-secret"));
        assert!(toml.contains(DEFAULT_LLM_MODEL));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: VoiceConfig = toml::from_str(r#"llm_model = "openai/gpt-4o-mini""#).unwrap();
        assert_eq!(config.llm_model, "openai/gpt-4o-mini");
        assert_eq!(config.stt_url, DEFAULT_STT_URL);
        assert!(config.fal_key.is_empty());
    }

    #[test]
    fn validate_rejects_relative_urls() {
        let config = VoiceConfig {
            tts_url: "fal.run/tts".to_string(),
            ..VoiceConfig::default()
        };
        assert!(matches!(config.validate(), Err(VoiceError::Config(_))));
        assert!(VoiceConfig::default().validate().is_ok());
    }

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("http://a/b/", "/stream"), "http://a/b/stream");
        assert_eq!(join_url("http://a/b", "stream"), "http://a/b/stream");
    }
}
