//! Shared server state: run configuration, configured provider fleet, and
//! per-platform API credentials. Built once from the environment at startup.

use std::sync::Arc;

use revman_core::config::ReviewConfig;
use revman_core::errors::ConfigError;
use revman_core::orchestrator::ProviderEndpoint;
use revman_core::platform::PlatformKind;
use revman_core::provider_client::ProviderKind;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ReviewConfig>,
    pub providers: Arc<Vec<ProviderEndpoint>>,
    pub github: Option<PlatformCredentials>,
    pub gitlab: Option<PlatformCredentials>,
    pub bitbucket: Option<PlatformCredentials>,
    pub trigger_secret: String,
}

#[derive(Clone)]
pub struct PlatformCredentials {
    pub base_api: String,
    pub token: String,
}

impl AppState {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = ReviewConfig::from_env()?;
        let providers = load_provider_endpoints();
        let trigger_secret = std::env::var("REVMAN_TRIGGER_SECRET").unwrap_or_default();

        Ok(Self {
            config: Arc::new(config),
            providers: Arc::new(providers),
            github: platform_credentials("REVMAN_GITHUB_API", "REVMAN_GITHUB_TOKEN", "https://api.github.com"),
            gitlab: platform_credentials("REVMAN_GITLAB_API", "REVMAN_GITLAB_TOKEN", "https://gitlab.com/api/v4"),
            bitbucket: platform_credentials("REVMAN_BITBUCKET_API", "REVMAN_BITBUCKET_TOKEN", "https://api.bitbucket.org/2.0"),
            trigger_secret,
        })
    }

    pub fn credentials_for(&self, kind: PlatformKind) -> Option<&PlatformCredentials> {
        match kind {
            PlatformKind::GitHub => self.github.as_ref(),
            PlatformKind::GitLab => self.gitlab.as_ref(),
            PlatformKind::Bitbucket => self.bitbucket.as_ref(),
        }
    }
}

fn platform_credentials(base_var: &str, token_var: &str, default_base: &str) -> Option<PlatformCredentials> {
    let token = std::env::var(token_var).ok()?;
    let base_api = std::env::var(base_var).unwrap_or_else(|_| default_base.to_string());
    Some(PlatformCredentials { base_api, token })
}

/// Reads `REVMAN_PROVIDER_<NAME>_{KIND,MODEL,ENDPOINT,API_KEY}` for every
/// name in `REVMAN_PROVIDERS`.
fn load_provider_endpoints() -> Vec<ProviderEndpoint> {
    let names: Vec<String> = std::env::var("REVMAN_PROVIDERS")
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    names
        .into_iter()
        .filter_map(|name| {
            let upper = name.to_ascii_uppercase().replace('-', "_");
            let kind = match std::env::var(format!("REVMAN_PROVIDER_{upper}_KIND")).ok()?.as_str() {
                "ollama" => ProviderKind::Ollama,
                _ => ProviderKind::OpenAiCompatible,
            };
            let model = std::env::var(format!("REVMAN_PROVIDER_{upper}_MODEL")).ok()?;
            let endpoint = std::env::var(format!("REVMAN_PROVIDER_{upper}_ENDPOINT")).ok()?;
            let api_key = std::env::var(format!("REVMAN_PROVIDER_{upper}_API_KEY")).ok();
            Some(ProviderEndpoint { name, kind, model, endpoint, api_key })
        })
        .collect()
}
