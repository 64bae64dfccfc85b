//! Process configuration, read once from the environment at startup.

use anyhow::{Context, Result};
use reqwest::Url;

const DEFAULT_PORT: u16 = 3100;
const DEFAULT_GATEWAY_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Base URL of the Evolution gateway API.
    pub gateway_url: Url,
    /// Sent as the `apikey` header on every gateway call.
    pub gateway_api_key: Option<String>,
    /// Shared secret for inbound bearer auth and for the outbound relay.
    pub self_api_key: Option<String>,
    /// Backend sink that receives relayed webhook events.
    pub sink_url: Option<String>,
    /// Externally reachable base URL, used when registering the webhook.
    pub public_base_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("invalid PORT: {raw}"))?,
            None => DEFAULT_PORT,
        };

        let raw_gateway = get("EVOLUTION_API_URL").unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string());
        let gateway_url = Url::parse(&raw_gateway)
            .with_context(|| format!("invalid EVOLUTION_API_URL: {raw_gateway}"))?;
        if gateway_url.cannot_be_a_base() {
            anyhow::bail!("EVOLUTION_API_URL must be a base URL: {raw_gateway}");
        }

        Ok(Self {
            port,
            gateway_url,
            gateway_api_key: get("EVOLUTION_API_KEY"),
            self_api_key: get("SELF_API_KEY"),
            sink_url: get("SUPABASE_WEBHOOK_URL"),
            public_base_url: get("PUBLIC_BASE_URL").map(|u| u.trim_end_matches('/').to_string()),
        })
    }
}
