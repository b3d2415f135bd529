use anyhow::{bail, Context, Result};

/// Which origins receive CORS grants.
#[derive(Debug, Clone, Default)]
pub enum CorsPolicy {
    /// Allow any origin (`Access-Control-Allow-Origin: *`).
    #[default]
    AllowAll,
    /// Allow only the listed origins, echoed back exactly.
    AllowList(Vec<String>),
}

impl CorsPolicy {
    /// The allow-origin value a request with the given `Origin` header is
    /// entitled to. `None` means the request must be refused.
    pub fn grant(&self, origin: Option<&str>) -> Option<String> {
        match self {
            CorsPolicy::AllowAll => Some("*".to_string()),
            CorsPolicy::AllowList(allowed) => {
                let origin = origin?;
                allowed
                    .iter()
                    .any(|entry| entry == origin)
                    .then(|| origin.to_string())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Credential for the upstream completion provider.
    pub api_key: String,
    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,
    /// Model (bot) identifier. Callers cannot override this.
    pub model: String,
    pub cors: CorsPolicy,
    /// Stream the reply as plain-text fragments instead of one JSON body.
    pub streaming: bool,
    pub port: u16,
}

const DEFAULT_BASE_URL: &str = "https://api.poe.com/v1";
const DEFAULT_PORT: u16 = 3000;

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("UPSTREAM_API_KEY")
            .context("UPSTREAM_API_KEY must be set in the environment or .env file")?;
        let model = std::env::var("UPSTREAM_MODEL")
            .context("UPSTREAM_MODEL must be set in the environment or .env file")?;
        let base_url =
            std::env::var("UPSTREAM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let cors = match std::env::var("ALLOWED_ORIGINS") {
            Ok(raw) => parse_origins(&raw),
            Err(_) => CorsPolicy::AllowAll,
        };

        let streaming = match std::env::var("RELAY_STREAMING") {
            Ok(raw) => parse_bool(&raw).context("RELAY_STREAMING must be true or false")?,
            Err(_) => true,
        };

        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().context("PORT must be a valid port number")?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            api_key,
            base_url,
            model,
            cors,
            streaming,
            port,
        })
    }
}

/// Comma-separated exact origins; an empty value means wildcard.
fn parse_origins(raw: &str) -> CorsPolicy {
    if raw.trim().is_empty() {
        return CorsPolicy::AllowAll;
    }
    CorsPolicy::AllowList(
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => bail!("not a boolean: {other:?}"),
    }
}
