use std::{env, net::IpAddr};

use log::*;
use mercado_tools::MercadoConfig as MercadoApiConfig;
use rand::{distributions::Alphanumeric, Rng};
use tap_common::{helpers::parse_boolean_flag, Secret};

use crate::errors::ServerError;

const DEFAULT_TAP_HOST: &str = "127.0.0.1";
const DEFAULT_TAP_PORT: u16 = 8360;
const DEFAULT_FEE_PERCENT: u8 = 10;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    /// Base URL of the marketplace UI; successful OAuth callbacks redirect to its dashboard.
    pub app_base_url: String,
    /// Payment provider configuration.
    pub mercado: MercadoSettings,
}

#[derive(Clone, Debug, Default)]
pub struct MercadoSettings {
    /// Client credentials and endpoints for the provider API.
    pub api: MercadoApiConfig,
    /// Secret used to sign OAuth state tokens. Deliberately distinct from the client secret.
    pub state_secret: Secret<String>,
    /// Optional application-level access token, used as a fallback when a webhook payment cannot be
    /// fetched with the owning vendor's credentials.
    pub fallback_access_token: Option<Secret<String>>,
    /// Secret for validating webhook signatures.
    pub webhook_secret: Secret<String>,
    /// When false, webhook signature checks are skipped entirely. Never run production like this.
    pub webhook_checks: bool,
    /// If supplied, requests against the webhook endpoint are also checked against this source-IP
    /// whitelist. To explicitly disable the whitelist, set the variable to "false", "none", or "0".
    pub whitelist: Option<Vec<IpAddr>>,
    /// The marketplace's cut of each checkout, as an integer percentage.
    pub marketplace_fee_percent: u8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_TAP_HOST.to_string(),
            port: DEFAULT_TAP_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            app_base_url: "http://localhost:3000".to_string(),
            mercado: MercadoSettings::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("TAP_HOST").ok().unwrap_or_else(|| DEFAULT_TAP_HOST.into());
        let port = env::var("TAP_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for TAP_PORT. {e} Using the default, {DEFAULT_TAP_PORT}, instead."
                    );
                    DEFAULT_TAP_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_TAP_PORT);
        let database_url = env::var("TAP_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ TAP_DATABASE_URL is not set. Please set it to the URL for the Tap database.");
            String::default()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to \
                 the default configuration."
            );
            AuthConfig::default()
        });
        let app_base_url = env::var("TAP_APP_BASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ TAP_APP_BASE_URL is not set. Dashboard redirects will point at localhost.");
            "http://localhost:3000".to_string()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("TAP_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("TAP_USE_FORWARDED").ok(), false);
        let mercado = MercadoSettings::from_env_or_defaults();
        Self { host, port, database_url, auth, use_x_forwarded_for, use_forwarded, app_base_url, mercado }
    }
}

impl MercadoSettings {
    pub fn from_env_or_defaults() -> Self {
        let api = MercadoApiConfig::new_from_env_or_default();
        let state_secret = env::var("TAP_OAUTH_STATE_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ TAP_OAUTH_STATE_SECRET is not set. Please set it to the HMAC signing key for OAuth state tokens."
            );
            String::default()
        });
        let fallback_access_token = env::var("TAP_MP_ACCESS_TOKEN").ok().filter(|s| !s.is_empty()).map(Secret::new);
        if fallback_access_token.is_none() {
            info!(
                "🪛️ TAP_MP_ACCESS_TOKEN is not set. Webhook payments that cannot be attributed to a vendor will be \
                 acknowledged without reconciliation."
            );
        }
        let webhook_secret = env::var("TAP_MP_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ TAP_MP_WEBHOOK_SECRET is not set. Please set it to the webhook signing key for your app.");
            String::default()
        });
        let webhook_checks = parse_boolean_flag(env::var("TAP_MP_WEBHOOK_CHECKS").ok(), true);
        if !webhook_checks {
            warn!("🚨️ Webhook signature checks are DISABLED. Do not run production like this.");
        }
        let whitelist = env::var("TAP_MP_IP_WHITELIST").ok().and_then(|s| {
            if ["none", "false", "0"].contains(&s.to_lowercase().as_str()) {
                info!(
                    "🪛️ The webhook IP whitelist is disabled. If this is not what you want, set \
                     TAP_MP_IP_WHITELIST to a comma-separated list of IP addresses to enable it."
                );
                return None;
            }
            let ip_addrs = s
                .split(',')
                .filter_map(|s| {
                    s.trim()
                        .parse()
                        .map_err(|e| {
                            warn!("🪛️ Ignoring invalid IP address ({s}) in TAP_MP_IP_WHITELIST: {e}");
                            None::<IpAddr>
                        })
                        .ok()
                })
                .collect::<Vec<IpAddr>>();
            Some(ip_addrs)
        });
        match &whitelist {
            Some(whitelist) if whitelist.is_empty() => {
                warn!(
                    "🚨️ The webhook IP whitelist was configured, but is empty. The server will run, but won't \
                     authorise any incoming webhook requests."
                );
            },
            None => {
                info!("🪛️ No webhook IP whitelist is set. Only signature validation will be used.");
            },
            Some(v) => {
                let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
                info!("🪛️ Webhook IP whitelist: {addrs}");
            },
        }
        let marketplace_fee_percent = env::var("TAP_MARKETPLACE_FEE_PERCENT")
            .ok()
            .and_then(|s| {
                s.parse::<u8>()
                    .map_err(|e| warn!("🪛️ Invalid value for TAP_MARKETPLACE_FEE_PERCENT: {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_FEE_PERCENT);
        Self {
            api,
            state_secret: Secret::new(state_secret),
            fallback_access_token,
            webhook_secret: Secret::new(webhook_secret),
            webhook_checks,
            whitelist,
            marketplace_fee_percent,
        }
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
/// Session tokens are minted by the hosted identity provider and verified here with a shared HMAC secret.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub session_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The session secret has not been set. I'm using a random value for this session. Logins minted \
             by the identity provider WILL NOT VERIFY, and every session issued against this value dies with the \
             process. Set TAP_SESSION_SECRET. 🚨️🚨️🚨️"
        );
        let secret: String = rand::thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect();
        Self { session_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret = env::var("TAP_SESSION_SECRET")
            .map_err(|e| ServerError::ConfigurationError(format!("{e} [TAP_SESSION_SECRET]")))?;
        if secret.len() < 32 {
            return Err(ServerError::ConfigurationError(
                "TAP_SESSION_SECRET must be at least 32 characters long.".to_string(),
            ));
        }
        Ok(Self { session_secret: Secret::new(secret) })
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that route handlers need at request time. Generally we try to keep
/// this as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    pub app_base_url: String,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
            app_base_url: config.app_base_url.clone(),
        }
    }

    pub fn dashboard_url(&self) -> String {
        format!("{}/dashboard", self.app_base_url.trim_end_matches('/'))
    }
}
