use log::*;
use tap_common::Secret;

pub const DEFAULT_API_BASE: &str = "https://api.mercadopago.com";
pub const DEFAULT_AUTH_BASE: &str = "https://auth.mercadopago.com";

#[derive(Debug, Clone, Default)]
pub struct MercadoConfig {
    /// The application id issued by the provider for this marketplace.
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// The registered OAuth redirect URI. Must match the value configured on the provider side exactly.
    pub redirect_uri: String,
    /// Base URL for REST calls. Overridable so tests can point the client at a stub server.
    pub api_base: String,
    /// Base URL for the interactive authorization page.
    pub auth_base: String,
}

impl MercadoConfig {
    pub fn new_from_env_or_default() -> Self {
        let client_id = std::env::var("TAP_MP_CLIENT_ID").unwrap_or_else(|_| {
            warn!("🪛️ TAP_MP_CLIENT_ID not set. OAuth linking will not work until it is configured.");
            String::default()
        });
        let client_secret = Secret::new(std::env::var("TAP_MP_CLIENT_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ TAP_MP_CLIENT_SECRET not set. Token exchanges will be rejected by the provider.");
            String::default()
        }));
        let redirect_uri = std::env::var("TAP_MP_REDIRECT_URI").unwrap_or_else(|_| {
            warn!("🪛️ TAP_MP_REDIRECT_URI not set. The provider will refuse the authorization request.");
            String::default()
        });
        let api_base = std::env::var("TAP_MP_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let auth_base = std::env::var("TAP_MP_AUTH_BASE").unwrap_or_else(|_| DEFAULT_AUTH_BASE.to_string());
        Self { client_id, client_secret, redirect_uri, api_base, auth_base }
    }

    /// The interactive authorization URL a vendor is redirected to when starting the linking flow.
    /// `state` must already be URL-safe (the state codec produces base64url tokens).
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}/authorization?client_id={}&response_type=code&platform_id=mp&redirect_uri={}&state={}",
            self.auth_base,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(state),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn authorization_url_encodes_query_params() {
        let config = MercadoConfig {
            client_id: "app-123".to_string(),
            redirect_uri: "https://tap.example/oauth/callback".to_string(),
            auth_base: DEFAULT_AUTH_BASE.to_string(),
            ..Default::default()
        };
        let url = config.authorization_url("abc.def");
        assert!(url.starts_with("https://auth.mercadopago.com/authorization?"));
        assert!(url.contains("client_id=app-123"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Ftap.example%2Foauth%2Fcallback"));
        assert!(url.contains("state=abc.def"));
    }
}
