use std::env;

/// Service configuration. Two recognized options:
///
/// - `FRONTEND_ORIGIN` — exact origin allowed by CORS. Unset means a
///   permissive default (dev mode).
/// - `AUTH_SECRET` — shared secret used to verify identity tokens.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub frontend_origin: Option<String>,
    pub auth_secret: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            frontend_origin: None,
            auth_secret: "dev-secret".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(origin) = env::var("FRONTEND_ORIGIN")
            && !origin.trim().is_empty()
        {
            config.frontend_origin = Some(origin.trim().to_string());
        }
        if let Ok(secret) = env::var("AUTH_SECRET")
            && !secret.is_empty()
        {
            config.auth_secret = secret;
        }
        config
    }
}
