use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::AppConfig;

type HmacSha256 = Hmac<Sha256>;

/// The verified-identity record the external identity provider vouches for.
/// The service only ever consumes this; it never issues credentials itself.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
    pub primary_email: String,
    #[serde(default)]
    pub verified_emails: Vec<String>,
}

impl Identity {
    /// All emails the caller is verified for, normalized. The primary email
    /// is always included.
    pub fn emails(&self) -> Vec<String> {
        let mut emails: Vec<String> = self
            .verified_emails
            .iter()
            .map(|e| crate::models::normalize_email(e))
            .collect();
        let primary = crate::models::normalize_email(&self.primary_email);
        if !primary.is_empty() && !emails.contains(&primary) {
            emails.push(primary);
        }
        emails
    }
}

/// Mint a signed identity token: `base64url(claims).hex(hmac)`. Exposed for
/// tests and trusted tooling that stands in for the identity provider.
pub fn mint_token(identity: &Identity, secret: &str) -> String {
    let claims = serde_json::to_vec(identity).unwrap_or_default();
    let payload = URL_SAFE_NO_PAD.encode(claims);
    let signature = sign(&payload, secret);
    format!("{payload}.{signature}")
}

/// Verify a token and recover the identity. Any structural or signature
/// failure yields None; callers decide between 401 and anonymous.
pub fn verify_token(token: &str, secret: &str) -> Option<Identity> {
    let (payload, signature) = token.split_once('.')?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload.as_bytes());
    let expected = hex::decode(signature).ok()?;
    mac.verify_slice(&expected).ok()?;
    let claims = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&claims).ok()
}

fn sign(payload: &str, secret: &str) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Request guard for routes that require authentication. Optional-auth routes
/// take `Option<AuthedUser>` and fall back to anonymous.
pub struct AuthedUser(pub Identity);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthedUser {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(config) = req.rocket().state::<AppConfig>() else {
            return Outcome::Error((Status::InternalServerError, ()));
        };
        let token = req
            .headers()
            .get_one("Authorization")
            .and_then(|auth| auth.strip_prefix("Bearer "));
        match token.and_then(|t| verify_token(t, &config.auth_secret)) {
            Some(identity) => Outcome::Success(AuthedUser(identity)),
            None => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}
