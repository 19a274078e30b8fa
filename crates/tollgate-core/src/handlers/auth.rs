//! JWT authentication handler, exposed through the core crate's
//! transport-agnostic `Handler` contract instead of an actix `Transform`.

use super::Handler;
use crate::context::Context;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
    iat: usize,
    iss: Option<String>,
    aud: Option<String>,
    roles: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,
    pub secret: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default)]
    pub required_claims: Vec<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

fn parse_algorithm(name: &str) -> Algorithm {
    match name {
        "HS384" => Algorithm::HS384,
        "HS512" => Algorithm::HS512,
        "RS256" => Algorithm::RS256,
        _ => Algorithm::HS256,
    }
}

pub struct JwtAuthHandler {
    enabled: bool,
    secret: String,
    algorithm: Algorithm,
    required_claims: HashSet<String>,
    issuer: Option<String>,
    audience: Option<String>,
}

impl JwtAuthHandler {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            enabled: config.enabled,
            secret: config.secret,
            algorithm: parse_algorithm(&config.algorithm),
            required_claims: config.required_claims.into_iter().collect(),
            issuer: config.issuer,
            audience: config.audience,
        }
    }

    fn extract_token(ctx: &Context) -> Option<&str> {
        let header = ctx.header("authorization");
        header.strip_prefix("Bearer ")
    }

    fn validate(&self, token: &str) -> Result<Claims, String> {
        let mut validation = Validation::new(self.algorithm);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        if let Some(audience) = &self.audience {
            validation.set_audience(&[audience]);
        }
        let key = DecodingKey::from_secret(self.secret.as_bytes());
        let data = decode::<Claims>(token, &key, &validation).map_err(|e| e.to_string())?;
        let claims = data.claims;

        for required in &self.required_claims {
            let present = match required.as_str() {
                "roles" => claims.roles.is_some(),
                "iss" => claims.iss.is_some(),
                "aud" => claims.aud.is_some(),
                _ => true,
            };
            if !present {
                return Err(format!("missing required claim '{required}'"));
            }
        }
        Ok(claims)
    }
}

impl Handler for JwtAuthHandler {
    fn handle(&self, ctx: &mut Context) -> bool {
        if !self.enabled {
            return true;
        }

        let token = match Self::extract_token(ctx) {
            Some(t) => t.to_string(),
            None => {
                ctx.abort_with_message(401, "Missing or malformed Authorization header");
                return false;
            }
        };

        match self.validate(&token) {
            Ok(claims) => {
                ctx.set_attribute("jwt_subject", claims.sub);
                true
            }
            Err(_) => {
                ctx.abort_with_message(401, "Invalid or expired token");
                false
            }
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "auth"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::collections::HashMap;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn ctx_with_auth(header: Option<&str>) -> Context {
        let mut headers = HashMap::new();
        if let Some(h) = header {
            headers.insert("authorization".to_string(), vec![h.to_string()]);
        }
        Context::new("GET", "/api", HashMap::new(), headers, HashMap::new(), None, Vec::new())
    }

    fn token(secret: &str, sub: &str) -> String {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as usize;
        let claims = Claims {
            sub: sub.to_string(),
            exp: now + 3600,
            iat: now,
            iss: None,
            aud: None,
            roles: None,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn cfg(secret: &str) -> AuthConfig {
        AuthConfig {
            enabled: true,
            secret: secret.to_string(),
            algorithm: "HS256".to_string(),
            required_claims: vec![],
            issuer: None,
            audience: None,
        }
    }

    #[test]
    fn disabled_handler_always_admits() {
        let handler = JwtAuthHandler::new(AuthConfig { enabled: false, ..cfg("s") });
        assert!(handler.handle(&mut ctx_with_auth(None)));
    }

    #[test]
    fn missing_header_is_rejected() {
        let handler = JwtAuthHandler::new(cfg("secret"));
        let mut c = ctx_with_auth(None);
        assert!(!handler.handle(&mut c));
        assert_eq!(c.abort_response().unwrap().status, 401);
    }

    #[test]
    fn valid_token_is_admitted_and_sets_subject() {
        let handler = JwtAuthHandler::new(cfg("secret"));
        let t = token("secret", "user-1");
        let mut c = ctx_with_auth(Some(&format!("Bearer {t}")));
        assert!(handler.handle(&mut c));
        assert_eq!(c.attribute("jwt_subject").unwrap(), "user-1");
    }

    #[test]
    fn token_signed_with_wrong_secret_is_rejected() {
        let handler = JwtAuthHandler::new(cfg("secret"));
        let t = token("other-secret", "user-1");
        let mut c = ctx_with_auth(Some(&format!("Bearer {t}")));
        assert!(!handler.handle(&mut c));
    }

    #[test]
    fn missing_required_claim_is_rejected() {
        let handler = JwtAuthHandler::new(AuthConfig {
            required_claims: vec!["roles".to_string()],
            ..cfg("secret")
        });
        let t = token("secret", "user-1");
        let mut c = ctx_with_auth(Some(&format!("Bearer {t}")));
        assert!(!handler.handle(&mut c));
    }
}
