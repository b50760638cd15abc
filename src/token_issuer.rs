use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::TokenConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub uid: String,
    pub iat: u64,
    pub exp: u64,
}

#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Mints a signed custom token for an authenticated user id.
    async fn mint(&self, uid: &str) -> Result<String>;
}

/// HS256 token issuer. Tokens are standard `header.claims.signature`
/// JWTs signed with the configured secret.
pub struct HmacTokenIssuer {
    config: TokenConfig,
}

impl HmacTokenIssuer {
    pub fn new(config: TokenConfig) -> Self {
        Self { config }
    }

    fn signature(&self, signing_input: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.config.secret.as_bytes())
            .map_err(|_| anyhow!("invalid token secret"))?;
        mac.update(signing_input.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    #[cfg(test)]
    pub fn verify(&self, token: &str) -> Result<TokenClaims> {
        let mut parts = token.split('.');
        let (header, claims, signature) = match (parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(c), Some(s)) if parts.next().is_none() => (h, c, s),
            _ => return Err(anyhow!("malformed token")),
        };
        let signing_input = format!("{}.{}", header, claims);
        let mut mac = HmacSha256::new_from_slice(self.config.secret.as_bytes())
            .map_err(|_| anyhow!("invalid token secret"))?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| anyhow!("malformed token signature"))?;
        mac.verify_slice(&signature)
            .map_err(|_| anyhow!("token signature mismatch"))?;
        let claims = URL_SAFE_NO_PAD
            .decode(claims)
            .map_err(|_| anyhow!("malformed token claims"))?;
        let claims: TokenClaims = serde_json::from_slice(&claims)?;
        Ok(claims)
    }
}

#[async_trait]
impl TokenIssuer for HmacTokenIssuer {
    async fn mint(&self, uid: &str) -> Result<String> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let header = TokenHeader {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        };
        let claims = TokenClaims {
            iss: self.config.issuer.clone(),
            sub: uid.to_string(),
            aud: self.config.audience.clone(),
            uid: uid.to_string(),
            iat: now,
            exp: now + self.config.ttl_seconds,
        };
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );
        let signature = self.signature(&signing_input)?;
        Ok(format!("{}.{}", signing_input, signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer(secret: &str) -> HmacTokenIssuer {
        HmacTokenIssuer::new(TokenConfig {
            secret: secret.to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_mint_and_verify() -> Result<()> {
        let issuer = issuer("test-secret");
        let token = issuer.mint("user-1").await?;
        assert_eq!(token.split('.').count(), 3);

        let claims = issuer.verify(&token)?;
        assert_eq!(claims.uid, "user-1");
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.iss, "storyverse-server");
        assert_eq!(claims.aud, "storyverse-app");
        assert_eq!(claims.exp, claims.iat + 3600);
        Ok(())
    }

    #[tokio::test]
    async fn test_header_is_standard() -> Result<()> {
        let token = issuer("test-secret").mint("user-1").await?;
        let header = token.split('.').next().unwrap();
        let header = URL_SAFE_NO_PAD.decode(header)?;
        let header: serde_json::Value = serde_json::from_slice(&header)?;
        assert_eq!(header["alg"], "HS256");
        assert_eq!(header["typ"], "JWT");
        Ok(())
    }

    #[tokio::test]
    async fn test_tampered_token_rejected() -> Result<()> {
        let issuer = issuer("test-secret");
        let token = issuer.mint("user-1").await?;

        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        parts[1] = URL_SAFE_NO_PAD.encode(b"{\"uid\":\"user-2\"}");
        assert!(issuer.verify(&parts.join(".")).is_err());

        assert!(issuer.verify("not-a-token").is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() -> Result<()> {
        let token = issuer("test-secret").mint("user-1").await?;
        assert!(issuer("other-secret").verify(&token).is_err());
        Ok(())
    }
}
