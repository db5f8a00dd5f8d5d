//! Placeholder login gate.
//!
//! No verification happens here: the token is only `base64(username:password)`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use crate::session::{Result, SessionError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    username: String,
    token: String,
}

impl AuthSession {
    /// Rebuild a session from a previously issued token.
    pub fn from_token(token: &str) -> Result<Self> {
        let decoded = STANDARD
            .decode(token)
            .map_err(|err| SessionError::auth(err.to_string()))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|err| SessionError::auth(err.to_string()))?;
        let (username, _) = decoded
            .split_once(':')
            .ok_or_else(|| SessionError::auth("Malformed token"))?;

        if username.is_empty() {
            return Err(SessionError::auth("Username is required"));
        }

        Ok(Self {
            username: username.to_string(),
            token: token.to_string(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// 头像上显示的首字母
    pub fn initial(&self) -> char {
        self.username
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('?')
    }
}

pub fn login(username: &str, password: &str) -> Result<AuthSession> {
    let username = username.trim();
    if username.is_empty() {
        return Err(SessionError::auth("Username is required"));
    }

    let token = STANDARD.encode(format!("{}:{}", username, password));
    tracing::info!(username, "logged in");

    Ok(AuthSession {
        username: username.to_string(),
        token,
    })
}
