use crate::error::RegistryError;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// `None` unless a username is set.
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Option<Self> {
        match username {
            Some(username) if !username.is_empty() => Some(Self {
                username,
                password: password.unwrap_or_default(),
            }),
            _ => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A `WWW-Authenticate: Bearer ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

impl BearerChallenge {
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut realm = None;
        let mut service = None;
        let mut scope = None;
        for (key, value) in parse_params(params) {
            match key.as_str() {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }

        Some(Self {
            realm: realm?,
            service,
            scope,
        })
    }

    fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.realm,
            self.service.as_deref().unwrap_or_default(),
            self.scope.as_deref().unwrap_or_default()
        )
    }
}

// key="value" pairs; quoted values may contain commas (e.g. "repository:x:pull,push").
fn parse_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut rest = input.trim();

    while !rest.is_empty() {
        let Some((key, after)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim().to_ascii_lowercase();
        let after = after.trim_start();

        let (value, remaining) = match after.strip_prefix('"') {
            Some(quoted) => match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            },
            None => match after.find(',') {
                Some(end) => (after[..end].trim_end(), &after[end..]),
                None => (after.trim_end(), ""),
            },
        };

        params.push((key, value.to_string()));
        rest = remaining.trim_start().trim_start_matches(',').trim_start();
    }

    params
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

pub struct Authenticator {
    client: Client,
    credentials: Option<Credentials>,
    tokens: HashMap<String, String>, // challenge -> token
}

impl Authenticator {
    pub fn new(client: Client, credentials: Option<Credentials>) -> Self {
        Self {
            client,
            credentials,
            tokens: HashMap::new(),
        }
    }

    pub async fn get_token(&mut self, challenge: &BearerChallenge) -> Result<String, RegistryError> {
        let cache_key = challenge.cache_key();
        if let Some(token) = self.tokens.get(&cache_key) {
            return Ok(token.clone());
        }

        let mut query = Vec::new();
        if let Some(service) = &challenge.service {
            query.push(("service", service.as_str()));
        }
        if let Some(scope) = &challenge.scope {
            query.push(("scope", scope.as_str()));
        }

        let mut req = self.client.get(&challenge.realm).query(&query);
        if let Some(creds) = &self.credentials {
            req = req.basic_auth(&creds.username, Some(&creds.password));
        }
        let resp = req.send().await?;

        if !resp.status().is_success() {
            return Err(RegistryError::AuthenticationFailed(format!(
                "Token endpoint {} returned {}",
                challenge.realm,
                resp.status()
            )));
        }

        let body = resp.bytes().await?;
        let token_resp: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| RegistryError::Decode(format!("token response: {}", e)))?;
        let token = token_resp
            .token
            .or(token_resp.access_token)
            .ok_or_else(|| RegistryError::AuthenticationFailed("Token endpoint returned no token".to_string()))?;

        self.tokens.insert(cache_key, token.clone());
        Ok(token)
    }

    /// Drops a cached token the registry no longer accepts.
    pub fn invalidate(&mut self, challenge: &BearerChallenge) {
        self.tokens.remove(&challenge.cache_key());
    }
}
