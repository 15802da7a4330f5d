use std::io::{BufRead, IsTerminal, Write};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use vendorwatch_domain::{AuthToken, TokenProvider};
use vendorwatch_error::WatchError;

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

// Refresh a little before Google says the token expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

pub enum TokenSource {
    /// Pre-issued access token, used as is.
    Static(String),
    /// OAuth2 refresh-token grant.
    Refresh {
        client_id: String,
        client_secret: String,
        refresh_token: String,
        token_url: String,
    },
    /// Ask the user on the terminal.
    Interactive,
    /// Nothing configured and no way to ask.
    Unavailable,
}

struct Grant {
    token: AuthToken,
    expires_at: Option<Instant>,
}

impl Grant {
    fn is_fresh(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

pub struct GoogleTokenProvider {
    source: TokenSource,
    client: Client,
    cached: Mutex<Option<Grant>>,
}

impl GoogleTokenProvider {
    pub fn new(source: TokenSource) -> Self {
        Self {
            source,
            client: Client::new(),
            cached: Mutex::new(None),
        }
    }

    /// Interactive consent when stdin and stderr are a terminal, otherwise
    /// no source at all.
    pub fn interactive_if_terminal() -> TokenSource {
        if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() {
            TokenSource::Interactive
        } else {
            TokenSource::Unavailable
        }
    }

    async fn refresh(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
        token_url: &str,
    ) -> Result<Grant, WatchError> {
        debug!(token_url, "refreshing google access token");
        let resp = self
            .client
            .post(token_url)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| WatchError::auth(format!("token request failed: {e}")))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| WatchError::auth(format!("token response unreadable: {e}")))?;

        if let Some(err) = body["error"].as_str() {
            let detail = body["error_description"].as_str().unwrap_or("");
            return Err(WatchError::auth(format!("{err} {detail}").trim().to_string()));
        }
        if !status.is_success() {
            return Err(WatchError::auth(format!("token endpoint returned {status}")));
        }

        let token = body["access_token"]
            .as_str()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| WatchError::auth("identity service returned no token"))?;
        let expires_at = body["expires_in"]
            .as_u64()
            .map(|secs| Instant::now() + Duration::from_secs(secs).saturating_sub(EXPIRY_MARGIN));

        info!("google access token refreshed");
        Ok(Grant {
            token: AuthToken::new(token),
            expires_at,
        })
    }

    async fn prompt(&self) -> Result<Grant, WatchError> {
        let answer = tokio::task::spawn_blocking(|| -> std::io::Result<String> {
            let mut stderr = std::io::stderr();
            writeln!(stderr, "Gmail authorization required.")?;
            write!(stderr, "Paste an access token with the gmail.readonly scope: ")?;
            stderr.flush()?;
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await
        .map_err(|e| WatchError::internal(format!("spawn: {e}")))?
        .map_err(|e| WatchError::auth(format!("could not read token: {e}")))?;

        let token = answer.trim();
        if token.is_empty() {
            return Err(WatchError::auth("no token entered"));
        }
        Ok(Grant {
            token: AuthToken::new(token),
            expires_at: None,
        })
    }
}

#[async_trait]
impl TokenProvider for GoogleTokenProvider {
    async fn get_token(&self) -> Result<AuthToken, WatchError> {
        if let TokenSource::Static(token) = &self.source {
            return Ok(AuthToken::new(token.as_str()));
        }

        let mut cached = self.cached.lock().await;
        if let Some(grant) = cached.as_ref().filter(|g| g.is_fresh()) {
            return Ok(grant.token.clone());
        }

        let grant = match &self.source {
            TokenSource::Refresh {
                client_id,
                client_secret,
                refresh_token,
                token_url,
            } => {
                self.refresh(client_id, client_secret, refresh_token, token_url)
                    .await?
            }
            TokenSource::Interactive => self.prompt().await?,
            TokenSource::Static(_) | TokenSource::Unavailable => {
                warn!("no gmail credentials configured");
                return Err(WatchError::auth("no gmail credentials configured"));
            }
        };

        let token = grant.token.clone();
        *cached = Some(grant);
        Ok(token)
    }
}
