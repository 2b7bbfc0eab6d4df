//! Token lifecycle
//!
//! Two passes over the account table: mint tokens for accounts holding a
//! pending authorization code, and refresh tokens that have expired. A
//! rejected grant is terminal for that account and surfaced as an
//! authorization failure; it is never retried inline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::platforms::pinterest::PinterestAuth;
use crate::store::PostStore;
use crate::types::{PlatformAccount, PlatformKind};

#[derive(Debug, Clone, Serialize)]
pub struct TokenEntry {
    pub account_id: String,
    pub refreshed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenReport {
    pub minted: Vec<TokenEntry>,
    pub refreshed: Vec<TokenEntry>,
}

pub struct TokenService {
    store: PostStore,
    auth: PinterestAuth,
}

impl TokenService {
    pub fn new(store: PostStore, auth: PinterestAuth) -> Self {
        Self { store, auth }
    }

    /// Exchange pending authorization codes for token pairs.
    pub async fn mint_tokens(&self) -> Result<Vec<TokenEntry>> {
        let pending = self.store.accounts_with_auth_code().await?;
        info!(accounts = pending.len(), "Minting tokens for pending codes");

        let mut entries = Vec::with_capacity(pending.len());
        for account in pending.iter().filter(|a| is_pinterest(a)) {
            let Some(code) = account.auth_code.as_deref() else {
                continue;
            };

            match self.auth.exchange_code(code).await {
                Ok(pair) => {
                    self.store
                        .store_token_pair(
                            &account.id,
                            &pair.access_token,
                            pair.refresh_token.as_deref(),
                            pair.expires_at,
                        )
                        .await?;
                    info!(account_id = %account.id, "Token pair minted");
                    entries.push(TokenEntry {
                        account_id: account.id.clone(),
                        refreshed: true,
                        error: None,
                    });
                }
                Err(err) => {
                    warn!(account_id = %account.id, "Code exchange failed: {}", err);
                    entries.push(TokenEntry {
                        account_id: account.id.clone(),
                        refreshed: false,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        Ok(entries)
    }

    /// Refresh expired access tokens for accounts holding a refresh token.
    pub async fn refresh_tokens(&self, now: DateTime<Utc>) -> Result<Vec<TokenEntry>> {
        let expired = self.store.accounts_with_expired_tokens(now).await?;
        info!(accounts = expired.len(), "Refreshing expired tokens");

        let mut entries = Vec::with_capacity(expired.len());
        for account in expired.iter().filter(|a| is_pinterest(a)) {
            let Some(refresh_token) = account.refresh_token.as_deref() else {
                continue;
            };

            match self.auth.refresh(refresh_token).await {
                Ok(pair) => {
                    self.store
                        .store_token_pair(
                            &account.id,
                            &pair.access_token,
                            pair.refresh_token.as_deref(),
                            pair.expires_at,
                        )
                        .await?;
                    info!(account_id = %account.id, "Token refreshed");
                    entries.push(TokenEntry {
                        account_id: account.id.clone(),
                        refreshed: true,
                        error: None,
                    });
                }
                Err(err) => {
                    // The account link must be re-established by the user
                    warn!(account_id = %account.id, "Token refresh failed: {}", err);
                    entries.push(TokenEntry {
                        account_id: account.id.clone(),
                        refreshed: false,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        Ok(entries)
    }

    /// Run both passes and combine the reports.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<TokenReport> {
        Ok(TokenReport {
            minted: self.mint_tokens().await?,
            refreshed: self.refresh_tokens(now).await?,
        })
    }
}

fn is_pinterest(account: &PlatformAccount) -> bool {
    account.platform == PlatformKind::Pinterest
}
