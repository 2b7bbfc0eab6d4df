//! Board synchronization
//!
//! Refreshes each Pinterest account's cached board list from the platform.
//! Accounts are independent: one account's failure is recorded and the
//! rest continue.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::platforms::pinterest::PinterestAuth;
use crate::store::PostStore;
use crate::types::PlatformKind;

#[derive(Debug, Clone, Serialize)]
pub struct BoardSyncEntry {
    pub account_id: String,
    pub boards: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardSyncReport {
    pub accounts: Vec<BoardSyncEntry>,
}

pub struct BoardSyncService {
    store: PostStore,
    auth: PinterestAuth,
}

impl BoardSyncService {
    pub fn new(store: PostStore, auth: PinterestAuth) -> Self {
        Self { store, auth }
    }

    pub async fn sync_boards(&self) -> Result<BoardSyncReport> {
        let accounts = self
            .store
            .accounts_by_platform(PlatformKind::Pinterest.as_str())
            .await?;
        info!(accounts = accounts.len(), "Syncing boards");

        let mut entries = Vec::with_capacity(accounts.len());
        for account in &accounts {
            let Some(token) = account.credential() else {
                entries.push(BoardSyncEntry {
                    account_id: account.id.clone(),
                    boards: 0,
                    error: Some("no stored credential".into()),
                });
                continue;
            };

            match self.auth.list_boards(token).await {
                Ok(boards) => {
                    if let Err(err) = self.store.store_boards(&account.id, &boards).await {
                        entries.push(BoardSyncEntry {
                            account_id: account.id.clone(),
                            boards: 0,
                            error: Some(err.to_string()),
                        });
                        continue;
                    }
                    info!(account_id = %account.id, boards = boards.len(), "Boards refreshed");
                    entries.push(BoardSyncEntry {
                        account_id: account.id.clone(),
                        boards: boards.len(),
                        error: None,
                    });
                }
                Err(err) => {
                    warn!(account_id = %account.id, "Board listing failed: {}", err);
                    entries.push(BoardSyncEntry {
                        account_id: account.id.clone(),
                        boards: 0,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        Ok(BoardSyncReport { accounts: entries })
    }
}
