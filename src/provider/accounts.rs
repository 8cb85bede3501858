//! Ad account discovery

use super::InsightsApi;
use crate::error::Result;
use crate::types::Account;
use futures::future::try_join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Business edges that list ad accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountEdge {
    /// Accounts the business manages for clients
    ClientAdAccounts,
    /// Accounts the business owns
    OwnedAdAccounts,
}

impl AccountEdge {
    pub const ALL: [AccountEdge; 2] = [AccountEdge::ClientAdAccounts, AccountEdge::OwnedAdAccounts];

    pub fn as_str(self) -> &'static str {
        match self {
            AccountEdge::ClientAdAccounts => "client_ad_accounts",
            AccountEdge::OwnedAdAccounts => "owned_ad_accounts",
        }
    }
}

/// Resolves the ad accounts of a set of businesses
///
/// Accounts are fetched fresh on every call.
pub struct AccountDiscovery {
    api: Arc<dyn InsightsApi>,
    deduplicate: bool,
}

impl AccountDiscovery {
    pub fn new(api: Arc<dyn InsightsApi>) -> Self {
        Self {
            api,
            deduplicate: true,
        }
    }

    /// Keep accounts reachable through several edges once (default) or every time
    #[must_use]
    pub fn deduplicate(mut self, deduplicate: bool) -> Self {
        self.deduplicate = deduplicate;
        self
    }

    /// Query every edge of every business concurrently
    ///
    /// Order follows the business list, then the edge order. Any failed
    /// listing fails the whole discovery.
    pub async fn discover(&self, business_ids: &[String]) -> Result<Vec<Account>> {
        let listings = business_ids.iter().flat_map(|business| {
            AccountEdge::ALL
                .into_iter()
                .map(move |edge| self.api.list_accounts(business, edge))
        });

        let found: Vec<Account> = try_join_all(listings).await?.into_iter().flatten().collect();
        let total = found.len();

        let accounts = if self.deduplicate {
            let mut seen = HashSet::new();
            found
                .into_iter()
                .filter(|a| seen.insert(a.account_id.clone()))
                .collect()
        } else {
            found
        };

        info!(
            businesses = business_ids.len(),
            listed = total,
            accounts = accounts.len(),
            "Discovered ad accounts"
        );
        Ok(accounts)
    }
}
