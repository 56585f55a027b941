//! Verifies that the hub and child relayer accounts hold enough funds to relay.

use std::fmt::Write as _;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::{
    config::{ChainConfig, PricingConfig},
    error::RelayerError,
    identity::RelayerIdentity,
};

/// Key name of the hub relayer account.
pub const HUB_RELAYER_KEY: &str = "relayer-hub-key";
/// Key name of the child chain relayer account.
pub const CHILD_RELAYER_KEY: &str = "relayer-rollapp-key";

/// Resolves relayer account addresses from the local keyring.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Returns the address of the relayer key registered for `chain_id`.
    ///
    /// # Errors
    /// Returns [`RelayerError::LookupFailure`] if no key exists for the chain.
    async fn relayer_address(&self, chain_id: &str) -> Result<String, RelayerError>;
}

/// Queries account balances from a remote chain node.
#[async_trait]
pub trait BalanceQuerier: Send + Sync {
    /// Returns the balance of `address` in `chain.denom`.
    ///
    /// # Errors
    /// Returns [`RelayerError::QueryFailure`] if the node cannot be reached or
    /// answers with a malformed response.
    async fn query_balance(&self, chain: &ChainConfig, address: &str)
        -> Result<u128, RelayerError>;
}

/// The funding state of one relayer account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountBalanceCheck {
    /// The name of the key in the relayer keyring.
    pub key_name: String,
    /// The account address.
    pub address: String,
    /// The balance held by the account.
    pub current_balance: u128,
    /// The minimum balance the account must hold.
    pub required_balance: u128,
    /// The denomination of both balances.
    pub denom: String,
    /// The chain ID of the network the account lives on.
    pub network: String,
}

impl AccountBalanceCheck {
    /// Whether the account holds less than the required balance.
    #[must_use]
    pub const fn is_insufficient(&self) -> bool {
        self.current_balance < self.required_balance
    }
}

/// Checks the relayer accounts of both chains against their required balances.
pub struct BalanceVerifier<'a> {
    keys: &'a dyn KeyStore,
    querier: &'a dyn BalanceQuerier,
}

impl<'a> BalanceVerifier<'a> {
    /// Create a new `BalanceVerifier`.
    #[must_use]
    pub fn new(keys: &'a dyn KeyStore, querier: &'a dyn BalanceQuerier) -> Self {
        Self { keys, querier }
    }

    /// Returns the under-funded relayer accounts, hub first. An empty list
    /// means both accounts are funded.
    ///
    /// # Errors
    /// Returns the first lookup or query error; no retries are attempted.
    #[instrument(
        skip_all,
        fields(hub = %identity.hub_chain_id(), child = %identity.child_chain_id()),
        err(Display)
    )]
    pub async fn insufficient_balances(
        &self,
        identity: &RelayerIdentity,
        hub: &ChainConfig,
        child: &ChainConfig,
        pricing: &PricingConfig,
    ) -> Result<Vec<AccountBalanceCheck>, RelayerError> {
        let accounts = [
            (HUB_RELAYER_KEY, identity.hub_chain_id(), hub, pricing.hub_one_day_relay_price),
            (
                CHILD_RELAYER_KEY,
                identity.child_chain_id(),
                child,
                pricing.child_one_day_relay_price,
            ),
        ];

        let mut insufficient = Vec::new();
        for (key_name, chain_id, chain, required_balance) in accounts {
            let check = self
                .check_account(key_name, chain_id, chain, required_balance)
                .await?;
            debug!(
                key_name,
                address = %check.address,
                current = %check.current_balance,
                required = %check.required_balance,
                "Checked relayer balance"
            );
            if check.is_insufficient() {
                insufficient.push(check);
            }
        }

        Ok(insufficient)
    }

    async fn check_account(
        &self,
        key_name: &str,
        chain_id: &str,
        chain: &ChainConfig,
        required_balance: u128,
    ) -> Result<AccountBalanceCheck, RelayerError> {
        let address = self.keys.relayer_address(chain_id).await?;
        let current_balance = self.querier.query_balance(chain, &address).await?;

        Ok(AccountBalanceCheck {
            key_name: key_name.to_string(),
            address,
            current_balance,
            required_balance,
            denom: chain.denom.clone(),
            network: chain_id.to_string(),
        })
    }
}

/// Renders the operator-facing message listing every under-funded account.
#[must_use]
pub fn describe_insufficient_balances(checks: &[AccountBalanceCheck]) -> String {
    let mut message = String::from(
        "the following relayer accounts are under-funded, fund them and run the command again:",
    );
    for check in checks {
        let _ = write!(
            message,
            "\n  {} ({}) on {}: have {}{}, need {}{}",
            check.key_name,
            check.address,
            check.network,
            check.current_balance,
            check.denom,
            check.required_balance,
            check.denom,
        );
    }
    message
}
