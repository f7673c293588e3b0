//! Offer lookups over Solana JSON-RPC.
//!
//! `AccountReader` is the only seam that touches the network; everything above
//! it decodes and validates accounts the same way the program does.

use std::{str::FromStr, sync::Arc, time::Duration};

use anchor_lang::{prelude::Pubkey, AccountDeserialize};
use anchor_spl::token_interface::{Mint, TokenAccount};
use base64::{engine::general_purpose::STANDARD, Engine};
use escrow::{
    pda::{find_offer_address, find_vault_address},
    state::Offer,
};
use futures::future::BoxFuture;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{BackendError, Result};

/// An account as returned by the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAccount {
    pub owner: Pubkey,
    pub lamports: u64,
    pub data: Vec<u8>,
}

pub trait AccountReader: Send + Sync {
    /// `Ok(None)` when no account lives at `address`.
    fn get_account<'a>(&'a self, address: &'a Pubkey) -> BoxFuture<'a, Result<Option<RawAccount>>>;

    /// Whether the cluster answers and considers itself healthy.
    fn ping(&self) -> BoxFuture<'_, Result<()>>;
}

/// `getAccountInfo` over HTTP JSON-RPC
pub struct RpcAccountReader {
    client: reqwest::Client,
    rpc_url: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

impl<T> RpcResponse<T> {
    fn into_result(self) -> Result<T> {
        if let Some(err) = self.error {
            return Err(BackendError::Rpc(format!("{} ({})", err.message, err.code)));
        }
        self.result
            .ok_or_else(|| BackendError::Rpc("Response carried no result".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct RpcResult {
    value: Option<UiAccount>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct UiAccount {
    lamports: u64,
    owner: String,
    /// `[payload, encoding]`
    data: (String, String),
}

impl TryFrom<UiAccount> for RawAccount {
    type Error = BackendError;

    fn try_from(account: UiAccount) -> Result<Self> {
        let (payload, encoding) = account.data;
        if encoding != "base64" {
            return Err(BackendError::Rpc(format!(
                "Unexpected account encoding: {encoding}"
            )));
        }

        Ok(Self {
            owner: Pubkey::from_str(&account.owner)
                .map_err(|e| BackendError::Rpc(format!("Invalid account owner: {e}")))?,
            lamports: account.lamports,
            data: STANDARD
                .decode(payload)
                .map_err(|e| BackendError::Rpc(format!("Invalid account data: {e}")))?,
        })
    }
}

impl RpcAccountReader {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response: RpcResponse<T> = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response.into_result()
    }

    async fn fetch(&self, address: &Pubkey) -> Result<Option<RawAccount>> {
        let result: RpcResult = self
            .call(
                "getAccountInfo",
                json!([
                    address.to_string(),
                    { "encoding": "base64", "commitment": "confirmed" }
                ]),
            )
            .await?;

        debug!(%address, found = result.value.is_some(), "Fetched account");

        result.value.map(RawAccount::try_from).transpose()
    }

    /// `getHealth` answers `"ok"`, or an error while the node lags behind.
    async fn health(&self) -> Result<()> {
        let status: String = self.call("getHealth", json!([])).await?;
        check_health(&status)
    }
}

fn check_health(status: &str) -> Result<()> {
    if status == "ok" {
        Ok(())
    } else {
        Err(BackendError::Rpc(format!("Node reports {status}")))
    }
}

impl AccountReader for RpcAccountReader {
    fn get_account<'a>(&'a self, address: &'a Pubkey) -> BoxFuture<'a, Result<Option<RawAccount>>> {
        Box::pin(self.fetch(address))
    }

    fn ping(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.health())
    }
}

/// A live offer with everything needed to act on it
#[derive(Debug)]
pub struct OpenOffer {
    pub address: Pubkey,
    pub record: Offer,
    pub token_program: Pubkey,
    pub vault: Pubkey,
    pub vault_balance: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintInfo {
    pub token_program: Pubkey,
    pub decimals: u8,
}

#[derive(Clone)]
pub struct OfferReader {
    accounts: Arc<dyn AccountReader>,
}

impl OfferReader {
    pub fn new(accounts: Arc<dyn AccountReader>) -> Self {
        Self { accounts }
    }

    pub async fn ping(&self) -> Result<()> {
        self.accounts.ping().await
    }

    /// Whether the offer address is already taken by an account.
    pub async fn is_occupied(&self, address: &Pubkey) -> Result<bool> {
        Ok(self
            .accounts
            .get_account(address)
            .await?
            .is_some_and(|account| {
                account.lamports > 0 && (account.owner == escrow::ID || !account.data.is_empty())
            }))
    }

    /// Read an open offer and its vault balance.
    ///
    /// Anything but an escrow-owned record at its own derived address is
    /// reported as `OfferNotFound`.
    pub async fn load_offer(&self, address: &Pubkey) -> Result<OpenOffer> {
        let not_found = || BackendError::OfferNotFound(address.to_string());

        let account = self
            .accounts
            .get_account(address)
            .await?
            .filter(|account| account.owner == escrow::ID && !account.data.is_empty())
            .ok_or_else(not_found)?;

        let record = Offer::try_deserialize(&mut account.data.as_slice()).map_err(|_| not_found())?;

        let (expected, _) = find_offer_address(&record.maker, record.id);
        if expected != *address {
            return Err(not_found());
        }

        let mint = self.load_mint(&record.token_mint_a).await?;
        let vault = find_vault_address(address, &record.token_mint_a, &mint.token_program);

        let vault_account = self.accounts.get_account(&vault).await?.ok_or_else(|| {
            BackendError::Internal(format!("Offer {address} has no vault at {vault}"))
        })?;
        let vault_balance = TokenAccount::try_deserialize(&mut vault_account.data.as_slice())
            .map_err(|e| BackendError::Internal(format!("Unreadable vault {vault}: {e}")))?
            .amount;

        Ok(OpenOffer {
            address: *address,
            record,
            token_program: mint.token_program,
            vault,
            vault_balance,
        })
    }

    /// Owning token program and decimals of a mint.
    pub async fn load_mint(&self, address: &Pubkey) -> Result<MintInfo> {
        let account = self
            .accounts
            .get_account(address)
            .await?
            .ok_or_else(|| BackendError::BadRequest(format!("Mint {address} does not exist")))?;

        if account.owner != anchor_spl::token::ID && account.owner != anchor_spl::token_2022::ID {
            return Err(BackendError::BadRequest(format!(
                "{address} is not owned by a token program"
            )));
        }

        let mint = Mint::try_deserialize(&mut account.data.as_slice())
            .map_err(|e| BackendError::BadRequest(format!("{address} is not a mint: {e}")))?;

        Ok(MintInfo {
            token_program: account.owner,
            decimals: mint.decimals,
        })
    }
}
