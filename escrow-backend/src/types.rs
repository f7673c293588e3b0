//! Request and response types for the escrow backend

use anchor_lang::solana_program::instruction::Instruction;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// Request to derive an offer address
#[derive(Debug, Deserialize)]
pub struct DeriveOfferRequest {
    /// Maker wallet (base58)
    pub maker: String,

    /// Offer id (as string to handle u64)
    pub id: String,

    /// Offered mint (base58). When present the vault address is derived too
    pub token_mint_a: Option<String>,

    /// Token program owning the offered mint, SPL Token when omitted
    pub token_program: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeriveOfferResponse {
    pub offer: String,
    pub bump: u8,
    pub vault: Option<String>,
}

/// Request for the unsigned `[approve_checked, make_offer]` pair
#[derive(Debug, Deserialize)]
pub struct MakeOfferRequest {
    pub maker: String,
    pub id: String,
    pub token_mint_a: String,
    pub token_mint_b: String,
    pub token_a_offered_amount: String,
    pub token_b_wanted_amount: String,
}

#[derive(Debug, Deserialize)]
pub struct TakeOfferRequest {
    /// Taker wallet (base58), signer and fee payer of the take
    pub taker: String,

    /// Offer address (base58)
    pub offer: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelOfferRequest {
    pub offer: String,
}

/// An open offer with its vault balance
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OfferResponse {
    pub address: String,
    pub id: String,
    pub maker: String,
    pub token_mint_a: String,
    pub token_mint_b: String,
    pub token_a_offered_amount: String,
    pub token_b_wanted_amount: String,
    pub vault: String,
    pub vault_balance: String,
}

/// Unsigned instructions, in submission order
#[derive(Debug, Serialize, Deserialize)]
pub struct InstructionsResponse {
    pub offer: String,
    pub instructions: Vec<InstructionJson>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstructionJson {
    pub program_id: String,
    pub accounts: Vec<AccountMetaJson>,

    /// Instruction data (base64 encoded)
    pub data: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountMetaJson {
    pub pubkey: String,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl From<&Instruction> for InstructionJson {
    fn from(ix: &Instruction) -> Self {
        Self {
            program_id: ix.program_id.to_string(),
            accounts: ix
                .accounts
                .iter()
                .map(|meta| AccountMetaJson {
                    pubkey: meta.pubkey.to_string(),
                    is_signer: meta.is_signer,
                    is_writable: meta.is_writable,
                })
                .collect(),
            data: STANDARD.encode(&ix.data),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Escrow program the backend builds instructions for
    pub program_id: String,
    /// `reachable` or `unreachable`, from a `getHealth` call to the cluster
    pub rpc: String,
    pub timestamp: i64,
}

/// Configuration for the backend server
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// CORS allowed origins
    pub cors_origins: Vec<String>,

    /// API keys for authentication
    pub api_keys: Vec<String>,

    /// Solana JSON-RPC endpoint
    pub rpc_url: String,

    /// Timeout for a single RPC request
    pub rpc_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3001,
            cors_origins: vec!["http://localhost:3000".to_string()],
            api_keys: vec![],
            rpc_url: "http://127.0.0.1:8899".to_string(),
            rpc_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        let cors_origins = std::env::var("CORS_ORIGINS")
            .ok()
            .map(|s| split_list(&s))
            .unwrap_or(defaults.cors_origins);

        let api_keys = std::env::var("API_KEYS")
            .ok()
            .map(|s| split_list(&s))
            .unwrap_or_default();

        let rpc_url = std::env::var("RPC_URL").unwrap_or(defaults.rpc_url);

        let rpc_timeout_secs = std::env::var("RPC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.rpc_timeout_secs);

        Self {
            port,
            cors_origins,
            api_keys,
            rpc_url,
            rpc_timeout_secs,
        }
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_lang::{prelude::Pubkey, solana_program::instruction::AccountMeta};

    #[test]
    fn test_split_list_trims_and_drops_empty() {
        assert_eq!(split_list(" a, b ,,c "), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_instruction_json_encoding() {
        let program_id = Pubkey::new_unique();
        let signer = Pubkey::new_unique();
        let ix = Instruction {
            program_id,
            accounts: vec![AccountMeta::new(signer, true)],
            data: vec![1, 2, 3],
        };

        let json = InstructionJson::from(&ix);

        assert_eq!(json.program_id, program_id.to_string());
        assert_eq!(
            json.accounts,
            vec![AccountMetaJson {
                pubkey: signer.to_string(),
                is_signer: true,
                is_writable: true,
            }]
        );
        assert_eq!(json.data, "AQID");
    }
}
