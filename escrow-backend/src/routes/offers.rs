//! Offer endpoints
//!
//! Nothing here signs or submits: wallets sign the returned instructions and
//! send them to the cluster themselves.

use std::str::FromStr;

use anchor_lang::prelude::Pubkey;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use escrow::pda::{find_offer_address, find_vault_address};
use tracing::info;

use crate::{
    error::{BackendError, Result},
    services::{
        offer_reader::OpenOffer, InstructionBuilder, MakeOfferParams, OfferReader,
    },
    types::{
        CancelOfferRequest, DeriveOfferRequest, DeriveOfferResponse, InstructionJson,
        InstructionsResponse, MakeOfferRequest, OfferResponse, TakeOfferRequest,
    },
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub offers: OfferReader,
}

/// Create offers router
pub fn offers_router(state: AppState) -> Router {
    Router::new()
        .route("/api/offers/derive", post(derive_offer))
        .route("/api/offers/make", post(make_offer))
        .route("/api/offers/take", post(take_offer))
        .route("/api/offers/cancel", post(cancel_offer))
        .route("/api/offers/{address}", get(get_offer))
        .with_state(state)
}

/// POST /api/offers/derive
async fn derive_offer(Json(req): Json<DeriveOfferRequest>) -> Result<Json<DeriveOfferResponse>> {
    let maker = parse_pubkey(&req.maker)?;
    let id = parse_u64("id", &req.id)?;

    let (offer, bump) = find_offer_address(&maker, id);

    let vault = match req.token_mint_a.as_deref() {
        Some(mint) => {
            let mint = parse_pubkey(mint)?;
            let token_program = match req.token_program.as_deref() {
                Some(program) => parse_token_program(program)?,
                None => anchor_spl::token::ID,
            };
            Some(find_vault_address(&offer, &mint, &token_program).to_string())
        }
        None => None,
    };

    Ok(Json(DeriveOfferResponse {
        offer: offer.to_string(),
        bump,
        vault,
    }))
}

/// GET /api/offers/{address}
async fn get_offer(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<OfferResponse>> {
    let address = parse_pubkey(&address)?;
    let open = state.offers.load_offer(&address).await?;

    Ok(Json(offer_response(&open)))
}

/// POST /api/offers/make
async fn make_offer(
    State(state): State<AppState>,
    Json(req): Json<MakeOfferRequest>,
) -> Result<Json<InstructionsResponse>> {
    let maker = parse_pubkey(&req.maker)?;
    let id = parse_u64("id", &req.id)?;
    let token_mint_a = parse_pubkey(&req.token_mint_a)?;
    let token_mint_b = parse_pubkey(&req.token_mint_b)?;
    let token_a_offered_amount = parse_amount("token_a_offered_amount", &req.token_a_offered_amount)?;
    let token_b_wanted_amount = parse_amount("token_b_wanted_amount", &req.token_b_wanted_amount)?;

    if token_mint_a == token_mint_b {
        return Err(BackendError::BadRequest(
            "Offered and wanted mints must differ".to_string(),
        ));
    }

    let (offer, _) = find_offer_address(&maker, id);
    if state.offers.is_occupied(&offer).await? {
        return Err(BackendError::OfferAlreadyExists(offer.to_string()));
    }

    let mint_a = state.offers.load_mint(&token_mint_a).await?;
    let mint_b = state.offers.load_mint(&token_mint_b).await?;
    if mint_a.token_program != mint_b.token_program {
        return Err(BackendError::BadRequest(
            "Both mints must belong to the same token program".to_string(),
        ));
    }

    let instructions = InstructionBuilder::make_offer(&MakeOfferParams {
        maker,
        id,
        offer,
        token_mint_a,
        token_mint_b,
        token_a_offered_amount,
        token_b_wanted_amount,
        token_program: mint_a.token_program,
        decimals_a: mint_a.decimals,
    })?;

    info!(
        %maker,
        id,
        %offer,
        token_a_offered_amount,
        token_b_wanted_amount,
        "Built make_offer instructions"
    );

    Ok(Json(InstructionsResponse {
        offer: offer.to_string(),
        instructions: instructions.iter().map(InstructionJson::from).collect(),
    }))
}

/// POST /api/offers/take
async fn take_offer(
    State(state): State<AppState>,
    Json(req): Json<TakeOfferRequest>,
) -> Result<Json<InstructionsResponse>> {
    let taker = parse_pubkey(&req.taker)?;
    let address = parse_pubkey(&req.offer)?;

    let open = state.offers.load_offer(&address).await?;
    let ix = InstructionBuilder::take_offer(&taker, &address, &open.record, &open.token_program);

    info!(%taker, offer = %address, "Built take_offer instruction");

    Ok(Json(InstructionsResponse {
        offer: address.to_string(),
        instructions: vec![InstructionJson::from(&ix)],
    }))
}

/// POST /api/offers/cancel
async fn cancel_offer(
    State(state): State<AppState>,
    Json(req): Json<CancelOfferRequest>,
) -> Result<Json<InstructionsResponse>> {
    let address = parse_pubkey(&req.offer)?;

    let open = state.offers.load_offer(&address).await?;
    let ix = InstructionBuilder::cancel_offer(&address, &open.record, &open.token_program);

    info!(maker = %open.record.maker, offer = %address, "Built cancel_offer instruction");

    Ok(Json(InstructionsResponse {
        offer: address.to_string(),
        instructions: vec![InstructionJson::from(&ix)],
    }))
}

fn offer_response(open: &OpenOffer) -> OfferResponse {
    OfferResponse {
        address: open.address.to_string(),
        id: open.record.id.to_string(),
        maker: open.record.maker.to_string(),
        token_mint_a: open.record.token_mint_a.to_string(),
        token_mint_b: open.record.token_mint_b.to_string(),
        token_a_offered_amount: open.record.token_a_offered_amount.to_string(),
        token_b_wanted_amount: open.record.token_b_wanted_amount.to_string(),
        vault: open.vault.to_string(),
        vault_balance: open.vault_balance.to_string(),
    }
}

fn parse_pubkey(s: &str) -> Result<Pubkey> {
    Pubkey::from_str(s).map_err(|e| BackendError::InvalidPubkey(format!("{s}: {e}")))
}

fn parse_token_program(s: &str) -> Result<Pubkey> {
    let program = parse_pubkey(s)?;
    if program != anchor_spl::token::ID && program != anchor_spl::token_2022::ID {
        return Err(BackendError::BadRequest(format!(
            "{program} is not a token program"
        )));
    }
    Ok(program)
}

fn parse_u64(field: &str, s: &str) -> Result<u64> {
    s.parse()
        .map_err(|e| BackendError::BadRequest(format!("Invalid {field}: {e}")))
}

/// Amounts must be positive.
fn parse_amount(field: &str, s: &str) -> Result<u64> {
    match parse_u64(field, s)? {
        0 => Err(BackendError::BadRequest(format!(
            "{field} must be greater than zero"
        ))),
        amount => Ok(amount),
    }
}
