//! Unsigned escrow instructions for wallets to sign and submit.

use anchor_lang::{
    prelude::Pubkey, solana_program::instruction::Instruction, system_program, InstructionData,
    ToAccountMetas,
};
use anchor_spl::{
    associated_token::{self, get_associated_token_address_with_program_id},
    token_2022::spl_token_2022,
};
use escrow::{pda::find_vault_address, state::Offer};

use crate::error::{BackendError, Result};

/// Terms of a new offer
#[derive(Debug, Clone)]
pub struct MakeOfferParams {
    pub maker: Pubkey,
    pub id: u64,
    pub offer: Pubkey,
    pub token_mint_a: Pubkey,
    pub token_mint_b: Pubkey,
    pub token_a_offered_amount: u64,
    pub token_b_wanted_amount: u64,
    pub token_program: Pubkey,
    pub decimals_a: u8,
}

pub struct InstructionBuilder;

impl InstructionBuilder {
    /// `approve_checked` delegating the offered amount to the offer address,
    /// followed by `make_offer`. Both must land in the same transaction.
    pub fn make_offer(params: &MakeOfferParams) -> Result<Vec<Instruction>> {
        let maker_token_account_a = get_associated_token_address_with_program_id(
            &params.maker,
            &params.token_mint_a,
            &params.token_program,
        );

        let approve = spl_token_2022::instruction::approve_checked(
            &params.token_program,
            &maker_token_account_a,
            &params.token_mint_a,
            &params.offer,
            &params.maker,
            &[],
            params.token_a_offered_amount,
            params.decimals_a,
        )
        .map_err(|e| BackendError::Internal(format!("approve_checked: {e}")))?;

        let make = Instruction {
            program_id: escrow::ID,
            accounts: escrow::accounts::MakeOffer {
                maker: params.maker,
                token_mint_a: params.token_mint_a,
                token_mint_b: params.token_mint_b,
                maker_token_account_a,
                offer: params.offer,
                vault: find_vault_address(&params.offer, &params.token_mint_a, &params.token_program),
                token_program: params.token_program,
                associated_token_program: associated_token::ID,
                system_program: system_program::ID,
            }
            .to_account_metas(None),
            data: escrow::instruction::MakeOffer {
                id: params.id,
                token_a_offered_amount: params.token_a_offered_amount,
                token_b_wanted_amount: params.token_b_wanted_amount,
            }
            .data(),
        };

        Ok(vec![approve, make])
    }

    pub fn take_offer(
        taker: &Pubkey,
        offer: &Pubkey,
        record: &Offer,
        token_program: &Pubkey,
    ) -> Instruction {
        let ata = |owner: &Pubkey, mint: &Pubkey| {
            get_associated_token_address_with_program_id(owner, mint, token_program)
        };

        Instruction {
            program_id: escrow::ID,
            accounts: escrow::accounts::TakeOffer {
                taker: *taker,
                maker: record.maker,
                token_mint_a: record.token_mint_a,
                token_mint_b: record.token_mint_b,
                taker_token_account_a: ata(taker, &record.token_mint_a),
                taker_token_account_b: ata(taker, &record.token_mint_b),
                maker_token_account_b: ata(&record.maker, &record.token_mint_b),
                offer: *offer,
                vault: find_vault_address(offer, &record.token_mint_a, token_program),
                token_program: *token_program,
                associated_token_program: associated_token::ID,
                system_program: system_program::ID,
            }
            .to_account_metas(None),
            data: escrow::instruction::TakeOffer {}.data(),
        }
    }

    /// Signed by the maker recorded in the offer.
    pub fn cancel_offer(offer: &Pubkey, record: &Offer, token_program: &Pubkey) -> Instruction {
        Instruction {
            program_id: escrow::ID,
            accounts: escrow::accounts::CancelOffer {
                maker: record.maker,
                token_mint_a: record.token_mint_a,
                maker_token_account_a: get_associated_token_address_with_program_id(
                    &record.maker,
                    &record.token_mint_a,
                    token_program,
                ),
                offer: *offer,
                vault: find_vault_address(offer, &record.token_mint_a, token_program),
                token_program: *token_program,
                associated_token_program: associated_token::ID,
                system_program: system_program::ID,
            }
            .to_account_metas(None),
            data: escrow::instruction::CancelOffer {}.data(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_lang::Discriminator;
    use escrow::pda::find_offer_address;

    fn params(token_program: Pubkey) -> MakeOfferParams {
        let maker = Pubkey::new_unique();
        MakeOfferParams {
            maker,
            id: 42,
            offer: find_offer_address(&maker, 42).0,
            token_mint_a: Pubkey::new_unique(),
            token_mint_b: Pubkey::new_unique(),
            token_a_offered_amount: 10_000_000,
            token_b_wanted_amount: 100_000_000,
            token_program,
            decimals_a: 6,
        }
    }

    fn record(params: &MakeOfferParams) -> Offer {
        Offer {
            id: params.id,
            maker: params.maker,
            token_mint_a: params.token_mint_a,
            token_mint_b: params.token_mint_b,
            token_a_offered_amount: params.token_a_offered_amount,
            token_b_wanted_amount: params.token_b_wanted_amount,
            bump: find_offer_address(&params.maker, params.id).1,
        }
    }

    #[test]
    fn test_make_offer_approves_offer_address_first() {
        let params = params(anchor_spl::token::ID);

        let ixs = InstructionBuilder::make_offer(&params).unwrap();

        assert_eq!(ixs.len(), 2);
        let approve = &ixs[0];
        assert_eq!(approve.program_id, anchor_spl::token::ID);
        // source, mint, delegate, owner
        assert_eq!(approve.accounts[1].pubkey, params.token_mint_a);
        assert_eq!(approve.accounts[2].pubkey, params.offer);
        assert_eq!(approve.accounts[3].pubkey, params.maker);
        assert!(approve.accounts[3].is_signer);

        let make = &ixs[1];
        assert_eq!(make.program_id, escrow::ID);
        assert!(make.data.starts_with(escrow::instruction::MakeOffer::DISCRIMINATOR));
        assert_eq!(&make.data[make.data.len() - 24..make.data.len() - 16], &42u64.to_le_bytes());
    }

    #[test]
    fn test_make_offer_vault_follows_token_program() {
        let params = params(anchor_spl::token_2022::ID);

        let ixs = InstructionBuilder::make_offer(&params).unwrap();

        let vault = find_vault_address(&params.offer, &params.token_mint_a, &anchor_spl::token_2022::ID);
        assert_eq!(ixs[0].program_id, anchor_spl::token_2022::ID);
        assert!(ixs[1].accounts.iter().any(|meta| meta.pubkey == vault && meta.is_writable));
    }

    #[test]
    fn test_take_offer_pays_recorded_maker() {
        let params = params(anchor_spl::token::ID);
        let record = record(&params);
        let taker = Pubkey::new_unique();

        let ix = InstructionBuilder::take_offer(&taker, &params.offer, &record, &anchor_spl::token::ID);

        assert_eq!(ix.accounts[0].pubkey, taker);
        assert!(ix.accounts[0].is_signer);
        assert_eq!(ix.accounts[1].pubkey, params.maker);
        assert!(!ix.accounts[1].is_signer);
        assert!(ix.data.starts_with(escrow::instruction::TakeOffer::DISCRIMINATOR));
    }

    #[test]
    fn test_cancel_offer_signed_by_maker() {
        let params = params(anchor_spl::token::ID);
        let record = record(&params);

        let ix = InstructionBuilder::cancel_offer(&params.offer, &record, &anchor_spl::token::ID);

        let signers: Vec<_> = ix.accounts.iter().filter(|meta| meta.is_signer).collect();
        assert_eq!(signers.len(), 1);
        assert_eq!(signers[0].pubkey, params.maker);
    }
}
