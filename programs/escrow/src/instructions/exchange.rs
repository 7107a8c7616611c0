// Complete an escrow: the taker pays the initializer and receives the vault

use crate::{errors::EscrowError, state::EscrowAccount, ESCROW_PDA_SEED, VAULT_PDA_SEED};
use tracing::info;
use valence_settlement::prelude::*;
use valence_settlement::token;

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct Exchange {
    /// Bump of the vault authority under ESCROW_PDA_SEED
    pub authority_bump: u8,
}

impl ProgramInstruction for Exchange {
    const NAME: &'static str = "exchange";

    fn accounts() -> BindingDescriptor {
        BindingDescriptor::new(Self::NAME)
            .account("taker", Access::SIGNER)
            .account("taker_deposit", Access::WRITABLE)
            .account("taker_receive", Access::WRITABLE)
            .account("initializer", Access::WRITABLE)
            .account("initializer_deposit", Access::WRITABLE)
            .account("initializer_receive", Access::WRITABLE)
            .data_account::<EscrowAccount>("escrow", Access::WRITABLE)
            .account("vault", Access::WRITABLE)
            .account("vault_authority", Access::READONLY)
            .program("token_program")
    }

    fn process(self, ctx: &mut Context<'_>) -> Result<()> {
        let terms: EscrowAccount = ctx.account("escrow")?.data()?;
        require_keys_eq!(
            ctx.key_of("initializer")?,
            terms.initializer_key,
            EscrowError::EscrowMismatch
        );
        require_keys_eq!(
            ctx.key_of("initializer_deposit")?,
            terms.initializer_deposit_token_account,
            EscrowError::EscrowMismatch
        );
        require_keys_eq!(
            ctx.key_of("initializer_receive")?,
            terms.initializer_receive_token_account,
            EscrowError::EscrowMismatch
        );
        let (expected_vault, _) = ctx.find_program_address(&[VAULT_PDA_SEED])?;
        require_keys_eq!(
            ctx.key_of("vault")?,
            expected_vault,
            EscrowError::EscrowMismatch
        );

        let taker = ctx.index_of("taker")?;
        let taker_deposit = ctx.index_of("taker_deposit")?;
        let taker_receive = ctx.index_of("taker_receive")?;
        let initializer = ctx.index_of("initializer")?;
        let initializer_receive = ctx.index_of("initializer_receive")?;
        let vault = ctx.index_of("vault")?;
        let vault_authority = ctx.index_of("vault_authority")?;
        let seeds = [SignerSeeds::new([ESCROW_PDA_SEED], self.authority_bump)];

        token::transfer(
            ctx,
            taker_deposit,
            initializer_receive,
            taker,
            terms.taker_amount,
            &[],
        )?;
        token::transfer(
            ctx,
            vault,
            taker_receive,
            vault_authority,
            terms.initializer_amount,
            &seeds,
        )?;
        token::close_account(ctx, vault, initializer, vault_authority, &seeds)?;

        info!(
            escrow = %ctx.key_of("escrow")?,
            taker = %ctx.key_of("taker")?,
            "escrow exchanged"
        );
        Ok(())
    }
}
