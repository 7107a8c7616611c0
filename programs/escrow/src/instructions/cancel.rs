// Cancel an escrow: refund the deposit and close the vault

use crate::{errors::EscrowError, state::EscrowAccount, ESCROW_PDA_SEED, VAULT_PDA_SEED};
use tracing::info;
use valence_settlement::prelude::*;
use valence_settlement::token;

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct Cancel {
    /// Bump of the vault authority under ESCROW_PDA_SEED
    pub authority_bump: u8,
}

impl ProgramInstruction for Cancel {
    const NAME: &'static str = "cancel";

    fn accounts() -> BindingDescriptor {
        BindingDescriptor::new(Self::NAME)
            .account("initializer", Access::WRITABLE_SIGNER)
            .account("initializer_deposit", Access::WRITABLE)
            .account("vault", Access::WRITABLE)
            .account("vault_authority", Access::READONLY)
            .data_account::<EscrowAccount>("escrow", Access::WRITABLE)
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
        let (expected_vault, _) = ctx.find_program_address(&[VAULT_PDA_SEED])?;
        require_keys_eq!(
            ctx.key_of("vault")?,
            expected_vault,
            EscrowError::EscrowMismatch
        );

        let initializer = ctx.index_of("initializer")?;
        let deposit = ctx.index_of("initializer_deposit")?;
        let vault = ctx.index_of("vault")?;
        let vault_authority = ctx.index_of("vault_authority")?;
        let seeds = [SignerSeeds::new([ESCROW_PDA_SEED], self.authority_bump)];

        token::transfer(
            ctx,
            vault,
            deposit,
            vault_authority,
            terms.initializer_amount,
            &seeds,
        )?;
        token::close_account(ctx, vault, initializer, vault_authority, &seeds)?;

        info!(escrow = %ctx.key_of("escrow")?, "escrow cancelled");
        Ok(())
    }
}
