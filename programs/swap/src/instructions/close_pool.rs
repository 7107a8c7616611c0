// Close both emptied vaults, returning their rent to the creator

use crate::{errors::SwapError, state::PoolInfo, VAULT_AUTH_PDA_SEED};
use tracing::info;
use valence_settlement::prelude::*;
use valence_settlement::token;

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct ClosePool {
    pub vault_auth_bump: u8,
}

impl ProgramInstruction for ClosePool {
    const NAME: &'static str = "close_pool";

    fn accounts() -> BindingDescriptor {
        BindingDescriptor::new(Self::NAME)
            .account("creator", Access::WRITABLE_SIGNER)
            .account("token_a_vault", Access::WRITABLE)
            .account("token_b_vault", Access::WRITABLE)
            .account("vault_authority", Access::READONLY)
            .data_account::<PoolInfo>("pool_info", Access::READONLY)
            .program("token_program")
    }

    fn process(self, ctx: &mut Context<'_>) -> Result<()> {
        let pool: PoolInfo = ctx.account("pool_info")?.data()?;
        require_keys_eq!(ctx.key_of("creator")?, pool.creator, SwapError::PoolMismatch);
        pool.require_vaults(ctx)?;
        for vault in ["token_a_vault", "token_b_vault"] {
            let held = token::unpack_account(ctx.account(vault)?)?;
            require!(held.amount == 0, SwapError::PoolNotEmpty);
        }

        let creator = ctx.index_of("creator")?;
        let vault_authority = ctx.index_of("vault_authority")?;
        let seeds = [SignerSeeds::new([VAULT_AUTH_PDA_SEED], self.vault_auth_bump)];
        for vault in ["token_a_vault", "token_b_vault"] {
            let vault = ctx.index_of(vault)?;
            token::close_account(ctx, vault, creator, vault_authority, &seeds)?;
        }

        info!(pool = %ctx.key_of("pool_info")?, "pool closed");
        Ok(())
    }
}
