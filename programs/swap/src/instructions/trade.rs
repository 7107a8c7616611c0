// Swap token A for at least an expected amount of token B

use crate::{errors::SwapError, math, state::PoolInfo, VAULT_AUTH_PDA_SEED};
use tracing::info;
use valence_settlement::prelude::*;
use valence_settlement::token;

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct Trade {
    pub amount_a: u64,
    /// Smallest payout of token B the trader accepts
    pub expected_amount_b: u64,
    pub vault_auth_bump: u8,
}

impl ProgramInstruction for Trade {
    const NAME: &'static str = "trade";

    fn accounts() -> BindingDescriptor {
        BindingDescriptor::new(Self::NAME)
            .account("trader", Access::WRITABLE_SIGNER)
            .account("token_a", Access::WRITABLE)
            .account("token_b", Access::WRITABLE)
            .account("token_a_vault", Access::WRITABLE)
            .account("token_b_vault", Access::WRITABLE)
            .account("vault_authority", Access::READONLY)
            .data_account::<PoolInfo>("pool_info", Access::READONLY)
            .program("token_program")
    }

    fn process(self, ctx: &mut Context<'_>) -> Result<()> {
        require!(self.amount_a > 0, SwapError::ZeroAmount);
        let pool: PoolInfo = ctx.account("pool_info")?.data()?;
        pool.require_vaults(ctx)?;

        let reserve_a = token::unpack_account(ctx.account("token_a_vault")?)?.amount;
        let reserve_b = token::unpack_account(ctx.account("token_b_vault")?)?.amount;
        require!(reserve_a > 0 && reserve_b > 0, SwapError::ZeroLiquidity);
        let amount_b = math::swap_output(reserve_a, reserve_b, self.amount_a)?;
        require!(
            amount_b > 0 && amount_b >= self.expected_amount_b,
            SwapError::SlippageExceeded
        );

        let trader = ctx.index_of("trader")?;
        let token_a = ctx.index_of("token_a")?;
        let token_b = ctx.index_of("token_b")?;
        let vault_a = ctx.index_of("token_a_vault")?;
        let vault_b = ctx.index_of("token_b_vault")?;
        let vault_authority = ctx.index_of("vault_authority")?;
        let seeds = [SignerSeeds::new([VAULT_AUTH_PDA_SEED], self.vault_auth_bump)];

        token::transfer(ctx, token_a, vault_a, trader, self.amount_a, &[])?;
        token::transfer(ctx, vault_b, token_b, vault_authority, amount_b, &seeds)?;

        info!(
            trader = %ctx.key_of("trader")?,
            amount_a = self.amount_a,
            amount_b,
            "trade settled"
        );
        Ok(())
    }
}
