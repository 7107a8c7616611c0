// Burn liquidity tokens for a proportional share of both vaults

use crate::{errors::SwapError, math, state::PoolInfo, VAULT_AUTH_PDA_SEED};
use tracing::info;
use valence_settlement::prelude::*;
use valence_settlement::token;

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct Withdraw {
    /// Liquidity tokens to burn
    pub amount: u64,
    pub vault_auth_bump: u8,
}

impl ProgramInstruction for Withdraw {
    const NAME: &'static str = "withdraw";

    fn accounts() -> BindingDescriptor {
        BindingDescriptor::new(Self::NAME)
            .account("depositor", Access::WRITABLE_SIGNER)
            .account("mint_liquidity", Access::WRITABLE)
            .account("token_a", Access::WRITABLE)
            .account("token_b", Access::WRITABLE)
            .account("token_liquidity", Access::WRITABLE)
            .account("token_a_vault", Access::WRITABLE)
            .account("token_b_vault", Access::WRITABLE)
            .account("vault_authority", Access::READONLY)
            .data_account::<PoolInfo>("pool_info", Access::READONLY)
            .program("token_program")
    }

    fn process(self, ctx: &mut Context<'_>) -> Result<()> {
        require!(self.amount > 0, SwapError::ZeroAmount);
        let pool: PoolInfo = ctx.account("pool_info")?.data()?;
        pool.require_vaults(ctx)?;
        pool.require_liquidity_mint(ctx)?;

        let held = token::unpack_account(ctx.account("token_liquidity")?)?;
        require_keys_eq!(held.mint, pool.mint_liquidity, SwapError::PoolMismatch);
        require!(held.amount >= self.amount, SwapError::InsufficientLiquidity);

        let supply = token::unpack_mint(ctx.account("mint_liquidity")?)?.supply;
        let reserve_a = token::unpack_account(ctx.account("token_a_vault")?)?.amount;
        let reserve_b = token::unpack_account(ctx.account("token_b_vault")?)?.amount;
        let amount_a = math::mul_div(reserve_a, self.amount, supply)?;
        let amount_b = math::mul_div(reserve_b, self.amount, supply)?;

        let depositor = ctx.index_of("depositor")?;
        let vault_authority = ctx.index_of("vault_authority")?;
        let seeds = [SignerSeeds::new([VAULT_AUTH_PDA_SEED], self.vault_auth_bump)];
        for (from, to, amount) in [
            ("token_a_vault", "token_a", amount_a),
            ("token_b_vault", "token_b", amount_b),
        ] {
            let from = ctx.index_of(from)?;
            let to = ctx.index_of(to)?;
            token::transfer(ctx, from, to, vault_authority, amount, &seeds)?;
        }

        let mint_liquidity = ctx.index_of("mint_liquidity")?;
        let token_liquidity = ctx.index_of("token_liquidity")?;
        token::burn(ctx, token_liquidity, mint_liquidity, depositor, self.amount, &[])?;

        info!(
            depositor = %ctx.key_of("depositor")?,
            burned = self.amount,
            amount_a,
            amount_b,
            "liquidity removed"
        );
        Ok(())
    }
}
