// Add both tokens to a pool and receive liquidity tokens

use crate::{errors::SwapError, math, state::PoolInfo, LP_MINT_AUTH_PDA_SEED};
use tracing::{debug, info};
use valence_settlement::prelude::*;
use valence_settlement::token;

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct Deposit {
    pub amount_a: u64,
    pub amount_b: u64,
    /// Bump of the liquidity mint authority under LP_MINT_AUTH_PDA_SEED
    pub mint_auth_bump: u8,
}

impl ProgramInstruction for Deposit {
    const NAME: &'static str = "deposit";

    fn accounts() -> BindingDescriptor {
        BindingDescriptor::new(Self::NAME)
            .account("depositor", Access::WRITABLE_SIGNER)
            .account("mint_liquidity", Access::WRITABLE)
            .account("mint_lp_auth", Access::READONLY)
            .account("token_a", Access::WRITABLE)
            .account("token_b", Access::WRITABLE)
            .account("token_liquidity", Access::WRITABLE)
            .account("token_a_vault", Access::WRITABLE)
            .account("token_b_vault", Access::WRITABLE)
            .data_account::<PoolInfo>("pool_info", Access::READONLY)
            .program("system_program")
            .program("token_program")
            .program("associated_token_program")
    }

    fn process(self, ctx: &mut Context<'_>) -> Result<()> {
        require!(self.amount_a > 0 && self.amount_b > 0, SwapError::ZeroAmount);
        let pool: PoolInfo = ctx.account("pool_info")?.data()?;
        pool.require_vaults(ctx)?;
        pool.require_liquidity_mint(ctx)?;

        let supply = token::unpack_mint(ctx.account("mint_liquidity")?)?.supply;
        let liquidity = if supply == 0 {
            math::geometry_mean(self.amount_a, self.amount_b)
        } else {
            let reserve_a = token::unpack_account(ctx.account("token_a_vault")?)?.amount;
            let reserve_b = token::unpack_account(ctx.account("token_b_vault")?)?.amount;
            math::mul_div(self.amount_a, supply, reserve_a)?
                .min(math::mul_div(self.amount_b, supply, reserve_b)?)
        };
        require!(liquidity > 0, SwapError::ZeroLiquidity);
        debug!(supply, liquidity, "liquidity priced");

        let depositor = ctx.index_of("depositor")?;
        let mint_liquidity = ctx.index_of("mint_liquidity")?;
        let token_liquidity = ctx.index_of("token_liquidity")?;
        token::create_associated_account(
            ctx,
            depositor,
            token_liquidity,
            depositor,
            mint_liquidity,
            true,
            &[],
        )?;

        for (from, to, amount) in [
            ("token_a", "token_a_vault", self.amount_a),
            ("token_b", "token_b_vault", self.amount_b),
        ] {
            let from = ctx.index_of(from)?;
            let to = ctx.index_of(to)?;
            token::transfer(ctx, from, to, depositor, amount, &[])?;
        }

        let mint_lp_auth = ctx.index_of("mint_lp_auth")?;
        let seeds = [SignerSeeds::new([LP_MINT_AUTH_PDA_SEED], self.mint_auth_bump)];
        token::mint_to(
            ctx,
            mint_liquidity,
            token_liquidity,
            mint_lp_auth,
            liquidity,
            &seeds,
        )?;

        info!(
            depositor = %ctx.key_of("depositor")?,
            amount_a = self.amount_a,
            amount_b = self.amount_b,
            liquidity,
            "liquidity added"
        );
        Ok(())
    }
}
