// Open a pool: record its accounts, create both vaults and take over the
// liquidity mint

use crate::{errors::SwapError, state::PoolInfo, LP_MINT_AUTH_PDA_SEED, VAULT_AUTH_PDA_SEED};
use solana_program::program_option::COption;
use spl_token::instruction::AuthorityType;
use tracing::info;
use valence_settlement::prelude::*;
use valence_settlement::token;

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct CreatePool {}

impl ProgramInstruction for CreatePool {
    const NAME: &'static str = "create_pool";

    fn accounts() -> BindingDescriptor {
        BindingDescriptor::new(Self::NAME)
            .account("creator", Access::WRITABLE_SIGNER)
            .account("mint_a", Access::READONLY)
            .account("mint_b", Access::READONLY)
            .account("mint_liquidity", Access::WRITABLE)
            .account("token_a_vault", Access::WRITABLE_SIGNER)
            .account("token_b_vault", Access::WRITABLE_SIGNER)
            .init_account::<PoolInfo>("pool_info", Access::WRITABLE_SIGNER)
            .program("system_program")
            .program("token_program")
    }

    fn process(self, ctx: &mut Context<'_>) -> Result<()> {
        let creator = ctx.key_of("creator")?;
        let mint_a = ctx.key_of("mint_a")?;
        let mint_b = ctx.key_of("mint_b")?;
        require!(mint_a != mint_b, SwapError::SameMint);
        token::unpack_mint(ctx.account("mint_a")?)?;
        token::unpack_mint(ctx.account("mint_b")?)?;
        let liquidity = token::unpack_mint(ctx.account("mint_liquidity")?)?;
        require!(
            liquidity.supply == 0 && liquidity.mint_authority == COption::Some(creator),
            SwapError::MintNotFresh
        );

        ctx.create_account("creator", "pool_info", PoolInfo::SPACE, &crate::ID, None)?;
        let pool = PoolInfo {
            creator,
            mint_a,
            mint_b,
            token_a_vault: ctx.key_of("token_a_vault")?,
            token_b_vault: ctx.key_of("token_b_vault")?,
            mint_liquidity: ctx.key_of("mint_liquidity")?,
        };
        ctx.account_mut("pool_info")?.save_data(&pool)?;

        let (vault_authority, _) = ctx.find_program_address(&[VAULT_AUTH_PDA_SEED])?;
        let (mint_authority, _) = ctx.find_program_address(&[LP_MINT_AUTH_PDA_SEED])?;
        let payer = ctx.index_of("creator")?;
        for (vault, mint) in [("token_a_vault", "mint_a"), ("token_b_vault", "mint_b")] {
            let vault = ctx.index_of(vault)?;
            let mint = ctx.index_of(mint)?;
            token::create_and_init_account(ctx, payer, vault, mint, &vault_authority, &[])?;
        }

        let mint_liquidity = ctx.index_of("mint_liquidity")?;
        token::set_authority(
            ctx,
            mint_liquidity,
            payer,
            Some(&mint_authority),
            AuthorityType::MintTokens,
            &[],
        )?;

        info!(
            pool = %ctx.key_of("pool_info")?,
            mint_a = %mint_a,
            mint_b = %mint_b,
            "pool created"
        );
        Ok(())
    }
}
