use crate::errors::SwapError;
use valence_settlement::prelude::*;
use valence_settlement::schema::DISCRIMINATOR_LEN;

/// Accounts that make up one pool
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct PoolInfo {
    pub creator: Pubkey,
    pub mint_a: Pubkey,
    pub mint_b: Pubkey,
    pub token_a_vault: Pubkey,
    pub token_b_vault: Pubkey,
    pub mint_liquidity: Pubkey,
}

impl AccountSchema for PoolInfo {
    const NAME: &'static str = "PoolInfo";
    const SPACE: usize = DISCRIMINATOR_LEN + 32 * 6;
}

impl PoolInfo {
    /// Reject vaults that belong to another pool
    pub fn require_vaults(&self, ctx: &Context<'_>) -> Result<()> {
        require_keys_eq!(ctx.key_of("token_a_vault")?, self.token_a_vault, SwapError::PoolMismatch);
        require_keys_eq!(ctx.key_of("token_b_vault")?, self.token_b_vault, SwapError::PoolMismatch);
        Ok(())
    }

    pub fn require_liquidity_mint(&self, ctx: &Context<'_>) -> Result<()> {
        require_keys_eq!(
            ctx.key_of("mint_liquidity")?,
            self.mint_liquidity,
            SwapError::PoolMismatch
        );
        Ok(())
    }
}
