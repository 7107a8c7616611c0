// Constant-product token pool on the settlement core
//
// A creator opens a pool for two mints and hands the liquidity mint to the
// program. Depositors add both tokens and receive liquidity tokens in their
// associated account; traders swap token A for token B along x * y = k;
// withdrawals burn liquidity for a proportional share of both vaults. Once
// both vaults are empty the creator may close them and reclaim their rent.
//
// ADDRESSES: the vaults are owned by the PDA of VAULT_AUTH_PDA_SEED and the
// liquidity mint by the PDA of LP_MINT_AUTH_PDA_SEED.

pub mod errors;
pub mod instructions;
pub mod math;
pub mod state;

pub use errors::SwapError;
pub use instructions::*;
pub use state::PoolInfo;

use valence_settlement::{Dispatcher, RuntimeConfig};

solana_program::declare_id!("AY5C6rSKKZSvqdTdTSDvELekppj6vbg27qvJRaXN5oXU");

/// Seed of the authority that owns both vaults
pub const VAULT_AUTH_PDA_SEED: &str = "vault-authority";

/// Seed of the authority that mints liquidity tokens
pub const LP_MINT_AUTH_PDA_SEED: &str = "lp-mint-authority";

pub fn dispatcher() -> Dispatcher {
    Dispatcher::new(ID, RuntimeConfig::default())
        .register::<CreatePool>()
        .register::<Deposit>()
        .register::<Trade>()
        .register::<Withdraw>()
        .register::<ClosePool>()
}
