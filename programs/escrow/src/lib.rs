// Token escrow on the settlement core
//
// An initializer locks tokens of one mint in a vault owned by a program-derived
// authority and names the amount of another mint it wants back. A taker can
// complete the swap, or the initializer can cancel and recover the deposit.
// In both cases the vault is closed in the same invocation.
//
// ADDRESSES: the vault sits at the PDA of VAULT_PDA_SEED and its token owner is
// the PDA of ESCROW_PDA_SEED. Neither has a private key; the program signs for
// them by presenting seeds on each token call.

pub mod errors;
pub mod instructions;
pub mod state;

pub use errors::EscrowError;
pub use instructions::*;
pub use state::EscrowAccount;

use valence_settlement::{Dispatcher, RuntimeConfig};

solana_program::declare_id!("Fk5Pw6bJThGZZHpaJHfebXRXm6XRT3cgm9zY6Ef6D8a3");

/// Seed of the vault token account
pub const VAULT_PDA_SEED: &str = "token-seed";

/// Seed of the authority that owns the vault
pub const ESCROW_PDA_SEED: &str = "escrow";

pub fn dispatcher() -> Dispatcher {
    Dispatcher::new(ID, RuntimeConfig::default())
        .register::<Initialize>()
        .register::<Exchange>()
        .register::<Cancel>()
}
