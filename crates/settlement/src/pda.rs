// Program-derived address (PDA) derivation for the settlement core
//
// A PDA is an address with no private key. It is derived from the executing
// program's id and a seed sequence, then pushed off the ed25519 curve with a
// one-byte bump so that no keypair can ever sign for it. The owning program
// proves authority over the address by presenting the same seeds and bump
// when it invokes another program.
//
// Derivation is a pure function of (program id, seeds, bump): every authority
// proof in the system relies on identical inputs producing identical output.

use crate::errors::{Result, SettlementError};
use crate::validation;
use ed25519_dalek::VerifyingKey;
use sha2::{Digest, Sha256};
use solana_program::pubkey::Pubkey;

/// Domain separator appended to every derivation
pub const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Maximum number of seeds in one derivation
pub const MAX_SEEDS: usize = 16;

/// Maximum length of a single seed in bytes
pub const MAX_SEED_LEN: usize = 32;

// ================================
// Signer Seed Types
// ================================

/// A single-seed path component together with its bump
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeedBump {
    pub seed: String,
    pub bump: u8,
}

impl SeedBump {
    pub fn new(seed: impl Into<String>, bump: u8) -> Self {
        Self {
            seed: seed.into(),
            bump,
        }
    }
}

/// Seeds and bump that authorize exactly one derived address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignerSeeds {
    pub seeds: Vec<String>,
    pub bump: u8,
}

impl SignerSeeds {
    pub fn new<S: Into<String>>(seeds: impl IntoIterator<Item = S>, bump: u8) -> Self {
        Self {
            seeds: seeds.into_iter().map(Into::into).collect(),
            bump,
        }
    }

    /// Address these seeds authorize under `program_id`
    pub fn derive(&self, program_id: &Pubkey) -> Result<Pubkey> {
        create_program_address(program_id, &self.seed_refs(), self.bump)
    }

    pub fn seed_refs(&self) -> Vec<&str> {
        self.seeds.iter().map(String::as_str).collect()
    }
}

impl From<SeedBump> for SignerSeeds {
    fn from(value: SeedBump) -> Self {
        Self {
            seeds: vec![value.seed],
            bump: value.bump,
        }
    }
}

impl From<&SeedBump> for SignerSeeds {
    fn from(value: &SeedBump) -> Self {
        Self::from(value.clone())
    }
}

// ================================
// Derivation
// ================================

/// True when `bytes` decompress to a point on the ed25519 curve
pub fn is_on_curve(bytes: &[u8; 32]) -> bool {
    VerifyingKey::from_bytes(bytes).is_ok()
}

fn hash_candidate(program_id: &Pubkey, seeds: &[&str], bump: u8) -> Pubkey {
    let mut hasher = Sha256::new();
    hasher.update(program_id.as_ref());
    for seed in seeds {
        hasher.update(seed.as_bytes());
    }
    hasher.update([bump]);
    hasher.update(PDA_MARKER);
    Pubkey::new_from_array(hasher.finalize().into())
}

/// Derive the address for an explicit bump
///
/// Fails with [`SettlementError::InvalidSeeds`] when the seeds break the
/// size limits or the result lands on the curve.
pub fn create_program_address(program_id: &Pubkey, seeds: &[&str], bump: u8) -> Result<Pubkey> {
    validation::validate_seeds(seeds, MAX_SEEDS, MAX_SEED_LEN)?;
    let address = hash_candidate(program_id, seeds, bump);
    if is_on_curve(&address.to_bytes()) {
        return Err(SettlementError::InvalidSeeds(format!(
            "bump {bump} derives an on-curve address"
        )));
    }
    Ok(address)
}

/// Search bumps from 255 down to 0 and return the first off-curve address
pub fn find_program_address(program_id: &Pubkey, seeds: &[&str]) -> Result<(Pubkey, u8)> {
    validation::validate_seeds(seeds, MAX_SEEDS, MAX_SEED_LEN)?;
    search_bump(|bump| {
        let candidate = hash_candidate(program_id, seeds, bump);
        (!is_on_curve(&candidate.to_bytes())).then_some(candidate)
    })
}

fn search_bump(mut candidate: impl FnMut(u8) -> Option<Pubkey>) -> Result<(Pubkey, u8)> {
    (0..=u8::MAX)
        .rev()
        .find_map(|bump| candidate(bump).map(|address| (address, bump)))
        .ok_or(SettlementError::NoValidBump)
}

/// Recompute and compare without searching
pub fn verify_program_address(
    program_id: &Pubkey,
    seeds: &[&str],
    bump: u8,
    claimed: &Pubkey,
) -> bool {
    create_program_address(program_id, seeds, bump).is_ok_and(|address| address == *claimed)
}
