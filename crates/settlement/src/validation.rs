// Bounds validation for client-supplied invocation data
//
// The dispatcher and the cross-program invoker process untrusted input: the
// raw parameter blob, account positions referenced by business logic, signer
// seeds and inner instruction payloads. These validators run before any of
// that input reaches binding or the host, so oversized payloads and
// out-of-range positions fail as typed errors instead of panics.
use crate::errors::{Result, SettlementError};

/// Generic data size validation
pub fn validate_data_size(data: &[u8], max_size: usize, what: &str) -> Result<()> {
    if data.len() > max_size {
        return Err(SettlementError::MalformedInstruction(format!(
            "{what} is {} bytes, limit is {max_size}",
            data.len()
        )));
    }
    Ok(())
}

/// Validate the incoming instruction data (discriminator + parameters)
pub fn validate_instruction_data(data: &[u8], max_size: usize) -> Result<()> {
    validate_data_size(data, max_size, "instruction data")
}

/// Validate inner instruction data passed to another program
pub fn validate_cpi_data(data: &[u8], max_size: usize) -> Result<()> {
    validate_data_size(data, max_size, "cross-program instruction data")
}

/// Validate an account position against the table length
pub fn validate_account_index(index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(SettlementError::AccountIndexOutOfBounds { index, len });
    }
    Ok(())
}

/// Validate a list of account positions against the table length
pub fn validate_account_indices(indices: impl IntoIterator<Item = usize>, len: usize) -> Result<()> {
    indices
        .into_iter()
        .try_for_each(|index| validate_account_index(index, len))
}

/// Validate seed count and individual seed length
pub fn validate_seeds(seeds: &[&str], max_seeds: usize, max_seed_len: usize) -> Result<()> {
    if seeds.len() > max_seeds {
        return Err(SettlementError::InvalidSeeds(format!(
            "{} seeds, limit is {max_seeds}",
            seeds.len()
        )));
    }
    if let Some(seed) = seeds.iter().find(|seed| seed.len() > max_seed_len) {
        return Err(SettlementError::InvalidSeeds(format!(
            "seed of {} bytes, limit is {max_seed_len}",
            seed.len()
        )));
    }
    Ok(())
}
