//! Host ledger interface
//!
//! The core never touches ledger storage directly. Everything it needs from
//! the host is expressed by the [`Ledger`] trait: the raw invocation, the rent
//! schedule, dispatch of inner instructions and the final settlement of dirty
//! accounts. The runtime context is passed explicitly into the dispatcher, so
//! tests substitute [`memory::MemoryLedger`] or a mock.

pub mod memory;

use crate::pda;
use crate::state::AccountState;
use solana_program::{instruction::Instruction, program_error::ProgramError, pubkey::Pubkey};
use std::fmt;

pub use memory::MemoryLedger;

// ================================
// Host Error
// ================================

/// Opaque error surfaced unchanged from the ledger collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    code: Option<u64>,
    message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: u64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    /// Numeric code reported by the host, if any
    pub fn code(&self) -> Option<u64> {
        self.code
    }

    /// Human readable rendering, for final reporting only
    pub fn render(&self) -> String {
        match self.code {
            Some(code) => format!("{} (code {code})", self.message),
            None => self.message.clone(),
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl std::error::Error for HostError {}

impl From<ProgramError> for HostError {
    fn from(err: ProgramError) -> Self {
        Self::with_code(u64::from(err.clone()), err.to_string())
    }
}

// ================================
// Raw Invocation
// ================================

/// One entry of the flat account table as declared by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAccount {
    pub is_signer: bool,
    pub is_writable: bool,
    pub state: AccountState,
}

/// The invocation exactly as the host hands it over
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInvocation {
    /// Program being executed
    pub program_id: Pubkey,
    /// Ordered account table
    pub accounts: Vec<RawAccount>,
    /// Instruction discriminator followed by the parameter blob
    pub data: Vec<u8>,
    /// Height of this frame on the host call stack, 1 for a top-level call
    pub stack_height: usize,
    /// Programs of the enclosing frames, outermost first
    pub call_stack: Vec<Pubkey>,
}

/// Pending change for one account, swept to the ledger in index order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountWrite {
    pub index: usize,
    pub key: Pubkey,
    pub lamports: Option<u64>,
    pub data: Option<Vec<u8>>,
    pub owner: Option<Pubkey>,
}

// ================================
// Ledger Trait
// ================================

/// Narrow interface onto the host ledger/runtime
#[cfg_attr(test, mockall::automock)]
pub trait Ledger {
    /// Raw invocation for this call; handed out once per invocation
    fn current_instruction(&mut self) -> Result<RawInvocation, HostError>;

    /// Address of the executing program
    fn current_program_id(&self) -> Pubkey;

    /// Rent-exempt balance for an allocation of `space` bytes
    fn minimum_balance(&self, space: usize) -> u64;

    /// Run an inner instruction against the given account states
    ///
    /// `accounts` holds each distinct account of the instruction once, with
    /// its pending value. The host updates them in place on success.
    fn invoke(
        &mut self,
        instruction: &Instruction,
        accounts: &mut [AccountState],
        signers: &[Pubkey],
        stack_height: usize,
    ) -> Result<(), HostError>;

    /// Apply all writes, in the given order, or none of them
    fn settle(&mut self, writes: &[AccountWrite]) -> Result<(), HostError>;

    /// Program address lookup when the host provides one
    fn find_program_address(&self, seeds: &[String], program_id: &Pubkey) -> Option<(Pubkey, u8)> {
        let seeds: Vec<&str> = seeds.iter().map(String::as_str).collect();
        pda::find_program_address(program_id, &seeds).ok()
    }

    /// Diagnostic only
    fn log_compute_units(&self) {}
}
