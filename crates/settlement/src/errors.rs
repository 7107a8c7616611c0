// Error taxonomy for account binding, cross-program invocation and settlement
//
// Every failure the core can detect is a typed, local condition returned to the
// dispatcher. The dispatcher treats any error as an abort of the whole
// invocation: nothing reaches the ledger unless business logic returns Ok.
//
// ERROR CATEGORIZATION: capability and privilege errors describe what an
// account slot was allowed to do, schema errors describe the shape of its data,
// derivation errors come from the address deriver, and host errors are carried
// through unchanged from the ledger collaborator.

use crate::host::HostError;
use solana_program::pubkey::Pubkey;
use std::fmt;
use thiserror::Error;

// ================================
// Capabilities
// ================================

/// A single attribute an account slot may or may not hold for this invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Signed by the caller, or authorized through signer seeds
    Signer,
    /// Declared writable by the caller
    Writable,
    /// Holds loaded program code
    Executable,
    /// Not executable, so balance and data may change
    Mutable,
    /// Owned by the executing program
    Ownership,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Signer => "signer",
            Self::Writable => "writable",
            Self::Executable => "executable",
            Self::Mutable => "non-executable",
            Self::Ownership => "program ownership",
        };
        f.write_str(label)
    }
}

// ================================
// Error Types
// ================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    // ===== Account capability errors =====
    #[error("account {index} ({key}) lacks the {missing} capability")]
    Capability {
        index: usize,
        key: Pubkey,
        missing: Capability,
    },

    #[error("account {index} data does not match its schema: {reason}")]
    Schema { index: usize, reason: String },

    // ===== Binding errors =====
    #[error("account {index} ({name}) must be {missing}")]
    Privilege {
        index: usize,
        name: String,
        missing: Capability,
    },

    #[error("cross-program call requests {requested} on {key} beyond the outer grant")]
    PrivilegeEscalation { key: Pubkey, requested: Capability },

    #[error("account {key} bound at positions {first} and {second} with conflicting writability")]
    Aliasing {
        key: Pubkey,
        first: usize,
        second: usize,
    },

    #[error("expected at least {expected} accounts, got {actual}")]
    AccountCount { expected: usize, actual: usize },

    #[error("account index {index} out of bounds for table of {len}")]
    AccountIndexOutOfBounds { index: usize, len: usize },

    #[error("no account named {0} in this instruction")]
    UnknownAccount(String),

    // ===== Address derivation errors =====
    #[error("no bump seed yields an off-curve address")]
    NoValidBump,

    #[error("invalid seeds: {0}")]
    InvalidSeeds(String),

    #[error("signer seeds derive {derived}, which is not a signer in this call")]
    UnauthorizedSeeds { derived: Pubkey },

    // ===== Cross-program invocation errors =====
    #[error("call stack height {height} exceeds the maximum of {max}")]
    CallDepthExceeded { height: usize, max: usize },

    #[error("reentrant call into {program} is not allowed")]
    Reentrancy { program: Pubkey },

    #[error("program {program} is not an executable account of this invocation")]
    ProgramNotFound { program: Pubkey },

    // ===== Dispatch errors =====
    #[error("malformed instruction: {0}")]
    MalformedInstruction(String),

    // ===== Account creation errors =====
    #[error("payer {payer} holds {available} lamports, {required} required")]
    InsufficientFunds {
        payer: Pubkey,
        required: u64,
        available: u64,
    },

    #[error("account {key} is already in use")]
    AlreadyInUse { key: Pubkey },

    // ===== Business logic errors =====
    #[error("assertion failed: {0}")]
    AssertionFailed(String),

    #[error("custom program error: {0:#x}")]
    Custom(u32),

    // ===== Host errors =====
    #[error("host error: {0}")]
    Host(#[from] HostError),
}

impl SettlementError {
    /// Shorthand for a schema violation on the account at `index`
    pub fn schema(index: usize, reason: impl Into<String>) -> Self {
        Self::Schema {
            index,
            reason: reason.into(),
        }
    }

    /// True for errors raised by the privilege and authority checks
    #[must_use]
    pub const fn is_privilege_error(&self) -> bool {
        matches!(
            self,
            Self::Privilege { .. }
                | Self::PrivilegeEscalation { .. }
                | Self::UnauthorizedSeeds { .. }
                | Self::Capability {
                    missing: Capability::Signer,
                    ..
                }
        )
    }
}

pub type Result<T> = std::result::Result<T, SettlementError>;

// ================================
// Assertion Macros
// ================================

/// Abort the invocation unless `cond` holds
///
/// With a single argument the error is [`SettlementError::AssertionFailed`]
/// carrying the stringified condition.
#[macro_export]
macro_rules! require {
    ($cond:expr $(,)?) => {
        if !($cond) {
            return Err($crate::SettlementError::AssertionFailed(
                stringify!($cond).to_string(),
            )
            .into());
        }
    };
    ($cond:expr, $err:expr $(,)?) => {
        if !($cond) {
            return Err($err.into());
        }
    };
}

/// Abort the invocation unless two public keys are equal
#[macro_export]
macro_rules! require_keys_eq {
    ($left:expr, $right:expr $(,)?) => {
        if $left != $right {
            return Err($crate::SettlementError::AssertionFailed(format!(
                "{} != {} ({} vs {})",
                stringify!($left),
                stringify!($right),
                $left,
                $right
            ))
            .into());
        }
    };
    ($left:expr, $right:expr, $err:expr $(,)?) => {
        if $left != $right {
            return Err($err.into());
        }
    };
}
