//! Valence Settlement
//!
//! Account binding, privilege attenuation and atomic settlement for programs
//! running on an account-oriented ledger. An invocation's flat account list is
//! bound into capability-checked handles, business logic mutates those handles
//! and calls other programs through the cross-program invoker, and the commit
//! manager settles every dirty handle exactly once, or not at all.

// ================================
// Module Declarations
// ================================

pub mod binding;
pub mod commit;
pub mod config;
pub mod cpi;
pub mod dispatcher;
pub mod errors;
pub mod host;
pub mod logging;
pub mod pda;
pub mod schema;
pub mod state;
pub mod token;
pub mod validation;

// ================================
// Public API Re-exports
// ================================

// Errors and configuration
pub use config::{ConfigError, RuntimeConfig};
pub use errors::{Capability, Result, SettlementError};

// Address derivation
pub use pda::{
    create_program_address, find_program_address, verify_program_address, SeedBump, SignerSeeds,
};

// Binding and account state
pub use binding::{instruction_discriminator, Access, AccountSpec, BindingDescriptor, DataBinding};
pub use schema::{AccountSchema, SchemaTag};
pub use state::{AccountHandle, AccountState, AccountTable, DirtyFlags};

// Execution
pub use commit::{CommitManager, CommitReceipt};
pub use cpi::{AccountRef, CrossProgramInvoker};
pub use dispatcher::{instruction_data, Context, Dispatcher, InvocationState, Outcome, ProgramInstruction};

// Host interface
pub use host::{AccountWrite, HostError, Ledger, MemoryLedger, RawAccount, RawInvocation};

/// Common imports for programs built on the settlement core
pub mod prelude {
    pub use crate::{
        require, require_keys_eq, Access, AccountRef, AccountSchema, BindingDescriptor, Context,
        Dispatcher, Outcome, ProgramInstruction, Result, RuntimeConfig, SeedBump, SettlementError,
        SignerSeeds,
    };
    pub use borsh::{BorshDeserialize, BorshSerialize};
    pub use solana_program::pubkey::Pubkey;
}
