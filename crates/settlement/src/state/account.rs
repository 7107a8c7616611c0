//! Account handle: the typed, capability-checked view of one account slot
//!
//! A handle owns the pending value of its slot for the whole invocation. Reads
//! observe pending writes immediately; nothing reaches the ledger until the
//! commit sweep reads the dirty flags.

use crate::errors::{Capability, Result, SettlementError};
use crate::schema::{AccountSchema, SchemaTag};
use solana_program::{pubkey::Pubkey, system_program};

// ================================
// Account State
// ================================

/// Ledger-side contents of one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    pub key: Pubkey,
    pub lamports: u64,
    pub data: Vec<u8>,
    pub owner: Pubkey,
    pub executable: bool,
    pub rent_epoch: u64,
}

impl AccountState {
    pub fn new(key: Pubkey, lamports: u64, space: usize, owner: Pubkey) -> Self {
        Self {
            key,
            lamports,
            data: vec![0; space],
            owner,
            executable: false,
            rent_epoch: 0,
        }
    }

    /// A wallet: system owned, no data
    pub fn system(key: Pubkey, lamports: u64) -> Self {
        Self::new(key, lamports, 0, system_program::id())
    }

    /// Slot that does not exist on the ledger yet
    pub fn empty(key: Pubkey) -> Self {
        Self::system(key, 0)
    }

    /// Loaded program code
    pub fn program(key: Pubkey, loader: Pubkey) -> Self {
        Self {
            executable: true,
            ..Self::new(key, 1, 0, loader)
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// No lamports, no data and still owned by the System Program
    pub fn is_vacant(&self) -> bool {
        self.lamports == 0 && self.data.is_empty() && self.owner == system_program::id()
    }
}

/// Which fields changed through the handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirtyFlags {
    pub lamports: bool,
    pub data: bool,
    pub owner: bool,
}

impl DirtyFlags {
    pub fn any(&self) -> bool {
        self.lamports || self.data || self.owner
    }
}

// ================================
// Account Handle
// ================================

#[derive(Debug, Clone)]
pub struct AccountHandle {
    index: usize,
    name: Option<&'static str>,
    program_id: Pubkey,
    state: AccountState,
    is_signer: bool,
    is_writable: bool,
    schema: Option<SchemaTag>,
    dirty: DirtyFlags,
}

impl AccountHandle {
    pub(crate) fn new(
        index: usize,
        name: Option<&'static str>,
        program_id: Pubkey,
        state: AccountState,
        is_signer: bool,
        is_writable: bool,
        schema: Option<SchemaTag>,
    ) -> Self {
        Self {
            index,
            name,
            program_id,
            state,
            is_signer,
            is_writable,
            schema,
            dirty: DirtyFlags::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Name from the binding descriptor, `None` for trailing accounts
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }

    pub fn key(&self) -> &Pubkey {
        &self.state.key
    }

    pub fn lamports(&self) -> u64 {
        self.state.lamports
    }

    pub fn owner(&self) -> &Pubkey {
        &self.state.owner
    }

    pub fn executable(&self) -> bool {
        self.state.executable
    }

    pub fn rent_epoch(&self) -> u64 {
        self.state.rent_epoch
    }

    pub fn is_signer(&self) -> bool {
        self.is_signer
    }

    pub fn is_writable(&self) -> bool {
        self.is_writable
    }

    pub fn schema(&self) -> Option<SchemaTag> {
        self.schema
    }

    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.any()
    }

    /// Pending contents of the slot
    pub fn state(&self) -> &AccountState {
        &self.state
    }

    /// Raw data bytes, for layouts not described by an [`AccountSchema`]
    pub fn raw_data(&self) -> &[u8] {
        &self.state.data
    }

    pub fn is_owned_by_program(&self) -> bool {
        self.state.owner == self.program_id
    }

    fn capability_error(&self, missing: Capability) -> SettlementError {
        SettlementError::Capability {
            index: self.index,
            key: self.state.key,
            missing,
        }
    }

    fn require(&self, held: bool, missing: Capability) -> Result<()> {
        if held {
            Ok(())
        } else {
            Err(self.capability_error(missing))
        }
    }

    fn require_mutable(&self) -> Result<()> {
        self.require(self.is_writable, Capability::Writable)?;
        self.require(!self.state.executable, Capability::Mutable)
    }

    /// Set the pending balance
    ///
    /// Any writable, non-executable account may be credited; only accounts
    /// owned by the executing program may be debited.
    pub fn set_lamports(&mut self, lamports: u64) -> Result<()> {
        self.require_mutable()?;
        if lamports < self.state.lamports {
            self.require(self.is_owned_by_program(), Capability::Ownership)?;
        }
        self.state.lamports = lamports;
        self.dirty.lamports = true;
        Ok(())
    }

    /// Decode the record through the bound schema
    pub fn data<T: AccountSchema>(&self) -> Result<T> {
        let tag = self.bound_schema::<T>()?;
        tag.decode(&self.state.data)
            .map_err(|reason| SettlementError::schema(self.index, reason))
    }

    /// Encode `value` into the allocated space, zero-filling the tail
    pub fn save_data<T: AccountSchema>(&mut self, value: &T) -> Result<()> {
        self.require_mutable()?;
        self.require(self.is_owned_by_program(), Capability::Ownership)?;
        let tag = self.bound_schema::<T>()?;
        let buffer = tag
            .encode(value, self.state.data.len())
            .map_err(|reason| SettlementError::schema(self.index, reason))?;
        self.state.data = buffer;
        self.dirty.data = true;
        Ok(())
    }

    fn bound_schema<T: AccountSchema>(&self) -> Result<SchemaTag> {
        let expected = T::schema();
        match self.schema {
            Some(tag) if tag == expected => Ok(tag),
            Some(tag) => Err(SettlementError::schema(
                self.index,
                format!("bound to {tag}, read as {expected}"),
            )),
            None => Err(SettlementError::schema(
                self.index,
                format!("no schema bound, read as {expected}"),
            )),
        }
    }

    // ===== Crate-internal mutation paths =====

    pub(crate) fn grant_signer(&mut self) {
        self.is_signer = true;
    }

    /// Balance change performed on behalf of the System Program
    pub(crate) fn move_lamports(&mut self, lamports: u64) {
        if lamports != self.state.lamports {
            self.state.lamports = lamports;
            self.dirty.lamports = true;
        }
    }

    pub(crate) fn allocate_and_assign(&mut self, space: usize, owner: Pubkey) {
        self.state.data = vec![0; space];
        self.state.owner = owner;
        self.dirty.data = true;
        self.dirty.owner = true;
    }

    /// Adopt the value an inner invocation produced for this slot
    pub(crate) fn write_back(&mut self, updated: &AccountState) {
        self.state.lamports = updated.lamports;
        self.state.data.clone_from(&updated.data);
        self.dirty.lamports = true;
        self.dirty.data = true;
        if updated.owner != self.state.owner {
            self.state.owner = updated.owner;
            self.dirty.owner = true;
        }
    }
}
