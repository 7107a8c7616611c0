//! In-memory ledger for tests and local simulation
//!
//! Holds accounts in a `BTreeMap` so iteration and snapshots are
//! deterministic. Inner instructions are routed to native programs registered
//! as closures; the System Program is built in. Settlement applies a batch of
//! writes only after checking that no executable account changes and that the
//! batch conserves lamports.

use super::{AccountWrite, HostError, Ledger, RawAccount, RawInvocation};
use crate::state::AccountState;
use solana_program::{
    bpf_loader,
    instruction::{AccountMeta, Instruction},
    native_token::LAMPORTS_PER_SOL,
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction::SystemInstruction,
    system_program,
};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Program implemented in the host
pub trait NativeProgram {
    fn process(
        &mut self,
        instruction: &Instruction,
        accounts: &mut [AccountState],
        signers: &[Pubkey],
    ) -> Result<(), HostError>;
}

impl<F> NativeProgram for F
where
    F: FnMut(&Instruction, &mut [AccountState], &[Pubkey]) -> Result<(), HostError>,
{
    fn process(
        &mut self,
        instruction: &Instruction,
        accounts: &mut [AccountState],
        signers: &[Pubkey],
    ) -> Result<(), HostError> {
        self(instruction, accounts, signers)
    }
}

/// An inner instruction as the host received it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerInvocation {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
    pub signers: Vec<Pubkey>,
    pub stack_height: usize,
}

pub struct MemoryLedger {
    accounts: BTreeMap<Pubkey, AccountState>,
    rent: Rent,
    programs: BTreeMap<Pubkey, Box<dyn NativeProgram>>,
    program_id: Pubkey,
    pending: Option<RawInvocation>,
    inner: Vec<InnerInvocation>,
    write_log: Vec<AccountWrite>,
    settlements: usize,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        let mut ledger = Self {
            accounts: BTreeMap::new(),
            rent: Rent::default(),
            programs: BTreeMap::new(),
            program_id: Pubkey::default(),
            pending: None,
            inner: Vec::new(),
            write_log: Vec::new(),
            settlements: 0,
        };
        ledger.deploy(system_program::id());
        ledger
    }

    /// Insert or replace an account
    pub fn add_account(&mut self, state: AccountState) {
        self.accounts.insert(state.key, state);
    }

    /// System-owned wallet holding `sol` whole SOL
    pub fn fund(&mut self, key: Pubkey, sol: u64) {
        self.add_account(AccountState::system(key, sol * LAMPORTS_PER_SOL));
    }

    /// Mark `program_id` as loaded program code
    pub fn deploy(&mut self, program_id: Pubkey) {
        self.add_account(AccountState::program(program_id, bpf_loader::id()));
    }

    /// Deploy a program whose behaviour the host implements
    pub fn register_native(&mut self, program_id: Pubkey, program: impl NativeProgram + 'static) {
        self.deploy(program_id);
        self.programs.insert(program_id, Box::new(program));
    }

    pub fn account(&self, key: &Pubkey) -> Option<&AccountState> {
        self.accounts.get(key)
    }

    /// Balance of `key`, zero for unknown accounts
    pub fn lamports(&self, key: &Pubkey) -> u64 {
        self.accounts.get(key).map_or(0, |state| state.lamports)
    }

    pub fn snapshot(&self) -> BTreeMap<Pubkey, AccountState> {
        self.accounts.clone()
    }

    /// Every write applied by `settle`, in application order
    pub fn write_log(&self) -> &[AccountWrite] {
        &self.write_log
    }

    /// Number of successful settlements
    pub fn settlements(&self) -> usize {
        self.settlements
    }

    pub fn inner_invocations(&self) -> &[InnerInvocation] {
        &self.inner
    }

    /// Stage the next top-level invocation
    ///
    /// Accounts unknown to the ledger are bound as vacant slots.
    pub fn submit(&mut self, program_id: Pubkey, metas: &[AccountMeta], data: Vec<u8>) {
        self.submit_nested(program_id, metas, data, 1, Vec::new());
    }

    /// Stage an invocation as if called from `call_stack` at `stack_height`
    pub fn submit_nested(
        &mut self,
        program_id: Pubkey,
        metas: &[AccountMeta],
        data: Vec<u8>,
        stack_height: usize,
        call_stack: Vec<Pubkey>,
    ) {
        let accounts = metas
            .iter()
            .map(|meta| RawAccount {
                is_signer: meta.is_signer,
                is_writable: meta.is_writable,
                state: self
                    .accounts
                    .get(&meta.pubkey)
                    .cloned()
                    .unwrap_or_else(|| AccountState::empty(meta.pubkey)),
            })
            .collect();
        self.program_id = program_id;
        self.pending = Some(RawInvocation {
            program_id,
            accounts,
            data,
            stack_height,
            call_stack,
        });
    }

    fn current(&self, key: &Pubkey) -> AccountState {
        self.accounts
            .get(key)
            .cloned()
            .unwrap_or_else(|| AccountState::empty(*key))
    }
}

impl Ledger for MemoryLedger {
    fn current_instruction(&mut self) -> Result<RawInvocation, HostError> {
        self.pending
            .take()
            .ok_or_else(|| HostError::new("no instruction staged for this invocation"))
    }

    fn current_program_id(&self) -> Pubkey {
        self.program_id
    }

    fn minimum_balance(&self, space: usize) -> u64 {
        self.rent.minimum_balance(space)
    }

    fn invoke(
        &mut self,
        instruction: &Instruction,
        accounts: &mut [AccountState],
        signers: &[Pubkey],
        stack_height: usize,
    ) -> Result<(), HostError> {
        self.inner.push(InnerInvocation {
            program_id: instruction.program_id,
            accounts: instruction.accounts.clone(),
            data: instruction.data.clone(),
            signers: signers.to_vec(),
            stack_height,
        });
        let before: u128 = accounts.iter().map(|state| u128::from(state.lamports)).sum();

        if instruction.program_id == system_program::id() {
            process_system_instruction(instruction, accounts, signers)?;
        } else {
            let program = self.programs.get_mut(&instruction.program_id).ok_or_else(|| {
                HostError::with_code(
                    u64::from(ProgramError::IncorrectProgramId),
                    format!("program {} is not loaded", instruction.program_id),
                )
            })?;
            program.process(instruction, accounts, signers)?;
        }

        let after: u128 = accounts.iter().map(|state| u128::from(state.lamports)).sum();
        if before != after {
            return Err(HostError::new(format!(
                "program {} unbalanced the instruction: {before} -> {after} lamports",
                instruction.program_id
            )));
        }
        trace!(program = %instruction.program_id, stack_height, "inner instruction executed");
        Ok(())
    }

    fn settle(&mut self, writes: &[AccountWrite]) -> Result<(), HostError> {
        let mut before: u128 = 0;
        let mut after: u128 = 0;
        for write in writes {
            let current = self.current(&write.key);
            if current.executable {
                return Err(HostError::new(format!(
                    "executable account {} cannot be modified",
                    write.key
                )));
            }
            before += u128::from(current.lamports);
            after += u128::from(write.lamports.unwrap_or(current.lamports));
        }
        if before != after {
            return Err(HostError::new(format!(
                "settlement changes total lamports: {before} -> {after}"
            )));
        }

        for write in writes {
            let mut state = self.current(&write.key);
            if let Some(lamports) = write.lamports {
                state.lamports = lamports;
            }
            if let Some(data) = &write.data {
                state.data.clone_from(data);
            }
            if let Some(owner) = write.owner {
                state.owner = owner;
            }
            self.accounts.insert(write.key, state);
        }
        self.write_log.extend_from_slice(writes);
        self.settlements += 1;
        debug!(writes = writes.len(), "ledger settled");
        Ok(())
    }
}

// ================================
// System Program
// ================================

/// Position of `key` in the account slice handed to a native program
pub fn account_position(accounts: &[AccountState], key: &Pubkey) -> Result<usize, HostError> {
    accounts
        .iter()
        .position(|state| state.key == *key)
        .ok_or_else(|| HostError::from(ProgramError::NotEnoughAccountKeys))
}

/// Key of the `position`-th meta of an instruction
pub fn meta_key(instruction: &Instruction, position: usize) -> Result<Pubkey, HostError> {
    instruction
        .accounts
        .get(position)
        .map(|meta| meta.pubkey)
        .ok_or_else(|| HostError::from(ProgramError::NotEnoughAccountKeys))
}

fn require_signer(signers: &[Pubkey], key: &Pubkey) -> Result<(), HostError> {
    if signers.contains(key) {
        Ok(())
    } else {
        Err(HostError::from(ProgramError::MissingRequiredSignature))
    }
}

fn require_system_owned(state: &AccountState) -> Result<(), HostError> {
    if state.owner == system_program::id() {
        Ok(())
    } else {
        Err(HostError::from(ProgramError::IncorrectProgramId))
    }
}

fn move_lamports(
    accounts: &mut [AccountState],
    from: usize,
    to: usize,
    lamports: u64,
) -> Result<(), HostError> {
    if accounts[from].lamports < lamports {
        return Err(HostError::from(ProgramError::InsufficientFunds));
    }
    accounts[from].lamports -= lamports;
    accounts[to].lamports = accounts[to]
        .lamports
        .checked_add(lamports)
        .ok_or_else(|| HostError::from(ProgramError::ArithmeticOverflow))?;
    Ok(())
}

fn process_system_instruction(
    instruction: &Instruction,
    accounts: &mut [AccountState],
    signers: &[Pubkey],
) -> Result<(), HostError> {
    let decoded: SystemInstruction = bincode::deserialize(&instruction.data)
        .map_err(|_| HostError::from(ProgramError::InvalidInstructionData))?;

    match decoded {
        SystemInstruction::CreateAccount {
            lamports,
            space,
            owner,
        } => {
            let from_key = meta_key(instruction, 0)?;
            let to_key = meta_key(instruction, 1)?;
            require_signer(signers, &from_key)?;
            require_signer(signers, &to_key)?;
            let from = account_position(accounts, &from_key)?;
            let to = account_position(accounts, &to_key)?;
            if !accounts[to].is_vacant() {
                return Err(HostError::from(ProgramError::AccountAlreadyInitialized));
            }
            move_lamports(accounts, from, to, lamports)?;
            let space = usize::try_from(space)
                .map_err(|_| HostError::from(ProgramError::InvalidArgument))?;
            accounts[to].data = vec![0; space];
            accounts[to].owner = owner;
        }
        SystemInstruction::Transfer { lamports } => {
            let from_key = meta_key(instruction, 0)?;
            let to_key = meta_key(instruction, 1)?;
            require_signer(signers, &from_key)?;
            let from = account_position(accounts, &from_key)?;
            let to = account_position(accounts, &to_key)?;
            require_system_owned(&accounts[from])?;
            if !accounts[from].data.is_empty() {
                return Err(HostError::from(ProgramError::InvalidArgument));
            }
            move_lamports(accounts, from, to, lamports)?;
        }
        SystemInstruction::Assign { owner } => {
            let key = meta_key(instruction, 0)?;
            require_signer(signers, &key)?;
            let position = account_position(accounts, &key)?;
            require_system_owned(&accounts[position])?;
            accounts[position].owner = owner;
        }
        SystemInstruction::Allocate { space } => {
            let key = meta_key(instruction, 0)?;
            require_signer(signers, &key)?;
            let position = account_position(accounts, &key)?;
            require_system_owned(&accounts[position])?;
            if !accounts[position].data.is_empty() {
                return Err(HostError::from(ProgramError::AccountAlreadyInitialized));
            }
            let space = usize::try_from(space)
                .map_err(|_| HostError::from(ProgramError::InvalidArgument))?;
            accounts[position].data = vec![0; space];
        }
        other => {
            return Err(HostError::new(format!(
                "system instruction {other:?} is not supported"
            )));
        }
    }
    Ok(())
}
