//! Instruction dispatcher
//!
//! Drives one invocation through `Dispatching -> Executing -> Committed` or
//! into `Aborted`. Dispatching decodes the raw invocation and binds the
//! account table; Executing runs business logic against a [`Context`];
//! Committed is reached only when business logic returns `Ok` and the sweep
//! lands. Any error, or a panic inside business logic, aborts the invocation
//! and the ledger never sees a write.

use crate::binding::{instruction_discriminator, BindingDescriptor};
use crate::commit::{CommitManager, CommitReceipt};
use crate::config::RuntimeConfig;
use crate::cpi::{AccountRef, CrossProgramInvoker};
use crate::errors::{Result, SettlementError};
use crate::host::Ledger;
use crate::pda::SignerSeeds;
use crate::schema::DISCRIMINATOR_LEN;
use crate::state::{AccountHandle, AccountTable};
use crate::validation;
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{instruction::Instruction, pubkey::Pubkey};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info, info_span, warn};

// ================================
// Instruction Trait
// ================================

/// A typed instruction: its parameters are the implementing struct
pub trait ProgramInstruction: BorshSerialize + BorshDeserialize + 'static {
    /// Name hashed into the instruction discriminator
    const NAME: &'static str;

    /// Account positions and their requirements
    fn accounts() -> BindingDescriptor;

    /// Business logic; returning an error aborts the invocation
    fn process(self, ctx: &mut Context<'_>) -> Result<()>;
}

/// Discriminator followed by the borsh parameters
pub fn instruction_data<I: ProgramInstruction>(instruction: &I) -> Result<Vec<u8>> {
    let mut data = instruction_discriminator(I::NAME).to_vec();
    let params = instruction
        .try_to_vec()
        .map_err(|err| SettlementError::MalformedInstruction(err.to_string()))?;
    data.extend_from_slice(&params);
    Ok(data)
}

// ================================
// Context
// ================================

/// Everything business logic may touch during one invocation
pub struct Context<'a> {
    program_id: Pubkey,
    config: &'a RuntimeConfig,
    ledger: &'a mut dyn Ledger,
    table: AccountTable,
    stack_height: usize,
    call_stack: Vec<Pubkey>,
}

impl<'a> Context<'a> {
    pub fn new(
        config: &'a RuntimeConfig,
        ledger: &'a mut dyn Ledger,
        table: AccountTable,
        stack_height: usize,
        call_stack: Vec<Pubkey>,
    ) -> Self {
        Self {
            program_id: *table.program_id(),
            config,
            ledger,
            table,
            stack_height,
            call_stack,
        }
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn stack_height(&self) -> usize {
        self.stack_height
    }

    pub fn accounts(&self) -> &AccountTable {
        &self.table
    }

    pub fn account(&self, name: &str) -> Result<&AccountHandle> {
        self.table.by_name(name)
    }

    pub fn account_mut(&mut self, name: &str) -> Result<&mut AccountHandle> {
        self.table.by_name_mut(name)
    }

    pub fn account_at(&self, index: usize) -> Result<&AccountHandle> {
        self.table.get(index)
    }

    pub fn account_at_mut(&mut self, index: usize) -> Result<&mut AccountHandle> {
        self.table.get_mut(index)
    }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.table.index_of(name)
    }

    pub fn key_of(&self, name: &str) -> Result<Pubkey> {
        Ok(*self.table.by_name(name)?.key())
    }

    /// Rent-exempt minimum for `space` bytes
    pub fn minimum_balance(&self, space: usize) -> u64 {
        self.ledger.minimum_balance(space)
    }

    /// Derive an address of the executing program
    pub fn find_program_address(&self, seeds: &[&str]) -> Result<(Pubkey, u8)> {
        validation::validate_seeds(seeds, crate::pda::MAX_SEEDS, crate::pda::MAX_SEED_LEN)?;
        let owned: Vec<String> = seeds.iter().map(ToString::to_string).collect();
        self.ledger
            .find_program_address(&owned, &self.program_id)
            .ok_or(SettlementError::NoValidBump)
    }

    pub fn log_compute_units(&self) {
        self.ledger.log_compute_units();
    }

    /// Create `new_account` funded by `payer`, owned by `owner`
    pub fn create_account(
        &mut self,
        payer: &str,
        new_account: &str,
        space: usize,
        owner: &Pubkey,
        signer_seeds: Option<&SignerSeeds>,
    ) -> Result<()> {
        let payer = self.table.index_of(payer)?;
        let new_account = self.table.index_of(new_account)?;
        let rent_exempt = self.ledger.minimum_balance(space);
        self.table
            .create_account(payer, new_account, space, owner, signer_seeds, rent_exempt)
    }

    /// Call another program with accounts named by table position
    pub fn invoke(
        &mut self,
        target: &Pubkey,
        accounts: &[AccountRef],
        signer_seeds: &[SignerSeeds],
        data: &[u8],
    ) -> Result<()> {
        let invoker = CrossProgramInvoker::new(
            self.config,
            self.program_id,
            self.stack_height,
            &self.call_stack,
        );
        invoker.invoke(
            &mut *self.ledger,
            &mut self.table,
            target,
            accounts,
            signer_seeds,
            data,
        )
    }

    /// Call another program with a prebuilt instruction
    pub fn invoke_instruction(
        &mut self,
        instruction: &Instruction,
        signer_seeds: &[SignerSeeds],
    ) -> Result<()> {
        let invoker = CrossProgramInvoker::new(
            self.config,
            self.program_id,
            self.stack_height,
            &self.call_stack,
        );
        invoker.invoke_instruction(&mut *self.ledger, &mut self.table, instruction, signer_seeds)
    }

    fn into_table(self) -> AccountTable {
        self.table
    }
}

// ================================
// Dispatcher
// ================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Dispatching,
    Executing,
    Committed,
    Aborted,
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Dispatching => "dispatching",
            Self::Executing => "executing",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Committed(CommitReceipt),
    /// `state` is where the failure happened
    Aborted {
        state: InvocationState,
        error: SettlementError,
    },
}

impl Outcome {
    pub fn state(&self) -> InvocationState {
        match self {
            Self::Committed(_) => InvocationState::Committed,
            Self::Aborted { .. } => InvocationState::Aborted,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }

    pub fn error(&self) -> Option<&SettlementError> {
        match self {
            Self::Committed(_) => None,
            Self::Aborted { error, .. } => Some(error),
        }
    }

    pub fn into_result(self) -> Result<CommitReceipt> {
        match self {
            Self::Committed(receipt) => Ok(receipt),
            Self::Aborted { error, .. } => Err(error),
        }
    }
}

/// Decoded instruction waiting for its context
trait PendingInstruction {
    fn run(self: Box<Self>, ctx: &mut Context<'_>) -> Result<()>;
}

impl<I: ProgramInstruction> PendingInstruction for I {
    fn run(self: Box<Self>, ctx: &mut Context<'_>) -> Result<()> {
        (*self).process(ctx)
    }
}

struct Route {
    name: &'static str,
    accounts: fn() -> BindingDescriptor,
    decode: fn(&[u8]) -> Result<Box<dyn PendingInstruction>>,
}

fn decode<I: ProgramInstruction>(params: &[u8]) -> Result<Box<dyn PendingInstruction>> {
    let instruction = I::try_from_slice(params).map_err(|err| {
        SettlementError::MalformedInstruction(format!("{} parameters: {err}", I::NAME))
    })?;
    Ok(Box::new(instruction))
}

struct Prepared {
    name: &'static str,
    instruction: Box<dyn PendingInstruction>,
    table: AccountTable,
    stack_height: usize,
    call_stack: Vec<Pubkey>,
}

pub struct Dispatcher {
    program_id: Pubkey,
    config: RuntimeConfig,
    routes: BTreeMap<[u8; DISCRIMINATOR_LEN], Route>,
}

impl Dispatcher {
    pub fn new(program_id: Pubkey, config: RuntimeConfig) -> Self {
        Self {
            program_id,
            config,
            routes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn register<I: ProgramInstruction>(mut self) -> Self {
        let previous = self.routes.insert(
            instruction_discriminator(I::NAME),
            Route {
                name: I::NAME,
                accounts: I::accounts,
                decode: decode::<I>,
            },
        );
        debug_assert!(previous.is_none(), "instruction {} registered twice", I::NAME);
        self
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run the invocation the ledger currently holds
    pub fn process(&self, ledger: &mut dyn Ledger) -> Outcome {
        let span = info_span!("invocation", program = %self.program_id);
        let _guard = span.enter();

        let prepared = match self.prepare(ledger) {
            Ok(prepared) => prepared,
            Err(error) => return abort(InvocationState::Dispatching, error),
        };
        let Prepared {
            name,
            instruction,
            table,
            stack_height,
            call_stack,
        } = prepared;
        debug!(instruction = name, state = %InvocationState::Executing, "running business logic");

        let mut ctx = Context::new(&self.config, &mut *ledger, table, stack_height, call_stack);
        let result = panic::catch_unwind(AssertUnwindSafe(|| instruction.run(&mut ctx)))
            .unwrap_or_else(|payload| Err(SettlementError::AssertionFailed(panic_message(&*payload))));
        let manager = CommitManager::new(ctx.into_table());

        if let Err(error) = result {
            manager.discard();
            return abort(InvocationState::Executing, error);
        }
        match manager.commit(ledger) {
            Ok(receipt) => {
                info!(instruction = name, written = receipt.written.len(), "committed");
                Outcome::Committed(receipt)
            }
            Err(error) => abort(InvocationState::Executing, error),
        }
    }

    fn prepare(&self, ledger: &mut dyn Ledger) -> Result<Prepared> {
        let raw = ledger.current_instruction()?;
        let executing = ledger.current_program_id();
        if raw.program_id != self.program_id || executing != self.program_id {
            return Err(SettlementError::MalformedInstruction(format!(
                "invocation addressed to {}, dispatcher serves {}",
                raw.program_id, self.program_id
            )));
        }
        validation::validate_instruction_data(&raw.data, self.config.max_instruction_data)?;
        if raw.accounts.len() > self.config.max_accounts {
            return Err(SettlementError::MalformedInstruction(format!(
                "{} accounts, limit is {}",
                raw.accounts.len(),
                self.config.max_accounts
            )));
        }
        if raw.stack_height > self.config.max_stack_height {
            return Err(SettlementError::CallDepthExceeded {
                height: raw.stack_height,
                max: self.config.max_stack_height,
            });
        }
        if raw.data.len() < DISCRIMINATOR_LEN {
            return Err(SettlementError::MalformedInstruction(format!(
                "{} bytes of instruction data, discriminator needs {DISCRIMINATOR_LEN}",
                raw.data.len()
            )));
        }

        let (discriminator, params) = raw.data.split_at(DISCRIMINATOR_LEN);
        let route = self.routes.get(discriminator).ok_or_else(|| {
            SettlementError::MalformedInstruction(format!(
                "unknown instruction discriminator {}",
                hex::encode(discriminator)
            ))
        })?;
        let instruction = (route.decode)(params)?;
        let descriptor = (route.accounts)();
        let table = AccountTable::bind(self.program_id, raw.accounts, &descriptor)?;

        Ok(Prepared {
            name: route.name,
            instruction,
            table,
            stack_height: raw.stack_height,
            call_stack: raw.call_stack,
        })
    }
}

fn abort(state: InvocationState, error: SettlementError) -> Outcome {
    warn!(%state, %error, "invocation aborted");
    Outcome::Aborted { state, error }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "business logic panicked".to_string())
}
