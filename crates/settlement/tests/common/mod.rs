//! Shared fixtures: a small program exercising every settlement path
#![allow(dead_code)]

use solana_program::{
    instruction::AccountMeta, system_instruction, system_program,
};
use valence_settlement::prelude::*;
use valence_settlement::{
    instruction_data, schema::DISCRIMINATOR_LEN, AccountState, Ledger, MemoryLedger,
};

pub const PROGRAM_ID: Pubkey = Pubkey::new_from_array([42u8; 32]);
pub const VAULT_SEED: &str = "vault";

// ================================
// Records
// ================================

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub value: u64,
    pub note: String,
}

impl AccountSchema for Record {
    const NAME: &'static str = "Record";
    const SPACE: usize = DISCRIMINATOR_LEN + 8 + 4 + 24;
}

// ================================
// Instructions
// ================================

/// Overwrite the three records in the given position order
#[derive(BorshSerialize, BorshDeserialize)]
pub struct Stamp {
    pub order: Vec<u8>,
    pub value: u64,
    pub fail: bool,
}

impl ProgramInstruction for Stamp {
    const NAME: &'static str = "stamp";

    fn accounts() -> BindingDescriptor {
        BindingDescriptor::new(Self::NAME)
            .data_account::<Record>("first", Access::WRITABLE)
            .data_account::<Record>("second", Access::WRITABLE)
            .data_account::<Record>("third", Access::WRITABLE)
    }

    fn process(self, ctx: &mut Context<'_>) -> Result<()> {
        for index in self.order {
            let record = Record {
                value: self.value,
                note: format!("stamped {index}"),
            };
            ctx.account_at_mut(usize::from(index))?.save_data(&record)?;
        }
        require!(!self.fail, SettlementError::Custom(7));
        Ok(())
    }
}

/// Create a record account and read it back before returning
#[derive(BorshSerialize, BorshDeserialize)]
pub struct Open {
    pub value: u64,
}

impl ProgramInstruction for Open {
    const NAME: &'static str = "open";

    fn accounts() -> BindingDescriptor {
        BindingDescriptor::new(Self::NAME)
            .account("payer", Access::WRITABLE_SIGNER)
            .init_account::<Record>("record", Access::WRITABLE_SIGNER)
    }

    fn process(self, ctx: &mut Context<'_>) -> Result<()> {
        let program_id = *ctx.program_id();
        ctx.create_account("payer", "record", Record::SPACE, &program_id, None)?;
        let record = Record {
            value: self.value,
            note: "opened".to_string(),
        };
        let account = ctx.account_mut("record")?;
        account.save_data(&record)?;
        require!(account.data::<Record>()? == record);
        Ok(())
    }
}

/// Pay lamports out of the program's vault address
#[derive(BorshSerialize, BorshDeserialize)]
pub struct Pay {
    pub amount: u64,
    pub bump: u8,
}

impl ProgramInstruction for Pay {
    const NAME: &'static str = "pay";

    fn accounts() -> BindingDescriptor {
        BindingDescriptor::new(Self::NAME)
            .account("vault", Access::WRITABLE)
            .account("recipient", Access::READONLY)
            .program("system_program")
    }

    fn process(self, ctx: &mut Context<'_>) -> Result<()> {
        let transfer = system_instruction::transfer(
            &ctx.key_of("vault")?,
            &ctx.key_of("recipient")?,
            self.amount,
        );
        ctx.invoke_instruction(&transfer, &[SignerSeeds::new([VAULT_SEED], self.bump)])
    }
}

/// Call back into the executing program
#[derive(BorshSerialize, BorshDeserialize)]
pub struct Recurse {}

impl ProgramInstruction for Recurse {
    const NAME: &'static str = "recurse";

    fn accounts() -> BindingDescriptor {
        BindingDescriptor::new(Self::NAME).program("self_program")
    }

    fn process(self, ctx: &mut Context<'_>) -> Result<()> {
        let program_id = *ctx.program_id();
        let data = instruction_data(&Recurse {})?;
        ctx.invoke(&program_id, &[AccountRef::readonly(0)], &[], &data)
    }
}

pub fn dispatcher() -> Dispatcher {
    Dispatcher::new(PROGRAM_ID, RuntimeConfig::default())
        .register::<Stamp>()
        .register::<Open>()
        .register::<Pay>()
        .register::<Recurse>()
}

// ================================
// Ledger Setup
// ================================

pub fn ledger() -> MemoryLedger {
    valence_settlement::logging::init_tracing("warn");
    let mut ledger = MemoryLedger::new();
    ledger.deploy(PROGRAM_ID);
    ledger
}

pub fn run<I: ProgramInstruction>(
    ledger: &mut MemoryLedger,
    instruction: &I,
    metas: &[AccountMeta],
) -> Outcome {
    ledger.submit(PROGRAM_ID, metas, instruction_data(instruction).unwrap());
    dispatcher().process(ledger)
}

/// Program-owned account holding an encoded record
pub fn add_record(ledger: &mut MemoryLedger, value: u64) -> Pubkey {
    let key = Pubkey::new_unique();
    let data = Record::schema()
        .encode(
            &Record {
                value,
                note: String::new(),
            },
            Record::SPACE,
        )
        .unwrap();
    let lamports = ledger.minimum_balance(Record::SPACE);
    ledger.add_account(AccountState::new(key, lamports, 0, PROGRAM_ID).with_data(data));
    key
}

pub fn read_record(ledger: &MemoryLedger, key: &Pubkey) -> Record {
    let state = ledger.account(key).expect("record exists");
    Record::schema().decode(&state.data).unwrap()
}

/// The vault address, funded with `lamports`
pub fn add_vault(ledger: &mut MemoryLedger, lamports: u64) -> (Pubkey, u8) {
    let (vault, bump) = valence_settlement::find_program_address(&PROGRAM_ID, &[VAULT_SEED]).unwrap();
    ledger.add_account(AccountState::system(vault, lamports));
    (vault, bump)
}

pub fn pay_metas(vault: Pubkey, recipient: Pubkey, recipient_writable: bool) -> Vec<AccountMeta> {
    let recipient = if recipient_writable {
        AccountMeta::new(recipient, false)
    } else {
        AccountMeta::new_readonly(recipient, false)
    };
    vec![
        AccountMeta::new(vault, false),
        recipient,
        AccountMeta::new_readonly(system_program::id(), false),
    ]
}
