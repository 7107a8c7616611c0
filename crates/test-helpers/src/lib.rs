//! Token program doubles and ledger fixtures for contract tests
//!
//! [`token_program`] and [`associated_token_program`] run inside the
//! `MemoryLedger` as native programs, so contracts issue genuine `spl-token`
//! and associated-token-account instructions and observe packed `spl-token`
//! state. They implement the instructions the contracts in this workspace
//! send, with the authority and balance checks of the real programs.

use solana_program::{
    instruction::Instruction,
    program_error::ProgramError,
    program_option::COption,
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    system_program,
};
use spl_associated_token_account::get_associated_token_address_with_program_id;
use spl_token::{
    instruction::{AuthorityType, TokenInstruction},
    state::{Account as TokenAccount, AccountState as TokenAccountState, Mint},
};
use tracing::trace;
use valence_settlement::{
    host::memory::{account_position, meta_key},
    AccountState, HostError, Ledger, MemoryLedger,
};

/// Deploy both token programs into `ledger`
pub fn install_token_programs(ledger: &mut MemoryLedger) {
    ledger.register_native(spl_token::ID, token_program);
    ledger.register_native(spl_associated_token_account::ID, associated_token_program);
}

// ================================
// Token Program
// ================================

pub fn token_program(
    instruction: &Instruction,
    accounts: &mut [AccountState],
    signers: &[Pubkey],
) -> Result<(), HostError> {
    let decoded = TokenInstruction::unpack(&instruction.data)?;
    trace!(instruction = ?decoded, "token program");
    match decoded {
        TokenInstruction::InitializeAccount3 { owner } => {
            let account = account_position(accounts, &meta_key(instruction, 0)?)?;
            let mint_key = meta_key(instruction, 1)?;
            let mint = account_position(accounts, &mint_key)?;
            Mint::unpack(&accounts[mint].data)?;

            let state = &mut accounts[account];
            if state.owner != spl_token::ID {
                return Err(ProgramError::IncorrectProgramId.into());
            }
            if TokenAccount::unpack(&state.data).is_ok() {
                return Err(ProgramError::AccountAlreadyInitialized.into());
            }
            initialized_account(mint_key, owner, 0).pack_into_slice(&mut state.data);
        }
        TokenInstruction::Transfer { amount } => {
            let source = account_position(accounts, &meta_key(instruction, 0)?)?;
            let destination = account_position(accounts, &meta_key(instruction, 1)?)?;
            let authority = meta_key(instruction, 2)?;
            let mut from = TokenAccount::unpack(&accounts[source].data)?;
            let mut to = TokenAccount::unpack(&accounts[destination].data)?;
            require_authority(&COption::Some(from.owner), &authority, signers)?;
            if from.mint != to.mint {
                return Err(ProgramError::InvalidAccountData.into());
            }

            if source != destination {
                from.amount = debit(from.amount, amount)?;
                to.amount = credit(to.amount, amount)?;
                TokenAccount::pack(to, &mut accounts[destination].data)?;
            }
            TokenAccount::pack(from, &mut accounts[source].data)?;
        }
        TokenInstruction::MintTo { amount } => {
            let mint_key = meta_key(instruction, 0)?;
            let mint = account_position(accounts, &mint_key)?;
            let destination = account_position(accounts, &meta_key(instruction, 1)?)?;
            let authority = meta_key(instruction, 2)?;
            let mut state = Mint::unpack(&accounts[mint].data)?;
            let mut to = TokenAccount::unpack(&accounts[destination].data)?;
            require_authority(&state.mint_authority, &authority, signers)?;
            if to.mint != mint_key {
                return Err(ProgramError::InvalidAccountData.into());
            }

            state.supply = credit(state.supply, amount)?;
            to.amount = credit(to.amount, amount)?;
            Mint::pack(state, &mut accounts[mint].data)?;
            TokenAccount::pack(to, &mut accounts[destination].data)?;
        }
        TokenInstruction::Burn { amount } => {
            let account = account_position(accounts, &meta_key(instruction, 0)?)?;
            let mint_key = meta_key(instruction, 1)?;
            let mint = account_position(accounts, &mint_key)?;
            let authority = meta_key(instruction, 2)?;
            let mut from = TokenAccount::unpack(&accounts[account].data)?;
            let mut state = Mint::unpack(&accounts[mint].data)?;
            require_authority(&COption::Some(from.owner), &authority, signers)?;
            if from.mint != mint_key {
                return Err(ProgramError::InvalidAccountData.into());
            }

            from.amount = debit(from.amount, amount)?;
            state.supply = debit(state.supply, amount)?;
            TokenAccount::pack(from, &mut accounts[account].data)?;
            Mint::pack(state, &mut accounts[mint].data)?;
        }
        TokenInstruction::SetAuthority {
            authority_type,
            new_authority,
        } => {
            let target = account_position(accounts, &meta_key(instruction, 0)?)?;
            let current = meta_key(instruction, 1)?;
            let data = &mut accounts[target].data;
            if data.len() == Mint::LEN {
                let mut mint = Mint::unpack(data)?;
                let slot = match authority_type {
                    AuthorityType::MintTokens => &mut mint.mint_authority,
                    AuthorityType::FreezeAccount => &mut mint.freeze_authority,
                    _ => return Err(ProgramError::InvalidArgument.into()),
                };
                require_authority(slot, &current, signers)?;
                *slot = new_authority;
                Mint::pack(mint, data)?;
            } else {
                let mut token = TokenAccount::unpack(data)?;
                match authority_type {
                    AuthorityType::AccountOwner => {
                        require_authority(&COption::Some(token.owner), &current, signers)?;
                        token.owner = new_authority
                            .ok_or(HostError::from(ProgramError::InvalidArgument))?;
                        token.close_authority = COption::None;
                    }
                    AuthorityType::CloseAccount => {
                        let holder = token.close_authority.or(COption::Some(token.owner));
                        require_authority(&holder, &current, signers)?;
                        token.close_authority = new_authority;
                    }
                    _ => return Err(ProgramError::InvalidArgument.into()),
                }
                TokenAccount::pack(token, data)?;
            }
        }
        TokenInstruction::CloseAccount => {
            let account = account_position(accounts, &meta_key(instruction, 0)?)?;
            let destination = account_position(accounts, &meta_key(instruction, 1)?)?;
            let authority = meta_key(instruction, 2)?;
            let token = TokenAccount::unpack(&accounts[account].data)?;
            let holder = token.close_authority.or(COption::Some(token.owner));
            require_authority(&holder, &authority, signers)?;
            if token.amount != 0 {
                return Err(ProgramError::InvalidAccountData.into());
            }

            let lamports = std::mem::take(&mut accounts[account].lamports);
            accounts[destination].lamports = credit(accounts[destination].lamports, lamports)?;
            accounts[account].data.clear();
            accounts[account].owner = system_program::id();
        }
        _ => return Err(ProgramError::InvalidInstructionData.into()),
    }
    Ok(())
}

fn require_authority(
    holder: &COption<Pubkey>,
    authority: &Pubkey,
    signers: &[Pubkey],
) -> Result<(), HostError> {
    if !signers.contains(authority) {
        return Err(ProgramError::MissingRequiredSignature.into());
    }
    if *holder != COption::Some(*authority) {
        return Err(ProgramError::IllegalOwner.into());
    }
    Ok(())
}

fn debit(balance: u64, amount: u64) -> Result<u64, HostError> {
    balance
        .checked_sub(amount)
        .ok_or_else(|| ProgramError::InsufficientFunds.into())
}

fn credit(balance: u64, amount: u64) -> Result<u64, HostError> {
    balance
        .checked_add(amount)
        .ok_or_else(|| ProgramError::ArithmeticOverflow.into())
}

fn initialized_account(mint: Pubkey, owner: Pubkey, amount: u64) -> TokenAccount {
    TokenAccount {
        mint,
        owner,
        amount,
        state: TokenAccountState::Initialized,
        ..TokenAccount::default()
    }
}

// ================================
// Associated Token Account Program
// ================================

/// Create (or, idempotently, accept) the associated account of a wallet
pub fn associated_token_program(
    instruction: &Instruction,
    accounts: &mut [AccountState],
    signers: &[Pubkey],
) -> Result<(), HostError> {
    let idempotent = match instruction.data.first() {
        None | Some(0) => false,
        Some(1) => true,
        Some(_) => return Err(ProgramError::InvalidInstructionData.into()),
    };
    let payer_key = meta_key(instruction, 0)?;
    let associated_key = meta_key(instruction, 1)?;
    let wallet = meta_key(instruction, 2)?;
    let mint_key = meta_key(instruction, 3)?;
    if !signers.contains(&payer_key) {
        return Err(ProgramError::MissingRequiredSignature.into());
    }
    if associated_key != get_associated_token_address_with_program_id(&wallet, &mint_key, &spl_token::ID) {
        return Err(ProgramError::InvalidSeeds.into());
    }

    let payer = account_position(accounts, &payer_key)?;
    let associated = account_position(accounts, &associated_key)?;
    let mint = account_position(accounts, &mint_key)?;
    Mint::unpack(&accounts[mint].data)?;

    if !accounts[associated].is_vacant() {
        let existing = TokenAccount::unpack(&accounts[associated].data);
        let matches = accounts[associated].owner == spl_token::ID
            && existing.is_ok_and(|token| token.owner == wallet && token.mint == mint_key);
        if idempotent && matches {
            return Ok(());
        }
        return Err(ProgramError::AccountAlreadyInitialized.into());
    }

    let rent = Rent::default().minimum_balance(TokenAccount::LEN);
    accounts[payer].lamports = debit(accounts[payer].lamports, rent)?;
    let state = &mut accounts[associated];
    state.lamports = rent;
    state.owner = spl_token::ID;
    state.data = vec![0; TokenAccount::LEN];
    initialized_account(mint_key, wallet, 0).pack_into_slice(&mut state.data);
    Ok(())
}

// ================================
// Fixtures
// ================================

/// Rent-exempt mint with the given authority and supply
pub fn add_mint(ledger: &mut MemoryLedger, mint_authority: Option<Pubkey>, supply: u64) -> Pubkey {
    let key = Pubkey::new_unique();
    let mint = Mint {
        mint_authority: mint_authority.into(),
        supply,
        decimals: 0,
        is_initialized: true,
        freeze_authority: COption::None,
    };
    let mut data = vec![0; Mint::LEN];
    mint.pack_into_slice(&mut data);
    let lamports = ledger.minimum_balance(Mint::LEN);
    ledger.add_account(AccountState::new(key, lamports, 0, spl_token::ID).with_data(data));
    key
}

/// Rent-exempt token account of `owner` holding `amount` of `mint`
pub fn add_token_account(ledger: &mut MemoryLedger, mint: Pubkey, owner: Pubkey, amount: u64) -> Pubkey {
    let key = Pubkey::new_unique();
    let mut data = vec![0; TokenAccount::LEN];
    initialized_account(mint, owner, amount).pack_into_slice(&mut data);
    let lamports = ledger.minimum_balance(TokenAccount::LEN);
    ledger.add_account(AccountState::new(key, lamports, 0, spl_token::ID).with_data(data));
    key
}

/// Token account stored at `key`, if it is one
pub fn token_account(ledger: &MemoryLedger, key: &Pubkey) -> Option<TokenAccount> {
    ledger
        .account(key)
        .and_then(|state| TokenAccount::unpack(&state.data).ok())
}

pub fn mint(ledger: &MemoryLedger, key: &Pubkey) -> Option<Mint> {
    ledger
        .account(key)
        .and_then(|state| Mint::unpack(&state.data).ok())
}
