//! Token Program bindings
//!
//! Thin builders over `spl-token` and `spl-associated-token-account`
//! instructions. Every call goes through [`Context::invoke_instruction`], so
//! the usual privilege attenuation and signer-seed rules apply. Account
//! arguments are table positions; each instruction's accounts, the Token
//! Program and (for account creation) the System Program must all be present
//! in the invocation.

use crate::dispatcher::Context;
use crate::errors::{Result, SettlementError};
use crate::pda::SignerSeeds;
use crate::state::AccountHandle;
use solana_program::{
    instruction::Instruction, program_error::ProgramError, program_pack::Pack, pubkey::Pubkey,
    system_instruction,
};
use spl_associated_token_account::{
    get_associated_token_address_with_program_id,
    instruction::{create_associated_token_account, create_associated_token_account_idempotent},
};
use spl_token::{
    instruction::AuthorityType,
    state::{Account, Mint},
};
use tracing::debug;

pub use spl_token::ID as TOKEN_PROGRAM_ID;

/// Map the wire code of an authority kind
pub fn authority_type(code: u8) -> Result<AuthorityType> {
    match code {
        0 => Ok(AuthorityType::MintTokens),
        1 => Ok(AuthorityType::FreezeAccount),
        2 => Ok(AuthorityType::AccountOwner),
        3 => Ok(AuthorityType::CloseAccount),
        other => Err(SettlementError::MalformedInstruction(format!(
            "unknown authority type {other}"
        ))),
    }
}

fn built(result: std::result::Result<Instruction, ProgramError>) -> Result<Instruction> {
    result.map_err(|err| SettlementError::MalformedInstruction(format!("token instruction: {err}")))
}

fn key_at(ctx: &Context<'_>, index: usize) -> Result<Pubkey> {
    Ok(*ctx.account_at(index)?.key())
}

// ================================
// Account Lifecycle
// ================================

/// Create a token account at `account` for `mint`, owned by `wallet`
///
/// `payer` funds the rent-exempt balance. `signer_seeds` authorize the new
/// account when it is a program-derived address.
pub fn create_and_init_account(
    ctx: &mut Context<'_>,
    payer: usize,
    account: usize,
    mint: usize,
    wallet: &Pubkey,
    signer_seeds: &[SignerSeeds],
) -> Result<()> {
    let payer_key = key_at(ctx, payer)?;
    let account_key = key_at(ctx, account)?;
    let mint_key = key_at(ctx, mint)?;
    let lamports = ctx.minimum_balance(Account::LEN);

    let create = system_instruction::create_account(
        &payer_key,
        &account_key,
        lamports,
        Account::LEN as u64,
        &TOKEN_PROGRAM_ID,
    );
    ctx.invoke_instruction(&create, signer_seeds)?;

    let initialize = built(spl_token::instruction::initialize_account3(
        &TOKEN_PROGRAM_ID,
        &account_key,
        &mint_key,
        wallet,
    ))?;
    ctx.invoke_instruction(&initialize, &[])?;
    debug!(account = %account_key, mint = %mint_key, owner = %wallet, "token account created");
    Ok(())
}

/// Close `account`, sending its lamports to `destination`
pub fn close_account(
    ctx: &mut Context<'_>,
    account: usize,
    destination: usize,
    authority: usize,
    signer_seeds: &[SignerSeeds],
) -> Result<()> {
    let instruction = built(spl_token::instruction::close_account(
        &TOKEN_PROGRAM_ID,
        &key_at(ctx, account)?,
        &key_at(ctx, destination)?,
        &key_at(ctx, authority)?,
        &[],
    ))?;
    ctx.invoke_instruction(&instruction, signer_seeds)
}

/// Replace (or clear, with `None`) an authority of an account or mint
pub fn set_authority(
    ctx: &mut Context<'_>,
    account_or_mint: usize,
    current_authority: usize,
    new_authority: Option<&Pubkey>,
    kind: AuthorityType,
    signer_seeds: &[SignerSeeds],
) -> Result<()> {
    let instruction = built(spl_token::instruction::set_authority(
        &TOKEN_PROGRAM_ID,
        &key_at(ctx, account_or_mint)?,
        new_authority,
        kind,
        &key_at(ctx, current_authority)?,
        &[],
    ))?;
    ctx.invoke_instruction(&instruction, signer_seeds)
}

// ================================
// Balances
// ================================

pub fn transfer(
    ctx: &mut Context<'_>,
    from: usize,
    to: usize,
    authority: usize,
    amount: u64,
    signer_seeds: &[SignerSeeds],
) -> Result<()> {
    let instruction = built(spl_token::instruction::transfer(
        &TOKEN_PROGRAM_ID,
        &key_at(ctx, from)?,
        &key_at(ctx, to)?,
        &key_at(ctx, authority)?,
        &[],
        amount,
    ))?;
    ctx.invoke_instruction(&instruction, signer_seeds)
}

pub fn mint_to(
    ctx: &mut Context<'_>,
    mint: usize,
    destination: usize,
    authority: usize,
    amount: u64,
    signer_seeds: &[SignerSeeds],
) -> Result<()> {
    let instruction = built(spl_token::instruction::mint_to(
        &TOKEN_PROGRAM_ID,
        &key_at(ctx, mint)?,
        &key_at(ctx, destination)?,
        &key_at(ctx, authority)?,
        &[],
        amount,
    ))?;
    ctx.invoke_instruction(&instruction, signer_seeds)
}

pub fn burn(
    ctx: &mut Context<'_>,
    account: usize,
    mint: usize,
    authority: usize,
    amount: u64,
    signer_seeds: &[SignerSeeds],
) -> Result<()> {
    let instruction = built(spl_token::instruction::burn(
        &TOKEN_PROGRAM_ID,
        &key_at(ctx, account)?,
        &key_at(ctx, mint)?,
        &key_at(ctx, authority)?,
        &[],
        amount,
    ))?;
    ctx.invoke_instruction(&instruction, signer_seeds)
}

/// Create the associated token account of `wallet` for `mint`
///
/// With `idempotent` an existing, matching account is accepted.
pub fn create_associated_account(
    ctx: &mut Context<'_>,
    payer: usize,
    associated: usize,
    wallet: usize,
    mint: usize,
    idempotent: bool,
    signer_seeds: &[SignerSeeds],
) -> Result<()> {
    let payer_key = key_at(ctx, payer)?;
    let wallet_key = key_at(ctx, wallet)?;
    let mint_key = key_at(ctx, mint)?;
    let expected =
        get_associated_token_address_with_program_id(&wallet_key, &mint_key, &TOKEN_PROGRAM_ID);
    let associated_key = key_at(ctx, associated)?;
    if associated_key != expected {
        return Err(SettlementError::AssertionFailed(format!(
            "{associated_key} is not the associated token account of {wallet_key} for {mint_key}"
        )));
    }

    let instruction = if idempotent {
        create_associated_token_account_idempotent(
            &payer_key,
            &wallet_key,
            &mint_key,
            &TOKEN_PROGRAM_ID,
        )
    } else {
        create_associated_token_account(&payer_key, &wallet_key, &mint_key, &TOKEN_PROGRAM_ID)
    };
    ctx.invoke_instruction(&instruction, signer_seeds)
}

// ================================
// Unpacking
// ================================

fn token_owned(handle: &AccountHandle) -> Result<&[u8]> {
    if *handle.owner() != TOKEN_PROGRAM_ID {
        return Err(SettlementError::schema(
            handle.index(),
            format!("owned by {}, not the token program", handle.owner()),
        ));
    }
    Ok(handle.raw_data())
}

pub fn unpack_mint(handle: &AccountHandle) -> Result<Mint> {
    Mint::unpack(token_owned(handle)?)
        .map_err(|err| SettlementError::schema(handle.index(), format!("mint: {err}")))
}

pub fn unpack_account(handle: &AccountHandle) -> Result<Account> {
    Account::unpack(token_owned(handle)?)
        .map_err(|err| SettlementError::schema(handle.index(), format!("token account: {err}")))
}
