//! Escrow fixtures: a two-party market over the token doubles
#![allow(dead_code)]

use solana_program::{instruction::AccountMeta, pubkey::Pubkey, system_program};
use spl_token::state::Account as TokenAccount;
use valence_escrow::{dispatcher, Cancel, Exchange, Initialize, ESCROW_PDA_SEED, ID, VAULT_PDA_SEED};
use valence_settlement::{
    find_program_address, instruction_data, logging, MemoryLedger, Outcome, ProgramInstruction,
};
pub use valence_test_helpers::add_token_account;
use valence_test_helpers::{add_mint, install_token_programs, token_account};

// ================================
// Market
// ================================

pub const DEPOSIT: u64 = 100;
pub const OFFERED: u64 = 40;
pub const REQUESTED: u64 = 300;
pub const TAKER_HOLDING: u64 = 1_000;

/// Initializer holds mint A and wants mint B; the taker holds mint B
pub struct Market {
    pub ledger: MemoryLedger,
    pub initializer: Pubkey,
    pub taker: Pubkey,
    pub mint_a: Pubkey,
    pub mint_b: Pubkey,
    pub initializer_deposit: Pubkey,
    pub initializer_receive: Pubkey,
    pub taker_deposit: Pubkey,
    pub taker_receive: Pubkey,
    pub escrow: Pubkey,
    pub vault: Pubkey,
    pub vault_bump: u8,
    pub vault_authority: Pubkey,
    pub authority_bump: u8,
}

impl Market {
    pub fn new() -> Self {
        logging::init_tracing("warn");
        let mut ledger = MemoryLedger::new();
        ledger.deploy(ID);
        install_token_programs(&mut ledger);

        let initializer = Pubkey::new_unique();
        let taker = Pubkey::new_unique();
        ledger.fund(initializer, 2);
        ledger.fund(taker, 2);

        let mint_a = add_mint(&mut ledger, None, 1_000_000);
        let mint_b = add_mint(&mut ledger, None, 1_000_000);
        let initializer_deposit = add_token_account(&mut ledger, mint_a, initializer, DEPOSIT);
        let initializer_receive = add_token_account(&mut ledger, mint_b, initializer, 0);
        let taker_deposit = add_token_account(&mut ledger, mint_b, taker, TAKER_HOLDING);
        let taker_receive = add_token_account(&mut ledger, mint_a, taker, 0);

        let (vault, vault_bump) =
            find_program_address(&ID, &[VAULT_PDA_SEED]).expect("vault address");
        let (vault_authority, authority_bump) =
            find_program_address(&ID, &[ESCROW_PDA_SEED]).expect("authority address");

        Self {
            ledger,
            initializer,
            taker,
            mint_a,
            mint_b,
            initializer_deposit,
            initializer_receive,
            taker_deposit,
            taker_receive,
            escrow: Pubkey::new_unique(),
            vault,
            vault_bump,
            vault_authority,
            authority_bump,
        }
    }

    pub fn run<I: ProgramInstruction>(&mut self, instruction: &I, metas: &[AccountMeta]) -> Outcome {
        self.ledger
            .submit(ID, metas, instruction_data(instruction).expect("encodes"));
        dispatcher().process(&mut self.ledger)
    }

    pub fn initialize_metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.initializer, true),
            AccountMeta::new_readonly(self.mint_a, false),
            AccountMeta::new(self.vault, false),
            AccountMeta::new(self.initializer_deposit, false),
            AccountMeta::new_readonly(self.initializer_receive, false),
            AccountMeta::new(self.escrow, true),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(spl_token::ID, false),
        ]
    }

    pub fn initialize(&mut self) -> Outcome {
        let instruction = Initialize {
            vault_bump: self.vault_bump,
            initializer_amount: OFFERED,
            taker_amount: REQUESTED,
        };
        let metas = self.initialize_metas();
        self.run(&instruction, &metas)
    }

    pub fn exchange_metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new_readonly(self.taker, true),
            AccountMeta::new(self.taker_deposit, false),
            AccountMeta::new(self.taker_receive, false),
            AccountMeta::new(self.initializer, false),
            AccountMeta::new(self.initializer_deposit, false),
            AccountMeta::new(self.initializer_receive, false),
            AccountMeta::new(self.escrow, false),
            AccountMeta::new(self.vault, false),
            AccountMeta::new_readonly(self.vault_authority, false),
            AccountMeta::new_readonly(spl_token::ID, false),
        ]
    }

    pub fn exchange(&mut self, metas: &[AccountMeta]) -> Outcome {
        let instruction = Exchange {
            authority_bump: self.authority_bump,
        };
        self.run(&instruction, metas)
    }

    pub fn cancel_metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.initializer, true),
            AccountMeta::new(self.initializer_deposit, false),
            AccountMeta::new(self.vault, false),
            AccountMeta::new_readonly(self.vault_authority, false),
            AccountMeta::new(self.escrow, false),
            AccountMeta::new_readonly(spl_token::ID, false),
        ]
    }

    pub fn cancel(&mut self, authority_bump: u8) -> Outcome {
        let metas = self.cancel_metas();
        self.run(&Cancel { authority_bump }, &metas)
    }

    pub fn token(&self, key: &Pubkey) -> TokenAccount {
        token_account(&self.ledger, key).expect("initialized token account")
    }
}
