//! Swap fixtures: one pool over two fresh mints, a depositor and a trader
#![allow(dead_code)]

use solana_program::{instruction::AccountMeta, pubkey::Pubkey, system_program};
use spl_associated_token_account::get_associated_token_address;
use spl_token::state::{Account as TokenAccount, Mint};
use valence_settlement::{
    find_program_address, instruction_data, logging, MemoryLedger, Outcome, ProgramInstruction,
};
use valence_swap::{
    dispatcher, ClosePool, CreatePool, Deposit, Trade, Withdraw, ID, LP_MINT_AUTH_PDA_SEED,
    VAULT_AUTH_PDA_SEED,
};
use valence_test_helpers::{add_mint, add_token_account, install_token_programs, mint, token_account};

pub const DEPOSITOR_A: u64 = 10_000;
pub const DEPOSITOR_B: u64 = 40_000;
pub const TRADER_A: u64 = 5_000;

pub struct Pool {
    pub ledger: MemoryLedger,
    pub creator: Pubkey,
    pub depositor: Pubkey,
    pub trader: Pubkey,
    pub mint_a: Pubkey,
    pub mint_b: Pubkey,
    pub mint_liquidity: Pubkey,
    pub token_a_vault: Pubkey,
    pub token_b_vault: Pubkey,
    pub pool_info: Pubkey,
    pub depositor_a: Pubkey,
    pub depositor_b: Pubkey,
    pub depositor_liquidity: Pubkey,
    pub trader_a: Pubkey,
    pub trader_b: Pubkey,
    pub vault_authority: Pubkey,
    pub vault_auth_bump: u8,
    pub mint_lp_auth: Pubkey,
    pub mint_auth_bump: u8,
}

impl Pool {
    pub fn new() -> Self {
        logging::init_tracing("warn");
        let mut ledger = MemoryLedger::new();
        ledger.deploy(ID);
        install_token_programs(&mut ledger);

        let creator = Pubkey::new_unique();
        let depositor = Pubkey::new_unique();
        let trader = Pubkey::new_unique();
        for wallet in [creator, depositor, trader] {
            ledger.fund(wallet, 2);
        }

        let mint_a = add_mint(&mut ledger, None, 1_000_000);
        let mint_b = add_mint(&mut ledger, None, 1_000_000);
        let mint_liquidity = add_mint(&mut ledger, Some(creator), 0);
        let depositor_a = add_token_account(&mut ledger, mint_a, depositor, DEPOSITOR_A);
        let depositor_b = add_token_account(&mut ledger, mint_b, depositor, DEPOSITOR_B);
        let trader_a = add_token_account(&mut ledger, mint_a, trader, TRADER_A);
        let trader_b = add_token_account(&mut ledger, mint_b, trader, 0);

        let (vault_authority, vault_auth_bump) =
            find_program_address(&ID, &[VAULT_AUTH_PDA_SEED]).expect("vault authority");
        let (mint_lp_auth, mint_auth_bump) =
            find_program_address(&ID, &[LP_MINT_AUTH_PDA_SEED]).expect("mint authority");

        Self {
            ledger,
            creator,
            depositor,
            trader,
            mint_a,
            mint_b,
            mint_liquidity,
            token_a_vault: Pubkey::new_unique(),
            token_b_vault: Pubkey::new_unique(),
            pool_info: Pubkey::new_unique(),
            depositor_a,
            depositor_b,
            depositor_liquidity: get_associated_token_address(&depositor, &mint_liquidity),
            trader_a,
            trader_b,
            vault_authority,
            vault_auth_bump,
            mint_lp_auth,
            mint_auth_bump,
        }
    }

    pub fn run<I: ProgramInstruction>(&mut self, instruction: &I, metas: &[AccountMeta]) -> Outcome {
        self.ledger
            .submit(ID, metas, instruction_data(instruction).expect("encodes"));
        dispatcher().process(&mut self.ledger)
    }

    pub fn create_pool_metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.creator, true),
            AccountMeta::new_readonly(self.mint_a, false),
            AccountMeta::new_readonly(self.mint_b, false),
            AccountMeta::new(self.mint_liquidity, false),
            AccountMeta::new(self.token_a_vault, true),
            AccountMeta::new(self.token_b_vault, true),
            AccountMeta::new(self.pool_info, true),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(spl_token::ID, false),
        ]
    }

    pub fn create_pool(&mut self) -> Outcome {
        let metas = self.create_pool_metas();
        self.run(&CreatePool {}, &metas)
    }

    pub fn deposit_with_bump(&mut self, amount_a: u64, amount_b: u64, mint_auth_bump: u8) -> Outcome {
        let metas = [
            AccountMeta::new(self.depositor, true),
            AccountMeta::new(self.mint_liquidity, false),
            AccountMeta::new_readonly(self.mint_lp_auth, false),
            AccountMeta::new(self.depositor_a, false),
            AccountMeta::new(self.depositor_b, false),
            AccountMeta::new(self.depositor_liquidity, false),
            AccountMeta::new(self.token_a_vault, false),
            AccountMeta::new(self.token_b_vault, false),
            AccountMeta::new_readonly(self.pool_info, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(spl_token::ID, false),
            AccountMeta::new_readonly(spl_associated_token_account::ID, false),
        ];
        let instruction = Deposit {
            amount_a,
            amount_b,
            mint_auth_bump,
        };
        self.run(&instruction, &metas)
    }

    pub fn deposit(&mut self, amount_a: u64, amount_b: u64) -> Outcome {
        let bump = self.mint_auth_bump;
        self.deposit_with_bump(amount_a, amount_b, bump)
    }

    pub fn trade(&mut self, amount_a: u64, expected_amount_b: u64) -> Outcome {
        let metas = [
            AccountMeta::new(self.trader, true),
            AccountMeta::new(self.trader_a, false),
            AccountMeta::new(self.trader_b, false),
            AccountMeta::new(self.token_a_vault, false),
            AccountMeta::new(self.token_b_vault, false),
            AccountMeta::new_readonly(self.vault_authority, false),
            AccountMeta::new_readonly(self.pool_info, false),
            AccountMeta::new_readonly(spl_token::ID, false),
        ];
        let instruction = Trade {
            amount_a,
            expected_amount_b,
            vault_auth_bump: self.vault_auth_bump,
        };
        self.run(&instruction, &metas)
    }

    pub fn withdraw(&mut self, amount: u64) -> Outcome {
        let metas = [
            AccountMeta::new(self.depositor, true),
            AccountMeta::new(self.mint_liquidity, false),
            AccountMeta::new(self.depositor_a, false),
            AccountMeta::new(self.depositor_b, false),
            AccountMeta::new(self.depositor_liquidity, false),
            AccountMeta::new(self.token_a_vault, false),
            AccountMeta::new(self.token_b_vault, false),
            AccountMeta::new_readonly(self.vault_authority, false),
            AccountMeta::new_readonly(self.pool_info, false),
            AccountMeta::new_readonly(spl_token::ID, false),
        ];
        let instruction = Withdraw {
            amount,
            vault_auth_bump: self.vault_auth_bump,
        };
        self.run(&instruction, &metas)
    }

    pub fn close_pool(&mut self) -> Outcome {
        let metas = [
            AccountMeta::new(self.creator, true),
            AccountMeta::new(self.token_a_vault, false),
            AccountMeta::new(self.token_b_vault, false),
            AccountMeta::new_readonly(self.vault_authority, false),
            AccountMeta::new_readonly(self.pool_info, false),
            AccountMeta::new_readonly(spl_token::ID, false),
        ];
        let instruction = ClosePool {
            vault_auth_bump: self.vault_auth_bump,
        };
        self.run(&instruction, &metas)
    }

    pub fn token(&self, key: &Pubkey) -> TokenAccount {
        token_account(&self.ledger, key).expect("initialized token account")
    }

    pub fn liquidity_mint(&self) -> Mint {
        mint(&self.ledger, &self.mint_liquidity).expect("initialized mint")
    }

    /// Balances of both vaults
    pub fn reserves(&self) -> (u64, u64) {
        (
            self.token(&self.token_a_vault).amount,
            self.token(&self.token_b_vault).amount,
        )
    }
}
