//! Greeter
//!
//! `init` creates a greeting account for a user and records the user as its
//! authority; `greet` bumps the counter, but only for that authority.

use valence_settlement::prelude::*;
use valence_settlement::schema::DISCRIMINATOR_LEN;

solana_program::declare_id!("2MN4WqVasf3taDzxaBgRgdCFF5YLhkug5B4s9G9yGaCn");

/// Bytes allocated for a greeting account
pub const GREETING_SPACE: usize = 512;

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct GreetingAccount {
    /// Only this key may greet through the account
    pub authority: Pubkey,
    pub greet_count: u64,
}

impl AccountSchema for GreetingAccount {
    const NAME: &'static str = "GreetingAccount";
    const SPACE: usize = GREETING_SPACE;
}

const _: () = assert!(DISCRIMINATOR_LEN + 32 + 8 <= GREETING_SPACE);

// ================================
// Instructions
// ================================

#[derive(BorshSerialize, BorshDeserialize, Debug)]
pub struct Init {
    pub initial_count: u64,
}

impl ProgramInstruction for Init {
    const NAME: &'static str = "init";

    fn accounts() -> BindingDescriptor {
        BindingDescriptor::new(Self::NAME)
            .account("user", Access::WRITABLE_SIGNER)
            .init_account::<GreetingAccount>("greeting", Access::WRITABLE_SIGNER)
            .program("system_program")
    }

    fn process(self, ctx: &mut Context<'_>) -> Result<()> {
        ctx.create_account("user", "greeting", GreetingAccount::SPACE, &crate::ID, None)?;
        let greeting = GreetingAccount {
            authority: ctx.key_of("user")?,
            greet_count: self.initial_count,
        };
        ctx.account_mut("greeting")?.save_data(&greeting)
    }
}

#[derive(BorshSerialize, BorshDeserialize, Debug)]
pub struct Greet {
    pub names: Vec<String>,
}

impl ProgramInstruction for Greet {
    const NAME: &'static str = "greet";

    fn accounts() -> BindingDescriptor {
        BindingDescriptor::new(Self::NAME)
            .account("user", Access::SIGNER)
            .data_account::<GreetingAccount>("greeting", Access::WRITABLE)
    }

    fn process(self, ctx: &mut Context<'_>) -> Result<()> {
        let user = ctx.key_of("user")?;
        let mut greeting: GreetingAccount = ctx.account("greeting")?.data()?;
        require_keys_eq!(user, greeting.authority);

        tracing::info!(
            names = ?self.names,
            count = greeting.greet_count,
            "hello"
        );
        greeting.greet_count = greeting
            .greet_count
            .checked_add(1)
            .ok_or(SettlementError::Custom(0))?;
        ctx.account_mut("greeting")?.save_data(&greeting)
    }
}

pub fn dispatcher() -> Dispatcher {
    Dispatcher::new(ID, RuntimeConfig::default())
        .register::<Init>()
        .register::<Greet>()
}
