// Open an escrow: record the terms, create the vault and lock the deposit

use crate::{errors::EscrowError, state::EscrowAccount, ESCROW_PDA_SEED, VAULT_PDA_SEED};
use tracing::info;
use valence_settlement::prelude::*;
use valence_settlement::token;

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct Initialize {
    /// Bump of the vault address under VAULT_PDA_SEED
    pub vault_bump: u8,
    pub initializer_amount: u64,
    pub taker_amount: u64,
}

impl ProgramInstruction for Initialize {
    const NAME: &'static str = "initialize";

    fn accounts() -> BindingDescriptor {
        BindingDescriptor::new(Self::NAME)
            .account("initializer", Access::WRITABLE_SIGNER)
            .account("mint", Access::READONLY)
            .account("vault", Access::WRITABLE)
            .account("initializer_deposit", Access::WRITABLE)
            .account("initializer_receive", Access::READONLY)
            .init_account::<EscrowAccount>("escrow", Access::WRITABLE_SIGNER)
            .program("system_program")
            .program("token_program")
    }

    fn process(self, ctx: &mut Context<'_>) -> Result<()> {
        require!(
            self.initializer_amount > 0 && self.taker_amount > 0,
            EscrowError::ZeroAmount
        );

        let initializer = ctx.key_of("initializer")?;
        let mint = ctx.key_of("mint")?;
        token::unpack_mint(ctx.account("mint")?)?;
        let deposit = token::unpack_account(ctx.account("initializer_deposit")?)?;
        require_keys_eq!(deposit.mint, mint, EscrowError::MintMismatch);
        require_keys_eq!(deposit.owner, initializer, EscrowError::DepositOwnerMismatch);
        require!(
            deposit.amount >= self.initializer_amount,
            EscrowError::InsufficientDeposit
        );
        token::unpack_account(ctx.account("initializer_receive")?)?;

        // terms
        ctx.create_account("initializer", "escrow", EscrowAccount::SPACE, &crate::ID, None)?;
        let terms = EscrowAccount {
            initializer_key: initializer,
            initializer_deposit_token_account: ctx.key_of("initializer_deposit")?,
            initializer_receive_token_account: ctx.key_of("initializer_receive")?,
            initializer_amount: self.initializer_amount,
            taker_amount: self.taker_amount,
        };
        ctx.account_mut("escrow")?.save_data(&terms)?;

        // vault
        let (vault_authority, _) = ctx.find_program_address(&[ESCROW_PDA_SEED])?;
        let payer = ctx.index_of("initializer")?;
        let vault = ctx.index_of("vault")?;
        let mint_index = ctx.index_of("mint")?;
        let vault_seeds = SignerSeeds::new([VAULT_PDA_SEED], self.vault_bump);
        token::create_and_init_account(
            ctx,
            payer,
            vault,
            mint_index,
            &vault_authority,
            &[vault_seeds],
        )?;

        let deposit_index = ctx.index_of("initializer_deposit")?;
        token::transfer(
            ctx,
            deposit_index,
            vault,
            payer,
            self.initializer_amount,
            &[],
        )?;

        info!(
            escrow = %ctx.key_of("escrow")?,
            offered = self.initializer_amount,
            requested = self.taker_amount,
            "escrow opened"
        );
        Ok(())
    }
}
