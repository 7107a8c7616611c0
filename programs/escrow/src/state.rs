use valence_settlement::prelude::*;
use valence_settlement::schema::DISCRIMINATOR_LEN;

/// Terms of an open escrow
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct EscrowAccount {
    pub initializer_key: Pubkey,
    /// Token account the deposit came from, refunded on cancel
    pub initializer_deposit_token_account: Pubkey,
    /// Token account that receives the taker's payment
    pub initializer_receive_token_account: Pubkey,
    pub initializer_amount: u64,
    pub taker_amount: u64,
}

impl AccountSchema for EscrowAccount {
    const NAME: &'static str = "EscrowAccount";
    const SPACE: usize = DISCRIMINATOR_LEN + 32 * 3 + 8 * 2;
}
