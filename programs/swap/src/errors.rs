use crate::math::MathError;
use valence_settlement::SettlementError;

// ================================
// Swap Errors
// ================================

/// Pool failures, reported as custom codes from 6000
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SwapError {
    /// Both sides of the pool use the same mint
    SameMint = 6000,
    /// Liquidity mint has supply or a different authority
    MintNotFresh = 6001,
    /// Account does not match the one recorded in the pool
    PoolMismatch = 6002,
    /// Deposit, trade or withdrawal of nothing
    ZeroAmount = 6003,
    /// Operation would mint or pay out nothing
    ZeroLiquidity = 6004,
    /// Trade pays less than the trader accepts
    SlippageExceeded = 6005,
    /// Withdrawal exceeds the depositor's liquidity tokens
    InsufficientLiquidity = 6006,
    /// Vaults still hold tokens
    PoolNotEmpty = 6007,
    /// Pool arithmetic left the u64 range or divided by zero
    MathOverflow = 6008,
}

impl SwapError {
    pub const fn code(self) -> u32 {
        self as u32
    }
}

impl From<SwapError> for SettlementError {
    fn from(error: SwapError) -> Self {
        SettlementError::Custom(error.code())
    }
}

impl From<MathError> for SettlementError {
    fn from(_: MathError) -> Self {
        SwapError::MathOverflow.into()
    }
}
