use valence_settlement::SettlementError;

// ================================
// Escrow Errors
// ================================

/// Escrow failures, reported as custom codes from 6000
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EscrowError {
    /// Deposit account holds a different mint than the vault
    MintMismatch = 6000,
    /// Deposit account is not owned by the initializer
    DepositOwnerMismatch = 6001,
    /// Deposit balance below the offered amount
    InsufficientDeposit = 6002,
    /// Account does not match the one recorded in the escrow
    EscrowMismatch = 6003,
    /// Offered or requested amount is zero
    ZeroAmount = 6004,
}

impl EscrowError {
    pub const fn code(self) -> u32 {
        self as u32
    }
}

impl From<EscrowError> for SettlementError {
    fn from(error: EscrowError) -> Self {
        SettlementError::Custom(error.code())
    }
}
