// Instruction module for valence-escrow
// Exports all instruction handlers and their account layouts

pub mod cancel;
pub mod exchange;
pub mod initialize;

pub use cancel::*;
pub use exchange::*;
pub use initialize::*;
