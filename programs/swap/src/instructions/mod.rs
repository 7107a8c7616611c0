// Instruction module for valence-swap

pub mod close_pool;
pub mod create_pool;
pub mod deposit;
pub mod trade;
pub mod withdraw;

pub use close_pool::*;
pub use create_pool::*;
pub use deposit::*;
pub use trade::*;
pub use withdraw::*;
