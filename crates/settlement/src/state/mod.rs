pub mod account;
pub mod table;

pub use account::{AccountHandle, AccountState, DirtyFlags};
pub use table::{raw_account, AccountTable};
