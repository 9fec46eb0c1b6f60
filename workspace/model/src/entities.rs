//! This file serves as the root for all SeaORM entity modules.
//! The data models for the finance tracking application live here:
//! users own accounts, accounts carry transactions, and each user may
//! have one monthly budget.

pub mod account;
pub mod budget;
pub mod transaction;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::account::Entity as Account;
    pub use super::budget::Entity as Budget;
    pub use super::transaction::Entity as Transaction;
    pub use super::user::Entity as User;
}
