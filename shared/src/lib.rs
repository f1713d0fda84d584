//! Shared domain library for the food supply chain ledger
//!
//! Everything that carries an invariant lives here: stock lots and their
//! quantity ledger, consumption records, recipes, availability checks, FIFO
//! allocation, the order status machine, upstream supply stages and the
//! supply-chain trace. The crate performs no I/O; the backend loads a scoped
//! [`InventoryBook`] from storage, runs an operation on it and persists the
//! resulting [`ChangeSet`].

pub mod allocator;
pub mod availability;
pub mod book;
pub mod error;
pub mod ledger;
pub mod models;
pub mod recipe;
pub mod state_machine;
pub mod supply;
pub mod trace;
pub mod types;
pub mod validation;

pub use book::{Change, ChangeSet, InventoryBook};
pub use error::{DomainError, DomainResult};
pub use models::*;
pub use recipe::RecipeBook;
pub use state_machine::StockEffect;
pub use types::*;
pub use validation::*;
