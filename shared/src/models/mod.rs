//! Domain models for the food supply chain

mod account;
mod catalog;
mod consumption;
mod facility;
mod order;
mod stock;

pub use account::*;
pub use catalog::*;
pub use consumption::*;
pub use facility::*;
pub use order::*;
pub use stock::*;
