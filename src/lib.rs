mod account;
mod actor;
mod api;
mod bundle;
mod client;
mod error;
mod fees;
mod helpers;
mod launch;
mod nonce;
pub mod prelude;
mod simulator;
mod submission;
mod wrapper;

#[cfg(test)]
mod test_utils;

pub use api::networks::Network;
pub use api::types::Buildable;
pub use error::{Error, Result, *};
pub use prelude::*;
