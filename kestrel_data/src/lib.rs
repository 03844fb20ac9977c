#![warn(clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod catalog;
pub mod commands;
pub mod cooldowns;
pub mod error;
pub mod events;
pub mod invocation;
pub mod reporting;
pub mod structs;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use catalog::{EventCatalog, HandlerCatalog};
pub use structs::{Data, Error};
