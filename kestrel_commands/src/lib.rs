#![warn(clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

use kestrel_data::HandlerCatalog;

pub mod dispatch;
pub mod invocation;
pub mod meta;
pub mod owner;
pub mod register;

#[cfg(test)]
mod fixtures;

/// Every built-in handler, keyed by the name manifests refer to.
#[must_use]
pub fn catalog() -> HandlerCatalog {
    HandlerCatalog::new()
        .command("ping", meta::ping)
        .command("uptime", meta::uptime)
        .command("help", meta::help)
        .command("reload", owner::reload)
        .command("toggle", owner::toggle)
        .command("cooldowns", owner::cooldowns)
        .command("shutdown", owner::shutdown)
}

#[cfg(test)]
mod tests {
    #[test]
    fn catalog_has_every_builtin() {
        let catalog = super::catalog();
        for name in ["ping", "uptime", "help", "reload", "toggle", "cooldowns", "shutdown"] {
            assert!(catalog.contains(name), "{name} is missing");
        }
    }
}
