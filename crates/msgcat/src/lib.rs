#![forbid(unsafe_code)]

//! Per-instance message catalogs for desktop GUI applications.
//!
//! Translations live in `.msg` resource files next to the application, one
//! file per locale (`hi.msg`, `hi_IN.msg`, `ROOT.msg`). A
//! [`MessageCatalog`] loads them, tracks the active locale and its
//! fallback chain, and translates keys with positional `%N` substitution.
//!
//! ```no_run
//! use msgcat::{MessageCatalog, mc};
//!
//! let mut catalog = MessageCatalog::new();
//! catalog.load("msgs")?;
//! catalog.set_locale("hi_IN")?;
//!
//! let greeting = mc!(catalog, "Hello")?;
//! let found = mc!(catalog, "Found %1 items", 5)?;
//! # Ok::<(), msgcat::MsgcatError>(())
//! ```
//!
//! Each catalog is an ordinary value. Store one next to each toolkit
//! context; catalogs never share state.

pub mod catalog;
pub mod config;
pub mod error;
pub mod loader;
pub mod locale;
pub mod msgfile;
pub mod template;

pub use catalog::{LocaleMessages, MessageCatalog, MissingHandler};
pub use config::CatalogConfig;
pub use error::{MalformedEntry, MsgcatError, Result};
pub use loader::{FilePattern, LoadReport, LoadedFile};
pub use locale::{FallbackChain, IntoLocale, LocaleTag, fallback_chain, normalize};
pub use msgfile::{MessageFile, SyntaxError, parse_message_file};
pub use template::{ArityMismatch, Template};

/// Translate a key with a [`MessageCatalog`], taking substitution
/// arguments inline.
///
/// `mc!(catalog, "Found %1 items", n)` is shorthand for
/// `catalog.get("Found %1 items", &[&n])`.
#[macro_export]
macro_rules! mc {
    ($catalog:expr, $key:expr $(,)?) => {
        $catalog.get($key, &[])
    };
    ($catalog:expr, $key:expr, $($arg:expr),+ $(,)?) => {
        $catalog.get($key, &[$(&$arg as &dyn ::std::fmt::Display),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mc_macro_forwards_arguments() {
        let mut catalog = MessageCatalog::with_config(
            CatalogConfig::default().with_initial_locale(LocaleTag::root()),
        );
        catalog.add("Found %1 items in %2", "%2: %1 found");
        assert_eq!(mc!(catalog, "Found %1 items in %2", 5, "inbox").unwrap(), "inbox: 5 found");
        assert_eq!(mc!(catalog, "plain").unwrap(), "plain");
        assert!(mc!(catalog, "Found %1 items in %2", 5,).is_err());
    }
}
