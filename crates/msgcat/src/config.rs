//! Catalog construction options.

use crate::loader::FilePattern;
use crate::locale::{DEFAULT_LOCALE_ENV, LocaleTag, system_locale_from_vars};

/// Options for [`MessageCatalog::with_config`](crate::MessageCatalog::with_config).
///
/// ```
/// use msgcat::{CatalogConfig, FilePattern, LocaleTag, MessageCatalog};
///
/// let config = CatalogConfig::default()
///     .with_pattern(FilePattern::extension("lang"))
///     .with_initial_locale(LocaleTag::normalize("mr").unwrap());
/// let catalog = MessageCatalog::with_config(config);
/// assert_eq!(catalog.locale().as_str(), "mr");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Which files [`load`](crate::MessageCatalog::load) picks up.
    pub pattern: FilePattern,
    /// Environment variables consulted for the initial locale, in order.
    pub locale_env: Vec<String>,
    /// Initial locale; skips environment detection when set.
    pub initial_locale: Option<LocaleTag>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            pattern: FilePattern::default(),
            locale_env: DEFAULT_LOCALE_ENV.iter().map(|v| (*v).to_owned()).collect(),
            initial_locale: None,
        }
    }
}

impl CatalogConfig {
    /// Set the resource file pattern.
    #[must_use]
    pub fn with_pattern(mut self, pattern: FilePattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Replace the list of locale environment variables.
    #[must_use]
    pub fn with_locale_env<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locale_env = vars.into_iter().map(Into::into).collect();
        self
    }

    /// Fix the initial locale.
    #[must_use]
    pub fn with_initial_locale(mut self, locale: LocaleTag) -> Self {
        self.initial_locale = Some(locale);
        self
    }

    /// The locale a new catalog starts with, using `get_env` for lookups.
    #[must_use]
    pub fn initial_locale_with<F>(&self, get_env: F) -> LocaleTag
    where
        F: Fn(&str) -> Option<String>,
    {
        match &self.initial_locale {
            Some(locale) => locale.clone(),
            None => system_locale_from_vars(&self.locale_env, get_env),
        }
    }

    /// The locale a new catalog starts with, read from the process
    /// environment.
    #[must_use]
    pub fn initial_locale(&self) -> LocaleTag {
        self.initial_locale_with(|key| std::env::var(key).ok())
    }
}
