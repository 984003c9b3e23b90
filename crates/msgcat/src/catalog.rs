//! Message catalog with locale fallback and positional substitution.
//!
//! # Invariants
//!
//! 1. **Fallback chain terminates**: every lookup walks the active chain
//!    exactly once and ends at the root locale.
//!
//! 2. **Most specific wins**: a key defined in several buckets of the chain
//!    resolves to the bucket closest to the active locale.
//!
//! 3. **Atomic mutation**: `load` merges nothing unless every file parsed;
//!    `set_locale` either replaces the whole chain or leaves it untouched.
//!
//! 4. **Per instance**: a [`MessageCatalog`] owns all of its state. Two
//!    catalogs in one process never see each other's translations.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Missing key | Key not in any chain bucket | Key returned verbatim |
//! | Missing locale | No bucket for a chain entry | Falls through chain |
//! | Arity mismatch | Arg count differs from highest `%N` | `SubstitutionArity` |
//! | Bad locale | `set_locale("en/us")` | `InvalidLocaleFormat`, locale unchanged |
//! | Unreadable file | I/O, UTF-8 or syntax | `ResourceLoad`/`ResourceParse`, catalog unchanged |

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use unicode_width::UnicodeWidthStr;

use crate::config::CatalogConfig;
use crate::error::{MsgcatError, Result};
use crate::loader::{self, FilePattern, LoadReport};
use crate::locale::{FallbackChain, IntoLocale, LocaleTag, fallback_chain};
use crate::template::{ArityMismatch, Template};

/// Callback producing the text for a key that has no translation.
///
/// Receives the most specific locale of the chain that was searched, the
/// key, and the already formatted arguments.
pub type MissingHandler = Box<dyn Fn(&LocaleTag, &str, &[String]) -> String + Send + Sync>;

/// Templates for a single locale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocaleMessages {
    messages: HashMap<String, Template>,
}

impl LocaleMessages {
    /// Create an empty locale bucket.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a template.
    pub fn insert(&mut self, key: impl Into<String>, template: impl Into<Template>) {
        self.messages.insert(key.into(), template.into());
    }

    /// Look up a template by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Template> {
        self.messages.get(key)
    }

    /// Whether `key` has a template here.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.messages.contains_key(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the locale has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Iterate over all keys in this locale.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.messages.keys().map(String::as_str)
    }
}

/// A per-instance message catalog.
///
/// # Example
///
/// ```
/// use msgcat::{CatalogConfig, LocaleTag, MessageCatalog};
///
/// let config = CatalogConfig::default().with_initial_locale(LocaleTag::root());
/// let mut catalog = MessageCatalog::with_config(config);
/// catalog.add_to("hi", "Hello", "नमस्ते").unwrap();
/// catalog.add_to("hi_IN", "Found %1 items", "%1 वस्तुएँ मिलीं").unwrap();
///
/// catalog.set_locale("hi_IN").unwrap();
/// assert_eq!(catalog.get("Hello", &[]).unwrap(), "नमस्ते");
/// assert_eq!(catalog.get("Found %1 items", &[&5]).unwrap(), "5 वस्तुएँ मिलीं");
/// assert_eq!(catalog.get("Thanks", &[]).unwrap(), "Thanks");
/// assert!(catalog.get("Found %1 items", &[]).is_err());
/// ```
pub struct MessageCatalog {
    config: CatalogConfig,
    locales: HashMap<LocaleTag, LocaleMessages>,
    active: FallbackChain,
    loaded_from: Option<PathBuf>,
    missing_handler: Option<MissingHandler>,
}

impl fmt::Debug for MessageCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageCatalog")
            .field("config", &self.config)
            .field("locales", &self.locales)
            .field("active", &self.active)
            .field("loaded_from", &self.loaded_from)
            .field("missing_handler", &self.missing_handler.is_some())
            .finish()
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageCatalog {
    /// Create an empty catalog whose locale comes from the environment
    /// (`LC_ALL`, `LC_MESSAGES`, `LANG`).
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CatalogConfig::default())
    }

    /// Create an empty catalog from explicit options.
    #[must_use]
    pub fn with_config(config: CatalogConfig) -> Self {
        let initial = config.initial_locale();
        Self {
            active: fallback_chain(&initial),
            config,
            locales: HashMap::new(),
            loaded_from: None,
            missing_handler: None,
        }
    }

    /// The options this catalog was built with.
    #[must_use]
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    // -----------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------

    /// Load every message file in `dir` that matches the configured
    /// pattern. Returns the number of keys merged; a key repeated within
    /// one file counts once.
    pub fn load(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let pattern = self.config.pattern.clone();
        self.load_with(dir, &pattern).map(|report| report.merged())
    }

    /// Load message files matching `pattern` from `dir`.
    ///
    /// Files merge in lexicographic filename order; later entries replace
    /// earlier ones with the same key and locale. On error nothing is
    /// merged.
    pub fn load_with(
        &mut self,
        dir: impl AsRef<Path>,
        pattern: &FilePattern,
    ) -> Result<LoadReport> {
        let dir = dir.as_ref();
        let prepared = loader::prepare(dir, pattern)?;

        for (tag, entries) in prepared.batches {
            let bucket = self.locales.entry(tag).or_default();
            for (key, template) in entries {
                bucket.insert(key, template);
            }
        }
        self.loaded_from = Some(dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()));

        let report = prepared.report;
        debug!(
            dir = %dir.display(),
            files = report.files.len(),
            merged = report.merged(),
            issues = report.issues.len(),
            "loaded message catalog"
        );
        Ok(report)
    }

    /// Whether any resource directory has been loaded.
    #[must_use]
    pub fn is_init(&self) -> bool {
        self.loaded_from.is_some()
    }

    /// Directory of the most recent successful [`load`](Self::load).
    #[must_use]
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }

    /// Locales that hold at least one bucket, sorted.
    #[must_use]
    pub fn loaded_locales(&self) -> Vec<&LocaleTag> {
        let mut tags: Vec<&LocaleTag> = self.locales.keys().collect();
        tags.sort_unstable();
        tags
    }

    /// Whether a bucket exists for `locale`.
    #[must_use]
    pub fn is_loaded(&self, locale: impl IntoLocale) -> bool {
        locale
            .into_locale()
            .is_ok_and(|tag| self.locales.contains_key(&tag))
    }

    /// The bucket for `locale`, if any.
    #[must_use]
    pub fn messages(&self, locale: &LocaleTag) -> Option<&LocaleMessages> {
        self.locales.get(locale)
    }

    /// Forget every translation, the load history and the missing handler.
    /// The active locale is kept.
    pub fn unload(&mut self) {
        self.locales.clear();
        self.loaded_from = None;
        self.missing_handler = None;
        debug!("message catalog unloaded");
    }

    // -----------------------------------------------------------------
    // Active locale
    // -----------------------------------------------------------------

    /// Select the active locale. On error the previous locale stays.
    pub fn set_locale(&mut self, locale: impl IntoLocale) -> Result<()> {
        let tag = locale.into_locale()?;
        self.active = fallback_chain(&tag);
        debug!(locale = %tag, chain_len = self.active.len(), "active locale changed");
        Ok(())
    }

    /// The most specific tag of the active locale.
    #[must_use]
    pub fn locale(&self) -> &LocaleTag {
        self.active.most_specific()
    }

    /// The active fallback chain.
    #[must_use]
    pub fn preferences(&self) -> &FallbackChain {
        &self.active
    }

    // -----------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------

    /// Translate `key` for the active locale.
    pub fn get(&self, key: &str, args: &[&dyn fmt::Display]) -> Result<String> {
        self.resolve(&self.active, key, args)
    }

    /// Translate `key` as if `locale` were active.
    pub fn get_from(
        &self,
        locale: impl IntoLocale,
        key: &str,
        args: &[&dyn fmt::Display],
    ) -> Result<String> {
        let chain = fallback_chain(&locale.into_locale()?);
        self.resolve(&chain, key, args)
    }

    /// Whether `key` has a translation anywhere in the active chain.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.lookup(&self.active, key).is_some()
    }

    /// Whether `key` has a translation in the active locale's own bucket.
    #[must_use]
    pub fn has_exact(&self, key: &str) -> bool {
        self.locales
            .get(self.locale())
            .is_some_and(|bucket| bucket.contains(key))
    }

    fn lookup<'a>(
        &'a self,
        chain: &'a FallbackChain,
        key: &str,
    ) -> Option<(&'a LocaleTag, &'a Template)> {
        chain.iter().find_map(|tag| {
            self.locales
                .get(tag)
                .and_then(|bucket| bucket.get(key))
                .map(|template| (tag, template))
        })
    }

    fn resolve(
        &self,
        chain: &FallbackChain,
        key: &str,
        args: &[&dyn fmt::Display],
    ) -> Result<String> {
        let args: Vec<String> = args.iter().map(ToString::to_string).collect();
        let arity_error = |m: ArityMismatch| MsgcatError::SubstitutionArity {
            key: key.to_owned(),
            expected: m.expected,
            found: m.found,
        };

        if let Some((tag, template)) = self.lookup(chain, key) {
            if tag != chain.most_specific() {
                trace!(
                    key,
                    locale = %chain.most_specific(),
                    from = %tag,
                    "translation from fallback locale"
                );
            }
            return template.render(&args).map_err(arity_error);
        }

        trace!(key, locale = %chain.most_specific(), "no translation");
        if let Some(handler) = &self.missing_handler {
            return Ok(handler(chain.most_specific(), key, &args));
        }
        if args.is_empty() {
            return Ok(key.to_owned());
        }
        Template::parse(key).render(&args).map_err(arity_error)
    }

    /// Raw template text for `key`, or the key itself.
    fn raw<'a>(&'a self, chain: &'a FallbackChain, key: &'a str) -> &'a str {
        self.lookup(chain, key)
            .map_or(key, |(_, template)| template.source())
    }

    /// Character count of the longest translation among `keys` in the
    /// active locale. Useful for sizing labels and buttons.
    #[must_use]
    pub fn longest<I>(&self, keys: I) -> usize
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.measure(&self.active, keys, |s| s.chars().count())
    }

    /// [`longest`](Self::longest) for another locale.
    pub fn longest_in<I>(&self, locale: impl IntoLocale, keys: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let chain = fallback_chain(&locale.into_locale()?);
        Ok(self.measure(&chain, keys, |s| s.chars().count()))
    }

    /// Display width, in columns, of the widest translation among `keys`
    /// in the active locale.
    #[must_use]
    pub fn longest_width<I>(&self, keys: I) -> usize
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.measure(&self.active, keys, |s: &str| s.width())
    }

    /// [`longest_width`](Self::longest_width) for another locale.
    pub fn longest_width_in<I>(&self, locale: impl IntoLocale, keys: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let chain = fallback_chain(&locale.into_locale()?);
        Ok(self.measure(&chain, keys, |s: &str| s.width()))
    }

    fn measure<I>(&self, chain: &FallbackChain, keys: I, metric: impl Fn(&str) -> usize) -> usize
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        keys.into_iter()
            .map(|key| metric(self.raw(chain, key.as_ref())))
            .max()
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------
    // Programmatic edits
    // -----------------------------------------------------------------

    /// Set one translation in the active locale.
    pub fn add(&mut self, key: impl Into<String>, translation: impl Into<String>) {
        let tag = self.locale().clone();
        self.bucket(tag).insert(key.into(), Template::parse(translation));
    }

    /// Set one translation in `locale`.
    pub fn add_to(
        &mut self,
        locale: impl IntoLocale,
        key: impl Into<String>,
        translation: impl Into<String>,
    ) -> Result<()> {
        let tag = locale.into_locale()?;
        self.bucket(tag).insert(key.into(), Template::parse(translation));
        Ok(())
    }

    /// Set many translations in the active locale.
    pub fn update<I, K, V>(&mut self, translations: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let tag = self.locale().clone();
        self.merge(tag, translations);
    }

    /// Set many translations in `locale`.
    pub fn update_to<I, K, V>(&mut self, locale: impl IntoLocale, translations: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let tag = locale.into_locale()?;
        self.merge(tag, translations);
        Ok(())
    }

    fn merge<I, K, V>(&mut self, tag: LocaleTag, translations: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let bucket = self.bucket(tag);
        for (key, translation) in translations {
            bucket.insert(key.into(), Template::parse(translation));
        }
    }

    fn bucket(&mut self, tag: LocaleTag) -> &mut LocaleMessages {
        self.locales.entry(tag).or_default()
    }

    // -----------------------------------------------------------------
    // Missing translations
    // -----------------------------------------------------------------

    /// Install a callback for keys with no translation. It replaces the
    /// default of returning the key.
    pub fn set_missing_handler<F>(&mut self, handler: F)
    where
        F: Fn(&LocaleTag, &str, &[String]) -> String + Send + Sync + 'static,
    {
        self.missing_handler = Some(Box::new(handler));
    }

    /// Remove the missing-key callback.
    pub fn clear_missing_handler(&mut self) {
        self.missing_handler = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(raw: &str) -> LocaleTag {
        LocaleTag::normalize(raw).unwrap()
    }

    fn root_catalog() -> MessageCatalog {
        MessageCatalog::with_config(CatalogConfig::default().with_initial_locale(LocaleTag::root()))
    }

    /// `hi` has Hello, `hi_IN` has Bye, root has Cancel.
    fn hindi_catalog() -> MessageCatalog {
        let mut catalog = root_catalog();
        catalog.add_to("hi", "Hello", "नमस्ते").unwrap();
        catalog.add_to("hi_IN", "Bye", "अलविदा").unwrap();
        catalog.add_to(LocaleTag::root(), "Cancel", "Cancel").unwrap();
        catalog.set_locale("hi_IN").unwrap();
        catalog
    }

    #[test]
    fn direct_and_fallback_lookup() {
        let catalog = hindi_catalog();
        assert_eq!(catalog.get("Bye", &[]).unwrap(), "अलविदा");
        assert_eq!(catalog.get("Hello", &[]).unwrap(), "नमस्ते");
        assert_eq!(catalog.get("Cancel", &[]).unwrap(), "Cancel");
    }

    #[test]
    fn missing_key_returns_key() {
        let catalog = hindi_catalog();
        assert_eq!(catalog.get("Thanks", &[]).unwrap(), "Thanks");
        assert_eq!(catalog.get("nonexistent.key", &[]).unwrap(), "nonexistent.key");
        assert_eq!(catalog.get("100% %1", &[]).unwrap(), "100% %1");
    }

    #[test]
    fn missing_key_with_args_formats_key() {
        let catalog = hindi_catalog();
        assert_eq!(catalog.get("%1 files", &[&3]).unwrap(), "3 files");
        assert!(matches!(
            catalog.get("no placeholders", &[&3]),
            Err(MsgcatError::SubstitutionArity {
                expected: 0,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn most_specific_bucket_wins() {
        let mut catalog = hindi_catalog();
        catalog.add_to("hi_IN", "Hello", "नमस्ते जी").unwrap();
        assert_eq!(catalog.get("Hello", &[]).unwrap(), "नमस्ते जी");
        assert_eq!(catalog.get_from("hi", "Hello", &[]).unwrap(), "नमस्ते");
    }

    #[test]
    fn substitution_and_arity() {
        let mut catalog = hindi_catalog();
        catalog.add("found", "Found %1 items");
        assert_eq!(catalog.get("found", &[&5]).unwrap(), "Found 5 items");
        let err = catalog.get("found", &[]).unwrap_err();
        assert!(matches!(
            err,
            MsgcatError::SubstitutionArity {
                ref key,
                expected: 1,
                found: 0
            } if key == "found"
        ));
    }

    #[test]
    fn set_locale_error_keeps_previous() {
        let mut catalog = hindi_catalog();
        let err = catalog.set_locale("hi/IN").unwrap_err();
        assert!(matches!(err, MsgcatError::InvalidLocaleFormat { .. }));
        assert_eq!(catalog.locale().as_str(), "hi_in");
    }

    #[test]
    fn preferences_follow_locale() {
        let mut catalog = root_catalog();
        catalog.set_locale("en_US_funky").unwrap();
        let prefs: Vec<&str> = catalog.preferences().iter().map(LocaleTag::as_str).collect();
        assert_eq!(prefs, ["en_us_funky", "en_us", "en", ""]);
        catalog.set_locale(tag("mr")).unwrap();
        assert_eq!(catalog.locale(), &tag("mr"));
    }

    #[test]
    fn has_and_has_exact() {
        let catalog = hindi_catalog();
        assert!(catalog.has("Hello"));
        assert!(!catalog.has_exact("Hello"));
        assert!(catalog.has_exact("Bye"));
        assert!(!catalog.has("Thanks"));
    }

    #[test]
    fn update_and_update_to() {
        let mut catalog = root_catalog();
        catalog.set_locale("hi").unwrap();
        catalog.update([("Yesterday", "बीता हुआ कल"), ("Tomorrow", "कल")]);
        catalog
            .update_to("mr", vec![("Yesterday".to_owned(), "काल".to_owned())])
            .unwrap();
        assert_eq!(catalog.get("Tomorrow", &[]).unwrap(), "कल");
        assert_eq!(catalog.get_from("mr", "Yesterday", &[]).unwrap(), "काल");
        assert_eq!(catalog.get("Yesterday", &[]).unwrap(), "बीता हुआ कल");
    }

    #[test]
    fn get_from_does_not_change_locale() {
        let catalog = hindi_catalog();
        assert_eq!(catalog.get_from("fr", "Hello", &[]).unwrap(), "Hello");
        assert_eq!(catalog.locale().as_str(), "hi_in");
        assert!(catalog.get_from("", "Hello", &[]).is_err());
    }

    #[test]
    fn longest_counts_characters() {
        let mut catalog = root_catalog();
        catalog.add_to("hi", "Hello", "नमस्ते").unwrap();
        catalog.add_to("hi", "Good Morning", "शुभ प्रभात").unwrap();
        catalog.add_to("mr", "Good Morning", "शुभ सकाळ").unwrap();
        assert_eq!(catalog.longest_in("hi", ["Hello", "Good Morning"]).unwrap(), 10);
        assert_eq!(catalog.longest_in("mr", ["Hello", "Good Morning"]).unwrap(), 8);
        catalog.set_locale("hi").unwrap();
        assert_eq!(catalog.longest(["Hello"]), 6);
        assert_eq!(catalog.longest(Vec::<String>::new()), 0);
    }

    #[test]
    fn longest_width_uses_columns() {
        let mut catalog = root_catalog();
        catalog.add_to("ja", "OK", "了解").unwrap();
        assert_eq!(catalog.longest_in("ja", ["OK"]).unwrap(), 2);
        assert_eq!(catalog.longest_width_in("ja", ["OK"]).unwrap(), 4);
    }

    #[test]
    fn loaded_locales_are_sorted() {
        let catalog = hindi_catalog();
        let tags: Vec<&str> = catalog.loaded_locales().into_iter().map(LocaleTag::as_str).collect();
        assert_eq!(tags, ["", "hi", "hi_in"]);
        assert!(catalog.is_loaded("hi_IN"));
        assert!(!catalog.is_loaded("mr"));
        assert!(!catalog.is_loaded("../etc"));
    }

    #[test]
    fn missing_handler_overrides_fallback() {
        let mut catalog = hindi_catalog();
        catalog.set_missing_handler(|locale, key, args| {
            if key == "MISSING" {
                format!("[{locale}] _{}", args.join(","))
            } else {
                key.to_owned()
            }
        });
        assert_eq!(catalog.get("MISSING", &[&1, &"x"]).unwrap(), "[hi_in] _1,x");
        assert_eq!(catalog.get("NOT_MISSING", &[]).unwrap(), "NOT_MISSING");
        assert_eq!(catalog.get("Hello", &[]).unwrap(), "नमस्ते");
        catalog.clear_missing_handler();
        assert_eq!(catalog.get("MISSING", &[]).unwrap(), "MISSING");
    }

    #[test]
    fn unload_forgets_everything_but_locale() {
        let mut catalog = hindi_catalog();
        catalog.set_missing_handler(|_, _, _| "x".into());
        catalog.unload();
        assert!(catalog.loaded_locales().is_empty());
        assert!(!catalog.is_init());
        assert_eq!(catalog.get("Hello", &[]).unwrap(), "Hello");
        assert_eq!(catalog.locale().as_str(), "hi_in");
    }

    #[test]
    fn catalogs_are_independent() {
        let mut a = hindi_catalog();
        let b = hindi_catalog();
        a.add("Bye", "फिर मिलेंगे");
        assert_eq!(a.get("Bye", &[]).unwrap(), "फिर मिलेंगे");
        assert_eq!(b.get("Bye", &[]).unwrap(), "अलविदा");
    }

    #[test]
    fn catalog_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MessageCatalog>();
    }

    #[test]
    fn locale_messages_basics() {
        let mut messages = LocaleMessages::new();
        assert!(messages.is_empty());
        messages.insert("alpha", "A");
        messages.insert("beta", "B %1");
        messages.insert("alpha", "A2");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages.get("alpha").map(Template::source), Some("A2"));
        assert_eq!(messages.get("beta").map(Template::arity), Some(1));
        let mut keys: Vec<&str> = messages.keys().collect();
        keys.sort_unstable();
        assert_eq!(keys, ["alpha", "beta"]);
    }
}
