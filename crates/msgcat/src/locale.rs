//! Locale tags and fallback chain resolution.
//!
//! # Invariants
//!
//! 1. **Normalized form**: a [`LocaleTag`] is always lower-case, uses `_`
//!    between components and `@` before the modifier. Two tags are equal iff
//!    their normalized strings are equal.
//!
//! 2. **Chain shape**: a [`FallbackChain`] starts with the requested tag,
//!    drops exactly one component per step, and always ends with the root
//!    tag `""`. It never contains duplicates.
//!
//! 3. **Purity**: nothing in this module touches shared state. The only
//!    environment access goes through a caller-supplied lookup.
//!
//! # Failure Modes
//!
//! | Input | Result |
//! |-------|--------|
//! | `""`, `"  "`, `"_us"` | `InvalidLocaleFormat` (empty language) |
//! | `"en__us"`, `"en@"` | `InvalidLocaleFormat` (empty component) |
//! | `"en/us"`, `"../fr"` | `InvalidLocaleFormat` (disallowed character) |

use std::fmt;
use std::str::FromStr;

use crate::error::{MsgcatError, Result};

/// Environment variables consulted, in order, for the system locale.
pub const DEFAULT_LOCALE_ENV: [&str; 3] = ["LC_ALL", "LC_MESSAGES", "LANG"];

/// A normalized locale identifier such as `hi`, `hi_in` or `sr_rs@latin`.
///
/// The empty tag is the root locale: the bucket that holds translations
/// shared by every locale.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocaleTag {
    repr: String,
}

impl LocaleTag {
    /// The root (empty) locale.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            repr: String::new(),
        }
    }

    /// Normalize a raw locale string.
    ///
    /// Accepts `-` as an alias for `_` and drops a POSIX codeset suffix, so
    /// `"en-US"`, `"en_US"` and `"en_US.UTF-8"` all normalize to `en_us`.
    ///
    /// ```
    /// use msgcat::LocaleTag;
    ///
    /// let tag = LocaleTag::normalize(" hi_IN ").unwrap();
    /// assert_eq!(tag.as_str(), "hi_in");
    /// assert_eq!(tag.language(), "hi");
    /// assert_eq!(tag.territory(), Some("in"));
    /// assert!(LocaleTag::normalize("").is_err());
    /// ```
    pub fn normalize(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (body, modifier) = match trimmed.rsplit_once('@') {
            Some((body, modifier)) => (body, Some(modifier)),
            None => (trimmed, None),
        };
        let body = body.split_once('.').map_or(body, |(head, _codeset)| head);

        let mut repr = String::with_capacity(trimmed.len());
        for (i, component) in body.split(['_', '-']).enumerate() {
            if component.is_empty() {
                let reason = if i == 0 {
                    "empty language component"
                } else {
                    "empty component"
                };
                return Err(MsgcatError::invalid_locale(raw, reason));
            }
            if !component.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(MsgcatError::invalid_locale(raw, "disallowed character"));
            }
            if i > 0 {
                repr.push('_');
            }
            repr.push_str(&component.to_ascii_lowercase());
        }

        if let Some(modifier) = modifier {
            if modifier.is_empty() {
                return Err(MsgcatError::invalid_locale(raw, "empty component"));
            }
            if !modifier.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(MsgcatError::invalid_locale(raw, "disallowed character"));
            }
            repr.push('@');
            repr.push_str(&modifier.to_ascii_lowercase());
        }

        Ok(Self { repr })
    }

    /// The normalized string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.repr
    }

    /// Whether this is the root locale.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.repr.is_empty()
    }

    /// Language component (`"hi"` for `hi_in`). Empty for the root locale.
    #[must_use]
    pub fn language(&self) -> &str {
        let end = self.repr.find(['_', '@']).unwrap_or(self.repr.len());
        &self.repr[..end]
    }

    /// Territory component (`"in"` for `hi_in`), if any.
    #[must_use]
    pub fn territory(&self) -> Option<&str> {
        let body = self.body();
        let rest = body.split_once('_')?.1;
        Some(rest.split('_').next().unwrap_or(rest))
    }

    /// Modifier component (`"latin"` for `sr_rs@latin`), if any.
    #[must_use]
    pub fn modifier(&self) -> Option<&str> {
        self.repr.split_once('@').map(|(_, modifier)| modifier)
    }

    /// Number of `_`/`@` delimited components (0 for root).
    #[must_use]
    pub fn component_count(&self) -> usize {
        if self.is_root() {
            0
        } else {
            1 + self.repr.matches(['_', '@']).count()
        }
    }

    /// The next less specific tag, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let repr = match self.repr.rfind(['_', '@']) {
            Some(idx) => self.repr[..idx].to_owned(),
            None => String::new(),
        };
        Some(Self { repr })
    }

    /// Fallback chain for this tag; see [`fallback_chain`].
    #[must_use]
    pub fn fallback_chain(&self) -> FallbackChain {
        fallback_chain(self)
    }

    fn body(&self) -> &str {
        self.repr.split('@').next().unwrap_or_default()
    }
}

impl fmt::Display for LocaleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

impl AsRef<str> for LocaleTag {
    fn as_ref(&self) -> &str {
        &self.repr
    }
}

impl FromStr for LocaleTag {
    type Err = MsgcatError;

    fn from_str(s: &str) -> Result<Self> {
        Self::normalize(s)
    }
}

/// Normalize a raw locale string; see [`LocaleTag::normalize`].
pub fn normalize(raw: &str) -> Result<LocaleTag> {
    LocaleTag::normalize(raw)
}

/// Anything that names a locale: a [`LocaleTag`] or a raw string that is
/// normalized on the way in.
pub trait IntoLocale {
    /// Convert into a normalized tag.
    fn into_locale(self) -> Result<LocaleTag>;
}

impl IntoLocale for LocaleTag {
    fn into_locale(self) -> Result<LocaleTag> {
        Ok(self)
    }
}

impl IntoLocale for &LocaleTag {
    fn into_locale(self) -> Result<LocaleTag> {
        Ok(self.clone())
    }
}

impl IntoLocale for &str {
    fn into_locale(self) -> Result<LocaleTag> {
        LocaleTag::normalize(self)
    }
}

impl IntoLocale for String {
    fn into_locale(self) -> Result<LocaleTag> {
        LocaleTag::normalize(&self)
    }
}

impl IntoLocale for &String {
    fn into_locale(self) -> Result<LocaleTag> {
        LocaleTag::normalize(self)
    }
}

/// Ordered lookup preferences, most specific first, ending in the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackChain {
    tags: Vec<LocaleTag>,
}

impl FallbackChain {
    /// The requested tag (first element).
    #[must_use]
    pub fn most_specific(&self) -> &LocaleTag {
        &self.tags[0]
    }

    /// Iterate from most to least specific.
    pub fn iter(&self) -> std::slice::Iter<'_, LocaleTag> {
        self.tags.iter()
    }

    /// Number of tags, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Always `false`: a chain holds at least the root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Whether `tag` appears in the chain.
    #[must_use]
    pub fn contains(&self, tag: &LocaleTag) -> bool {
        self.tags.contains(tag)
    }

    /// The chain as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[LocaleTag] {
        &self.tags
    }
}

impl Default for FallbackChain {
    fn default() -> Self {
        fallback_chain(&LocaleTag::root())
    }
}

impl<'a> IntoIterator for &'a FallbackChain {
    type Item = &'a LocaleTag;
    type IntoIter = std::slice::Iter<'a, LocaleTag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

/// Build the fallback chain for `tag` by dropping the most specific
/// component until only the root remains.
///
/// ```
/// use msgcat::{LocaleTag, fallback_chain};
///
/// let tag = LocaleTag::normalize("en_US_funky").unwrap();
/// let fallbacks = fallback_chain(&tag);
/// let chain: Vec<&str> = fallbacks.iter().map(LocaleTag::as_str).collect();
/// assert_eq!(chain, ["en_us_funky", "en_us", "en", ""]);
/// ```
#[must_use]
pub fn fallback_chain(tag: &LocaleTag) -> FallbackChain {
    let mut tags = Vec::with_capacity(tag.component_count() + 1);
    let mut current = Some(tag.clone());
    while let Some(candidate) = current {
        current = candidate.parent();
        if !tags.contains(&candidate) {
            tags.push(candidate);
        }
    }
    FallbackChain { tags }
}

/// Derive the system locale from [`DEFAULT_LOCALE_ENV`] using a custom
/// environment lookup.
#[must_use]
pub fn system_locale_from_env<F>(get_env: F) -> LocaleTag
where
    F: Fn(&str) -> Option<String>,
{
    system_locale_from_vars(&DEFAULT_LOCALE_ENV, get_env)
}

/// Derive the system locale from the first usable variable in `vars`.
///
/// Empty and unparsable values are skipped. `C` and `POSIX` select the
/// root locale. Falls back to the root when nothing is usable.
#[must_use]
pub fn system_locale_from_vars<S, F>(vars: &[S], get_env: F) -> LocaleTag
where
    S: AsRef<str>,
    F: Fn(&str) -> Option<String>,
{
    for var in vars {
        let Some(value) = get_env(var.as_ref()) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let base = value.split(['.', '@']).next().unwrap_or_default();
        if base.eq_ignore_ascii_case("c") || base.eq_ignore_ascii_case("posix") {
            return LocaleTag::root();
        }
        match LocaleTag::normalize(value) {
            Ok(tag) => return tag,
            Err(err) => tracing::debug!(var = var.as_ref(), %err, "ignoring locale variable"),
        }
    }
    LocaleTag::root()
}
