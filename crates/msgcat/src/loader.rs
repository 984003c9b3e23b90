//! Resource directory discovery.
//!
//! A load happens in two phases. [`prepare`] lists the directory, reads and
//! parses every matching file, and fails without side effects if any file
//! is unreadable. The catalog then merges the prepared batches in one pass.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use crate::error::{MalformedEntry, MsgcatError, Result};
use crate::locale::LocaleTag;
use crate::msgfile::parse_message_file;

/// Filename stem that names the root locale.
pub const ROOT_STEM: &str = "ROOT";

/// Which files in a directory are message files, and where the locale tag
/// sits in their names.
///
/// The default matches `*.msg`: `hi.msg`, `hi_IN.msg`, `ROOT.msg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePattern {
    prefix: String,
    suffix: String,
}

impl Default for FilePattern {
    fn default() -> Self {
        Self::extension("msg")
    }
}

impl FilePattern {
    /// Match `<tag><suffix>` with an arbitrary `prefix` in front.
    #[must_use]
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Match `<tag>.<ext>`.
    #[must_use]
    pub fn extension(ext: &str) -> Self {
        Self::new("", format!(".{}", ext.trim_start_matches('.')))
    }

    /// Parse a glob with exactly one `*`, which captures the tag.
    ///
    /// ```
    /// use msgcat::FilePattern;
    ///
    /// let pattern = FilePattern::from_glob("app_*.msg").unwrap();
    /// assert_eq!(pattern.capture("app_hi_IN.msg"), Some("hi_IN"));
    /// assert_eq!(pattern.capture("hi.msg"), None);
    /// assert!(FilePattern::from_glob("*.*").is_none());
    /// ```
    #[must_use]
    pub fn from_glob(glob: &str) -> Option<Self> {
        let (prefix, suffix) = glob.split_once('*')?;
        if suffix.contains('*') {
            return None;
        }
        Some(Self::new(prefix, suffix))
    }

    /// The locale part of `file_name`, if the name matches.
    #[must_use]
    pub fn capture<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        let stem = file_name
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())?;
        (!stem.is_empty()).then_some(stem)
    }
}

/// Outcome of one `load` call.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Directory that was scanned.
    pub directory: PathBuf,
    /// Files merged, in merge order.
    pub files: Vec<LoadedFile>,
    /// Matching files whose name does not encode a valid locale.
    pub skipped: Vec<PathBuf>,
    /// Entries rejected while parsing.
    pub issues: Vec<MalformedEntry>,
}

impl LoadReport {
    /// Total number of keys merged, counted once per file.
    #[must_use]
    pub fn merged(&self) -> usize {
        self.files.iter().map(|f| f.entries).sum()
    }
}

/// One merged message file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub locale: LocaleTag,
    /// Distinct keys merged from this file.
    pub entries: usize,
}

/// Parsed contents of a directory, ready to merge.
#[derive(Debug)]
pub(crate) struct PreparedLoad {
    pub report: LoadReport,
    pub batches: Vec<(LocaleTag, Vec<(String, String)>)>,
}

fn tag_for_stem(stem: &str) -> Result<LocaleTag> {
    if stem.eq_ignore_ascii_case(ROOT_STEM) {
        Ok(LocaleTag::root())
    } else {
        LocaleTag::normalize(stem)
    }
}

fn load_error(path: &Path, source: io::Error) -> MsgcatError {
    MsgcatError::ResourceLoad {
        path: path.to_path_buf(),
        source,
    }
}

/// List, read and parse every message file in `dir`.
#[instrument(level = "debug", skip_all, fields(dir = %dir.display()))]
pub(crate) fn prepare(dir: &Path, pattern: &FilePattern) -> Result<PreparedLoad> {
    let mut candidates = Vec::new();
    let mut skipped = Vec::new();

    for entry in fs::read_dir(dir).map_err(|e| load_error(dir, e))? {
        let entry = entry.map_err(|e| load_error(dir, e))?;
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            debug!(path = %path.display(), "skipping non UTF-8 file name");
            continue;
        };
        let Some(stem) = pattern.capture(&name) else {
            continue;
        };
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => continue,
            Err(err) => {
                warn!(path = %path.display(), %err, "skipping unreadable directory entry");
                skipped.push(path);
                continue;
            }
        }
        match tag_for_stem(stem) {
            Ok(tag) => candidates.push((name, path, tag)),
            Err(err) => {
                warn!(path = %path.display(), %err, "skipping file with invalid locale name");
                skipped.push(path);
            }
        }
    }

    candidates.sort_by(|a, b| a.0.cmp(&b.0));

    let mut report = LoadReport {
        directory: dir.to_path_buf(),
        skipped,
        ..LoadReport::default()
    };
    let mut batches = Vec::with_capacity(candidates.len());
    for (_, path, tag) in candidates {
        let bytes = fs::read(&path).map_err(|e| load_error(&path, e))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| load_error(&path, io::Error::new(io::ErrorKind::InvalidData, e)))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
        let parsed = parse_message_file(text, &tag, Some(&path)).map_err(|e| {
            MsgcatError::ResourceParse {
                path: path.clone(),
                line: e.line,
                message: e.message,
            }
        })?;
        let keys: HashSet<&str> = parsed.entries.iter().map(|(key, _)| key.as_str()).collect();
        let entries = keys.len();
        debug!(
            path = %path.display(),
            locale = %tag,
            entries,
            issues = parsed.issues.len(),
            "parsed message file"
        );
        report.files.push(LoadedFile {
            path,
            locale: tag.clone(),
            entries,
        });
        report.issues.extend(parsed.issues);
        batches.push((tag, parsed.entries));
    }

    Ok(PreparedLoad { report, batches })
}
