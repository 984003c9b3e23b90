//! Positional `%N` message templates.
//!
//! A template is parsed once when it enters the catalog and rendered on
//! every lookup. Rendering is a single pass: substituted values are never
//! rescanned for placeholders.
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `%1`, `%2`, ... | argument 1, 2, ... (decimal, no leading zero) |
//! | `%1$s`, `%2$d` | legacy positional form, same as `%1`, `%2` |
//! | `%%` | a literal `%` |
//! | `%` anything else | kept as literal text |

/// Argument count mismatch reported by [`Template::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArityMismatch {
    /// Highest placeholder index in the template.
    pub expected: usize,
    /// Number of arguments supplied.
    pub found: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Arg(usize),
}

/// A parsed message template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
    arity: usize,
}

impl Template {
    /// Parse a template. Parsing never fails: anything that is not a
    /// placeholder is literal text.
    #[must_use]
    pub fn parse(source: impl Into<String>) -> Self {
        let source = source.into();
        let bytes = source.as_bytes();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut arity = 0;
        let mut pos = 0;
        let mut last = 0;

        while let Some(offset) = source[pos..].find('%') {
            let pct = pos + offset;
            literal.push_str(&source[last..pct]);
            match bytes.get(pct + 1) {
                Some(b'%') => {
                    literal.push('%');
                    pos = pct + 2;
                }
                Some(b'1'..=b'9') => {
                    let digits = bytes[pct + 1..]
                        .iter()
                        .take_while(|b| b.is_ascii_digit())
                        .count();
                    let mut end = pct + 1 + digits;
                    match source[pct + 1..end].parse::<usize>() {
                        Ok(index) => {
                            if bytes.get(end) == Some(&b'$')
                                && matches!(bytes.get(end + 1), Some(b's' | b'd' | b'i' | b'u'))
                            {
                                end += 2;
                            }
                            if !literal.is_empty() {
                                segments.push(Segment::Literal(std::mem::take(&mut literal)));
                            }
                            segments.push(Segment::Arg(index - 1));
                            arity = arity.max(index);
                        }
                        // Too large to be an argument index.
                        Err(_) => literal.push_str(&source[pct..end]),
                    }
                    pos = end;
                }
                _ => {
                    literal.push('%');
                    pos = pct + 1;
                }
            }
            last = pos;
        }
        literal.push_str(&source[last..]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            source,
            segments,
            arity,
        }
    }

    /// The template text as written in the catalog.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of arguments the template requires (its highest `%N`).
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Substitute `args` positionally.
    ///
    /// ```
    /// use msgcat::Template;
    ///
    /// let t = Template::parse("Found %1 items in %2");
    /// assert_eq!(t.render(&["5", "inbox"]).unwrap(), "Found 5 items in inbox");
    /// assert!(t.render(&["5"]).is_err());
    /// ```
    pub fn render<S: AsRef<str>>(&self, args: &[S]) -> Result<String, ArityMismatch> {
        if args.len() != self.arity {
            return Err(ArityMismatch {
                expected: self.arity,
                found: args.len(),
            });
        }
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Arg(index) => out.push_str(args[*index].as_ref()),
            }
        }
        Ok(out)
    }
}

impl From<&str> for Template {
    fn from(source: &str) -> Self {
        Self::parse(source)
    }
}

impl From<String> for Template {
    fn from(source: String) -> Self {
        Self::parse(source)
    }
}
