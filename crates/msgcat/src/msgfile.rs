//! Parser for `.msg` resource files.
//!
//! Message files are written in the legacy Tcl msgcat syntax. This parser
//! understands just enough of that syntax to split statements and words;
//! it extracts the `mcset`/`mcmset`/`mcflset`/`mcflmset` declarations and
//! never evaluates anything. Every other command is skipped.
//!
//! ```text
//! # Hindi
//! ::msgcat::mcset hi "Hello" "नमस्ते"
//! ::msgcat::mcmset hi {
//!     "Bye"      "अलविदा"
//!     "Found %1" "%1 मिले"
//! }
//! namespace eval ::app { mcflset Today आज }
//! ```
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Unbalanced quote, brace or bracket | [`SyntaxError`], file rejected |
//! | Wrong argument count | [`MalformedEntry`], statement skipped |
//! | Locale argument differs from the file's locale | [`MalformedEntry`] |
//! | `$var` / `[cmd]` substitution in a declaration | [`MalformedEntry`] |
//! | Odd-length `mcmset` list | dangling key rejected, other pairs kept |

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::MalformedEntry;
use crate::locale::LocaleTag;

const MAX_NAMESPACE_DEPTH: usize = 16;

/// A fatal, file-level syntax problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// 1-based line where the offending word starts.
    pub line: usize,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for SyntaxError {}

/// Declarations extracted from one message file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFile {
    /// `(key, template)` pairs in file order. Later pairs win on merge.
    pub entries: Vec<(String, String)>,
    /// Entries that were rejected.
    pub issues: Vec<MalformedEntry>,
}

/// Parse message file `source` whose filename encodes `tag`.
///
/// `path` only decorates the reported [`MalformedEntry`] values.
pub fn parse_message_file(
    source: &str,
    tag: &LocaleTag,
    path: Option<&Path>,
) -> Result<MessageFile, SyntaxError> {
    let mut extractor = Extractor {
        tag,
        path: path.map(Path::to_path_buf),
        out: MessageFile::default(),
    };
    let statements = Lexer::new(source, 1, Mode::Script).statements()?;
    extractor.run(statements, 0)?;
    Ok(extractor.out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Newlines and `;` end statements, `$` and `[` are substitutions.
    Script,
    /// Tcl list: every kind of whitespace separates elements.
    List,
}

#[derive(Debug, Clone)]
struct Word {
    text: String,
    /// Brace contents with line continuations left in place, for bodies
    /// that are lexed again.
    verbatim: Option<String>,
    line: usize,
    dynamic: bool,
}

#[derive(Debug)]
struct Statement {
    line: usize,
    words: Vec<Word>,
    problem: Option<String>,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    mode: Mode,
}

impl Lexer {
    fn new(source: &str, first_line: usize, mode: Mode) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: first_line,
            mode,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn is_blank(c: char) -> bool {
        matches!(c, ' ' | '\t' | '\r' | '\x0b' | '\x0c')
    }

    fn at_word_end(&self) -> bool {
        match self.peek() {
            None => true,
            Some(c) if Self::is_blank(c) || c == '\n' => true,
            Some(';') => self.mode == Mode::Script,
            Some('\\') => self.peek_at(1) == Some('\n'),
            Some(_) => false,
        }
    }

    /// Skip blanks and backslash-newline continuations within a statement.
    fn skip_blanks(&mut self) {
        loop {
            match self.peek() {
                Some(c) if Self::is_blank(c) => {
                    self.bump();
                }
                Some('\\') if self.peek_at(1) == Some('\n') => {
                    self.bump();
                    self.bump();
                }
                Some('\n') if self.mode == Mode::List => {
                    self.bump();
                }
                _ => break,
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.bump() {
            match c {
                '\\' => {
                    self.bump();
                }
                '\n' => break,
                _ => {}
            }
        }
    }

    fn skip_to_word_end(&mut self) {
        while !self.at_word_end() {
            self.bump();
        }
    }

    fn statements(mut self) -> Result<Vec<Statement>, SyntaxError> {
        let mut out = Vec::new();
        loop {
            self.skip_blanks();
            match self.peek() {
                None => break,
                Some('\n' | ';') => {
                    self.bump();
                    continue;
                }
                Some('#') => {
                    self.skip_comment();
                    continue;
                }
                Some(_) => {}
            }

            let line = self.line;
            let mut words = Vec::new();
            let mut problem = None;
            loop {
                self.skip_blanks();
                if matches!(self.peek(), None | Some('\n' | ';')) {
                    break;
                }
                match self.word()? {
                    Ok(word) => words.push(word),
                    Err(message) => {
                        problem.get_or_insert(message);
                        self.skip_to_word_end();
                    }
                }
            }
            out.push(Statement {
                line,
                words,
                problem,
            });
        }
        Ok(out)
    }

    fn list(mut self) -> Result<Vec<Word>, String> {
        let mut out = Vec::new();
        loop {
            self.skip_blanks();
            if self.peek().is_none() {
                return Ok(out);
            }
            match self.word() {
                Ok(Ok(word)) => out.push(word),
                Ok(Err(message)) => return Err(message),
                Err(err) => return Err(err.message),
            }
        }
    }

    /// Read one word. The outer error is fatal; the inner one only
    /// invalidates the current statement.
    fn word(&mut self) -> Result<Result<Word, String>, SyntaxError> {
        let line = self.line;
        let mut word = Word {
            text: String::new(),
            verbatim: None,
            line,
            dynamic: false,
        };
        match self.peek() {
            Some('{') => {
                self.bump();
                let mut verbatim = String::new();
                self.braced(&mut word.text, &mut verbatim, line)?;
                word.verbatim = Some(verbatim);
                if !self.at_word_end() {
                    return Ok(Err("extra characters after close-brace".into()));
                }
            }
            Some('"') => {
                self.bump();
                loop {
                    match self.bump() {
                        None => return Err(self.fatal(line, "missing \"")),
                        Some('"') => break,
                        Some(c) => self.word_char(c, &mut word)?,
                    }
                }
                if !self.at_word_end() {
                    return Ok(Err("extra characters after close-quote".into()));
                }
            }
            _ => {
                while !self.at_word_end() {
                    if let Some(c) = self.bump() {
                        self.word_char(c, &mut word)?;
                    }
                }
            }
        }
        Ok(Ok(word))
    }

    fn word_char(&mut self, c: char, word: &mut Word) -> Result<(), SyntaxError> {
        match c {
            '\\' => self.escape(&mut word.text),
            '[' if self.mode == Mode::Script => {
                word.dynamic = true;
                word.text.push('[');
                self.bracketed(&mut word.text)?;
            }
            '$' if self.mode == Mode::Script => {
                word.dynamic |= self.at_variable_name();
                word.text.push('$');
            }
            c => word.text.push(c),
        }
        Ok(())
    }

    /// Whether the text after a `$` starts a variable reference. Anything
    /// else leaves the `$` as literal text.
    fn at_variable_name(&self) -> bool {
        match self.peek() {
            Some(c) if c.is_ascii_alphanumeric() || c == '_' => true,
            Some('{' | '(') => true,
            Some(':') => self.peek_at(1) == Some(':'),
            _ => false,
        }
    }

    fn braced(
        &mut self,
        out: &mut String,
        verbatim: &mut String,
        line: usize,
    ) -> Result<(), SyntaxError> {
        let mut depth = 1usize;
        loop {
            let Some(c) = self.bump() else {
                return Err(self.fatal(line, "missing close-brace"));
            };
            match c {
                '\\' => match self.bump() {
                    Some('\n') => {
                        verbatim.push_str("\\\n");
                        while self.peek().is_some_and(Self::is_blank) {
                            self.bump();
                        }
                        out.push(' ');
                    }
                    Some(next) => {
                        out.push('\\');
                        out.push(next);
                        verbatim.push('\\');
                        verbatim.push(next);
                    }
                    None => return Err(self.fatal(line, "missing close-brace")),
                },
                '{' => {
                    depth += 1;
                    out.push(c);
                    verbatim.push(c);
                }
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                    out.push(c);
                    verbatim.push(c);
                }
                c => {
                    out.push(c);
                    verbatim.push(c);
                }
            }
        }
    }

    /// Copy a `[...]` command substitution verbatim.
    fn bracketed(&mut self, out: &mut String) -> Result<(), SyntaxError> {
        let line = self.line;
        let mut depth = 1usize;
        loop {
            let Some(c) = self.bump() else {
                return Err(self.fatal(line, "missing close-bracket"));
            };
            out.push(c);
            match c {
                '\\' => {
                    if let Some(next) = self.bump() {
                        out.push(next);
                    }
                }
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }

    fn escape(&mut self, out: &mut String) {
        let Some(c) = self.bump() else {
            out.push('\\');
            return;
        };
        let decoded = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0c',
            'v' => '\x0b',
            '\n' => {
                while self.peek().is_some_and(Self::is_blank) {
                    self.bump();
                }
                ' '
            }
            'x' => self.code_point(16, 2).unwrap_or('x'),
            'u' => self.code_point(16, 4).unwrap_or('u'),
            'U' => self.code_point(16, 8).unwrap_or('U'),
            '0'..='7' => {
                self.pos -= 1;
                self.code_point(8, 3).unwrap_or('\0')
            }
            other => other,
        };
        out.push(decoded);
    }

    fn code_point(&mut self, radix: u32, max_digits: usize) -> Option<char> {
        let mut value = 0u32;
        let mut digits = 0;
        while digits < max_digits {
            let Some(digit) = self.peek().and_then(|c| c.to_digit(radix)) else {
                break;
            };
            value = value * radix + digit;
            digits += 1;
            self.pos += 1;
        }
        (digits > 0).then(|| char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    fn fatal(&self, line: usize, message: &str) -> SyntaxError {
        SyntaxError {
            line,
            message: message.to_owned(),
        }
    }
}

struct Extractor<'a> {
    tag: &'a LocaleTag,
    path: Option<PathBuf>,
    out: MessageFile,
}

impl Extractor<'_> {
    fn run(&mut self, statements: Vec<Statement>, depth: usize) -> Result<(), SyntaxError> {
        for statement in statements {
            self.statement(statement, depth)?;
        }
        Ok(())
    }

    fn statement(&mut self, statement: Statement, depth: usize) -> Result<(), SyntaxError> {
        let Some(first) = statement.words.first() else {
            return Ok(());
        };
        let command = command_name(&first.text);
        let is_declaration = matches!(command, "mcset" | "mcmset" | "mcflset" | "mcflmset");

        if let Some(problem) = statement.problem {
            if is_declaration {
                self.issue(statement.line, problem);
            }
            return Ok(());
        }
        if first.dynamic {
            tracing::debug!(line = statement.line, "ignoring dynamic command");
            return Ok(());
        }

        let args = &statement.words[1..];
        let line = statement.line;
        if is_declaration && args.iter().any(|w| w.dynamic) {
            self.issue(line, format!("{command}: substitutions are not supported"));
            return Ok(());
        }

        match command {
            "mcset" => {
                if !(2..=3).contains(&args.len()) {
                    self.issue(line, format!("mcset expects 2 or 3 arguments, got {}", args.len()));
                } else if self.check_locale(line, &args[0]) {
                    self.entry(&args[1], args.get(2));
                }
            }
            "mcflset" => {
                if !(1..=2).contains(&args.len()) {
                    let found = args.len();
                    self.issue(line, format!("mcflset expects 1 or 2 arguments, got {found}"));
                } else {
                    self.entry(&args[0], args.get(1));
                }
            }
            "mcmset" => {
                if args.len() != 2 {
                    self.issue(line, format!("mcmset expects 2 arguments, got {}", args.len()));
                } else if self.check_locale(line, &args[0]) {
                    self.pairs(&args[1]);
                }
            }
            "mcflmset" => {
                if args.len() != 1 {
                    self.issue(line, format!("mcflmset expects 1 argument, got {}", args.len()));
                } else {
                    self.pairs(&args[0]);
                }
            }
            "namespace" if args.len() == 3 && args[0].text == "eval" && !args[2].dynamic => {
                if depth >= MAX_NAMESPACE_DEPTH {
                    self.issue(line, "namespace nesting too deep");
                    return Ok(());
                }
                let body = &args[2];
                let source = body.verbatim.as_deref().unwrap_or(&body.text);
                let nested = Lexer::new(source, body.line, Mode::Script).statements()?;
                self.run(nested, depth + 1)?;
            }
            other => tracing::debug!(line, command = other, "ignoring statement"),
        }
        Ok(())
    }

    fn check_locale(&mut self, line: usize, word: &Word) -> bool {
        let raw = word.text.trim();
        let parsed = if raw.is_empty() || raw.eq_ignore_ascii_case("root") {
            Ok(LocaleTag::root())
        } else {
            LocaleTag::normalize(raw)
        };
        match parsed {
            Ok(tag) if &tag == self.tag => true,
            Ok(tag) => {
                self.issue(
                    line,
                    format!(
                        "entry for locale {:?} in file for locale {:?}",
                        tag.as_str(),
                        self.tag.as_str()
                    ),
                );
                false
            }
            Err(err) => {
                self.issue(line, err.to_string());
                false
            }
        }
    }

    fn pairs(&mut self, list: &Word) {
        let words = match Lexer::new(&list.text, list.line, Mode::List).list() {
            Ok(words) => words,
            Err(message) => {
                self.issue(list.line, format!("malformed translation list: {message}"));
                return;
            }
        };
        let mut chunks = words.chunks_exact(2);
        for pair in &mut chunks {
            self.entry(&pair[0], Some(&pair[1]));
        }
        if let [dangling] = chunks.remainder() {
            self.issue(
                dangling.line,
                format!("missing translation for key {:?}", dangling.text),
            );
        }
    }

    fn entry(&mut self, key: &Word, translation: Option<&Word>) {
        let template = translation.map_or_else(|| key.text.clone(), |t| t.text.clone());
        self.out.entries.push((key.text.clone(), template));
    }

    fn issue(&mut self, line: usize, reason: impl Into<String>) {
        let entry = MalformedEntry {
            path: self.path.clone(),
            line,
            reason: reason.into(),
        };
        tracing::warn!(%entry, "skipping malformed message entry");
        self.out.issues.push(entry);
    }
}

fn command_name(word: &str) -> &str {
    let word = word.strip_prefix("::").unwrap_or(word);
    word.strip_prefix("msgcat::").unwrap_or(word)
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    fn hi() -> LocaleTag {
        LocaleTag::normalize("hi").unwrap()
    }

    fn parse(source: &str) -> MessageFile {
        parse_message_file(source, &hi(), None).unwrap()
    }

    fn pairs(file: &MessageFile) -> Vec<(&str, &str)> {
        file.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn mcset_forms() {
        let file = parse(
            "::msgcat::mcset hi \"Hello\" \"नमस्ते\"\n\
             msgcat::mcset hi Bye अलविदा\n\
             mcset HI {Good Morning} {शुभ प्रभात}\n\
             mcset hi Same\n",
        );
        assert_eq!(
            pairs(&file),
            [
                ("Hello", "नमस्ते"),
                ("Bye", "अलविदा"),
                ("Good Morning", "शुभ प्रभात"),
                ("Same", "Same"),
            ]
        );
        assert!(file.issues.is_empty());
    }

    #[test]
    fn comments_blank_lines_and_semicolons() {
        let file = parse(
            "# a comment ; mcset hi Fake Entry\n\n   \n\
             mcset hi A a; mcset hi B b\n\
             \t# indented comment\n",
        );
        assert_eq!(pairs(&file), [("A", "a"), ("B", "b")]);
    }

    #[test]
    fn mcmset_pairs_across_lines() {
        let file = parse(
            "::msgcat::mcmset hi {\n\
                 \"Yesterday\" \"बीता हुआ कल\"\n\
                 Tomorrow कल\n\
             }\n",
        );
        assert_eq!(
            pairs(&file),
            [("Yesterday", "बीता हुआ कल"), ("Tomorrow", "कल")]
        );
    }

    #[test]
    fn mcmset_odd_list_keeps_complete_pairs() {
        let file = parse("mcmset hi {\n  a A\n  b B\n  dangling\n}\n");
        assert_eq!(pairs(&file), [("a", "A"), ("b", "B")]);
        assert_eq!(file.issues.len(), 1);
        assert_eq!(file.issues[0].line, 4);
        assert!(file.issues[0].reason.contains("dangling"));
    }

    #[test]
    fn file_locale_commands() {
        let file = parse("mcflset Today आज\nmcflmset {Yesterday कल}\n");
        assert_eq!(pairs(&file), [("Today", "आज"), ("Yesterday", "कल")]);
    }

    #[test]
    fn backslash_escapes() {
        let file = parse(r#"mcset hi "Line\nBreak" "tab\there \"quoted\" क \x41 \101 \$5""#);
        assert_eq!(
            pairs(&file),
            [("Line\nBreak", "tab\there \"quoted\" क A A $5")]
        );
    }

    #[test]
    fn braces_are_literal() {
        let file = parse(r"mcset hi {a \n {nested} $x} ok");
        assert_eq!(pairs(&file), [(r"a \n {nested} $x", "ok")]);
    }

    #[test]
    fn line_continuation() {
        let file = parse("mcset hi \\\n    Key \\\n    Value\nmcset hi Next next\n");
        assert_eq!(pairs(&file), [("Key", "Value"), ("Next", "next")]);
    }

    #[test]
    fn wrong_arity_is_malformed() {
        let file = parse("mcset hi\nmcset hi a b c\nmcset hi ok fine\n");
        assert_eq!(pairs(&file), [("ok", "fine")]);
        let lines: Vec<usize> = file.issues.iter().map(|i| i.line).collect();
        assert_eq!(lines, [1, 2]);
    }

    #[test]
    fn foreign_locale_is_malformed() {
        let file = parse("mcset mr Hello नमस्कार\nmcset hi Hello नमस्ते\n");
        assert_eq!(pairs(&file), [("Hello", "नमस्ते")]);
        assert_eq!(file.issues.len(), 1);
        assert!(file.issues[0].reason.contains("\"mr\""));
    }

    #[test]
    fn substitutions_are_rejected() {
        let file = parse(
            "mcset hi Hello $greeting\n\
             mcset hi Now [clock seconds]\n\
             mcset hi Path $::env(HOME)\n\
             mcset hi Braced ${name}\n\
             mcset hi Ok ok\n",
        );
        assert_eq!(pairs(&file), [("Ok", "ok")]);
        assert_eq!(file.issues.len(), 4);
    }

    #[test]
    fn lone_dollar_is_literal() {
        let file = parse(
            "mcset hi Price \"US$ %1\"\n\
             mcset hi Tip {costs $ 5}\n\
             mcset hi Lone \"$\"\n\
             mcset hi Trailing 5$\n",
        );
        assert_eq!(
            pairs(&file),
            [
                ("Price", "US$ %1"),
                ("Tip", "costs $ 5"),
                ("Lone", "$"),
                ("Trailing", "5$"),
            ]
        );
        assert!(file.issues.is_empty());
    }

    #[test]
    fn other_commands_are_ignored() {
        let file = parse(
            "package require msgcat\n\
             set x [exec rm -rf /]\n\
             proc evil {} { exit }\n\
             puts hello\n\
             mcset hi Kept kept\n",
        );
        assert_eq!(pairs(&file), [("Kept", "kept")]);
        assert!(file.issues.is_empty());
    }

    #[test]
    fn namespace_eval_bodies_are_scanned() {
        let file = parse(
            "namespace eval ::app {\n\
                 namespace import ::msgcat::*\n\
                 mcset hi Inner भीतर\n\
                 namespace eval sub { mcflset Deep गहरा }\n\
             }\n",
        );
        assert_eq!(pairs(&file), [("Inner", "भीतर"), ("Deep", "गहरा")]);
    }

    #[test]
    fn nested_issue_line_counts_continuations() {
        let file = parse("namespace eval app {\n  mcset hi a \\\n    b\n  mcset hi\n}\n");
        assert_eq!(pairs(&file), [("a", "b")]);
        let lines: Vec<usize> = file.issues.iter().map(|i| i.line).collect();
        assert_eq!(lines, [4]);
    }

    #[test]
    fn braced_continuation_folds_to_space() {
        let file = parse("mcset hi Long {first\\\n    second}\n");
        assert_eq!(pairs(&file), [("Long", "first second")]);
    }

    #[test]
    fn nested_issue_reports_absolute_line() {
        let file = parse("# header\nnamespace eval app {\n\n  mcset hi only\n  mcset hi\n}\n");
        assert_eq!(pairs(&file), [("only", "only")]);
        assert_eq!(file.issues.len(), 1);
        assert_eq!(file.issues[0].line, 5);
    }

    #[test]
    fn extra_characters_after_quote() {
        let file = parse("mcset hi \"a\"b c\nmcset hi d e\n");
        assert_eq!(pairs(&file), [("d", "e")]);
        assert_eq!(file.issues.len(), 1);
        assert!(file.issues[0].reason.contains("close-quote"));
    }

    #[test]
    fn unterminated_quote_is_fatal() {
        let err = parse_message_file("mcset hi ok ok\nmcset hi \"open\n", &hi(), None).unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.message, "missing \"");
    }

    #[test]
    fn unterminated_brace_is_fatal() {
        let err = parse_message_file("mcmset hi {\n a b\n", &hi(), None).unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.message, "missing close-brace");
    }

    #[test]
    fn root_file_accepts_empty_locale() {
        let source = "mcset {} Hello Hello\nmcset ROOT Bye Bye\n";
        let file = parse_message_file(source, &LocaleTag::root(), None).unwrap();
        assert_eq!(pairs(&file), [("Hello", "Hello"), ("Bye", "Bye")]);
    }

    #[test]
    fn issues_carry_path() {
        let path = Path::new("msgs/hi.msg");
        let file = parse_message_file("mcset hi\n", &hi(), Some(path)).unwrap();
        assert_eq!(file.issues[0].path.as_deref(), Some(path));
    }

    #[test]
    #[traced_test]
    fn malformed_entries_are_logged() {
        let file = parse("mcset hi\nmcset hi ok fine\n");
        assert_eq!(pairs(&file), [("ok", "fine")]);
        assert!(logs_contain("skipping malformed message entry"));
    }
}
