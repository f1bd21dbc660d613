//! Two-pass tokenizer for `#define` declarations and `:name` placeholders
//!
//! Pass 1 recognises declaration lines document-wide. Pass 2 scans every
//! other line for placeholder references, rejecting anything that belongs to
//! a PostgreSQL `::type` cast. Neither pass looks across a line break.

use regex::Regex;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::OnceLock;

/// A `#define name = value` directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Variable name
    pub name: String,

    /// Literal value, trimmed
    pub value: String,

    /// Line number (1-indexed)
    pub line: usize,
}

/// A `:name` reference in body text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderRef {
    /// Referenced variable name (without the colon)
    pub name: String,

    /// Line number (1-indexed)
    pub line: usize,

    /// Column of the colon (1-indexed, in characters)
    pub column: usize,

    /// Byte range of `:name` within its line
    pub span: Range<usize>,
}

/// One line of source text with its terminator split off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLine<'a> {
    /// Line number (1-indexed)
    pub number: usize,

    /// Line content without terminator
    pub content: &'a str,

    /// `"\n"`, `"\r\n"` or `""` for a final unterminated line
    pub terminator: &'a str,
}

/// Split text into lines, keeping each line's own terminator
pub fn split_lines(text: &str) -> Vec<SourceLine<'_>> {
    text.split_inclusive('\n')
        .enumerate()
        .map(|(idx, piece)| {
            let (content, terminator) = if let Some(content) = piece.strip_suffix("\r\n") {
                (content, "\r\n")
            } else if let Some(content) = piece.strip_suffix('\n') {
                (content, "\n")
            } else {
                (piece, "")
            };

            SourceLine {
                number: idx + 1,
                content,
                terminator,
            }
        })
        .collect()
}

fn declaration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(?:--\s*)?#define\s+([A-Za-z_][A-Za-z0-9_]*)\s*=(.*)$")
            .expect("declaration pattern is valid")
    })
}

fn directive_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(?:--\s*)?#define\b").expect("directive pattern is valid")
    })
}

/// Parse a single line as a declaration.
///
/// The line may carry a leading `--` comment marker. Lines that start like a
/// directive but do not match (e.g. missing `=`) are not declarations.
pub fn parse_declaration(content: &str, line: usize) -> Option<Declaration> {
    let caps = declaration_pattern().captures(content)?;

    Some(Declaration {
        name: caps[1].to_string(),
        value: caps[2].trim().to_string(),
        line,
    })
}

/// Pass 1: every declaration in document order
pub fn scan_declarations(lines: &[SourceLine<'_>]) -> Vec<Declaration> {
    lines
        .iter()
        .filter_map(|l| parse_declaration(l.content, l.number))
        .collect()
}

/// Line numbers of `#define` lines that are not well-formed declarations
pub fn scan_malformed_directives(lines: &[SourceLine<'_>]) -> Vec<usize> {
    lines
        .iter()
        .filter(|l| directive_pattern().is_match(l.content) && !declaration_pattern().is_match(l.content))
        .map(|l| l.number)
        .collect()
}

/// Reduce declarations into a name -> value map, last write wins
pub fn fold_declarations(declarations: &[Declaration]) -> HashMap<String, String> {
    declarations.iter().fold(HashMap::new(), |mut acc, decl| {
        acc.insert(decl.name.clone(), decl.value.clone());
        acc
    })
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Characters allowed directly before a placeholder colon
fn opens_placeholder(prev: Option<u8>) -> bool {
    match prev {
        None => true,
        Some(b) => b.is_ascii_whitespace() || matches!(b, b'(' | b',' | b'='),
    }
}

/// Pass 2: placeholder references in one line
pub fn scan_placeholders(content: &str, line: usize) -> Vec<PlaceholderRef> {
    let bytes = content.as_bytes();
    let len = bytes.len();
    let mut refs = Vec::new();
    let mut i = 0;

    while i < len {
        if bytes[i] != b':' {
            i += 1;
            continue;
        }

        let colon = i;
        while i < len && bytes[i] == b':' {
            i += 1;
        }

        // `::` and longer runs are casts
        if i - colon != 1 {
            continue;
        }

        let prev = colon.checked_sub(1).map(|p| bytes[p]);
        if !opens_placeholder(prev) || i >= len || !is_ident_start(bytes[i]) {
            continue;
        }

        let name_start = i;
        while i < len && is_ident_continue(bytes[i]) {
            i += 1;
        }

        if i < len {
            let next = bytes[i];
            // A lone trailing colon (`:a:b`) is not a placeholder; a cast (`:a::int`) is fine
            let lone_colon = next == b':' && bytes.get(i + 1) != Some(&b':');
            if lone_colon || !next.is_ascii() {
                continue;
            }
        }

        refs.push(PlaceholderRef {
            name: content[name_start..i].to_string(),
            line,
            column: content[..colon].chars().count() + 1,
            span: colon..i,
        });
    }

    refs
}

/// Replace each reference in `content` with its value.
///
/// `refs` must come from `scan_placeholders` on the same line and every
/// name must be present in `values`.
pub fn substitute_line(content: &str, refs: &[PlaceholderRef], values: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;

    for r in refs {
        out.push_str(&content[cursor..r.span.start]);
        match values.get(&r.name) {
            Some(value) => out.push_str(value),
            None => out.push_str(&content[r.span.clone()]),
        }
        cursor = r.span.end;
    }

    out.push_str(&content[cursor..]);
    out
}
