//! Line classification for DBC source text.
//!
//! A DBC file is processed one line at a time. Each line is split into
//! whitespace-delimited tokens and tagged with a [`LineKind`] determined by its
//! first token. The only state carried between lines is whether a `NS_`
//! (new symbols) block is open; its body runs until the next blank line and is
//! ignored.

use alloc::vec::Vec;

/// Keyword of a message definition.
pub const MESSAGE_KEYWORD: &str = "BO_";
/// Keyword of a signal definition.
pub const SIGNAL_KEYWORD: &str = "SG_";
/// Keyword of a signal value type directive.
pub const VALUE_TYPE_KEYWORD: &str = "SIG_VALTYPE_";
/// Keyword opening the new symbols block.
pub const NAMESPACE_KEYWORD: &str = "NS_";

/// Kind of a DBC line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// `BO_` message definition
    Message,
    /// `SG_` signal definition
    Signal,
    /// `SIG_VALTYPE_` storage type override
    ValueType,
    /// `NS_` marker, toggles the ignored block
    Namespace,
    /// Anything else, or any line inside the `NS_` block
    Ignored,
}

impl LineKind {
    /// The record keyword, for diagnostics.
    pub fn keyword(self) -> &'static str {
        match self {
            LineKind::Message => MESSAGE_KEYWORD,
            LineKind::Signal => SIGNAL_KEYWORD,
            LineKind::ValueType => VALUE_TYPE_KEYWORD,
            LineKind::Namespace => NAMESPACE_KEYWORD,
            LineKind::Ignored => "",
        }
    }
}

/// Split a line into tokens.
///
/// Tokens are separated by whitespace, except inside double quotes: a quoted
/// span stays part of its token, quotes included, so `"km h"` is one token.
pub fn tokenize(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = None;
    let mut in_quotes = false;

    for (i, c) in line.char_indices() {
        if c == '"' {
            in_quotes = !in_quotes;
            start.get_or_insert(i);
        } else if c.is_whitespace() && !in_quotes {
            if let Some(s) = start.take() {
                tokens.push(&line[s..i]);
            }
        } else {
            start.get_or_insert(i);
        }
    }

    if let Some(s) = start {
        tokens.push(&line[s..]);
    }

    tokens
}

/// Classify a tokenized line.
///
/// Returns the kind and the new state of the namespace flag. A blank line
/// closes an open namespace block; another `NS_` marker toggles it.
pub fn classify(tokens: &[&str], in_namespace: bool) -> (LineKind, bool) {
    let first = tokens.first().copied().unwrap_or("");

    if first == NAMESPACE_KEYWORD {
        return (LineKind::Namespace, !in_namespace);
    }
    if in_namespace {
        return (LineKind::Ignored, !first.is_empty());
    }

    let kind = match first {
        MESSAGE_KEYWORD => LineKind::Message,
        SIGNAL_KEYWORD => LineKind::Signal,
        VALUE_TYPE_KEYWORD => LineKind::ValueType,
        _ => LineKind::Ignored,
    };
    (kind, false)
}

/// A classified line that carries a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<'a> {
    /// 1-based line number
    pub line: usize,
    /// Record kind, never `Namespace` or `Ignored`
    pub kind: LineKind,
    /// Tokens including the keyword
    pub tokens: Vec<&'a str>,
}

/// Iterator over the records of a DBC source, in file order.
///
/// Ignored lines and the `NS_` block are skipped.
pub struct Lexer<'a> {
    lines: core::iter::Enumerate<core::str::Lines<'a>>,
    in_namespace: bool,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over DBC source text.
    pub fn new(source: &'a str) -> Self {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        Self {
            lines: source.lines().enumerate(),
            in_namespace: false,
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Record<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        for (idx, line) in self.lines.by_ref() {
            let tokens = tokenize(line);
            let (kind, in_namespace) = classify(&tokens, self.in_namespace);
            self.in_namespace = in_namespace;

            match kind {
                LineKind::Message | LineKind::Signal | LineKind::ValueType => {
                    return Some(Record {
                        line: idx + 1,
                        kind,
                        tokens,
                    });
                }
                LineKind::Namespace | LineKind::Ignored => {}
            }
        }
        None
    }
}
