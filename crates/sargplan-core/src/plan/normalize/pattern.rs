use crate::{
    expr::{Expr, PatternKind},
    value::Value,
};
use regex_syntax::{
    ParserBuilder,
    hir::{Class, Hir, HirKind, Literal},
};

///
/// PatternPrefix
///
/// Literal prefix of a LIKE or REGEXP_LIKE pattern.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct PatternPrefix {
    pub prefix: String,

    /// The pattern is the prefix itself, with no wildcard at all.
    pub complete: bool,

    /// The pattern is the prefix followed only by a match-anything suffix.
    pub exact: bool,
}

impl PatternPrefix {
    const fn none() -> Self {
        Self {
            prefix: String::new(),
            complete: false,
            exact: false,
        }
    }

    pub(crate) fn of(kind: PatternKind, pattern: &str) -> Self {
        match kind {
            PatternKind::Like => like_prefix(pattern),
            PatternKind::Regex => regex_prefix(pattern),
        }
    }

    /// Bounds of the text range holding every string that starts with the
    /// prefix: `[prefix, successor)`. With no successor the range ends
    /// below the first array.
    pub(crate) fn bounds(&self) -> (Expr, Expr) {
        let high = successor(&self.prefix).map_or_else(
            || Expr::Constant(Value::empty_array()),
            |s| Expr::Constant(Value::Text(s)),
        );

        (Expr::Constant(Value::Text(self.prefix.clone())), high)
    }
}

fn like_prefix(pattern: &str) -> PatternPrefix {
    let mut prefix = String::new();
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        match c {
            '%' => {
                let exact = chars.all(|rest| rest == '%');
                return PatternPrefix {
                    prefix,
                    complete: false,
                    exact,
                };
            }
            '_' => {
                return PatternPrefix {
                    prefix,
                    ..PatternPrefix::none()
                };
            }
            '\\' => match chars.next() {
                Some(escaped) => prefix.push(escaped),
                None => return PatternPrefix::none(),
            },
            other => prefix.push(other),
        }
    }

    PatternPrefix {
        prefix,
        complete: true,
        exact: true,
    }
}

// Parsed with `s` on so `.` matches what the evaluator's `.` matches.
fn regex_prefix(pattern: &str) -> PatternPrefix {
    let Ok(hir) = ParserBuilder::new()
        .dot_matches_new_line(true)
        .build()
        .parse(pattern)
    else {
        return PatternPrefix::none();
    };

    let parts = match hir.kind() {
        HirKind::Concat(parts) => parts.as_slice(),
        _ => std::slice::from_ref(&hir),
    };

    let mut prefix = String::new();
    let mut rest = parts;
    while let Some((first, tail)) = rest.split_first() {
        let HirKind::Literal(Literal(bytes)) = first.kind() else {
            break;
        };
        let Ok(text) = std::str::from_utf8(bytes) else {
            return PatternPrefix::none();
        };
        prefix.push_str(text);
        rest = tail;
    }

    match rest {
        [] => PatternPrefix {
            prefix,
            complete: true,
            exact: true,
        },
        [tail] => PatternPrefix {
            prefix,
            complete: false,
            exact: matches_anything(tail),
        },
        _ => PatternPrefix {
            prefix,
            ..PatternPrefix::none()
        },
    }
}

// `.*` under `s`, possibly inside a capture group.
fn matches_anything(hir: &Hir) -> bool {
    match hir.kind() {
        HirKind::Capture(capture) => matches_anything(&capture.sub),
        HirKind::Repetition(rep) if rep.min == 0 && rep.max.is_none() => match rep.sub.kind() {
            HirKind::Class(Class::Unicode(class)) => {
                matches!(class.ranges(), [r] if r.start() == '\0' && r.end() == char::MAX)
            }
            _ => false,
        },
        _ => false,
    }
}

/// The pattern a suffix of the text must match for the whole text to match,
/// once a leading match-anything part is dropped. `None` when the pattern
/// does not start with one or nothing is left after it.
pub(crate) fn suffix_pattern(kind: PatternKind, pattern: &str) -> Option<String> {
    match kind {
        PatternKind::Like => {
            let suffix = pattern.trim_start_matches('%');
            (suffix.len() < pattern.len() && !suffix.is_empty()).then(|| suffix.to_string())
        }
        PatternKind::Regex => regex_suffix(pattern),
    }
}

fn regex_suffix(pattern: &str) -> Option<String> {
    let hir = ParserBuilder::new()
        .dot_matches_new_line(true)
        .build()
        .parse(pattern)
        .ok()?;
    let HirKind::Concat(parts) = hir.kind() else {
        return None;
    };
    let (first, rest) = parts.split_first()?;
    if rest.is_empty() || !matches_anything(first) {
        return None;
    }

    Some(Hir::concat(rest.to_vec()).to_string())
}

/// LIKE pattern matching `text` literally.
pub(crate) fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }

    out
}

/// Least string greater than every string starting with `prefix`.
pub(crate) fn successor(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();

    while let Some(last) = chars.pop() {
        if let Some(next) = next_char(last) {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }

    None
}

fn next_char(c: char) -> Option<char> {
    match c {
        '\u{D7FF}' => Some('\u{E000}'),
        char::MAX => None,
        c => char::from_u32(u32::from(c) + 1),
    }
}
