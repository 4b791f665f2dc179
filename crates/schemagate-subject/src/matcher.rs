use crate::error::{Result, SubjectError};

/// Token separator.
pub const SEPARATOR: char = '.';

/// Matches exactly one token.
pub const SINGLE_WILDCARD: &str = "*";

/// Matches every remaining token.
pub const FULL_WILDCARD: &str = ">";

/// Iterate over the tokens of a subject.
pub fn tokens(subject: &str) -> std::str::Split<'_, char> {
    subject.split(SEPARATOR)
}

/// Returns true if a literal subject matches a (possibly wildcarded) pattern.
///
/// Matching is case sensitive and walks the pattern token by token:
/// - `*` consumes one literal token
/// - `>` matches one or more remaining literal tokens
/// - any other token must equal the literal token at the same position
///
/// A literal that runs out before the pattern does not match, even when the
/// next pattern token is `>`. Trailing literal tokens that the pattern does
/// not account for are a mismatch. The pattern itself is not checked for well-formedness; a `>`
/// short-circuits wherever it appears.
pub fn matches(literal: &str, pattern: &str) -> bool {
    if literal == pattern {
        return true;
    }

    let mut literal_tokens = tokens(literal);
    for token in tokens(pattern) {
        let Some(literal_token) = literal_tokens.next() else {
            return false;
        };
        if token == FULL_WILDCARD {
            return true;
        }
        if token != SINGLE_WILDCARD && token != literal_token {
            return false;
        }
    }

    literal_tokens.next().is_none()
}

/// Remove a leading token prefix from `subject`.
///
/// Returns `None` unless `prefix` is a whole-token prefix followed by at
/// least one more character.
pub fn strip_prefix<'a>(subject: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = subject.strip_prefix(prefix)?;
    let rest = rest.strip_prefix(SEPARATOR)?;
    (!rest.is_empty()).then_some(rest)
}

/// Returns true if the subject contains no wildcard token.
pub fn is_literal(subject: &str) -> bool {
    tokens(subject).all(|token| token != SINGLE_WILDCARD && token != FULL_WILDCARD)
}

/// Reject empty subjects and subjects with empty tokens (`a..b`, `.a`, `a.`).
pub fn validate(subject: &str) -> Result<()> {
    if subject.is_empty() || tokens(subject).any(str::is_empty) {
        return Err(SubjectError::Malformed(subject.to_string()));
    }
    if subject.chars().any(char::is_whitespace) {
        return Err(SubjectError::Malformed(subject.to_string()));
    }
    Ok(())
}

/// Reject anything that is not a well-formed literal subject.
pub fn validate_literal(subject: &str) -> Result<()> {
    validate(subject)?;
    if !is_literal(subject) {
        return Err(SubjectError::NotLiteral(subject.to_string()));
    }
    Ok(())
}

/// Ordering key used to pick one pattern when several match a subject.
///
/// Greater is more specific. Fields compare in declaration order:
/// patterns without `>` beat patterns with it, then more literal tokens win,
/// then more tokens win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity {
    bounded: bool,
    literal_tokens: usize,
    tokens: usize,
}

impl Specificity {
    /// Compute the specificity of a pattern.
    pub fn of(pattern: &str) -> Self {
        let mut bounded = true;
        let mut literal_tokens = 0usize;
        let mut count = 0usize;
        for token in tokens(pattern) {
            count += 1;
            match token {
                FULL_WILDCARD => bounded = false,
                SINGLE_WILDCARD => {}
                _ => literal_tokens += 1,
            }
        }
        Self {
            bounded,
            literal_tokens,
            tokens: count,
        }
    }
}
