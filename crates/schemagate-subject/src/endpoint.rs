use std::fmt;

use crate::matcher::{self, SEPARATOR};

/// Default prefix of the schemagate API address space.
pub const DEFAULT_API_PREFIX: &str = "$SCHEMA";

/// API operation selected by the token after the prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Register,
    Update,
    Unregister,
    Get,
    Validate,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Register,
        Operation::Update,
        Operation::Unregister,
        Operation::Get,
        Operation::Validate,
    ];

    /// Address token for this operation.
    pub fn token(self) -> &'static str {
        match self {
            Operation::Register => "REGISTER",
            Operation::Update => "UPDATE",
            Operation::Unregister => "UNREGISTER",
            Operation::Get => "GET",
            Operation::Validate => "VALIDATE",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.token() == token)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A parsed API address: `<prefix>.<OPERATION>.<target>`.
///
/// For `VALIDATE` the target is the governed subject and may span several
/// tokens. For every other operation it is a single schema name token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint<'a> {
    pub operation: Operation,
    pub target: &'a str,
}

impl<'a> Endpoint<'a> {
    /// Parse an inbound subject under `prefix`.
    pub fn parse(subject: &'a str, prefix: &str) -> Option<Self> {
        let rest = matcher::strip_prefix(subject, prefix)?;
        let (op_token, target) = rest.split_once(SEPARATOR)?;
        let operation = Operation::from_token(op_token)?;

        matcher::validate_literal(target).ok()?;
        if operation != Operation::Validate && target.contains(SEPARATOR) {
            return None;
        }

        Some(Self { operation, target })
    }

    /// Build the address for `operation` on `target`.
    pub fn address(prefix: &str, operation: Operation, target: &str) -> String {
        format!("{prefix}{SEPARATOR}{}{SEPARATOR}{target}", operation.token())
    }

    /// Subscription pattern covering one operation, e.g. `$SCHEMA.GET.*`.
    pub fn pattern(prefix: &str, operation: Operation) -> String {
        let tail = match operation {
            Operation::Validate => matcher::FULL_WILDCARD,
            _ => matcher::SINGLE_WILDCARD,
        };
        Self::address(prefix, operation, tail)
    }

    /// Subject prefix stripped from validation requests, e.g. `$SCHEMA.VALIDATE`.
    pub fn validate_prefix(prefix: &str) -> String {
        format!("{prefix}{SEPARATOR}{}", Operation::Validate.token())
    }
}
