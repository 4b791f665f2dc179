use serde::{Deserialize, Serialize};

/// Dialect assumed when a schema does not name one.
pub const DEFAULT_KIND: &str = "jsonschema";

/// A registered validation schema.
///
/// Serialized with the wire names `name`, `subject`, `revision`, `type` and
/// `body`. `revision` is left out when zero, which is how records are
/// written to the store: the store assigns revisions, the record never does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Unique name. Always taken from the request address or store key.
    #[serde(default)]
    pub name: String,
    /// Subject pattern this schema governs. May contain `*` and `>`.
    #[serde(rename = "subject")]
    pub subject_pattern: String,
    /// Store-assigned version stamp.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub revision: u64,
    /// Validation dialect tag.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Schema definition in the dialect's own syntax.
    pub body: String,
}

impl Schema {
    /// Dialect tag, with an empty tag resolved to [`DEFAULT_KIND`].
    pub fn dialect(&self) -> &str {
        if self.kind.is_empty() {
            DEFAULT_KIND
        } else {
            &self.kind
        }
    }
}

fn is_zero(revision: &u64) -> bool {
    *revision == 0
}
