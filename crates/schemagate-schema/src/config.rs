/// Controls how the built-in JSON Schema dialect compiles and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectConfig {
    /// When true, object schemas reject properties they do not declare.
    pub strict_objects: bool,
    /// Maximum number of error descriptions reported per payload.
    pub max_errors: usize,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self {
            strict_objects: false,
            max_errors: 16,
        }
    }
}
