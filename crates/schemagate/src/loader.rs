use std::io::Read;
use std::path::Path;

use schemagate_store::{validate_key, Schema};

/// Suffix of schema files.
pub const SCHEMA_FILE_SUFFIX: &str = ".schema.json";

/// Errors that can occur while loading a schema directory.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The directory or a file could not be read.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A schema file was rejected before parsing.
    #[error("{0}")]
    Rejected(String),

    /// A schema file is not a valid schema document.
    #[error("invalid schema file {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Limits applied by [`load_dir`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Maximum number of schema files in one directory.
    pub max_files: usize,
    /// Maximum size of one schema file in bytes.
    pub max_file_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_files: 256,
            max_file_size: 256 * 1024,
        }
    }
}

/// Load every `<name>.schema.json` file in `dir` with default limits.
pub fn load_dir(dir: &Path) -> Result<Vec<Schema>, LoadError> {
    load_dir_with_config(dir, LoaderConfig::default())
}

/// Load every `<name>.schema.json` file in `dir`, sorted by name.
///
/// The schema name comes from the file name and overrides any `name` in the
/// document. Symlinked schema files are refused; other files are ignored.
pub fn load_dir_with_config(dir: &Path, config: LoaderConfig) -> Result<Vec<Schema>, LoadError> {
    let entries = std::fs::read_dir(dir).map_err(|source| LoadError::Io {
        context: dir.display().to_string(),
        source,
    })?;

    let mut schemas = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoadError::Io {
            context: dir.display().to_string(),
            source,
        })?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let Some(name) = file_name.strip_suffix(SCHEMA_FILE_SUFFIX) else {
            continue;
        };

        let path = entry.path();
        let metadata = std::fs::symlink_metadata(&path).map_err(|source| LoadError::Io {
            context: path.display().to_string(),
            source,
        })?;
        if metadata.file_type().is_symlink() {
            return Err(LoadError::Rejected(format!(
                "refusing to load schema symlink: {file_name}"
            )));
        }
        if !metadata.is_file() {
            continue;
        }
        if validate_key(name).is_err() || name.contains('.') {
            return Err(LoadError::Rejected(format!(
                "invalid schema name in file name: {file_name}"
            )));
        }

        if schemas.len() >= config.max_files {
            return Err(LoadError::Rejected(format!(
                "schema count exceeds configured max ({})",
                config.max_files
            )));
        }

        let content = read_limited(&path, &file_name, config.max_file_size)?;
        let mut schema: Schema =
            serde_json::from_str(&content).map_err(|source| LoadError::Parse {
                file: file_name.clone(),
                source,
            })?;
        schema.name = name.to_string();
        schema.revision = 0;
        schemas.push(schema);
    }

    schemas.sort_by(|a, b| a.name.cmp(&b.name));
    tracing::debug!(dir = %dir.display(), count = schemas.len(), "loaded schema files");
    Ok(schemas)
}

fn read_limited(path: &Path, file_name: &str, max_bytes: usize) -> Result<String, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        context: format!("failed opening schema {}", path.display()),
        source,
    })?;
    let len = file
        .metadata()
        .map_err(|source| LoadError::Io {
            context: path.display().to_string(),
            source,
        })?
        .len();
    if len > max_bytes as u64 {
        return Err(LoadError::Rejected(format!(
            "schema file too large ({len} bytes): {file_name}"
        )));
    }

    // The file may grow between the size check and the read.
    let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
    let mut content = String::new();
    file.take(read_limit)
        .read_to_string(&mut content)
        .map_err(|source| LoadError::Io {
            context: format!("failed reading schema {}", path.display()),
            source,
        })?;
    if content.len() > max_bytes {
        return Err(LoadError::Rejected(format!(
            "schema file too large while reading: {file_name}"
        )));
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    const NUMBERS: &str = r#"{"subject":"numbers.>","body":"{\"type\":\"number\"}"}"#;

    fn make_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "schemagate-loader-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(dir: &Path, file_name: &str, contents: &str) {
        std::fs::write(dir.join(file_name), contents.as_bytes()).unwrap();
    }

    #[test]
    fn loads_schema_files_sorted_by_name() {
        let dir = make_temp_dir("sorted");
        write(&dir, "numbers.schema.json", NUMBERS);
        write(
            &dir,
            "letters.schema.json",
            r#"{"name":"ignored","subject":"letters.*","type":"jsonschema","body":"{}"}"#,
        );
        write(&dir, "README.md", "not a schema");

        let schemas = load_dir(&dir).unwrap();
        let names: Vec<_> = schemas.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["letters", "numbers"]);
        assert_eq!(schemas[0].kind, "jsonschema");
        assert_eq!(schemas[1].dialect(), "jsonschema");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rejects_bad_documents_and_names() {
        let dir = make_temp_dir("bad-doc");
        write(&dir, "numbers.schema.json", "{oops");
        assert!(matches!(load_dir(&dir), Err(LoadError::Parse { .. })));
        let _ = std::fs::remove_dir_all(&dir);

        let dir = make_temp_dir("bad-name");
        write(&dir, "a.b.schema.json", NUMBERS);
        assert!(matches!(load_dir(&dir), Err(LoadError::Rejected(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn enforces_count_and_size_limits() {
        let dir = make_temp_dir("limits");
        write(&dir, "a.schema.json", NUMBERS);
        write(&dir, "b.schema.json", NUMBERS);

        let err = load_dir_with_config(
            &dir,
            LoaderConfig {
                max_files: 1,
                ..LoaderConfig::default()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("schema count exceeds"));

        let err = load_dir_with_config(
            &dir,
            LoaderConfig {
                max_file_size: 8,
                ..LoaderConfig::default()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("too large"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn refuses_symlinked_schema_files() {
        let dir = make_temp_dir("symlink");
        write(&dir, "real.json", NUMBERS);
        std::os::unix::fs::symlink(dir.join("real.json"), dir.join("numbers.schema.json"))
            .unwrap();

        let err = load_dir(&dir).unwrap_err();
        assert!(err.to_string().contains("symlink"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = make_temp_dir("missing").join("nope");
        assert!(matches!(load_dir(&dir), Err(LoadError::Io { .. })));
    }
}
