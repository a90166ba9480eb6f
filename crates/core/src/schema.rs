use std::fmt::{self, Display};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::error::{ConfigurationError, ConfigurationErrorKind};

/// The textual description of the store's data model.
///
/// The schema is loaded once and shared by every run. It is shown to the
/// planner verbatim inside the system message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Schema(Arc<str>);

impl Schema {
    /// Creates a schema from text.
    ///
    /// Returns an error if the text is blank.
    pub fn new<S: Into<String>>(text: S) -> Result<Self, ConfigurationError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ConfigurationError::new(
                ConfigurationErrorKind::MissingSchema,
                "schema is empty",
            ));
        }
        Ok(Self(text.into()))
    }

    /// Reads the schema from a file.
    pub fn from_file<P: AsRef<Path>>(
        path: P,
    ) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| {
            ConfigurationError::new(
                ConfigurationErrorKind::MissingSchema,
                format!("failed to read {}: {err}", path.display()),
            )
        })?;
        debug!("loaded schema from {}", path.display());
        Self::new(text)
    }

    /// Returns the schema text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds the system message from the instructions and this schema.
    pub(crate) fn system_prompt(&self, instructions: &str) -> String {
        format!(
            "{}\n\n<GRAPH_SCHEMA>\n{}\n</GRAPH_SCHEMA>",
            instructions.trim_end(),
            self.0.trim()
        )
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_schema() {
        let err = Schema::new(" \n").unwrap_err();
        assert_eq!(err.kind(), ConfigurationErrorKind::MissingSchema);
    }

    #[test]
    fn test_missing_file() {
        let err = Schema::from_file("/definitely/not/here.schema").unwrap_err();
        assert_eq!(err.kind(), ConfigurationErrorKind::MissingSchema);
        assert!(err.reason().contains("not/here.schema"));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir()
            .join(format!("grounded-agent-schema-{}", std::process::id()));
        fs::write(&path, "Node person(name STRING)\n").unwrap();
        let schema = Schema::from_file(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(schema.as_str(), "Node person(name STRING)\n");
    }

    #[test]
    fn test_system_prompt() {
        let schema = Schema::new("Node person(name STRING)\n").unwrap();
        assert_eq!(
            schema.system_prompt("Be precise.\n"),
            "Be precise.\n\n<GRAPH_SCHEMA>\nNode person(name STRING)\n\
             </GRAPH_SCHEMA>"
        );
    }
}
