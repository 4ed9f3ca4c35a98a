use std::fmt;

use crate::Error;

/// A GraphQL operation document.
///
/// Documents built from plain strings are sent as they are. Documents built
/// with [`Document::parse`] are validated and carry the name of their
/// operation when the document defines exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    source: String,
    operation_name: Option<String>,
}

impl Document {
    pub fn raw(source: impl Into<String>) -> Self {
        Document {
            source: source.into(),
            operation_name: None,
        }
    }

    pub fn parse(source: impl Into<String>) -> Result<Self, Error> {
        let source = source.into();
        let operation_name = operation_name(&source)?;

        Ok(Document { source, operation_name })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }
}

/// Name of the single operation defined in `source`. Anonymous operations and
/// documents with zero or several operations have no name, the server picks
/// the default.
pub fn operation_name(source: &str) -> Result<Option<String>, Error> {
    let document =
        cynic_parser::parse_executable_document(source).map_err(|err| Error::InvalidDocument(err.to_string()))?;

    let mut operations = document.operations();

    let (Some(operation), None) = (operations.next(), operations.next()) else {
        return Ok(None);
    };

    Ok(operation.name().map(str::to_string))
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl From<&str> for Document {
    fn from(source: &str) -> Self {
        Document::raw(source)
    }
}

impl From<String> for Document {
    fn from(source: String) -> Self {
        Document::raw(source)
    }
}

impl From<&String> for Document {
    fn from(source: &String) -> Self {
        Document::raw(source.as_str())
    }
}
