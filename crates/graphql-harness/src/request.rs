use crate::{Document, Error};

/// The JSON payload sent to the server.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Value>,
}

/// Operation state shared by the HTTP and websocket builders.
#[derive(Debug, Default)]
pub(crate) struct Operation {
    document: Option<Document>,
    operation_name: Option<String>,
    variables: Option<serde_json::Value>,
    // configuration calls can't fail, the error of the latest call is reported on execution
    error: Option<ConfigurationError>,
}

#[derive(Debug, Clone)]
enum ConfigurationError {
    Document(String),
    Variables(String),
}

impl From<ConfigurationError> for Error {
    fn from(value: ConfigurationError) -> Self {
        match value {
            ConfigurationError::Document(message) => Error::InvalidDocument(message),
            ConfigurationError::Variables(message) => Error::InvalidVariables(message),
        }
    }
}

impl Operation {
    /// Replaces the document and clears previously set variables, along with
    /// any error an earlier document or variables call left behind.
    pub(crate) fn set_document(&mut self, document: Document) {
        self.operation_name = document.operation_name().map(str::to_string);
        self.document = Some(document);
        self.variables = None;
        self.error = None;
    }

    pub(crate) fn set_document_source(&mut self, document: Result<Document, Error>) {
        match document {
            Ok(document) => self.set_document(document),
            Err(Error::InvalidDocument(message)) => self.defer(ConfigurationError::Document(message)),
            Err(error) => self.defer(ConfigurationError::Document(error.to_string())),
        }
    }

    pub(crate) fn set_variables(&mut self, variables: impl serde::Serialize) {
        match serde_json::to_value(variables) {
            Ok(variables) => {
                self.variables = Some(variables).filter(|variables| !variables.is_null());
                if matches!(self.error, Some(ConfigurationError::Variables(_))) {
                    self.error = None;
                }
            }
            Err(err) => self.defer(ConfigurationError::Variables(err.to_string())),
        }
    }

    pub(crate) fn set_operation_name(&mut self, name: impl Into<String>) {
        self.operation_name = Some(name.into());
    }

    fn defer(&mut self, error: ConfigurationError) {
        // a document error outlives later variables calls
        if matches!(
            (&self.error, &error),
            (Some(ConfigurationError::Document(_)), ConfigurationError::Variables(_))
        ) {
            return;
        }

        self.error = Some(error);
    }

    pub(crate) fn to_request(&self) -> Result<GraphqlRequest, Error> {
        if let Some(error) = &self.error {
            return Err(error.clone().into());
        }

        let document = self.document.as_ref().ok_or(Error::MissingOperation)?;

        Ok(GraphqlRequest {
            query: document.as_str().to_string(),
            operation_name: self.operation_name.clone(),
            variables: self.variables.clone(),
        })
    }

    pub(crate) fn into_request(mut self) -> Result<GraphqlRequest, Error> {
        if let Some(error) = self.error.take() {
            return Err(error.into());
        }

        let document = self.document.ok_or(Error::MissingOperation)?;

        Ok(GraphqlRequest {
            query: document.as_str().to_string(),
            operation_name: self.operation_name,
            variables: self.variables,
        })
    }
}
