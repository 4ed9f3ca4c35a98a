//! Checks run against a result before it is handed back to the test.
//!
//! Assertions are declared while the request is being built and only run once
//! it executes, so each one remembers where it was declared. A failure points
//! both at that line and at the place the error itself was raised.

use std::{fmt, panic::Location};

use crate::ExecutionResult;

type Check = dyn Fn(&ExecutionResult) -> Option<AssertionError> + Send + Sync;

pub struct Assertion {
    check: Box<Check>,
    declared_at: &'static Location<'static>,
}

impl Assertion {
    #[track_caller]
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&ExecutionResult) -> Option<AssertionError> + Send + Sync + 'static,
    {
        Assertion {
            check: Box::new(check),
            declared_at: Location::caller(),
        }
    }

    #[track_caller]
    pub fn no_errors() -> Self {
        Assertion::new(no_errors)
    }

    pub fn declared_at(&self) -> &'static Location<'static> {
        self.declared_at
    }

    pub fn run(&self, result: &ExecutionResult) -> Result<(), AssertionError> {
        match (self.check)(result) {
            Some(error) => Err(error.with_declaration(self.declared_at)),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assertion")
            .field("declared_at", &self.declared_at)
            .finish_non_exhaustive()
    }
}

/// Assertions in registration order.
#[derive(Debug, Default)]
pub struct Assertions(Vec<Assertion>);

impl Assertions {
    pub fn push(&mut self, assertion: Assertion) {
        self.0.push(assertion);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stops at the first failure.
    pub fn run(&self, result: &ExecutionResult) -> Result<(), AssertionError> {
        self.0.iter().try_for_each(|assertion| assertion.run(result))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionError {
    message: String,
    raised_at: &'static Location<'static>,
    declared_at: Option<&'static Location<'static>>,
}

impl AssertionError {
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        AssertionError {
            message: message.into(),
            raised_at: Location::caller(),
            declared_at: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn raised_at(&self) -> &'static Location<'static> {
        self.raised_at
    }

    pub fn declared_at(&self) -> Option<&'static Location<'static>> {
        self.declared_at
    }

    fn with_declaration(mut self, declared_at: &'static Location<'static>) -> Self {
        self.declared_at = Some(declared_at);
        self
    }
}

impl fmt::Display for AssertionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.message)?;
        if let Some(declared_at) = self.declared_at {
            writeln!(f, "    at {declared_at}")?;
            writeln!(f, "----")?;
        }
        write!(f, "    at {}", self.raised_at)
    }
}

impl std::error::Error for AssertionError {}

fn no_errors(result: &ExecutionResult) -> Option<AssertionError> {
    let errors = result.errors();
    if errors.is_empty() {
        return None;
    }

    let summary = errors
        .iter()
        .map(|error| error.message.as_str())
        .collect::<Vec<_>>()
        .join(",");

    Some(AssertionError::new(format!(
        "expected no errors but got {} error(s) in GraphQL response: {summary}",
        errors.len()
    )))
}
