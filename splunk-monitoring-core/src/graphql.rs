//! GraphQL error representation
//!
//! Mirrors what GraphQL clients hand back on a failed operation: the errors
//! reported by the server plus an optional network failure.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::event::{MUTATION_ERROR, QUERY_ERROR};

/// Kind of operation that failed; selects the event category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphQlOperation {
    Query,
    Mutation,
}

impl GraphQlOperation {
    pub fn category(&self) -> &'static str {
        match self {
            GraphQlOperation::Query => QUERY_ERROR,
            GraphQlOperation::Mutation => MUTATION_ERROR,
        }
    }
}

/// One entry of a GraphQL response's `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlErrorEntry {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

/// A failed GraphQL operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub graphql_errors: Vec<GraphQlErrorEntry>,
    #[serde(default)]
    pub network_error: Option<String>,
    /// Trace captured where the error was raised, if any
    #[serde(skip)]
    pub stack: Option<String>,
}

impl GraphQlError {
    /// Build from server-reported errors
    pub fn from_entries(graphql_errors: Vec<GraphQlErrorEntry>) -> Self {
        let message = graphql_errors
            .iter()
            .map(|e| format!("GraphQL error: {}", e.message))
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            message,
            graphql_errors,
            network_error: None,
            stack: None,
        }
    }

    /// Build from a transport failure
    pub fn network(error: impl fmt::Display) -> Self {
        let network_error = error.to_string();
        Self {
            message: format!("Network error: {}", network_error),
            graphql_errors: Vec::new(),
            network_error: Some(network_error),
            stack: None,
        }
    }

    /// Extract the errors of a GraphQL response body, `None` if it has none.
    pub fn from_response(body: &serde_json::Value) -> Option<Self> {
        let errors = body.get("errors")?.as_array()?;
        if errors.is_empty() {
            return None;
        }

        let entries = errors
            .iter()
            .filter_map(|e| serde_json::from_value::<GraphQlErrorEntry>(e.clone()).ok())
            .collect::<Vec<_>>();
        Some(Self::from_entries(entries))
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Rendering used for the `error` payload field: the stack when one was
    /// captured, otherwise the JSON form of the error.
    pub fn describe(&self) -> String {
        match &self.stack {
            Some(stack) => stack.clone(),
            None => serde_json::to_string(self).unwrap_or_else(|_| self.message.clone()),
        }
    }
}

impl fmt::Display for GraphQlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for GraphQlError {}
