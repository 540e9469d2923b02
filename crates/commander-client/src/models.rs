//! Wire shapes exchanged with the Commander daemon

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameters passed alongside a dispatched command
pub type Parameters = Map<String, Value>;

/// Body of `POST /dispatch`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandRequest {
    /// Identifier of the command to invoke
    pub command: String,
    /// Command parameters
    pub parameters: Parameters,
}

impl CommandRequest {
    /// Build a request for the given command
    pub fn new(command: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            command: command.into(),
            parameters,
        }
    }
}

/// A command advertised by `GET /listing`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    /// Human readable name
    pub name: String,
    /// Identifier used to invoke the command
    pub command: String,
    /// What the command does
    pub description: String,
}

/// Response of `GET /listing`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingResponse {
    /// Number of registered commands
    pub count: usize,
    /// Registered commands, in registration order
    pub commands: Vec<CommandDescriptor>,
}

impl ListingResponse {
    /// Decode and validate a listing body
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let listing: Self = serde_json::from_slice(body)?;
        if listing.count != listing.commands.len() {
            return Err(Error::decode(format!(
                "listing reports {} commands but carries {}",
                listing.count,
                listing.commands.len()
            )));
        }
        Ok(listing)
    }

    /// Look up a command by its identifier
    pub fn find(&self, command: &str) -> Option<&CommandDescriptor> {
        self.commands.iter().find(|c| c.command == command)
    }
}

/// Response of `POST /dispatch`; the daemon defines the keys
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DispatchResponse(pub Map<String, Value>);

impl DispatchResponse {
    /// Decode a dispatch body, which must be a JSON object
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        match serde_json::from_slice(body)? {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::decode(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// The daemon's `success` flag, when present
    pub fn success(&self) -> Option<bool> {
        self.0.get("success").and_then(Value::as_bool)
    }

    /// Look up a field of the response
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Unwrap into the underlying map
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Execution counters reported by `GET /status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Executions {
    /// Requests that failed
    pub failed: i64,
    /// Requests that succeeded
    pub successful: i64,
    /// Sum of both
    pub total: i64,
}

/// Response of `GET /status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Execution counters
    pub executions: Executions,
    /// Number of registered commands
    // The daemon spells this key without the second "e".
    #[serde(rename = "registed_commands")]
    pub registered_commands: usize,
    /// Uptime as formatted by the daemon, e.g. `1h2m3.5s`
    pub uptime: String,
}

impl StatusResponse {
    /// Decode a status body
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
