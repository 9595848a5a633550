use crate::apply::Serializer;
use crate::error::SelectError;
use crate::registry::{DefId, SerializerRegistry};
use crate::render::{render, Record, Value};
use serde::{Serialize, Serializer as SerdeSerializer};

/// The result of a successful selective serialization: the pruned output
/// tree, ready to be handed to a response body.
#[derive(Debug)]
pub struct Selected {
    pub value: Value,
}

impl Serialize for Selected {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: SerdeSerializer,
    {
        self.value.serialize(serializer)
    }
}

impl Selected {
    /// Serializes the selected output into a pretty-printed JSON string.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self)
    }

    /// Serializes the selected output into a YAML string.
    ///
    /// # Errors
    /// Returns a `serde_yaml::Error` if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self)
    }
}

/// Serializes `record` through the definition `def`, restricted to the
/// fields named by the request's raw `fields` parameter (all default fields
/// when the parameter is absent).
///
/// This is the primary entry point for processing a request: it parses the
/// selection once, builds the full per-request field plan, and renders it.
///
/// # Errors
///
/// Returns a [`SelectError`] if the selection string is malformed, the
/// selection names unknown fields, or the definition requires a selection it
/// did not get. All of these are deterministic, client-class errors.
pub fn select(
    registry: &SerializerRegistry,
    def: DefId,
    fields_param: Option<&str>,
    record: &dyn Record,
) -> Result<Selected, SelectError> {
    let serializer = Serializer::for_request(registry, def, fields_param)?;
    let plan = serializer.build_plan(registry)?;
    let value = render(&plan, registry, record)?;
    Ok(Selected { value })
}
