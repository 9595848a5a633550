use crate::apply::{FieldPlan, PlannedBinding};
use crate::error::ApplyError;
use crate::registry::SerializerRegistry;
use serde::Serialize;
use std::collections::BTreeMap;

/// Structured output produced by rendering a field plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

/// What a record hands back for one attribute: a plain value, one child
/// record, or a collection of child records.
pub enum FieldValue<'a> {
    Value(Value),
    One(Box<dyn Record + 'a>),
    Many(Vec<Box<dyn Record + 'a>>),
}

/// The object-graph side of rendering. The data is assumed to be lazily
/// navigable or already in memory; how it got there is not this crate's
/// concern.
pub trait Record {
    fn field(&self, name: &str) -> Option<FieldValue<'_>>;
}

/// Renders a field plan against a record into a [`Value`] tree.
///
/// The plan is already fully built at this point, so rendering is a plain
/// walk: attribute bindings read the record, computed and method-bound
/// bindings call the definition's registered resolver, nested bindings
/// recurse with their child plan. A missing attribute renders as `Null`.
///
/// # Errors
///
/// [`ApplyError::MissingResolver`] when a computed or method-bound binding
/// names a resolver the definition never registered.
pub fn render(
    plan: &FieldPlan,
    registry: &SerializerRegistry,
    record: &dyn Record,
) -> Result<Value, ApplyError> {
    let definition = registry.def(plan.def);
    let mut out = BTreeMap::new();

    for planned in plan.iter() {
        let value = match &planned.binding {
            PlannedBinding::Attr { source } => {
                let attr = source.as_deref().unwrap_or(&planned.name);
                match record.field(attr) {
                    Some(FieldValue::Value(value)) => value,
                    _ => Value::Null,
                }
            }
            PlannedBinding::Computed { method } => {
                let resolve =
                    definition
                        .resolver_fn(method)
                        .ok_or_else(|| ApplyError::MissingResolver {
                            method: method.clone(),
                            definition: definition.name.clone(),
                        })?;
                match resolve(record) {
                    Some(FieldValue::Value(value)) => value,
                    _ => Value::Null,
                }
            }
            PlannedBinding::Nested {
                plan: child_plan,
                many,
                source,
                method,
            } => {
                let fetched = match method {
                    Some(method) => {
                        let resolve = definition.resolver_fn(method).ok_or_else(|| {
                            ApplyError::MissingResolver {
                                method: method.clone(),
                                definition: definition.name.clone(),
                            }
                        })?;
                        resolve(record)
                    }
                    None => {
                        let attr = source.as_deref().unwrap_or(&planned.name);
                        record.field(attr)
                    }
                };
                render_nested(child_plan, registry, fetched, *many)?
            }
        };
        out.insert(planned.name.clone(), value);
    }
    Ok(Value::Object(out))
}

fn render_nested(
    plan: &FieldPlan,
    registry: &SerializerRegistry,
    fetched: Option<FieldValue<'_>>,
    many: bool,
) -> Result<Value, ApplyError> {
    match (many, fetched) {
        (false, Some(FieldValue::One(child))) => render(plan, registry, child.as_ref()),
        (true, Some(FieldValue::Many(children))) => {
            let rendered = children
                .iter()
                .map(|child| render(plan, registry, child.as_ref()))
                .collect::<Result<Vec<Value>, ApplyError>>()?;
            Ok(Value::Array(rendered))
        }
        // A single record under a collection binding still renders as a
        // collection.
        (true, Some(FieldValue::One(child))) => {
            Ok(Value::Array(vec![render(plan, registry, child.as_ref())?]))
        }
        _ => Ok(Value::Null),
    }
}
