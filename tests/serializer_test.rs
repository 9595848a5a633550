// End-to-end tests: parse a fields parameter, build the per-request plan,
// and render it against a small in-memory object graph.
use sparse_core::apply::Serializer;
use sparse_core::error::{ApplyError, SelectError};
use sparse_core::parser;
use sparse_core::registry::{DefId, SerializerRegistry};
use sparse_core::render::{FieldValue, Record, Value};
use sparse_core::schema::{NestedField, SerializerDef};
use sparse_core::select;

/// Rows with a `val` attribute and an optional `nest` link to another row.
/// Links may form cycles.
struct Chain {
    rows: Vec<(f64, Option<usize>)>,
}

#[derive(Clone, Copy)]
struct Row<'a> {
    chain: &'a Chain,
    idx: usize,
}

impl Record for Row<'_> {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        let (val, nest) = self.chain.rows[self.idx];
        match name {
            "val" => Some(FieldValue::Value(Value::Number(val))),
            "nest" => {
                let idx = nest?;
                let child: Box<dyn Record + '_> = Box::new(Row {
                    chain: self.chain,
                    idx,
                });
                Some(FieldValue::One(child))
            }
            _ => None,
        }
    }
}

/// val=1 <- val=2 <- val=3, each `nest` pointing to the previous row.
fn chain() -> Chain {
    Chain {
        rows: vec![(1.0, None), (2.0, Some(0)), (3.0, Some(1))],
    }
}

/// The serializer graph from the chain endpoint: a three-level non-circular
/// nesting over the same row shape.
fn chain_registry() -> (SerializerRegistry, DefId) {
    let mut registry = SerializerRegistry::new();
    let level2 = registry
        .register(SerializerDef::new("NestLevel2").attr("val"))
        .unwrap();
    let level1 = registry
        .register(
            SerializerDef::new("NestLevel1")
                .attr("val")
                .nested("nest", NestedField::to(level2)),
        )
        .unwrap();
    let base = registry
        .register(
            SerializerDef::new("Base")
                .attr("val")
                .nested("nest", NestedField::to(level1)),
        )
        .unwrap();
    registry.resolve().unwrap();
    (registry, base)
}

fn select_json(
    registry: &SerializerRegistry,
    def: DefId,
    fields: Option<&str>,
) -> Result<serde_json::Value, SelectError> {
    let chain = chain();
    let row = Row {
        chain: &chain,
        idx: 2,
    };
    let selected = select(registry, def, fields, &row)?;
    Ok(serde_json::from_str(&selected.to_json().unwrap()).unwrap())
}

#[test]
fn test_no_fields_parameter_renders_defaults() {
    let (registry, base) = chain_registry();
    let json = select_json(&registry, base, None).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"val": 3.0, "nest": {"val": 2.0, "nest": {"val": 1.0}}})
    );
}

#[test]
fn test_single_normal_field() {
    let (registry, base) = chain_registry();
    let json = select_json(&registry, base, Some("val")).unwrap();
    assert_eq!(json, serde_json::json!({"val": 3.0}));
}

#[test]
fn test_single_nested_field() {
    let (registry, base) = chain_registry();
    let json = select_json(&registry, base, Some("nest(val)")).unwrap();
    assert_eq!(json, serde_json::json!({"nest": {"val": 2.0}}));
}

#[test]
fn test_double_nested_selection() {
    let (registry, base) = chain_registry();
    let json = select_json(&registry, base, Some("val,nest(nest(val),val)")).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"nest": {"nest": {"val": 1.0}, "val": 2.0}, "val": 3.0})
    );
}

#[test]
fn test_unknown_options_are_ignored() {
    let (registry, base) = chain_registry();
    let json = select_json(
        &registry,
        base,
        Some("val,nest(:random,nest(:random,val),val),:random"),
    )
    .unwrap();
    assert_eq!(
        json,
        serde_json::json!({"nest": {"nest": {"val": 1.0}, "val": 2.0}, "val": 3.0})
    );
}

#[test]
fn test_default_option_restores_full_output() {
    let (registry, base) = chain_registry();
    let json = select_json(&registry, base, Some(":default")).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"val": 3.0, "nest": {"val": 2.0, "nest": {"val": 1.0}}})
    );
}

#[test]
fn test_nested_default_options() {
    let (registry, base) = chain_registry();
    let json = select_json(&registry, base, Some(":default,nest(:default,nest(:default))")).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"val": 3.0, "nest": {"val": 2.0, "nest": {"val": 1.0}}})
    );
}

#[test]
fn test_unknown_field_is_rejected() {
    let (registry, base) = chain_registry();
    let err = select_json(&registry, base, Some("error")).unwrap_err();
    match err {
        SelectError::Apply(ApplyError::UnknownField { field, definition }) => {
            assert_eq!(field, "error");
            assert_eq!(definition, "Base");
        }
        other => panic!("expected UnknownField, got {other:?}"),
    }
}

#[test]
fn test_unknown_nested_field_is_rejected() {
    let (registry, base) = chain_registry();
    let err = select_json(&registry, base, Some("nest(error(val))")).unwrap_err();
    match err {
        SelectError::Apply(ApplyError::UnknownField { field, definition }) => {
            assert_eq!(field, "error");
            assert_eq!(definition, "NestLevel1");
        }
        other => panic!("expected UnknownField, got {other:?}"),
    }
}

#[test]
fn test_nested_selection_on_scalar_field_is_rejected() {
    let (registry, base) = chain_registry();
    let err = select_json(&registry, base, Some("val(nest)")).unwrap_err();
    assert!(matches!(
        err,
        SelectError::Apply(ApplyError::NotNested { .. })
    ));
}

#[test]
fn test_sequential_requests_do_not_interfere() {
    // A restricted request must leave no residue on the shared definitions:
    // the next request without a restriction sees the full default output.
    let (registry, base) = chain_registry();
    let restricted = select_json(&registry, base, Some("val")).unwrap();
    assert_eq!(restricted, serde_json::json!({"val": 3.0}));

    let full = select_json(&registry, base, Some(":default")).unwrap();
    assert_eq!(
        full,
        serde_json::json!({"val": 3.0, "nest": {"val": 2.0, "nest": {"val": 1.0}}})
    );
}

// --- circular definitions ---

/// Two definitions referencing each other by name, over cyclic data:
/// val=4 and val=5 each nesting the other.
fn circular_registry() -> (SerializerRegistry, DefId) {
    let mut registry = SerializerRegistry::new();
    let circular1 = registry
        .register(
            SerializerDef::new("Circular1")
                .attr("val")
                .nested("nest", NestedField::deferred("Circular2"))
                .circular(),
        )
        .unwrap();
    registry
        .register(
            SerializerDef::new("Circular2")
                .attr("val")
                .nested("nest", NestedField::deferred("Circular1"))
                .circular(),
        )
        .unwrap();
    registry.resolve().unwrap();
    (registry, circular1)
}

fn cyclic_chain() -> Chain {
    Chain {
        rows: vec![(4.0, Some(1)), (5.0, Some(0))],
    }
}

#[test]
fn test_circular_requires_fields_parameter() {
    let (registry, circular1) = circular_registry();
    let chain = cyclic_chain();
    let row = Row {
        chain: &chain,
        idx: 0,
    };
    let err = select(&registry, circular1, None, &row).unwrap_err();
    assert!(matches!(
        err,
        SelectError::Apply(ApplyError::SelectionRequired { .. })
    ));
}

#[test]
fn test_circular_treats_empty_parameter_as_missing() {
    let (registry, circular1) = circular_registry();
    let chain = cyclic_chain();
    let row = Row {
        chain: &chain,
        idx: 0,
    };
    let err = select(&registry, circular1, Some(""), &row).unwrap_err();
    assert!(matches!(
        err,
        SelectError::Apply(ApplyError::SelectionRequired { .. })
    ));
}

#[test]
fn test_circular_rejects_selection_naming_no_fields() {
    let (registry, circular1) = circular_registry();
    let chain = cyclic_chain();
    let row = Row {
        chain: &chain,
        idx: 0,
    };
    let err = select(&registry, circular1, Some(":random"), &row).unwrap_err();
    assert!(matches!(
        err,
        SelectError::Apply(ApplyError::EmptySelection { .. })
    ));
}

#[test]
fn test_circular_selection_bounds_recursion() {
    let (registry, circular1) = circular_registry();
    let chain = cyclic_chain();
    let row = Row {
        chain: &chain,
        idx: 0,
    };
    let selected = select(&registry, circular1, Some("val,nest(val,nest(val))"), &row).unwrap();
    let json: serde_json::Value = serde_json::from_str(&selected.to_json().unwrap()).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"val": 4.0, "nest": {"val": 5.0, "nest": {"val": 4.0}}})
    );
}

#[test]
fn test_circular_as_nested_child_with_explicit_selection() {
    // The same definition that demands a selection at the top level works as
    // a nested child once it carries one.
    let (registry, _) = circular_registry();
    let circular2 = registry.lookup("Circular2").unwrap();
    let child = Serializer::with_selection(circular2, Some(parser::parse("val").unwrap()), 1);
    let plan = child.build_plan(&registry).unwrap();
    assert_eq!(plan.names().collect::<Vec<_>>(), vec!["val"]);
}

#[test]
fn test_circular_without_selection_below_base_depth_is_empty() {
    let (registry, circular1) = circular_registry();
    let child = Serializer::with_selection(circular1, None, 1);
    let plan = child.build_plan(&registry).unwrap();
    assert!(plan.is_empty());
}

#[test]
fn test_circular_without_selection_at_base_depth_fails_plan_building() {
    // Building the plan directly must agree with field_names: a circular
    // definition with no selection fails at the base depth.
    let (registry, circular1) = circular_registry();
    let top = Serializer::with_selection(circular1, None, 0);
    assert!(matches!(
        top.field_names(&registry),
        Err(ApplyError::SelectionRequired { .. })
    ));
    assert!(matches!(
        top.build_plan(&registry),
        Err(ApplyError::SelectionRequired { .. })
    ));
}

// --- shared child definitions, collections, method-bound fields ---

struct Post {
    title: &'static str,
    comments: Vec<PostComment>,
}

struct PostComment {
    text: &'static str,
    id: f64,
}

impl Record for Post {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "title" => Some(FieldValue::Value(Value::String(self.title.to_string()))),
            "comments" => {
                let children: Vec<Box<dyn Record + '_>> = self
                    .comments
                    .iter()
                    .map(|c| Box::new(c) as Box<dyn Record + '_>)
                    .collect();
                Some(FieldValue::Many(children))
            }
            _ => None,
        }
    }
}

impl Record for &PostComment {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "text" => Some(FieldValue::Value(Value::String(self.text.to_string()))),
            "id" => Some(FieldValue::Value(Value::Number(self.id))),
            _ => None,
        }
    }
}

fn post() -> Post {
    Post {
        title: "hello",
        comments: vec![
            PostComment {
                text: "first",
                id: 1.0,
            },
            PostComment {
                text: "second",
                id: 2.0,
            },
        ],
    }
}

fn latest_comment<'a>(record: &'a dyn Record) -> Option<FieldValue<'a>> {
    match record.field("comments") {
        Some(FieldValue::Many(mut children)) if !children.is_empty() => {
            Some(FieldValue::One(children.pop().unwrap()))
        }
        _ => None,
    }
}

fn post_registry() -> (SerializerRegistry, DefId) {
    let mut registry = SerializerRegistry::new();
    let comment = registry
        .register(SerializerDef::new("Comment").attr("text").attr("id"))
        .unwrap();
    let post = registry
        .register(
            SerializerDef::new("Post")
                .attr("title")
                .nested("comments", NestedField::to(comment).many())
                .nested(
                    "latest_comment",
                    NestedField::to(comment).method("get_latest_comment"),
                )
                .resolver("get_latest_comment", latest_comment),
        )
        .unwrap();
    registry.resolve().unwrap();
    (registry, post)
}

#[test]
fn test_collection_field_renders_as_array() {
    let (registry, post_def) = post_registry();
    let selected = select(&registry, post_def, Some("title,comments(text)"), &post()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&selected.to_json().unwrap()).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "title": "hello",
            "comments": [{"text": "first"}, {"text": "second"}]
        })
    );
}

#[test]
fn test_method_bound_nested_field() {
    let (registry, post_def) = post_registry();
    let selected = select(&registry, post_def, Some("latest_comment(id)"), &post()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&selected.to_json().unwrap()).unwrap();
    assert_eq!(json, serde_json::json!({"latest_comment": {"id": 2.0}}));
}

#[test]
fn test_same_child_definition_at_two_paths() {
    // Both paths resolve through the Comment definition but carry
    // independent sub-selections.
    let (registry, post_def) = post_registry();
    let selected = select(
        &registry,
        post_def,
        Some("comments(text),latest_comment(id)"),
        &post(),
    )
    .unwrap();
    let json: serde_json::Value = serde_json::from_str(&selected.to_json().unwrap()).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "comments": [{"text": "first"}, {"text": "second"}],
            "latest_comment": {"id": 2.0}
        })
    );
}

#[test]
fn test_save_is_not_supported() {
    let (registry, post_def) = post_registry();
    let serializer = Serializer::for_request(&registry, post_def, Some("title")).unwrap();
    assert!(matches!(
        serializer.save(&registry),
        Err(ApplyError::SaveNotSupported { .. })
    ));
    assert!(matches!(
        serializer.save_object(&registry, &post()),
        Err(ApplyError::SaveNotSupported { .. })
    ));
}

#[test]
fn test_default_set_may_exceed_declared_fields() {
    // Names in the default set without a declared binding render as plain
    // attribute reads.
    let mut registry = SerializerRegistry::new();
    let def = registry
        .register(
            SerializerDef::new("Wide")
                .attr("title")
                .default_fields(["title", "bonus"]),
        )
        .unwrap();
    registry.resolve().unwrap();

    struct Wide;
    impl Record for Wide {
        fn field(&self, name: &str) -> Option<FieldValue<'_>> {
            match name {
                "title" => Some(FieldValue::Value(Value::String("t".to_string()))),
                "bonus" => Some(FieldValue::Value(Value::Number(9.0))),
                _ => None,
            }
        }
    }

    let selected = select(&registry, def, Some("bonus"), &Wide).unwrap();
    let json: serde_json::Value = serde_json::from_str(&selected.to_json().unwrap()).unwrap();
    assert_eq!(json, serde_json::json!({"bonus": 9.0}));
}
