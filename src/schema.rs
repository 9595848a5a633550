use crate::registry::DefId;
use crate::render::{FieldValue, Record};
use std::collections::HashMap;

/// A resolver method registered on a definition. Computed fields and
/// method-bound nested fields call one of these instead of reading an
/// attribute; the resolver never touches the record's own storage.
pub type MethodFn = for<'a> fn(&'a dyn Record) -> Option<FieldValue<'a>>;

/// Reference to another serializer definition. Definitions that participate
/// in a cycle (or simply appear later in the file) are declared `Pending` by
/// name and bound to a concrete id by `SerializerRegistry::resolve`.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetRef {
    Resolved(DefId),
    Pending(String),
}

/// A field bound to another serializer definition.
#[derive(Debug, Clone)]
pub struct NestedField {
    pub target: TargetRef,
    /// Wraps the target as a repeated/collection field.
    pub many: bool,
    /// Attribute to read the child record(s) from, when it differs from the
    /// field name.
    pub source: Option<String>,
    /// Resolver method that produces the child record(s), instead of an
    /// attribute read.
    pub method: Option<String>,
}

impl NestedField {
    pub fn to(target: DefId) -> NestedField {
        NestedField {
            target: TargetRef::Resolved(target),
            many: false,
            source: None,
            method: None,
        }
    }

    /// Defers the target lookup to `SerializerRegistry::resolve`. Required
    /// for forward and circular references.
    pub fn deferred(target: impl Into<String>) -> NestedField {
        NestedField {
            target: TargetRef::Pending(target.into()),
            many: false,
            source: None,
            method: None,
        }
    }

    #[must_use]
    pub fn many(mut self) -> NestedField {
        self.many = true;
        self
    }

    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> NestedField {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> NestedField {
        self.method = Some(method.into());
        self
    }
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    /// A plain attribute read, optionally from a different source name.
    Attr { source: Option<String> },
    /// A scalar produced by a registered resolver method.
    Computed { method: String },
    /// A field rendered through another serializer definition.
    Nested(NestedField),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

/// A statically declared serializer shape: its fields, its default field-name
/// set, and the two flags controlling selection behaviour.
///
/// Definitions are registered once at load time and never mutated afterwards
/// (`SerializerRegistry::resolve` is the single exception); per-request state
/// lives entirely in `Serializer` and `FieldPlan`.
#[derive(Debug)]
pub struct SerializerDef {
    pub name: String,
    pub(crate) fields: Vec<Field>,
    default_fields: Option<Vec<String>>,
    /// This definition participates in a reference cycle and must always
    /// receive an explicit selection at the request's entry point.
    pub circular: bool,
    /// When no explicit selection is given, or the `default` option is
    /// present, fall back to the full default field set.
    pub require_default_option: bool,
    methods: HashMap<String, MethodFn>,
}

impl SerializerDef {
    pub fn new(name: impl Into<String>) -> SerializerDef {
        SerializerDef {
            name: name.into(),
            fields: Vec::new(),
            default_fields: None,
            circular: false,
            require_default_option: true,
            methods: HashMap::new(),
        }
    }

    #[must_use]
    pub fn attr(mut self, name: impl Into<String>) -> SerializerDef {
        self.fields.push(Field {
            name: name.into(),
            kind: FieldKind::Attr { source: None },
        });
        self
    }

    #[must_use]
    pub fn attr_as(mut self, name: impl Into<String>, source: impl Into<String>) -> SerializerDef {
        self.fields.push(Field {
            name: name.into(),
            kind: FieldKind::Attr {
                source: Some(source.into()),
            },
        });
        self
    }

    /// Declares a scalar field whose value comes from the resolver method
    /// registered under `method`.
    #[must_use]
    pub fn computed(mut self, name: impl Into<String>, method: impl Into<String>) -> SerializerDef {
        self.fields.push(Field {
            name: name.into(),
            kind: FieldKind::Computed {
                method: method.into(),
            },
        });
        self
    }

    #[must_use]
    pub fn nested(mut self, name: impl Into<String>, nested: NestedField) -> SerializerDef {
        self.fields.push(Field {
            name: name.into(),
            kind: FieldKind::Nested(nested),
        });
        self
    }

    /// Registers a resolver method under `name`.
    #[must_use]
    pub fn resolver(mut self, name: impl Into<String>, f: MethodFn) -> SerializerDef {
        self.methods.insert(name.into(), f);
        self
    }

    #[must_use]
    pub fn circular(mut self) -> SerializerDef {
        self.circular = true;
        self
    }

    #[must_use]
    pub fn require_default_option(mut self, require: bool) -> SerializerDef {
        self.require_default_option = require;
        self
    }

    /// Overrides the default field-name set. Names here may include
    /// model-derived attributes that have no declared binding; they render as
    /// plain attribute reads.
    #[must_use]
    pub fn default_fields<I, S>(mut self, names: I) -> SerializerDef
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_fields = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// The field names used when no selection restricts the output: the
    /// explicit default list when one was declared, otherwise every declared
    /// field name in declaration order.
    pub fn default_field_names(&self) -> Vec<String> {
        match &self.default_fields {
            Some(names) => names.clone(),
            None => self.fields.iter().map(|f| f.name.clone()).collect(),
        }
    }

    pub fn resolver_fn(&self, name: &str) -> Option<MethodFn> {
        self.methods.get(name).copied()
    }
}
