use crate::error::{ApplyError, SelectError};
use crate::parser;
use crate::registry::{DefId, SerializerRegistry};
use crate::render::Record;
use crate::schema::{Field, FieldKind, NestedField, SerializerDef, TargetRef};
use crate::selection::FieldSelection;
use log::trace;

/// A per-request serializer instance: a definition handle, the selection that
/// applies to it (absent when the request gave none), and its depth in the
/// response tree. All per-request state lives here and in the [`FieldPlan`]
/// it builds; the shared definition is never written to.
#[derive(Debug, Clone)]
pub struct Serializer {
    def: DefId,
    selection: Option<FieldSelection>,
    depth: usize,
}

impl Serializer {
    /// Constructs the top-level serializer for an inbound request, parsing
    /// the raw `fields` parameter when the request supplies one.
    ///
    /// The circularity check runs after construction completes, so a missing
    /// selection on a circular definition surfaces as a clean request-level
    /// error rather than a half-built instance.
    ///
    /// # Errors
    ///
    /// [`crate::error::ParseError`] for a malformed `fields` parameter;
    /// [`ApplyError::SelectionRequired`] when the definition is circular and
    /// the request gave no selection.
    pub fn for_request(
        registry: &SerializerRegistry,
        def: DefId,
        fields_param: Option<&str>,
    ) -> Result<Serializer, SelectError> {
        // An empty parameter counts as no parameter: the request falls back
        // to default-field behaviour.
        let fields_param = fields_param.filter(|raw| !raw.is_empty());
        let selection = match fields_param {
            Some(raw) => Some(parser::parse(raw)?),
            None => None,
        };
        let serializer = Serializer {
            def,
            selection,
            depth: 0,
        };

        let definition = registry.def(def);
        if definition.circular && fields_param.is_none() {
            return Err(ApplyError::SelectionRequired {
                definition: definition.name.clone(),
            }
            .into());
        }
        Ok(serializer)
    }

    /// Constructs a nested serializer instance carrying the sub-selection its
    /// parent assigned to it. This is the recursive case; nested instances
    /// never see raw request parameters.
    pub fn with_selection(
        def: DefId,
        selection: Option<FieldSelection>,
        depth: usize,
    ) -> Serializer {
        Serializer {
            def,
            selection,
            depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn selection(&self) -> Option<&FieldSelection> {
        self.selection.as_ref()
    }

    /// Phase A: the effective field names for this instance.
    ///
    /// Falls back to the default field-name set when no selection applies (or
    /// the `default` option asks for it); otherwise validates every plain
    /// field name against the declared and default sets and returns the plain
    /// names plus the nested keys, duplicates collapsed.
    ///
    /// # Errors
    ///
    /// [`ApplyError::SelectionRequired`] for a circular definition with no
    /// selection, [`ApplyError::EmptySelection`] for a circular definition
    /// whose selection names nothing, [`ApplyError::UnknownField`] for an
    /// undeclared plain field.
    pub fn field_names(&self, registry: &SerializerRegistry) -> Result<Vec<String>, ApplyError> {
        let definition = registry.def(self.def);
        let selection = match &self.selection {
            None => {
                if definition.circular {
                    return Err(ApplyError::SelectionRequired {
                        definition: definition.name.clone(),
                    });
                }
                return Ok(definition.default_field_names());
            }
            Some(selection) => selection,
        };

        if definition.require_default_option && selection.has_option("default") {
            return Ok(definition.default_field_names());
        }
        if definition.circular && selection.is_empty() {
            return Err(ApplyError::EmptySelection {
                definition: definition.name.clone(),
            });
        }

        let default_names = definition.default_field_names();
        for name in &selection.fields {
            if definition.field(name).is_none() && !default_names.contains(name) {
                return Err(ApplyError::UnknownField {
                    field: name.clone(),
                    definition: definition.name.clone(),
                });
            }
        }

        let mut names: Vec<String> = Vec::new();
        let requested = selection
            .fields
            .iter()
            .map(String::as_str)
            .chain(selection.nested().map(|(name, _)| name));
        for name in requested {
            if !names.iter().any(|existing| existing == name) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// Phase B: builds the request-scoped field plan for this instance,
    /// recursively and fully eagerly. The whole plan tree exists before any
    /// rendering starts, and nothing is written back to the definition.
    ///
    /// # Errors
    ///
    /// Everything `field_names` raises, plus [`ApplyError::UnknownField`] /
    /// [`ApplyError::NotNested`] for invalid nested keys.
    pub fn build_plan(&self, registry: &SerializerRegistry) -> Result<FieldPlan, ApplyError> {
        let definition = registry.def(self.def);
        trace!(
            "building plan for '{}' at depth {}",
            definition.name,
            self.depth
        );

        // A circular definition reached with no selection below the base
        // depth resolves to an empty plan instead of recursing forever; at
        // the base depth it fails, the same answer `field_names` gives.
        if self.selection.is_none() && definition.circular {
            if self.depth != 0 {
                return Ok(FieldPlan::empty(self.def));
            }
            return Err(ApplyError::SelectionRequired {
                definition: definition.name.clone(),
            });
        }

        let selection = match &self.selection {
            None => return self.build_default_plan(registry, definition),
            Some(selection)
                if definition.require_default_option && selection.has_option("default") =>
            {
                return self.build_default_plan(registry, definition)
            }
            Some(selection) => selection,
        };

        // Phase A validation applies before any field object is built.
        self.field_names(registry)?;

        let mut plan = FieldPlan::empty(self.def);
        for name in &selection.fields {
            let binding = match definition.field(name) {
                // Declared bindings are reused verbatim for plain selections.
                Some(field) => self.plan_declared(registry, definition, field)?,
                // Names from the default set with no declared binding are
                // model-derived attributes.
                None => PlannedBinding::Attr { source: None },
            };
            plan.insert(name.clone(), binding);
        }

        for (key, child_selection) in selection.nested() {
            let field = definition
                .field(key)
                .ok_or_else(|| ApplyError::UnknownField {
                    field: key.to_string(),
                    definition: definition.name.clone(),
                })?;
            let nested = match &field.kind {
                FieldKind::Nested(nested) => nested,
                _ => {
                    return Err(ApplyError::NotNested {
                        field: key.to_string(),
                        definition: definition.name.clone(),
                    })
                }
            };
            let target = self.target_of(definition, field, nested)?;

            let child =
                Serializer::with_selection(target, Some(child_selection.clone()), self.depth + 1);
            let child_plan = child.build_plan(registry)?;

            // A source equal to the key is redundant and would only make the
            // engine resolve the same attribute path twice.
            let source = nested.source.clone().filter(|source| source != key);
            plan.insert(
                key.to_string(),
                PlannedBinding::Nested {
                    plan: child_plan,
                    many: nested.many,
                    source,
                    method: nested.method.clone(),
                },
            );
        }
        Ok(plan)
    }

    /// Saving is explicitly unsupported through selection-aware serializers.
    pub fn save(&self, registry: &SerializerRegistry) -> Result<(), ApplyError> {
        Err(ApplyError::SaveNotSupported {
            definition: registry.def(self.def).name.clone(),
        })
    }

    /// See [`save`](Self::save).
    pub fn save_object(
        &self,
        registry: &SerializerRegistry,
        _record: &dyn Record,
    ) -> Result<(), ApplyError> {
        self.save(registry)
    }

    fn build_default_plan(
        &self,
        registry: &SerializerRegistry,
        definition: &SerializerDef,
    ) -> Result<FieldPlan, ApplyError> {
        let mut plan = FieldPlan::empty(self.def);
        for name in definition.default_field_names() {
            let binding = match definition.field(&name) {
                Some(field) => self.plan_declared(registry, definition, field)?,
                None => PlannedBinding::Attr { source: None },
            };
            plan.insert(name, binding);
        }
        Ok(plan)
    }

    /// Plans a declared field binding as-is, without a sub-selection. Nested
    /// bindings recurse with an absent selection, so circular targets below
    /// the base depth collapse to an empty plan.
    fn plan_declared(
        &self,
        registry: &SerializerRegistry,
        definition: &SerializerDef,
        field: &Field,
    ) -> Result<PlannedBinding, ApplyError> {
        match &field.kind {
            FieldKind::Attr { source } => Ok(PlannedBinding::Attr {
                source: source.clone(),
            }),
            FieldKind::Computed { method } => Ok(PlannedBinding::Computed {
                method: method.clone(),
            }),
            FieldKind::Nested(nested) => {
                let target = self.target_of(definition, field, nested)?;
                let child = Serializer::with_selection(target, None, self.depth + 1);
                Ok(PlannedBinding::Nested {
                    plan: child.build_plan(registry)?,
                    many: nested.many,
                    source: nested.source.clone(),
                    method: nested.method.clone(),
                })
            }
        }
    }

    fn target_of(
        &self,
        definition: &SerializerDef,
        field: &Field,
        nested: &NestedField,
    ) -> Result<DefId, ApplyError> {
        match &nested.target {
            TargetRef::Resolved(id) => Ok(*id),
            TargetRef::Pending(_) => Err(ApplyError::UnresolvedTarget {
                field: field.name.clone(),
                definition: definition.name.clone(),
            }),
        }
    }
}

/// The ephemeral field set for one serializer instance of one response.
/// Built by Phase B, consumed by the renderer, then dropped; it never leaks
/// into the definition.
#[derive(Debug, Clone)]
pub struct FieldPlan {
    pub(crate) def: DefId,
    fields: Vec<PlannedField>,
}

#[derive(Debug, Clone)]
pub(crate) struct PlannedField {
    pub(crate) name: String,
    pub(crate) binding: PlannedBinding,
}

#[derive(Debug, Clone)]
pub(crate) enum PlannedBinding {
    Attr {
        source: Option<String>,
    },
    Computed {
        method: String,
    },
    Nested {
        plan: FieldPlan,
        many: bool,
        source: Option<String>,
        method: Option<String>,
    },
}

impl FieldPlan {
    fn empty(def: DefId) -> FieldPlan {
        FieldPlan {
            def,
            fields: Vec::new(),
        }
    }

    /// Inserts a binding, replacing an earlier one with the same name. Plain
    /// and nested selections may overlap on a name; the nested binding wins
    /// because it is inserted second.
    fn insert(&mut self, name: String, binding: PlannedBinding) {
        if let Some(slot) = self.fields.iter_mut().find(|f| f.name == name) {
            slot.binding = binding;
        } else {
            self.fields.push(PlannedField { name, binding });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &PlannedField> {
        self.fields.iter()
    }
}
