use crate::error::RegistryError;
use crate::schema::{Field, FieldKind, SerializerDef, TargetRef};
use log::debug;
use std::collections::HashMap;

/// Handle to a registered [`SerializerDef`]. Handles are only produced by
/// [`SerializerRegistry::register`] and index into that registry's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefId(usize);

/// Arena of serializer definitions addressed by [`DefId`].
///
/// Cyclic serializer graphs cannot be built eagerly: a definition's nested
/// field may name a definition that does not exist yet, or itself. The
/// registry therefore accepts `TargetRef::Pending` fields at registration
/// time and binds them all at once in [`resolve`](Self::resolve), after every
/// node of the graph exists.
#[derive(Debug, Default)]
pub struct SerializerRegistry {
    defs: Vec<SerializerDef>,
    by_name: HashMap<String, DefId>,
}

impl SerializerRegistry {
    pub fn new() -> SerializerRegistry {
        SerializerRegistry::default()
    }

    /// Registers a definition under its name.
    ///
    /// # Errors
    ///
    /// Fails with [`RegistryError::DuplicateDefinition`] if the name is
    /// already taken.
    pub fn register(&mut self, def: SerializerDef) -> Result<DefId, RegistryError> {
        if self.by_name.contains_key(&def.name) {
            return Err(RegistryError::DuplicateDefinition {
                name: def.name.clone(),
            });
        }
        let id = DefId(self.defs.len());
        self.by_name.insert(def.name.clone(), id);
        self.defs.push(def);
        Ok(id)
    }

    pub fn def(&self, id: DefId) -> &SerializerDef {
        &self.defs[id.0]
    }

    pub fn lookup(&self, name: &str) -> Option<DefId> {
        self.by_name.get(name).copied()
    }

    /// Binds every pending cross-reference to a concrete definition id.
    /// Call exactly once, after all definitions are registered.
    ///
    /// Two passes: first every pending field is stripped out of its owning
    /// definition's active field list into a side table, so no definition in
    /// a mutually-referencing set holds a half-built binding while the set is
    /// walked; then each collected field is looked up, rebound and
    /// re-appended.
    ///
    /// # Errors
    ///
    /// Fails with [`RegistryError::UnresolvedReference`] if a pending target
    /// names a definition that was never registered.
    pub fn resolve(&mut self) -> Result<(), RegistryError> {
        let mut deferred: Vec<(usize, Field)> = Vec::new();

        for (idx, def) in self.defs.iter_mut().enumerate() {
            let fields = std::mem::take(&mut def.fields);
            for field in fields {
                let is_pending = matches!(
                    &field.kind,
                    FieldKind::Nested(nested) if matches!(nested.target, TargetRef::Pending(_))
                );
                if is_pending {
                    deferred.push((idx, field));
                } else {
                    def.fields.push(field);
                }
            }
        }
        debug!("resolving {} deferred serializer references", deferred.len());

        for (idx, mut field) in deferred {
            if let FieldKind::Nested(nested) = &mut field.kind {
                if let TargetRef::Pending(target_name) = &nested.target {
                    let target = self.by_name.get(target_name).copied().ok_or_else(|| {
                        RegistryError::UnresolvedReference {
                            definition: self.defs[idx].name.clone(),
                            field: field.name.clone(),
                            target: target_name.clone(),
                        }
                    })?;
                    nested.target = TargetRef::Resolved(target);
                }
            }
            self.defs[idx].fields.push(field);
        }
        Ok(())
    }
}
