use std::collections::HashSet;
use std::fmt;

/// The parsed form of one level of the fields parameter: which plain fields
/// to include, which fields open their own nested selection, and which
/// modifier options (`:default`, ...) were given.
///
/// A selection is built once per request by the parser and is read-only from
/// then on; the applicator walks it but never mutates it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSelection {
    /// Plain field names in request order. Duplicates are preserved here;
    /// they collapse only when field presence is computed.
    pub fields: Vec<String>,

    /// Nested selections keyed by field name. Keys are unique (a repeated key
    /// replaces the earlier entry) and insertion order is kept so that plan
    /// construction is deterministic.
    nested: Vec<(String, FieldSelection)>,

    /// Modifier options with the leading `:` stripped. Unknown options are
    /// carried but ignored by the applicator.
    pub options: HashSet<String>,
}

impl FieldSelection {
    pub fn new() -> FieldSelection {
        FieldSelection::default()
    }

    /// True when the selection names nothing at all: no plain fields and no
    /// nested groups. Options alone do not make a selection non-empty.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.nested.is_empty()
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.options.contains(option)
    }

    /// Adds a nested selection under `name`, replacing any earlier entry with
    /// the same name (last write wins).
    pub fn insert_nested(&mut self, name: impl Into<String>, child: FieldSelection) {
        let name = name.into();
        if let Some(slot) = self.nested.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = child;
        } else {
            self.nested.push((name, child));
        }
    }

    pub fn nested(&self) -> impl Iterator<Item = (&str, &FieldSelection)> {
        self.nested.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn nested_len(&self) -> usize {
        self.nested.len()
    }

    pub fn child(&self, name: &str) -> Option<&FieldSelection> {
        self.nested
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    /// Renders the selection back into the flat bracketed form. Nested groups
    /// come first, then plain fields; options are not rendered.
    pub fn flat_string(&self) -> String {
        let mut parts: Vec<String> = self
            .nested
            .iter()
            .map(|(name, child)| format!("{}({})", name, child.flat_string()))
            .collect();
        parts.extend(self.fields.iter().cloned());
        parts.join(",")
    }
}

impl fmt::Display for FieldSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.flat_string())
    }
}
