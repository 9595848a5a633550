use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum SelectError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Apply(#[from] ApplyError),
}

/// Structural errors in the flat `fields` selection string. Spans point into
/// the preprocessed string, where every `)` is a standalone token.
#[derive(Error, Debug, Diagnostic)]
pub enum ParseError {
    #[error("Close bracket without a corresponding open bracket")]
    #[diagnostic(
        code(parse::close_without_open),
        help("Every `)` must close a `name(...)` group opened earlier in the fields parameter.")
    )]
    CloseWithoutOpen {
        #[source_code]
        src: NamedSource<String>,
        #[label("This bracket closes nothing")]
        span: SourceSpan,
    },

    #[error("Open bracket not closed")]
    #[diagnostic(
        code(parse::unclosed_bracket),
        help("The fields parameter ended while a `name(...)` group was still open.")
    )]
    UnclosedBracket {
        #[source_code]
        src: NamedSource<String>,
        #[label("Group opened here is never closed")]
        span: SourceSpan,
    },

    #[error("Nested field without a name")]
    #[diagnostic(
        code(parse::nested_without_name),
        help("A `(` must be preceded by the name of the nested field, as in `comments(text)`.")
    )]
    NestedFieldWithoutName {
        #[source_code]
        src: NamedSource<String>,
        #[label("Expected a field name before this group")]
        span: SourceSpan,
    },
}

/// Load-time errors raised while binding deferred serializer references.
/// These are effectively fatal at startup, never request-time failures.
#[derive(Error, Debug, Diagnostic)]
pub enum RegistryError {
    #[error("Serializer '{target}' referenced by '{definition}.{field}' is not registered")]
    #[diagnostic(
        code(registry::unresolved_reference),
        help("Register the target serializer before calling resolve(). Use the definition's registered name, not a path to it.")
    )]
    UnresolvedReference {
        definition: String,
        field: String,
        target: String,
    },

    #[error("Serializer '{name}' is already registered")]
    #[diagnostic(code(registry::duplicate_definition))]
    DuplicateDefinition { name: String },
}

/// Request-time failures while applying a selection tree to a serializer
/// definition. All of these map to a client error (HTTP 400 class).
#[derive(Error, Debug, Diagnostic)]
pub enum ApplyError {
    #[error("The 'fields' parameter must be defined in this request due to circular serializers")]
    #[diagnostic(
        code(apply::selection_required),
        help("Serializer definitions flagged circular cannot fall back to their default fields; pass an explicit selection.")
    )]
    SelectionRequired { definition: String },

    #[error("Circular serializer '{definition}' had no fields defined in the request")]
    #[diagnostic(code(apply::empty_selection))]
    EmptySelection { definition: String },

    #[error("Field '{field}' isn't defined in serializer '{definition}'")]
    #[diagnostic(code(apply::unknown_field))]
    UnknownField { field: String, definition: String },

    #[error("Field '{field}' on serializer '{definition}' does not support nested selection")]
    #[diagnostic(
        code(apply::not_nested),
        help("Only fields bound to another serializer definition accept a `name(...)` group.")
    )]
    NotNested { field: String, definition: String },

    #[error("Saving hasn't been tested with selection-aware serializers")]
    #[diagnostic(
        code(apply::save_not_supported),
        help("Field selection has undefined interaction with persistence; write through a plain serializer instead.")
    )]
    SaveNotSupported { definition: String },

    #[error("Serializer '{definition}' has no resolver method '{method}' registered")]
    #[diagnostic(code(apply::missing_resolver))]
    MissingResolver { method: String, definition: String },

    #[error("Field '{field}' on serializer '{definition}' still holds an unresolved reference")]
    #[diagnostic(
        code(apply::unresolved_target),
        help("Call SerializerRegistry::resolve() once at startup, after all definitions are registered.")
    )]
    UnresolvedTarget { field: String, definition: String },
}
