pub mod api;
pub mod apply;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod render;
pub mod schema;
pub mod selection;

pub use api::{select, Selected};
