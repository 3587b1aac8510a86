//! Dot-path query language
//!
//! `path := segment ('.' segment)*`, `segment := '*' | name [marker [key]]`
//! with `#`, `@` and `$` selecting parameters, attributes and (scoped)
//! properties.

pub mod parser;
pub mod search;

pub use parser::{ConfigPath, Marker, Segment};
pub use search::{collapse, find, find_from, SearchResult, SearchResultNode, SyntheticValue};
