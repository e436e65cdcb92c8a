//! Extractor implementations shipped with the library.

mod dom;

pub use dom::DomExtractor;
