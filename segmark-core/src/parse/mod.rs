pub mod document;
pub mod formats;
pub mod links;
pub(crate) mod merge;
