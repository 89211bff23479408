//! Output renderers.

pub mod document;
pub mod dot;
pub mod summary;

pub use document::{Document, build_document, render_document};
pub use dot::render_dot;
pub use summary::render_summary;
