//! # fleetsync-render
//!
//! Tera rendering of the human-readable fleet status page.
//!
//! [`StatusPage`] owns a compiled template set and renders one of three
//! states: a table of records sorted by every field, a `NO DATA` notice, or
//! the upstream error text in a `<pre>` block. Cell values are HTML-escaped.

pub mod error;
pub mod page;

pub use error::RenderError;
pub use page::{StatusPage, PAGE_TITLE};
