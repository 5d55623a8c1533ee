//! Homepage acquisition for newsrant.
//!
//! - [`source::NewsSource`]: fetches the homepage and article pages over HTTP
//! - [`extract`]: pure HTML parsing (article list, article body text)

pub mod extract;
pub mod source;

pub use source::NewsSource;
