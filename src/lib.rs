//! limatmpl - Lima template resolution.
//!
//! Reads Lima VM templates from local files, URLs, `github:` shorthands and
//! the built-in `template://` store, and resolves them into one
//! self-contained document: `base` templates are merged in, relative
//! references made absolute, and external scripts inlined, all while keeping
//! the comments of the original YAML.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Runtime settings and the typed template view
//! - [`error`] - Error types and result aliases
//! - [`fetch`] - Fetch context: HTTP, files, stdin, cancellation
//! - [`locator`] - Locator classification, digests, instance names
//! - [`store`] - The `template://` store
//! - [`template`] - The template value object and its resolution pipeline
//! - [`yaml`] - Comment-preserving YAML documents
//!
//! # Example
//!
//! ```
//! use limatmpl::template::Template;
//!
//! let mut tmpl = Template::new("", "template://experimental/foo", "base: bar.yaml\n");
//! tmpl.use_abs_locators().unwrap();
//! assert_eq!(tmpl.bytes(), b"base: template://experimental/bar.yaml\n");
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod locator;
pub mod store;
pub mod template;
pub mod yaml;

pub use error::{Result, TemplateError};
pub use template::{EmbedOptions, Template};
