//! # Tag Compiler
//!
//! Compiles single-file custom tag components into registration calls for
//! the component runtime.
//!
//! A component is a block such as
//!
//! ```text
//! <todo-list>
//!   <h3>{ opts.title }</h3>
//!   <style>
//!     h3 { font-size: 2em }
//!   </style>
//!   add(e) {
//!     this.items.push(e)
//!   }
//! </todo-list>
//! ```
//!
//! and compiles to
//! `riot.tag2('todo-list', '<h3>{opts.title}</h3>', 'todo-list h3,...', '', function(opts) { ... });`.
//!
//! ## Pipeline
//!
//! 1. **Template pre-pass**: optional whole-document adapter.
//! 2. **Source cleaning**: line endings normalized, HTML comments dropped.
//! 3. **Block matching**: a block closes at a line holding only its closing
//!    tag at the opening tag's indentation.
//! 4. **Per tag**: attributes, `<script>` and `<style>` regions, markup, and
//!    the untagged script tail are compiled separately. Expressions are kept
//!    out of the way of markup rewriting through a per-tag expression table.
//! 5. **Assembly**: a registration call per tag, or [`TagRecord`]s when
//!    entity mode is on.
//!
//! Languages other than plain markup, CSS and shorthand JavaScript are
//! handled by adapters registered in an [`AdapterRegistry`].

mod adapters;
mod attributes;
mod blocks;
mod brackets;
mod compiler;
mod error;
mod expression;
mod html;
mod options;
mod script;
mod source;
mod style;
mod zones;


pub use adapters::{AdapterRegistry, Domain, Passthrough, ScriptAdapter, StyleAdapter, TemplateAdapter};
pub use attributes::{parse_attribs, RUNTIME_PREFIX};
pub use blocks::split_blocks;
pub use brackets::{Brackets, DelimiterMatcher, Delimiters, DEFAULT_PAIR};
pub use compiler::{Compiler, Output, StyleOptions, TagRecord};
pub use error::{BoxError, CompileError, Result};
pub use expression::{count_placeholders, has_placeholder, ExpressionTable, DQ_MARK, PLACEHOLDER_MARK};
pub use html::is_void_tag;
pub use options::{Options, ParserOptions, Part, DEFAULT_REGISTRAR};
pub use script::{hoist_imports, rewrite_methods};
pub use source::clean_source;
pub use style::scoped_css;
pub use zones::unescape_html;
