//! # authres
//!
//! Authentication-Results header parsing, querying and generation.
//!
//! ## Features
//!
//! - **Parsing**: Tokenize and parse `Authentication-Results` headers
//!   into a typed tree, including comments, versions and annotations
//! - **Querying**: Non-destructive tree search by key, value, kind and
//!   nested conditions
//! - **Generation**: Render trees back to header text with line folding
//!   and configurable indentation
//! - **Interchange**: JSON encode/decode of whole trees
//!
//! ## Quick Start
//!
//! ### Parsing a header
//!
//! ```ignore
//! use authres::parse;
//!
//! let header = parse(
//!     "Authentication-Results: mx.example.org; \
//!      spf=pass smtp.mailfrom=bounce@example.net; \
//!      dkim=pass header.d=example.net",
//! )?;
//!
//! assert_eq!(header.authserv_id(), Some("mx.example.org"));
//! assert_eq!(header.entries().len(), 2);
//! ```
//!
//! ### Querying results
//!
//! ```ignore
//! use authres::{parse, NodeKind, Query};
//!
//! let header = parse("mx.example.org; dkim=pass header.d=example.net")?;
//! let group = header.search(&Query::new().isa(NodeKind::Entry).key("dkim"));
//!
//! for id in group.nodes() {
//!     println!("dkim result: {}", header.value(id)?);
//! }
//! ```
//!
//! ### Building and rendering
//!
//! ```ignore
//! use authres::{Header, IndentStyle, NodeKind};
//!
//! let mut header = Header::new();
//! header.set_authserv_id("mx.example.org")?;
//!
//! let entry = header.create_node(NodeKind::Entry);
//! header.set_key(entry, "spf")?;
//! header.set_value(entry, "pass")?;
//! header.add_child(header.root(), entry)?;
//!
//! header.config_mut().set_indent_style(IndentStyle::Entry);
//! println!("{header}");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
mod interchange;
mod parser;
mod render;
mod tree;

pub use error::{Error, Result};
pub use interchange::{NodeRecord, RecordValue};
pub use parser::lexer::{Token, TokenKind, tokenize};
pub use parser::parse;
pub use render::{IndentStyle, RenderConfig};
pub use tree::{Group, Header, NodeId, NodeKind, Query, QueryMatch};
