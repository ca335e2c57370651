//! Header tree model.
//!
//! A parsed Authentication-Results header is a small tree: the header
//! holds one service identifier subtree and a list of result entries,
//! each of which carries key/value annotations and comments. Nodes live
//! in an arena owned by [`Header`] and are addressed by [`NodeId`];
//! each node keeps a non-owning parent id used only for ancestry
//! checks, never for traversal.

mod search;

pub use search::{Group, Query, QueryMatch};

use std::fmt;

use crate::render::{self, RenderConfig};
use crate::{Error, Result};

/// Node kinds in a header tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The whole header. Its value is the AuthServId subtree.
    Header,
    /// The service identifier at the head of the header.
    AuthServId,
    /// One semicolon-delimited result clause.
    Entry,
    /// A key=value annotation under an AuthServId or Entry.
    SubEntry,
    /// A parenthesized comment.
    Comment,
    /// A numeric version marker.
    Version,
}

impl NodeKind {
    /// The lower-cased kind name, as used by the interchange format.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::AuthServId => "authservid",
            Self::Entry => "entry",
            Self::SubEntry => "subentry",
            Self::Comment => "comment",
            Self::Version => "version",
        }
    }

    /// Looks a kind up by its interchange name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "header" => Some(Self::Header),
            "authservid" => Some(Self::AuthServId),
            "entry" => Some(Self::Entry),
            "subentry" => Some(Self::SubEntry),
            "comment" => Some(Self::Comment),
            "version" => Some(Self::Version),
            _ => None,
        }
    }

    /// Whether nodes of this kind carry a key.
    #[must_use]
    pub const fn has_key(self) -> bool {
        matches!(self, Self::Entry | Self::SubEntry)
    }

    /// Whether nodes of this kind carry a scalar value. The Header's
    /// value is the AuthServId subtree, not a scalar.
    #[must_use]
    pub const fn has_value(self) -> bool {
        matches!(
            self,
            Self::AuthServId | Self::Entry | Self::SubEntry | Self::Comment | Self::Version
        )
    }

    /// Whether nodes of this kind may hold children.
    #[must_use]
    pub const fn has_children(self) -> bool {
        matches!(
            self,
            Self::Header | Self::AuthServId | Self::Entry | Self::SubEntry
        )
    }

    /// The child kinds allowed under this kind.
    #[must_use]
    pub const fn allowed_children(self) -> &'static [Self] {
        match self {
            Self::Header => &[Self::Comment, Self::Entry],
            Self::AuthServId => &[Self::Version, Self::Comment, Self::SubEntry],
            Self::Entry => &[Self::Comment, Self::SubEntry, Self::Version],
            Self::SubEntry => &[Self::Comment, Self::Version],
            Self::Comment | Self::Version => &[],
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handle to a node in a [`Header`] arena.
///
/// Ids are only meaningful for the header that created them; using an id
/// from another header is a logic error and may panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Stored node state.
#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    key: Option<String>,
    value: Option<String>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl NodeData {
    const fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            key: None,
            value: None,
            children: Vec::new(),
            parent: None,
        }
    }
}

/// An Authentication-Results header tree.
///
/// Owns every node, including detached subtrees, which are released when
/// the header is dropped. The root node is always of kind
/// [`NodeKind::Header`].
#[derive(Debug, Clone)]
pub struct Header {
    nodes: Vec<NodeData>,
    root: NodeId,
    /// The root's value slot: exactly one AuthServId subtree.
    authserv: Option<NodeId>,
    config: RenderConfig,
}

impl Header {
    /// Creates an empty header with no service identifier and no entries.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData::new(NodeKind::Header)],
            root: NodeId(0),
            authserv: None,
            config: RenderConfig::default(),
        }
    }

    /// The root header node.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Creates a new detached node of the given kind.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData::new(kind));
        id
    }

    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    /// The kind of a node.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    /// The parent of a node, if attached.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// The key of a node, or an empty string if none was set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`] for kinds without keys.
    pub fn key(&self, id: NodeId) -> Result<&str> {
        let data = self.node(id);
        if !data.kind.has_key() {
            return Err(Error::MissingCapability {
                kind: data.kind.name(),
                capability: "key",
            });
        }
        Ok(data.key.as_deref().unwrap_or(""))
    }

    /// The scalar value of a node, or an empty string if none was set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`] for kinds without scalar
    /// values, including the Header itself.
    pub fn value(&self, id: NodeId) -> Result<&str> {
        let data = self.node(id);
        if !data.kind.has_value() {
            return Err(Error::MissingCapability {
                kind: data.kind.name(),
                capability: "value",
            });
        }
        Ok(data.value.as_deref().unwrap_or(""))
    }

    /// The key as stored, without capability checks. `None` when unset.
    pub(crate) fn raw_key(&self, id: NodeId) -> Option<&str> {
        self.node(id).key.as_deref()
    }

    /// The value as stored, without capability checks. `None` when unset.
    pub(crate) fn raw_value(&self, id: NodeId) -> Option<&str> {
        self.node(id).value.as_deref()
    }

    /// Sets the key of a node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`] for kinds without keys,
    /// [`Error::EmptyKey`] for an empty key, and
    /// [`Error::InvalidCharacters`] if the key contains a double quote,
    /// CR or LF.
    pub fn set_key(&mut self, id: NodeId, key: &str) -> Result<()> {
        let kind = self.node(id).kind;
        if !kind.has_key() {
            return Err(Error::MissingCapability {
                kind: kind.name(),
                capability: "key",
            });
        }
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        if contains_forbidden(key) {
            return Err(Error::InvalidCharacters {
                text: key.to_string(),
            });
        }
        self.node_mut(id).key = Some(key.to_string());
        Ok(())
    }

    /// Sets the scalar value of a node. Empty values are allowed and
    /// render as `""`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`] for kinds without scalar
    /// values and [`Error::InvalidCharacters`] if the value contains a
    /// double quote, CR or LF.
    pub fn set_value(&mut self, id: NodeId, value: &str) -> Result<()> {
        let kind = self.node(id).kind;
        if !kind.has_value() {
            return Err(Error::MissingCapability {
                kind: kind.name(),
                capability: "value",
            });
        }
        if contains_forbidden(value) {
            return Err(Error::InvalidCharacters {
                text: value.to_string(),
            });
        }
        self.node_mut(id).value = Some(value.to_string());
        Ok(())
    }

    /// Sets the scalar value after sanitizing it: double quotes, CR, LF
    /// become spaces; parentheses, backslashes, semicolons and tabs are
    /// removed; surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`] for kinds without scalar
    /// values.
    pub fn safe_set_value(&mut self, id: NodeId, value: &str) -> Result<()> {
        self.set_value(id, &sanitize_value(value))
    }

    /// The ordered children of a node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`] for kinds without children.
    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        let data = self.node(id);
        if !data.kind.has_children() {
            return Err(Error::MissingCapability {
                kind: data.kind.name(),
                capability: "children",
            });
        }
        Ok(&data.children)
    }

    /// Appends a child node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`] if the parent kind holds no
    /// children, and [`Error::InvalidChildRelation`] if the child kind is
    /// not allowed under the parent, the child is already attached, or
    /// the relation would create a cycle.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_kind = self.node(parent).kind;
        let child_kind = self.node(child).kind;

        if !parent_kind.has_children() {
            return Err(Error::MissingCapability {
                kind: parent_kind.name(),
                capability: "children",
            });
        }
        if !parent_kind.allowed_children().contains(&child_kind) {
            return Err(Error::InvalidChildRelation(format!(
                "{child_kind} is not allowed under {parent_kind}"
            )));
        }
        if parent == child {
            return Err(Error::InvalidChildRelation(
                "a node cannot be its own child".to_string(),
            ));
        }
        if self.node(child).parent.is_some() {
            return Err(Error::InvalidChildRelation(
                "child already has a parent".to_string(),
            ));
        }

        // Reject attaching an ancestor below its own descendant.
        let mut cursor = self.node(parent).parent;
        while let Some(ancestor) = cursor {
            if ancestor == child {
                return Err(Error::InvalidChildRelation(
                    "child is an ancestor of the parent".to_string(),
                ));
            }
            cursor = self.node(ancestor).parent;
        }

        self.node_mut(parent).children.push(child);
        self.node_mut(child).parent = Some(parent);
        Ok(())
    }

    /// Removes a child node, detaching its whole subtree. The subtree
    /// stays valid and may be re-attached elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`] if the parent kind holds no
    /// children and [`Error::InvalidChildRelation`] if the node is not
    /// currently a child of the parent.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_kind = self.node(parent).kind;
        if !parent_kind.has_children() {
            return Err(Error::MissingCapability {
                kind: parent_kind.name(),
                capability: "children",
            });
        }

        let position = self.node(parent).children.iter().position(|&c| c == child);
        let Some(position) = position else {
            return Err(Error::InvalidChildRelation(
                "node is not a child of this parent".to_string(),
            ));
        };

        self.node_mut(parent).children.remove(position);
        self.node_mut(child).parent = None;
        Ok(())
    }

    /// Sets the header's service identifier subtree, replacing and
    /// detaching any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidChildRelation`] if the node is not an
    /// AuthServId or is attached elsewhere.
    pub fn set_authserv(&mut self, id: NodeId) -> Result<()> {
        if self.node(id).kind != NodeKind::AuthServId {
            return Err(Error::InvalidChildRelation(format!(
                "header value must be an authservid, got {}",
                self.node(id).kind
            )));
        }
        if self.node(id).parent.is_some() {
            return Err(Error::InvalidChildRelation(
                "child already has a parent".to_string(),
            ));
        }
        if let Some(old) = self.authserv.take() {
            self.node_mut(old).parent = None;
        }
        self.node_mut(id).parent = Some(self.root);
        self.authserv = Some(id);
        Ok(())
    }

    /// Creates an AuthServId node with the given identifier value and
    /// installs it as the header's value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCharacters`] if the identifier contains a
    /// double quote, CR or LF.
    pub fn set_authserv_id(&mut self, identifier: &str) -> Result<NodeId> {
        let id = self.create_node(NodeKind::AuthServId);
        self.set_value(id, identifier)?;
        self.set_authserv(id)?;
        Ok(id)
    }

    /// The service identifier subtree, if set.
    #[must_use]
    pub const fn authserv(&self) -> Option<NodeId> {
        self.authserv
    }

    /// The service identifier text, if set.
    #[must_use]
    pub fn authserv_id(&self) -> Option<&str> {
        self.authserv.and_then(|id| self.raw_value(id))
    }

    /// The header's Entry children, in order.
    #[must_use]
    pub fn entries(&self) -> Vec<NodeId> {
        self.node(self.root)
            .children
            .iter()
            .copied()
            .filter(|&id| self.node(id).kind == NodeKind::Entry)
            .collect()
    }

    /// The rendering configuration used by [`fmt::Display`].
    #[must_use]
    pub const fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Mutable access to the rendering configuration.
    pub const fn config_mut(&mut self) -> &mut RenderConfig {
        &mut self.config
    }

    /// Renders the whole header with an explicit configuration.
    #[must_use]
    pub fn as_string(&self, config: &RenderConfig) -> String {
        render::render(self, self.root, config)
    }

    /// Renders a single subtree with an explicit configuration.
    #[must_use]
    pub fn node_as_string(&self, id: NodeId, config: &RenderConfig) -> String {
        render::render(self, id, config)
    }

    /// Structural equality of two subtrees by kind, key, value and child
    /// sequence.
    fn eq_subtree(&self, id: NodeId, other: &Self, other_id: NodeId) -> bool {
        let a = self.node(id);
        let b = other.node(other_id);

        a.kind == b.kind
            && a.key == b.key
            && a.value == b.value
            && a.children.len() == b.children.len()
            && a.children
                .iter()
                .zip(&b.children)
                .all(|(&ca, &cb)| self.eq_subtree(ca, other, cb))
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

/// Headers compare by kind, key, value and child sequence, ignoring
/// detached nodes and rendering configuration.
impl PartialEq for Header {
    fn eq(&self, other: &Self) -> bool {
        let authserv_eq = match (self.authserv, other.authserv) {
            (Some(a), Some(b)) => self.eq_subtree(a, other, b),
            (None, None) => true,
            _ => false,
        };
        authserv_eq && self.eq_subtree(self.root, other, other.root)
    }
}

impl Eq for Header {}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render::render(self, self.root, &self.config))
    }
}

/// Keys and values must not contain quotes or line breaks.
fn contains_forbidden(text: &str) -> bool {
    text.contains(['"', '\r', '\n'])
}

/// Sanitizer behind [`Header::safe_set_value`].
fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '"' | '\r' | '\n' => out.push(' '),
            '\t' | '(' | ')' | '\\' | ';' => {}
            _ => out.push(ch),
        }
    }
    out.trim().to_string()
}
