//! Query engine over header trees.
//!
//! Searches are non-destructive: results reference nodes that stay owned
//! by the header, mirrored in a pruned [`Group`] that keeps just enough
//! structure to show how each match was reached.

use regex::Regex;

use crate::tree::{Header, NodeId, NodeKind};

/// A match rule for keys, values and the service identifier.
#[derive(Debug, Clone)]
pub enum QueryMatch {
    /// Case-insensitive exact comparison.
    Exact(String),
    /// Regular expression match.
    Pattern(Regex),
}

impl QueryMatch {
    fn matches(&self, text: &str) -> bool {
        match self {
            Self::Exact(expected) => expected.eq_ignore_ascii_case(text),
            Self::Pattern(pattern) => pattern.is_match(text),
        }
    }
}

impl From<&str> for QueryMatch {
    fn from(text: &str) -> Self {
        Self::Exact(text.to_string())
    }
}

impl From<String> for QueryMatch {
    fn from(text: String) -> Self {
        Self::Exact(text)
    }
}

impl From<Regex> for QueryMatch {
    fn from(pattern: Regex) -> Self {
        Self::Pattern(pattern)
    }
}

/// A conjunction of match clauses. A node matches only if every present
/// clause matches.
#[derive(Debug, Clone, Default)]
pub struct Query {
    key: Option<QueryMatch>,
    value: Option<QueryMatch>,
    authserv_id: Option<QueryMatch>,
    isa: Option<NodeKind>,
    has: Vec<Query>,
}

impl Query {
    /// Creates an empty query, which matches every node.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires the node key to match. Kinds without keys never match.
    #[must_use]
    pub fn key(mut self, rule: impl Into<QueryMatch>) -> Self {
        self.key = Some(rule.into());
        self
    }

    /// Requires the node's scalar value to match. Kinds without scalar
    /// values, including the Header, never match.
    #[must_use]
    pub fn value(mut self, rule: impl Into<QueryMatch>) -> Self {
        self.value = Some(rule.into());
        self
    }

    /// Requires the node to be the Header and its service identifier to
    /// match.
    #[must_use]
    pub fn authserv_id(mut self, rule: impl Into<QueryMatch>) -> Self {
        self.authserv_id = Some(rule.into());
        self
    }

    /// Requires an exact node kind.
    #[must_use]
    pub fn isa(mut self, kind: NodeKind) -> Self {
        self.isa = Some(kind);
        self
    }

    /// Requires a sub-query to yield at least one result when searched
    /// from the node. May be given multiple times.
    #[must_use]
    pub fn has(mut self, sub: Self) -> Self {
        self.has.push(sub);
        self
    }
}

/// Item inside a result group: a matched node or a nested group for a
/// child subtree that contained matches.
#[derive(Debug, Clone)]
enum GroupItem {
    Node(NodeId),
    Group(Group),
}

/// Pruned mirror of a searched subtree.
///
/// Holds matched nodes by id; the nodes stay attached to, and owned by,
/// the header they were found in. The group is only meaningful while
/// that header is alive and unchanged.
#[derive(Debug, Clone, Default)]
pub struct Group {
    items: Vec<GroupItem>,
}

impl Group {
    /// True if the search produced no matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of matched nodes, counting nested groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items
            .iter()
            .map(|item| match item {
                GroupItem::Node(_) => 1,
                GroupItem::Group(group) => group.len(),
            })
            .sum()
    }

    /// All matched nodes in depth-first order.
    #[must_use]
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    /// The first matched node, if any.
    #[must_use]
    pub fn first(&self) -> Option<NodeId> {
        self.items.iter().find_map(|item| match item {
            GroupItem::Node(id) => Some(*id),
            GroupItem::Group(group) => group.first(),
        })
    }

    fn collect(&self, out: &mut Vec<NodeId>) {
        for item in &self.items {
            match item {
                GroupItem::Node(id) => out.push(*id),
                GroupItem::Group(group) => group.collect(out),
            }
        }
    }
}

impl Header {
    /// Searches the whole header.
    #[must_use]
    pub fn search(&self, query: &Query) -> Group {
        self.search_from(self.root(), query)
    }

    /// Searches a subtree. The node itself is considered, then every
    /// descendant; child subtrees that contain matches appear as nested
    /// groups so ancestry is preserved.
    #[must_use]
    pub fn search_from(&self, id: NodeId, query: &Query) -> Group {
        let mut group = Group::default();

        if self.query_matches(id, query) {
            group.items.push(GroupItem::Node(id));
        }

        for child in self.descendants_of(id) {
            let sub = self.search_from(child, query);
            if !sub.is_empty() {
                group.items.push(GroupItem::Group(sub));
            }
        }

        group
    }

    /// Child nodes to descend into. The Header's service identifier
    /// subtree is traversed like a child so its annotations are
    /// reachable.
    fn descendants_of(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if self.kind(id) == NodeKind::Header
            && let Some(authserv) = self.authserv()
        {
            out.push(authserv);
        }
        if let Ok(children) = self.children(id) {
            out.extend_from_slice(children);
        }
        out
    }

    fn query_matches(&self, id: NodeId, query: &Query) -> bool {
        let kind = self.kind(id);

        if let Some(rule) = &query.isa
            && *rule != kind
        {
            return false;
        }

        if let Some(rule) = &query.key {
            match self.raw_key(id) {
                Some(key) if kind.has_key() => {
                    if !rule.matches(key) {
                        return false;
                    }
                }
                _ => return false,
            }
        }

        if let Some(rule) = &query.value {
            match self.raw_value(id) {
                Some(value) if kind.has_value() => {
                    if !rule.matches(value) {
                        return false;
                    }
                }
                _ => return false,
            }
        }

        if let Some(rule) = &query.authserv_id {
            if kind != NodeKind::Header {
                return false;
            }
            match self.authserv_id() {
                Some(identifier) => {
                    if !rule.matches(identifier) {
                        return false;
                    }
                }
                None => return false,
            }
        }

        query
            .has
            .iter()
            .all(|sub| !self.search_from(id, sub).is_empty())
    }
}
