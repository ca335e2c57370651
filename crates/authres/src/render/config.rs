//! Rendering configuration.

use std::collections::HashSet;
use std::str::FromStr;

use crate::tree::NodeKind;
use crate::{Error, Result};

/// Indent presets applied at the header root. Each preset fixes the
/// indent to four spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentStyle {
    /// No indentation; entries stay on the running line.
    None,
    /// Break and indent before each Entry.
    Entry,
    /// Break and indent before each Entry and SubEntry.
    SubEntry,
    /// Break and indent before each Entry, SubEntry and Comment.
    Full,
}

impl IndentStyle {
    /// The node kinds indented by this preset.
    #[must_use]
    pub const fn indented_kinds(self) -> &'static [NodeKind] {
        match self {
            Self::None => &[],
            Self::Entry => &[NodeKind::Entry],
            Self::SubEntry => &[NodeKind::Entry, NodeKind::SubEntry],
            Self::Full => &[NodeKind::Entry, NodeKind::SubEntry, NodeKind::Comment],
        }
    }
}

impl FromStr for IndentStyle {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "none" => Ok(Self::None),
            "entry" => Ok(Self::Entry),
            "subentry" => Ok(Self::SubEntry),
            "full" => Ok(Self::Full),
            _ => Err(Error::UnknownIndentStyle(name.to_string())),
        }
    }
}

/// Configuration for the folding serializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    eol: String,
    indent: String,
    fold_indent: String,
    try_fold_at: usize,
    force_fold_at: usize,
    indent_kinds: HashSet<NodeKind>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            eol: "\n".to_string(),
            indent: "    ".to_string(),
            fold_indent: "  ".to_string(),
            try_fold_at: 800,
            force_fold_at: 900,
            indent_kinds: HashSet::new(),
        }
    }
}

impl RenderConfig {
    /// Creates the default configuration: `\n` line endings, four space
    /// indent, two space continuation indent, folding tried at 800
    /// characters, no indented kinds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The end-of-line marker.
    #[must_use]
    pub fn eol(&self) -> &str {
        &self.eol
    }

    /// Sets the end-of-line marker.
    pub fn set_eol(&mut self, eol: impl Into<String>) {
        self.eol = eol.into();
    }

    /// The base indent written after a structural line break.
    #[must_use]
    pub fn indent(&self) -> &str {
        &self.indent
    }

    /// Sets the base indent string.
    pub fn set_indent(&mut self, indent: impl Into<String>) {
        self.indent = indent.into();
    }

    /// The extra indent added to inserted fold points.
    #[must_use]
    pub fn fold_indent(&self) -> &str {
        &self.fold_indent
    }

    /// Sets the extra indent added to inserted fold points.
    pub fn set_fold_indent(&mut self, fold_indent: impl Into<String>) {
        self.fold_indent = fold_indent.into();
    }

    /// Line length at which folding is attempted.
    #[must_use]
    pub const fn try_fold_at(&self) -> usize {
        self.try_fold_at
    }

    /// Sets the line length at which folding is attempted.
    pub const fn set_try_fold_at(&mut self, limit: usize) {
        self.try_fold_at = limit;
    }

    /// Line length at which a fold would be forced. The force-fold
    /// strategies are intentionally not implemented: a single run with
    /// no usable fold point is emitted over-length instead.
    #[must_use]
    pub const fn force_fold_at(&self) -> usize {
        self.force_fold_at
    }

    /// Sets the force-fold line length.
    pub const fn set_force_fold_at(&mut self, limit: usize) {
        self.force_fold_at = limit;
    }

    /// True if children of this kind start on a fresh indented line.
    #[must_use]
    pub fn indents(&self, kind: NodeKind) -> bool {
        self.indent_kinds.contains(&kind)
    }

    /// Starts indenting children of the given kind.
    pub fn indent_on(&mut self, kind: NodeKind) {
        self.indent_kinds.insert(kind);
    }

    /// Stops indenting children of the given kind.
    pub fn indent_off(&mut self, kind: NodeKind) {
        self.indent_kinds.remove(&kind);
    }

    /// Applies an indent preset, fixing the indent to four spaces.
    pub fn set_indent_style(&mut self, style: IndentStyle) {
        self.indent_kinds = style.indented_kinds().iter().copied().collect();
        self.indent = "    ".to_string();
    }

    /// Applies an indent preset by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownIndentStyle`] for unrecognized names.
    pub fn set_indent_style_name(&mut self, name: &str) -> Result<()> {
        self.set_indent_style(name.parse()?);
        Ok(())
    }
}
