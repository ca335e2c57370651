//! Line folding over the fragment stream.
//!
//! Fragments are grouped into sections, one per maximal whitespace-then-
//! content run, and sections are laid out against the configured soft
//! fold limit. Folds are only ever inserted at whitespace; a run with no
//! usable fold point is emitted over-length.

use std::collections::VecDeque;

use super::config::RenderConfig;

/// One element of the pre-fold fragment stream.
#[derive(Debug, Clone)]
pub(super) enum Fragment {
    /// Visible text: keys, operators, values, separators, comments.
    Text(String),
    /// Whitespace between fragments. `folded` marks spacing introduced
    /// by the folder itself so it is not folded a second time.
    Space { text: String, folded: bool },
    /// Line break, rendered as the configured end-of-line marker.
    Eol,
}

impl Fragment {
    pub(super) fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub(super) fn space(text: impl Into<String>) -> Self {
        Self::Space {
            text: text.into(),
            folded: false,
        }
    }

    fn folded_space(text: String) -> Self {
        Self::Space { text, folded: true }
    }

    /// Display width contributed to the current line.
    fn width(&self) -> usize {
        match self {
            Self::Text(text) | Self::Space { text, .. } => text.len(),
            Self::Eol => 0,
        }
    }

    const fn is_space(&self) -> bool {
        matches!(self, Self::Space { .. })
    }

    const fn is_content(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

/// A maximal whitespace-then-content run; the atomic unit of folding.
#[derive(Debug, Default)]
struct Section {
    fragments: Vec<Fragment>,
}

impl Section {
    fn width(&self) -> usize {
        self.fragments.iter().map(Fragment::width).sum()
    }

    fn has_content(&self) -> bool {
        self.fragments.iter().any(Fragment::is_content)
    }

    /// True for sections the folder itself created: a line break plus an
    /// indent marked as folded. These are never folded again.
    fn is_refolded(&self) -> bool {
        matches!(self.fragments.first(), Some(Fragment::Eol))
            && matches!(
                self.fragments.get(1),
                Some(Fragment::Space { folded: true, .. })
            )
    }

    fn ends_with_eol(&self) -> bool {
        matches!(self.fragments.last(), Some(Fragment::Eol))
    }

    fn strip_leading_spaces(&mut self) {
        let content_start = self
            .fragments
            .iter()
            .position(|frag| !frag.is_space())
            .unwrap_or(self.fragments.len());
        self.fragments.drain(..content_start);
    }
}

/// Groups fragments into sections: a new section starts at every space
/// that does not directly follow another space.
fn split_sections(fragments: Vec<Fragment>) -> VecDeque<Section> {
    let mut sections = VecDeque::new();
    let mut current = Section::default();
    let mut prev_was_space = false;

    for fragment in fragments {
        if fragment.is_space() && !prev_was_space && !current.fragments.is_empty() {
            sections.push_back(std::mem::take(&mut current));
        }
        prev_was_space = fragment.is_space();
        current.fragments.push(fragment);
    }

    if !current.fragments.is_empty() {
        sections.push_back(current);
    }

    sections
}

/// Splits an over-long section at a fragment boundary, keeping the first
/// half under the fold limit and prefixing the rest with a fresh folded
/// line. Hands the section back untouched when no usable split point
/// exists.
fn split_section(
    section: Section,
    limit: usize,
    indent: &str,
) -> std::result::Result<(Section, Section), Section> {
    let mut rest: VecDeque<Fragment> = section.fragments.into();
    let mut first = Section::default();
    let mut width = 0usize;

    while let Some(fragment) = rest.front() {
        let fragment_width = fragment.width();
        if width + fragment_width >= limit {
            break;
        }
        if !rest.iter().skip(1).any(Fragment::is_content) {
            break;
        }
        width += fragment_width;
        if let Some(fragment) = rest.pop_front() {
            first.fragments.push(fragment);
        }
    }

    if first.has_content() && rest.iter().any(Fragment::is_content) {
        let mut second = Section::default();
        second.fragments.push(Fragment::Eol);
        second.fragments.push(Fragment::folded_space(indent.to_string()));
        second.fragments.extend(rest);
        Ok((first, second))
    } else {
        first.fragments.extend(rest);
        Err(first)
    }
}

/// Concatenates the fragment stream into folded output text.
pub(super) fn fold(fragments: Vec<Fragment>, config: &RenderConfig) -> String {
    let mut queue = split_sections(fragments);
    let mut out = String::new();
    let mut line_width = 0usize;
    let mut base_indent = config.indent().to_string();
    let mut adopt_indent = false;

    while let Some(mut section) = queue.pop_front() {
        // A structural line break adopts the indent that follows it as
        // the base for folds inserted further along the same line.
        if adopt_indent {
            if let Some(Fragment::Space { text, folded: false }) = section.fragments.first() {
                base_indent.clone_from(text);
            }
            adopt_indent = false;
        }

        let refolded = section.is_refolded();
        let width = section.width();
        let start = if refolded { 0 } else { line_width };

        if start + width <= config.try_fold_at() {
            adopt_indent = section.ends_with_eol();
            append(&section, &mut out, &mut line_width, config);
            continue;
        }

        if !refolded && line_width > 0 {
            // Retry the section at the start of a folded line.
            section.strip_leading_spaces();
            if !section.has_content() {
                continue;
            }
            let mut folded = Section::default();
            folded.fragments.push(Fragment::Eol);
            folded
                .fragments
                .push(Fragment::folded_space(format!(
                    "{base_indent}{}",
                    config.fold_indent()
                )));
            folded.fragments.extend(section.fragments);
            queue.push_front(folded);
            continue;
        }

        // The section alone exceeds the limit on a fresh line: split it
        // at a fragment boundary if one exists.
        let indent = format!("{base_indent}{}", config.fold_indent());
        match split_section(section, config.try_fold_at(), &indent) {
            Ok((first, second)) => {
                queue.push_front(second);
                queue.push_front(first);
            }
            Err(section) => {
                // One unbreakable run longer than the limit: emitted
                // over-length rather than folded mid-token.
                tracing::debug!(
                    limit = config.try_fold_at(),
                    "Unbreakable section exceeds fold limit"
                );
                adopt_indent = section.ends_with_eol();
                append(&section, &mut out, &mut line_width, config);
            }
        }
    }

    out
}

fn append(section: &Section, out: &mut String, line_width: &mut usize, config: &RenderConfig) {
    for fragment in &section.fragments {
        match fragment {
            Fragment::Text(text) | Fragment::Space { text, .. } => {
                out.push_str(text);
                *line_width += text.len();
            }
            Fragment::Eol => {
                out.push_str(config.eol());
                *line_width = 0;
            }
        }
    }
}
