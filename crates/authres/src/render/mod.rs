//! Folding serializer: header trees back to header text.
//!
//! Rendering is two steps. A depth-first walk flattens the subtree into
//! a stream of text, space and line-break fragments; the folding pass
//! then joins that stream into lines under the configured limits.

mod config;
mod fold;

pub use config::{IndentStyle, RenderConfig};

use fold::Fragment;

use crate::tree::{Header, NodeId, NodeKind};

/// Renders a subtree as header text under the given configuration.
pub(crate) fn render(header: &Header, id: NodeId, config: &RenderConfig) -> String {
    let mut fragments = Vec::new();
    emit(header, id, config, &mut fragments);
    let text = fold::fold(fragments, config);
    tracing::debug!(chars = text.len(), "Rendered header node");
    text
}

fn emit(header: &Header, id: NodeId, config: &RenderConfig, out: &mut Vec<Fragment>) {
    match header.kind(id) {
        NodeKind::Header => emit_header(header, id, config, out),
        NodeKind::AuthServId => emit_authserv(header, id, config, out),
        NodeKind::Entry | NodeKind::SubEntry => emit_keyed(header, id, config, out),
        NodeKind::Comment => {
            let body = header.raw_value(id).unwrap_or("");
            out.push(Fragment::text(format!("({body})")));
        }
        NodeKind::Version => {
            if let Some(value) = header.raw_value(id) {
                out.push(Fragment::text(value));
            }
        }
    }
}

fn emit_header(header: &Header, id: NodeId, config: &RenderConfig, out: &mut Vec<Fragment>) {
    if let Some(authserv) = header.authserv() {
        emit(header, authserv, config, out);
    }

    let children = header.children(id).unwrap_or(&[]);

    // A header with no result entries carries the explicit marker.
    if !children
        .iter()
        .any(|&child| header.kind(child) == NodeKind::Entry)
    {
        out.push(Fragment::text(";"));
        out.push(Fragment::space(" "));
        out.push(Fragment::text("none"));
    }

    for &child in children {
        if header.kind(child) == NodeKind::Entry {
            out.push(Fragment::text(";"));
        }
        push_separator(config, header.kind(child), out);
        emit(header, child, config, out);
    }
}

fn emit_authserv(header: &Header, id: NodeId, config: &RenderConfig, out: &mut Vec<Fragment>) {
    if let Some(value) = header.raw_value(id)
        && !value.is_empty()
    {
        out.push(Fragment::text(stringify(value)));
    }

    for &child in header.children(id).unwrap_or(&[]) {
        push_separator(config, header.kind(child), out);
        emit(header, child, config, out);
    }
}

fn emit_keyed(header: &Header, id: NodeId, config: &RenderConfig, out: &mut Vec<Fragment>) {
    let children = header.children(id).unwrap_or(&[]);
    let has_version = children
        .iter()
        .any(|&child| header.kind(child) == NodeKind::Version);

    let key = header.raw_key(id);
    if let Some(key) = key {
        // A version rides on the key as `/n`; quoting the key makes the
        // slash read back as the version operator rather than as part of
        // the key itself. A key spelled `none` with a real value is
        // quoted for the same reason: bare it would read back as the
        // no-results marker.
        let quoted = has_version
            || (key == "none"
                && header
                    .raw_value(id)
                    .is_some_and(|value| !value.is_empty()));
        if quoted {
            out.push(Fragment::text(format!("\"{key}\"")));
        } else {
            out.push(Fragment::text(stringify(key)));
        }
    }

    for &child in children {
        if header.kind(child) == NodeKind::Version {
            out.push(Fragment::text("/"));
            out.push(Fragment::text(header.raw_value(child).unwrap_or("")));
        }
    }

    match header.raw_value(id) {
        // A literal zero renders verbatim.
        Some("0") => {
            out.push(Fragment::text("="));
            out.push(Fragment::text("0"));
        }
        // An empty value renders as an empty quoted string, except for
        // the `none` marker, which stands alone.
        Some("") => {
            if key != Some("none") {
                out.push(Fragment::text("="));
                out.push(Fragment::text("\"\""));
            }
        }
        Some(value) => {
            out.push(Fragment::text("="));
            out.push(Fragment::text(stringify(value)));
        }
        None => {}
    }

    for &child in children {
        if header.kind(child) == NodeKind::Version {
            continue;
        }
        push_separator(config, header.kind(child), out);
        emit(header, child, config, out);
    }
}

fn push_separator(config: &RenderConfig, kind: NodeKind, out: &mut Vec<Fragment>) {
    if config.indents(kind) {
        out.push(Fragment::Eol);
        out.push(Fragment::space(config.indent()));
    } else {
        out.push(Fragment::space(" "));
    }
}

/// Quotes text that contains whitespace or structural characters.
fn stringify(text: &str) -> String {
    if text.contains(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | ';' | '=')) {
        format!("\"{text}\"")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// example.org 1; spf=pass smtp.mailfrom=example.net
    fn sample() -> Header {
        let mut header = Header::new();
        let authserv = header.set_authserv_id("example.org").unwrap();
        let version = header.create_node(NodeKind::Version);
        header.set_value(version, "1").unwrap();
        header.add_child(authserv, version).unwrap();

        let spf = header.create_node(NodeKind::Entry);
        header.set_key(spf, "spf").unwrap();
        header.set_value(spf, "pass").unwrap();
        header.add_child(header.root(), spf).unwrap();

        let mailfrom = header.create_node(NodeKind::SubEntry);
        header.set_key(mailfrom, "smtp.mailfrom").unwrap();
        header.set_value(mailfrom, "example.net").unwrap();
        header.add_child(spf, mailfrom).unwrap();

        header
    }

    #[test]
    fn test_simple_header() {
        assert_eq!(
            sample().to_string(),
            "example.org 1; spf=pass smtp.mailfrom=example.net"
        );
    }

    #[test]
    fn test_header_without_entries_renders_none() {
        let mut header = Header::new();
        header.set_authserv_id("example.org").unwrap();
        assert_eq!(header.to_string(), "example.org; none");
    }

    #[test]
    fn test_comment_and_version_under_authserv() {
        let mut header = Header::new();
        let authserv = header.set_authserv_id("example.org").unwrap();
        let comment = header.create_node(NodeKind::Comment);
        header.set_value(comment, "comment here").unwrap();
        header.add_child(authserv, comment).unwrap();
        let version = header.create_node(NodeKind::Version);
        header.set_value(version, "1").unwrap();
        header.add_child(authserv, version).unwrap();

        assert_eq!(header.to_string(), "example.org (comment here) 1; none");
    }

    #[test]
    fn test_value_quoted_when_needed() {
        let mut header = Header::new();
        header.set_authserv_id("example.org").unwrap();
        let entry = header.create_node(NodeKind::Entry);
        header.set_key(entry, "reason").unwrap();
        header.set_value(entry, "no signature found").unwrap();
        header.add_child(header.root(), entry).unwrap();

        assert_eq!(
            header.to_string(),
            "example.org; reason=\"no signature found\""
        );
    }

    #[test]
    fn test_zero_value_renders_verbatim() {
        let mut header = Header::new();
        let entry = header.create_node(NodeKind::Entry);
        header.set_key(entry, "count").unwrap();
        header.set_value(entry, "0").unwrap();
        assert_eq!(
            header.node_as_string(entry, &RenderConfig::default()),
            "count=0"
        );
    }

    #[test]
    fn test_empty_value_renders_quoted() {
        let mut header = Header::new();
        let entry = header.create_node(NodeKind::Entry);
        header.set_key(entry, "dkim").unwrap();
        header.set_value(entry, "").unwrap();
        assert_eq!(
            header.node_as_string(entry, &RenderConfig::default()),
            "dkim=\"\""
        );
    }

    #[test]
    fn test_none_key_suppresses_empty_value() {
        let mut header = Header::new();
        let entry = header.create_node(NodeKind::Entry);
        header.set_key(entry, "none").unwrap();
        header.set_value(entry, "").unwrap();
        assert_eq!(
            header.node_as_string(entry, &RenderConfig::default()),
            "none"
        );
    }

    #[test]
    fn test_none_key_with_value_is_quoted() {
        let mut header = Header::new();
        let entry = header.create_node(NodeKind::Entry);
        header.set_key(entry, "none").unwrap();
        header.set_value(entry, "pass").unwrap();
        assert_eq!(
            header.node_as_string(entry, &RenderConfig::default()),
            "\"none\"=pass"
        );
    }

    #[test]
    fn test_entry_version_rides_on_key() {
        let mut header = Header::new();
        let entry = header.create_node(NodeKind::Entry);
        header.set_key(entry, "dkim").unwrap();
        header.set_value(entry, "pass").unwrap();
        let version = header.create_node(NodeKind::Version);
        header.set_value(version, "2").unwrap();
        header.add_child(entry, version).unwrap();

        assert_eq!(
            header.node_as_string(entry, &RenderConfig::default()),
            "\"dkim\"/2=pass"
        );
    }

    #[test]
    fn test_tiny_fold_limit_breaks_before_sub_entry() {
        let mut header = Header::new();
        let entry = header.create_node(NodeKind::Entry);
        header.set_key(entry, "dkim").unwrap();
        header.set_value(entry, "fail").unwrap();
        let sub = header.create_node(NodeKind::SubEntry);
        header.set_key(sub, "header.i").unwrap();
        header.set_value(sub, "@example.com").unwrap();
        header.add_child(entry, sub).unwrap();

        let mut config = RenderConfig::default();
        config.set_try_fold_at(5);
        let text = header.node_as_string(entry, &config);
        assert!(text.contains("\n      header.i=@example.com"));
    }

    #[test]
    fn test_indent_style_entry() {
        let mut header = sample();
        header.config_mut().set_indent_style(IndentStyle::Entry);
        assert_eq!(
            header.to_string(),
            "example.org 1;\n    spf=pass smtp.mailfrom=example.net"
        );
    }

    #[test]
    fn test_indent_style_subentry() {
        let mut header = sample();
        header.config_mut().set_indent_style(IndentStyle::SubEntry);
        assert_eq!(
            header.to_string(),
            "example.org 1;\n    spf=pass\n    smtp.mailfrom=example.net"
        );
    }
}
