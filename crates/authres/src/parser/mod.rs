//! Authentication-Results parser.
//!
//! Consumes the token stream in two phases: the service identifier
//! section at the head of the header, then one entry per
//! semicolon-delimited clause, each parsed by a small state machine.

pub mod lexer;

use std::collections::VecDeque;

use lexer::{Token, TokenKind};

use crate::tree::{Header, NodeId, NodeKind};
use crate::{Error, Result};

/// Parses a raw header string into a [`Header`] tree.
///
/// The input may carry the `Authentication-Results:` header name and
/// folded lines; both are normalized away before parsing.
///
/// # Errors
///
/// Returns a parse error for empty input, a malformed service
/// identifier section, or a token arriving where the entry grammar does
/// not allow it.
pub fn parse(text: &str) -> Result<Header> {
    let tokens = lexer::tokenize(text)?;
    Parser::new(tokens).run()
}

/// Entry state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    /// Expecting a key (or the `none` marker at the start of an entry).
    Key,
    /// Expecting `=`, a `.` key continuation or a `/` version.
    Assignment,
    /// Expecting a value.
    Value,
    /// Expecting the continuation text after a `.` operator.
    KeyMod,
    /// Expecting the digits after a `/` operator.
    Version,
    /// The entry was the `none` marker; only comments may follow.
    NoMoreAfterNone,
}

impl EntryState {
    const fn context(self) -> &'static str {
        match self {
            Self::Key => "an entry key",
            Self::Assignment => "an assignment",
            Self::Value => "an entry value",
            Self::KeyMod => "a key continuation",
            Self::Version => "an entry version",
            Self::NoMoreAfterNone => "the end of a no-result entry",
        }
    }
}

/// Stateful consumer of the token stream.
struct Parser {
    tokens: VecDeque<Token>,
    header: Header,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into(),
            header: Header::new(),
        }
    }

    fn run(mut self) -> Result<Header> {
        self.parse_authserv()?;
        while !self.tokens.is_empty() {
            self.parse_entry()?;
        }

        tracing::debug!(entries = self.header.entries().len(), "Parsed header");
        Ok(self.header)
    }

    /// Phase one: the service identifier, its optional version and any
    /// informal key/value annotations, up to the first separator.
    fn parse_authserv(&mut self) -> Result<()> {
        let authserv = self.header.create_node(NodeKind::AuthServId);

        // Scan for the identifier itself; only comments may precede it.
        while let Some(token) = self.tokens.pop_front() {
            match token.kind() {
                TokenKind::Comment => self.attach_comment(authserv, &token)?,
                TokenKind::String | TokenKind::QuotedString => {
                    self.header.safe_set_value(authserv, token.value())?;
                    break;
                }
                TokenKind::Separator | TokenKind::Assignment | TokenKind::Space => {
                    return Err(Error::InvalidAuthServId {
                        token: token.value().to_string(),
                    });
                }
            }
        }

        // Informal trailing annotations: key=value pairs, a bare
        // version, comments.
        let mut pending_key: Option<String> = None;
        let mut expecting_value = false;

        while let Some(token) = self.tokens.pop_front() {
            match token.kind() {
                TokenKind::Comment => self.attach_comment(authserv, &token)?,
                TokenKind::Separator => break,
                TokenKind::String | TokenKind::QuotedString => {
                    if expecting_value {
                        let key = pending_key.take().ok_or(Error::UndefinedValue)?;
                        let sub = self.new_sub_entry(&key, Some(token.value()))?;
                        self.header.add_child(authserv, sub)?;
                        expecting_value = false;
                    } else {
                        if let Some(previous) = pending_key.take() {
                            self.attach_authserv_trailer(authserv, &previous)?;
                        }
                        pending_key = Some(token.value().to_string());
                    }
                }
                TokenKind::Assignment
                    if token.value() == "=" && pending_key.is_some() && !expecting_value =>
                {
                    expecting_value = true;
                }
                TokenKind::Assignment | TokenKind::Space => {
                    return Err(Error::UnexpectedToken {
                        token: token.value().to_string(),
                        context: "the service identifier section",
                    });
                }
            }
        }

        if let Some(key) = pending_key.take() {
            if expecting_value {
                // Dangling `key=`: keep the annotation with an empty value.
                let sub = self.new_sub_entry(&key, Some(""))?;
                self.header.add_child(authserv, sub)?;
            } else {
                self.attach_authserv_trailer(authserv, &key)?;
            }
        }

        self.header.set_authserv(authserv)
    }

    /// Classifies a bare trailing string in the identifier section: all
    /// digits is a version, anything else a key-only annotation.
    fn attach_authserv_trailer(&mut self, authserv: NodeId, text: &str) -> Result<()> {
        if is_all_digits(text) {
            let version = self.header.create_node(NodeKind::Version);
            self.header.set_value(version, text)?;
            self.header.add_child(authserv, version)
        } else {
            let sub = self.new_sub_entry(text, None)?;
            self.header.add_child(authserv, sub)
        }
    }

    /// Phase two: one semicolon-delimited entry.
    fn parse_entry(&mut self) -> Result<()> {
        let entry = self.header.create_node(NodeKind::Entry);
        let mut state = EntryState::Key;
        let mut open_sub: Option<NodeId> = None;
        let mut entry_has_key = false;
        let mut seen_key_token = false;
        let mut discarded = false;

        while let Some(token) = self.tokens.pop_front() {
            match token.kind() {
                TokenKind::Comment => {
                    let target = if discarded {
                        self.header.root()
                    } else {
                        open_sub.unwrap_or(entry)
                    };
                    self.attach_comment(target, &token)?;
                }
                TokenKind::Separator => break,
                TokenKind::String | TokenKind::QuotedString => {
                    state = self.entry_string(
                        &token,
                        state,
                        entry,
                        &mut open_sub,
                        &mut entry_has_key,
                        &mut seen_key_token,
                        &mut discarded,
                    )?;
                }
                TokenKind::Assignment => {
                    if state != EntryState::Assignment {
                        return Err(Error::UnexpectedToken {
                            token: token.value().to_string(),
                            context: state.context(),
                        });
                    }
                    state = match token.value() {
                        "=" => EntryState::Value,
                        "." => EntryState::KeyMod,
                        _ => EntryState::Version,
                    };
                }
                TokenKind::Space => {
                    return Err(Error::UnexpectedToken {
                        token: token.value().to_string(),
                        context: state.context(),
                    });
                }
            }
        }

        if discarded {
            return Ok(());
        }

        if let Some(sub) = open_sub.take() {
            self.header.add_child(entry, sub)?;
        }

        // Entries that never got any content (stray separators) are
        // dropped rather than attached.
        if entry_has_key || !self.header.children(entry)?.is_empty() {
            self.header.add_child(self.header.root(), entry)?;
        }

        Ok(())
    }

    /// Handles a string token inside an entry, returning the next state.
    #[allow(clippy::too_many_arguments)]
    fn entry_string(
        &mut self,
        token: &Token,
        state: EntryState,
        entry: NodeId,
        open_sub: &mut Option<NodeId>,
        entry_has_key: &mut bool,
        seen_key_token: &mut bool,
        discarded: &mut bool,
    ) -> Result<EntryState> {
        match state {
            EntryState::Key => {
                // The RFC "no results" marker replaces the whole entry;
                // comments seen so far move onto the header itself.
                if !*seen_key_token
                    && token.kind() == TokenKind::String
                    && token.value() == "none"
                {
                    let comments = self.header.children(entry)?.to_vec();
                    for comment in comments {
                        self.header.remove_child(entry, comment)?;
                        self.header.add_child(self.header.root(), comment)?;
                    }
                    *discarded = true;
                    return Ok(EntryState::NoMoreAfterNone);
                }
                *seen_key_token = true;

                if *entry_has_key {
                    let sub = self.new_sub_entry(token.value(), None)?;
                    *open_sub = Some(sub);
                } else {
                    self.header.set_key(entry, token.value())?;
                    *entry_has_key = true;
                }
                Ok(EntryState::Assignment)
            }
            EntryState::Value => {
                if let Some(sub) = open_sub.take() {
                    self.header.safe_set_value(sub, token.value())?;
                    self.header.add_child(entry, sub)?;
                } else {
                    self.header.safe_set_value(entry, token.value())?;
                }
                Ok(EntryState::Key)
            }
            EntryState::KeyMod => {
                let holder = open_sub.unwrap_or(entry);
                let key = format!("{}.{}", self.header.key(holder)?, token.value());
                self.header.set_key(holder, &key)?;
                Ok(EntryState::Assignment)
            }
            EntryState::Version => {
                if !is_all_digits(token.value()) {
                    return Err(Error::InvalidVersion {
                        value: token.value().to_string(),
                    });
                }
                let version = self.header.create_node(NodeKind::Version);
                self.header.set_value(version, token.value())?;
                let holder = open_sub.unwrap_or(entry);
                self.header.add_child(holder, version)?;
                Ok(EntryState::Assignment)
            }
            EntryState::Assignment | EntryState::NoMoreAfterNone => {
                Err(Error::UnexpectedToken {
                    token: token.value().to_string(),
                    context: state.context(),
                })
            }
        }
    }

    /// Creates a detached SubEntry with a key and optional value.
    fn new_sub_entry(&mut self, key: &str, value: Option<&str>) -> Result<NodeId> {
        let sub = self.header.create_node(NodeKind::SubEntry);
        self.header.set_key(sub, key)?;
        if let Some(value) = value {
            self.header.safe_set_value(sub, value)?;
        }
        Ok(sub)
    }

    /// Creates a Comment node for a comment token and attaches it.
    fn attach_comment(&mut self, parent: NodeId, token: &Token) -> Result<()> {
        let comment = self.header.create_node(NodeKind::Comment);
        self.header.safe_set_value(comment, token.value())?;
        self.header.add_child(parent, comment)
    }
}

fn is_all_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_version_entry_and_sub_entry() {
        let header = parse("example.org 1; spf=pass smtp.mailfrom=example.net").unwrap();

        let authserv = header.authserv().unwrap();
        assert_eq!(header.value(authserv).unwrap(), "example.org");
        let authserv_children = header.children(authserv).unwrap();
        assert_eq!(authserv_children.len(), 1);
        assert_eq!(header.kind(authserv_children[0]), NodeKind::Version);
        assert_eq!(header.value(authserv_children[0]).unwrap(), "1");

        let entries = header.entries();
        assert_eq!(entries.len(), 1);
        let entry = entries[0];
        assert_eq!(header.key(entry).unwrap(), "spf");
        assert_eq!(header.value(entry).unwrap(), "pass");

        let subs = header.children(entry).unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(header.kind(subs[0]), NodeKind::SubEntry);
        assert_eq!(header.key(subs[0]).unwrap(), "smtp.mailfrom");
        assert_eq!(header.value(subs[0]).unwrap(), "example.net");
    }

    #[test]
    fn test_none_marker_contributes_nothing() {
        let header = parse("example.org; none").unwrap();
        let authserv = header.authserv().unwrap();
        assert_eq!(header.value(authserv).unwrap(), "example.org");
        assert!(header.children(authserv).unwrap().is_empty());
        assert!(header.entries().is_empty());
        assert!(header.children(header.root()).unwrap().is_empty());
    }

    #[test]
    fn test_comment_and_version_after_identifier() {
        let header = parse("example.org (comment here) 1;").unwrap();
        let authserv = header.authserv().unwrap();
        let children = header.children(authserv).unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(header.kind(children[0]), NodeKind::Comment);
        assert_eq!(header.value(children[0]).unwrap(), "comment here");
        assert_eq!(header.kind(children[1]), NodeKind::Version);
        assert_eq!(header.value(children[1]).unwrap(), "1");
    }

    #[test]
    fn test_header_name_prefix_accepted() {
        let header =
            parse("Authentication-Results: example.org; dkim=pass").unwrap();
        assert_eq!(header.authserv_id(), Some("example.org"));
        assert_eq!(header.entries().len(), 1);
    }

    #[test]
    fn test_identifier_annotations() {
        let header = parse("example.org ptr=mail.example.org; none").unwrap();
        let authserv = header.authserv().unwrap();
        let children = header.children(authserv).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(header.kind(children[0]), NodeKind::SubEntry);
        assert_eq!(header.key(children[0]).unwrap(), "ptr");
        assert_eq!(header.value(children[0]).unwrap(), "mail.example.org");
    }

    #[test]
    fn test_identifier_trailing_key_only_annotation() {
        let header = parse("example.org trusted; none").unwrap();
        let authserv = header.authserv().unwrap();
        let children = header.children(authserv).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(header.kind(children[0]), NodeKind::SubEntry);
        assert_eq!(header.key(children[0]).unwrap(), "trusted");
        assert_eq!(header.value(children[0]).unwrap(), "");
    }

    #[test]
    fn test_separator_before_identifier_is_fatal() {
        assert!(matches!(
            parse("; spf=pass"),
            Err(Error::InvalidAuthServId { .. })
        ));
        assert!(matches!(
            parse("= spf"),
            Err(Error::InvalidAuthServId { .. })
        ));
    }

    #[test]
    fn test_entry_key_only() {
        let header = parse("example.org; spf").unwrap();
        let entries = header.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(header.key(entries[0]).unwrap(), "spf");
        assert_eq!(header.value(entries[0]).unwrap(), "");
    }

    #[test]
    fn test_stray_separators_dropped() {
        let header = parse("example.org;; spf=pass;").unwrap();
        assert_eq!(header.entries().len(), 1);
    }

    #[test]
    fn test_quoted_value() {
        let header = parse("example.org; dkim=\"soft fail\"").unwrap();
        let entry = header.entries()[0];
        assert_eq!(header.value(entry).unwrap(), "soft fail");
    }

    #[test]
    fn test_key_continuation_after_quoted_key() {
        let header = parse("example.org; \"smtp\".mailfrom=bounce@example.net").unwrap();
        let entry = header.entries()[0];
        assert_eq!(header.key(entry).unwrap(), "smtp.mailfrom");
        assert_eq!(header.value(entry).unwrap(), "bounce@example.net");
    }

    #[test]
    fn test_entry_version_after_quoted_key() {
        let header = parse("example.org; \"dkim\"/2=pass").unwrap();
        let entry = header.entries()[0];
        assert_eq!(header.key(entry).unwrap(), "dkim");
        assert_eq!(header.value(entry).unwrap(), "pass");
        let children = header.children(entry).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(header.kind(children[0]), NodeKind::Version);
        assert_eq!(header.value(children[0]).unwrap(), "2");
    }

    #[test]
    fn test_non_numeric_version_is_fatal() {
        assert!(matches!(
            parse("example.org; \"dkim\"/x=pass"),
            Err(Error::InvalidVersion { .. })
        ));
    }

    #[test]
    fn test_none_reparents_comments_onto_header() {
        let header = parse("example.org; (no checks possible) none").unwrap();
        assert!(header.entries().is_empty());
        let children = header.children(header.root()).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(header.kind(children[0]), NodeKind::Comment);
        assert_eq!(header.value(children[0]).unwrap(), "no checks possible");
    }

    #[test]
    fn test_tokens_after_none_are_fatal() {
        assert!(matches!(
            parse("example.org; none spf=pass"),
            Err(Error::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_comment_after_none_attaches_to_header() {
        let header = parse("example.org; none (not checked)").unwrap();
        assert!(header.entries().is_empty());
        let children = header.children(header.root()).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(header.kind(children[0]), NodeKind::Comment);
    }

    #[test]
    fn test_entries_after_none_entry_still_parse() {
        let header = parse("example.org; none; spf=pass").unwrap();
        assert_eq!(header.entries().len(), 1);
    }

    #[test]
    fn test_assignment_without_key_is_fatal() {
        assert!(matches!(
            parse("example.org; =pass"),
            Err(Error::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_bare_string_while_expecting_assignment_is_fatal() {
        assert!(matches!(
            parse("example.org; spf pass"),
            Err(Error::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_comment_placement_in_entries() {
        let header =
            parse("example.org; spf=pass (sender ip) smtp.mailfrom=a@example.net").unwrap();
        let entry = header.entries()[0];
        let children = header.children(entry).unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(header.kind(children[0]), NodeKind::Comment);
        assert_eq!(header.kind(children[1]), NodeKind::SubEntry);
    }

    #[test]
    fn test_dangling_sub_entry_key_is_kept() {
        let header = parse("example.org; spf=pass smtp.helo").unwrap();
        let entry = header.entries()[0];
        let children = header.children(entry).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(header.key(children[0]).unwrap(), "smtp.helo");
        assert_eq!(header.value(children[0]).unwrap(), "");
    }

    #[test]
    fn test_multiple_entries() {
        let header = parse(
            "example.org; spf=pass smtp.mailfrom=example.net; \
             dkim=fail header.d=example.com; dmarc=pass",
        )
        .unwrap();
        let entries = header.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(header.key(entries[0]).unwrap(), "spf");
        assert_eq!(header.key(entries[1]).unwrap(), "dkim");
        assert_eq!(header.key(entries[2]).unwrap(), "dmarc");
    }
}
