//! The dump parser proper: spec.md §4.3.
//!
//! Consumes tokens from a [`Lexer`] and produces a [`DumpParseResult`]
//! holding the repository UUID and a `Vec<RevisionRecord>`. Property
//! inheritance, the symlink quirk, and bogon rejection are implemented
//! here exactly as spec.md §4.3 describes them.

use std::collections::{HashMap, HashSet};
use std::num::IntErrorKind;

use crate::errors::ParseError;
use crate::model::{NodeAction, NodeActionKind, NodeKind, PropMap, RevisionRecord};

use super::lexer::Lexer;

/// Output of a full parse pass.
#[derive(Debug, Clone)]
pub struct DumpParseResult {
    pub uuid: String,
    pub format_version: String,
    pub revisions: Vec<RevisionRecord>,
    /// Flags contributed by `# reposurgeon-read-options:` pragma comments.
    pub pragma_options: Vec<String>,
}

/// Parse a complete dump stream from `lexer`.
pub fn parse<L: Lexer>(lexer: L) -> Result<DumpParseResult, ParseError> {
    DumpParser::new(lexer).run()
}

struct DumpParser<L> {
    lexer: L,
    uuid: String,
    format_version: String,
    /// path -> last explicit (prop_change=true) property set seen for it.
    prop_stash: HashMap<String, PropMap>,
    /// paths currently believed to hold symlink content.
    symlinks: HashSet<String>,
    pragma_options: Vec<String>,
}

enum HeaderLine {
    Blank,
    Comment(String),
    Header(String, String),
}

fn classify_line(bytes: &[u8]) -> HeaderLine {
    if bytes.is_empty() {
        return HeaderLine::Blank;
    }
    let text = String::from_utf8_lossy(bytes).into_owned();
    if text.starts_with('#') {
        return HeaderLine::Comment(text);
    }
    match text.find(": ") {
        Some(idx) => HeaderLine::Header(text[..idx].to_string(), text[idx + 2..].to_string()),
        None => HeaderLine::Header(text, String::new()),
    }
}

fn header<'a>(headers: &'a [(String, String)], key: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn parse_usize(headers: &[(String, String)], key: &str, line: usize) -> Result<Option<usize>, ParseError> {
    match header(headers, key) {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ParseError::MalformedInteger {
                line,
                header: key.to_string(),
                value: v.to_string(),
            }),
    }
}

fn parse_i64(headers: &[(String, String)], key: &str, line: usize) -> Result<Option<i64>, ParseError> {
    match header(headers, key) {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ParseError::MalformedInteger {
                line,
                header: key.to_string(),
                value: v.to_string(),
            }),
    }
}

impl<L: Lexer> DumpParser<L> {
    fn new(lexer: L) -> Self {
        Self {
            lexer,
            uuid: String::new(),
            format_version: String::new(),
            prop_stash: HashMap::new(),
            symlinks: HashSet::new(),
            pragma_options: Vec::new(),
        }
    }

    fn handle_pragma(&mut self, comment: &str) {
        const PREFIX: &str = "# reposurgeon-read-options:";
        if let Some(rest) = comment.strip_prefix(PREFIX) {
            for tok in rest.split_whitespace() {
                self.pragma_options.push(tok.trim_matches(',').to_string());
            }
        }
    }

    /// Skip blank lines, then collect consecutive header lines until a
    /// blank line or EOF. `None` if EOF is reached before any header line.
    fn read_header_block(&mut self) -> Result<Option<Vec<(String, String)>>, ParseError> {
        loop {
            let Some(bytes) = self.lexer.next_line()? else {
                return Ok(None);
            };
            match classify_line(&bytes) {
                HeaderLine::Blank => continue,
                HeaderLine::Comment(c) => {
                    self.handle_pragma(&c);
                    continue;
                }
                HeaderLine::Header(k, v) => {
                    let mut headers = vec![(k, v)];
                    loop {
                        match self.lexer.next_line()? {
                            None => break,
                            Some(b2) => match classify_line(&b2) {
                                HeaderLine::Blank => break,
                                HeaderLine::Comment(c2) => self.handle_pragma(&c2),
                                HeaderLine::Header(k2, v2) => headers.push((k2, v2)),
                            },
                        }
                    }
                    return Ok(Some(headers));
                }
            }
        }
    }

    /// Read a `K <len>\n<key>\nV <len>\n<value>\n` block up to `PROPS-END`.
    /// Returns the properties and the number of bytes consumed, for the
    /// relaxed (`<`) length check spec.md §4.3 describes.
    fn read_props(&mut self, advertised: usize, line: usize) -> Result<(PropMap, usize), ParseError> {
        let mut props = PropMap::new();
        let mut consumed = 0usize;
        loop {
            let raw = self.lexer.next_line()?.ok_or(ParseError::UnexpectedEof {
                line: self.lexer.line_no(),
                expected: "property block".into(),
            })?;
            consumed += raw.len() + 1;
            let text = String::from_utf8_lossy(&raw).into_owned();
            if text == "PROPS-END" {
                break;
            }
            let Some(rest) = text.strip_prefix("K ") else {
                continue;
            };
            let klen: usize = rest
                .trim()
                .parse()
                .map_err(|_| ParseError::MalformedInteger {
                    line,
                    header: "K".into(),
                    value: rest.to_string(),
                })?;
            let kbytes = self.lexer.read_exact(klen)?;
            consumed += klen;
            let nl = self.lexer.read_exact(1)?;
            consumed += 1;
            if nl != [b'\n'] {
                return Err(ParseError::UnterminatedBlob { line });
            }
            let key = String::from_utf8_lossy(&kbytes).into_owned();

            let vraw = self.lexer.next_line()?.ok_or(ParseError::UnexpectedEof {
                line: self.lexer.line_no(),
                expected: "property value header".into(),
            })?;
            consumed += vraw.len() + 1;
            let vtext = String::from_utf8_lossy(&vraw).into_owned();
            let vrest = vtext
                .strip_prefix("V ")
                .ok_or_else(|| ParseError::MissingHeader {
                    line,
                    header: "V".into(),
                })?;
            let vlen: usize = vrest
                .trim()
                .parse()
                .map_err(|_| ParseError::MalformedInteger {
                    line,
                    header: "V".into(),
                    value: vrest.to_string(),
                })?;
            let vbytes = self.lexer.read_exact(vlen)?;
            consumed += vlen;
            let nl2 = self.lexer.read_exact(1)?;
            consumed += 1;
            if nl2 != [b'\n'] {
                return Err(ParseError::UnterminatedBlob { line });
            }
            let value = String::from_utf8_lossy(&vbytes).into_owned();
            props.set(key, value);
        }
        if consumed > advertised {
            return Err(ParseError::PropertyLengthMismatch {
                line,
                advertised,
                consumed,
            });
        }
        Ok((props, consumed))
    }

    fn run(mut self) -> Result<DumpParseResult, ParseError> {
        let mut revisions: Vec<RevisionRecord> = Vec::new();
        loop {
            let line_no = self.lexer.line_no() + 1;
            let Some(headers) = self.read_header_block()? else {
                break;
            };

            if let Some(v) = header(&headers, "SVN-fs-dump-format-version") {
                self.format_version = v.trim().to_string();
                continue;
            }
            if let Some(v) = header(&headers, "UUID") {
                self.uuid = v.trim().to_string();
                continue;
            }
            if let Some(rev_str) = header(&headers, "Revision-number") {
                self.parse_revision(rev_str, line_no, &headers, &mut revisions)?;
                continue;
            }
            if header(&headers, "Node-path").is_some() {
                let Some(current) = revisions.last_mut() else {
                    tracing::warn!(line = line_no, "node header block before any revision; skipping");
                    continue;
                };
                self.parse_node(&headers, line_no, current)?;
                continue;
            }
            tracing::warn!(line = line_no, "unrecognized header block, skipping");
        }
        Ok(DumpParseResult {
            uuid: self.uuid,
            format_version: self.format_version,
            revisions,
            pragma_options: self.pragma_options,
        })
    }

    fn parse_revision(
        &mut self,
        rev_str: &str,
        line_no: usize,
        headers: &[(String, String)],
        revisions: &mut Vec<RevisionRecord>,
    ) -> Result<(), ParseError> {
        let rev = rev_str.trim().parse::<i64>().map_err(|e| {
            if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) {
                ParseError::RevisionCounterOverflow { line: line_no }
            } else {
                ParseError::MalformedInteger {
                    line: line_no,
                    header: "Revision-number".into(),
                    value: rev_str.to_string(),
                }
            }
        })?;
        let prop_len = parse_usize(headers, "Prop-content-length", line_no)?.ok_or_else(|| {
            ParseError::MissingHeader {
                line: line_no,
                header: "Prop-content-length".into(),
            }
        })?;
        parse_usize(headers, "Content-length", line_no)?.ok_or_else(|| ParseError::MissingHeader {
            line: line_no,
            header: "Content-length".into(),
        })?;

        let (mut props, _consumed) = self.read_props(prop_len, line_no)?;
        let log = props.remove("svn:log").unwrap_or_default();
        let author = props.remove("svn:author").unwrap_or_default();
        let date = props.remove("svn:date").unwrap_or_default();
        revisions.push(RevisionRecord {
            revision: rev,
            nodes: Vec::new(),
            log,
            author,
            date,
            properties: props,
        });
        Ok(())
    }

    fn parse_node(
        &mut self,
        headers: &[(String, String)],
        line_no: usize,
        current: &mut RevisionRecord,
    ) -> Result<(), ParseError> {
        let path = header(headers, "Node-path").unwrap().to_string();
        let kind = match header(headers, "Node-kind") {
            Some("file") => NodeKind::File,
            Some("dir") => NodeKind::Dir,
            _ => NodeKind::None,
        };
        let action = match header(headers, "Node-action") {
            Some("add") => NodeActionKind::Add,
            Some("delete") => NodeActionKind::Delete,
            Some("change") => NodeActionKind::Change,
            Some("replace") => NodeActionKind::Replace,
            _ => NodeActionKind::None,
        };
        let from_rev = parse_i64(headers, "Node-copyfrom-rev", line_no)?;
        let from_path = header(headers, "Node-copyfrom-path").map(|s| s.to_string());
        let content_hash = header(headers, "Text-content-md5").map(|s| s.to_string());
        let prop_len = parse_usize(headers, "Prop-content-length", line_no)?;
        let text_len = parse_usize(headers, "Text-content-length", line_no)?;
        let prop_change = prop_len.is_some();

        let mut properties: Option<PropMap> = None;
        if let Some(n) = prop_len {
            let (props, _consumed) = self.read_props(n, line_no)?;
            properties = Some(props);
        }

        let mut blob: Option<Vec<u8>> = None;
        if let Some(n) = text_len {
            let bytes = self.lexer.read_exact(n)?;
            let nl = self.lexer.read_exact(1)?;
            if nl != [b'\n'] {
                return Err(ParseError::UnterminatedBlob { line: line_no });
            }
            blob = Some(bytes);
        }

        if is_bogon(action, kind, from_rev, &from_path, &blob, &properties, text_len) {
            tracing::warn!(line = line_no, path = %path, "rejecting bogon node");
            return Ok(());
        }

        let final_properties = if prop_change {
            let p = properties.clone().unwrap_or_default();
            self.prop_stash.insert(path.clone(), p.clone());
            Some(p)
        } else if action == NodeActionKind::Add {
            match &from_path {
                Some(fp) if !fp.is_empty() => self.prop_stash.get(fp).cloned(),
                _ => self.prop_stash.get(&path).cloned(),
            }
        } else {
            self.prop_stash.get(&path).cloned()
        };

        if action == NodeActionKind::Delete {
            self.prop_stash.remove(&path);
        }

        let mut final_blob = blob;
        let mut is_symlink_now = self.symlinks.contains(&path);
        if action == NodeActionKind::Add {
            if let Some(p) = &final_properties {
                if p.contains_key("svn:special") {
                    is_symlink_now = true;
                    self.symlinks.insert(path.clone());
                }
            }
        }
        if is_symlink_now {
            if let Some(b) = &final_blob {
                if let Some(stripped) = b.strip_prefix(b"link ") {
                    final_blob = Some(stripped.to_vec());
                }
            }
        }
        if action == NodeActionKind::Delete {
            self.symlinks.remove(&path);
        }

        let index = current.nodes.len();
        current.nodes.push(NodeAction {
            path,
            from_path,
            from_rev,
            content_hash,
            blob: final_blob,
            properties: final_properties,
            file_set: None,
            deleted_file_set: None,
            blob_mark: None,
            revision: current.revision,
            index,
            from_index: None,
            kind,
            action,
            prop_change,
            ancestor: None,
        });
        Ok(())
    }
}

fn is_bogon(
    action: NodeActionKind,
    kind: NodeKind,
    from_rev: Option<i64>,
    from_path: &Option<String>,
    blob: &Option<Vec<u8>>,
    properties: &Option<PropMap>,
    text_len: Option<usize>,
) -> bool {
    if action == NodeActionKind::None {
        return true;
    }
    let is_copy = from_path.as_deref().is_some_and(|p| !p.is_empty());
    if kind == NodeKind::Dir && text_len.is_some() {
        return true;
    }
    let has_from_rev_nonzero = from_rev.is_some_and(|r| r != 0);
    if has_from_rev_nonzero != is_copy {
        return true;
    }
    if action == NodeActionKind::Change && blob.is_none() && properties.is_none() && !is_copy {
        return true;
    }
    if action != NodeActionKind::Delete && kind == NodeKind::None {
        return true;
    }
    if !matches!(action, NodeActionKind::Add | NodeActionKind::Replace) && is_copy {
        return true;
    }
    false
}
