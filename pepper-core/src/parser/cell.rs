use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ParseError;
use crate::parser::block::RawBlock;
use crate::parser::scan::{find_matching, LineCounter};
use crate::types::{Leaf, RequestSpec};

/// A cell marker immediately before a `{` at depth zero of a block body.
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(do|headers|body|before|after|depends_on|import|mandatory)\s*$")
        .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum CellKind {
    Request,
    Headers,
    Body,
    PreCode,
    PostCode,
    DependsOn,
    Imports,
    Mandatory,
}

impl CellKind {
    fn from_marker(marker: &str) -> Option<Self> {
        Some(match marker {
            "do" => Self::Request,
            "headers" => Self::Headers,
            "body" => Self::Body,
            "before" => Self::PreCode,
            "after" => Self::PostCode,
            "depends_on" => Self::DependsOn,
            "import" => Self::Imports,
            "mandatory" => Self::Mandatory,
            _ => return None,
        })
    }

    fn marker(self) -> &'static str {
        match self {
            Self::Request => "do",
            Self::Headers => "headers",
            Self::Body => "body",
            Self::PreCode => "before",
            Self::PostCode => "after",
            Self::DependsOn => "depends_on",
            Self::Imports => "import",
            Self::Mandatory => "mandatory",
        }
    }
}

struct CellParser {
    kind: CellKind,
    parse: fn(&str, &mut Leaf) -> Result<(), ParseError>,
}

/// Applied in this order; `do` comes first so `headers`/`body` have a request to attach to.
const CELL_PARSERS: [CellParser; 8] = [
    CellParser { kind: CellKind::Request, parse: parse_request },
    CellParser { kind: CellKind::Headers, parse: parse_headers },
    CellParser { kind: CellKind::Body, parse: parse_body },
    CellParser { kind: CellKind::PreCode, parse: parse_pre_code },
    CellParser { kind: CellKind::PostCode, parse: parse_post_code },
    CellParser { kind: CellKind::DependsOn, parse: parse_depends_on },
    CellParser { kind: CellKind::Imports, parse: parse_imports },
    CellParser { kind: CellKind::Mandatory, parse: parse_mandatory },
];

pub(crate) fn parse_leaf(block: &RawBlock) -> Result<Leaf, ParseError> {
    let cells = extract_cells(block)?;
    let mut leaf = Leaf::new(block.name.clone());
    for parser in &CELL_PARSERS {
        if let Some(content) = cells.get(&parser.kind) {
            (parser.parse)(content, &mut leaf)?;
        }
    }
    Ok(leaf)
}

/// Finds every `marker{...}` at brace depth zero of the block body.
///
/// Brace groups not preceded by a known marker are skipped whole, so markers inside them
/// (hook source, JSON bodies) are never picked up.
fn extract_cells(block: &RawBlock) -> Result<BTreeMap<CellKind, String>, ParseError> {
    let body = block.body.as_str();
    let bytes = body.as_bytes();
    let mut cells = BTreeMap::new();
    let mut lines = LineCounter::new(body);
    let mut segment_start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i] != b'{' {
            i += 1;
            continue;
        }

        let line = block.line + lines.line_at(i) - 1;
        let kind = MARKER_RE
            .captures(&body[segment_start..i])
            .and_then(|c| c.get(1))
            .and_then(|m| CellKind::from_marker(m.as_str()));

        let close = find_matching(body, i, b'{', b'}').ok_or_else(|| ParseError::UnterminatedCell {
            leaf: block.name.clone(),
            cell: kind.map(CellKind::marker).unwrap_or("{"),
            line,
        })?;

        if let Some(kind) = kind {
            if cells.insert(kind, body[i + 1..close].to_string()).is_some() {
                return Err(ParseError::DuplicateCell {
                    leaf: block.name.clone(),
                    cell: kind.marker(),
                    line,
                });
            }
        }

        i = close + 1;
        segment_start = i;
    }

    Ok(cells)
}

fn parse_request(content: &str, leaf: &mut Leaf) -> Result<(), ParseError> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    let [method, url] = parts.as_slice() else {
        return Err(ParseError::InvalidRequestLine {
            leaf: leaf.name.clone(),
            line: content.trim().to_string(),
        });
    };
    leaf.request = Some(RequestSpec {
        method: (*method).to_string(),
        url: (*url).to_string(),
        ..Default::default()
    });
    Ok(())
}

fn parse_headers(content: &str, leaf: &mut Leaf) -> Result<(), ParseError> {
    let mut headers = BTreeMap::new();
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut parts = line.split(':');
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid_header(leaf, line));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(invalid_header(leaf, line));
        }
        headers.insert(key.to_string(), value.trim().to_string());
    }

    match leaf.request.as_mut() {
        Some(req) => req.headers = headers,
        None => tracing::warn!(leaf = %leaf.name, "headers cell ignored: leaf has no do{{}} cell"),
    }
    Ok(())
}

fn invalid_header(leaf: &Leaf, line: &str) -> ParseError {
    ParseError::InvalidHeaderLine {
        leaf: leaf.name.clone(),
        line: line.to_string(),
    }
}

fn parse_body(content: &str, leaf: &mut Leaf) -> Result<(), ParseError> {
    match leaf.request.as_mut() {
        Some(req) => req.body = content.as_bytes().to_vec(),
        None => tracing::warn!(leaf = %leaf.name, "body cell ignored: leaf has no do{{}} cell"),
    }
    Ok(())
}

fn parse_pre_code(content: &str, leaf: &mut Leaf) -> Result<(), ParseError> {
    leaf.pre_code = content.trim().to_string();
    Ok(())
}

fn parse_post_code(content: &str, leaf: &mut Leaf) -> Result<(), ParseError> {
    leaf.post_code = content.trim().to_string();
    Ok(())
}

fn parse_depends_on(content: &str, leaf: &mut Leaf) -> Result<(), ParseError> {
    for name in content.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if !leaf.depends_on.iter().any(|d| d == name) {
            leaf.depends_on.push(name.to_string());
        }
    }
    Ok(())
}

fn parse_imports(content: &str, leaf: &mut Leaf) -> Result<(), ParseError> {
    leaf.imports = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();
    Ok(())
}

fn parse_mandatory(_content: &str, leaf: &mut Leaf) -> Result<(), ParseError> {
    leaf.mandatory = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(body: &str) -> RawBlock {
        RawBlock {
            name: "leaf".to_string(),
            body: body.to_string(),
            line: 1,
        }
    }

    #[test]
    fn parses_every_cell_kind() {
        let leaf = parse_leaf(&block(
            "do{POST https://api.test/login}\n\
             headers{\n  Content-Type: application/json\n  X-Id:1\n}\n\
             body{{\"user\":\"a\"}}\n\
             before{ locals.x = \"1\" }\n\
             after{\n assert response.status == 200\n}\n\
             depends_on{ a , b,a }\n\
             import{\n regex\n \"env\"\n}\n\
             mandatory{}",
        ))
        .unwrap();

        let req = leaf.request.unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.url, "https://api.test/login");
        assert_eq!(req.headers["Content-Type"], "application/json");
        assert_eq!(req.headers["X-Id"], "1");
        assert_eq!(req.body, br#"{"user":"a"}"#.to_vec());
        assert_eq!(leaf.pre_code, "locals.x = \"1\"");
        assert_eq!(leaf.post_code, "assert response.status == 200");
        assert_eq!(leaf.depends_on, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(leaf.imports, vec!["regex".to_string(), "\"env\"".to_string()]);
        assert!(leaf.mandatory);
    }

    #[test]
    fn absent_cells_leave_zero_values() {
        let leaf = parse_leaf(&block("")).unwrap();
        assert_eq!(leaf, Leaf::new("leaf"));
    }

    #[test]
    fn nested_braces_in_hooks_are_kept_verbatim() {
        let leaf = parse_leaf(&block("after{ x = {a{b}c} do{GET /nope} }")).unwrap();
        assert_eq!(leaf.post_code, "x = {a{b}c} do{GET /nope}");
        assert!(leaf.request.is_none());
    }

    #[test]
    fn request_line_needs_exactly_two_tokens() {
        for bad in ["do{GET}", "do{GET /a extra}", "do{}"] {
            assert!(matches!(
                parse_leaf(&block(bad)).unwrap_err(),
                ParseError::InvalidRequestLine { .. }
            ));
        }
    }

    #[test]
    fn header_line_without_single_colon_is_rejected() {
        let err = parse_leaf(&block("do{GET /}\nheaders{Authorization Bearer x}")).unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidHeaderLine {
                leaf: "leaf".to_string(),
                line: "Authorization Bearer x".to_string()
            }
        );
        assert!(parse_leaf(&block("do{GET /}\nheaders{A: b: c}")).is_err());
        assert!(parse_leaf(&block("do{GET /}\nheaders{: b}")).is_err());
    }

    #[test]
    fn mandatory_cell_with_content_still_sets_the_flag() {
        assert!(parse_leaf(&block("mandatory{ yes please }")).unwrap().mandatory);
    }

    #[test]
    fn duplicate_cells_are_rejected() {
        assert!(matches!(
            parse_leaf(&block("do{GET /a}\ndo{GET /b}")).unwrap_err(),
            ParseError::DuplicateCell { cell: "do", line: 2, .. }
        ));
    }

    #[test]
    fn unterminated_cell_reports_its_line() {
        assert!(matches!(
            parse_leaf(&block("\n\nafter{ assert true ")).unwrap_err(),
            ParseError::UnterminatedCell { cell: "after", line: 3, .. }
        ));
    }

    #[test]
    fn markers_need_a_word_boundary() {
        let leaf = parse_leaf(&block("redo{GET /x}")).unwrap();
        assert!(leaf.request.is_none());
    }
}
