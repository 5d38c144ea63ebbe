use serde_json::Number;

use crate::hooks::HookError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    Ident(String),
    Str(String),
    Num(Number),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    Plus,
    Minus,
    /// Statement separator: newline or `;`.
    Sep,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub tok: Tok,
    pub line: usize,
    /// Byte range in the hook source.
    pub start: usize,
    pub end: usize,
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Token>, HookError> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if let Some((tok, len)) = punct(c, bytes.get(i + 1).copied()) {
            out.push(Token { tok, line, start, end: start + len });
            i += len;
            continue;
        }

        match c {
            b' ' | b'\t' | b'\r' => i += 1,
            b'\n' | b';' => {
                out.push(Token { tok: Tok::Sep, line, start, end: start + 1 });
                if c == b'\n' {
                    line += 1;
                }
                i += 1;
            }
            b'#' => i = skip_comment(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_comment(bytes, i),
            b'"' | b'\'' => {
                let (s, end, newlines) = lex_string(src, i, line)?;
                out.push(Token { tok: Tok::Str(s), line, start, end });
                line += newlines;
                i = end;
            }
            b'0'..=b'9' => {
                let (n, end) = lex_number(src, i, line)?;
                out.push(Token { tok: Tok::Num(n), line, start, end });
                i = end;
            }
            c if c == b'_' || c.is_ascii_alphabetic() => {
                let mut end = i + 1;
                while end < bytes.len() && (bytes[end] == b'_' || bytes[end].is_ascii_alphanumeric()) {
                    end += 1;
                }
                out.push(Token { tok: Tok::Ident(src[i..end].to_string()), line, start, end });
                i = end;
            }
            _ => {
                let ch = src[i..].chars().next().unwrap_or('?');
                return Err(HookError::Compile(format!("line {line}: unexpected character `{ch}`")));
            }
        }
    }

    Ok(out)
}

fn punct(c: u8, next: Option<u8>) -> Option<(Tok, usize)> {
    let tok = match (c, next) {
        (b'=', Some(b'=')) => (Tok::Eq, 2),
        (b'!', Some(b'=')) => (Tok::Ne, 2),
        (b'<', Some(b'=')) => (Tok::Le, 2),
        (b'>', Some(b'=')) => (Tok::Ge, 2),
        (b'&', Some(b'&')) => (Tok::And, 2),
        (b'|', Some(b'|')) => (Tok::Or, 2),
        (b'(', _) => (Tok::LParen, 1),
        (b')', _) => (Tok::RParen, 1),
        (b'[', _) => (Tok::LBracket, 1),
        (b']', _) => (Tok::RBracket, 1),
        (b'.', _) => (Tok::Dot, 1),
        (b',', _) => (Tok::Comma, 1),
        (b'+', _) => (Tok::Plus, 1),
        (b'-', _) => (Tok::Minus, 1),
        (b'=', _) => (Tok::Assign, 1),
        (b'!', _) => (Tok::Not, 1),
        (b'<', _) => (Tok::Lt, 1),
        (b'>', _) => (Tok::Gt, 1),
        _ => return None,
    };
    Some(tok)
}

fn skip_comment(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i
}

/// Returns the unescaped string, the index just past the closing quote, and the number of
/// newlines it spanned.
fn lex_string(src: &str, open: usize, line: usize) -> Result<(String, usize, usize), HookError> {
    let quote = src.as_bytes()[open] as char;
    let mut out = String::new();
    let mut newlines = 0;
    let mut chars = src[open + 1..].char_indices();

    while let Some((off, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((out, open + 1 + off + 1, newlines)),
            '\\' => {
                let escaped = match chars.next() {
                    Some((_, 'n')) => '\n',
                    Some((_, 't')) => '\t',
                    Some((_, 'r')) => '\r',
                    Some((_, '\\')) => '\\',
                    Some((_, '"')) => '"',
                    Some((_, '\'')) => '\'',
                    Some((_, other)) => {
                        return Err(HookError::Compile(format!(
                            "line {}: unknown escape `\\{other}`",
                            line + newlines
                        )))
                    }
                    None => break,
                };
                out.push(escaped);
            }
            '\n' => {
                newlines += 1;
                out.push('\n');
            }
            c => out.push(c),
        }
    }

    Err(HookError::Compile(format!("line {line}: unterminated string literal")))
}

fn lex_number(src: &str, start: usize, line: usize) -> Result<(Number, usize), HookError> {
    let bytes = src.as_bytes();
    let digits = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = digits(start);
    let mut is_float = false;
    if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
        is_float = true;
        end = digits(end + 1);
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            is_float = true;
            end = digits(exp);
        }
    }

    let text = &src[start..end];
    let invalid = || HookError::Compile(format!("line {line}: invalid number `{text}`"));
    if !is_float {
        if let Ok(n) = text.parse::<i64>() {
            return Ok((Number::from(n), end));
        }
    }
    let f: f64 = text.parse().map_err(|_| invalid())?;
    Number::from_f64(f).map(|n| (n, end)).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        tokenize(src).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn lexes_assignment() {
        assert_eq!(
            toks(r#"globals["token"] = response.json.token"#),
            vec![
                Tok::Ident("globals".into()),
                Tok::LBracket,
                Tok::Str("token".into()),
                Tok::RBracket,
                Tok::Assign,
                Tok::Ident("response".into()),
                Tok::Dot,
                Tok::Ident("json".into()),
                Tok::Dot,
                Tok::Ident("token".into()),
            ]
        );
    }

    #[test]
    fn lexes_operators_and_numbers() {
        assert_eq!(
            toks("a >= 2.5 && b != -1 || !c <= 1e3"),
            vec![
                Tok::Ident("a".into()),
                Tok::Ge,
                Tok::Num(Number::from_f64(2.5).unwrap()),
                Tok::And,
                Tok::Ident("b".into()),
                Tok::Ne,
                Tok::Minus,
                Tok::Num(Number::from(1)),
                Tok::Or,
                Tok::Not,
                Tok::Ident("c".into()),
                Tok::Le,
                Tok::Num(Number::from_f64(1000.0).unwrap()),
            ]
        );
    }

    #[test]
    fn comments_and_separators() {
        assert_eq!(
            toks("a # note\n// other\nb; c"),
            vec![
                Tok::Ident("a".into()),
                Tok::Sep,
                Tok::Sep,
                Tok::Ident("b".into()),
                Tok::Sep,
                Tok::Ident("c".into()),
            ]
        );
    }

    #[test]
    fn string_escapes_and_single_quotes() {
        assert_eq!(toks(r#"'it\'s' "a\n\"b\"""#), vec![
            Tok::Str("it's".into()),
            Tok::Str("a\n\"b\"".into()),
        ]);
    }

    #[test]
    fn tracks_lines_and_spans() {
        let t = tokenize("a\n  bb").unwrap();
        assert_eq!(t[2].line, 2);
        assert_eq!((t[2].start, t[2].end), (4, 6));
    }

    #[test]
    fn errors() {
        assert!(matches!(tokenize("\"open"), Err(HookError::Compile(_))));
        assert!(matches!(tokenize("a @ b"), Err(HookError::Compile(_))));
        assert!(matches!(tokenize(r#""\q""#), Err(HookError::Compile(_))));
        assert!(matches!(tokenize("a & b"), Err(HookError::Compile(_))));
    }
}
