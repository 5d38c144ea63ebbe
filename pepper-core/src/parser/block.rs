use std::collections::BTreeSet;

use crate::error::ParseError;
use crate::parser::scan::{find_matching, LineCounter};
use crate::types::GLOBAL_LEAF;

/// A top-level `name(...)` block before its cells are parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawBlock {
    pub name: String,
    pub body: String,
    /// Line of the opening `(`.
    pub line: usize,
}

pub(crate) fn split_blocks(input: &str) -> Result<Vec<RawBlock>, ParseError> {
    let bytes = input.as_bytes();
    let mut blocks = Vec::new();
    let mut names = BTreeSet::<String>::new();
    let mut lines = LineCounter::new(input);
    // Start of the text that would become the next block name.
    let mut name_start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                name_start = i + 1;
                i += 1;
            }
            b'(' => {
                let line = lines.line_at(i);
                let raw_name = input[name_start..i].trim();
                if raw_name == GLOBAL_LEAF {
                    return Err(ParseError::ReservedName { line });
                }
                let name = if raw_name.is_empty() {
                    GLOBAL_LEAF
                } else {
                    raw_name
                };

                if !names.insert(name.to_string()) {
                    return Err(if raw_name.is_empty() {
                        ParseError::DuplicateAnonymousBlock { line }
                    } else {
                        ParseError::DuplicateLeaf {
                            name: name.to_string(),
                            line,
                        }
                    });
                }

                let close = find_matching(input, i, b'(', b')').ok_or_else(|| {
                    ParseError::UnterminatedBlock {
                        name: name.to_string(),
                        line,
                    }
                })?;

                blocks.push(RawBlock {
                    name: name.to_string(),
                    body: input[i + 1..close].to_string(),
                    line,
                });
                i = close + 1;
                name_start = i;
            }
            b')' => {
                return Err(ParseError::UnexpectedClose {
                    line: lines.line_at(i),
                })
            }
            _ => i += 1,
        }
    }

    Ok(blocks)
}
