mod block;
mod cell;
mod scan;

use crate::error::ParseError;
use crate::types::{Document, Leaf};

use block::{split_blocks, RawBlock};
use cell::parse_leaf;

/// Default bound on concurrent per-leaf parse workers.
pub const DEFAULT_PARSE_WORKERS: usize = 10;

pub fn parse_document(input: &[u8]) -> Result<Document, ParseError> {
    let text = decode(input)?;
    let leaves = split_blocks(text)?
        .iter()
        .map(parse_leaf)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Document::from_leaves(leaves))
}

pub fn parse_document_str(input: &str) -> Result<Document, ParseError> {
    parse_document(input.as_bytes())
}

/// Parses leaves on at most `workers` blocking tasks.
///
/// The first failing leaf aborts the remaining work; no partial document is returned.
pub async fn parse_document_concurrent(
    input: &[u8],
    workers: usize,
) -> Result<Document, ParseError> {
    let text = decode(input)?;
    let blocks = split_blocks(text)?;
    let total = blocks.len();
    let workers = workers.max(1);

    let mut slots: Vec<Option<Leaf>> = vec![None; total];
    let mut pending = blocks.into_iter().enumerate();
    let mut tasks = tokio::task::JoinSet::new();

    loop {
        while tasks.len() < workers {
            let Some((idx, block)) = pending.next() else {
                break;
            };
            tasks.spawn_blocking(move || (idx, parse_block(block)));
        }

        let Some(joined) = tasks.join_next().await else {
            break;
        };
        match joined {
            Ok((idx, Ok(leaf))) => slots[idx] = Some(leaf),
            Ok((_, Err(e))) => {
                tasks.abort_all();
                return Err(e);
            }
            Err(e) => {
                tasks.abort_all();
                return Err(ParseError::Worker(e.to_string()));
            }
        }
    }

    let leaves: Vec<Leaf> = slots.into_iter().flatten().collect();
    if leaves.len() != total {
        return Err(ParseError::Worker("parse worker produced no result".to_string()));
    }
    Ok(Document::from_leaves(leaves))
}

fn parse_block(block: RawBlock) -> Result<Leaf, ParseError> {
    parse_leaf(&block)
}

fn decode(input: &[u8]) -> Result<&str, ParseError> {
    std::str::from_utf8(input).map_err(|e| ParseError::InvalidUtf8 {
        offset: e.valid_up_to(),
    })
}
