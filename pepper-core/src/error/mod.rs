use thiserror::Error;

#[derive(Debug, Error)]
pub enum PepperError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("document is not valid UTF-8 (at byte {offset})")]
    InvalidUtf8 { offset: usize },

    #[error("line {line}: `global` is a reserved leaf name")]
    ReservedName { line: usize },

    #[error("line {line}: duplicate leaf name: {name}")]
    DuplicateLeaf { name: String, line: usize },

    #[error("line {line}: only one anonymous block is allowed per document")]
    DuplicateAnonymousBlock { line: usize },

    #[error("line {line}: unterminated block `{name}` (missing ')')")]
    UnterminatedBlock { name: String, line: usize },

    #[error("line {line}: unexpected ')' outside of a block")]
    UnexpectedClose { line: usize },

    #[error("leaf `{leaf}`, line {line}: unterminated `{cell}` cell (missing '}}')")]
    UnterminatedCell {
        leaf: String,
        cell: &'static str,
        line: usize,
    },

    #[error("leaf `{leaf}`, line {line}: `{cell}` cell declared more than once")]
    DuplicateCell {
        leaf: String,
        cell: &'static str,
        line: usize,
    },

    #[error("leaf `{leaf}`: invalid request line `{line}` (expected `METHOD URL`)")]
    InvalidRequestLine { leaf: String, line: String },

    #[error("leaf `{leaf}`: invalid header line `{line}` (expected `Key: Value`)")]
    InvalidHeaderLine { leaf: String, line: String },

    #[error("parse worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("leaf `{leaf}` depends on unknown leaf `{dependency}`")]
    UnknownDependency { leaf: String, dependency: String },

    #[error("dependency cycle: {}", format_cycle(.leaves))]
    Cycle { leaves: Vec<String> },

    #[error("the global block cannot declare dependencies")]
    GlobalHasDependencies,
}

fn format_cycle(leaves: &[String]) -> String {
    let mut out = leaves.join(" -> ");
    if let Some(first) = leaves.first() {
        out.push_str(" -> ");
        out.push_str(first);
    }
    out
}
