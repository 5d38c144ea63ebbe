mod document;
mod leaf;

pub use document::Document;
pub use leaf::{Leaf, RequestSpec, Variables, GLOBAL_LEAF};
