/// Value tree recovered by the tolerant parser.
///
/// Objects keep their members as an ordered list so the writer reproduces
/// the source order, duplicates included. Numbers keep their source text.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Node {
    Null,
    Bool(bool),
    Number(String),
    String(String),
    Array(Vec<Node>),
    Object(Vec<(String, Node)>),
}
