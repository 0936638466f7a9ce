//! The parse tree produced by a successful parse.
//!
//! Every node lives in one arena (`Vec<Node>`); children are referenced by
//! index and the parent link is a plain, non-owning index back into the
//! same arena. There is no `Rc`/`Weak`, no shared mutable structure, and no
//! support for incremental reparse — a new parse always builds a new tree
//! from scratch.

use crate::grammar::ProductionId;
use crate::token::Token;

pub type NodeId = usize;

#[derive(Debug, Clone)]
pub enum NodeValue {
    Token(Token),
    Production {
        id: ProductionId,
        name: String,
        alternative: usize,
    },
}

#[derive(Debug, Clone)]
pub struct Node {
    value: NodeValue,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn value(&self) -> &NodeValue {
        &self.value
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_token(&self) -> bool {
        matches!(self.value, NodeValue::Token(_))
    }

    pub fn as_token(&self) -> Option<&Token> {
        match &self.value {
            NodeValue::Token(t) => Some(t),
            NodeValue::Production { .. } => None,
        }
    }
}

/// An arena of `Node`s built up during a single parse.
#[derive(Debug, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_token(&mut self, parent: Option<NodeId>, token: Token) -> NodeId {
        self.push(parent, NodeValue::Token(token))
    }

    pub fn add_production(
        &mut self,
        parent: Option<NodeId>,
        id: ProductionId,
        name: impl Into<String>,
        alternative: usize,
    ) -> NodeId {
        self.push(
            parent,
            NodeValue::Production {
                id,
                name: name.into(),
                alternative,
            },
        )
    }

    fn push(&mut self, parent: Option<NodeId>, value: NodeValue) -> NodeId {
        let idx = self.nodes.len();
        self.nodes.push(Node {
            value,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(p) => self.nodes[p].children.push(idx),
            None => self.root = Some(idx),
        }
        idx
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// A depth-indented `Debug`-style dump, one node per line: tokens as
    /// `TOKEN#<pattern-id>@<start>:<end> "<image>"`, productions as
    /// `<name>[<alternative>]`. Meant for test assertions and error
    /// messages, not a stable machine format.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.root {
            self.dump_node(root, 0, &mut out);
        }
        out
    }

    fn dump_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = &self.nodes[id];
        out.push_str(&"  ".repeat(depth));
        match &node.value {
            NodeValue::Token(t) => {
                out.push_str(&format!(
                    "TOKEN#{}@{}:{} {:?}\n",
                    t.pattern_id(),
                    t.start(),
                    t.end(),
                    t.image()
                ));
            }
            NodeValue::Production { name, alternative, .. } => {
                out.push_str(&format!("{name}[{alternative}]\n"));
            }
        }
        for &child in &node.children {
            self.dump_node(child, depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Position;

    #[test]
    fn child_links_and_parent_back_reference_agree() {
        let mut tree = Tree::new();
        let root = tree.add_production(None, 0, "start", 0);
        let tok = tree.add_token(Some(root), Token::new(1, "x".to_string(), Position::new(1, 1)));
        assert_eq!(tree.node(root).children(), &[tok]);
        assert_eq!(tree.node(tok).parent(), Some(root));
        assert_eq!(tree.root(), Some(root));
    }

    #[test]
    fn dump_renders_nested_structure() {
        let mut tree = Tree::new();
        let root = tree.add_production(None, 0, "expr", 0);
        tree.add_token(Some(root), Token::new(1, "1".to_string(), Position::new(1, 1)));
        tree.add_token(Some(root), Token::new(2, "+".to_string(), Position::new(1, 2)));
        let dump = tree.dump();
        assert!(dump.starts_with("expr[0]\n"));
        assert!(dump.contains("TOKEN#1@1:1:1:2 \"1\""));
        assert!(dump.contains("TOKEN#2@1:2:1:3 \"+\""));
    }
}
