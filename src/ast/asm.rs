//! This module holds the concrete representation of assembly source code.
//!
//! The assembly source code is a sequence of [`SourceNode`]s,
//! one per statement, each keeping the labels, comments, and blank lines around it
//! (its "trivia") so that a program can be rewritten and re-rendered
//! without losing its layout.
//!
//! After assembly, each node also records its address and the words it assembled to.

use std::fmt::Write as _;

use super::isa::Mnemonic;

/// A line of source code that does not hold a statement.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum Trivia {
    /// An empty (or whitespace-only) line.
    Blank,
    /// A comment-only line, holding the text after the `#`.
    Comment(String),
}
impl std::fmt::Display for Trivia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trivia::Blank => Ok(()),
            Trivia::Comment(c) if c.is_empty() => f.write_char('#'),
            Trivia::Comment(c) => write!(f, "# {c}"),
        }
    }
}

/// A statement of assembly source code.
///
/// A node usually holds one instruction, pseudo-instruction, or directive (`op`).
/// A node with no `op` is a loose node, which holds labels (or trivia)
/// that did not precede any statement (e.g., a label at the end of a program).
///
/// # Examples
///
/// ```text
/// # leading trivia
///
/// loop:                    <- labels
///     addi r1, r1, -1 # c  <- op, operands, comment
///
///                          <- trailing trivia
/// ```
///
/// Nodes can also be built directly (for example, by a compiler emitting assembly):
///
/// ```
/// use anna_ensemble::ast::asm::SourceNode;
/// use anna_ensemble::ast::isa::{Mnemonic, Opcode};
///
/// let node = SourceNode::new(Mnemonic::Real(Opcode::Addi), ["r1", "r1", "-1"])
///     .with_labels(["loop"])
///     .with_comment("count down");
///
/// assert_eq!(node.to_string(), "loop:\n    addi r1, r1, -1 # count down\n");
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Default)]
pub struct SourceNode {
    /// Labels marking this statement's address.
    pub labels: Vec<String>,
    /// The mnemonic of this statement (or `None` for a loose node).
    pub op: Option<Mnemonic>,
    /// The raw text of each operand.
    pub operands: Vec<String>,
    /// The comment on the statement's line (without the `#`).
    pub comment: Option<String>,
    /// Trivia lines before this statement.
    pub leading: Vec<Trivia>,
    /// Trivia lines after this statement.
    pub trailing: Vec<Trivia>,
    /// The source line (1-indexed) this statement came from (0 if it was not parsed from source).
    pub line: usize,
    /// The address this statement was assembled at, if it has been assembled.
    pub addr: Option<u16>,
    /// The words this statement was assembled to, if it has been assembled.
    pub words: Vec<u16>,
}
impl SourceNode {
    /// Creates a new statement with the given mnemonic and operand texts.
    pub fn new<S: Into<String>>(op: Mnemonic, operands: impl IntoIterator<Item = S>) -> Self {
        Self {
            op: Some(op),
            operands: operands.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Creates a loose node, holding only labels.
    pub fn label_only<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Adds labels to this statement.
    pub fn with_labels<S: Into<String>>(mut self, labels: impl IntoIterator<Item = S>) -> Self {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }

    /// Sets the comment of this statement.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Sets the source line of this statement.
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    /// Whether this node holds a statement (as opposed to being a loose node).
    pub fn is_stmt(&self) -> bool {
        self.op.is_some()
    }

    /// Renders the statement's own line (without labels or trivia).
    ///
    /// ```
    /// use anna_ensemble::ast::asm::SourceNode;
    /// use anna_ensemble::ast::isa::{Mnemonic, Pseudo};
    ///
    /// let node = SourceNode::new(Mnemonic::Pseudo(Pseudo::Push), ["r7", "r3"]);
    /// assert_eq!(node.stmt_text(), "push r7, r3");
    /// ```
    pub fn stmt_text(&self) -> String {
        let mut out = String::new();
        if let Some(op) = self.op {
            out.push_str(op.name());
            for (i, operand) in self.operands.iter().enumerate() {
                out.push_str(if i == 0 { " " } else { ", " });
                out.push_str(operand);
            }
        }
        if let Some(c) = &self.comment {
            if !out.is_empty() { out.push(' '); }
            let _ = write!(out, "{}", Trivia::Comment(c.clone()));
        }
        out
    }

    /// Takes every piece of trivia off this node (leading, comment, then trailing),
    /// leaving the node with none.
    ///
    /// The inline comment is converted into a comment line.
    pub(crate) fn take_trivia(&mut self) -> Vec<Trivia> {
        let mut trivia = std::mem::take(&mut self.leading);
        trivia.extend(self.comment.take().map(Trivia::Comment));
        trivia.append(&mut self.trailing);
        trivia
    }
}
impl std::fmt::Display for SourceNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for t in &self.leading {
            writeln!(f, "{t}")?;
        }
        for label in &self.labels {
            writeln!(f, "{label}:")?;
        }
        match self.op {
            Some(_) => writeln!(f, "    {}", self.stmt_text())?,
            None => if let Some(c) = &self.comment {
                writeln!(f, "{}", Trivia::Comment(c.clone()))?;
            },
        }
        for t in &self.trailing {
            writeln!(f, "{t}")?;
        }
        Ok(())
    }
}

/// Renders a program in its canonical form.
///
/// Parsing the output of this function (with [`crate::parse::parse_source`])
/// yields nodes with the same labels, statements, comments, and trivia.
pub fn render(nodes: &[SourceNode]) -> String {
    nodes.iter().map(|n| n.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::{render, SourceNode, Trivia};
    use crate::ast::isa::{DirectiveKind, Mnemonic, Opcode, Pseudo};

    #[test]
    fn test_render_node() {
        let mut node = SourceNode::new(Mnemonic::Real(Opcode::Lli), ["r1", "0x34"])
            .with_labels(["a", "b"])
            .with_comment("");
        node.leading = vec![Trivia::Comment("header".into()), Trivia::Blank];
        node.trailing = vec![Trivia::Blank];

        assert_eq!(node.to_string(), "# header\n\na:\nb:\n    lli r1, 0x34 #\n\n");
    }

    #[test]
    fn test_render_program() {
        let nodes = [
            SourceNode::new(Mnemonic::Directive(DirectiveKind::Cstr), [r#""hi, there""#]),
            SourceNode::new(Mnemonic::Pseudo(Pseudo::Halt), Vec::<String>::new()),
            SourceNode::label_only(["end"]),
        ];
        assert_eq!(render(&nodes), "    .cstr \"hi, there\"\n    halt\nend:\n");
    }

    #[test]
    fn test_take_trivia() {
        let mut node = SourceNode::new(Mnemonic::Pseudo(Pseudo::Pop), ["r7", "r1"]).with_comment("restore");
        node.leading.push(Trivia::Comment("a".into()));
        node.trailing.push(Trivia::Blank);

        assert_eq!(node.take_trivia(), vec![
            Trivia::Comment("a".into()),
            Trivia::Comment("restore".into()),
            Trivia::Blank,
        ]);
        assert!(node.leading.is_empty() && node.comment.is_none() && node.trailing.is_empty());
    }
}
