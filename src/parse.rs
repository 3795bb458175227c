//! Parsing assembly source code into [`SourceNode`]s.
//!
//! This module is used to convert strings (which represent assembly source code)
//! into a sequence of nodes that maintain all of the information of the source code
//! (including comments and blank lines) in an easier to handle format.
//!
//! The parser module consists of:
//! - [`lex`]: the implementation of the lexer/tokenizer
//! - [`parse_source`] and [`parse_lines`]: the main logic for the parser
//!
//! Each line of source is one of:
//! - a blank line,
//! - a comment line (`# ...`),
//! - a label line (`name:`),
//! - a statement line (`[name:] mnemonic operand... [# comment]`).
//!
//! Operands may be separated by commas, whitespace, or both.
//!
//! Blank and comment lines are attached as trivia to the nearest statement:
//! - blank lines directly after a statement belong to that statement (trailing trivia),
//! - everything else belongs to the next statement (leading trivia).

pub mod lex;

use std::borrow::Cow;
use std::ops::Range;

use logos::Logos;

use crate::ast::asm::{SourceNode, Trivia};
use crate::ast::isa::Mnemonic;
use lex::{LexErr, Token};

/// Parses an assembly source code string into a `Vec` of nodes.
///
/// This is a shortcut for [`parse_lines`] over the lines of the source.
///
/// # Example
/// ```
/// use anna_ensemble::parse::parse_source;
///
/// let src = "
/// ## count down from 3
/// lli r1, 3
/// loop: addi r1, r1, -1
///     bne r1, &loop
///
/// halt
/// ";
/// let nodes = parse_source(src).unwrap();
/// assert_eq!(nodes.len(), 4);
/// assert_eq!(nodes[1].labels, ["loop"]);
/// assert_eq!(nodes[2].operands, ["r1", "&loop"]);
/// ```
pub fn parse_source(src: &str) -> Result<Vec<SourceNode>, ParseErr> {
    parse_lines(src.lines())
}

/// Parses lines of assembly source code into a `Vec` of nodes.
///
/// The trivia of the source (blank lines and comment lines) and label lines
/// are attached to statements as they are parsed:
/// - Before a statement, trivia and labels are held as pending.
///   The next statement takes all pending trivia (as leading trivia) and labels.
/// - After a statement, blank lines become that statement's trailing trivia,
///   until a comment or label line is reached.
///
/// Trivia left over at the end of input becomes trailing trivia of the last node.
/// Labels left over at the end of input become a loose node (see [`SourceNode`]).
pub fn parse_lines<S: AsRef<str>>(lines: impl IntoIterator<Item = S>) -> Result<Vec<SourceNode>, ParseErr> {
    let mut nodes: Vec<SourceNode> = vec![];
    let mut pending_trivia = vec![];
    let mut pending_labels = vec![];
    let mut after_stmt = false;
    let mut last_line = 0;

    for (i, text) in lines.into_iter().enumerate() {
        let line = i + 1;
        last_line = line;

        match parse_line(text.as_ref(), line)? {
            Line::Blank => match nodes.last_mut() {
                Some(last) if after_stmt => last.trailing.push(Trivia::Blank),
                _ => pending_trivia.push(Trivia::Blank),
            },
            Line::Comment(c) => {
                after_stmt = false;
                pending_trivia.push(Trivia::Comment(c));
            },
            Line::Labels(labels, comment) => {
                after_stmt = false;
                pending_labels.extend(labels);
                pending_trivia.extend(comment.map(Trivia::Comment));
            },
            Line::Stmt(mut node) => {
                let mut labels = std::mem::take(&mut pending_labels);
                labels.append(&mut node.labels);
                node.labels = labels;
                node.leading = std::mem::take(&mut pending_trivia);
                node.line = line;

                tracing::trace!(line, stmt = %node.stmt_text(), "parsed statement");
                nodes.push(node);
                after_stmt = true;
            },
        }
    }

    match nodes.last_mut() {
        Some(last) if pending_labels.is_empty() => last.trailing.append(&mut pending_trivia),
        _ if pending_labels.is_empty() && pending_trivia.is_empty() => {},
        _ => {
            let mut loose = SourceNode::label_only(pending_labels).with_line(last_line);
            loose.leading = pending_trivia;
            nodes.push(loose);
        }
    }

    tracing::debug!(nodes = nodes.len(), lines = last_line, "parsed source");
    Ok(nodes)
}

/// The classification of one source line.
enum Line {
    Blank,
    Comment(String),
    Labels(Vec<String>, Option<String>),
    Stmt(SourceNode),
}

fn parse_line(text: &str, line: usize) -> Result<Line, ParseErr> {
    let tokens = Token::lexer(text)
        .spanned()
        .map(|(t, span)| match t {
            Ok(t)  => Ok((t, span)),
            Err(e) => Err(ParseErr::new(line, text, span, e)),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut rest = &tokens[..];

    // Labels:
    let mut labels = vec![];
    while let [(Token::Ident(name), _), (Token::Colon, _), tail @ ..] = rest {
        labels.push(name.clone());
        rest = tail;
    }

    // Mnemonic:
    let (op, mut rest) = match rest {
        [] if labels.is_empty() => return Ok(Line::Blank),
        [] => return Ok(Line::Labels(labels, None)),
        [(Token::Comment(c), _)] if labels.is_empty() => return Ok(Line::Comment(c.clone())),
        [(Token::Comment(c), _)] => return Ok(Line::Labels(labels, Some(c.clone()))),
        [(Token::Ident(name), span), tail @ ..] => (lookup(name, line, text, span)?, tail),
        [(Token::Directive(name), span), tail @ ..] => (lookup(&format!(".{name}"), line, text, span)?, tail),
        [(_, span), ..] => return Err(ParseErr::new(line, text, span.clone(), ParseErrKind::ExpectedMnemonic)),
    };

    // Operands:
    let mut operands = vec![];
    let mut comment = None;
    let mut expect_operand = false;
    while let [(token, span), tail @ ..] = rest {
        rest = tail;
        match token {
            Token::Comma if operands.is_empty() || expect_operand => {
                return Err(ParseErr::new(line, text, span.clone(), ParseErrKind::Unexpected("comma")));
            },
            Token::Comma => expect_operand = true,
            Token::Colon => return Err(ParseErr::new(line, text, span.clone(), ParseErrKind::Unexpected("colon"))),
            Token::Directive(_) => return Err(ParseErr::new(line, text, span.clone(), ParseErrKind::Unexpected("directive"))),
            Token::Comment(c) => comment = Some(c.clone()),
            _ => {
                operands.push(text[span.clone()].to_string());
                expect_operand = false;
            }
        }
    }
    if expect_operand {
        let end = text.trim_end().len();
        return Err(ParseErr::new(line, text, end..end, ParseErrKind::Unexpected("trailing comma")));
    }

    let mut node = SourceNode::new(op, operands).with_labels(labels);
    node.comment = comment;
    Ok(Line::Stmt(node))
}

fn lookup(name: &str, line: usize, text: &str, span: &Range<usize>) -> Result<Mnemonic, ParseErr> {
    Mnemonic::lookup(name)
        .ok_or_else(|| ParseErr::new(line, text, span.clone(), ParseErrKind::UnknownMnemonic(name.to_string())))
}

/// Kinds of errors that can occur while parsing a line.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum ParseErrKind {
    /// A token could not be lexed.
    #[error(transparent)]
    Lex(#[from] LexErr),
    /// The statement's mnemonic is not an instruction, pseudo-instruction, or directive.
    #[error("unknown mnemonic `{0}`")]
    UnknownMnemonic(String),
    /// The statement does not start with a mnemonic.
    #[error("expected a label or mnemonic")]
    ExpectedMnemonic,
    /// A token appeared where it is not allowed.
    #[error("unexpected {0}")]
    Unexpected(&'static str),
}

/// Any error that occurs during parsing source lines.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
#[error("line {line}: {kind}")]
pub struct ParseErr {
    /// The source line (1-indexed) of this error.
    pub line: usize,
    /// The original text of the line.
    pub text: String,
    /// The location of this error within the line.
    pub span: Range<usize>,
    /// The brief cause of this error.
    #[source]
    pub kind: ParseErrKind,
}
impl ParseErr {
    fn new<E: Into<ParseErrKind>>(line: usize, text: &str, span: Range<usize>, kind: E) -> Self {
        Self { line, text: text.to_string(), span, kind: kind.into() }
    }
}
impl crate::err::Error for ParseErr {
    fn line(&self) -> Option<usize> {
        Some(self.line)
    }

    fn span(&self) -> Option<Range<usize>> {
        Some(self.span.clone())
    }

    fn help(&self) -> Option<Cow<str>> {
        match &self.kind {
            ParseErrKind::Lex(e) => crate::err::Error::help(e),
            ParseErrKind::UnknownMnemonic(_) => Some("directives start with '.' (e.g., .fill)".into()),
            ParseErrKind::ExpectedMnemonic => Some("a statement is an optional `label:` followed by a mnemonic and its operands".into()),
            ParseErrKind::Unexpected(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_lines, parse_source, ParseErrKind};
    use crate::ast::asm::{render, SourceNode, Trivia};
    use crate::ast::isa::{DirectiveKind, Mnemonic, Opcode, Pseudo};
    use crate::parse::lex::LexErr;

    /// Strips the source line numbers, which change when a program is re-rendered.
    fn without_lines(mut nodes: Vec<SourceNode>) -> Vec<SourceNode> {
        nodes.iter_mut().for_each(|n| n.line = 0);
        nodes
    }

    #[test]
    fn test_stmt() {
        let nodes = parse_source("start: ADD r1 r2, r3 # sum").unwrap();
        assert_eq!(nodes, [
            SourceNode::new(Mnemonic::Real(Opcode::Math(crate::ast::isa::MathFunc::Add)), ["r1", "r2", "r3"])
                .with_labels(["start"])
                .with_comment("sum")
                .with_line(1)
        ]);

        let nodes = parse_source(".cstr \"a, b\" \"c\"\n.halt").unwrap();
        assert_eq!(nodes[0].op, Some(Mnemonic::Directive(DirectiveKind::Cstr)));
        assert_eq!(nodes[0].operands, ["\"a, b\"", "\"c\""]);
        assert_eq!(nodes[1].op, Some(Mnemonic::Pseudo(Pseudo::Halt)));
        assert_eq!(nodes[1].line, 2);
    }

    #[test]
    fn test_trivia_attachment() {
        let src = [
            "# header",     // pending
            "",             // pending
            "a:",           // pending label
            "lli r1, 1",    // node 0
            "",             // trailing of node 0
            "# about b",    // pending
            "b: lli r2, 2", // node 1
            "",             // trailing of node 1
            "c:",
            "",             // pending (after label)
            "halt",         // node 2
            "# footer",     // pending, then end of input
        ];
        let nodes = parse_lines(src).unwrap();
        assert_eq!(nodes.len(), 3);

        assert_eq!(nodes[0].leading, [Trivia::Comment("header".into()), Trivia::Blank]);
        assert_eq!(nodes[0].labels, ["a"]);
        assert_eq!(nodes[0].trailing, [Trivia::Blank]);

        assert_eq!(nodes[1].leading, [Trivia::Comment("about b".into())]);
        assert_eq!(nodes[1].labels, ["b"]);
        assert_eq!(nodes[1].trailing, [Trivia::Blank]);

        assert_eq!(nodes[2].leading, [Trivia::Blank]);
        assert_eq!(nodes[2].labels, ["c"]);
        assert_eq!(nodes[2].trailing, [Trivia::Comment("footer".into())]);
    }

    #[test]
    fn test_loose_labels() {
        let nodes = parse_lines(["halt", "end:", "# done"]).unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(!nodes[1].is_stmt());
        assert_eq!(nodes[1].labels, ["end"]);
        assert_eq!(nodes[1].leading, [Trivia::Comment("done".into())]);

        // only trivia:
        let nodes = parse_lines(["", "# nothing here"]).unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(!nodes[0].is_stmt());
        assert_eq!(nodes[0].leading, [Trivia::Blank, Trivia::Comment("nothing here".into())]);

        assert!(parse_source("").unwrap().is_empty());
    }

    #[test]
    fn test_render_reparse() {
        let src = "
# fib: reads n, prints fib(n)
    in r1
    lli r2, 0
    lli r3, 1

loop:
    beq r1, &done # finished?
    add r4, r2, r3
    mov r2, r3
    mov r3, r4
    addi r1, r1, -1
    br &loop

done:
    outn r2
    halt
msg: .cstr \"fib\\n\"
# trailing comment
end:
";
        let first = parse_source(src).unwrap();
        let rendered = render(&first);
        let second = parse_source(&rendered).unwrap();
        assert_eq!(without_lines(first), without_lines(second.clone()));

        // rendering is stable
        assert_eq!(render(&second), rendered);
    }

    #[test]
    fn test_errors() {
        let err = parse_lines(["halt", "  frob r1, r2"]).unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.text, "  frob r1, r2");
        assert_eq!(err.span, 2..6);
        assert_eq!(err.kind, ParseErrKind::UnknownMnemonic("frob".into()));

        let err = parse_source("lli r9, 1").unwrap_err();
        assert_eq!(err.kind, ParseErrKind::Lex(LexErr::InvalidReg));
        assert_eq!(err.span, 4..6);

        let err = parse_source("add r1,, r2").unwrap_err();
        assert_eq!(err.kind, ParseErrKind::Unexpected("comma"));

        let err = parse_source("add r1, r2,").unwrap_err();
        assert_eq!(err.kind, ParseErrKind::Unexpected("trailing comma"));

        let err = parse_source("fill 3").unwrap_err();
        assert_eq!(err.kind, ParseErrKind::UnknownMnemonic("fill".into()));

        let err = parse_source("3 add").unwrap_err();
        assert_eq!(err.kind, ParseErrKind::ExpectedMnemonic);

        let err = parse_source("a: b").unwrap_err();
        assert_eq!(err.kind, ParseErrKind::UnknownMnemonic("b".into()));
        assert_eq!(err.to_string(), "line 1: unknown mnemonic `b`");
    }
}
