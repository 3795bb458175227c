//! Peephole optimization of source nodes.
//!
//! The optimizer runs after parsing and before assembly, rewriting
//! pairs of adjacent nodes that do redundant work. The rules, in priority order, are:
//!
//! 1. `push r, a` followed by `pop r, b` (same stack register):
//!     - if `a` and `b` are the same register, both are removed,
//!     - otherwise, the pair becomes `mov b, a`.
//! 2. An unconditional branch (`br` or `beq r0`) to the very next statement is removed.
//! 3. An unconditional branch directly after another unconditional branch is removed
//!    (it can never execute).
//!
//! A node is only rewritten if no label points into the middle of the pattern
//! (i.e., the second node of a pair must be unlabeled).
//!
//! When a node is removed, its labels and trivia move to the node after it,
//! so the program keeps its layout and every label keeps its meaning.
//!
//! ```
//! use anna_ensemble::parse::parse_source;
//! use anna_ensemble::opt::optimize;
//! use anna_ensemble::ast::asm::render;
//!
//! let mut nodes = parse_source("
//!     push r7, r3
//!     pop r7, r2
//!     br &end
//! end:
//!     halt
//! ").unwrap();
//!
//! assert_eq!(optimize(&mut nodes, Default::default()), 2);
//! assert_eq!(render(&nodes), "\n    mov r2, r3\nend:\n    halt\n");
//! ```

use std::ops::Range;

use crate::ast::asm::{SourceNode, Trivia};
use crate::ast::isa::{Cond, DirectiveKind, Mnemonic, Opcode, Pseudo};
use crate::ast::Operand;

/// Configuration flags for [`optimize`].
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct OptFlags {
    /// Whether to leave a comment explaining each rewrite.
    pub annotate: bool,
}

/// Optimizes the nodes in place, until no more rewrites apply.
///
/// This returns the number of rewrites done.
/// Running the optimizer on its own output always returns 0.
pub fn optimize(nodes: &mut Vec<SourceNode>, flags: OptFlags) -> usize {
    let mut total = 0;
    for pass in 1.. {
        let rewrites = sweep(nodes, flags);
        tracing::debug!(pass, rewrites, nodes = nodes.len(), "optimizer pass");
        if rewrites == 0 {
            break;
        }
        total += rewrites;
    }
    total
}

/// Runs one pass over the nodes, returning the number of rewrites.
fn sweep(nodes: &mut Vec<SourceNode>, flags: OptFlags) -> usize {
    let mut rewrites = 0;
    let mut i = 0;

    while i < nodes.len() {
        match rewrite_at(nodes, i, flags) {
            true => {
                rewrites += 1;
                // the previous node may now start a new pattern
                i = i.saturating_sub(1);
            },
            false => i += 1,
        }
    }

    rewrites
}

/// Tries each rule on the node at `i` (and the node after it).
fn rewrite_at(nodes: &mut Vec<SourceNode>, i: usize, flags: OptFlags) -> bool {
    let note = |s: String| flags.annotate.then_some(s);
    let next = nodes.get(i + 1).filter(|n| n.is_stmt() && n.labels.is_empty());

    // push r, a ; pop r, b
    if let (Some((sp, a)), Some((sp2, b))) = (push_operands(&nodes[i]), next.and_then(pop_operands)) {
        if same_reg(sp, sp2) {
            let (a, b) = (a.to_string(), b.to_string());
            tracing::trace!(line = nodes[i].line, %a, %b, "merging push/pop");

            if same_reg(&a, &b) {
                remove_nodes(nodes, i..i + 2, note(format!("removed push/pop of {a}")));
            } else {
                let mut pop = nodes.remove(i + 1);
                let push = &mut nodes[i];
                let mut mov = SourceNode::new(Mnemonic::Pseudo(Pseudo::Mov), [b, a])
                    .with_labels(std::mem::take(&mut push.labels))
                    .with_line(push.line);
                mov.leading = std::mem::take(&mut push.leading);
                mov.leading.append(&mut pop.leading);
                mov.trailing = std::mem::take(&mut push.trailing);
                mov.trailing.append(&mut pop.trailing);

                let comments: Vec<_> = [push.comment.take(), pop.comment.take(), note("push/pop became mov".to_string())]
                    .into_iter()
                    .flatten()
                    .collect();
                if !comments.is_empty() {
                    mov.comment = Some(comments.join("; "));
                }
                *push = mov;
            }
            return true;
        }
    }

    let Some(target) = branch_target(&nodes[i]) else { return false };

    // branch to next statement
    let to_next = match target.trim().strip_prefix('&') {
        // `.def` labels hold values, not addresses
        Some(label) => nodes.get(i + 1)
            .filter(|n| n.op != Some(Mnemonic::Directive(DirectiveKind::Def)))
            .is_some_and(|n| n.labels.iter().any(|l| l == label)),
        None => Operand::parse(target).ok().and_then(|o| o.as_int().ok()) == Some(0),
    };
    if to_next {
        tracing::trace!(line = nodes[i].line, target, "removing branch to next statement");
        remove_nodes(nodes, i..i + 1, note("removed branch to next statement".to_string()));
        return true;
    }

    // branch after branch
    if next.and_then(branch_target).is_some() {
        tracing::trace!(line = nodes[i + 1].line, "removing unreachable branch");
        remove_nodes(nodes, i + 1..i + 2, note("removed unreachable branch".to_string()));
        return true;
    }

    false
}

/// Removes the nodes in `range`, moving their labels and trivia to the node after them.
///
/// If there is no node after them, labels are kept in a new loose node,
/// and trivia is kept as the trailing trivia of the node before them.
fn remove_nodes(nodes: &mut Vec<SourceNode>, range: Range<usize>, note: Option<String>) {
    let start = range.start;
    let mut labels = vec![];
    let mut trivia = vec![];
    for mut node in nodes.drain(range) {
        labels.append(&mut node.labels);
        trivia.append(&mut node.take_trivia());
    }
    trivia.extend(note.map(Trivia::Comment));

    if let Some(next) = nodes.get_mut(start) {
        labels.append(&mut next.labels);
        next.labels = labels;
        trivia.append(&mut next.leading);
        next.leading = trivia;
    } else if !labels.is_empty() || start == 0 {
        let mut loose = SourceNode::label_only(labels);
        loose.leading = trivia;
        if loose.labels.is_empty() && loose.leading.is_empty() {
            return;
        }
        nodes.push(loose);
    } else {
        nodes[start - 1].trailing.append(&mut trivia);
    }
}

/// Whether two operand texts name the same register.
fn same_reg(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn push_operands(node: &SourceNode) -> Option<(&str, &str)> {
    match (node.op?, node.operands.as_slice()) {
        (Mnemonic::Pseudo(Pseudo::Push), [sp, value]) => Some((sp.as_str(), value.as_str())),
        _ => None,
    }
}

fn pop_operands(node: &SourceNode) -> Option<(&str, &str)> {
    match (node.op?, node.operands.as_slice()) {
        (Mnemonic::Pseudo(Pseudo::Pop), [sp, value]) => Some((sp.as_str(), value.as_str())),
        _ => None,
    }
}

/// The target operand of an unconditional branch (`br X` or `beq r0, X`).
fn branch_target(node: &SourceNode) -> Option<&str> {
    match (node.op?, node.operands.as_slice()) {
        (Mnemonic::Pseudo(Pseudo::Br), [target]) => Some(target.as_str()),
        (Mnemonic::Real(Opcode::Branch(Cond::Eq)), [reg, target]) if same_reg(reg, "r0") => Some(target.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{optimize, OptFlags};
    use crate::asm::assemble;
    use crate::ast::asm::{render, SourceNode, Trivia};
    use crate::ast::isa::{Mnemonic, Pseudo};
    use crate::ast::reg_consts::R1;
    use crate::parse::parse_source;
    use crate::sim::io::BufferedOutput;
    use crate::sim::mem::Word;
    use crate::sim::{Cpu, StopReason};

    fn opt(src: &str) -> (Vec<SourceNode>, usize) {
        let mut nodes = parse_source(src).unwrap();
        let n = optimize(&mut nodes, OptFlags::default());
        (nodes, n)
    }

    fn stmts(nodes: &[SourceNode]) -> Vec<String> {
        nodes.iter().filter(|n| n.is_stmt()).map(|n| n.stmt_text()).collect()
    }

    #[test]
    fn test_push_pop_same() {
        let (nodes, n) = opt("
            lli r3, 1
            push r7, r3
            pop r7, r3
            halt
        ");
        assert_eq!(n, 1);
        assert_eq!(stmts(&nodes), ["lli r3, 1", "halt"]);
    }

    #[test]
    fn test_push_pop_mov() {
        let (mut nodes, n) = opt("
        save: push r7, r3 # spill
            pop R7, r2
            halt
        ");
        assert_eq!(n, 1);
        assert_eq!(stmts(&nodes), ["mov r2, r3 # spill", "halt"]);
        assert_eq!(nodes[0].labels, ["save"]);

        assert_eq!(optimize(&mut nodes, OptFlags::default()), 0);
    }

    #[test]
    fn test_push_pop_kept() {
        // labeled pop is a jump target
        let (nodes, n) = opt("
            push r7, r3
        back: pop r7, r3
            halt
        ");
        assert_eq!(n, 0);
        assert_eq!(nodes.len(), 3);

        // different stack registers
        let (_, n) = opt("
            push r7, r3
            pop r6, r3
        ");
        assert_eq!(n, 0);
    }

    #[test]
    fn test_removed_labels_and_trivia() {
        let (nodes, n) = opt("
            lli r1, 1
        # save r1
        save: push r7, r1
            pop r7, r1 # restore
            halt
        ");
        assert_eq!(n, 1);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].labels, ["save"]);
        assert_eq!(nodes[1].leading, [
            Trivia::Comment("save r1".into()),
            Trivia::Comment("restore".into()),
        ]);

        // at the end of a program, with and without labels
        let (nodes, _) = opt("
            halt
        end: push r7, r1
            pop r7, r1
        ");
        assert_eq!(nodes.len(), 2);
        assert!(!nodes[1].is_stmt());
        assert_eq!(nodes[1].labels, ["end"]);

        let (nodes, _) = opt("
            halt
            push r7, r1
            pop r7, r1 # bye
        ");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].trailing, [Trivia::Comment("bye".into()), Trivia::Blank]);
    }

    #[test]
    fn test_branch_to_next() {
        let (nodes, n) = opt("
            br &next
        next: halt
        ");
        assert_eq!(n, 1);
        assert_eq!(stmts(&nodes), ["halt"]);
        assert_eq!(nodes[0].labels, ["next"]);

        let (nodes, n) = opt("
            beq R0, 0
            halt
        ");
        assert_eq!(n, 1);
        assert_eq!(stmts(&nodes), ["halt"]);

        // conditional branches are not removed
        let (_, n) = opt("
            beq r1, &next
        next: halt
        ");
        assert_eq!(n, 0);
    }

    #[test]
    fn test_branch_to_def_label() {
        let src = "
            br &tgt
        tgt: .def 4
            lli r1, 2
            halt
            lli r1, 9
            halt
        ";
        let (nodes, n) = opt(src);
        assert_eq!(n, 0);
        assert_eq!(stmts(&nodes)[0], "br &tgt");

        // the branch goes to the halt at address 4, skipping both lli
        let mut nodes = parse_source(src).unwrap();
        let image = assemble(&mut nodes).unwrap();
        let mut cpu = Cpu::default();
        cpu.load_image(&image);
        cpu.reset([]);
        assert_eq!(cpu.run(100), Ok(StopReason::Halted));
        assert_eq!(cpu.pc, 4);
        assert_eq!(cpu.reg(R1).as_signed(), 0);
    }

    #[test]
    fn test_branch_after_branch() {
        let (nodes, n) = opt("
            br &a
            br &b
        a:  lli r1, 1
        b:  halt
        ");
        // removing the second branch makes the first a branch to next
        assert_eq!(n, 2);
        assert_eq!(stmts(&nodes), ["lli r1, 1", "halt"]);

        let (nodes, n) = opt("
            br &a
        b:  br &b
        a:  halt
        ");
        assert_eq!(n, 0);
        assert_eq!(nodes.len(), 3);
    }

    #[test]
    fn test_annotate() {
        let mut nodes = parse_source("
            push r7, r3
            pop r7, r2
            br &end
        end: halt
        ").unwrap();
        let n = optimize(&mut nodes, OptFlags { annotate: true });
        assert_eq!(n, 2);
        assert_eq!(nodes[0].comment.as_deref(), Some("push/pop became mov"));
        assert!(nodes[1].leading.contains(&Trivia::Comment("removed branch to next statement".into())));
        assert_eq!(optimize(&mut nodes, OptFlags { annotate: true }), 0);
    }

    #[test]
    fn test_optimized_program_runs() {
        let src = "
                  in r1
                  lli r6, -1        # stack
                  push r6, r1
                  pop r6, r2
                  br &loop
            loop: beq r2, &done
                  out r2
                  addi r2, r2, -1
                  br &loop
                  br &loop
            done: halt
        ";
        let run = |nodes: &mut Vec<SourceNode>| {
            let image = assemble(nodes).unwrap();
            let out = BufferedOutput::new();
            let mut cpu = Cpu::default();
            cpu.load_image(&image);
            cpu.set_output(out.clone());
            cpu.reset([Word::new(3)]);
            assert_eq!(cpu.run(1000), Ok(StopReason::Halted));
            (out.take(), cpu.cycles())
        };

        let mut plain = parse_source(src).unwrap();
        let mut optimized = plain.clone();
        assert_eq!(optimize(&mut optimized, OptFlags::default()), 3);
        assert!(optimized.iter().any(|n| n.op == Some(Mnemonic::Pseudo(Pseudo::Mov))));

        let (plain_out, plain_cycles) = run(&mut plain);
        let (opt_out, opt_cycles) = run(&mut optimized);
        assert_eq!(plain_out, opt_out);
        assert!(opt_cycles < plain_cycles);

        // the rendered program parses back to the same nodes
        let reparsed = parse_source(&render(&optimized)).unwrap();
        assert_eq!(stmts(&reparsed), stmts(&optimized));
    }
}
