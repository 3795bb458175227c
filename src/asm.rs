//! Assembling source nodes into memory images.
//!
//! This module is used to convert source nodes (`[`[`SourceNode`]`]`) into memory images
//! that can be executed by the simulator.
//!
//! The assembler runs in two passes:
//! 1. Every node is given an address and encoded, with pseudo-instructions expanded and
//!    directives applied. Labels are recorded in the [`SymbolTable`]. Label operands are
//!    encoded as a zero placeholder and saved as a relocation.
//! 2. Every relocation is patched with its label's address.
//!
//! The assembler module notably consists of:
//! - [`assemble`] and [`Assembler`]: The main entry points, which assemble the nodes into a memory image.
//! - [`SymbolTable`]: a struct holding the symbol table, which stores the addresses of labels after the first assembler pass
//! - [`MemImage`]: a struct holding the memory image, which can be loaded into the simulator and executed
//!
//! [`SourceNode`]: crate::ast::asm::SourceNode

pub mod encoding;

use std::borrow::Cow;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use logos::Logos;

use crate::ast::asm::SourceNode;
use crate::ast::isa::{Arity, DirectiveKind, Format, Mnemonic, Opcode, Pseudo};
use crate::ast::sim::SimInstr;
use crate::ast::reg_consts::R0;
use crate::ast::{IOffset, Imm6, Imm8, Offset, OffsetNewErr, Operand, OperandErr, Reg};
use crate::parse::lex::Token;
use crate::sim::mem::MEM_LEN;

/// Assembles source nodes into a memory image (with default flags).
///
/// After assembly, each node's `addr` and `words` hold where it was placed and what it assembled to.
///
/// # Example
/// ```
/// use anna_ensemble::parse::parse_source;
/// use anna_ensemble::asm::assemble;
///
/// let src = "
///     lwi r1, &data
///     halt
/// data: .fill 0x2110
/// ";
/// let mut nodes = parse_source(src).unwrap();
/// let image = assemble(&mut nodes).unwrap();
///
/// assert_eq!(image.symbol_table().lookup_label("data"), Some(3));
/// assert_eq!(image.get(0), Some(0x7203)); // lli r1, 3
/// assert_eq!(nodes[2].addr, Some(3));
/// assert_eq!(nodes[2].words, [0x2110]);
/// ```
pub fn assemble(nodes: &mut [SourceNode]) -> Result<MemImage, AsmErr> {
    Assembler::new(AsmFlags::default()).assemble(nodes)
}

/// Configuration flags for [`Assembler`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct AsmFlags {
    /// The number of words in the memory image.
    ///
    /// This is clamped to 1..=65536.
    pub mem_len: usize,
}
impl Default for AsmFlags {
    fn default() -> Self {
        Self { mem_len: MEM_LEN }
    }
}

/// The two-pass assembler.
///
/// An assembler is consumed by [`Assembler::assemble`],
/// so no state carries over between assembled programs.
#[derive(Debug)]
pub struct Assembler {
    mem_len: usize,
    cursor: u32,
    relocs: BTreeMap<u16, Reloc>,
    aliases: HashMap<String, Reg>,
    image: MemImage,
}

/// A word waiting for a label's address.
#[derive(Debug)]
struct Reloc {
    label: String,
    node: usize,
    word: usize,
}

/// A word produced in pass 1, possibly waiting on a label.
struct Emit {
    word: u16,
    label: Option<String>,
}
impl Emit {
    fn word(word: u16) -> Self {
        Self { word, label: None }
    }
    fn reloc(word: u16, label: String) -> Self {
        Self { word, label: Some(label) }
    }
}

/// An immediate operand, before relocation.
enum Imm {
    Value(i32),
    Label(String),
}
impl Imm {
    fn parse(text: &str) -> Result<Self, AsmErrKind> {
        match Operand::parse(text)? {
            Operand::Label(l) => Ok(Imm::Label(l)),
            op => Ok(Imm::Value(op.as_int()?)),
        }
    }
}

/// Fits a value into a signed `N`-bit immediate.
fn signed_imm<const N: u32>(value: i32) -> Result<IOffset<N>, OffsetNewErr> {
    let value = i16::try_from(value).map_err(|_| OffsetNewErr::CannotFitSigned(N))?;
    IOffset::new(value)
}
/// Fits a value into a byte immediate, which can be signed (-128 to 127) or unsigned (0 to 255).
fn byte_imm(value: i32) -> Result<Imm8, OffsetNewErr> {
    match u16::try_from(value) {
        Ok(n)  => Offset::<u16, 8>::new(n).map(|b| Imm8::new_trunc(b.get() as i16)),
        Err(_) => signed_imm(value),
    }
}

impl Assembler {
    /// Creates a new assembler.
    pub fn new(flags: AsmFlags) -> Self {
        let mem_len = flags.mem_len.clamp(1, MEM_LEN);
        let aliases = (0..8u8)
            .filter_map(|r| Some((format!("r{r}"), Reg::try_from(r).ok()?)))
            .collect();

        Self {
            mem_len,
            cursor: 0,
            relocs: BTreeMap::new(),
            aliases,
            image: MemImage::new(mem_len),
        }
    }

    /// Assembles the nodes into a memory image.
    ///
    /// Each node's `addr` and `words` are updated with its placement.
    pub fn assemble(mut self, nodes: &mut [SourceNode]) -> Result<MemImage, AsmErr> {
        tracing::debug!(nodes = nodes.len(), mem_len = self.mem_len, "assembler pass 1");
        for (i, node) in nodes.iter_mut().enumerate() {
            self.pass1(i, node).map_err(|kind| AsmErr::new(node, kind))?;
        }

        tracing::debug!(labels = self.image.sym.len(), relocations = self.relocs.len(), "assembler pass 2");
        for (addr, reloc) in std::mem::take(&mut self.relocs) {
            let node = &mut nodes[reloc.node];
            let word = self.relocate(addr, &reloc.label).map_err(|kind| AsmErr::new(node, kind))?;
            if let Some(w) = node.words.get_mut(reloc.word) {
                *w = word;
            }
        }

        tracing::debug!(words = self.image.word_count(), "assembled image");
        Ok(self.image)
    }

    /// The address labels are bound to (the cursor, wrapped to memory).
    fn label_addr(&self) -> u16 {
        // mem_len <= 65536, so this fits
        (self.cursor as usize % self.mem_len) as u16
    }

    fn define_labels(&mut self, labels: &[String], addr: u16) -> Result<(), AsmErrKind> {
        labels.iter().try_for_each(|label| self.image.sym.insert(label, addr))
    }

    /// Resolves a register operand (including aliases installed by `.ralias`).
    fn reg(&self, text: &str) -> Result<Reg, AsmErrKind> {
        if let Some(&reg) = self.aliases.get(&text.trim().to_ascii_lowercase()) {
            return Ok(reg);
        }
        Ok(Operand::parse(text)?.as_register()?)
    }

    fn pass1(&mut self, index: usize, node: &mut SourceNode) -> Result<(), AsmErrKind> {
        node.addr = None;
        node.words.clear();

        let Some(op) = node.op else {
            // Loose node: its labels mark the end of the program.
            let addr = self.label_addr();
            self.define_labels(&node.labels, addr)?;
            node.addr = Some(addr);
            return Ok(());
        };

        let arity = op.arity();
        if !arity.accepts(node.operands.len()) {
            return Err(AsmErrKind::OperandArity { mnemonic: op.name(), expected: arity, found: node.operands.len() });
        }

        let operands = &node.operands;
        let emits = match op {
            Mnemonic::Real(opcode) => vec![self.encode(opcode, operands)?],
            Mnemonic::Pseudo(pseudo) => expand(pseudo, operands)?
                .into_iter()
                .map(|(opcode, ops)| self.encode(opcode, &ops))
                .collect::<Result<_, _>>()?,
            Mnemonic::Directive(DirectiveKind::Org) => {
                if !node.labels.is_empty() {
                    return Err(AsmErrKind::LabelOnOrg);
                }
                let org = Operand::parse(&operands[0])?.as_int()? as u16;
                if usize::from(org) >= self.mem_len {
                    return Err(AsmErrKind::OutOfMemory(org.into()));
                }
                self.cursor = org.into();
                tracing::trace!(org, "moved cursor");
                return Ok(());
            },
            Mnemonic::Directive(DirectiveKind::Def) => {
                if node.labels.is_empty() {
                    return Err(AsmErrKind::DefWithoutLabel);
                }
                let value = Operand::parse(&operands[0])?.as_int()? as u16;
                self.define_labels(&node.labels, value)?;
                return Ok(());
            },
            Mnemonic::Directive(DirectiveKind::Ralias) => {
                self.alias(&operands[0], &operands[1])?;
                vec![]
            },
            Mnemonic::Directive(DirectiveKind::Fill) => operands.iter()
                .map(|text| match Imm::parse(text)? {
                    // .fill values are written verbatim, wrapping negatives
                    Imm::Value(v) => Ok(Emit::word(v as u16)),
                    Imm::Label(l) => Ok(Emit::reloc(0, l)),
                })
                .collect::<Result<_, AsmErrKind>>()?,
            Mnemonic::Directive(DirectiveKind::Cstr) => {
                let mut words = vec![];
                for text in operands {
                    for c in Operand::parse(text)?.as_str()?.chars() {
                        let word = u16::try_from(u32::from(c)).map_err(|_| AsmErrKind::CharOutOfRange(c))?;
                        words.push(Emit::word(word));
                    }
                }
                words.push(Emit::word(0));
                words
            },
        };

        let start = self.label_addr();
        self.define_labels(&node.labels, start)?;
        node.addr = Some(start);

        for (i, emit) in emits.into_iter().enumerate() {
            if self.cursor as usize >= self.mem_len {
                return Err(AsmErrKind::OutOfMemory(self.cursor));
            }
            let addr = self.cursor as u16;
            if self.image.insert(addr, emit.word).is_some() {
                return Err(AsmErrKind::OverlappingWrite(addr));
            }
            if let Some(label) = emit.label {
                self.relocs.insert(addr, Reloc { label, node: index, word: i });
            }
            node.words.push(emit.word);
            self.cursor += 1;
        }

        tracing::trace!(line = node.line, addr = start, words = ?node.words, "{}", node.stmt_text());
        Ok(())
    }

    /// Encodes one real instruction.
    ///
    /// The operand count must already have been checked.
    fn encode(&self, op: Opcode, operands: &[String]) -> Result<Emit, AsmErrKind> {
        match op.format() {
            Format::R | Format::Directive => {
                let mut regs = [R0; 3];
                for (slot, text) in regs.iter_mut().zip(operands) {
                    *slot = self.reg(text)?;
                }
                let [rd, rs1, rs2] = regs;
                Ok(Emit::word(SimInstr::new_r(op, rd, rs1, rs2).encode()))
            },
            Format::Imm6 => {
                let rd = self.reg(&operands[0])?;
                let rs1 = self.reg(&operands[1])?;
                match Imm::parse(&operands[2])? {
                    Imm::Value(v) => Ok(Emit::word(SimInstr::new_imm6(op, rd, rs1, signed_imm(v)?).encode())),
                    Imm::Label(l) => Ok(Emit::reloc(SimInstr::new_imm6(op, rd, rs1, Imm6::new_trunc(0)).encode(), l)),
                }
            },
            Format::Imm8 => {
                let rd = self.reg(&operands[0])?;
                match Imm::parse(&operands[1])? {
                    Imm::Value(v) => {
                        let imm = match op {
                            Opcode::Branch(_) => signed_imm(v)?,
                            _ => byte_imm(v)?,
                        };
                        Ok(Emit::word(SimInstr::new_imm8(op, rd, imm).encode()))
                    },
                    Imm::Label(l) => Ok(Emit::reloc(SimInstr::new_imm8(op, rd, Imm8::new_trunc(0)).encode(), l)),
                }
            },
        }
    }

    /// Installs a register alias (`.ralias real alias`).
    fn alias(&mut self, real: &str, alias: &str) -> Result<(), AsmErrKind> {
        let reg = Operand::parse(real)
            .and_then(|op| op.as_register())
            .map_err(|_| AsmErrKind::BadAlias(real.trim().to_string()))?;

        let mut tokens = Token::lexer(alias);
        match (tokens.next(), tokens.next()) {
            (Some(Ok(Token::Ident(name))), None) => {
                tracing::trace!(alias = %name, %reg, "installed register alias");
                self.aliases.insert(name.to_ascii_lowercase(), reg);
                Ok(())
            },
            _ => Err(AsmErrKind::BadAlias(alias.trim().to_string())),
        }
    }

    /// Patches the word at `addr` with the address of `label`, returning the patched word.
    fn relocate(&mut self, addr: u16, label: &str) -> Result<u16, AsmErrKind> {
        let target = self.image.sym.lookup_label(label)
            .ok_or_else(|| AsmErrKind::UnresolvedLabel(label.to_string()))?;
        let word = self.image.get(addr).unwrap_or(0);

        let patched = match Opcode::from_bits(word >> 12, word & 0b111) {
            Some(Opcode::Branch(_)) => {
                // mem_len <= 65536, so this fits
                let len = self.mem_len as i32;
                let mut offset = i32::from(target) - (i32::from(addr) + 1);
                if offset >= len / 2 {
                    offset -= len;
                } else if offset < -(len / 2) {
                    offset += len;
                }
                let imm: Imm8 = signed_imm(offset)
                    .map_err(|_| AsmErrKind::RelocationRange { label: label.to_string(), offset })?;
                (word & 0xFF00) | imm.bits()
            },
            Some(Opcode::Lli) => (word & 0xFF00) | (target & 0xFF),
            Some(Opcode::Lui) => (word & 0xFF00) | (target >> 8),
            _ => return Err(AsmErrKind::LabelNotAllowed(label.to_string())),
        };

        tracing::trace!(addr, label, target, word = patched, "relocated");
        self.image.insert(addr, patched);
        Ok(patched)
    }
}

/// Expands a pseudo-instruction into real instructions (and their operand texts).
fn expand(pseudo: Pseudo, ops: &[String]) -> Result<Vec<(Opcode, Vec<String>)>, AsmErrKind> {
    use crate::ast::isa::{Cond, MathFunc, OutFunc};

    let r0 = || String::from("r0");
    let expansion = match pseudo {
        Pseudo::Mov  => vec![(Opcode::Math(MathFunc::Add), vec![ops[0].clone(), ops[1].clone(), r0()])],
        Pseudo::Halt => vec![(Opcode::Out(OutFunc::Out), vec![r0()])],
        Pseudo::Jmp  => vec![(Opcode::Jalr, vec![ops[0].clone(), r0()])],
        Pseudo::Br   => vec![(Opcode::Branch(Cond::Eq), vec![r0(), ops[0].clone()])],
        Pseudo::Push => vec![
            (Opcode::Sw, vec![ops[1].clone(), ops[0].clone(), "0".into()]),
            (Opcode::Addi, vec![ops[0].clone(), ops[0].clone(), "-1".into()]),
        ],
        Pseudo::Pop => vec![
            (Opcode::Addi, vec![ops[0].clone(), ops[0].clone(), "1".into()]),
            (Opcode::Lw, vec![ops[1].clone(), ops[0].clone(), "0".into()]),
        ],
        Pseudo::Lwi => {
            let (lo, hi) = match Imm::parse(&ops[1])? {
                Imm::Label(_) => (ops[1].clone(), ops[1].clone()),
                Imm::Value(v) => {
                    let v = v as u16;
                    (format!("{:#04x}", v & 0xFF), format!("{:#04x}", v >> 8))
                },
            };
            vec![
                (Opcode::Lli, vec![ops[0].clone(), lo]),
                (Opcode::Lui, vec![ops[0].clone(), hi]),
            ]
        },
    };

    Ok(expansion)
}

/// Kinds of errors that can occur from assembling given assembly code.
///
/// See [`AsmErr`] for this error type with line information included.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum AsmErrKind {
    /// The statement had the wrong number of operands (pass 1).
    #[error("{mnemonic} expects {expected} operand(s), found {found}")]
    OperandArity {
        /// The statement's mnemonic.
        mnemonic: &'static str,
        /// The number of operands the mnemonic takes.
        expected: Arity,
        /// The number of operands given.
        found: usize,
    },
    /// An operand was malformed or was the wrong kind (pass 1).
    #[error(transparent)]
    Operand(#[from] OperandErr),
    /// An immediate value did not fit its field (pass 1).
    #[error(transparent)]
    OffsetNewErr(#[from] OffsetNewErr),
    /// A string held a character that does not fit in a word (pass 1).
    #[error("character {0:?} does not fit in 16 bits")]
    CharOutOfRange(char),
    /// There were multiple labels of the same name (pass 1).
    #[error("label `{0}` was defined multiple times")]
    DuplicateLabel(String),
    /// A label was placed on an `.org` directive (pass 1).
    #[error("labels cannot be placed on .org")]
    LabelOnOrg,
    /// A `.def` directive had no label (pass 1).
    #[error(".def requires a label")]
    DefWithoutLabel,
    /// A `.ralias` directive was malformed (pass 1).
    #[error("invalid register alias `{0}`")]
    BadAlias(String),
    /// Two statements wrote the same address (pass 1).
    #[error("address 0x{0:04X} was written more than once")]
    OverlappingWrite(u16),
    /// A statement was written past the end of memory (pass 1).
    #[error("address 0x{0:04X} is outside of memory")]
    OutOfMemory(u32),
    /// A referenced label was never defined (pass 2).
    #[error("label `{0}` could not be found")]
    UnresolvedLabel(String),
    /// A branch's target is too far away (pass 2).
    #[error("branch to `{label}` is too far ({offset} words)")]
    RelocationRange {
        /// The target label.
        label: String,
        /// The offset that was needed.
        offset: i32,
    },
    /// A label was used as an operand of an instruction that cannot hold an address (pass 2).
    #[error("label `{0}` cannot be used here")]
    LabelNotAllowed(String),
}

/// Error from assembling given assembly code.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct AsmErr {
    /// The source line (1-indexed) of the statement that failed (0 if it was not parsed from source).
    pub line: usize,
    /// The text of the statement that failed.
    pub text: String,
    /// The brief cause of this error.
    pub kind: AsmErrKind,
}
impl AsmErr {
    /// Creates a new [`AsmErr`], located at the given node.
    pub fn new(node: &SourceNode, kind: AsmErrKind) -> Self {
        AsmErr { line: node.line, text: node.stmt_text(), kind }
    }
}
impl std::fmt::Display for AsmErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            0 => write!(f, "{} (in `{}`)", self.kind, self.text),
            n => write!(f, "line {n}: {}", self.kind),
        }
    }
}
impl std::error::Error for AsmErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}
impl crate::err::Error for AsmErr {
    fn line(&self) -> Option<usize> {
        (self.line != 0).then_some(self.line)
    }

    fn help(&self) -> Option<Cow<str>> {
        use crate::err::Error;

        match &self.kind {
            AsmErrKind::OperandArity { .. }     => None,
            AsmErrKind::Operand(e)              => e.help(),
            AsmErrKind::OffsetNewErr(e)         => e.help(),
            AsmErrKind::CharOutOfRange(_)       => Some("strings can only hold characters from U+0000 to U+FFFF".into()),
            AsmErrKind::DuplicateLabel(_)       => Some("labels must be unique within a program, try renaming one of the labels".into()),
            AsmErrKind::LabelOnOrg              => Some("try moving this label to the statement after the .org".into()),
            AsmErrKind::DefWithoutLabel         => Some("try adding a label before .def (e.g., `size: .def 10`)".into()),
            AsmErrKind::BadAlias(_)             => Some("the form is `.ralias rN alias`, where the alias is a name other than r0-r7".into()),
            AsmErrKind::OverlappingWrite(_)     => Some("try moving the .org of one of these regions".into()),
            AsmErrKind::OutOfMemory(_)          => Some("the program does not fit in memory".into()),
            AsmErrKind::UnresolvedLabel(_)      => Some("try adding this label before an instruction or directive".into()),
            AsmErrKind::RelocationRange { .. }  => Some("branches can reach 128 words back and 127 words forward; try a jalr through a register loaded with lwi".into()),
            AsmErrKind::LabelNotAllowed(_)      => Some("labels can only be used in branches, lli, lui, and lwi".into()),
        }
    }
}

/// The symbol table created in the first assembler pass.
///
/// This maps each label to its address (or value, for labels defined with `.def`).
/// Labels are case-sensitive.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct SymbolTable {
    label_map: BTreeMap<String, u16>,
}
impl SymbolTable {
    fn insert(&mut self, label: &str, addr: u16) -> Result<(), AsmErrKind> {
        match self.label_map.entry(label.to_string()) {
            Entry::Occupied(_) => Err(AsmErrKind::DuplicateLabel(label.to_string())),
            Entry::Vacant(e) => {
                e.insert(addr);
                Ok(())
            }
        }
    }

    /// Gets the address of a label, if it is defined.
    ///
    /// # Example
    /// ```
    /// use anna_ensemble::parse::parse_source;
    /// use anna_ensemble::asm::assemble;
    ///
    /// let mut nodes = parse_source("halt\nlast: halt").unwrap();
    /// let image = assemble(&mut nodes).unwrap();
    ///
    /// let sym = image.symbol_table();
    /// assert_eq!(sym.lookup_label("last"), Some(1));
    /// assert_eq!(sym.lookup_label("LAST"), None);
    /// ```
    pub fn lookup_label(&self, label: &str) -> Option<u16> {
        self.label_map.get(label).copied()
    }

    /// Gets the label at a given address, if there is one.
    ///
    /// If multiple labels share the address, the alphabetically-first one is returned.
    pub fn rev_lookup_label(&self, addr: u16) -> Option<&str> {
        self.label_map.iter()
            .find(|&(_, &a)| a == addr)
            .map(|(label, _)| label.as_str())
    }

    /// Gets an iterable of the mapping from labels to addresses, in label order.
    pub fn label_iter(&self) -> impl Iterator<Item = (&str, u16)> + '_ {
        self.label_map.iter()
            .map(|(label, &addr)| (label.as_str(), addr))
    }

    /// The number of labels.
    pub fn len(&self) -> usize {
        self.label_map.len()
    }

    /// Whether there are no labels.
    pub fn is_empty(&self) -> bool {
        self.label_map.is_empty()
    }
}

/// An assembled memory image.
///
/// This holds the words written by the program (every other address is untouched),
/// and the symbol table, so that debuggers can show labels.
///
/// This can be loaded into the simulator with [`Cpu::load_image`](crate::sim::Cpu::load_image),
/// and written to disk with the formats of [`encoding`].
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MemImage {
    words: BTreeMap<u16, u16>,
    mem_len: usize,
    sym: SymbolTable,
}
impl MemImage {
    /// Creates an empty memory image for a memory of `mem_len` words.
    pub fn new(mem_len: usize) -> Self {
        Self { words: BTreeMap::new(), mem_len: mem_len.clamp(1, MEM_LEN), sym: SymbolTable::default() }
    }

    /// Writes a word, returning the word previously written there (if any).
    pub(crate) fn insert(&mut self, addr: u16, word: u16) -> Option<u16> {
        self.words.insert(addr, word)
    }

    /// Gets the word at the given address, if the program wrote one there.
    pub fn get(&self, addr: u16) -> Option<u16> {
        self.words.get(&addr).copied()
    }

    /// The length of the memory this image was assembled for.
    pub fn mem_len(&self) -> usize {
        self.mem_len
    }

    /// The number of words written.
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Whether no words were written.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Iterates over each written address and its word, in address order.
    pub fn addr_iter(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.words.iter().map(|(&addr, &word)| (addr, word))
    }

    /// Gets the contiguous blocks of written words, as `(start, words)` pairs in address order.
    ///
    /// ```
    /// use anna_ensemble::parse::parse_source;
    /// use anna_ensemble::asm::assemble;
    ///
    /// let mut nodes = parse_source(".fill 1 2\n.org 8\n.fill 3").unwrap();
    /// let image = assemble(&mut nodes).unwrap();
    /// assert_eq!(image.block_iter(), [(0, vec![1, 2]), (8, vec![3])]);
    /// ```
    pub fn block_iter(&self) -> Vec<(u16, Vec<u16>)> {
        let mut blocks: Vec<(u16, Vec<u16>)> = vec![];
        for (addr, word) in self.addr_iter() {
            match blocks.last_mut() {
                Some((start, block)) if usize::from(*start) + block.len() == usize::from(addr) => block.push(word),
                _ => blocks.push((addr, vec![word])),
            }
        }
        blocks
    }

    /// The symbol table of this image.
    pub fn symbol_table(&self) -> &SymbolTable {
        &self.sym
    }
}
