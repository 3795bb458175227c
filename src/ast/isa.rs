//! The static table of the ANNA instruction set.
//!
//! Every mnemonic the assembler accepts is one of:
//! - [`Opcode`]: a real machine instruction,
//! - [`Pseudo`]: a pseudo-instruction, expanded by the assembler into real instructions,
//! - [`DirectiveKind`]: an assembler directive.
//!
//! These are unified under [`Mnemonic`], which is what a [`SourceNode`] holds.
//!
//! The numbering of the machine instructions is:
//!
//! | opcode | mnemonics                                  | format |
//! |--------|--------------------------------------------|--------|
//! | `0x0`  | `add sub and or not mul div mod` (subfunc) | R      |
//! | `0x1`  | `jalr`                                     | R      |
//! | `0x2`  | `in`                                       | R      |
//! | `0x3`  | `addi`                                     | Imm6   |
//! | `0x4`  | `shf`                                      | Imm6   |
//! | `0x5`  | `lw`                                       | Imm6   |
//! | `0x6`  | `sw`                                       | Imm6   |
//! | `0x7`  | `lli`                                      | Imm8   |
//! | `0x8`  | `lui`                                      | Imm8   |
//! | `0x9`-`0xE` | `beq bne bgt bge blt ble`             | Imm8   |
//! | `0xF`  | `out outs outn` (subfunc)                  | R      |
//!
//! [`SourceNode`]: crate::ast::asm::SourceNode

/// The wire format of an instruction.
///
/// ```text
///          | 15..12 | 11..9 | 8..6 | 5..3 | 2..0    |
/// R        | opcode | rd    | rs1  | rs2  | subfunc |
/// Imm6     | opcode | rd    | rs1  | imm6           |
/// Imm8     | opcode | rd    | imm8                  |
/// ```
///
/// [`Format::Directive`] is only used by the assembler and never appears in a machine word.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Format {
    #[allow(missing_docs)]
    R,
    #[allow(missing_docs)]
    Imm6,
    #[allow(missing_docs)]
    Imm8,
    #[allow(missing_docs)]
    Directive,
}
impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::R => f.write_str("R"),
            Format::Imm6 => f.write_str("Imm6"),
            Format::Imm8 => f.write_str("Imm8"),
            Format::Directive => f.write_str("directive"),
        }
    }
}

/// The number of operands a mnemonic requires.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Arity {
    /// Exactly this many operands.
    Exact(usize),
    /// One or more operands (`.fill`, `.cstr`).
    AtLeastOne,
}
impl Arity {
    /// Whether this arity accepts `n` operands.
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exact(m)   => n == m,
            Arity::AtLeastOne => n >= 1,
        }
    }
}
impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Exact(n)   => write!(f, "{n}"),
            Arity::AtLeastOne => f.write_str("at least 1"),
        }
    }
}

/// The sub-functions of the shared math opcode (`0x0`).
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum MathFunc {
    #[allow(missing_docs)]
    Add = 0,
    #[allow(missing_docs)]
    Sub = 1,
    #[allow(missing_docs)]
    And = 2,
    #[allow(missing_docs)]
    Or  = 3,
    #[allow(missing_docs)]
    Not = 4,
    #[allow(missing_docs)]
    Mul = 5,
    #[allow(missing_docs)]
    Div = 6,
    #[allow(missing_docs)]
    Mod = 7,
}
impl MathFunc {
    const ALL: [MathFunc; 8] = [
        MathFunc::Add, MathFunc::Sub, MathFunc::And, MathFunc::Or,
        MathFunc::Not, MathFunc::Mul, MathFunc::Div, MathFunc::Mod,
    ];

    fn from_bits(bits: u16) -> Self {
        Self::ALL[usize::from(bits & 0b111)]
    }
}

/// The sub-functions of the shared output opcode (`0xF`).
///
/// Sub-functions 3-7 are not assigned.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum OutFunc {
    /// Output a register's value as a number.
    Out  = 0,
    /// Output the zero-terminated string starting at the address in a register.
    Outs = 1,
    /// Output a register's value as a number, followed by a newline.
    Outn = 2,
}

/// The branch conditions (opcodes `0x9`-`0xE`).
///
/// Each compares the signed value of `rd` with zero.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Cond {
    #[allow(missing_docs)]
    Eq,
    #[allow(missing_docs)]
    Ne,
    #[allow(missing_docs)]
    Gt,
    #[allow(missing_docs)]
    Ge,
    #[allow(missing_docs)]
    Lt,
    #[allow(missing_docs)]
    Le,
}
impl Cond {
    /// Whether a branch with this condition is taken for the given register value.
    pub fn test(self, value: i16) -> bool {
        match self {
            Cond::Eq => value == 0,
            Cond::Ne => value != 0,
            Cond::Gt => value > 0,
            Cond::Ge => value >= 0,
            Cond::Lt => value < 0,
            Cond::Le => value <= 0,
        }
    }
}

/// A real machine instruction.
///
/// The math and output groups share one numeric opcode each and are
/// distinguished by a sub-function, so they carry it as a variant payload.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Opcode {
    /// `add/sub/and/or/not/mul/div/mod rd, rs1, rs2`
    Math(MathFunc),
    /// `jalr rd, rs1`
    Jalr,
    /// `in rd`
    In,
    /// `addi rd, rs1, imm6`
    Addi,
    /// `shf rd, rs1, imm6`
    Shf,
    /// `lw rd, rs1, imm6`
    Lw,
    /// `sw rd, rs1, imm6`
    Sw,
    /// `lli rd, imm8`
    Lli,
    /// `lui rd, imm8`
    Lui,
    /// `beq/bne/bgt/bge/blt/ble rd, imm8`
    Branch(Cond),
    /// `out/outs/outn rd`
    Out(OutFunc),
}
impl Opcode {
    /// Every real instruction.
    pub const ALL: [Opcode; 25] = [
        Opcode::Math(MathFunc::Add), Opcode::Math(MathFunc::Sub), Opcode::Math(MathFunc::And), Opcode::Math(MathFunc::Or),
        Opcode::Math(MathFunc::Not), Opcode::Math(MathFunc::Mul), Opcode::Math(MathFunc::Div), Opcode::Math(MathFunc::Mod),
        Opcode::Jalr, Opcode::In, Opcode::Addi, Opcode::Shf, Opcode::Lw, Opcode::Sw, Opcode::Lli, Opcode::Lui,
        Opcode::Branch(Cond::Eq), Opcode::Branch(Cond::Ne), Opcode::Branch(Cond::Gt),
        Opcode::Branch(Cond::Ge), Opcode::Branch(Cond::Lt), Opcode::Branch(Cond::Le),
        Opcode::Out(OutFunc::Out), Opcode::Out(OutFunc::Outs), Opcode::Out(OutFunc::Outn),
    ];

    /// The 4-bit numeric opcode.
    pub fn code(self) -> u16 {
        match self {
            Opcode::Math(_) => 0x0,
            Opcode::Jalr    => 0x1,
            Opcode::In      => 0x2,
            Opcode::Addi    => 0x3,
            Opcode::Shf     => 0x4,
            Opcode::Lw      => 0x5,
            Opcode::Sw      => 0x6,
            Opcode::Lli     => 0x7,
            Opcode::Lui     => 0x8,
            Opcode::Branch(Cond::Eq) => 0x9,
            Opcode::Branch(Cond::Ne) => 0xA,
            Opcode::Branch(Cond::Gt) => 0xB,
            Opcode::Branch(Cond::Ge) => 0xC,
            Opcode::Branch(Cond::Lt) => 0xD,
            Opcode::Branch(Cond::Le) => 0xE,
            Opcode::Out(_)  => 0xF,
        }
    }

    /// The 3-bit sub-function, for the instructions that share an opcode.
    pub fn subfunc(self) -> Option<u16> {
        match self {
            Opcode::Math(func) => Some(func as u16),
            Opcode::Out(func)  => Some(func as u16),
            _ => None
        }
    }

    /// The wire format of this instruction.
    pub fn format(self) -> Format {
        match self {
            Opcode::Math(_) | Opcode::Jalr | Opcode::In | Opcode::Out(_) => Format::R,
            Opcode::Addi | Opcode::Shf | Opcode::Lw | Opcode::Sw => Format::Imm6,
            Opcode::Lli | Opcode::Lui | Opcode::Branch(_) => Format::Imm8,
        }
    }

    /// The number of operands this instruction takes in assembly.
    pub fn arity(self) -> usize {
        match self {
            Opcode::Math(MathFunc::Not) => 2,
            Opcode::Math(_) => 3,
            Opcode::Jalr    => 2,
            Opcode::In      => 1,
            Opcode::Out(_)  => 1,
            Opcode::Addi | Opcode::Shf | Opcode::Lw | Opcode::Sw => 3,
            Opcode::Lli | Opcode::Lui | Opcode::Branch(_) => 2,
        }
    }

    /// The assembly mnemonic of this instruction.
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Math(MathFunc::Add) => "add",
            Opcode::Math(MathFunc::Sub) => "sub",
            Opcode::Math(MathFunc::And) => "and",
            Opcode::Math(MathFunc::Or)  => "or",
            Opcode::Math(MathFunc::Not) => "not",
            Opcode::Math(MathFunc::Mul) => "mul",
            Opcode::Math(MathFunc::Div) => "div",
            Opcode::Math(MathFunc::Mod) => "mod",
            Opcode::Jalr => "jalr",
            Opcode::In   => "in",
            Opcode::Addi => "addi",
            Opcode::Shf  => "shf",
            Opcode::Lw   => "lw",
            Opcode::Sw   => "sw",
            Opcode::Lli  => "lli",
            Opcode::Lui  => "lui",
            Opcode::Branch(Cond::Eq) => "beq",
            Opcode::Branch(Cond::Ne) => "bne",
            Opcode::Branch(Cond::Gt) => "bgt",
            Opcode::Branch(Cond::Ge) => "bge",
            Opcode::Branch(Cond::Lt) => "blt",
            Opcode::Branch(Cond::Le) => "ble",
            Opcode::Out(OutFunc::Out)  => "out",
            Opcode::Out(OutFunc::Outs) => "outs",
            Opcode::Out(OutFunc::Outn) => "outn",
        }
    }

    /// Looks up an instruction by its (case-insensitive) mnemonic.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name().eq_ignore_ascii_case(name))
    }

    /// Looks up an instruction by its numeric opcode and the sub-function bits of its word.
    ///
    /// The sub-function bits are ignored unless the opcode is shared.
    ///
    /// ```
    /// use anna_ensemble::ast::isa::{Opcode, MathFunc};
    ///
    /// assert_eq!(Opcode::from_bits(0x0, 5), Some(Opcode::Math(MathFunc::Mul)));
    /// assert_eq!(Opcode::from_bits(0x3, 5), Some(Opcode::Addi));
    /// assert_eq!(Opcode::from_bits(0xF, 7), None);
    /// ```
    pub fn from_bits(code: u16, subfunc: u16) -> Option<Self> {
        let op = match code & 0xF {
            0x0 => Opcode::Math(MathFunc::from_bits(subfunc)),
            0x1 => Opcode::Jalr,
            0x2 => Opcode::In,
            0x3 => Opcode::Addi,
            0x4 => Opcode::Shf,
            0x5 => Opcode::Lw,
            0x6 => Opcode::Sw,
            0x7 => Opcode::Lli,
            0x8 => Opcode::Lui,
            0x9 => Opcode::Branch(Cond::Eq),
            0xA => Opcode::Branch(Cond::Ne),
            0xB => Opcode::Branch(Cond::Gt),
            0xC => Opcode::Branch(Cond::Ge),
            0xD => Opcode::Branch(Cond::Lt),
            0xE => Opcode::Branch(Cond::Le),
            _ => match subfunc & 0b111 {
                0 => Opcode::Out(OutFunc::Out),
                1 => Opcode::Out(OutFunc::Outs),
                2 => Opcode::Out(OutFunc::Outn),
                _ => return None,
            }
        };

        Some(op)
    }
}
impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A pseudo-instruction, which the assembler expands into real instructions.
///
/// | pseudo               | expansion                                             |
/// |----------------------|-------------------------------------------------------|
/// | `mov rd, rs`         | `add rd, rs, r0`                                      |
/// | `halt`               | `out r0`                                              |
/// | `jmp rs`             | `jalr rs, r0`                                         |
/// | `br target`          | `beq r0, target`                                      |
/// | `push rsp, rv`       | `sw rv, rsp, 0` ; `addi rsp, rsp, -1`                 |
/// | `pop rsp, rv`        | `addi rsp, rsp, 1` ; `lw rv, rsp, 0`                  |
/// | `lwi rd, value`      | `lli rd, low8(value)` ; `lui rd, high8(value)`        |
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Pseudo {
    #[allow(missing_docs)]
    Mov,
    #[allow(missing_docs)]
    Halt,
    #[allow(missing_docs)]
    Jmp,
    #[allow(missing_docs)]
    Br,
    #[allow(missing_docs)]
    Push,
    #[allow(missing_docs)]
    Pop,
    #[allow(missing_docs)]
    Lwi,
}
impl Pseudo {
    const ALL: [Pseudo; 7] = [Pseudo::Mov, Pseudo::Halt, Pseudo::Jmp, Pseudo::Br, Pseudo::Push, Pseudo::Pop, Pseudo::Lwi];

    /// The assembly mnemonic of this pseudo-instruction.
    pub fn name(self) -> &'static str {
        match self {
            Pseudo::Mov  => "mov",
            Pseudo::Halt => "halt",
            Pseudo::Jmp  => "jmp",
            Pseudo::Br   => "br",
            Pseudo::Push => "push",
            Pseudo::Pop  => "pop",
            Pseudo::Lwi  => "lwi",
        }
    }

    /// The number of operands this pseudo-instruction takes.
    pub fn arity(self) -> usize {
        match self {
            Pseudo::Halt => 0,
            Pseudo::Jmp | Pseudo::Br => 1,
            Pseudo::Mov | Pseudo::Push | Pseudo::Pop | Pseudo::Lwi => 2,
        }
    }

    /// The number of words this pseudo-instruction expands to.
    pub fn word_len(self) -> u16 {
        match self {
            Pseudo::Push | Pseudo::Pop | Pseudo::Lwi => 2,
            _ => 1,
        }
    }
}

/// An assembler directive.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum DirectiveKind {
    /// `.org addr`: moves the location counter.
    Org,
    /// `name: .def value`: defines a label without reserving memory.
    Def,
    /// `.fill v1 v2 ...`: writes words verbatim.
    Fill,
    /// `.cstr "s" ...`: writes a zero-terminated string, one character per word.
    Cstr,
    /// `.ralias real alias`: installs a register alias.
    Ralias,
}
impl DirectiveKind {
    const ALL: [DirectiveKind; 5] = [DirectiveKind::Org, DirectiveKind::Def, DirectiveKind::Fill, DirectiveKind::Cstr, DirectiveKind::Ralias];

    /// The assembly mnemonic of this directive, including the leading dot.
    pub fn name(self) -> &'static str {
        match self {
            DirectiveKind::Org    => ".org",
            DirectiveKind::Def    => ".def",
            DirectiveKind::Fill   => ".fill",
            DirectiveKind::Cstr   => ".cstr",
            DirectiveKind::Ralias => ".ralias",
        }
    }

    /// The number of operands this directive takes.
    pub fn arity(self) -> Arity {
        match self {
            DirectiveKind::Org | DirectiveKind::Def => Arity::Exact(1),
            DirectiveKind::Fill | DirectiveKind::Cstr => Arity::AtLeastOne,
            DirectiveKind::Ralias => Arity::Exact(2),
        }
    }
}

/// Any mnemonic that can begin an assembly statement.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Mnemonic {
    /// A real machine instruction.
    Real(Opcode),
    /// A pseudo-instruction.
    Pseudo(Pseudo),
    /// An assembler directive.
    Directive(DirectiveKind),
}
impl Mnemonic {
    /// Looks up a mnemonic by name (case-insensitive).
    ///
    /// Directives are written with their leading dot.
    /// `.halt` is accepted as a spelling of `halt`.
    ///
    /// ```
    /// use anna_ensemble::ast::isa::{Mnemonic, Opcode, Pseudo, DirectiveKind};
    ///
    /// assert_eq!(Mnemonic::lookup("addi"), Some(Mnemonic::Real(Opcode::Addi)));
    /// assert_eq!(Mnemonic::lookup("LWI"), Some(Mnemonic::Pseudo(Pseudo::Lwi)));
    /// assert_eq!(Mnemonic::lookup(".halt"), Some(Mnemonic::Pseudo(Pseudo::Halt)));
    /// assert_eq!(Mnemonic::lookup(".fill"), Some(Mnemonic::Directive(DirectiveKind::Fill)));
    /// assert_eq!(Mnemonic::lookup("fill"), None);
    /// ```
    pub fn lookup(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case(".halt") {
            return Some(Mnemonic::Pseudo(Pseudo::Halt));
        }

        if name.starts_with('.') {
            DirectiveKind::ALL.into_iter()
                .find(|d| d.name().eq_ignore_ascii_case(name))
                .map(Mnemonic::Directive)
        } else {
            Opcode::from_name(name).map(Mnemonic::Real)
                .or_else(|| {
                    Pseudo::ALL.into_iter()
                        .find(|p| p.name().eq_ignore_ascii_case(name))
                        .map(Mnemonic::Pseudo)
                })
        }
    }

    /// The canonical spelling of this mnemonic.
    pub fn name(self) -> &'static str {
        match self {
            Mnemonic::Real(op)      => op.name(),
            Mnemonic::Pseudo(p)     => p.name(),
            Mnemonic::Directive(d)  => d.name(),
        }
    }

    /// The number of operands this mnemonic takes.
    pub fn arity(self) -> Arity {
        match self {
            Mnemonic::Real(op)     => Arity::Exact(op.arity()),
            Mnemonic::Pseudo(p)    => Arity::Exact(p.arity()),
            Mnemonic::Directive(d) => d.arity(),
        }
    }

    /// The format of this mnemonic, if it is a real instruction or directive.
    pub fn format(self) -> Option<Format> {
        match self {
            Mnemonic::Real(op)     => Some(op.format()),
            Mnemonic::Pseudo(_)    => None,
            Mnemonic::Directive(_) => Some(Format::Directive),
        }
    }
}
impl std::fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
