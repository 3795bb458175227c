//! This module is used for holding simulation instructions ([`SimInstr`]),
//! which are instructions that directly map to bytecode.
//!
//! A [`SimInstr`] is a typed view over a machine word.
//! Its fields can only be read if they exist in the instruction's format
//! (see [`Format`] for the layout of each format).

use super::isa::{Format, Opcode};
use super::{Imm6, Imm8, Reg};

/// The machine word of `out r0`, which the simulator treats as a halt.
pub const HALT_WORD: u16 = 0xF000;

/// A machine instruction.
///
/// This can be created with one of the format constructors ([`SimInstr::new_r`], [`SimInstr::new_imm6`], [`SimInstr::new_imm8`]),
/// or by decoding a word with [`SimInstr::decode`].
///
/// ```
/// use anna_ensemble::ast::sim::SimInstr;
/// use anna_ensemble::ast::isa::{Opcode, MathFunc};
/// use anna_ensemble::ast::reg_consts::{R1, R2, R3};
///
/// let add = SimInstr::new_r(Opcode::Math(MathFunc::Add), R1, R2, R3);
/// let word = add.encode();
/// assert_eq!(word, 0x0298);
///
/// let decoded = SimInstr::decode(word).unwrap();
/// assert_eq!(decoded, add);
/// assert_eq!(decoded.rs2(), Ok(R3));
/// assert!(decoded.imm8().is_err());
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct SimInstr {
    op: Opcode,
    word: u16
}

const OP_SHIFT: u16 = 12;
const RD_SHIFT: u16 = 9;
const RS1_SHIFT: u16 = 6;
const RS2_SHIFT: u16 = 3;

/// Gets the bits of `n` within the range specified.
fn get_bits(n: u16, range: std::ops::Range<u16>) -> u16 {
    let len = range.end - range.start;
    (n >> range.start) & ((1 << len) - 1)
}

impl SimInstr {
    /// Creates an R-format instruction.
    ///
    /// Unused register fields (e.g., `rs2` of `not`) should be [`R0`](crate::ast::reg_consts::R0).
    pub fn new_r(op: Opcode, rd: Reg, rs1: Reg, rs2: Reg) -> Self {
        debug_assert_eq!(op.format(), Format::R, "{op} is not an R-format instruction");
        let word = (op.code() << OP_SHIFT)
            | (u16::from(rd.0) << RD_SHIFT)
            | (u16::from(rs1.0) << RS1_SHIFT)
            | (u16::from(rs2.0) << RS2_SHIFT)
            | op.subfunc().unwrap_or(0);

        Self { op, word }
    }

    /// Creates an Imm6-format instruction.
    pub fn new_imm6(op: Opcode, rd: Reg, rs1: Reg, imm: Imm6) -> Self {
        debug_assert_eq!(op.format(), Format::Imm6, "{op} is not an Imm6-format instruction");
        let word = (op.code() << OP_SHIFT)
            | (u16::from(rd.0) << RD_SHIFT)
            | (u16::from(rs1.0) << RS1_SHIFT)
            | imm.bits();

        Self { op, word }
    }

    /// Creates an Imm8-format instruction.
    pub fn new_imm8(op: Opcode, rd: Reg, imm: Imm8) -> Self {
        debug_assert_eq!(op.format(), Format::Imm8, "{op} is not an Imm8-format instruction");
        let word = (op.code() << OP_SHIFT)
            | (u16::from(rd.0) << RD_SHIFT)
            | imm.bits();

        Self { op, word }
    }

    /// Decodes a machine word into an instruction.
    ///
    /// This fails if the opcode (and sub-function, where shared) has no definition.
    pub fn decode(word: u16) -> Result<Self, InvalidOpcode> {
        let op = Opcode::from_bits(get_bits(word, 12..16), get_bits(word, 0..3))
            .ok_or(InvalidOpcode(word))?;

        Ok(Self { op, word })
    }

    /// Encodes this instruction into a machine word.
    pub fn encode(self) -> u16 {
        self.word
    }

    /// The instruction's opcode.
    pub fn opcode(self) -> Opcode {
        self.op
    }

    /// The instruction's format.
    pub fn format(self) -> Format {
        self.op.format()
    }

    /// Whether this instruction is the halt sentinel (`out r0`).
    pub fn is_halt(self) -> bool {
        self.word == HALT_WORD
    }

    fn check(self, field: &'static str, formats: &[Format]) -> Result<(), FieldAccessErr> {
        match formats.contains(&self.format()) {
            true  => Ok(()),
            false => Err(FieldAccessErr { field, format: self.format(), word: self.word }),
        }
    }

    /// The `rd` field (bits 11-9). Present in every format.
    pub fn rd(self) -> Reg {
        Reg::from_bits(self.word >> RD_SHIFT)
    }
    /// The `rs1` field (bits 8-6) of R and Imm6 instructions.
    pub fn rs1(self) -> Result<Reg, FieldAccessErr> {
        self.check("rs1", &[Format::R, Format::Imm6])?;
        Ok(Reg::from_bits(self.word >> RS1_SHIFT))
    }
    /// The `rs2` field (bits 5-3) of R instructions.
    pub fn rs2(self) -> Result<Reg, FieldAccessErr> {
        self.check("rs2", &[Format::R])?;
        Ok(Reg::from_bits(self.word >> RS2_SHIFT))
    }
    /// The sub-function field (bits 2-0) of R instructions.
    pub fn subfunc(self) -> Result<u16, FieldAccessErr> {
        self.check("subfunc", &[Format::R])?;
        Ok(get_bits(self.word, 0..3))
    }
    /// The sign-extended `imm6` field (bits 5-0) of Imm6 instructions.
    pub fn imm6(self) -> Result<Imm6, FieldAccessErr> {
        self.check("imm6", &[Format::Imm6])?;
        Ok(Imm6::new_trunc(get_bits(self.word, 0..6) as i16))
    }
    /// The sign-extended `imm8` field (bits 7-0) of Imm8 instructions.
    pub fn imm8(self) -> Result<Imm8, FieldAccessErr> {
        self.check("imm8", &[Format::Imm8])?;
        Ok(Imm8::new_trunc(get_bits(self.word, 0..8) as i16))
    }
}
impl std::fmt::Display for SimInstr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use super::isa::MathFunc;

        let rs1 = Reg::from_bits(self.word >> RS1_SHIFT);
        let rs2 = Reg::from_bits(self.word >> RS2_SHIFT);
        match self.op {
            Opcode::Math(MathFunc::Not) => write!(f, "{} {}, {}", self.op, self.rd(), rs1),
            Opcode::Math(_)  => write!(f, "{} {}, {}, {}", self.op, self.rd(), rs1, rs2),
            Opcode::Jalr     => write!(f, "{} {}, {}", self.op, self.rd(), rs1),
            Opcode::In | Opcode::Out(_) => write!(f, "{} {}", self.op, self.rd()),
            Opcode::Addi | Opcode::Shf | Opcode::Lw | Opcode::Sw => {
                let imm = Imm6::new_trunc(get_bits(self.word, 0..6) as i16);
                write!(f, "{} {}, {}, {}", self.op, self.rd(), rs1, imm)
            },
            Opcode::Lli | Opcode::Lui | Opcode::Branch(_) => {
                let imm = Imm8::new_trunc(get_bits(self.word, 0..8) as i16);
                write!(f, "{} {}, {}", self.op, self.rd(), imm)
            },
        }
    }
}

/// A word was decoded that has no matching instruction definition.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, thiserror::Error)]
#[error("invalid opcode in word 0x{0:04X}")]
pub struct InvalidOpcode(pub u16);
impl crate::err::Error for InvalidOpcode {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        Some("the output opcode (0xF) only defines sub-functions 0-2".into())
    }
}

/// A field was read from an instruction whose format does not have it.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, thiserror::Error)]
#[error("instruction 0x{word:04X} has no {field} field ({format} format)")]
pub struct FieldAccessErr {
    /// The field that was read.
    pub field: &'static str,
    /// The format of the instruction.
    pub format: Format,
    /// The instruction word.
    pub word: u16,
}
impl crate::err::Error for FieldAccessErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        let fields = match self.format {
            Format::R => "rd, rs1, rs2, subfunc",
            Format::Imm6 => "rd, rs1, imm6",
            Format::Imm8 => "rd, imm8",
            Format::Directive => "none",
        };
        Some(format!("{} instructions have the fields: {fields}", self.format).into())
    }
}
