//! Components relating to the representations
//! used for ANNA assembly and machine instructions.
//!
//! These components together are used to construct...
//! - [`asm::SourceNode`] (a data structure holding an assembly source code statement and its trivia),
//! - [`isa::Opcode`] and [`isa::Mnemonic`] (the static table of the instruction set),
//! - and [`sim::SimInstr`] (a data structure holding a machine instruction).

pub mod asm;
pub mod isa;
pub mod sim;

use std::borrow::Cow;
use std::fmt::Write as _;
use std::num::TryFromIntError;

use logos::Logos;
use offset_base::OffsetBacking;

use crate::parse::lex::{LexErr, Token};

/// A register. Must be between 0 and 7.
///
/// This `Reg` struct can either be constructed by selecting a register from [`reg_consts`],
/// or by using [`Reg::try_from`].
///
/// Register 0 is hardwired to zero in the simulator (see [`crate::sim::mem::RegFile`]).
///
/// ## Examples
///
/// ```text
/// add r1, r2, r3
///     ~~  ~~  ~~
/// addi r4, r4, -1
///      ~~  ~~
/// beq r0, &loop
///     ~~
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub struct Reg(pub(crate) u8);

/// Register constants!
pub mod reg_consts {
    use super::Reg;

    /// The 0th register in the register file (always reads zero).
    pub const R0: Reg = Reg(0);
    /// The 1st register in the register file.
    pub const R1: Reg = Reg(1);
    /// The 2nd register in the register file.
    pub const R2: Reg = Reg(2);
    /// The 3rd register in the register file.
    pub const R3: Reg = Reg(3);
    /// The 4th register in the register file.
    pub const R4: Reg = Reg(4);
    /// The 5th register in the register file.
    pub const R5: Reg = Reg(5);
    /// The 6th register in the register file.
    pub const R6: Reg = Reg(6);
    /// The 7th register in the register file.
    pub const R7: Reg = Reg(7);
}
impl Reg {
    /// Gets the register number of this [`Reg`]. This is always between 0 and 7.
    pub fn reg_no(self) -> u8 {
        self.0
    }

    /// Creates a register from the low 3 bits of a value.
    pub(crate) fn from_bits(bits: u16) -> Self {
        Reg((bits & 0b111) as u8)
    }
}
impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // padding should have no effect here
        write!(f, "r{}", self.0)
    }
}
impl From<Reg> for usize {
    // Used for indexing the reg file in [`crate::sim::mem::RegFile`].
    fn from(value: Reg) -> Self {
        usize::from(value.0)
    }
}
impl TryFrom<u8> for Reg {
    type Error = TryFromIntError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0..=7 => Ok(Reg(value)),
            // HACKy, but there's no other way to create this error
            _     => u8::try_from(256).map(|_| unreachable!("should've been TryFromIntError")),
        }
    }
}

/// A value representing a signed offset or a signed immediate value.
///
/// `N` indicates the maximum bit size of this offset/immediate value.
pub type IOffset<const N: u32> = Offset<i16, N>;
/// The signed 6-bit immediate of the Imm6 format (`addi`, `shf`, `lw`, `sw`).
///
/// ## Examples
///
/// ```text
/// addi r1, r1, -1
///              ~~
/// lw r2, r6, 3
///            ~
/// ```
pub type Imm6 = IOffset<6>;
/// The signed 8-bit immediate of the Imm8 format (`lli`, `lui`, branches).
///
/// ## Examples
///
/// ```text
/// lli r1, 0x34
///         ~~~~
/// bne r2, -4
///         ~~
/// ```
pub type Imm8 = IOffset<8>;

/// A value representing an offset or an immediate value.
///
/// The `OFF` type represents the backing type of this offset.
/// The signedness of this offset type is dependent on the signedness of the `OFF` type:
/// - `Offset<i16, _>`: signed offset (also aliased as [`IOffset`])
/// - `Offset<u16, _>`: unsigned offset
///
/// `N` indicates the maximum bit size of this offset/immediate value.
///
/// ## Examples
///
/// - `Offset<i16, 6>` is used to represent the imm6 operand. See [`Imm6`].
/// - `Offset<i16, 8>` is used to represent the imm8 operand. See [`Imm8`].
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Offset<OFF, const N: u32>(OFF);

impl<OFF: std::fmt::Display, const N: u32> std::fmt::Display for Offset<OFF, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
impl<OFF: std::fmt::Binary, const N: u32> std::fmt::Binary for Offset<OFF, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("0b")?;
        self.0.fmt(f)
    }
}
impl<OFF: std::fmt::LowerHex, const N: u32> std::fmt::LowerHex for Offset<OFF, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("0x")?;
        self.0.fmt(f)
    }
}
impl<OFF: std::fmt::UpperHex, const N: u32> std::fmt::UpperHex for Offset<OFF, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("0x")?;
        self.0.fmt(f)
    }
}

/// The errors that can result from calling [`Offset::new`].
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, thiserror::Error)]
pub enum OffsetNewErr {
    /// The provided offset cannot fit an unsigned integer of the given bitsize.
    #[error("value is too big for unsigned {0}-bit integer")]
    CannotFitUnsigned(u32),
    /// The provided offset cannot fit a signed integer of the given bitsize.
    #[error("value is too big for signed {0}-bit integer")]
    CannotFitSigned(u32)
}
impl crate::err::Error for OffsetNewErr {
    fn help(&self) -> Option<Cow<str>> {
        let error = match self {
            OffsetNewErr::CannotFitUnsigned(n) => Cow::from(format!("the range for an unsigned {n}-bit integer is [0, {}]", (1u32 << n) - 1)),
            OffsetNewErr::CannotFitSigned(n) => Cow::from(format!("the range for a signed {n}-bit integer is [{}, {}]", (-1i32) << (n - 1), (1i32 << (n - 1)) - 1)),
        };

        Some(error)
    }
}

mod offset_base {
    use super::OffsetNewErr;

    /// Any type that could store a value for [`Offset`].
    ///
    /// [`Offset`]: super::Offset
    pub trait OffsetBacking: Copy + Eq {
        /// How many bits are contained within this backing.
        ///
        /// For example, `u16` has 16 bits and thus BITS == 16.
        const BITS: u32;

        /// Truncates the given value to the provided `bit_size`.
        ///
        /// This bit size is always known to be less than BITS.
        fn truncate(self, bit_size: u32) -> Self;

        /// The error to raise if a given value doesn't match
        /// its provided value when truncated to a given `bit_size`.
        fn does_not_fit_error(bit_size: u32) -> OffsetNewErr;
    }

    macro_rules! impl_offset_backing_for_ints {
        ($($Int:ty: $Err:ident),*) => {
            $(
                impl OffsetBacking for $Int {
                    const BITS: u32 = Self::BITS;

                    fn truncate(self, bit_size: u32) -> Self {
                        (self << (Self::BITS - bit_size)) >> (Self::BITS - bit_size)
                    }

                    fn does_not_fit_error(bit_size: u32) -> OffsetNewErr {
                        OffsetNewErr::$Err(bit_size)
                    }
                }
            )*
        }
    }
    impl_offset_backing_for_ints! {
        u16: CannotFitUnsigned,
        i16: CannotFitSigned
    }
}

impl<OFF: OffsetBacking, const N: u32> Offset<OFF, N> {
    /// Creates a new offset value.
    /// This must fit within `N` bits of the representation, otherwise an error is raised.
    ///
    /// # Examples
    ///
    /// ```
    /// # use anna_ensemble::ast::{Imm6, Offset};
    /// #
    /// // Signed:
    /// assert!(Imm6::new(-32).is_ok());
    /// assert!(Imm6::new(31).is_ok());
    /// assert!(Imm6::new(32).is_err());
    /// assert!(Imm6::new(-33).is_err());
    ///
    /// // Unsigned:
    /// assert!(Offset::<u16, 8>::new(255).is_ok());
    /// assert!(Offset::<u16, 8>::new(256).is_err());
    /// ```
    ///
    /// # Panics
    ///
    /// This will panic if `N` is larger than the offset backing (e.g., for backing `u16`, larger than 16).
    ///
    /// ```should_panic
    /// # use anna_ensemble::ast::Offset;
    /// #
    /// let oh_no = Offset::<i16, 17>::new(18);
    /// ```
    pub fn new(n: OFF) -> Result<Self, OffsetNewErr> {
        assert!(N <= OFF::BITS, "bit size {N} exceeds size of backing ({})", OFF::BITS);
        match n == n.truncate(N) {
            true  => Ok(Offset(n)),
            false => Err(OFF::does_not_fit_error(N)),
        }
    }

    /// Creates a new offset by extending the first N bits of the integer,
    /// and discarding the rest.
    ///
    /// The extension is considered sign-extended if the offset's backing is signed,
    /// and zero-extended if the offset's backing is unsigned.
    ///
    /// This is how a machine word's immediate field is read back.
    ///
    /// # Examples
    ///
    /// ```
    /// # use anna_ensemble::ast::{Imm6, Imm8};
    /// #
    /// assert_eq!(Imm6::new_trunc(0b111111).get(), -1);
    /// assert_eq!(Imm6::new_trunc(0b011111).get(), 31);
    /// assert_eq!(Imm6::new_trunc(0b100000).get(), -32);
    /// assert_eq!(Imm8::new_trunc(0xEF).get(), -17);
    /// assert_eq!(Imm8::new_trunc(0x7F).get(), 127);
    /// ```
    ///
    /// # Panics
    ///
    /// This will panic if `N` is larger than the offset backing (e.g., for backing `u16`, larger than 16).
    ///
    /// ```should_panic
    /// # use anna_ensemble::ast::Offset;
    /// #
    /// let oh_no = Offset::<i16, 17>::new_trunc(18);
    /// ```
    pub fn new_trunc(n: OFF) -> Self {
        assert!(N <= OFF::BITS, "bit size {N} exceeds size of backing ({})", OFF::BITS);
        Self(n.truncate(N))
    }

    /// Gets the value of the offset.
    pub fn get(&self) -> OFF {
        self.0
    }
}
impl<const N: u32> Offset<i16, N> {
    /// The bits of this offset, as they would appear in the low `N` bits of a machine word.
    pub fn bits(&self) -> u16 {
        (self.0 as u16) & ((1u32 << N) - 1) as u16
    }
}

/// An operand of an assembly statement.
///
/// Operands are parsed from their source text with [`Operand::parse`].
/// The text grammar is:
/// - a leading `&` marks a label (`&loop`),
/// - `r` followed by a digit 0-7 marks a register (`r3`),
/// - a leading `"` marks a string literal (`"hi\n"`),
/// - otherwise the text is a number, in decimal (`12`), hex (`0x1F`), or binary (`0b101`),
///   optionally negated (`-12`, `-0x1F`).
///
/// The accessors ([`Operand::as_register`], [`Operand::as_int`], ...) never
/// reinterpret an operand. Using one against the wrong kind of operand is an error.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum Operand {
    /// A negated numeric literal (e.g., `-3`, `-0x10`).
    SignedInt(i16),
    /// A numeric literal with no sign (e.g., `3`, `0x10`, `0b11`).
    UnsignedInt(u16),
    /// A register (e.g., `r1`).
    Register(Reg),
    /// A label reference (e.g., `&loop`), holding the label's name.
    Label(String),
    /// A string literal, holding its unescaped contents.
    String(String),
}
impl Operand {
    /// Parses an operand from its source text.
    ///
    /// This never consults a symbol table; labels are only resolved by the assembler.
    ///
    /// # Examples
    ///
    /// ```
    /// use anna_ensemble::ast::Operand;
    /// use anna_ensemble::ast::reg_consts::R3;
    ///
    /// assert_eq!(Operand::parse("r3"), Ok(Operand::Register(R3)));
    /// assert_eq!(Operand::parse("0x1F"), Ok(Operand::UnsignedInt(0x1F)));
    /// assert_eq!(Operand::parse("-0b11"), Ok(Operand::SignedInt(-3)));
    /// assert_eq!(Operand::parse("&loop"), Ok(Operand::Label("loop".to_string())));
    /// assert!(Operand::parse("r9").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self, OperandErr> {
        let mut tokens = Token::lexer(text);
        let token = match tokens.next() {
            Some(Ok(t))  => t,
            Some(Err(kind)) => return Err(OperandErr::Lex { token: text.trim().to_string(), kind }),
            None => return Err(OperandErr::Empty),
        };
        if tokens.next().is_some() {
            return Err(OperandErr::NotAnOperand(text.trim().to_string()));
        }

        match token {
            Token::Unsigned(n) => Ok(Operand::UnsignedInt(n)),
            Token::Signed(n)   => Ok(Operand::SignedInt(n)),
            Token::Reg(r)      => Ok(Operand::Register(Reg(r))),
            Token::Label(l)    => Ok(Operand::Label(l)),
            Token::String(s)   => Ok(Operand::String(s)),
            _ => Err(OperandErr::NotAnOperand(text.trim().to_string())),
        }
    }

    /// A short name for the kind of this operand (used in error messages).
    pub fn kind_name(&self) -> &'static str {
        match self {
            Operand::SignedInt(_)   => "signed integer",
            Operand::UnsignedInt(_) => "unsigned integer",
            Operand::Register(_)    => "register",
            Operand::Label(_)       => "label",
            Operand::String(_)      => "string",
        }
    }

    fn mismatch(&self, expected: &'static str) -> OperandErr {
        OperandErr::TypeMismatch { expected, found: self.clone() }
    }

    /// Gets the register of a register operand.
    pub fn as_register(&self) -> Result<Reg, OperandErr> {
        match self {
            &Operand::Register(r) => Ok(r),
            _ => Err(self.mismatch("register")),
        }
    }
    /// Gets the value of a signed (negated) integer operand.
    pub fn as_signed(&self) -> Result<i16, OperandErr> {
        match self {
            &Operand::SignedInt(n) => Ok(n),
            _ => Err(self.mismatch("signed integer")),
        }
    }
    /// Gets the value of an unsigned integer operand.
    pub fn as_unsigned(&self) -> Result<u16, OperandErr> {
        match self {
            &Operand::UnsignedInt(n) => Ok(n),
            _ => Err(self.mismatch("unsigned integer")),
        }
    }
    /// Gets the value of either kind of integer operand.
    ///
    /// The result is in the range `[-32768, 65535]`.
    pub fn as_int(&self) -> Result<i32, OperandErr> {
        match self {
            &Operand::SignedInt(n)   => Ok(i32::from(n)),
            &Operand::UnsignedInt(n) => Ok(i32::from(n)),
            _ => Err(self.mismatch("integer")),
        }
    }
    /// Gets the name of a label operand.
    pub fn as_label(&self) -> Result<&str, OperandErr> {
        match self {
            Operand::Label(l) => Ok(l),
            _ => Err(self.mismatch("label")),
        }
    }
    /// Gets the contents of a string operand.
    pub fn as_str(&self) -> Result<&str, OperandErr> {
        match self {
            Operand::String(s) => Ok(s),
            _ => Err(self.mismatch("string")),
        }
    }
}
impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::SignedInt(n)   => n.fmt(f),
            Operand::UnsignedInt(n) => n.fmt(f),
            Operand::Register(r)    => r.fmt(f),
            Operand::Label(l)       => write!(f, "&{l}"),
            Operand::String(s)      => {
                f.write_char('"')?;
                for c in s.chars() {
                    match c {
                        '\n' => f.write_str("\\n")?,
                        '\r' => f.write_str("\\r")?,
                        '\t' => f.write_str("\\t")?,
                        '\\' => f.write_str("\\\\")?,
                        '\0' => f.write_str("\\0")?,
                        '"'  => f.write_str("\\\"")?,
                        c    => f.write_char(c)?,
                    }
                }
                f.write_char('"')
            },
        }
    }
}

/// The errors that can result from parsing or accessing an [`Operand`].
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum OperandErr {
    /// The operand text could not be tokenized.
    #[error("invalid operand `{token}`: {kind}")]
    Lex {
        /// The offending text.
        token: String,
        /// The cause.
        kind: LexErr
    },
    /// There was no operand text.
    #[error("missing operand")]
    Empty,
    /// The text is a valid token, but not one that can be an operand.
    #[error("`{0}` is not an operand")]
    NotAnOperand(String),
    /// An accessor was used against the wrong kind of operand.
    #[error("expected {expected} operand, found `{found}`")]
    TypeMismatch {
        /// The kind of operand the accessor reads.
        expected: &'static str,
        /// The operand that was accessed.
        found: Operand
    },
}
impl crate::err::Error for OperandErr {
    fn help(&self) -> Option<Cow<str>> {
        use crate::err::Error;

        match self {
            OperandErr::Lex { kind, .. } => kind.help(),
            OperandErr::Empty => None,
            OperandErr::NotAnOperand(_) => Some("label references start with '&' and registers are r0-r7".into()),
            OperandErr::TypeMismatch { expected, found } => Some(format!("this operand is a {}, but a {expected} is needed here", found.kind_name()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::reg_consts::{R0, R7};
    use super::{Imm6, Imm8, Operand, OperandErr};
    use crate::parse::lex::LexErr;

    #[test]
    fn test_operand_parse() {
        assert_eq!(Operand::parse("r0"), Ok(Operand::Register(R0)));
        assert_eq!(Operand::parse("R7"), Ok(Operand::Register(R7)));
        assert_eq!(Operand::parse("42"), Ok(Operand::UnsignedInt(42)));
        assert_eq!(Operand::parse(" -42 "), Ok(Operand::SignedInt(-42)));
        assert_eq!(Operand::parse("0XfF"), Ok(Operand::UnsignedInt(255)));
        assert_eq!(Operand::parse("0B1010"), Ok(Operand::UnsignedInt(10)));
        assert_eq!(Operand::parse("-0x8000"), Ok(Operand::SignedInt(i16::MIN)));
        assert_eq!(Operand::parse("&main"), Ok(Operand::Label("main".to_string())));
        assert_eq!(Operand::parse(r#""hi\n""#), Ok(Operand::String("hi\n".to_string())));
    }

    #[test]
    fn test_operand_parse_fail() {
        assert_eq!(Operand::parse("r8"), Err(OperandErr::Lex { token: "r8".to_string(), kind: LexErr::InvalidReg }));
        assert_eq!(Operand::parse("0xZZ"), Err(OperandErr::Lex { token: "0xZZ".to_string(), kind: LexErr::InvalidHex }));
        assert_eq!(Operand::parse(""), Err(OperandErr::Empty));
        assert_eq!(Operand::parse("loop"), Err(OperandErr::NotAnOperand("loop".to_string())));
        assert_eq!(Operand::parse("r1 r2"), Err(OperandErr::NotAnOperand("r1 r2".to_string())));
    }

    #[test]
    fn test_operand_accessors() {
        let reg = Operand::parse("r7").unwrap();
        assert_eq!(reg.as_register(), Ok(R7));
        assert!(matches!(reg.as_int(), Err(OperandErr::TypeMismatch { expected: "integer", .. })));
        assert!(reg.as_label().is_err());

        let neg = Operand::parse("-3").unwrap();
        assert_eq!(neg.as_signed(), Ok(-3));
        assert_eq!(neg.as_int(), Ok(-3));
        assert!(neg.as_unsigned().is_err());
        assert!(neg.as_register().is_err());

        let pos = Operand::parse("0xFFFF").unwrap();
        assert_eq!(pos.as_unsigned(), Ok(0xFFFF));
        assert_eq!(pos.as_int(), Ok(65535));
        assert!(pos.as_signed().is_err());

        let label = Operand::parse("&end").unwrap();
        assert_eq!(label.as_label(), Ok("end"));
        assert!(label.as_str().is_err());
    }

    #[test]
    fn test_operand_display_reparses() {
        for text in ["r3", "-7", "300", "&loop", r#""a \"quoted\"\tstring\n""#] {
            let op = Operand::parse(text).unwrap();
            assert_eq!(Operand::parse(&op.to_string()), Ok(op));
        }
    }

    #[test]
    fn test_immediate_ranges() {
        for n in -32..=31 {
            let imm = Imm6::new(n).unwrap();
            assert_eq!(Imm6::new_trunc(imm.bits() as i16).get(), n);
        }
        assert!(Imm6::new(32).is_err());
        assert!(Imm6::new(-33).is_err());

        for n in -128..=127 {
            let imm = Imm8::new(n).unwrap();
            assert_eq!(Imm8::new_trunc(imm.bits() as i16).get(), n);
        }
        assert!(Imm8::new(128).is_err());
        assert!(Imm8::new(-129).is_err());
    }
}
