//! Tokenizing ANNA assembly.
//!
//! This module holds the tokens that characterize ANNA assembly ([`Token`]).
//! This module is used by the parser to split a source line into discernable units,
//! and by [`Operand::parse`] to classify a single operand.
//!
//! The module's key data structure is the [`Token`] enum,
//! which lists all of the tokens of ANNA assembly.
//!
//! [`Operand::parse`]: crate::ast::Operand::parse

use std::num::IntErrorKind;

use logos::{Lexer, Logos};

/// A unit of information in ANNA source code.
#[derive(Debug, Logos, PartialEq, Eq, Clone)]
#[logos(skip r"[ \t\r]+", error = LexErr)]
pub enum Token {
    // Note, these regexes span over tokens that are technically invalid
    // (e.g., 23trst matches for unsigned even though it shouldn't).
    // This is intended.
    // These regexes collect what would be considered one discernable unit
    // and validates it using the validator function.

    /// An unsigned numeric value (e.g., `9`, `0x7F`, `0b101`)
    #[regex(r"\d\w*", lex_unsigned)]
    Unsigned(u16),

    /// A signed numeric value (e.g., `-9`, `-0x7F`, `-0b101`)
    #[regex(r"-\w*", lex_signed)]
    Signed(i16),

    /// A register value (i.e., `r0`-`r7`)
    #[regex(r"[Rr]\d+", lex_reg)]
    Reg(u8),

    /// A label reference (e.g., `&loop`).
    #[regex(r"&[A-Za-z_]\w*", |lx| lx.slice()[1..].to_string())]
    Label(String),

    /// An identifier.
    ///
    /// This can refer to either:
    /// - a label definition (e.g., `loop` in `loop:`)
    /// - a mnemonic (e.g. `add`, `lwi`, `halt`)
    /// - a register alias installed by `.ralias` (e.g., `sp`)
    #[regex(r"[A-Za-z_]\w*", |lx| lx.slice().to_string())]
    Ident(String),

    /// A directive (e.g., `.org`, `.fill`).
    ///
    /// The stored name excludes the leading dot.
    #[regex(r"\.[A-Za-z_]\w*", |lx| lx.slice()[1..].to_string())]
    Directive(String),

    /// A string literal (e.g., `"Hello!"`)
    #[token(r#"""#, lex_str_literal)]
    String(String),

    /// A colon, which ends a label definition
    #[token(":")]
    Colon,

    /// A comma, which can optionally delineate operands of an instruction
    #[token(",")]
    Comma,

    /// A comment, which starts with `#` and spans the remaining part of the line.
    ///
    /// The stored text excludes the `#` and surrounding whitespace.
    #[regex(r"#.*", |lx| lx.slice()[1..].trim().to_string())]
    Comment(String),
}

/// Any errors raised in attempting to tokenize an input stream.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, thiserror::Error)]
pub enum LexErr {
    /// Numeric literal (unsigned dec, hex, and bin) cannot fit within the range of a u16
    #[error("numeric token does not fit 16-bit unsigned integer")]
    DoesNotFitU16,
    /// Numeric literal (signed) cannot fit within the range of a i16
    #[error("numeric token does not fit 16-bit signed integer")]
    DoesNotFitI16,
    /// Hex literal (starting with 0x) has invalid hex digits
    #[error("invalid hex literal")]
    InvalidHex,
    /// Binary literal (starting with 0b) has invalid binary digits
    #[error("invalid binary literal")]
    InvalidBin,
    /// Numeric literal could not be parsed as a decimal literal because it has invalid digits (i.e., not 0-9)
    #[error("invalid decimal literal")]
    InvalidNumeric,
    /// Prefixed literal (0x or 0b) doesn't have digits after it.
    #[error("missing digits after radix prefix")]
    InvalidRadixEmpty,
    /// Numeric literal could not be parsed because there are no digits in it (it's just `-`)
    #[error("invalid decimal literal")]
    InvalidDecEmpty,
    /// Int parsing failed but the reason why is unknown
    #[error("could not parse integer")]
    UnknownIntErr,
    /// String literal is missing an end quotation mark.
    #[error("unclosed string literal")]
    UnclosedStrLit,
    /// String literal is too long to be placed in memory.
    #[error("string literal is too large")]
    StrLitTooBig,
    /// Token had the format r\d, but \d isn't 0-7.
    #[error("invalid register")]
    InvalidReg,
    /// A symbol was used which is not allowed in ANNA assembly files
    #[default]
    #[error("unrecognized symbol")]
    InvalidSymbol
}
impl crate::err::Error for LexErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            LexErr::DoesNotFitU16     => Some(format!("the range for a 16-bit unsigned integer is [{}, {}]", u16::MIN, u16::MAX).into()),
            LexErr::DoesNotFitI16     => Some(format!("the range for a 16-bit signed integer is [{}, {}]", i16::MIN, i16::MAX).into()),
            LexErr::InvalidHex        => Some("a hex literal starts with '0x' and consists of 0-9, A-F".into()),
            LexErr::InvalidBin        => Some("a binary literal starts with '0b' and consists of 0 and 1".into()),
            LexErr::InvalidNumeric    => Some("a decimal literal only consists of digits 0-9".into()),
            LexErr::InvalidRadixEmpty => Some("there should be digits after the radix prefix".into()),
            LexErr::InvalidDecEmpty   => Some("there should be digits (0-9) here".into()),
            LexErr::UnknownIntErr     => None,
            LexErr::UnclosedStrLit    => Some("add a quote to the end of the string literal".into()),
            LexErr::StrLitTooBig      => Some(format!("string literals are limited to at most {} characters", u16::MAX - 1).into()),
            LexErr::InvalidReg        => Some("this must be r0-r7".into()),
            LexErr::InvalidSymbol     => Some("this char does not occur in any token in ANNA assembly".into()),
        }
    }
}
/// Helper that converts an int error kind to its corresponding LexErr, based on the provided inputs.
fn convert_int_error(
    e: &std::num::IntErrorKind,
    invalid_digits_err: LexErr,
    empty_err: LexErr,
    overflow_err: LexErr,
) -> LexErr {
    match e {
        IntErrorKind::Empty        => empty_err,
        IntErrorKind::InvalidDigit => invalid_digits_err,
        IntErrorKind::PosOverflow  => overflow_err,
        IntErrorKind::NegOverflow  => overflow_err,
        _ => LexErr::UnknownIntErr,
    }
}

/// Parses the magnitude of a numeric literal (with no sign),
/// selecting the radix from its prefix.
fn parse_magnitude(digits: &str, overflow_err: LexErr) -> Result<u32, LexErr> {
    let (digits, radix, invalid_err, empty_err) = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        (hex, 16, LexErr::InvalidHex, LexErr::InvalidRadixEmpty)
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        (bin, 2, LexErr::InvalidBin, LexErr::InvalidRadixEmpty)
    } else {
        (digits, 10, LexErr::InvalidNumeric, LexErr::InvalidDecEmpty)
    };

    // u32 leaves room for i16::MIN's magnitude
    u32::from_str_radix(digits, radix)
        .map_err(|e| convert_int_error(e.kind(), invalid_err, empty_err, overflow_err))
}
fn lex_unsigned(lx: &Lexer<'_, Token>) -> Result<u16, LexErr> {
    let mag = parse_magnitude(lx.slice(), LexErr::DoesNotFitU16)?;
    u16::try_from(mag).map_err(|_| LexErr::DoesNotFitU16)
}
fn lex_signed(lx: &Lexer<'_, Token>) -> Result<i16, LexErr> {
    let Some(digits) = lx.slice().strip_prefix('-') else {
        unreachable!("Lexer slice should have started with -");
    };

    let mag = parse_magnitude(digits, LexErr::DoesNotFitI16)?;
    i16::try_from(-i64::from(mag)).map_err(|_| LexErr::DoesNotFitI16)
}
fn lex_reg(lx: &Lexer<'_, Token>) -> Result<u8, LexErr> {
    lx.slice()[1..].parse::<u8>().ok()
        .filter(|&r| r < 8)
        .ok_or(LexErr::InvalidReg)
}
fn lex_str_literal(lx: &mut Lexer<'_, Token>) -> Result<String, LexErr> {
    let rem = lx.remainder()
        .lines()
        .next()
        .unwrap_or("");

    // calculate the length of the string literal ignoring the quotes
    // consume tokens up to the end of the literal and including the unescaped quote
    let mlen = rem.match_indices('"')
        .map(|(n, _)| n)
        .find(|&n| n == 0 || !is_escaped(&rem[..n]));

    match mlen {
        Some(len) => lx.bump(len + 1),
        None => {
            lx.bump(rem.len());
            return Err(LexErr::UnclosedStrLit);
        }
    }

    // get the string inside quotes:
    let mut remaining = &lx.slice()[1..(lx.slice().len() - 1)];
    let mut buf = String::with_capacity(remaining.len());

    // Look for escapes. Only a simple group of escapes are implemented.
    while let Some((left, right)) = remaining.split_once('\\') {
        buf.push_str(left);

        let mut chars = right.chars();
        match chars.next() {
            Some('n')  => buf.push('\n'),
            Some('r')  => buf.push('\r'),
            Some('t')  => buf.push('\t'),
            Some('\\') => buf.push('\\'),
            Some('0')  => buf.push('\0'),
            Some('"')  => buf.push('\"'),
            Some(c) => {
                buf.push('\\');
                buf.push(c);
            }
            None => buf.push('\\'),
        }

        remaining = chars.as_str();
    }
    buf.push_str(remaining);

    match buf.chars().count() < usize::from(u16::MAX) {
        true  => Ok(buf),
        false => Err(LexErr::StrLitTooBig),
    }
}
/// Whether a quote placed after this prefix would be escaped
/// (i.e., the prefix ends in an odd number of backslashes).
fn is_escaped(prefix: &str) -> bool {
    prefix.bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 1
}

#[cfg(test)]
mod tests {
    use logos::Logos;

    use crate::err::LexErr;
    use crate::parse::lex::Token;

    fn ident(s: &str) -> Token {
        Token::Ident(s.to_string())
    }
    fn label(s: &str) -> Token {
        Token::Label(s.to_string())
    }
    fn directive(s: &str) -> Token {
        Token::Directive(s.to_string())
    }
    fn str_literal(s: &str) -> Token {
        Token::String(s.to_string())
    }

    #[test]
    fn test_numeric_dec_success() {
        // Basic
        let mut tokens = Token::lexer("0 123 456 789");
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(123))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(456))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(789))));
        assert_eq!(tokens.next(), None);

        // Negative
        let mut tokens = Token::lexer("-123 -456 -789 -0");
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-123))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-456))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-789))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(0))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_numeric_radix_success() {
        let mut tokens = Token::lexer("0x2110 0xABCD 0X2110 0xabcd 0xA 0b101 0B1111 -0x10 -0b11");
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0x2110))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0xABCD))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0x2110))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0xABCD))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0xA))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0b101))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0b1111))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-0x10))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-0b11))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_numeric_overflow() {
        let mut tokens = Token::lexer("32767 32768 -1 -32768 65535 0xFFFF -0x8000");
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(32767))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(32768))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-1))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-32768))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(65535))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0xFFFF))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-0x8000))));
        assert_eq!(tokens.next(), None);

        assert_eq!(Token::lexer("65536").next(), Some(Err(LexErr::DoesNotFitU16)));
        assert_eq!(Token::lexer("999999999999999999999999999999").next(), Some(Err(LexErr::DoesNotFitU16)));
        assert_eq!(Token::lexer("0x10000").next(), Some(Err(LexErr::DoesNotFitU16)));
        assert_eq!(Token::lexer("-32769").next(), Some(Err(LexErr::DoesNotFitI16)));
        assert_eq!(Token::lexer("-0x8001").next(), Some(Err(LexErr::DoesNotFitI16)));
    }

    #[test]
    fn test_numeric_invalid() {
        assert_eq!(Token::lexer("3Q").next(), Some(Err(LexErr::InvalidNumeric)));
        assert_eq!(Token::lexer("-").next(), Some(Err(LexErr::InvalidDecEmpty)));
        assert_eq!(Token::lexer("0x").next(), Some(Err(LexErr::InvalidRadixEmpty)));
        assert_eq!(Token::lexer("0b").next(), Some(Err(LexErr::InvalidRadixEmpty)));
        assert_eq!(Token::lexer("0xQ1").next(), Some(Err(LexErr::InvalidHex)));
        assert_eq!(Token::lexer("0b102").next(), Some(Err(LexErr::InvalidBin)));
        assert_eq!(Token::lexer("-abc").next(), Some(Err(LexErr::InvalidNumeric)));
    }

    #[test]
    fn test_regs() {
        let mut tokens = Token::lexer("r0 r1 r2 r3 R4 R5 R6 R7");
        for i in 0..8 {
            assert_eq!(tokens.next(), Some(Ok(Token::Reg(i))));
        }
        assert_eq!(tokens.next(), None);

        assert_eq!(Token::lexer("r8").next(), Some(Err(LexErr::InvalidReg)));
        assert_eq!(Token::lexer("R10").next(), Some(Err(LexErr::InvalidReg)));
        assert_eq!(Token::lexer("r99999999").next(), Some(Err(LexErr::InvalidReg)));

        // not registers:
        assert_eq!(Token::lexer("r").next(), Some(Ok(ident("r"))));
        assert_eq!(Token::lexer("r1x").next(), Some(Ok(ident("r1x"))));
    }

    #[test]
    fn test_labels_idents() {
        let mut tokens = Token::lexer("&loop &_end2 add sp Fib_1");
        assert_eq!(tokens.next(), Some(Ok(label("loop"))));
        assert_eq!(tokens.next(), Some(Ok(label("_end2"))));
        assert_eq!(tokens.next(), Some(Ok(ident("add"))));
        assert_eq!(tokens.next(), Some(Ok(ident("sp"))));
        assert_eq!(tokens.next(), Some(Ok(ident("Fib_1"))));
        assert_eq!(tokens.next(), None);

        assert_eq!(Token::lexer("&").next(), Some(Err(LexErr::InvalidSymbol)));
    }

    #[test]
    fn test_str() {
        let mut tokens = Token::lexer(r#" " " "abc" "" "!@#$%^&*()" "#);
        assert_eq!(tokens.next(), Some(Ok(str_literal(" "))));
        assert_eq!(tokens.next(), Some(Ok(str_literal("abc"))));
        assert_eq!(tokens.next(), Some(Ok(str_literal(""))));
        assert_eq!(tokens.next(), Some(Ok(str_literal("!@#$%^&*()"))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_str_escape() {
        let mut tokens = Token::lexer(r#" "\n" "\t" "\\" "\"" "\0" "\e" "a\\" "#);
        assert_eq!(tokens.next(), Some(Ok(str_literal("\n"))));
        assert_eq!(tokens.next(), Some(Ok(str_literal("\t"))));
        assert_eq!(tokens.next(), Some(Ok(str_literal("\\"))));
        assert_eq!(tokens.next(), Some(Ok(str_literal("\""))));
        assert_eq!(tokens.next(), Some(Ok(str_literal("\0"))));
        assert_eq!(tokens.next(), Some(Ok(str_literal("\\e"))));
        assert_eq!(tokens.next(), Some(Ok(str_literal("a\\"))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_str_unclosed() {
        assert_eq!(Token::lexer(r#"""#).next(), Some(Err(LexErr::UnclosedStrLit)));
        assert_eq!(Token::lexer(r#""abc\""#).next(), Some(Err(LexErr::UnclosedStrLit)));
    }

    #[test]
    fn test_directive() {
        let mut tokens = Token::lexer(".fill .org .cstr ._");
        assert_eq!(tokens.next(), Some(Ok(directive("fill"))));
        assert_eq!(tokens.next(), Some(Ok(directive("org"))));
        assert_eq!(tokens.next(), Some(Ok(directive("cstr"))));
        assert_eq!(tokens.next(), Some(Ok(directive("_"))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_punct() {
        let mut tokens = Token::lexer("loop: add r1,r2 r3 #  sum it ");
        assert_eq!(tokens.next(), Some(Ok(ident("loop"))));
        assert_eq!(tokens.next(), Some(Ok(Token::Colon)));
        assert_eq!(tokens.next(), Some(Ok(ident("add"))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(1))));
        assert_eq!(tokens.next(), Some(Ok(Token::Comma)));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(2))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(3))));
        assert_eq!(tokens.next(), Some(Ok(Token::Comment("sum it".to_string()))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_invalid_symbol() {
        for c in ['$', '%', '(', ')', '*', '+', ';', '<', '=', '>', '?', '@', '[', ']', '^', '{', '}', '|', '~', '\0'] {
            let string = c.to_string();
            assert_eq!(
                Token::lexer(&string).next(),
                Some(Err(LexErr::InvalidSymbol)),
                "Expected {string:?} to be an invalid symbol"
            );
        }
    }
}
