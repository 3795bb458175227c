//! Formatters which can read and write memory images into disk.
//!
//! The [`ImageFormat`] trait describes an implementation of reading/writing memory images into disk.
//! This module provides two implementations of the trait:
//! - [`MemFormat`]: The `.mem` text format, which holds only the written words
//! - [`BinaryFormat`]: A binary representation of the memory image, which also holds the symbol table

use std::borrow::Cow;
use std::fmt::Write;

use super::{MemImage, SymbolTable};
use crate::sim::mem::MEM_LEN;

/// A trait defining memory image formats.
pub trait ImageFormat {
    /// Representation of the serialized format.
    ///
    /// For binary formats, `[u8]` should be used.
    /// For text-based formats,`str` should be used.
    type Stream: ToOwned + ?Sized;
    /// Serializes into the stream format.
    fn serialize(o: &MemImage) -> <Self::Stream as ToOwned>::Owned;
    /// Deserializes from the stream format.
    fn deserialize(i: &Self::Stream) -> Result<MemImage, MemFormatErr>;
}

/// Errors from reading a memory image.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum MemFormatErr {
    /// A word was not 1-4 hex digits.
    #[error("line {line}: invalid word `{token}`")]
    InvalidWord {
        /// The line (1-indexed) of the word.
        line: usize,
        /// The offending text.
        token: String,
    },
    /// An origin line (`:XXXX`) was not 1-4 hex digits.
    #[error("line {line}: invalid origin `{token}`")]
    InvalidOrigin {
        /// The line (1-indexed) of the origin.
        line: usize,
        /// The offending text.
        token: String,
    },
    /// A word was written past the end of memory.
    #[error("line {line}: words continue past the end of memory")]
    TooLarge {
        /// The line (1-indexed) of the word.
        line: usize,
    },
    /// An address was written more than once.
    #[error("address 0x{0:04X} was written more than once")]
    Overlap(u16),
    /// The binary image did not start with the expected magic number and version.
    #[error("missing or unsupported image header")]
    BadHeader,
    /// The binary image ended in the middle of a block.
    #[error("image ended unexpectedly")]
    Truncated,
    /// The binary image held a block of an unknown kind.
    #[error("unknown block kind 0x{0:02X}")]
    UnknownBlock(u8),
}
impl crate::err::Error for MemFormatErr {
    fn line(&self) -> Option<usize> {
        match self {
            MemFormatErr::InvalidWord { line, .. }
            | MemFormatErr::InvalidOrigin { line, .. }
            | MemFormatErr::TooLarge { line } => Some(*line),
            _ => None,
        }
    }

    fn help(&self) -> Option<Cow<str>> {
        match self {
            MemFormatErr::InvalidWord { .. }   => Some("words are written as hex without a prefix (e.g., F000)".into()),
            MemFormatErr::InvalidOrigin { .. } => Some("origins are written as `:` followed by a hex address (e.g., :0100)".into()),
            MemFormatErr::TooLarge { .. }      => Some("the last address of memory is FFFF".into()),
            MemFormatErr::Overlap(_)           => None,
            MemFormatErr::BadHeader            => Some("this file may not be a binary memory image".into()),
            MemFormatErr::Truncated            => Some("this file may have been cut off".into()),
            MemFormatErr::UnknownBlock(_)      => None,
        }
    }
}

fn insert(image: &mut MemImage, addr: u16, word: u16) -> Result<(), MemFormatErr> {
    match image.insert(addr, word) {
        Some(_) => Err(MemFormatErr::Overlap(addr)),
        None => Ok(()),
    }
}

// TEXT!
/// The `.mem` text format.
///
/// Each contiguous block of words starts with an origin line (`:` and the block's address),
/// followed by lines of up to 8 space-separated words. All numbers are 4 hex digits.
/// Blank lines and `#` comments are ignored.
/// Words before any origin line start at address 0.
///
/// This format does not hold the symbol table.
///
/// # Example
/// ```
/// use anna_ensemble::asm::encoding::{ImageFormat, MemFormat};
///
/// let image = MemFormat::deserialize("
/// ## program
/// :0000
/// 7205 F000
/// :0010
/// 0001
/// ").unwrap();
///
/// assert_eq!(image.get(0x0001), Some(0xF000));
/// assert_eq!(image.get(0x0010), Some(0x0001));
/// assert_eq!(MemFormat::serialize(&image), ":0000\n7205 F000\n:0010\n0001\n");
/// ```
pub struct MemFormat;

const MFMT_WORDS_PER_LINE: usize = 8;

impl ImageFormat for MemFormat {
    type Stream = str;

    fn serialize(o: &MemImage) -> <Self::Stream as ToOwned>::Owned {
        let mut out = String::new();
        for (start, block) in o.block_iter() {
            let _ = writeln!(out, ":{start:04X}");
            for chunk in block.chunks(MFMT_WORDS_PER_LINE) {
                let line: Vec<_> = chunk.iter().map(|w| format!("{w:04X}")).collect();
                let _ = writeln!(out, "{}", line.join(" "));
            }
        }
        out
    }

    fn deserialize(string: &Self::Stream) -> Result<MemImage, MemFormatErr> {
        let mut image = MemImage::new(MEM_LEN);
        let mut cursor = 0u32;

        for (i, line) in string.lines().enumerate() {
            let line_no = i + 1;
            let content = match line.split_once('#') {
                Some((content, _)) => content,
                None => line,
            }.trim();

            if content.is_empty() { continue; }
            if let Some(origin) = content.strip_prefix(':') {
                cursor = hex2u16(origin.trim())
                    .ok_or_else(|| MemFormatErr::InvalidOrigin { line: line_no, token: content.to_string() })?
                    .into();
                continue;
            }

            for token in content.split_whitespace() {
                let word = hex2u16(token)
                    .ok_or_else(|| MemFormatErr::InvalidWord { line: line_no, token: token.to_string() })?;
                let addr = u16::try_from(cursor).map_err(|_| MemFormatErr::TooLarge { line: line_no })?;
                insert(&mut image, addr, word)?;
                cursor += 1;
            }
        }

        Ok(image)
    }
}

fn hex2u16(s: &str) -> Option<u16> {
    match (1..=4).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_hexdigit()) {
        true  => u16::from_str_radix(s, 16).ok(),
        false => None,
    }
}

// BINARY!
/// A binary format of memory image data.
///
/// Unlike [`MemFormat`], this keeps the symbol table and the memory length.
pub struct BinaryFormat;

const BFMT_MAGIC: &[u8] = b"anna\x21\x10";
const BFMT_VER: &[u8] = b"\x00\x01";
impl ImageFormat for BinaryFormat {
    type Stream = [u8];

    fn serialize(o: &MemImage) -> <Self::Stream as ToOwned>::Owned {
        // Image specification:
        //
        // The image consists of a header and an arbitrary number of data blocks.
        //
        // The header consists of:
        // - The magic number (b"anna\x21\x10")
        // - The version (2 bytes)
        // - The memory length (4 bytes)
        //
        // Data is divided into discrete chunks, which start with one of:
        // - 0x00: word block
        // - 0x01: label symbol table entry
        //
        // Block 0x00 consists of:
        // - the identifier byte 0x00 (1 byte)
        // - address where block starts (2 bytes)
        // - length of the block (2 bytes)
        // - the array of words (2n bytes)
        //
        // Block 0x01 consists of:
        // - the identifier byte 0x01 (1 byte)
        // - address of the label (2 bytes)
        // - the length of the label's name (8 bytes)
        // - the label (n bytes)
        //
        // All numbers are little-endian.

        let mut bytes = BFMT_MAGIC.to_vec();
        bytes.extend_from_slice(BFMT_VER);
        // mem_len <= 65536, so this fits
        bytes.extend(u32::to_le_bytes(o.mem_len() as u32));

        for (start, block) in o.block_iter() {
            // A block has at most 65536 words, so it is split to keep its length within 2 bytes.
            for (i, chunk) in block.chunks(usize::from(u16::MAX)).enumerate() {
                bytes.push(0x00);
                bytes.extend(u16::to_le_bytes(start.wrapping_add((i * usize::from(u16::MAX)) as u16)));
                bytes.extend(u16::to_le_bytes(chunk.len() as u16));
                for &word in chunk {
                    bytes.extend(u16::to_le_bytes(word));
                }
            }
        }

        for (label, addr) in o.symbol_table().label_iter() {
            bytes.push(0x01);
            bytes.extend(u16::to_le_bytes(addr));
            bytes.extend(u64::to_le_bytes(label.len() as u64));
            bytes.extend_from_slice(label.as_bytes());
        }

        bytes
    }

    fn deserialize(mut vec: &Self::Stream) -> Result<MemImage, MemFormatErr> {
        vec = vec.strip_prefix(BFMT_MAGIC)
            .and_then(|v| v.strip_prefix(BFMT_VER))
            .ok_or(MemFormatErr::BadHeader)?;

        let mem_len = u32::from_le_bytes(take::<4>(&mut vec)?);
        let mut image = MemImage::new(mem_len as usize);
        let mut sym = SymbolTable::default();

        while let Some((&ident_byte, rest)) = vec.split_first() {
            vec = rest;
            match ident_byte {
                0x00 => {
                    let start    = u16::from_le_bytes(take::<2>(&mut vec)?);
                    let data_len = u16::from_le_bytes(take::<2>(&mut vec)?);
                    let data     = take_slice(&mut vec, 2 * usize::from(data_len))?;

                    for (i, chunk) in data.chunks_exact(2).enumerate() {
                        let word = u16::from_le_bytes([chunk[0], chunk[1]]);
                        insert(&mut image, start.wrapping_add(i as u16), word)?;
                    }
                },
                0x01 => {
                    let addr    = u16::from_le_bytes(take::<2>(&mut vec)?);
                    let str_len = u64::from_le_bytes(take::<8>(&mut vec)?);
                    let str_len = usize::try_from(str_len).map_err(|_| MemFormatErr::Truncated)?;
                    let label   = std::str::from_utf8(take_slice(&mut vec, str_len)?)
                        .map_err(|_| MemFormatErr::BadHeader)?;

                    sym.insert(label, addr).map_err(|_| MemFormatErr::BadHeader)?;
                },
                b => return Err(MemFormatErr::UnknownBlock(b)),
            }
        }

        image.sym = sym;
        Ok(image)
    }
}

fn take<const N: usize>(data: &mut &[u8]) -> Result<[u8; N], MemFormatErr> {
    take_slice(data, N)
        .and_then(|slice| <[_; N]>::try_from(slice).map_err(|_| MemFormatErr::Truncated))
}
fn take_slice<'a>(data: &mut &'a [u8], n: usize) -> Result<&'a [u8], MemFormatErr> {
    if n > data.len() { return Err(MemFormatErr::Truncated); }
    let (left, right) = data.split_at(n);
    *data = right;
    Ok(left)
}

#[cfg(test)]
mod tests {
    use super::{BinaryFormat, ImageFormat, MemFormat, MemFormatErr};
    use crate::asm::{assemble, AsmFlags, Assembler, MemImage};
    use crate::parse::parse_source;

    fn assemble_src(src: &str) -> MemImage {
        let mut nodes = parse_source(src).unwrap();
        assemble(&mut nodes).unwrap()
    }

    const PROGRAM: &str = "
        in r1
        lwi r2, &msg
        outs r2
        outn r1
        halt
        msg: .cstr \"hello, world\"
        .org 0x8000
        table: .fill 1 2 3
    ";

    #[test]
    fn test_mem_roundtrip() {
        let image = assemble_src(PROGRAM);

        let ser = MemFormat::serialize(&image);
        assert!(ser.starts_with(":0000\n2200 7406 8400 F401 F202 F000 0068 0065\n"));
        assert!(ser.contains(":8000\n0001 0002 0003\n"));

        let de = MemFormat::deserialize(&ser).unwrap();
        assert!(de.addr_iter().eq(image.addr_iter()));
        assert!(de.symbol_table().is_empty());
    }

    #[test]
    fn test_mem_parse() {
        let image = MemFormat::deserialize("0001 0002\n\n# a comment\n:00ff # origin\nabcd\n:4\nF").unwrap();
        assert_eq!(image.addr_iter().collect::<Vec<_>>(), [(0, 1), (1, 2), (4, 0xF), (0xFF, 0xABCD)]);

        // CRLF
        let image = MemFormat::deserialize(":0010\r\n1234 5678\r\n").unwrap();
        assert_eq!(image.get(0x11), Some(0x5678));
    }

    #[test]
    fn test_mem_errors() {
        assert_eq!(
            MemFormat::deserialize(":0000\n12G4"),
            Err(MemFormatErr::InvalidWord { line: 2, token: "12G4".into() })
        );
        assert_eq!(
            MemFormat::deserialize("0x12"),
            Err(MemFormatErr::InvalidWord { line: 1, token: "0x12".into() })
        );
        assert_eq!(
            MemFormat::deserialize("\n:12345"),
            Err(MemFormatErr::InvalidOrigin { line: 2, token: ":12345".into() })
        );
        assert_eq!(
            MemFormat::deserialize(":FFFF\n0000 0000"),
            Err(MemFormatErr::TooLarge { line: 2 })
        );
        assert_eq!(
            MemFormat::deserialize("0000\n:0000\n0000"),
            Err(MemFormatErr::Overlap(0))
        );
    }

    #[test]
    fn test_binary_roundtrip() {
        let image = assemble_src(PROGRAM);
        let ser = BinaryFormat::serialize(&image);
        let de = BinaryFormat::deserialize(&ser).unwrap();
        assert_eq!(de, image);
        assert_eq!(de.symbol_table().lookup_label("table"), Some(0x8000));

        // memory length is kept
        let mut nodes = parse_source("halt").unwrap();
        let small = Assembler::new(AsmFlags { mem_len: 256 }).assemble(&mut nodes).unwrap();
        let de = BinaryFormat::deserialize(&BinaryFormat::serialize(&small)).unwrap();
        assert_eq!(de.mem_len(), 256);
    }

    #[test]
    fn test_binary_errors() {
        let image = assemble_src(PROGRAM);
        let ser = BinaryFormat::serialize(&image);

        assert_eq!(BinaryFormat::deserialize(b"obj!"), Err(MemFormatErr::BadHeader));
        assert_eq!(BinaryFormat::deserialize(&ser[..ser.len() - 1]), Err(MemFormatErr::Truncated));

        let mut bad = ser.clone();
        bad.push(0x07);
        assert_eq!(BinaryFormat::deserialize(&bad), Err(MemFormatErr::UnknownBlock(0x07)));
    }
}
