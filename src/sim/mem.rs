//! Memory handling for the ANNA simulator.
//!
//! This module consists of:
//! - [`Word`]: A 16-bit data value.
//! - [`MachineCell`]: A memory location (a word plus its breakpoint bit).
//! - [`MemArray`]: The memory.
//! - [`RegFile`]: The register file.
//! - [`MemFill`]: The strategy used to fill fresh memory.

use rand::rngs::StdRng;
use rand::Rng;

use crate::ast::Reg;

/// The default (and maximum) number of cells in memory.
pub const MEM_LEN: usize = 1 << 16;

/// A 16-bit data word.
///
/// Arithmetic on words is always modulo 2<sup>16</sup>.
/// The word can be read as either an unsigned or a two's complement signed value,
/// but the conversion must be explicit ([`Word::as_unsigned`], [`Word::as_signed`]).
///
/// ```
/// use anna_ensemble::sim::mem::Word;
///
/// let w = Word::from(-1i16);
/// assert_eq!(w.as_unsigned(), 0xFFFF);
/// assert_eq!(w.as_signed(), -1);
/// assert_eq!((w + Word::new(2)).as_unsigned(), 1);
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default)]
pub struct Word(u16);

impl Word {
    /// Creates a word from its unsigned representation.
    pub const fn new(data: u16) -> Self {
        Self(data)
    }
    /// Reads the word as an unsigned integer.
    pub const fn as_unsigned(self) -> u16 {
        self.0
    }
    /// Reads the word as a two's complement signed integer.
    pub const fn as_signed(self) -> i16 {
        self.0 as i16
    }
}
impl From<u16> for Word {
    fn from(value: u16) -> Self {
        Word(value)
    }
}
impl From<i16> for Word {
    fn from(value: i16) -> Self {
        Word(value as u16)
    }
}
impl std::fmt::Display for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

impl std::ops::Not for Word {
    type Output = Word;

    fn not(self) -> Self::Output {
        Word(!self.0)
    }
}
impl std::ops::Add for Word {
    type Output = Word;

    /// Adds two words together (wrapping if overflow occurs).
    fn add(self, rhs: Self) -> Self::Output {
        Word(self.0.wrapping_add(rhs.0))
    }
}
impl std::ops::AddAssign for Word {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}
impl std::ops::AddAssign<i16> for Word {
    /// Increments the word by the provided value (wrapping if overflow occurs).
    fn add_assign(&mut self, rhs: i16) {
        *self = *self + Word::from(rhs);
    }
}
impl std::ops::Sub for Word {
    type Output = Word;

    /// Subtracts two words (wrapping if overflow occurs).
    fn sub(self, rhs: Self) -> Self::Output {
        Word(self.0.wrapping_sub(rhs.0))
    }
}
impl std::ops::BitAnd for Word {
    type Output = Word;

    fn bitand(self, rhs: Self) -> Self::Output {
        Word(self.0 & rhs.0)
    }
}
impl std::ops::BitOr for Word {
    type Output = Word;

    fn bitor(self, rhs: Self) -> Self::Output {
        Word(self.0 | rhs.0)
    }
}

/// A memory location.
///
/// This is a 32-bit cell holding 16 bits of data and an out-of-band breakpoint bit.
/// Setting or clearing the breakpoint never changes the data and vice versa.
///
/// ```
/// use anna_ensemble::sim::mem::{MachineCell, Word};
///
/// let mut cell = MachineCell::new(0x1234);
/// cell.set_breakpoint(true);
/// assert_eq!(cell.data().as_unsigned(), 0x1234);
///
/// cell.set_data(Word::new(0xFFFF));
/// assert!(cell.breakpoint());
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default)]
pub struct MachineCell(u32);

const DATA_MASK: u32 = 0xFFFF;
const BREAK_BIT: u32 = 1 << 16;

impl MachineCell {
    /// Creates a cell holding the given data (with no breakpoint).
    pub const fn new(data: u16) -> Self {
        Self(data as u32)
    }
    /// The data held in this cell.
    pub fn data(self) -> Word {
        Word((self.0 & DATA_MASK) as u16)
    }
    /// Replaces the data in this cell, keeping its breakpoint bit.
    pub fn set_data(&mut self, data: Word) {
        self.0 = (self.0 & !DATA_MASK) | u32::from(data.as_unsigned());
    }
    /// Whether a breakpoint is set on this cell.
    pub fn breakpoint(self) -> bool {
        self.0 & BREAK_BIT != 0
    }
    /// Sets or clears the breakpoint bit, keeping the data.
    pub fn set_breakpoint(&mut self, on: bool) {
        match on {
            true  => self.0 |= BREAK_BIT,
            false => self.0 &= !BREAK_BIT,
        }
    }
}

/// Trait that describes types that can be used to create the data of fresh memory.
pub trait WordFiller {
    /// Generate the data.
    fn generate(&mut self) -> u16;
}
impl WordFiller for () {
    /// This creates unseeded, non-deterministic values.
    fn generate(&mut self) -> u16 {
        rand::random()
    }
}
impl WordFiller for u16 {
    /// Sets each word to the given value.
    fn generate(&mut self) -> u16 {
        *self
    }
}
impl WordFiller for StdRng {
    /// This creates values from the standard random number generator.
    ///
    /// This can be used to create deterministic, seeded values.
    fn generate(&mut self) -> u16 {
        self.gen()
    }
}

/// Strategy used to fill the memory of the [`Cpu`] when it is created or reset.
///
/// Programs should not rely on the contents of memory they have not written,
/// so a non-zero strategy can be used to shake out bugs in student code.
///
/// [`Cpu`]: super::Cpu
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum MemFill {
    /// Initializes each word to zero.
    #[default]
    Zeroed,

    /// Initializes each word to a known value.
    Known {
        /// The value to initialize each word to.
        value: u16
    },

    /// Initializes each word randomly and deterministically.
    Seeded {
        /// The seed the RNG was initialized with.
        seed: u64
    },

    /// Initializes each word randomly and non-deterministically.
    Unseeded,
}
impl MemFill {
    pub(super) fn generator(&self) -> impl WordFiller {
        use rand::SeedableRng;

        match *self {
            MemFill::Zeroed => FillGenerator::Known(0),
            MemFill::Known { value } => FillGenerator::Known(value),
            MemFill::Seeded { seed } => FillGenerator::Seeded(Box::new(StdRng::seed_from_u64(seed))),
            MemFill::Unseeded => FillGenerator::Unseeded,
        }
    }
}

enum FillGenerator {
    Unseeded,
    Seeded(Box<StdRng>),
    Known(u16)
}
impl WordFiller for FillGenerator {
    fn generate(&mut self) -> u16 {
        match self {
            FillGenerator::Unseeded  => ().generate(),
            FillGenerator::Seeded(r) => r.generate(),
            FillGenerator::Known(k)  => k.generate(),
        }
    }
}

/// The memory.
///
/// This is a fixed-size array of [`MachineCell`]s.
/// All addresses are taken modulo the length of the memory,
/// so any `u16` address is valid.
///
/// ```
/// use anna_ensemble::sim::mem::{MemArray, Word};
///
/// let mut mem = MemArray::new(16, &mut 0u16);
/// mem.write(0x11, Word::new(0xBEEF));
/// assert_eq!(mem.read(0x01).as_unsigned(), 0xBEEF);
/// ```
#[derive(Debug, Clone)]
pub struct MemArray(Box<[MachineCell]>);

impl MemArray {
    /// Creates a new memory with `len` cells, filling each with the provided filler.
    ///
    /// The length is clamped to 1..=65536 cells.
    pub fn new(len: usize, filler: &mut impl WordFiller) -> Self {
        let len = len.clamp(1, MEM_LEN);
        Self((0..len).map(|_| MachineCell::new(filler.generate())).collect())
    }

    /// The number of cells in this memory.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this memory has no cells (never true, as memory has at least one cell).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Wraps an address to a valid index.
    pub fn wrap(&self, addr: u16) -> usize {
        usize::from(addr) % self.0.len()
    }

    /// Reads the data at the address.
    pub fn read(&self, addr: u16) -> Word {
        self.cell(addr).data()
    }

    /// Writes data to the address, keeping the cell's breakpoint.
    pub fn write(&mut self, addr: u16, data: Word) {
        self.cell_mut(addr).set_data(data);
    }

    /// Accesses the cell at the address.
    pub fn cell(&self, addr: u16) -> &MachineCell {
        &self.0[self.wrap(addr)]
    }

    /// Accesses the cell at the address mutably.
    pub fn cell_mut(&mut self, addr: u16) -> &mut MachineCell {
        let i = self.wrap(addr);
        &mut self.0[i]
    }

    /// Iterates over every cell of memory, with their addresses.
    pub fn cells(&self) -> impl Iterator<Item = (u16, &MachineCell)> + '_ {
        // len <= 65536, so every index fits in a u16
        self.0.iter().enumerate().map(|(i, c)| (i as u16, c))
    }

    /// Copies a contiguous block of data into memory, starting at `start`.
    ///
    /// The block wraps around the end of memory.
    pub fn copy_block(&mut self, start: u16, data: &[u16]) {
        for (i, &word) in data.iter().enumerate() {
            // i < 65536
            self.write(start.wrapping_add(i as u16), Word::new(word));
        }
    }
}

/// The register file.
///
/// This struct can be indexed with a [`Reg`]
/// (which can be constructed using the [`crate::ast::reg_consts`] module or via [`Reg::try_from`]).
///
/// Register `r0` always reads zero. Writes to it are discarded.
///
/// # Example
///
/// ```
/// use anna_ensemble::sim::mem::RegFile;
/// use anna_ensemble::ast::reg_consts::{R0, R1};
///
/// let mut reg = RegFile::new();
/// reg.set(R1, 11u16.into());
/// reg.set(R0, 11u16.into());
/// assert_eq!(reg[R1].as_unsigned(), 11);
/// assert_eq!(reg[R0].as_unsigned(), 0);
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct RegFile([Word; 8]);
impl RegFile {
    /// Creates a register file with every register zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a register.
    pub fn get(&self, reg: Reg) -> Word {
        self.0[usize::from(reg)]
    }

    /// Writes a register. Writes to `r0` are discarded.
    pub fn set(&mut self, reg: Reg, data: Word) {
        if reg.reg_no() != 0 {
            self.0[usize::from(reg)] = data;
        }
    }

    /// Iterates over all of the registers' values.
    pub fn iter(&self) -> impl Iterator<Item = Word> + '_ {
        self.0.iter().copied()
    }
}
impl std::ops::Index<Reg> for RegFile {
    type Output = Word;

    fn index(&self, index: Reg) -> &Self::Output {
        &self.0[usize::from(index)]
    }
}
