//! Simulating and execution for ANNA machine code.
//!
//! This module is focused on executing fully assembled code (i.e., [`MemImage`]).
//!
//! This module consists of:
//! - [`Cpu`]: The struct that executes assembled code.
//! - [`mem`]: The module handling memory and the registers.
//! - [`io`]: The module handling the input queue and output sinks.
//! - [`observer`]: The module tracking what the last run changed.
//!
//! # Usage
//!
//! To run some code, create a `Cpu`, load an image into it, and run it with a cycle budget:
//!
//! ```
//! use anna_ensemble::parse::parse_source;
//! use anna_ensemble::asm::assemble;
//! use anna_ensemble::sim::{Cpu, StopReason};
//! use anna_ensemble::ast::reg_consts::R1;
//!
//! let mut nodes = parse_source("
//!     lli r1, 3
//!     addi r1, r1, 4
//!     halt
//! ").unwrap();
//! let image = assemble(&mut nodes).unwrap();
//!
//! let mut cpu = Cpu::new(Default::default());
//! cpu.load_image(&image);
//!
//! assert_eq!(cpu.step(), Ok(StopReason::CyclesExceeded));
//! assert_eq!(cpu.reg_file[R1].as_signed(), 3);
//! assert_eq!(cpu.run(100), Ok(StopReason::Halted));
//! assert_eq!(cpu.reg_file[R1].as_signed(), 7);
//! assert_eq!(cpu.cycles(), 2);
//! ```
//!
//! ## Flags
//!
//! The CPU is configured with [`SimFlags`]. For example, to run with a
//! smaller memory that is filled with random (but reproducible) garbage:
//!
//! ```
//! # use anna_ensemble::sim::{Cpu, SimFlags};
//! use anna_ensemble::sim::mem::MemFill;
//!
//! let cpu = Cpu::new(SimFlags { mem_len: 256, fill: MemFill::Seeded { seed: 2110 } });
//! assert_eq!(cpu.mem.len(), 256);
//! ```
//!
//! ## Execution
//!
//! [`Cpu::run`] executes at most `max_cycles` instructions and reports why it stopped ([`StopReason`]).
//! Each call resumes from wherever the last one stopped, so a program can be run
//! in slices, or instruction by instruction with [`Cpu::step`].
//!
//! A run pauses before executing an instruction at a breakpoint.
//! Running again executes that instruction (see [`Cpu::set_breakpoint`]).

pub mod mem;
pub mod io;
pub mod observer;
mod debug;

use std::collections::VecDeque;

use crate::asm::MemImage;
use crate::ast::isa::{MathFunc, Opcode, OutFunc};
use crate::ast::sim::{FieldAccessErr, InvalidOpcode, SimInstr};
use crate::ast::Reg;
use self::io::{NullOutput, Output, OutputSink};
use self::mem::{MemArray, MemFill, RegFile, Word, MEM_LEN};
use self::observer::{AccessSet, ChangeObserver};

/// Errors that can occur during execution.
///
/// Any of these stops the current run and leaves the CPU [halted](Status::Halted).
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum SimErr {
    /// `in` was executed with an empty input queue.
    #[error("input queue is empty")]
    InputExhausted,
    /// The word at the PC does not decode to an instruction.
    #[error(transparent)]
    InvalidOpcode(#[from] InvalidOpcode),
    /// An instruction read a field its format does not have.
    #[error(transparent)]
    FieldAccess(#[from] FieldAccessErr),
    /// `div` or `mod` was executed with a zero divisor.
    #[error("division by zero")]
    DivideByZero,
    /// The output sink could not accept output.
    #[error("output could not be delivered")]
    OutputClosed,
}
impl crate::err::Error for SimErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            SimErr::InputExhausted  => Some("provide more input values before running".into()),
            SimErr::InvalidOpcode(e) => crate::err::Error::help(e),
            SimErr::FieldAccess(e)   => crate::err::Error::help(e),
            SimErr::DivideByZero    => Some("check the divisor register before dividing".into()),
            SimErr::OutputClosed    => None,
        }
    }
}

/// The execution status of the CPU.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default)]
pub enum Status {
    /// The program halted, errored, or has not started.
    #[default]
    Halted,
    /// An instruction is being executed.
    Running,
    /// The run stopped at a breakpoint or ran out of cycles, and can be resumed.
    Paused,
}

/// Why a run stopped.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum StopReason {
    /// The program executed a halt.
    Halted,
    /// The PC reached an address with a breakpoint.
    Breakpoint,
    /// The cycle budget ran out.
    CyclesExceeded,
}

/// Configuration flags for [`Cpu`].
///
/// Read the field descriptions for more details.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SimFlags {
    /// The number of words of memory.
    ///
    /// This is clamped to `1..=65536`. Addresses and the PC wrap around this length.
    ///
    /// This is only applied when memory is created (in [`Cpu::new`] and [`Cpu::reinit_mem`]).
    pub mem_len: usize,

    /// How memory is filled when it is created.
    ///
    /// The default is [`MemFill::Zeroed`].
    pub fill: MemFill,
}
impl Default for SimFlags {
    fn default() -> Self {
        Self {
            mem_len: MEM_LEN,
            fill: MemFill::default(),
        }
    }
}

/// Executes ANNA machine code.
pub struct Cpu {
    /// The memory.
    ///
    /// Each cell also holds whether a breakpoint is set at that address.
    pub mem: MemArray,

    /// The register file.
    pub reg_file: RegFile,

    /// The program counter.
    pub pc: u16,

    /// Tracks the registers and memory changed by the last run.
    pub observer: ChangeObserver,

    /// Configuration settings for the CPU.
    pub flags: SimFlags,

    status: Status,
    last_stop: Option<StopReason>,
    /// The address of the breakpoint the CPU is paused on, if any.
    paused_at: Option<u16>,
    cycles: u64,
    input: VecDeque<Word>,
    output: Box<dyn OutputSink + Send>,
}
impl Cpu where Cpu: Send {}

impl Cpu {
    /// Creates a new CPU with the provided flags.
    ///
    /// Memory is filled according to [`SimFlags::fill`], the input queue is empty,
    /// and output is discarded until a sink is set with [`Cpu::set_output`].
    pub fn new(flags: SimFlags) -> Self {
        Self {
            mem: MemArray::new(flags.mem_len, &mut flags.fill.generator()),
            reg_file: RegFile::new(),
            pc: 0,
            observer: ChangeObserver::new(),
            flags,
            status: Status::Halted,
            last_stop: None,
            paused_at: None,
            cycles: 0,
            input: VecDeque::new(),
            output: Box::new(NullOutput),
        }
    }

    /// Sets where output from `out`, `outs`, and `outn` is sent.
    pub fn set_output(&mut self, sink: impl OutputSink + Send + 'static) {
        self.output = Box::new(sink);
    }

    /// Resets the CPU to run a program again, with a new input queue.
    ///
    /// This zeroes the registers, PC, and cycle count, and sets the status to halted.
    /// Memory (and its breakpoints) is left as is.
    pub fn reset(&mut self, inputs: impl IntoIterator<Item = Word>) {
        self.reg_file = RegFile::new();
        self.pc = 0;
        self.cycles = 0;
        self.status = Status::Halted;
        self.last_stop = None;
        self.paused_at = None;
        self.input = inputs.into_iter().collect();
        self.observer.clear();
        tracing::debug!(inputs = self.input.len(), "reset cpu");
    }

    /// Recreates memory from the current flags ([`SimFlags::mem_len`] and [`SimFlags::fill`]).
    ///
    /// This erases the loaded program and all breakpoints.
    pub fn reinit_mem(&mut self) {
        self.mem = MemArray::new(self.flags.mem_len, &mut self.flags.fill.generator());
    }

    /// Adds a value to the back of the input queue.
    pub fn push_input(&mut self, word: Word) {
        self.input.push_back(word);
    }

    /// The values left in the input queue, in the order `in` reads them.
    pub fn pending_input(&self) -> impl Iterator<Item = Word> + '_ {
        self.input.iter().copied()
    }

    /// Loads a memory image into memory.
    ///
    /// Addresses the image did not write are left untouched.
    pub fn load_image(&mut self, image: &MemImage) {
        if image.mem_len() > self.mem.len() {
            tracing::debug!(image_len = image.mem_len(), mem_len = self.mem.len(), "image is larger than memory, addresses will wrap");
        }
        for (start, block) in image.block_iter() {
            self.mem.copy_block(start, &block);
        }
        tracing::debug!(words = image.word_count(), "loaded image");
    }

    /// The current execution status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// The number of instructions executed since the last reset.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Why the last run stopped (or `None` if it errored or there was none since the last reset).
    pub fn last_stop(&self) -> Option<StopReason> {
        self.last_stop
    }

    /// Executes one instruction.
    ///
    /// This is `run(1)`, so it returns [`StopReason::CyclesExceeded`] if the instruction
    /// executed and did not halt.
    pub fn step(&mut self) -> Result<StopReason, SimErr> {
        self.run(1)
    }

    /// Executes at most `max_cycles` instructions.
    ///
    /// This stops early when the program halts or the PC reaches a breakpoint.
    /// If the CPU is paused at a breakpoint, the instruction at that breakpoint is executed
    /// (rather than stopping at it again).
    ///
    /// If an error occurs, the CPU is halted.
    pub fn run(&mut self, max_cycles: u64) -> Result<StopReason, SimErr> {
        self.observer.clear();
        tracing::debug!(pc = self.pc, max_cycles, "run start");

        let result = self.run_inner(max_cycles);
        match &result {
            Ok(stop) => {
                self.last_stop = Some(*stop);
                tracing::debug!(pc = self.pc, cycles = self.cycles, ?stop, "run stop");
            },
            Err(e) => {
                self.status = Status::Halted;
                self.last_stop = None;
                tracing::debug!(pc = self.pc, cycles = self.cycles, error = %e, "run error");
            },
        }
        result
    }

    fn run_inner(&mut self, max_cycles: u64) -> Result<StopReason, SimErr> {
        for _ in 0..max_cycles {
            // the pause is only forgotten once the instruction it paused on runs
            if self.mem.cell(self.pc).breakpoint() && self.paused_at != Some(self.pc) {
                self.status = Status::Paused;
                self.paused_at = Some(self.pc);
                return Ok(StopReason::Breakpoint);
            }
            self.paused_at = None;
            self.status = Status::Running;

            let instr = SimInstr::decode(self.mem.read(self.pc).as_unsigned())?;
            if instr.is_halt() {
                self.status = Status::Halted;
                return Ok(StopReason::Halted);
            }

            let before = self.reg_file.clone();
            tracing::trace!(pc = self.pc, "{instr}");
            let next = self.execute(instr)?;
            // mem.len() <= 65536, so this fits
            self.pc = self.mem.wrap(next) as u16;
            self.cycles += 1;
            self.observer.update_regs(&before, &self.reg_file);

            if self.status == Status::Halted {
                return Ok(StopReason::Halted);
            }
        }

        self.status = Status::Paused;
        Ok(StopReason::CyclesExceeded)
    }

    /// Executes an instruction and returns the next PC (before wrapping).
    fn execute(&mut self, instr: SimInstr) -> Result<u16, SimErr> {
        let next = self.pc.wrapping_add(1);
        let rd = instr.rd();

        match instr.opcode() {
            Opcode::Math(func) => {
                let a = self.reg_file[instr.rs1()?].as_signed();
                let b = self.reg_file[instr.rs2()?].as_signed();
                let result = match func {
                    MathFunc::Add => a.wrapping_add(b),
                    MathFunc::Sub => a.wrapping_sub(b),
                    MathFunc::And => a & b,
                    MathFunc::Or  => a | b,
                    MathFunc::Not => !a,
                    MathFunc::Mul => a.wrapping_mul(b),
                    MathFunc::Div if b == 0 => return Err(SimErr::DivideByZero),
                    MathFunc::Div => a.wrapping_div(b),
                    MathFunc::Mod if b == 0 => return Err(SimErr::DivideByZero),
                    MathFunc::Mod => a.wrapping_rem(b),
                };
                self.reg_file.set(rd, Word::from(result));
            },
            Opcode::Jalr => {
                // the target is read before linking, so `jalr r1, r1` jumps to the old r1
                let target = self.reg_file[rd].as_unsigned();
                self.reg_file.set(instr.rs1()?, Word::new(next));
                return Ok(target);
            },
            Opcode::In => {
                let word = self.input.pop_front().ok_or(SimErr::InputExhausted)?;
                self.reg_file.set(rd, word);
            },
            Opcode::Out(func) => {
                if rd.reg_no() == 0 {
                    self.status = Status::Halted;
                    return Ok(self.pc);
                }
                let value = self.reg_file[rd];
                let output = match func {
                    OutFunc::Out  => Output::Number(value.as_signed()),
                    OutFunc::Outn => Output::Line(value.as_signed()),
                    OutFunc::Outs => Output::Str(self.read_cstr(value.as_unsigned())),
                };
                if !self.output.emit(output) {
                    return Err(SimErr::OutputClosed);
                }
            },
            Opcode::Addi => {
                let mut value = self.reg_file[instr.rs1()?];
                value += instr.imm6()?.get();
                self.reg_file.set(rd, value);
            },
            Opcode::Shf => {
                let value = self.reg_file[instr.rs1()?];
                let amount = instr.imm6()?.get();
                let result = match amount > 0 {
                    true => value.as_unsigned().checked_shl(amount.unsigned_abs().into()).unwrap_or(0),
                    false => {
                        let v = value.as_signed();
                        v.checked_shr(amount.unsigned_abs().into()).unwrap_or(if v < 0 { -1 } else { 0 }) as u16
                    },
                };
                self.reg_file.set(rd, Word::new(result));
            },
            Opcode::Lw => {
                let addr = self.effective_addr(instr)?;
                self.observer.update_mem_accesses(addr, AccessSet::READ);
                let value = self.mem.read(addr);
                self.reg_file.set(rd, value);
            },
            Opcode::Sw => {
                let addr = self.effective_addr(instr)?;
                let value = self.reg_file[rd];
                let mut access = AccessSet::WRITTEN;
                if self.mem.read(addr) != value {
                    access |= AccessSet::MODIFIED;
                }
                self.observer.update_mem_accesses(addr, access);
                self.mem.write(addr, value);
            },
            Opcode::Lli => {
                self.reg_file.set(rd, Word::from(instr.imm8()?.get()));
            },
            Opcode::Lui => {
                let low = self.reg_file[rd].as_unsigned() & 0xFF;
                self.reg_file.set(rd, Word::new(low | (instr.imm8()?.bits() << 8)));
            },
            Opcode::Branch(cond) => {
                if cond.test(self.reg_file[rd].as_signed()) {
                    return Ok(next.wrapping_add_signed(instr.imm8()?.get()));
                }
            },
        }

        Ok(next)
    }

    /// The address `rs1 + imm6` (wrapped to memory) of a load or store.
    fn effective_addr(&self, instr: SimInstr) -> Result<u16, SimErr> {
        let base = self.reg_file[instr.rs1()?].as_unsigned();
        let addr = base.wrapping_add_signed(instr.imm6()?.get());
        Ok(self.mem.wrap(addr) as u16)
    }

    /// Reads the zero-terminated string starting at `addr`.
    ///
    /// Reading stops after one pass over memory if no terminator is found.
    fn read_cstr(&self, addr: u16) -> String {
        (0..self.mem.len())
            // i < 65536
            .map(|i| self.mem.read(addr.wrapping_add(i as u16)).as_unsigned())
            .take_while(|&w| w != 0)
            .map(|w| char::from_u32(w.into()).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }

    /// Reads a register (a shorthand for indexing [`Cpu::reg_file`]).
    pub fn reg(&self, reg: Reg) -> Word {
        self.reg_file[reg]
    }
}
impl Default for Cpu {
    fn default() -> Self {
        Self::new(Default::default())
    }
}
impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("pc", &self.pc)
            .field("reg_file", &self.reg_file)
            .field("status", &self.status)
            .field("last_stop", &self.last_stop)
            .field("cycles", &self.cycles)
            .field("input", &self.input)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::io::{BufferedOutput, ChannelOutput, Output};
    use super::mem::Word;
    use super::{Cpu, SimErr, SimFlags, Status, StopReason};
    use crate::asm::assemble;
    use crate::ast::reg_consts::{R0, R1, R2, R3, R4, R7};
    use crate::ast::sim::InvalidOpcode;
    use crate::parse::parse_source;

    fn load(src: &str) -> Cpu {
        let mut nodes = parse_source(src).unwrap();
        let image = assemble(&mut nodes).unwrap();
        let mut cpu = Cpu::default();
        cpu.load_image(&image);
        cpu
    }

    fn words(values: &[i16]) -> Vec<Word> {
        values.iter().map(|&v| Word::from(v)).collect()
    }

    const FIB: &str = "
            in r1               # n
            lli r2, 0           # a
            lli r3, 1           # b
    loop:   beq r1, &done
            add r4, r2, r3
            mov r2, r3
            mov r3, r4
            addi r1, r1, -1
            br &loop
    done:   out r2
            halt
    ";

    #[test]
    fn test_fibonacci() {
        let mut cpu = load(FIB);
        let out = BufferedOutput::new();
        cpu.set_output(out.clone());
        cpu.reset(words(&[5]));

        assert_eq!(cpu.run(10_000), Ok(StopReason::Halted));
        assert_eq!(cpu.status(), Status::Halted);
        assert_eq!(cpu.last_stop(), Some(StopReason::Halted));
        assert_eq!(out.take(), [Output::Number(5)]);

        // halt does not advance the PC
        assert_eq!(cpu.pc, 10);

        cpu.reset(words(&[10]));
        assert_eq!(cpu.run(10_000), Ok(StopReason::Halted));
        assert_eq!(out.take(), [Output::Number(55)]);
    }

    #[test]
    fn test_fibonacci_no_commas() {
        let mut cpu = load("
            in r4
            add r1 r0 r0
            addi r2 r0 1
    loop:   addi r4 r4 -1
            beq r4 &end
            add r3 r1 r2
            add r1 r2 r0
            add r2 r3 r0
            beq r0 &loop
    end:    out r3
            .halt
        ");
        let out = BufferedOutput::new();
        cpu.set_output(out.clone());
        cpu.reset(words(&[5]));

        assert_eq!(cpu.run(10_000), Ok(StopReason::Halted));
        assert_eq!(out.take(), [Output::Number(5)]);
        assert_eq!(cpu.pc, 10);
    }

    #[test]
    fn test_run_in_slices() {
        let mut cpu = load(FIB);
        cpu.reset(words(&[5]));

        let mut slices = 0;
        while cpu.run(3).unwrap() == StopReason::CyclesExceeded {
            assert_eq!(cpu.status(), Status::Paused);
            slices += 1;
        }
        assert!(slices > 1);
        assert_eq!(cpu.reg(R2).as_signed(), 5);

        let mut sliced = load(FIB);
        sliced.reset(words(&[5]));
        sliced.run(10_000).unwrap();
        assert_eq!(cpu.cycles(), sliced.cycles());
    }

    #[test]
    fn test_breakpoint_once() {
        let mut cpu = load("
            lli r1, 3
            addi r1, r1, 1
            halt
        ");
        cpu.set_breakpoint(1);

        assert_eq!(cpu.run(100), Ok(StopReason::Breakpoint));
        assert_eq!(cpu.status(), Status::Paused);
        assert_eq!(cpu.pc, 1);
        assert_eq!(cpu.reg(R1).as_signed(), 3);

        assert_eq!(cpu.run(100), Ok(StopReason::Halted));
        assert_eq!(cpu.reg(R1).as_signed(), 4);
    }

    #[test]
    fn test_breakpoint_zero_budget() {
        let mut cpu = load("
            lli r1, 3
            addi r1, r1, 1
            halt
        ");
        cpu.set_breakpoint(1);
        assert_eq!(cpu.run(100), Ok(StopReason::Breakpoint));

        // an empty run keeps the pause, so the next run still executes the breakpoint
        assert_eq!(cpu.run(0), Ok(StopReason::CyclesExceeded));
        assert_eq!(cpu.pc, 1);
        assert_eq!(cpu.run(100), Ok(StopReason::Halted));
        assert_eq!(cpu.reg(R1).as_signed(), 4);
    }

    #[test]
    fn test_breakpoint_in_loop() {
        let mut cpu = load("
                  lli r1, 2
            loop: addi r1, r1, -1
                  bne r1, &loop
                  halt
        ");
        cpu.set_breakpoint(1);

        assert_eq!(cpu.run(100), Ok(StopReason::Breakpoint));
        assert_eq!(cpu.reg(R1).as_signed(), 2);
        assert_eq!(cpu.run(100), Ok(StopReason::Breakpoint));
        assert_eq!(cpu.reg(R1).as_signed(), 1);
        assert_eq!(cpu.run(100), Ok(StopReason::Halted));
        assert_eq!(cpu.reg(R1).as_signed(), 0);

        // stepping from a breakpoint executes it
        cpu.reset([]);
        assert_eq!(cpu.run(100), Ok(StopReason::Breakpoint));
        assert_eq!(cpu.step(), Ok(StopReason::CyclesExceeded));
        assert_eq!(cpu.pc, 2);
    }

    #[test]
    fn test_input() {
        let mut cpu = load("
            in r1
            in r2
            in r3
            in r4
            halt
        ");
        cpu.reset(words(&[10, 20, 30]));

        assert_eq!(cpu.run(100), Err(SimErr::InputExhausted));
        assert_eq!(cpu.status(), Status::Halted);
        assert_eq!(cpu.last_stop(), None);
        let regs: Vec<_> = [R1, R2, R3].into_iter().map(|r| cpu.reg(r).as_signed()).collect();
        assert_eq!(regs, [10, 20, 30]);
        assert_eq!(cpu.pc, 3);

        cpu.push_input(Word::new(40));
        assert_eq!(cpu.pending_input().count(), 1);
        assert_eq!(cpu.run(100), Ok(StopReason::Halted));
        assert_eq!(cpu.reg(R4).as_signed(), 40);
    }

    #[test]
    fn test_r0_is_zero() {
        let mut cpu = load("
            lli r0, 5
            addi r1, r0, 3
            in r0
            halt
        ");
        cpu.reset(words(&[9]));
        assert_eq!(cpu.run(100), Ok(StopReason::Halted));
        assert_eq!(cpu.reg(R0).as_signed(), 0);
        assert_eq!(cpu.reg(R1).as_signed(), 3);
    }

    #[test]
    fn test_lwi() {
        let mut cpu = load("
            lwi r1, 0x1234
            lwi r2, 0xBEEF
            lwi r3, -2
            halt
        ");
        assert_eq!(cpu.run(100), Ok(StopReason::Halted));
        assert_eq!(cpu.reg(R1).as_unsigned(), 0x1234);
        assert_eq!(cpu.reg(R2).as_unsigned(), 0xBEEF);
        assert_eq!(cpu.reg(R3).as_signed(), -2);
    }

    #[test]
    fn test_math() {
        let mut cpu = load("
            lli r1, 7
            lli r2, -2
            add r3, r1, r2
            sub r4, r1, r2
            mul r5, r1, r2
            div r6, r1, r2
            mod r7, r1, r2
            halt
        ");
        cpu.run(100).unwrap();
        let regs: Vec<_> = cpu.reg_file.iter().map(|w| w.as_signed()).collect();
        assert_eq!(regs, [0, 7, -2, 5, 9, -14, -3, 1]);

        let mut cpu = load("
            lwi r1, 0x7FFF
            addi r1, r1, 1
            lli r2, 2
            not r3, r2
            and r4, r3, r1
            or r5, r2, r1
            halt
        ");
        cpu.run(100).unwrap();
        assert_eq!(cpu.reg(R1).as_unsigned(), 0x8000);
        assert_eq!(cpu.reg(R3).as_signed(), -3);
        assert_eq!(cpu.reg(R4).as_unsigned(), 0x8000);
        assert_eq!(cpu.reg_file.iter().nth(5).map(|w| w.as_unsigned()), Some(0x8002));
    }

    #[test]
    fn test_divide_by_zero() {
        let mut cpu = load("
            lli r1, 7
            div r2, r1, r0
            halt
        ");
        assert_eq!(cpu.run(100), Err(SimErr::DivideByZero));
        assert_eq!(cpu.status(), Status::Halted);
        assert_eq!(cpu.pc, 1);
    }

    #[test]
    fn test_shf() {
        let mut cpu = load("
            lli r1, -8
            shf r2, r1, 2
            shf r3, r1, -1
            shf r4, r1, 0
            shf r5, r1, -20
            shf r6, r1, 20
            halt
        ");
        cpu.run(100).unwrap();
        let regs: Vec<_> = cpu.reg_file.iter().map(|w| w.as_signed()).collect();
        assert_eq!(regs, [0, -8, -32, -4, -8, -1, 0, 0]);
    }

    #[test]
    fn test_memory() {
        let mut cpu = load("
            lwi r1, &data
            lw r2, r1, 0
            addi r2, r2, 1
            sw r2, r1, 1
            sw r2, r1, 1
            halt
        data: .fill 41
            .fill 0
        ");
        cpu.run(100).unwrap();
        assert_eq!(cpu.reg(R2).as_signed(), 42);
        assert_eq!(cpu.mem.read(8).as_signed(), 42);

        // the second write does not change the cell, but the first did
        assert!(cpu.observer.get_mem_accesses(7).read());
        let w = cpu.observer.get_mem_accesses(8);
        assert!(w.written() && w.modified());
        assert!(cpu.observer.reg_changed(R1));
        assert!(!cpu.observer.reg_changed(R3));
    }

    #[test]
    fn test_jalr() {
        let mut cpu = load("
                  lli r3, &func
                  jalr r3, r7
                  halt
            func: lli r1, 9
                  jmp r7
        ");
        assert_eq!(cpu.run(100), Ok(StopReason::Halted));
        assert_eq!(cpu.reg(R1).as_signed(), 9);
        assert_eq!(cpu.reg(R7).as_unsigned(), 2);
        assert_eq!(cpu.pc, 2);
    }

    #[test]
    fn test_branches() {
        let mut cpu = load("
                  lli r1, -1
                  bgt r1, &bad
                  bge r1, &bad
                  beq r1, &bad
                  ble r1, &next
                  halt
            next: blt r1, &good
            bad:  lli r7, 1
                  halt
            good: lli r2, 1
                  halt
        ");
        assert_eq!(cpu.run(100), Ok(StopReason::Halted));
        assert_eq!(cpu.reg(R7).as_signed(), 0);
        assert_eq!(cpu.reg(R2).as_signed(), 1);
    }

    #[test]
    fn test_output() {
        let mut cpu = load("
                  lli r1, &msg
                  lui r1, &msg
                  outs r1
                  lli r2, -7
                  out r2
                  outn r2
                  halt
            msg:  .cstr \"hi\"
        ");
        let out = BufferedOutput::new();
        cpu.set_output(out.clone());
        assert_eq!(cpu.run(100), Ok(StopReason::Halted));
        assert_eq!(out.take(), [Output::Str("hi".into()), Output::Number(-7), Output::Line(-7)]);

        let (tx, rx) = ChannelOutput::channel();
        drop(rx);
        cpu.set_output(tx);
        cpu.reset([]);
        assert_eq!(cpu.run(100), Err(SimErr::OutputClosed));
    }

    #[test]
    fn test_halt_forms() {
        // outs r0 and outn r0 halt without advancing the PC, but still take a cycle
        let mut cpu = load("lli r1, 1\nouts r0");
        assert_eq!(cpu.run(100), Ok(StopReason::Halted));
        assert_eq!(cpu.pc, 1);
        assert_eq!(cpu.cycles(), 2);
        assert_eq!(cpu.status(), Status::Halted);

        let mut cpu = load("outn r0");
        assert_eq!(cpu.run(100), Ok(StopReason::Halted));
        assert_eq!(cpu.pc, 0);
        assert_eq!(cpu.cycles(), 1);

        let mut cpu = load("halt");
        assert_eq!(cpu.run(100), Ok(StopReason::Halted));
        assert_eq!(cpu.pc, 0);
        assert_eq!(cpu.cycles(), 0);
    }

    #[test]
    fn test_invalid_opcode() {
        let mut cpu = Cpu::default();
        cpu.mem.write(0, Word::new(0xF007));
        assert_eq!(cpu.run(100), Err(SimErr::InvalidOpcode(InvalidOpcode(0xF007))));
        assert_eq!(cpu.status(), Status::Halted);
    }

    #[test]
    fn test_pc_wraps() {
        // zeroed memory is `add r0, r0, r0`
        let mut cpu = Cpu::new(SimFlags { mem_len: 16, ..Default::default() });
        assert_eq!(cpu.run(20), Ok(StopReason::CyclesExceeded));
        assert_eq!(cpu.pc, 4);
        assert_eq!(cpu.cycles(), 20);
    }

    #[test]
    fn test_reinit_mem() {
        use super::mem::MemFill;

        let flags = SimFlags { mem_len: 64, fill: MemFill::Seeded { seed: 5 } };
        let mut a = Cpu::new(flags);
        let b = Cpu::new(flags);
        let words = |cpu: &Cpu| cpu.mem.cells().map(|(_, c)| c.data()).collect::<Vec<_>>();
        assert_eq!(words(&a), words(&b));

        a.set_breakpoint(3);
        a.flags.fill = MemFill::Known { value: 0xF000 };
        a.reinit_mem();
        assert_eq!(a.breakpoints().count(), 0);
        assert_eq!(a.run(5), Ok(StopReason::Halted));
    }
}
