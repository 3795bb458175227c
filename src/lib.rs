//! An ANNA parser, assembler, optimizer, and simulator.
//!
//! ANNA is a small 16-bit teaching ISA with eight registers (`r0` always reads zero),
//! three instruction formats, and word-addressed memory.
//! This crate is meant to be a general suite for ANNA assembly
//! (as a backend for editors, debuggers, and compilers that target ANNA).
//!
//! # Usage
//!
//! To convert ANNA source code to a memory image, it must be parsed and assembled:
//! ```
//! use anna_ensemble::parse::parse_source;
//! use anna_ensemble::asm::{assemble, MemImage};
//!
//! let code = "
//!     in r1
//!     addi r1, r1, 1
//!     out r1
//!     halt
//! ";
//! let mut nodes = parse_source(code).unwrap();
//! let image: MemImage = assemble(&mut nodes).unwrap();
//! assert_eq!(image.word_count(), 4);
//! ```
//!
//! Once a memory image has been created, it can be executed with the simulator:
//! ```
//! # // Parsing and assembling was shown in the previous example, so this doesn't need to be shown again.
//! # use anna_ensemble::parse::parse_source;
//! # use anna_ensemble::asm::assemble;
//! #
//! # let mut nodes = parse_source("in r1\naddi r1, r1, 1\nout r1\nhalt").unwrap();
//! # let image = assemble(&mut nodes).unwrap();
//! #
//! use anna_ensemble::sim::{Cpu, StopReason};
//! use anna_ensemble::sim::io::{parse_inputs, BufferedOutput, Output};
//!
//! let out = BufferedOutput::new();
//! let mut cpu = Cpu::new(Default::default());
//! cpu.load_image(&image);
//! cpu.set_output(out.clone());
//! cpu.reset(parse_inputs(["41"]).unwrap());
//!
//! assert_eq!(cpu.run(1000), Ok(StopReason::Halted)); // <-- Result can be handled accordingly
//! assert_eq!(out.take(), [Output::Number(42)]);
//! ```
//!
//! Before assembly, the nodes can also be run through the peephole optimizer ([`opt`]),
//! and rendered back into source code with [`ast::asm::render`].
//!
//! If more granularity is needed for simulation, there are also stepping and breakpoints.
//! See the [`sim`] module for more details.
#![warn(missing_docs)]

pub mod parse;
pub mod ast;
pub mod asm;
pub mod opt;
pub mod sim;
pub mod err;
