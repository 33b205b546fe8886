//! An assembler and emulator for the small 8088-like machine used in
//! introductory computer organization courses.
//!
//! Currently this crate provides the functionality to:
//! - Assemble the course's Intel-flavored assembly dialect into a [Program].
//! - Execute programs one instruction at a time, with the full register,
//!   flag and memory model of the machine.
//! - Emulate the course's peripherals: a timer, an interrupt controller and
//!   one of three wirings of PIO, printer and switches.
//! - React to state changes through [events](event) and capture the whole
//!   machine as a serializable [Snapshot].
//!
//! # Example
//! ```
//! use sim88::{assemble, DevicesConfiguration, MemoryFill, Register, Simulator};
//!
//! fn main() {
//!     // Add two numbers and leave the sum in AL.
//!     let source = r#"
//!         org 2000h
//!         mov al, 3
//!         add al, 4
//!         int 0
//!         end
//!     "#;
//!
//!     let program = assemble(source).unwrap();
//!
//!     let mut simulator = Simulator::new();
//!     simulator.load_program(
//!         &program,
//!         MemoryFill::Zero,
//!         DevicesConfiguration::SwitchesAndLeds,
//!     );
//!
//!     simulator.run(100).expect("the program faulted");
//!
//!     assert_eq!(simulator.register(Register::AL), 7);
//! }
//! ```
//!
//! # Executables
//!
//! ## `sim88run`
//!
//! Assembles a source file and runs it to completion, feeding console input
//! from the terminal and printing the console screen at the end. Built with
//! `--features sim88run`. The device configuration comes from a
//! `;;devices=...` comment in the source file.

/// Size of the address space in bytes.
pub const MEMORY_SIZE: usize = 0x4000;

pub mod asm;
pub mod emulator;
pub mod error;
pub mod event;
pub mod instruction;
pub mod program;
pub mod snapshot;

pub use asm::{assemble, assemble_with_logger};
pub use emulator::{ControlSignal, DevicesConfiguration, Flags, MemoryFill, Simulator};
pub use error::{AssemblerError, AssemblerErrorKind, SimulatorError};
pub use event::{Event, EventListener};
pub use instruction::{Mnemonic, OperandSize, Register};
pub use program::{Program, Symbol};
pub use snapshot::Snapshot;
