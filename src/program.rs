//! The assembled program: data cells, decoded instructions and the symbols
//! they were built from.
//!
//! [`Program`] is what the assembler produces and what the execution engine
//! loads. Instructions are kept in decoded form next to their addresses, so
//! the engine never has to parse machine code back out of memory; the byte
//! encoding is still available through [`ProgramInstruction::to_bytes`] for
//! loading memory and for inspection.

use std::collections::{HashMap, HashSet};

use crate::instruction::{
    BinaryOp, IoOp, JumpOp, OperandSize, Register, StackOp, UnaryOp, ZeroaryOp, INT_OPCODE,
};

/// A reserved block produced by a `DB` or `DW` directive.
///
/// Each entry of `values` is one cell of `size` bytes. `None` marks a cell
/// that was declared with `?` and must be left untouched when the program is
/// loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramData {
    pub address: u16,
    pub size: OperandSize,
    pub values: Vec<Option<u16>>,
}

impl ProgramData {
    /// Number of bytes the block occupies in memory.
    pub fn byte_length(&self) -> u16 {
        self.values.len() as u16 * u16::from(self.size.bytes())
    }
}

/// Addressing pair of a two-operand instruction, destination first.
///
/// Addresses are absolute and immediates are stored two's complement wrapped
/// to the operand size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperands {
    RegReg { dest: Register, src: Register },
    RegDir { dest: Register, addr: u16 },
    RegInd { dest: Register },
    RegImm { dest: Register, value: u16 },
    DirReg { addr: u16, src: Register },
    IndReg { src: Register },
    DirImm { addr: u16, value: u16 },
    IndImm { value: u16 },
}

impl BinaryOperands {
    /// The three mode bits that select this pair in the opcode byte.
    fn mode(self) -> u8 {
        match self {
            BinaryOperands::RegReg { .. } => 0b000,
            BinaryOperands::RegDir { .. } => 0b001,
            BinaryOperands::RegInd { .. } => 0b010,
            BinaryOperands::RegImm { .. } => 0b011,
            BinaryOperands::DirReg { .. } => 0b100,
            BinaryOperands::IndReg { .. } => 0b101,
            BinaryOperands::DirImm { .. } => 0b110,
            BinaryOperands::IndImm { .. } => 0b111,
        }
    }
}

/// Destination of a single-operand instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperand {
    Register(Register),
    Direct(u16),
    Indirect,
}

/// Port operand of IN and OUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    Fixed(u8),
    Variable,
}

/// A fully resolved instruction, ready to execute or to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    Binary {
        op: BinaryOp,
        size: OperandSize,
        operands: BinaryOperands,
    },
    Unary {
        op: UnaryOp,
        size: OperandSize,
        operand: UnaryOperand,
    },
    Stack {
        op: StackOp,
        register: Register,
    },
    Jump {
        op: JumpOp,
        target: u16,
    },
    Io {
        op: IoOp,
        size: OperandSize,
        port: Port,
    },
    Int {
        vector: u8,
    },
    Zeroary {
        op: ZeroaryOp,
    },
}

impl InstructionKind {
    /// Encoded length in bytes.
    pub fn length(self) -> u8 {
        match self {
            InstructionKind::Binary { size, operands, .. } => match operands {
                BinaryOperands::RegReg { .. } => 3,
                BinaryOperands::RegDir { .. } | BinaryOperands::DirReg { .. } => 4,
                BinaryOperands::RegInd { .. } | BinaryOperands::IndReg { .. } => 2,
                BinaryOperands::RegImm { .. } => 2 + size.bytes(),
                BinaryOperands::DirImm { .. } => 3 + size.bytes(),
                BinaryOperands::IndImm { .. } => 1 + size.bytes(),
            },
            InstructionKind::Unary { operand, .. } => match operand {
                UnaryOperand::Register(_) => 2,
                UnaryOperand::Direct(_) => 3,
                UnaryOperand::Indirect => 1,
            },
            InstructionKind::Stack { .. } => 2,
            InstructionKind::Jump { .. } => 3,
            InstructionKind::Io { port, .. } => match port {
                Port::Fixed(_) => 2,
                Port::Variable => 1,
            },
            InstructionKind::Int { .. } => 2,
            InstructionKind::Zeroary { .. } => 1,
        }
    }
}

/// An instruction placed at its final address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramInstruction {
    pub address: u16,
    pub kind: InstructionKind,
}

impl ProgramInstruction {
    pub fn new(address: u16, kind: InstructionKind) -> ProgramInstruction {
        ProgramInstruction { address, kind }
    }

    /// Encoded length in bytes.
    pub fn length(&self) -> u8 {
        self.kind.length()
    }

    /// Machine code of the instruction, words little endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(usize::from(self.length()));

        match self.kind {
            InstructionKind::Binary { op, size, operands } => {
                let word = (size == OperandSize::Word) as u8;
                bytes.push(op.base_opcode() | operands.mode() << 1 | word);

                match operands {
                    BinaryOperands::RegReg { dest, src } => {
                        bytes.push(dest.selector());
                        bytes.push(src.selector());
                    }
                    BinaryOperands::RegDir { dest, addr } => {
                        bytes.push(dest.selector());
                        push_word(&mut bytes, addr);
                    }
                    BinaryOperands::RegInd { dest } => bytes.push(dest.selector()),
                    BinaryOperands::RegImm { dest, value } => {
                        bytes.push(dest.selector());
                        push_value(&mut bytes, size, value);
                    }
                    BinaryOperands::DirReg { addr, src } => {
                        push_word(&mut bytes, addr);
                        bytes.push(src.selector());
                    }
                    BinaryOperands::IndReg { src } => bytes.push(src.selector()),
                    BinaryOperands::DirImm { addr, value } => {
                        push_word(&mut bytes, addr);
                        push_value(&mut bytes, size, value);
                    }
                    BinaryOperands::IndImm { value } => push_value(&mut bytes, size, value),
                }
            }
            InstructionKind::Unary { op, size, operand } => {
                let word = (size == OperandSize::Word) as u8;

                match operand {
                    UnaryOperand::Register(register) => {
                        bytes.push(op.base_opcode() | word);
                        bytes.push(register.selector());
                    }
                    UnaryOperand::Direct(addr) => {
                        bytes.push(op.base_opcode() | 0b10 | word);
                        push_word(&mut bytes, addr);
                    }
                    UnaryOperand::Indirect => bytes.push(op.base_opcode() | 0b100 | word),
                }
            }
            InstructionKind::Stack { op, register } => {
                bytes.push(op.opcode());
                bytes.push(register.selector());
            }
            InstructionKind::Jump { op, target } => {
                bytes.push(op.opcode());
                push_word(&mut bytes, target);
            }
            InstructionKind::Io { op, size, port } => {
                let word = (size == OperandSize::Word) as u8;

                match port {
                    Port::Fixed(number) => {
                        bytes.push(op.base_opcode() | word);
                        bytes.push(number);
                    }
                    Port::Variable => bytes.push(op.base_opcode() | 0b100 | word),
                }
            }
            InstructionKind::Int { vector } => {
                bytes.push(INT_OPCODE);
                bytes.push(vector);
            }
            InstructionKind::Zeroary { op } => bytes.push(op.opcode()),
        }

        bytes
    }
}

fn push_word(bytes: &mut Vec<u8>, value: u16) {
    bytes.push(value as u8);
    bytes.push((value >> 8) as u8);
}

fn push_value(bytes: &mut Vec<u8>, size: OperandSize, value: u16) {
    match size {
        OperandSize::Byte => bytes.push(value as u8),
        OperandSize::Word => push_word(bytes, value),
    }
}

/// A name defined by the source program, kept for symbol listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    /// A code label, usable as a jump or call target.
    Instruction { name: String, address: u16 },

    /// A label in front of a `DB` or `DW` directive.
    Data {
        name: String,
        address: u16,
        size: OperandSize,
    },

    /// An `EQU` constant with its evaluated value.
    Constant { name: String, value: i64 },
}

impl Symbol {
    pub fn name(&self) -> &str {
        match self {
            Symbol::Instruction { name, .. }
            | Symbol::Data { name, .. }
            | Symbol::Constant { name, .. } => name,
        }
    }
}

/// A complete assembled program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub data: Vec<ProgramData>,
    pub instructions: Vec<ProgramInstruction>,
    pub symbols: Vec<Symbol>,
    index: HashMap<u16, usize>,
}

impl Program {
    pub fn new(
        data: Vec<ProgramData>,
        instructions: Vec<ProgramInstruction>,
        symbols: Vec<Symbol>,
    ) -> Program {
        let index = instructions
            .iter()
            .enumerate()
            .map(|(position, instruction)| (instruction.address, position))
            .collect();

        Program {
            data,
            instructions,
            symbols,
            index,
        }
    }

    /// The instruction that starts at `address`, if any.
    pub fn instruction_at(&self, address: u16) -> Option<&ProgramInstruction> {
        self.index
            .get(&address)
            .map(|&position| &self.instructions[position])
    }

    /// Every memory address occupied by an instruction byte.
    pub fn code_region(&self) -> HashSet<u16> {
        self.instructions
            .iter()
            .flat_map(|instruction| {
                let length = u16::from(instruction.length());
                (0..length).map(move |offset| instruction.address + offset)
            })
            .collect()
    }
}
