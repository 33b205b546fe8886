//! Types for representing instructions and their parts.
//!
//! The opcode and register-selector tables here define the byte encoding the
//! assembler emits and the lengths the address resolver relies on.

use std::fmt;
use std::str::FromStr;

/// Width of an operand or a data directive value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperandSize {
    Byte,
    Word,
}

impl OperandSize {
    /// Size in bits, as shown in diagnostics.
    pub fn bits(self) -> u8 {
        match self {
            OperandSize::Byte => 8,
            OperandSize::Word => 16,
        }
    }

    /// Size in bytes, as used when computing instruction lengths.
    pub fn bytes(self) -> u8 {
        match self {
            OperandSize::Byte => 1,
            OperandSize::Word => 2,
        }
    }

    /// All-ones mask of the width.
    pub fn mask(self) -> u16 {
        match self {
            OperandSize::Byte => 0x00FF,
            OperandSize::Word => 0xFFFF,
        }
    }

    /// True when `value` can be encoded in this width, accepting both the
    /// unsigned range and the negative two's complement range.
    pub fn fits(self, value: i64) -> bool {
        let bits = i64::from(self.bits());
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << bits) - 1;
        value >= min && value <= max
    }
}

/// A user-visible CPU register.
///
/// `AX` through `DX` are 16-bit and byte-addressable through their high and
/// low halves. `SP` is only ever a word. The instruction pointer is not
/// addressable from assembly source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    AL,
    BL,
    CL,
    DL,
    AH,
    BH,
    CH,
    DH,
    AX,
    BX,
    CX,
    DX,
    SP,
}

impl Register {
    pub fn size(self) -> OperandSize {
        match self {
            Register::AL
            | Register::BL
            | Register::CL
            | Register::DL
            | Register::AH
            | Register::BH
            | Register::CH
            | Register::DH => OperandSize::Byte,
            Register::AX | Register::BX | Register::CX | Register::DX | Register::SP => {
                OperandSize::Word
            }
        }
    }

    pub fn is_word(self) -> bool {
        self.size() == OperandSize::Word
    }

    /// The selector byte that encodes this register in an operand position.
    pub fn selector(self) -> u8 {
        match self {
            Register::AL => 0b0000_0000,
            Register::BL => 0b0000_0001,
            Register::CL => 0b0000_0010,
            Register::DL => 0b0000_0011,
            Register::AH => 0b0100_0000,
            Register::BH => 0b0100_0001,
            Register::CH => 0b0100_0010,
            Register::DH => 0b0100_0011,
            Register::AX => 0b1000_0000,
            Register::BX => 0b1000_0001,
            Register::CX => 0b1000_0010,
            Register::DX => 0b1000_0011,
            Register::SP => 0b1010_0001,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::AL => "AL",
            Register::BL => "BL",
            Register::CL => "CL",
            Register::DL => "DL",
            Register::AH => "AH",
            Register::BH => "BH",
            Register::CH => "CH",
            Register::DH => "DH",
            Register::AX => "AX",
            Register::BX => "BX",
            Register::CX => "CX",
            Register::DX => "DX",
            Register::SP => "SP",
        }
    }
}

impl FromStr for Register {
    type Err = ();

    fn from_str(name: &str) -> Result<Register, ()> {
        let register = match name.to_uppercase().as_str() {
            "AL" => Register::AL,
            "BL" => Register::BL,
            "CL" => Register::CL,
            "DL" => Register::DL,
            "AH" => Register::AH,
            "BH" => Register::BH,
            "CH" => Register::CH,
            "DH" => Register::DH,
            "AX" => Register::AX,
            "BX" => Register::BX,
            "CX" => Register::CX,
            "DX" => Register::DX,
            "SP" => Register::SP,
            _ => return Err(()),
        };

        Ok(register)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every instruction mnemonic of the architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Mov,
    Add,
    Adc,
    Sub,
    Sbb,
    Cmp,
    And,
    Or,
    Xor,
    Not,
    Inc,
    Dec,
    Neg,
    Push,
    Pop,
    Pushf,
    Popf,
    In,
    Out,
    Jmp,
    Call,
    Ret,
    Jc,
    Jnc,
    Jo,
    Jno,
    Js,
    Jns,
    Jz,
    Jnz,
    Int,
    Iret,
    Cli,
    Sti,
    Nop,
    Hlt,
}

impl Mnemonic {
    pub const ALL: [Mnemonic; 36] = [
        Mnemonic::Mov,
        Mnemonic::Add,
        Mnemonic::Adc,
        Mnemonic::Sub,
        Mnemonic::Sbb,
        Mnemonic::Cmp,
        Mnemonic::And,
        Mnemonic::Or,
        Mnemonic::Xor,
        Mnemonic::Not,
        Mnemonic::Inc,
        Mnemonic::Dec,
        Mnemonic::Neg,
        Mnemonic::Push,
        Mnemonic::Pop,
        Mnemonic::Pushf,
        Mnemonic::Popf,
        Mnemonic::In,
        Mnemonic::Out,
        Mnemonic::Jmp,
        Mnemonic::Call,
        Mnemonic::Ret,
        Mnemonic::Jc,
        Mnemonic::Jnc,
        Mnemonic::Jo,
        Mnemonic::Jno,
        Mnemonic::Js,
        Mnemonic::Jns,
        Mnemonic::Jz,
        Mnemonic::Jnz,
        Mnemonic::Int,
        Mnemonic::Iret,
        Mnemonic::Cli,
        Mnemonic::Sti,
        Mnemonic::Nop,
        Mnemonic::Hlt,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Mnemonic::Mov => "MOV",
            Mnemonic::Add => "ADD",
            Mnemonic::Adc => "ADC",
            Mnemonic::Sub => "SUB",
            Mnemonic::Sbb => "SBB",
            Mnemonic::Cmp => "CMP",
            Mnemonic::And => "AND",
            Mnemonic::Or => "OR",
            Mnemonic::Xor => "XOR",
            Mnemonic::Not => "NOT",
            Mnemonic::Inc => "INC",
            Mnemonic::Dec => "DEC",
            Mnemonic::Neg => "NEG",
            Mnemonic::Push => "PUSH",
            Mnemonic::Pop => "POP",
            Mnemonic::Pushf => "PUSHF",
            Mnemonic::Popf => "POPF",
            Mnemonic::In => "IN",
            Mnemonic::Out => "OUT",
            Mnemonic::Jmp => "JMP",
            Mnemonic::Call => "CALL",
            Mnemonic::Ret => "RET",
            Mnemonic::Jc => "JC",
            Mnemonic::Jnc => "JNC",
            Mnemonic::Jo => "JO",
            Mnemonic::Jno => "JNO",
            Mnemonic::Js => "JS",
            Mnemonic::Jns => "JNS",
            Mnemonic::Jz => "JZ",
            Mnemonic::Jnz => "JNZ",
            Mnemonic::Int => "INT",
            Mnemonic::Iret => "IRET",
            Mnemonic::Cli => "CLI",
            Mnemonic::Sti => "STI",
            Mnemonic::Nop => "NOP",
            Mnemonic::Hlt => "HLT",
        }
    }
}

impl FromStr for Mnemonic {
    type Err = ();

    fn from_str(name: &str) -> Result<Mnemonic, ()> {
        let upper = name.to_uppercase();

        Mnemonic::ALL
            .iter()
            .copied()
            .find(|mnemonic| mnemonic.name() == upper)
            .ok_or(())
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Two-operand transfer and ALU instructions. They share one opcode layout:
/// a base opcode, an addressing-mode pair in bits 3..1 and the word bit in
/// bit 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mov,
    And,
    Or,
    Xor,
    Add,
    Adc,
    Sub,
    Sbb,
    Cmp,
}

impl BinaryOp {
    pub fn from_mnemonic(mnemonic: Mnemonic) -> Option<BinaryOp> {
        let op = match mnemonic {
            Mnemonic::Mov => BinaryOp::Mov,
            Mnemonic::And => BinaryOp::And,
            Mnemonic::Or => BinaryOp::Or,
            Mnemonic::Xor => BinaryOp::Xor,
            Mnemonic::Add => BinaryOp::Add,
            Mnemonic::Adc => BinaryOp::Adc,
            Mnemonic::Sub => BinaryOp::Sub,
            Mnemonic::Sbb => BinaryOp::Sbb,
            Mnemonic::Cmp => BinaryOp::Cmp,
            _ => return None,
        };

        Some(op)
    }

    pub fn base_opcode(self) -> u8 {
        match self {
            BinaryOp::Mov => 0b0000_0000,
            BinaryOp::And => 0b0001_0000,
            BinaryOp::Or => 0b0010_0000,
            BinaryOp::Xor => 0b0011_0000,
            BinaryOp::Add => 0b0100_0000,
            BinaryOp::Adc => 0b0101_0000,
            BinaryOp::Sub => 0b0110_0000,
            BinaryOp::Sbb => 0b0111_0000,
            BinaryOp::Cmp => 0b1000_0000,
        }
    }
}

/// Single-operand read-modify-write instructions, opcode group `101mm000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Inc,
    Dec,
    Neg,
}

impl UnaryOp {
    pub fn from_mnemonic(mnemonic: Mnemonic) -> Option<UnaryOp> {
        let op = match mnemonic {
            Mnemonic::Not => UnaryOp::Not,
            Mnemonic::Inc => UnaryOp::Inc,
            Mnemonic::Dec => UnaryOp::Dec,
            Mnemonic::Neg => UnaryOp::Neg,
            _ => return None,
        };

        Some(op)
    }

    pub fn base_opcode(self) -> u8 {
        match self {
            UnaryOp::Not => 0b1010_0000,
            UnaryOp::Inc => 0b1010_1000,
            UnaryOp::Dec => 0b1011_0000,
            UnaryOp::Neg => 0b1011_1000,
        }
    }
}

/// PUSH and POP, encoded as an opcode followed by a register selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOp {
    Push,
    Pop,
}

impl StackOp {
    pub fn from_mnemonic(mnemonic: Mnemonic) -> Option<StackOp> {
        match mnemonic {
            Mnemonic::Push => Some(StackOp::Push),
            Mnemonic::Pop => Some(StackOp::Pop),
            _ => None,
        }
    }

    pub fn opcode(self) -> u8 {
        match self {
            StackOp::Push => 0b1100_0000,
            StackOp::Pop => 0b1100_0001,
        }
    }
}

/// Unconditional and conditional control transfers, each followed by an
/// absolute little-endian word target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpOp {
    Jmp,
    Call,
    Jc,
    Jnc,
    Jo,
    Jno,
    Js,
    Jns,
    Jz,
    Jnz,
}

impl JumpOp {
    pub fn from_mnemonic(mnemonic: Mnemonic) -> Option<JumpOp> {
        let op = match mnemonic {
            Mnemonic::Jmp => JumpOp::Jmp,
            Mnemonic::Call => JumpOp::Call,
            Mnemonic::Jc => JumpOp::Jc,
            Mnemonic::Jnc => JumpOp::Jnc,
            Mnemonic::Jo => JumpOp::Jo,
            Mnemonic::Jno => JumpOp::Jno,
            Mnemonic::Js => JumpOp::Js,
            Mnemonic::Jns => JumpOp::Jns,
            Mnemonic::Jz => JumpOp::Jz,
            Mnemonic::Jnz => JumpOp::Jnz,
            _ => return None,
        };

        Some(op)
    }

    pub fn opcode(self) -> u8 {
        match self {
            JumpOp::Jmp => 0b1110_0000,
            JumpOp::Call => 0b1110_0001,
            JumpOp::Jc => 0b1110_1000,
            JumpOp::Jnc => 0b1110_1001,
            JumpOp::Jo => 0b1110_1010,
            JumpOp::Jno => 0b1110_1011,
            JumpOp::Js => 0b1110_1100,
            JumpOp::Jns => 0b1110_1101,
            JumpOp::Jz => 0b1110_1110,
            JumpOp::Jnz => 0b1110_1111,
        }
    }
}

/// IN and OUT. The port mode and the word bit are folded into the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    In,
    Out,
}

impl IoOp {
    pub fn from_mnemonic(mnemonic: Mnemonic) -> Option<IoOp> {
        match mnemonic {
            Mnemonic::In => Some(IoOp::In),
            Mnemonic::Out => Some(IoOp::Out),
            _ => None,
        }
    }

    pub fn base_opcode(self) -> u8 {
        match self {
            IoOp::In => 0b1101_0000,
            IoOp::Out => 0b1101_1000,
        }
    }
}

/// Instructions that take no operands at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroaryOp {
    Pushf,
    Popf,
    Ret,
    Iret,
    Cli,
    Sti,
    Nop,
    Hlt,
}

impl ZeroaryOp {
    pub fn from_mnemonic(mnemonic: Mnemonic) -> Option<ZeroaryOp> {
        let op = match mnemonic {
            Mnemonic::Pushf => ZeroaryOp::Pushf,
            Mnemonic::Popf => ZeroaryOp::Popf,
            Mnemonic::Ret => ZeroaryOp::Ret,
            Mnemonic::Iret => ZeroaryOp::Iret,
            Mnemonic::Cli => ZeroaryOp::Cli,
            Mnemonic::Sti => ZeroaryOp::Sti,
            Mnemonic::Nop => ZeroaryOp::Nop,
            Mnemonic::Hlt => ZeroaryOp::Hlt,
            _ => return None,
        };

        Some(op)
    }

    pub fn opcode(self) -> u8 {
        match self {
            ZeroaryOp::Pushf => 0b1100_0010,
            ZeroaryOp::Popf => 0b1100_0011,
            ZeroaryOp::Ret => 0b1110_0010,
            ZeroaryOp::Iret => 0b1111_1011,
            ZeroaryOp::Cli => 0b1111_1100,
            ZeroaryOp::Sti => 0b1111_1101,
            ZeroaryOp::Nop => 0b1111_1110,
            ZeroaryOp::Hlt => 0b1111_1111,
        }
    }
}

/// The opcode byte for INT; the interrupt number follows as one byte.
pub const INT_OPCODE: u8 = 0b1111_1010;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_sizes() {
        assert_eq!(Register::AL.size(), OperandSize::Byte);
        assert_eq!(Register::DH.size(), OperandSize::Byte);
        assert_eq!(Register::AX.size(), OperandSize::Word);
        assert!(Register::SP.is_word());
    }

    #[test]
    fn register_parsing_is_case_insensitive() {
        assert_eq!("bx".parse(), Ok(Register::BX));
        assert_eq!("Sp".parse(), Ok(Register::SP));
        assert_eq!("ip".parse::<Register>(), Err(()));
    }

    #[test]
    fn selectors_separate_register_banks() {
        assert_eq!(Register::AL.selector(), 0x00);
        assert_eq!(Register::AH.selector(), 0x40);
        assert_eq!(Register::AX.selector(), 0x80);
        assert_eq!(Register::DX.selector(), 0x83);
        assert_eq!(Register::SP.selector(), 0xA1);
    }

    #[test]
    fn every_mnemonic_name_round_trips() {
        for mnemonic in &Mnemonic::ALL {
            assert_eq!(mnemonic.name().parse(), Ok(*mnemonic));
        }
    }

    #[test]
    fn byte_size_fits_two_complement_range() {
        assert!(OperandSize::Byte.fits(255));
        assert!(OperandSize::Byte.fits(-128));
        assert!(!OperandSize::Byte.fits(256));
        assert!(!OperandSize::Byte.fits(-129));
        assert!(OperandSize::Word.fits(65535));
        assert!(!OperandSize::Word.fits(65536));
    }
}
