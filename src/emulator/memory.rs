//! The 16 KiB main memory.

use std::collections::HashSet;

use rand::Rng;

use crate::error::SimulatorError;
use crate::instruction::OperandSize;
use crate::program::Program;
use crate::MEMORY_SIZE;

/// What the memory image looks like before a program is copied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryFill {
    /// Every cell becomes 0x00.
    Zero,
    /// Every cell gets a uniformly random byte.
    Randomize,
    /// Cells keep whatever the previous run left behind.
    KeepPrevious,
}

/// Main memory, together with the MAR and MBR latches of the bus.
///
/// Data reads and writes validate the address range and refuse to touch the
/// region occupied by instruction bytes; code goes out through
/// [fetch_byte](Memory::fetch_byte), which only checks the range.
pub struct Memory {
    cells: [u8; MEMORY_SIZE],
    code: HashSet<u16>,
    mar: u16,
    mbr: u8,
}

impl Memory {
    pub fn new() -> Memory {
        Memory {
            cells: [0; MEMORY_SIZE],
            code: HashSet::new(),
            mar: 0,
            mbr: 0,
        }
    }

    /// Prepares the image for `program`: applies the fill policy, records
    /// the code region and copies in the data cells and instruction bytes.
    ///
    /// Addresses inside `program` were validated during assembly, so the
    /// copy itself cannot fail.
    pub fn load(&mut self, program: &Program, fill: MemoryFill) {
        match fill {
            MemoryFill::Zero => self.cells = [0; MEMORY_SIZE],
            MemoryFill::Randomize => rand::thread_rng().fill(&mut self.cells[..]),
            MemoryFill::KeepPrevious => {}
        }

        self.code = program.code_region();
        self.mar = 0;
        self.mbr = 0;

        for block in &program.data {
            let mut address = usize::from(block.address);

            for value in &block.values {
                // A `?` cell reserves its bytes but keeps the fill.
                if let Some(value) = *value {
                    self.cells[address] = value as u8;
                    if block.size == OperandSize::Word {
                        self.cells[address + 1] = (value >> 8) as u8;
                    }
                }

                address += usize::from(block.size.bytes());
            }
        }

        for instruction in &program.instructions {
            let address = usize::from(instruction.address);
            for (offset, byte) in instruction.to_bytes().into_iter().enumerate() {
                self.cells[address + offset] = byte;
            }
        }
    }

    /// Reads one data byte.
    pub fn read_byte(&mut self, address: u16) -> Result<u8, SimulatorError> {
        self.check_data(address)?;

        let value = self.cells[usize::from(address)];
        self.latch(address, value);
        Ok(value)
    }

    /// Reads a little-endian word.
    pub fn read_word(&mut self, address: u16) -> Result<u16, SimulatorError> {
        let low = self.read_byte(address)?;
        let high = self.read_byte(address + 1)?;
        Ok(u16::from(low) | u16::from(high) << 8)
    }

    /// Writes one data byte.
    pub fn write_byte(&mut self, address: u16, value: u8) -> Result<(), SimulatorError> {
        self.check_data(address)?;

        self.cells[usize::from(address)] = value;
        self.latch(address, value);
        Ok(())
    }

    /// Writes a little-endian word. The low byte may already be in place
    /// when the high byte fails validation.
    pub fn write_word(&mut self, address: u16, value: u16) -> Result<(), SimulatorError> {
        self.write_byte(address, value as u8)?;
        self.write_byte(address + 1, (value >> 8) as u8)
    }

    /// Reads one instruction byte. The fetch cycle is the only path allowed
    /// into the code region.
    pub fn fetch_byte(&mut self, address: u16) -> Result<u8, SimulatorError> {
        if usize::from(address) >= MEMORY_SIZE {
            return Err(SimulatorError::AddressOutOfRange {
                address: u32::from(address),
            });
        }

        let value = self.cells[usize::from(address)];
        self.latch(address, value);
        Ok(value)
    }

    fn check_data(&self, address: u16) -> Result<(), SimulatorError> {
        if usize::from(address) >= MEMORY_SIZE {
            return Err(SimulatorError::AddressOutOfRange {
                address: u32::from(address),
            });
        }

        if self.code.contains(&address) {
            return Err(SimulatorError::AddressHasInstruction { address });
        }

        Ok(())
    }

    fn latch(&mut self, address: u16, value: u8) {
        self.mar = address;
        self.mbr = value;
    }

    /// The raw memory image.
    pub fn bytes(&self) -> &[u8] {
        &self.cells
    }

    /// The last address placed on the bus.
    pub fn mar(&self) -> u16 {
        self.mar
    }

    /// The last byte that crossed the bus.
    pub fn mbr(&self) -> u8 {
        self.mbr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::ZeroaryOp;
    use crate::program::{InstructionKind, ProgramData, ProgramInstruction};

    fn sample_program() -> Program {
        let data = ProgramData {
            address: 0x1000,
            size: OperandSize::Word,
            values: vec![Some(0xCAFE), None, Some(0x0003)],
        };
        let halt = ProgramInstruction::new(0x2000, InstructionKind::Zeroary { op: ZeroaryOp::Hlt });

        Program::new(vec![data], vec![halt], vec![])
    }

    #[test]
    fn load_places_data_and_code() {
        let mut memory = Memory::new();
        memory.load(&sample_program(), MemoryFill::Zero);

        assert_eq!(memory.bytes()[0x1000], 0xFE);
        assert_eq!(memory.bytes()[0x1001], 0xCA);
        assert_eq!(memory.bytes()[0x1004], 0x03);
        assert_eq!(memory.bytes()[0x1005], 0x00);
        assert_eq!(memory.bytes()[0x2000], 0xFF);
    }

    #[test]
    fn unassigned_cells_keep_previous_contents() {
        let mut memory = Memory::new();
        memory.write_byte(0x1002, 0xEE).unwrap();
        memory.write_byte(0x1003, 0xEE).unwrap();

        memory.load(&sample_program(), MemoryFill::KeepPrevious);
        assert_eq!(memory.bytes()[0x1002], 0xEE);
        assert_eq!(memory.bytes()[0x1003], 0xEE);

        memory.load(&sample_program(), MemoryFill::Zero);
        assert_eq!(memory.bytes()[0x1002], 0x00);
    }

    #[test]
    fn the_code_region_is_execute_only() {
        let mut memory = Memory::new();
        memory.load(&sample_program(), MemoryFill::Zero);

        assert_eq!(
            memory.read_byte(0x2000),
            Err(SimulatorError::AddressHasInstruction { address: 0x2000 })
        );
        assert_eq!(
            memory.write_byte(0x2000, 0),
            Err(SimulatorError::AddressHasInstruction { address: 0x2000 })
        );
        assert_eq!(memory.fetch_byte(0x2000), Ok(0xFF));
    }

    #[test]
    fn accesses_stop_at_the_top_of_memory() {
        let mut memory = Memory::new();

        assert_eq!(memory.read_byte(0x3FFF), Ok(0));
        assert_eq!(
            memory.read_byte(0x4000),
            Err(SimulatorError::AddressOutOfRange { address: 0x4000 })
        );
        // The second byte of a word at the last cell is already outside.
        assert_eq!(
            memory.read_word(0x3FFF),
            Err(SimulatorError::AddressOutOfRange { address: 0x4000 })
        );
    }

    #[test]
    fn words_are_little_endian() {
        let mut memory = Memory::new();
        memory.write_word(0x1000, 0xABCD).unwrap();

        assert_eq!(memory.bytes()[0x1000], 0xCD);
        assert_eq!(memory.bytes()[0x1001], 0xAB);
        assert_eq!(memory.read_word(0x1000), Ok(0xABCD));
    }

    #[test]
    fn the_latches_follow_the_last_transfer() {
        let mut memory = Memory::new();

        memory.write_byte(0x1234, 0xAB).unwrap();
        assert_eq!(memory.mar(), 0x1234);
        assert_eq!(memory.mbr(), 0xAB);

        memory.read_word(0x0010).unwrap();
        assert_eq!(memory.mar(), 0x0011);
    }
}
