//! The execution engine.
//!
//! [Simulator] owns the CPU state, the memory and the device rack, and
//! executes one decoded instruction per [step](Simulator::step). The driver
//! decides the pace: it calls `step` for CPU progress, [tick](Simulator::tick)
//! for device progress, and reacts to the [ControlSignal] each step returns.
//! Nothing here blocks; waiting for input is a returned signal plus a resume
//! call, not a suspended thread.

pub mod alu;
pub mod devices;
pub mod memory;

use bitflags::bitflags;

use crate::error::SimulatorError;
use crate::event::{Event, EventDispatcher, EventListener};
use crate::instruction::{
    BinaryOp, IoOp, JumpOp, OperandSize, Register, StackOp, UnaryOp, ZeroaryOp,
};
use crate::program::{BinaryOperands, InstructionKind, Port, Program, UnaryOperand};
use crate::snapshot::{
    HandshakeSnapshot, PicSnapshot, PioSnapshot, PrinterSnapshot, RegisterSnapshot, Snapshot,
    TimerSnapshot,
};
use crate::MEMORY_SIZE;

pub use self::alu::AluOp;
pub use self::devices::{Devices, DevicesConfiguration};
pub use self::memory::{Memory, MemoryFill};

use self::devices::lines;

/// Address where execution starts after a reset.
pub const INITIAL_IP: u16 = 0x2000;

bitflags! {
    /// The FLAGS register.
    ///
    /// Only these five bits exist; POPF and IRET silently drop the rest of
    /// the word.
    pub struct Flags: u16 {
        /// Unsigned wraparound in the last arithmetic result.
        const CARRY = 1 << 0;
        /// The last result was zero.
        const ZERO = 1 << 6;
        /// Top bit of the last result.
        const SIGN = 1 << 7;
        /// Hardware interrupts are serviced between steps.
        const INTERRUPTS = 1 << 9;
        /// Signed wraparound in the last arithmetic result.
        const OVERFLOW = 1 << 11;
    }
}

/// The CPU register file.
///
/// The four general registers are byte-addressable through [Register]. IR
/// holds the opcode byte of the instruction being executed and is not
/// addressable from programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub ax: u16,
    pub bx: u16,
    pub cx: u16,
    pub dx: u16,
    pub sp: u16,
    pub ip: u16,
    pub ir: u8,
    pub flags: Flags,
}

impl Registers {
    /// The register values right after a reset: SP on top of memory, IP at
    /// [INITIAL_IP], interrupts enabled.
    pub fn new() -> Registers {
        Registers {
            ax: 0,
            bx: 0,
            cx: 0,
            dx: 0,
            sp: MEMORY_SIZE as u16,
            ip: INITIAL_IP,
            ir: 0,
            flags: Flags::ZERO | Flags::INTERRUPTS,
        }
    }

    /// Reads a register; byte registers arrive in the low 8 bits.
    pub fn get(&self, register: Register) -> u16 {
        match register {
            Register::AX => self.ax,
            Register::BX => self.bx,
            Register::CX => self.cx,
            Register::DX => self.dx,
            Register::SP => self.sp,
            Register::AL => self.ax & 0x00FF,
            Register::BL => self.bx & 0x00FF,
            Register::CL => self.cx & 0x00FF,
            Register::DL => self.dx & 0x00FF,
            Register::AH => self.ax >> 8,
            Register::BH => self.bx >> 8,
            Register::CH => self.cx >> 8,
            Register::DH => self.dx >> 8,
        }
    }

    /// Writes a register; byte registers only touch their half.
    pub fn set(&mut self, register: Register, value: u16) {
        match register {
            Register::AX => self.ax = value,
            Register::BX => self.bx = value,
            Register::CX => self.cx = value,
            Register::DX => self.dx = value,
            Register::SP => self.sp = value,
            Register::AL => self.ax = self.ax & 0xFF00 | value & 0x00FF,
            Register::BL => self.bx = self.bx & 0xFF00 | value & 0x00FF,
            Register::CL => self.cx = self.cx & 0xFF00 | value & 0x00FF,
            Register::DL => self.dx = self.dx & 0xFF00 | value & 0x00FF,
            Register::AH => self.ax = self.ax & 0x00FF | value << 8,
            Register::BH => self.bx = self.bx & 0x00FF | value << 8,
            Register::CH => self.cx = self.cx & 0x00FF | value << 8,
            Register::DH => self.dx = self.dx & 0x00FF | value << 8,
        }
    }
}

/// What the driver should do after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Keep stepping.
    Continue,
    /// The program is done, either through HLT or INT 0.
    Halt,
    /// INT 3: execution can continue, but the driver should open its
    /// debugger first.
    StartDebugger,
    /// INT 6: the machine is blocked until a character arrives through
    /// [handle_int6](Simulator::handle_int6).
    WaitForInput,
}

/// The whole machine: CPU, memory and devices.
pub struct Simulator {
    program: Option<Program>,
    registers: Registers,
    memory: Memory,
    devices: Devices,
    halted: bool,
    waiting_for_input: bool,
    dispatcher: EventDispatcher,
}

impl Simulator {
    /// A machine with no program, zeroed memory and the switches-and-leds
    /// wiring.
    pub fn new() -> Simulator {
        Simulator {
            program: None,
            registers: Registers::new(),
            memory: Memory::new(),
            devices: Devices::new(DevicesConfiguration::SwitchesAndLeds),
            halted: false,
            waiting_for_input: false,
            dispatcher: EventDispatcher::new(),
        }
    }

    /// Registers a callback for the semantic events of the run. Listeners
    /// survive [load_program](Simulator::load_program).
    pub fn add_listener<L: EventListener + 'static>(&mut self, listener: L) {
        self.dispatcher.add_listener(listener);
    }

    /// Resets the machine and installs `program`: fresh registers, fresh
    /// devices in the requested configuration, and the memory image filled
    /// per `fill` before the program bytes are copied in.
    pub fn load_program(
        &mut self,
        program: &Program,
        fill: MemoryFill,
        configuration: DevicesConfiguration,
    ) {
        self.registers = Registers::new();
        self.devices = Devices::new(configuration);
        self.halted = false;
        self.waiting_for_input = false;
        self.memory.load(program, fill);
        self.program = Some(program.clone());
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    /// Reads a register.
    pub fn register(&self, register: Register) -> u16 {
        self.registers.get(register)
    }

    /// Writes a register and reports the change.
    pub fn set_register(&mut self, register: Register, value: u16) {
        self.registers.set(register, value);
        self.dispatcher.dispatch(Event::RegisterChange {
            register,
            value: self.registers.get(register),
        });
    }

    /// Reads a byte or word of data memory.
    pub fn read_memory(&mut self, address: u16, size: OperandSize) -> Result<u16, SimulatorError> {
        match size {
            OperandSize::Byte => Ok(u16::from(self.memory.read_byte(address)?)),
            OperandSize::Word => self.memory.read_word(address),
        }
    }

    /// Writes a byte or word of data memory and reports the change.
    pub fn write_memory(
        &mut self,
        address: u16,
        size: OperandSize,
        value: u16,
    ) -> Result<(), SimulatorError> {
        match size {
            OperandSize::Byte => self.memory.write_byte(address, value as u8)?,
            OperandSize::Word => self.memory.write_word(address, value)?,
        }

        self.dispatcher.dispatch(Event::MemoryChange {
            address,
            value: value & size.mask(),
        });
        Ok(())
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn devices(&self) -> &Devices {
        &self.devices
    }

    pub fn halted(&self) -> bool {
        self.halted
    }

    pub fn waiting_for_input(&self) -> bool {
        self.waiting_for_input
    }

    /// The console screen contents.
    pub fn console_text(&self) -> &str {
        self.devices.console.text()
    }

    /// Executes one instruction, or enters one pending hardware interrupt.
    ///
    /// A run-time error halts the machine for good. After a halt further
    /// calls keep returning [ControlSignal::Halt]; while input is awaited
    /// they keep returning [ControlSignal::WaitForInput] without moving.
    pub fn step(&mut self) -> Result<ControlSignal, SimulatorError> {
        if self.halted {
            return Ok(ControlSignal::Halt);
        }
        if self.waiting_for_input {
            return Ok(ControlSignal::WaitForInput);
        }

        match self.try_step() {
            Ok(ControlSignal::Halt) => {
                self.halted = true;
                Ok(ControlSignal::Halt)
            }
            Ok(ControlSignal::WaitForInput) => {
                self.waiting_for_input = true;
                Ok(ControlSignal::WaitForInput)
            }
            Ok(signal) => Ok(signal),
            Err(error) => {
                self.halted = true;
                Err(error)
            }
        }
    }

    /// Steps until the program stops continuing or `max_steps` is spent.
    pub fn run(&mut self, max_steps: usize) -> Result<ControlSignal, SimulatorError> {
        let mut signal = ControlSignal::Continue;

        for _ in 0..max_steps {
            signal = self.step()?;
            if signal != ControlSignal::Continue {
                break;
            }
        }

        Ok(signal)
    }

    /// Completes a pending INT 6: stores the character's byte at the
    /// address held in BX, echoes it to the console and unblocks execution.
    /// Does nothing when no input is awaited.
    pub fn handle_int6(&mut self, character: char) -> Result<(), SimulatorError> {
        if !self.waiting_for_input {
            return Ok(());
        }

        let value = character as u8;
        let address = self.registers.bx;

        match self.write_memory(address, OperandSize::Byte, u16::from(value)) {
            Ok(()) => {
                self.write_console(value);
                self.waiting_for_input = false;
                Ok(())
            }
            Err(error) => {
                self.halted = true;
                Err(error)
            }
        }
    }

    /// Advances the devices to `now` (virtual milliseconds).
    pub fn tick(&mut self, now: u64) {
        let before = self.devices.pic.irr();
        self.devices.tick(now);
        self.report_raised_lines(before);
    }

    /// Presses the F10 key, which is hard-wired to PIC line 0.
    pub fn press_f10(&mut self) {
        let before = self.devices.pic.irr();
        self.devices.pic.request(lines::F10);
        self.report_raised_lines(before);
    }

    /// Flips one switch of the switch bank, if one is wired up.
    pub fn toggle_switch(&mut self, index: u8) {
        self.devices.toggle_switch(index);
    }

    /// A serializable copy of the entire machine state.
    pub fn snapshot(&self) -> Snapshot {
        let mut vectors = [0u8; 8];
        for line in 0..8u8 {
            vectors[usize::from(line)] = self.devices.pic.vector(line);
        }

        Snapshot {
            registers: RegisterSnapshot {
                ax: self.registers.ax,
                bx: self.registers.bx,
                cx: self.registers.cx,
                dx: self.registers.dx,
                sp: self.registers.sp,
                ip: self.registers.ip,
                ir: self.registers.ir,
                flags: self.registers.flags.bits(),
            },
            memory: self.memory.bytes().to_vec(),
            console: self.devices.console.text().to_string(),
            halted: self.halted,
            waiting_for_input: self.waiting_for_input,
            configuration: self.devices.configuration().name().to_string(),
            pic: PicSnapshot {
                imr: self.devices.pic.imr(),
                irr: self.devices.pic.irr(),
                isr: self.devices.pic.isr(),
                vectors,
            },
            timer: TimerSnapshot {
                cont: self.devices.timer.cont(),
                comp: self.devices.timer.comp(),
            },
            pio: self.devices.pio().map(|pio| PioSnapshot {
                pa: pio.pa,
                pb: pio.pb,
                ca: pio.ca,
                cb: pio.cb,
            }),
            printer: self.devices.printer().map(|printer| PrinterSnapshot {
                buffer: printer.queued(),
                output: printer.output().to_string(),
            }),
            handshake: match (self.devices.handshake(), self.devices.printer()) {
                (Some(handshake), Some(printer)) => Some(HandshakeSnapshot {
                    data: handshake.read_data(),
                    state: handshake.read_state(printer),
                }),
                _ => None,
            },
            switches: self.devices.switches(),
            leds: self.devices.leds(),
        }
    }

    fn try_step(&mut self) -> Result<ControlSignal, SimulatorError> {
        if self.registers.flags.contains(Flags::INTERRUPTS) {
            if let Some(vector) = self.devices.pic.handle_next_interrupt() {
                self.enter_interrupt(vector)?;
                return Ok(ControlSignal::Continue);
            }
        }

        let ip = self.registers.ip;
        let (kind, length) = {
            let program = self.program.as_ref().ok_or(SimulatorError::NoProgramLoaded)?;
            let instruction = program
                .instruction_at(ip)
                .ok_or(SimulatorError::NoInstruction { address: ip })?;
            (instruction.kind, u16::from(instruction.length()))
        };

        self.registers.ir = self.memory.fetch_byte(ip)?;
        self.execute(kind, length)
    }

    /// Transfers control to the service routine of a hardware interrupt:
    /// push FLAGS, push the return address, clear IF, jump through the
    /// vector table.
    fn enter_interrupt(&mut self, vector: u8) -> Result<(), SimulatorError> {
        if let 0 | 3 | 6 | 7 = vector {
            return Err(SimulatorError::ReservedInterrupt { vector });
        }

        let flags = self.registers.flags.bits();
        self.push(flags)?;
        let return_address = self.registers.ip;
        self.push(return_address)?;

        self.registers.flags.remove(Flags::INTERRUPTS);
        self.registers.ip = self.memory.read_word(u16::from(vector) * 4)?;
        Ok(())
    }

    fn execute(
        &mut self,
        kind: InstructionKind,
        length: u16,
    ) -> Result<ControlSignal, SimulatorError> {
        match kind {
            InstructionKind::Binary { op, size, operands } => {
                let source = self.binary_source(size, operands)?;

                match binary_alu_op(op) {
                    // MOV is the one transfer in the group; it skips the ALU
                    // and leaves the flags alone.
                    None => self.write_binary_dest(size, operands, source)?,
                    Some(alu_op) => {
                        let dest = self.binary_dest(size, operands)?;
                        let (result, flags) =
                            alu::execute(alu_op, size, dest, source, self.registers.flags);
                        self.registers.flags = flags;

                        if op != BinaryOp::Cmp {
                            self.write_binary_dest(size, operands, result)?;
                        }
                    }
                }

                self.advance(length);
                Ok(ControlSignal::Continue)
            }

            InstructionKind::Unary { op, size, operand } => {
                let value = self.unary_value(size, operand)?;
                let flags = self.registers.flags;

                let (result, flags) = match op {
                    UnaryOp::Not => alu::execute(AluOp::Not, size, 0, value, flags),
                    UnaryOp::Inc => alu::execute(AluOp::Add, size, value, 1, flags),
                    UnaryOp::Dec => alu::execute(AluOp::Sub, size, value, 1, flags),
                    UnaryOp::Neg => alu::execute(AluOp::Sub, size, 0, value, flags),
                };

                self.registers.flags = flags;
                self.write_unary(size, operand, result)?;

                self.advance(length);
                Ok(ControlSignal::Continue)
            }

            InstructionKind::Stack { op, register } => {
                match op {
                    StackOp::Push => {
                        let value = self.registers.get(register);
                        self.push(value)?;
                    }
                    StackOp::Pop => {
                        let value = self.pop()?;
                        self.set_register(register, value);
                    }
                }

                self.advance(length);
                Ok(ControlSignal::Continue)
            }

            InstructionKind::Jump { op, target } => {
                let flags = self.registers.flags;
                let taken = match op {
                    JumpOp::Jmp => true,
                    JumpOp::Call => {
                        let return_address = self.registers.ip + length;
                        self.push(return_address)?;
                        true
                    }
                    JumpOp::Jc => flags.contains(Flags::CARRY),
                    JumpOp::Jnc => !flags.contains(Flags::CARRY),
                    JumpOp::Jo => flags.contains(Flags::OVERFLOW),
                    JumpOp::Jno => !flags.contains(Flags::OVERFLOW),
                    JumpOp::Js => flags.contains(Flags::SIGN),
                    JumpOp::Jns => !flags.contains(Flags::SIGN),
                    JumpOp::Jz => flags.contains(Flags::ZERO),
                    JumpOp::Jnz => !flags.contains(Flags::ZERO),
                };

                if taken {
                    self.registers.ip = target;
                } else {
                    self.advance(length);
                }

                Ok(ControlSignal::Continue)
            }

            InstructionKind::Io { op, size, port } => {
                let port = match port {
                    Port::Fixed(number) => u16::from(number),
                    Port::Variable => self.registers.dx,
                };
                let accumulator = match size {
                    OperandSize::Byte => Register::AL,
                    OperandSize::Word => Register::AX,
                };

                match op {
                    IoOp::In => {
                        let low = u16::from(self.devices.read(port)?);
                        let value = match size {
                            OperandSize::Byte => low,
                            OperandSize::Word => {
                                low | u16::from(self.devices.read(port.wrapping_add(1))?) << 8
                            }
                        };
                        self.set_register(accumulator, value);
                    }
                    IoOp::Out => {
                        let value = self.registers.get(accumulator);
                        self.devices.write(port, value as u8)?;
                        if size == OperandSize::Word {
                            self.devices.write(port.wrapping_add(1), (value >> 8) as u8)?;
                        }
                    }
                }

                self.advance(length);
                Ok(ControlSignal::Continue)
            }

            InstructionKind::Int { vector } => self.software_interrupt(vector, length),

            InstructionKind::Zeroary { op } => {
                match op {
                    ZeroaryOp::Pushf => {
                        let flags = self.registers.flags.bits();
                        self.push(flags)?;
                    }
                    ZeroaryOp::Popf => {
                        let value = self.pop()?;
                        self.registers.flags = Flags::from_bits_truncate(value);
                    }
                    ZeroaryOp::Ret => {
                        self.registers.ip = self.pop()?;
                        return Ok(ControlSignal::Continue);
                    }
                    ZeroaryOp::Iret => {
                        self.registers.ip = self.pop()?;
                        let flags = self.pop()?;
                        self.registers.flags = Flags::from_bits_truncate(flags);
                        return Ok(ControlSignal::Continue);
                    }
                    ZeroaryOp::Cli => {
                        self.registers.flags.remove(Flags::INTERRUPTS);
                    }
                    ZeroaryOp::Sti => {
                        self.registers.flags.insert(Flags::INTERRUPTS);
                    }
                    ZeroaryOp::Nop => {}
                    ZeroaryOp::Hlt => {
                        self.advance(length);
                        return Ok(ControlSignal::Halt);
                    }
                }

                self.advance(length);
                Ok(ControlSignal::Continue)
            }
        }
    }

    /// The software interrupts are system calls: 0 exits, 3 pauses for the
    /// debugger, 6 reads one character, 7 prints AL characters from [BX].
    fn software_interrupt(
        &mut self,
        vector: u8,
        length: u16,
    ) -> Result<ControlSignal, SimulatorError> {
        match vector {
            0 => {
                self.advance(length);
                Ok(ControlSignal::Halt)
            }
            3 => {
                self.advance(length);
                Ok(ControlSignal::StartDebugger)
            }
            6 => {
                // IP already points past the INT, so handle_int6 resumes at
                // the next instruction.
                self.advance(length);
                Ok(ControlSignal::WaitForInput)
            }
            7 => {
                let start = self.registers.bx;
                let count = self.registers.get(Register::AL);

                for offset in 0..count {
                    let value = self.memory.read_byte(start.wrapping_add(offset))?;
                    self.write_console(value);
                }

                self.advance(length);
                Ok(ControlSignal::Continue)
            }
            vector => Err(SimulatorError::ReservedInterrupt { vector }),
        }
    }

    fn binary_source(
        &mut self,
        size: OperandSize,
        operands: BinaryOperands,
    ) -> Result<u16, SimulatorError> {
        match operands {
            BinaryOperands::RegReg { src, .. }
            | BinaryOperands::DirReg { src, .. }
            | BinaryOperands::IndReg { src } => Ok(self.registers.get(src)),
            BinaryOperands::RegImm { value, .. }
            | BinaryOperands::DirImm { value, .. }
            | BinaryOperands::IndImm { value } => Ok(value),
            BinaryOperands::RegDir { addr, .. } => self.read_memory(addr, size),
            BinaryOperands::RegInd { .. } => {
                let addr = self.registers.bx;
                self.read_memory(addr, size)
            }
        }
    }

    fn binary_dest(
        &mut self,
        size: OperandSize,
        operands: BinaryOperands,
    ) -> Result<u16, SimulatorError> {
        match operands {
            BinaryOperands::RegReg { dest, .. }
            | BinaryOperands::RegDir { dest, .. }
            | BinaryOperands::RegInd { dest }
            | BinaryOperands::RegImm { dest, .. } => Ok(self.registers.get(dest)),
            BinaryOperands::DirReg { addr, .. } | BinaryOperands::DirImm { addr, .. } => {
                self.read_memory(addr, size)
            }
            BinaryOperands::IndReg { .. } | BinaryOperands::IndImm { .. } => {
                let addr = self.registers.bx;
                self.read_memory(addr, size)
            }
        }
    }

    fn write_binary_dest(
        &mut self,
        size: OperandSize,
        operands: BinaryOperands,
        value: u16,
    ) -> Result<(), SimulatorError> {
        match operands {
            BinaryOperands::RegReg { dest, .. }
            | BinaryOperands::RegDir { dest, .. }
            | BinaryOperands::RegInd { dest }
            | BinaryOperands::RegImm { dest, .. } => {
                self.set_register(dest, value);
                Ok(())
            }
            BinaryOperands::DirReg { addr, .. } | BinaryOperands::DirImm { addr, .. } => {
                self.write_memory(addr, size, value)
            }
            BinaryOperands::IndReg { .. } | BinaryOperands::IndImm { .. } => {
                let addr = self.registers.bx;
                self.write_memory(addr, size, value)
            }
        }
    }

    fn unary_value(
        &mut self,
        size: OperandSize,
        operand: UnaryOperand,
    ) -> Result<u16, SimulatorError> {
        match operand {
            UnaryOperand::Register(register) => Ok(self.registers.get(register)),
            UnaryOperand::Direct(addr) => self.read_memory(addr, size),
            UnaryOperand::Indirect => {
                let addr = self.registers.bx;
                self.read_memory(addr, size)
            }
        }
    }

    fn write_unary(
        &mut self,
        size: OperandSize,
        operand: UnaryOperand,
        value: u16,
    ) -> Result<(), SimulatorError> {
        match operand {
            UnaryOperand::Register(register) => {
                self.set_register(register, value);
                Ok(())
            }
            UnaryOperand::Direct(addr) => self.write_memory(addr, size, value),
            UnaryOperand::Indirect => {
                let addr = self.registers.bx;
                self.write_memory(addr, size, value)
            }
        }
    }

    fn push(&mut self, value: u16) -> Result<(), SimulatorError> {
        if self.registers.sp < 2 {
            return Err(SimulatorError::StackOverflow);
        }

        let sp = self.registers.sp - 2;
        self.set_register(Register::SP, sp);
        // SP stays decremented even when the write fails; a step is not
        // transactional.
        self.write_memory(sp, OperandSize::Word, value)
    }

    fn pop(&mut self) -> Result<u16, SimulatorError> {
        let sp = self.registers.sp;
        if u32::from(sp) + 2 > MEMORY_SIZE as u32 {
            return Err(SimulatorError::StackUnderflow);
        }

        let value = self.memory.read_word(sp)?;
        self.set_register(Register::SP, sp + 2);
        Ok(value)
    }

    fn advance(&mut self, length: u16) {
        self.registers.ip += length;
    }

    fn write_console(&mut self, value: u8) {
        self.devices.console.write(value);
        self.dispatcher.dispatch(Event::ConsoleOutput(char::from(value)));
    }

    fn report_raised_lines(&mut self, before: u8) {
        let raised = self.devices.pic.irr() & !before;
        for line in 0..8u8 {
            if raised & (1 << line) != 0 {
                self.dispatcher.dispatch(Event::InterruptRaised { line });
            }
        }
    }
}

fn binary_alu_op(op: BinaryOp) -> Option<AluOp> {
    match op {
        BinaryOp::Mov => None,
        BinaryOp::And => Some(AluOp::And),
        BinaryOp::Or => Some(AluOp::Or),
        BinaryOp::Xor => Some(AluOp::Xor),
        BinaryOp::Add => Some(AluOp::Add),
        BinaryOp::Adc => Some(AluOp::Adc),
        BinaryOp::Sub => Some(AluOp::Sub),
        BinaryOp::Sbb => Some(AluOp::Sbb),
        BinaryOp::Cmp => Some(AluOp::Sub),
    }
}

#[cfg(test)]
use crate::asm::assemble;

#[cfg(test)]
macro_rules! assert_register {
    ($simulator:expr, $register:expr, $value:expr) => {
        assert_eq!(
            $simulator.register($register),
            $value,
            "register {} != {:#06X}",
            $register,
            $value
        );
    };
}

#[cfg(test)]
fn boot(source: &str) -> Simulator {
    let program = assemble(source).expect("the test program must assemble");
    let mut simulator = Simulator::new();
    simulator.load_program(
        &program,
        MemoryFill::Zero,
        DevicesConfiguration::SwitchesAndLeds,
    );
    simulator
}

#[cfg(test)]
fn run_to_halt(simulator: &mut Simulator) {
    let signal = simulator.run(1000).expect("the test program must not fault");
    assert_eq!(signal, ControlSignal::Halt);
}

#[test]
fn test_transfer_and_arithmetic() {
    let mut simulator = boot(
        r#"
        org 2000h
        mov ax, 1200h
        mov bl, 34h
        add al, bl
        hlt
        end
    "#,
    );

    run_to_halt(&mut simulator);

    assert_register!(simulator, Register::AX, 0x1234);
    assert_register!(simulator, Register::BL, 0x34);
    assert!(!simulator.registers().flags.contains(Flags::ZERO));
}

#[test]
fn test_mov_leaves_the_flags_alone() {
    let mut simulator = boot(
        r#"
        org 2000h
        mov al, 5
        hlt
        end
    "#,
    );

    run_to_halt(&mut simulator);

    // ZF comes straight from the reset state.
    assert!(simulator.registers().flags.contains(Flags::ZERO));
}

#[test]
fn test_memory_operands() {
    let mut simulator = boot(
        r#"
        org 1000h
        x db 40
        y dw 1000

        org 2000h
        mov al, x
        add x, al
        mov bx, offset y
        inc word ptr [bx]
        hlt
        end
    "#,
    );

    run_to_halt(&mut simulator);

    assert_eq!(simulator.memory().bytes()[0x1000], 80);
    assert_eq!(
        simulator.read_memory(0x1001, OperandSize::Word),
        Ok(1001)
    );
}

#[test]
fn test_compare_and_conditional_jumps() {
    let mut simulator = boot(
        r#"
        org 2000h
        mov cl, 3
again:  dec cl
        jnz again
        hlt
        end
    "#,
    );

    run_to_halt(&mut simulator);

    assert_register!(simulator, Register::CL, 0);
    assert!(simulator.registers().flags.contains(Flags::ZERO));
}

#[test]
fn test_call_and_ret() {
    let mut simulator = boot(
        r#"
        org 2000h
        mov ax, 5
        call double
        hlt
double: add ax, ax
        ret
        end
    "#,
    );

    run_to_halt(&mut simulator);

    assert_register!(simulator, Register::AX, 10);
    assert_register!(simulator, Register::SP, 0x4000);
}

#[test]
fn test_word_io_reads_two_ports() {
    let mut simulator = boot(
        r#"
        org 2000h
        in ax, 10h
        hlt
        end
    "#,
    );

    run_to_halt(&mut simulator);

    // CONT is 0 and COMP resets to FFh.
    assert_register!(simulator, Register::AX, 0xFF00);
}

#[test]
fn test_hardware_interrupt_entry() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let mut simulator = boot(
        r#"
        org 40h
        dw isr

        org 2000h
        mov al, 0FEh
        out 21h, al
wait:   jmp wait
isr:    mov bl, 7
        iret
        end
    "#,
    );

    let raised = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&raised);
    simulator.add_listener(move |event: &Event| {
        if let Event::InterruptRaised { line } = event {
            sink.borrow_mut().push(*line);
        }
    });

    simulator.run(4).unwrap();
    assert_register!(simulator, Register::BL, 0);

    simulator.press_f10();
    assert_eq!(*raised.borrow(), vec![lines::F10]);

    // Entry, MOV, IRET, and one spin of the wait loop.
    simulator.run(4).unwrap();
    assert_register!(simulator, Register::BL, 7);
    assert_register!(simulator, Register::SP, 0x4000);
    assert!(simulator.registers().flags.contains(Flags::INTERRUPTS));
}

#[test]
fn test_int3_asks_for_the_debugger() {
    let mut simulator = boot(
        r#"
        org 2000h
        nop
        int 3
        hlt
        end
    "#,
    );

    assert_eq!(simulator.step(), Ok(ControlSignal::Continue));
    assert_eq!(simulator.step(), Ok(ControlSignal::StartDebugger));
    assert!(!simulator.halted());
    assert_eq!(simulator.step(), Ok(ControlSignal::Halt));
}

#[test]
fn test_int6_waits_for_one_character() {
    let mut simulator = boot(
        r#"
        org 1000h
buffer  db ?

        org 2000h
        mov bx, offset buffer
        int 6
        hlt
        end
    "#,
    );

    assert_eq!(simulator.run(10), Ok(ControlSignal::WaitForInput));
    // Still waiting; the machine refuses to move.
    assert_eq!(simulator.step(), Ok(ControlSignal::WaitForInput));

    simulator.handle_int6('A').unwrap();
    assert_eq!(simulator.memory().bytes()[0x1000], 0x41);
    assert_eq!(simulator.console_text(), "A");

    run_to_halt(&mut simulator);
}

#[test]
fn test_errors_are_fatal() {
    let mut simulator = boot(
        r#"
        org 2000h
        mov sp, 2
        push ax
        push ax
        hlt
        end
    "#,
    );

    assert_eq!(simulator.run(10), Err(SimulatorError::StackOverflow));
    assert!(simulator.halted());
    assert_eq!(simulator.step(), Ok(ControlSignal::Halt));
}

#[test]
fn test_stepping_without_a_program() {
    let mut simulator = Simulator::new();
    assert_eq!(simulator.step(), Err(SimulatorError::NoProgramLoaded));
}

#[test]
fn test_running_off_the_program_is_an_error() {
    let mut simulator = boot(
        r#"
        org 2000h
        mov ax, 1
        end
    "#,
    );

    assert_eq!(simulator.step(), Ok(ControlSignal::Continue));
    assert_eq!(
        simulator.step(),
        Err(SimulatorError::NoInstruction { address: 0x2004 })
    );
}
