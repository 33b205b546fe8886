//! Serializable machine state.
//!
//! [Snapshot] is a plain-data copy of everything a
//! [Simulator](crate::emulator::Simulator) holds, cheap to diff and to
//! serialize. Front ends persist them between sessions and graders compare
//! them against expected runs. Device blocks that the active configuration
//! does not wire up stay `None`.

use serde::{Deserialize, Serialize};

/// The full machine state at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub registers: RegisterSnapshot,
    /// The whole 16 KiB memory image.
    pub memory: Vec<u8>,
    /// The console screen contents.
    pub console: String,
    pub halted: bool,
    pub waiting_for_input: bool,
    /// The device configuration name, as accepted by
    /// [DevicesConfiguration](crate::emulator::DevicesConfiguration).
    pub configuration: String,
    pub pic: PicSnapshot,
    pub timer: TimerSnapshot,
    pub pio: Option<PioSnapshot>,
    pub printer: Option<PrinterSnapshot>,
    pub handshake: Option<HandshakeSnapshot>,
    pub switches: Option<u8>,
    pub leds: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSnapshot {
    pub ax: u16,
    pub bx: u16,
    pub cx: u16,
    pub dx: u16,
    pub sp: u16,
    pub ip: u16,
    pub ir: u8,
    /// The FLAGS register as a raw word.
    pub flags: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PicSnapshot {
    pub imr: u8,
    pub irr: u8,
    pub isr: u8,
    pub vectors: [u8; 8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub cont: u8,
    pub comp: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PioSnapshot {
    pub pa: u8,
    pub pb: u8,
    pub ca: u8,
    pub cb: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterSnapshot {
    /// Characters accepted but not yet printed.
    pub buffer: Vec<u8>,
    /// The page printed so far.
    pub output: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeSnapshot {
    pub data: u8,
    /// The state register as a program would read it, busy bit included.
    pub state: u8,
}
