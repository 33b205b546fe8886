//! The handshake printer interface.

use super::printer::Printer;

const BUSY: u8 = 0b0000_0001;
const STROBE: u8 = 0b0000_0010;
const INTERRUPTS: u8 = 0b1000_0000;

/// Two-register protocol in front of the printer.
///
/// DATA holds the byte to print; writing it sends the byte on its way
/// immediately. STATE bit 0 mirrors the printer's busy line, bit 1 is a
/// software strobe that resends DATA, bit 7 enables interrupt-driven
/// printing over PIC line 2.
pub struct Handshake {
    data: u8,
    state: u8,
}

impl Handshake {
    pub fn new() -> Handshake {
        Handshake { data: 0, state: 0 }
    }

    pub fn read_data(&self) -> u8 {
        self.data
    }

    /// Latches a byte and strobes it into the printer. The byte is lost if
    /// the printer is busy.
    pub fn write_data(&mut self, value: u8, printer: &mut Printer) {
        self.data = value;
        printer.add_to_buffer(value);
    }

    /// STATE with the live busy level on bit 0. The strobe bit always reads
    /// back 0.
    pub fn read_state(&self, printer: &Printer) -> u8 {
        let busy = if printer.busy() { BUSY } else { 0 };
        (self.state & !(BUSY | STROBE)) | busy
    }

    /// Stores STATE. A 1 in the strobe bit resends DATA to the printer; the
    /// busy bit belongs to the printer and cannot be written.
    pub fn write_state(&mut self, value: u8, printer: &mut Printer) {
        if value & STROBE != 0 {
            printer.add_to_buffer(self.data);
        }
        self.state = value & !(BUSY | STROBE);
    }

    /// True when bit 7 asks for interrupt-driven printing.
    pub fn interrupts_enabled(&self) -> bool {
        self.state & INTERRUPTS != 0
    }

    /// The raw STATE latch, without the live bits.
    pub fn state(&self) -> u8 {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writing_data_prints_immediately() {
        let mut printer = Printer::new();
        let mut handshake = Handshake::new();

        handshake.write_data(b'h', &mut printer);
        handshake.write_data(b'i', &mut printer);

        assert_eq!(printer.queued(), vec![b'h', b'i']);
        assert_eq!(handshake.read_data(), b'i');
    }

    #[test]
    fn the_strobe_bit_resends_and_reads_back_zero() {
        let mut printer = Printer::new();
        let mut handshake = Handshake::new();

        handshake.write_data(b'x', &mut printer);
        handshake.write_state(STROBE, &mut printer);

        assert_eq!(printer.queued(), vec![b'x', b'x']);
        assert_eq!(handshake.read_state(&printer) & STROBE, 0);
    }

    #[test]
    fn the_busy_bit_mirrors_the_printer() {
        let mut printer = Printer::new();
        let mut handshake = Handshake::new();

        assert_eq!(handshake.read_state(&printer) & BUSY, 0);

        for value in b"12345" {
            handshake.write_data(*value, &mut printer);
        }
        assert_eq!(handshake.read_state(&printer) & BUSY, BUSY);

        // Writing the busy bit changes nothing.
        handshake.write_state(BUSY, &mut printer);
        printer.tick(Printer::INTERVAL);
        assert_eq!(handshake.read_state(&printer) & BUSY, 0);
    }

    #[test]
    fn bit_7_is_the_interrupt_switch() {
        let mut printer = Printer::new();
        let mut handshake = Handshake::new();

        assert!(!handshake.interrupts_enabled());
        handshake.write_state(INTERRUPTS, &mut printer);
        assert!(handshake.interrupts_enabled());
    }
}
