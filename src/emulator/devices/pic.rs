//! The programmable interrupt controller.

/// Interrupt controller with eight request lines.
///
/// Devices raise and drop lines through [request](Pic::request) and
/// [cancel](Pic::cancel); software configures the mask and the vectors
/// through the I/O ports at 20h..2Bh. One interrupt is in service at a time
/// until the EOI command arrives.
pub struct Pic {
    imr: u8,
    irr: u8,
    isr: u8,
    vectors: [u8; 8],
}

impl Pic {
    /// A fresh controller: everything masked, nothing pending, vectors
    /// 10h..17h.
    pub fn new() -> Pic {
        Pic {
            imr: 0xFF,
            irr: 0,
            isr: 0,
            vectors: [0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17],
        }
    }

    /// Raises interrupt line `line`.
    pub fn request(&mut self, line: u8) {
        self.irr |= 1 << line;
    }

    /// Drops a request that has not been serviced yet.
    pub fn cancel(&mut self, line: u8) {
        self.irr &= !(1 << line);
    }

    /// Picks the next interrupt to service, if any.
    ///
    /// The winner is the lowest-numbered unmasked pending line; its IRR bit
    /// moves to ISR and its vector is returned. While ISR is nonzero a
    /// service routine is still running and nothing new is dispatched.
    pub fn handle_next_interrupt(&mut self) -> Option<u8> {
        if self.isr != 0 {
            return None;
        }

        let ready = self.irr & !self.imr;
        for line in 0..8u8 {
            let bit = 1 << line;
            if ready & bit != 0 {
                self.irr &= !bit;
                self.isr |= bit;
                return Some(self.vectors[usize::from(line)]);
            }
        }

        None
    }

    /// The EOI command: ends the interrupt in service.
    pub fn end_of_interrupt(&mut self) {
        self.isr = 0;
    }

    pub fn imr(&self) -> u8 {
        self.imr
    }

    pub fn set_imr(&mut self, value: u8) {
        self.imr = value;
    }

    pub fn irr(&self) -> u8 {
        self.irr
    }

    pub fn isr(&self) -> u8 {
        self.isr
    }

    pub fn vector(&self, line: u8) -> u8 {
        self.vectors[usize::from(line)]
    }

    pub fn set_vector(&mut self, line: u8, vector: u8) {
        self.vectors[usize::from(line)] = vector;
    }
}
