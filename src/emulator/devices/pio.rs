//! The parallel input/output interface.

/// Two 8-bit data ports with per-bit direction control.
///
/// A control bit of 1 marks the matching data bit as input, 0 as output.
/// The PIO itself is four dumb latches; what the lines connect to is the
/// device configuration's business.
pub struct Pio {
    pub pa: u8,
    pub pb: u8,
    pub ca: u8,
    pub cb: u8,
}

impl Pio {
    pub fn new() -> Pio {
        Pio {
            pa: 0,
            pb: 0,
            ca: 0,
            cb: 0,
        }
    }

    /// The externally visible lines of port A when `driven` sits on the
    /// input bits: latched values where the direction is output, `driven`
    /// where it is input.
    pub fn lines_a(&self, driven: u8) -> u8 {
        (self.pa & !self.ca) | (driven & self.ca)
    }

    /// Same composition for port B.
    pub fn lines_b(&self, driven: u8) -> u8 {
        (self.pb & !self.cb) | (driven & self.cb)
    }
}
