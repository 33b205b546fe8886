//! The devices behind the I/O address space.
//!
//! The fixed port map is decoded here; the devices themselves live in the
//! submodules. The timer, the interrupt controller and the console exist in
//! every machine; which parallel peripherals exist depends on the
//! [DevicesConfiguration] the program was loaded with. Touching a port with
//! no device behind it is a run-time error.

pub mod console;
pub mod handshake;
pub mod pic;
pub mod pio;
pub mod printer;
pub mod timer;

use std::fmt;
use std::str::FromStr;

use crate::error::SimulatorError;

use self::console::Console;
use self::handshake::Handshake;
use self::pic::Pic;
use self::pio::Pio;
use self::printer::Printer;
use self::timer::Timer;

/// Interrupt lines with fixed wiring.
pub mod lines {
    /// The F10 key.
    pub const F10: u8 = 0;
    /// The interval timer.
    pub const TIMER: u8 = 1;
    /// The handshake interface.
    pub const HANDSHAKE: u8 = 2;
}

/// Peripheral wiring selected when a program is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicesConfiguration {
    /// Switch bank on PIO port A, LED bank on port B.
    SwitchesAndLeds,
    /// Printer polled through the PIO: busy on PA bit 0, strobe on PA
    /// bit 1, data on port B.
    PrinterPio,
    /// Printer driven through the handshake interface on PIC line 2.
    PrinterHandshake,
}

impl DevicesConfiguration {
    pub fn name(self) -> &'static str {
        match self {
            DevicesConfiguration::SwitchesAndLeds => "switches-and-leds",
            DevicesConfiguration::PrinterPio => "printer-pio",
            DevicesConfiguration::PrinterHandshake => "printer-handshake",
        }
    }
}

impl FromStr for DevicesConfiguration {
    type Err = ();

    fn from_str(name: &str) -> Result<DevicesConfiguration, ()> {
        match name {
            "switches-and-leds" => Ok(DevicesConfiguration::SwitchesAndLeds),
            "printer-pio" => Ok(DevicesConfiguration::PrinterPio),
            "printer-handshake" => Ok(DevicesConfiguration::PrinterHandshake),
            _ => Err(()),
        }
    }
}

impl fmt::Display for DevicesConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The peripherals that differ between configurations.
enum Peripherals {
    SwitchesAndLeds { pio: Pio, switches: u8 },
    PrinterPio { pio: Pio, printer: Printer },
    PrinterHandshake { handshake: Handshake, printer: Printer },
}

/// Every device of the machine plus the port decoding between them.
pub struct Devices {
    configuration: DevicesConfiguration,
    pub pic: Pic,
    pub timer: Timer,
    pub console: Console,
    peripherals: Peripherals,
}

impl Devices {
    pub fn new(configuration: DevicesConfiguration) -> Devices {
        let peripherals = match configuration {
            DevicesConfiguration::SwitchesAndLeds => Peripherals::SwitchesAndLeds {
                pio: Pio::new(),
                switches: 0,
            },
            DevicesConfiguration::PrinterPio => Peripherals::PrinterPio {
                pio: Pio::new(),
                printer: Printer::new(),
            },
            DevicesConfiguration::PrinterHandshake => Peripherals::PrinterHandshake {
                handshake: Handshake::new(),
                printer: Printer::new(),
            },
        };

        Devices {
            configuration,
            pic: Pic::new(),
            timer: Timer::new(),
            console: Console::new(),
            peripherals,
        }
    }

    pub fn configuration(&self) -> DevicesConfiguration {
        self.configuration
    }

    /// Reads one I/O port.
    pub fn read(&self, port: u16) -> Result<u8, SimulatorError> {
        match port {
            0x10 => Ok(self.timer.cont()),
            0x11 => Ok(self.timer.comp()),
            // 20h is the command port and has nothing to say back.
            0x20 => Ok(0),
            0x21 => Ok(self.pic.imr()),
            0x22 => Ok(self.pic.irr()),
            0x23 => Ok(self.pic.isr()),
            0x24..=0x2B => Ok(self.pic.vector((port - 0x24) as u8)),
            0x30..=0x33 => self.read_pio(port),
            0x40 | 0x41 => self.read_handshake(port),
            _ => Err(SimulatorError::IoMemoryNotImplemented { port }),
        }
    }

    /// Writes one I/O port.
    pub fn write(&mut self, port: u16, value: u8) -> Result<(), SimulatorError> {
        match port {
            0x10 => self.timer.set_cont(value),
            0x11 => self.timer.set_comp(value),
            0x20 => {
                if value == 0x20 {
                    self.pic.end_of_interrupt();
                }
            }
            0x21 => self.pic.set_imr(value),
            // IRR and ISR are read-only; writes land in the bit bucket.
            0x22 | 0x23 => {}
            0x24..=0x2B => self.pic.set_vector((port - 0x24) as u8, value),
            0x30..=0x33 => return self.write_pio(port, value),
            0x40 | 0x41 => return self.write_handshake(port, value),
            _ => return Err(SimulatorError::IoMemoryNotImplemented { port }),
        }

        Ok(())
    }

    fn read_pio(&self, port: u16) -> Result<u8, SimulatorError> {
        let (pio, driven_a) = match &self.peripherals {
            Peripherals::SwitchesAndLeds { pio, switches } => (pio, *switches),
            Peripherals::PrinterPio { pio, printer } => (pio, printer.busy() as u8),
            Peripherals::PrinterHandshake { .. } => {
                return Err(SimulatorError::IoMemoryNotImplemented { port });
            }
        };

        Ok(match port {
            0x30 => pio.lines_a(driven_a),
            0x31 => pio.pb,
            0x32 => pio.ca,
            _ => pio.cb,
        })
    }

    fn write_pio(&mut self, port: u16, value: u8) -> Result<(), SimulatorError> {
        match &mut self.peripherals {
            Peripherals::SwitchesAndLeds { pio, .. } => {
                write_pio_register(pio, port, value);
                Ok(())
            }
            Peripherals::PrinterPio { pio, printer } => {
                write_pio_register(pio, port, value);
                // Any register write may move the strobe line, but only
                // when its direction is output.
                if pio.ca & 0b10 == 0 {
                    printer.set_strobe(pio.pa & 0b10 != 0, pio.lines_b(0));
                }
                Ok(())
            }
            Peripherals::PrinterHandshake { .. } => {
                Err(SimulatorError::IoMemoryNotImplemented { port })
            }
        }
    }

    fn read_handshake(&self, port: u16) -> Result<u8, SimulatorError> {
        match &self.peripherals {
            Peripherals::PrinterHandshake { handshake, printer } => Ok(match port {
                0x40 => handshake.read_data(),
                _ => handshake.read_state(printer),
            }),
            _ => Err(SimulatorError::IoMemoryNotImplemented { port }),
        }
    }

    fn write_handshake(&mut self, port: u16, value: u8) -> Result<(), SimulatorError> {
        match &mut self.peripherals {
            Peripherals::PrinterHandshake { handshake, printer } => {
                match port {
                    0x40 => handshake.write_data(value, printer),
                    _ => handshake.write_state(value, printer),
                }
                Ok(())
            }
            _ => Err(SimulatorError::IoMemoryNotImplemented { port }),
        }
    }

    /// Advances every time-driven device to `now` (virtual milliseconds)
    /// and refreshes the interrupt lines they drive.
    pub fn tick(&mut self, now: u64) {
        if self.timer.tick(now) {
            self.pic.request(lines::TIMER);
        }

        match &mut self.peripherals {
            Peripherals::SwitchesAndLeds { .. } => {}
            Peripherals::PrinterPio { printer, .. } => printer.tick(now),
            Peripherals::PrinterHandshake { handshake, printer } => {
                printer.tick(now);

                if handshake.interrupts_enabled() {
                    if printer.busy() {
                        self.pic.cancel(lines::HANDSHAKE);
                    } else {
                        self.pic.request(lines::HANDSHAKE);
                    }
                }
            }
        }
    }

    /// Flips one input switch. Does nothing unless the switch bank is
    /// wired up.
    pub fn toggle_switch(&mut self, index: u8) {
        if index >= 8 {
            return;
        }

        if let Peripherals::SwitchesAndLeds { switches, .. } = &mut self.peripherals {
            *switches ^= 1 << index;
        }
    }

    /// The switch bank levels.
    pub fn switches(&self) -> Option<u8> {
        match &self.peripherals {
            Peripherals::SwitchesAndLeds { switches, .. } => Some(*switches),
            _ => None,
        }
    }

    /// The lit LEDs: output bits of PIO port B.
    pub fn leds(&self) -> Option<u8> {
        match &self.peripherals {
            Peripherals::SwitchesAndLeds { pio, .. } => Some(pio.lines_b(0)),
            _ => None,
        }
    }

    pub fn printer(&self) -> Option<&Printer> {
        match &self.peripherals {
            Peripherals::PrinterPio { printer, .. }
            | Peripherals::PrinterHandshake { printer, .. } => Some(printer),
            Peripherals::SwitchesAndLeds { .. } => None,
        }
    }

    pub fn pio(&self) -> Option<&Pio> {
        match &self.peripherals {
            Peripherals::SwitchesAndLeds { pio, .. } | Peripherals::PrinterPio { pio, .. } => {
                Some(pio)
            }
            Peripherals::PrinterHandshake { .. } => None,
        }
    }

    pub fn handshake(&self) -> Option<&Handshake> {
        match &self.peripherals {
            Peripherals::PrinterHandshake { handshake, .. } => Some(handshake),
            _ => None,
        }
    }
}

fn write_pio_register(pio: &mut Pio, port: u16, value: u8) {
    match port {
        0x30 => pio.pa = value,
        0x31 => pio.pb = value,
        0x32 => pio.ca = value,
        _ => pio.cb = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ports_without_a_device_are_not_implemented() {
        let mut devices = Devices::new(DevicesConfiguration::SwitchesAndLeds);

        assert_eq!(
            devices.read(0x50),
            Err(SimulatorError::IoMemoryNotImplemented { port: 0x50 })
        );
        assert_eq!(
            devices.read(0x40),
            Err(SimulatorError::IoMemoryNotImplemented { port: 0x40 })
        );
        assert_eq!(
            devices.write(0x41, 0),
            Err(SimulatorError::IoMemoryNotImplemented { port: 0x41 })
        );

        let devices = Devices::new(DevicesConfiguration::PrinterHandshake);
        assert_eq!(
            devices.read(0x30),
            Err(SimulatorError::IoMemoryNotImplemented { port: 0x30 })
        );
    }

    #[test]
    fn the_timer_counts_through_its_ports() {
        let mut devices = Devices::new(DevicesConfiguration::SwitchesAndLeds);

        devices.write(0x11, 2).unwrap();
        assert_eq!(devices.read(0x11), Ok(2));

        devices.tick(Timer::INTERVAL);
        assert_eq!(devices.read(0x10), Ok(1));
        assert_eq!(devices.pic.irr(), 0);

        devices.tick(2 * Timer::INTERVAL);
        assert_eq!(devices.read(0x10), Ok(2));
        assert_eq!(devices.pic.irr(), 1 << lines::TIMER);
    }

    #[test]
    fn the_eoi_command_goes_through_port_20() {
        let mut devices = Devices::new(DevicesConfiguration::SwitchesAndLeds);
        devices.write(0x21, 0).unwrap();

        devices.pic.request(3);
        assert!(devices.pic.handle_next_interrupt().is_some());
        assert_ne!(devices.read(0x23), Ok(0));

        // A byte other than the EOI command is ignored.
        devices.write(0x20, 0x11).unwrap();
        assert_ne!(devices.read(0x23), Ok(0));

        devices.write(0x20, 0x20).unwrap();
        assert_eq!(devices.read(0x23), Ok(0));
    }

    #[test]
    fn switches_drive_the_input_bits_of_port_a() {
        let mut devices = Devices::new(DevicesConfiguration::SwitchesAndLeds);

        devices.write(0x32, 0x0F).unwrap();
        devices.write(0x30, 0xF0).unwrap();
        devices.toggle_switch(0);
        devices.toggle_switch(1);

        assert_eq!(devices.read(0x30), Ok(0xF3));
        assert_eq!(devices.switches(), Some(0b0000_0011));

        devices.write(0x33, 0).unwrap();
        devices.write(0x31, 0xAA).unwrap();
        assert_eq!(devices.leds(), Some(0xAA));
    }

    #[test]
    fn the_pio_printer_prints_on_the_strobe_edge() {
        let mut devices = Devices::new(DevicesConfiguration::PrinterPio);

        // Port B all output carries the data, port A all output carries the
        // strobe on bit 1.
        devices.write(0x33, 0x00).unwrap();
        devices.write(0x32, 0x00).unwrap();

        devices.write(0x31, b'h').unwrap();
        devices.write(0x30, 0b10).unwrap();
        devices.write(0x30, 0b00).unwrap();
        devices.write(0x31, b'i').unwrap();
        devices.write(0x30, 0b10).unwrap();

        let printer = devices.printer().unwrap();
        assert_eq!(printer.queued(), vec![b'h', b'i']);
    }

    #[test]
    fn the_pio_printer_presents_busy_on_an_input_bit() {
        let mut devices = Devices::new(DevicesConfiguration::PrinterPio);

        devices.write(0x32, 0b01).unwrap();
        devices.write(0x33, 0x00).unwrap();
        assert_eq!(devices.read(0x30), Ok(0));

        for value in b"12345" {
            devices.write(0x31, *value).unwrap();
            devices.write(0x30, 0b10).unwrap();
            devices.write(0x30, 0b00).unwrap();
        }

        assert!(devices.printer().unwrap().busy());
        assert_eq!(devices.read(0x30), Ok(0b01));
    }

    #[test]
    fn the_handshake_raises_its_line_while_the_printer_is_ready() {
        let mut devices = Devices::new(DevicesConfiguration::PrinterHandshake);

        devices.write(0x41, 0b1000_0000).unwrap();
        devices.tick(0);
        assert_eq!(devices.pic.irr(), 1 << lines::HANDSHAKE);

        // Fill the buffer; the next tick prints one character but the line
        // is re-evaluated with the buffer full first.
        devices.pic.cancel(lines::HANDSHAKE);
        for value in b"12345" {
            devices.write(0x40, *value).unwrap();
        }
        devices.tick(1);
        assert_eq!(devices.pic.irr(), 0);

        devices.tick(Printer::INTERVAL);
        assert_eq!(devices.pic.irr(), 1 << lines::HANDSHAKE);
    }
}
