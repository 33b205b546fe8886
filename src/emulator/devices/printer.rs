//! The character printer.

use std::collections::VecDeque;

const FORM_FEED: u8 = 0x0C;

/// A printer with a small input buffer.
///
/// Characters arrive through whichever parallel interface the configuration
/// wires up, wait in the buffer and hit the page one per
/// [INTERVAL](Printer::INTERVAL). A full buffer makes the printer busy and
/// further characters are dropped on the floor; busy is backpressure, not an
/// error.
pub struct Printer {
    buffer: VecDeque<u8>,
    output: String,
    last_strobe: bool,
    deadline: u64,
}

impl Printer {
    /// Characters the buffer holds before the printer reports busy.
    pub const BUFFER_SIZE: usize = 5;

    /// Virtual milliseconds needed to print one character.
    pub const INTERVAL: u64 = 250;

    pub fn new() -> Printer {
        Printer {
            buffer: VecDeque::new(),
            output: String::new(),
            last_strobe: false,
            deadline: Printer::INTERVAL,
        }
    }

    /// True while the buffer is full.
    pub fn busy(&self) -> bool {
        self.buffer.len() >= Printer::BUFFER_SIZE
    }

    /// Queues one character, silently dropping it while busy.
    pub fn add_to_buffer(&mut self, value: u8) {
        if !self.busy() {
            self.buffer.push_back(value);
        }
    }

    /// Presents the level of the strobe line. A rising edge latches `data`
    /// into the buffer.
    pub fn set_strobe(&mut self, level: bool, data: u8) {
        if level == self.last_strobe {
            return;
        }
        self.last_strobe = level;

        if level {
            self.add_to_buffer(data);
        }
    }

    /// Prints one buffered character if the printing interval has elapsed.
    /// A form feed rips the page off instead of printing.
    pub fn tick(&mut self, now: u64) {
        if now < self.deadline {
            return;
        }
        self.deadline = now + Printer::INTERVAL;

        if let Some(value) = self.buffer.pop_front() {
            if value == FORM_FEED {
                self.output.clear();
            } else {
                self.output.push(char::from(value));
            }
        }
    }

    /// Everything printed on the current page.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// The characters still waiting in the buffer.
    pub fn queued(&self) -> Vec<u8> {
        self.buffer.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_at_its_own_pace() {
        let mut printer = Printer::new();
        printer.add_to_buffer(b'h');
        printer.add_to_buffer(b'i');

        printer.tick(0);
        assert_eq!(printer.output(), "");

        printer.tick(Printer::INTERVAL);
        assert_eq!(printer.output(), "h");

        printer.tick(2 * Printer::INTERVAL);
        assert_eq!(printer.output(), "hi");
        assert!(printer.queued().is_empty());
    }

    #[test]
    fn a_full_buffer_is_busy_and_drops_characters() {
        let mut printer = Printer::new();
        for value in b"abcde" {
            printer.add_to_buffer(*value);
        }
        assert!(printer.busy());

        printer.add_to_buffer(b'x');
        assert_eq!(printer.queued(), b"abcde".to_vec());

        printer.tick(Printer::INTERVAL);
        assert!(!printer.busy());
        assert_eq!(printer.output(), "a");
    }

    #[test]
    fn the_strobe_latches_on_the_rising_edge_only() {
        let mut printer = Printer::new();

        printer.set_strobe(true, b'a');
        printer.set_strobe(true, b'b');
        printer.set_strobe(false, b'c');
        printer.set_strobe(true, b'd');

        assert_eq!(printer.queued(), vec![b'a', b'd']);
    }

    #[test]
    fn a_form_feed_clears_the_page() {
        let mut printer = Printer::new();
        printer.add_to_buffer(b'a');
        printer.tick(Printer::INTERVAL);
        assert_eq!(printer.output(), "a");

        printer.add_to_buffer(FORM_FEED);
        printer.tick(2 * Printer::INTERVAL);
        assert_eq!(printer.output(), "");
    }
}
