//! The text console.

const BACKSPACE: u8 = 0x08;
const FORM_FEED: u8 = 0x0C;

/// Output console fed by the INT 6 and INT 7 system calls.
pub struct Console {
    output: String,
}

impl Console {
    pub fn new() -> Console {
        Console {
            output: String::new(),
        }
    }

    /// Applies one output byte: backspace erases the last character, form
    /// feed clears the screen, everything else is appended.
    pub fn write(&mut self, value: u8) {
        match value {
            BACKSPACE => {
                self.output.pop();
            }
            FORM_FEED => self.output.clear(),
            _ => self.output.push(char::from(value)),
        }
    }

    /// Everything currently on screen.
    pub fn text(&self) -> &str {
        &self.output
    }
}
