//! The interval timer.

/// Free-running counter with a comparator.
///
/// CONT advances once per [INTERVAL](Timer::INTERVAL) of virtual time,
/// wrapping after 0xFF. The moment it lands on COMP the timer wants its
/// interrupt line raised.
pub struct Timer {
    cont: u8,
    comp: u8,
    deadline: u64,
}

impl Timer {
    /// Virtual milliseconds between two counter increments.
    pub const INTERVAL: u64 = 1000;

    pub fn new() -> Timer {
        Timer {
            cont: 0,
            comp: 0xFF,
            deadline: Timer::INTERVAL,
        }
    }

    /// Advances the counter if a full interval has elapsed; at most one
    /// increment per call. Returns true when CONT just reached COMP.
    pub fn tick(&mut self, now: u64) -> bool {
        if now < self.deadline {
            return false;
        }
        self.deadline = now + Timer::INTERVAL;

        self.cont = self.cont.wrapping_add(1);
        self.cont == self.comp
    }

    pub fn cont(&self) -> u8 {
        self.cont
    }

    pub fn set_cont(&mut self, value: u8) {
        self.cont = value;
    }

    pub fn comp(&self) -> u8 {
        self.comp
    }

    pub fn set_comp(&mut self, value: u8) {
        self.comp = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_once_per_interval() {
        let mut timer = Timer::new();
        timer.set_comp(2);

        assert!(!timer.tick(0));
        assert_eq!(timer.cont(), 0);

        assert!(!timer.tick(Timer::INTERVAL));
        assert_eq!(timer.cont(), 1);

        // Not yet time for the next increment.
        assert!(!timer.tick(Timer::INTERVAL + 1));
        assert_eq!(timer.cont(), 1);

        assert!(timer.tick(2 * Timer::INTERVAL));
        assert_eq!(timer.cont(), 2);
    }

    #[test]
    fn wraps_at_the_byte_boundary() {
        let mut timer = Timer::new();
        timer.set_cont(0xFF);
        timer.set_comp(0x00);

        assert!(timer.tick(Timer::INTERVAL));
        assert_eq!(timer.cont(), 0);
    }
}
