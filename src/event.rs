//! Event handling.
//!
//! This library exposes an event-based interface for reacting
//! to the state changes of the machine in real-time. [EventListeners](EventListener)
//! can be registered on the [Simulator](crate::emulator::Simulator) with the
//! [add_listener](crate::emulator::Simulator::add_listener) method.
//!
//! A blanket implementation of [EventListener] for all `Fn(&Event)` is provided.

use crate::instruction::Register;

/// Represents a state change that occurred while executing a program.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A register took a new value.
    RegisterChange {
        /// The register which was modified.
        register: Register,

        /// The new value; byte registers report their low 8 bits.
        value: u16,
    },

    /// A memory write landed, whether from an instruction, a stack push or
    /// a delivered input character.
    MemoryChange {
        /// The address of the changed memory location.
        address: u16,

        /// The value written, masked to the width of the write.
        value: u16,
    },

    /// A PIC request line went from idle to raised.
    InterruptRaised {
        /// The interrupt line, 0 through 7.
        line: u8,
    },

    /// One character reached the console screen.
    ConsoleOutput(char),
}

/// Trait for consuming events.
pub trait EventListener {
    /// Called whenever a new event has been created.
    fn event(&mut self, event: &Event);
}

impl<F> EventListener for F where F: Fn(&Event) {
    fn event(&mut self, event: &Event) {
        self(event)
    }
}

pub(crate) struct EventDispatcher {
    listeners: Vec<Box<dyn EventListener>>,
}

impl EventDispatcher {
    pub fn new() -> EventDispatcher {
        EventDispatcher {
            listeners: Vec::new(),
        }
    }

    pub fn add_listener<L: EventListener + 'static>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener) as Box<dyn EventListener>)
    }

    pub fn dispatch(&mut self, event: Event) {
        for listener in &mut self.listeners {
            listener.event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn closures_are_listeners() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_listener(move |event: &Event| {
            sink.borrow_mut().push(event.clone());
        });

        dispatcher.dispatch(Event::ConsoleOutput('x'));
        dispatcher.dispatch(Event::MemoryChange {
            address: 0x1000,
            value: 7,
        });

        assert_eq!(
            *seen.borrow(),
            vec![
                Event::ConsoleOutput('x'),
                Event::MemoryChange {
                    address: 0x1000,
                    value: 7
                },
            ]
        );
    }
}
