use std::cell::RefCell;
use std::rc::Rc;

use sim88::{
    asm::metadata, assemble, ControlSignal, DevicesConfiguration, Event, MemoryFill, Simulator,
};

/// Loads a program with the device configuration its source asks for.
fn load(source: &str) -> Simulator {
    let configuration = metadata::extract(source)
        .get("devices")
        .and_then(|value| value.as_text())
        .and_then(|name| name.parse::<DevicesConfiguration>().ok())
        .unwrap_or(DevicesConfiguration::SwitchesAndLeds);

    let program = assemble(source).unwrap();

    let mut simulator = Simulator::new();
    simulator.load_program(&program, MemoryFill::Zero, configuration);
    simulator
}

#[test]
fn test_f10_interrupts_the_polling_loop() {
    let mut simulator = load(include_str!("f10.asm"));

    let raised = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&raised);
    simulator.add_listener(move |event: &Event| {
        if let Event::InterruptRaised { line } = event {
            sink.borrow_mut().push(*line);
        }
    });

    // Let the program unmask line 0 and settle into its polling loop.
    for _ in 0..10 {
        assert_eq!(simulator.step().unwrap(), ControlSignal::Continue);
    }
    assert!(!simulator.halted());

    simulator.press_f10();
    assert_eq!(*raised.borrow(), vec![0]);

    let mut steps = 0;
    while !simulator.halted() {
        simulator.step().unwrap();
        steps += 1;
        assert!(steps < 100, "the service routine never ran");
    }

    assert_eq!(simulator.memory().bytes()[0x1000], 1);
}

#[test]
fn test_the_handshake_printer_prints() {
    let mut simulator = load(include_str!("handshake.asm"));

    assert_eq!(
        simulator.devices().configuration(),
        DevicesConfiguration::PrinterHandshake
    );

    let mut now = 0;
    let mut steps = 0;
    while !simulator.halted() {
        now += 1;
        simulator.tick(now);
        simulator.step().unwrap();
        steps += 1;
        assert!(steps < 1000, "the program never halted");
    }

    // The program finishes well inside the printer's 250 ms pace, so both
    // characters are still queued.
    assert_eq!(
        simulator.devices().printer().unwrap().queued(),
        vec![b'o', b'k']
    );

    while simulator.devices().printer().unwrap().output() != "ok" {
        now += 250;
        simulator.tick(now);
        assert!(now < 10_000, "the printer never drained");
    }

    assert!(simulator.devices().printer().unwrap().queued().is_empty());
}
