use sim88::{
    assemble, AssemblerErrorKind, DevicesConfiguration, MemoryFill, Simulator, SimulatorError,
};

#[test]
fn test_circular_constants_are_rejected() {
    let errors = assemble("a equ b\nb equ a\norg 2000h\nhlt\nend").unwrap_err();

    assert!(errors
        .iter()
        .any(|error| error.kind == AssemblerErrorKind::CircularReference));
}

#[test]
fn test_unknown_labels_are_rejected() {
    let errors = assemble("org 2000h\nmov ax, nowhere\nend").unwrap_err();

    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0].kind,
        AssemblerErrorKind::LabelNotFound { .. }
    ));
}

#[test]
fn test_reserved_interrupts_are_rejected_at_assembly() {
    let errors = assemble("org 2000h\nint 5\nend").unwrap_err();

    assert!(matches!(
        errors[0].kind,
        AssemblerErrorKind::InvalidInterrupt { value: 5 }
    ));
}

#[test]
fn test_runtime_faults_halt_the_machine() {
    let program = assemble("org 2000h\nmov sp, 2\npush ax\npush ax\nhlt\nend").unwrap();

    let mut simulator = Simulator::new();
    simulator.load_program(
        &program,
        MemoryFill::Zero,
        DevicesConfiguration::SwitchesAndLeds,
    );

    assert_eq!(simulator.run(10), Err(SimulatorError::StackOverflow));
    assert!(simulator.halted());
}

#[test]
fn test_missing_devices_fault_io() {
    let program = assemble("org 2000h\nin al, 40h\nhlt\nend").unwrap();

    let mut simulator = Simulator::new();
    simulator.load_program(
        &program,
        MemoryFill::Zero,
        DevicesConfiguration::SwitchesAndLeds,
    );

    assert_eq!(
        simulator.run(10),
        Err(SimulatorError::IoMemoryNotImplemented { port: 0x40 })
    );
}
