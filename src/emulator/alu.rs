//! The arithmetic-logic unit.
//!
//! Every flag-producing instruction funnels through [execute]: the engine
//! picks an [AluOp], hands over the operand values and the current FLAGS
//! word, and gets back the masked result together with the new flags.

use crate::instruction::OperandSize;

use super::Flags;

/// Operations the ALU performs directly.
///
/// CMP is Sub with the result discarded, INC and DEC are Add and Sub with an
/// immediate 1, and NEG is Sub from zero, so none of them appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbb,
    And,
    Or,
    Xor,
    Not,
}

/// Runs `left op right` at the given width and returns the result together
/// with the updated flags.
///
/// Not only uses `right`. Arithmetic sets CF when the unsigned result leaves
/// `[0, max]` and OF when the signed result leaves the two's complement
/// range; Adc and Sbb additionally consume the incoming CF. The logic
/// operations clear CF and OF. SF and ZF always follow the result. The
/// interrupt flag is never touched.
pub fn execute(op: AluOp, size: OperandSize, left: u16, right: u16, mut flags: Flags) -> (u16, Flags) {
    let result = match op {
        AluOp::Add => arithmetic(|a, b, _| a + b, size, left, right, &mut flags),
        AluOp::Adc => arithmetic(|a, b, c| a + b + c, size, left, right, &mut flags),
        AluOp::Sub => arithmetic(|a, b, _| a - b, size, left, right, &mut flags),
        AluOp::Sbb => arithmetic(|a, b, c| a - b - c, size, left, right, &mut flags),
        AluOp::And => logic(left & right, size, &mut flags),
        AluOp::Or => logic(left | right, size, &mut flags),
        AluOp::Xor => logic(left ^ right, size, &mut flags),
        AluOp::Not => logic(!right, size, &mut flags),
    };

    (result, flags)
}

fn arithmetic<F>(combine: F, size: OperandSize, left: u16, right: u16, flags: &mut Flags) -> u16
where
    F: Fn(i32, i32, i32) -> i32,
{
    let carry_in = flags.contains(Flags::CARRY) as i32;

    // The unsigned and the signed reading of the same bits disagree on
    // whether the operation wrapped; CF watches the former, OF the latter.
    let unsigned = combine(i32::from(left), i32::from(right), carry_in);
    let signed = combine(sign_extend(left, size), sign_extend(right, size), carry_in);

    let max = i32::from(size.mask());
    let result = unsigned.rem_euclid(max + 1) as u16;

    flags.set(Flags::CARRY, unsigned < 0 || unsigned > max);
    flags.set(Flags::OVERFLOW, signed < -(max / 2) - 1 || signed > max / 2);
    result_flags(result, size, flags);

    result
}

fn logic(result: u16, size: OperandSize, flags: &mut Flags) -> u16 {
    let result = result & size.mask();

    flags.set(Flags::CARRY, false);
    flags.set(Flags::OVERFLOW, false);
    result_flags(result, size, flags);

    result
}

fn result_flags(result: u16, size: OperandSize, flags: &mut Flags) {
    flags.set(Flags::ZERO, result == 0);
    flags.set(Flags::SIGN, result & sign_bit(size) != 0);
}

fn sign_bit(size: OperandSize) -> u16 {
    1 << (size.bits() - 1)
}

fn sign_extend(value: u16, size: OperandSize) -> i32 {
    match size {
        OperandSize::Byte => i32::from(value as u8 as i8),
        OperandSize::Word => i32::from(value as i16),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn overflow_is_not_carry() {
        let (result, flags) = execute(AluOp::Add, OperandSize::Byte, 127, 1, Flags::empty());

        assert_eq!(result, 0x80);
        assert!(flags.contains(Flags::OVERFLOW));
        assert!(flags.contains(Flags::SIGN));
        assert!(!flags.contains(Flags::CARRY));
        assert!(!flags.contains(Flags::ZERO));
    }

    #[test]
    fn borrow_is_carry() {
        let (result, flags) = execute(AluOp::Sub, OperandSize::Byte, 0, 1, Flags::empty());

        assert_eq!(result, 255);
        assert!(flags.contains(Flags::CARRY));
        assert!(flags.contains(Flags::SIGN));
        assert!(!flags.contains(Flags::OVERFLOW));
    }

    #[test]
    fn carry_chains_through_adc() {
        let (low, flags) = execute(AluOp::Add, OperandSize::Byte, 0xFF, 0x01, Flags::empty());
        assert_eq!(low, 0);
        assert!(flags.contains(Flags::CARRY | Flags::ZERO));

        let (high, flags) = execute(AluOp::Adc, OperandSize::Byte, 0x00, 0x00, flags);
        assert_eq!(high, 1);
        assert!(!flags.contains(Flags::CARRY));
    }

    #[test]
    fn sbb_borrows_one_more() {
        let (result, flags) = execute(AluOp::Sbb, OperandSize::Byte, 5, 2, Flags::CARRY);

        assert_eq!(result, 2);
        assert!(!flags.contains(Flags::CARRY));
    }

    #[test]
    fn logic_clears_carry_and_overflow() {
        let dirty = Flags::CARRY | Flags::OVERFLOW;
        let (result, flags) = execute(AluOp::Xor, OperandSize::Byte, 0xFF, 0xFF, dirty);

        assert_eq!(result, 0);
        assert!(flags.contains(Flags::ZERO));
        assert!(!flags.contains(Flags::CARRY));
        assert!(!flags.contains(Flags::OVERFLOW));
    }

    #[test]
    fn not_complements_at_width() {
        let (result, flags) = execute(AluOp::Not, OperandSize::Byte, 0, 0x0F, Flags::empty());
        assert_eq!(result, 0xF0);
        assert!(flags.contains(Flags::SIGN));

        let (result, _) = execute(AluOp::Not, OperandSize::Word, 0, 0x00FF, Flags::empty());
        assert_eq!(result, 0xFF00);
    }

    #[test]
    fn the_interrupt_flag_survives() {
        let (_, flags) = execute(AluOp::Add, OperandSize::Word, 1, 1, Flags::INTERRUPTS);
        assert!(flags.contains(Flags::INTERRUPTS));

        let (_, flags) = execute(AluOp::And, OperandSize::Word, 1, 1, Flags::INTERRUPTS);
        assert!(flags.contains(Flags::INTERRUPTS));
    }

    proptest! {
        #[test]
        fn byte_addition_follows_the_flag_equations(left in 0u16..=0xFF, right in 0u16..=0xFF) {
            let (result, flags) = execute(AluOp::Add, OperandSize::Byte, left, right, Flags::empty());

            let unsigned = i32::from(left) + i32::from(right);
            let signed = i32::from(left as u8 as i8) + i32::from(right as u8 as i8);

            prop_assert_eq!(i32::from(result), unsigned.rem_euclid(0x100));
            prop_assert_eq!(flags.contains(Flags::CARRY), unsigned > 0xFF);
            prop_assert_eq!(flags.contains(Flags::OVERFLOW), signed < -128 || signed > 127);
            prop_assert_eq!(flags.contains(Flags::ZERO), result == 0);
            prop_assert_eq!(flags.contains(Flags::SIGN), result >= 0x80);
        }

        #[test]
        fn byte_subtraction_follows_the_flag_equations(left in 0u16..=0xFF, right in 0u16..=0xFF) {
            let (result, flags) = execute(AluOp::Sub, OperandSize::Byte, left, right, Flags::empty());

            let unsigned = i32::from(left) - i32::from(right);
            let signed = i32::from(left as u8 as i8) - i32::from(right as u8 as i8);

            prop_assert_eq!(i32::from(result), unsigned.rem_euclid(0x100));
            prop_assert_eq!(flags.contains(Flags::CARRY), unsigned < 0);
            prop_assert_eq!(flags.contains(Flags::OVERFLOW), signed < -128 || signed > 127);
        }

        #[test]
        fn word_arithmetic_wraps_the_same_way(left: u16, right: u16) {
            let (result, flags) = execute(AluOp::Add, OperandSize::Word, left, right, Flags::empty());

            let unsigned = i32::from(left) + i32::from(right);
            prop_assert_eq!(i32::from(result), unsigned.rem_euclid(0x1_0000));
            prop_assert_eq!(flags.contains(Flags::CARRY), unsigned > 0xFFFF);
        }
    }
}
