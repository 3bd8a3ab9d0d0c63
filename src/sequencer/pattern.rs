/// Trigger pattern generation and logical combination
use super::row::LogicOp;

/// Base firing pattern of a row: fires on the last tick of every `division` ticks
pub fn pattern(division: u8, tick: u64) -> bool {
    let division = division.max(1) as u64;
    (tick + 1) % division == 0
}

/// Merge a row's own pattern value `a` with its referenced row's value `b`
pub fn combine(op: LogicOp, a: bool, b: bool) -> bool {
    match op {
        LogicOp::None => a,
        LogicOp::And => a && b,
        LogicOp::Or => a || b,
        LogicOp::Xor => a != b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_division_one_fires_every_tick() {
        assert!((0..64).all(|t| pattern(1, t)));
    }

    #[test]
    fn test_division_four() {
        let fired: Vec<u64> = (0..16).filter(|&t| pattern(4, t)).collect();
        assert_eq!(fired, vec![3, 7, 11, 15]);
    }

    #[test]
    fn test_truth_table() {
        let cases = [
            (LogicOp::None, [false, false, true, true]),
            (LogicOp::And, [false, false, false, true]),
            (LogicOp::Or, [false, true, true, true]),
            (LogicOp::Xor, [false, true, true, false]),
        ];
        for (op, expected) in cases {
            let got = [
                combine(op, false, false),
                combine(op, false, true),
                combine(op, true, false),
                combine(op, true, true),
            ];
            assert_eq!(got, expected, "{:?}", op);
        }
    }

    proptest! {
        #[test]
        fn pattern_matches_definition(division in 1u8..=128, tick in 0u64..100_000) {
            prop_assert_eq!(pattern(division, tick), (tick + 1) % division as u64 == 0);
        }
    }
}
