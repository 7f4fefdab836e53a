/// Round a count to the nearest multiple of `unit`, ties to even.
///
/// Works in integer arithmetic so large counts never lose precision.
/// A unit of 0 or 1 leaves the count unchanged.
pub fn round_to_unit(n: u64, unit: u64) -> u64 {
    if unit <= 1 {
        return n;
    }

    let quotient = n / unit;
    let remainder = n % unit;

    let rounded = match remainder.cmp(&(unit - remainder)) {
        std::cmp::Ordering::Less => quotient,
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal => {
            if quotient % 2 == 0 {
                quotient
            } else {
                quotient + 1
            }
        }
    };

    rounded.saturating_mul(unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_to_even() {
        assert_eq!(round_to_unit(15, 10), 20);
        assert_eq!(round_to_unit(25, 10), 20);
        assert_eq!(round_to_unit(35, 10), 40);
        assert_eq!(round_to_unit(5, 10), 0);
    }

    #[test]
    fn test_round_nearest() {
        assert_eq!(round_to_unit(24, 10), 20);
        assert_eq!(round_to_unit(26, 10), 30);
        assert_eq!(round_to_unit(6, 10), 10);
        assert_eq!(round_to_unit(1, 10), 0);
    }

    #[test]
    fn test_multiples_unchanged() {
        for n in [0, 10, 20, 1000, 123_450] {
            assert_eq!(round_to_unit(n, 10), n);
        }
    }

    #[test]
    fn test_odd_unit() {
        // 7 / 5 = 1.4, 8 / 5 = 1.6
        assert_eq!(round_to_unit(7, 5), 5);
        assert_eq!(round_to_unit(8, 5), 10);
    }

    #[test]
    fn test_huge_unit_does_not_overflow() {
        let unit = u64::MAX - 1;
        assert_eq!(round_to_unit(u64::MAX - 2, unit), unit);
        assert_eq!(round_to_unit(3, unit), 0);
    }

    #[test]
    fn test_unit_one_is_identity() {
        assert_eq!(round_to_unit(17, 1), 17);
        assert_eq!(round_to_unit(17, 0), 17);
    }
}
