//! Arbitrary-precision integers and decimals in the wire's base-10000
//! digit representation.

use crate::model::OutOfRangeError;

/// An arbitrary-precision integer.
///
/// Stored as a sign, a weight (the base-10000 exponent of the most
/// significant digit) and the digits themselves, most significant
/// first. The representation is normalized: no leading or trailing
/// zero digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigInt {
    pub(crate) negative: bool,
    pub(crate) weight: i16,
    pub(crate) digits: Vec<u16>,
}

/// An arbitrary-precision number with a decimal point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decimal {
    pub(crate) negative: bool,
    pub(crate) weight: i16,
    pub(crate) decimal_digits: u16,
    pub(crate) digits: Vec<u16>,
}

impl BigInt {
    pub fn is_negative(&self) -> bool {
        self.negative
    }
    pub fn weight(&self) -> i16 {
        self.weight
    }
    pub fn digits(&self) -> &[u16] {
        &self.digits
    }
    pub(crate) fn trailing_zero_digits(&self) -> usize {
        self.weight as usize + 1 - self.digits.len()
    }
    fn normalize(mut self) -> BigInt {
        while let Some(0) = self.digits.last() {
            self.digits.pop();
        }
        while let Some(0) = self.digits.first() {
            self.digits.remove(0);
            self.weight -= 1;
        }
        if self.digits.is_empty() {
            self.negative = false;
            self.weight = 0;
        }
        self
    }
}

impl Decimal {
    pub fn is_negative(&self) -> bool {
        self.negative
    }
    pub fn weight(&self) -> i16 {
        self.weight
    }
    pub fn decimal_digits(&self) -> u16 {
        self.decimal_digits
    }
    pub fn digits(&self) -> &[u16] {
        &self.digits
    }
}

impl From<u64> for BigInt {
    fn from(v: u64) -> BigInt {
        BigInt {
            negative: false,
            weight: 4,
            digits: vec![
                (v / 10_000_000_000_000_000 % 10000) as u16,
                (v / 1_000_000_000_000 % 10000) as u16,
                (v / 100_000_000 % 10000) as u16,
                (v / 10000 % 10000) as u16,
                (v % 10000) as u16,
            ],
        }
        .normalize()
    }
}

impl From<i64> for BigInt {
    fn from(v: i64) -> BigInt {
        let (abs, negative) = if v < 0 {
            (v.unsigned_abs(), true)
        } else {
            (v as u64, false)
        };
        let mut result = BigInt::from(abs);
        result.negative = negative && !result.digits.is_empty();
        result
    }
}

impl From<u32> for BigInt {
    fn from(v: u32) -> BigInt {
        BigInt::from(v as u64)
    }
}

impl From<i32> for BigInt {
    fn from(v: i32) -> BigInt {
        BigInt::from(v as i64)
    }
}

impl TryFrom<&BigInt> for i64 {
    type Error = OutOfRangeError;
    fn try_from(v: &BigInt) -> Result<i64, OutOfRangeError> {
        let mut result: i64 = 0;
        for &digit in &v.digits {
            result = result
                .checked_mul(10000)
                .and_then(|r| {
                    if v.negative {
                        r.checked_sub(digit as i64)
                    } else {
                        r.checked_add(digit as i64)
                    }
                })
                .ok_or(OutOfRangeError)?;
        }
        for _ in 0..v.trailing_zero_digits() {
            result = result.checked_mul(10000).ok_or(OutOfRangeError)?;
        }
        Ok(result)
    }
}

#[cfg(feature = "with-num-bigint")]
mod num_bigint_interop {
    use super::*;
    use num_traits::{ToPrimitive, Zero};

    impl From<&BigInt> for num_bigint::BigInt {
        fn from(v: &BigInt) -> num_bigint::BigInt {
            let mut result = num_bigint::BigInt::zero();
            for &digit in &v.digits {
                result *= 10000;
                result += digit;
            }
            for _ in 0..v.trailing_zero_digits() {
                result *= 10000;
            }
            if v.negative {
                -result
            } else {
                result
            }
        }
    }

    impl From<BigInt> for num_bigint::BigInt {
        fn from(v: BigInt) -> num_bigint::BigInt {
            (&v).into()
        }
    }

    impl TryFrom<num_bigint::BigInt> for BigInt {
        type Error = OutOfRangeError;
        fn try_from(v: num_bigint::BigInt) -> Result<BigInt, Self::Error> {
            let (sign, mut value) = v.into_parts();
            let negative = sign == num_bigint::Sign::Minus;
            let base = num_bigint::BigUint::from(10000u16);
            let mut digits = Vec::new();
            while !value.is_zero() {
                let digit = (&value % &base).to_u16().unwrap();
                digits.push(digit);
                value /= &base;
            }
            digits.reverse();
            let weight =
                i16::try_from(digits.len().saturating_sub(1)).map_err(|_| OutOfRangeError)?;
            Ok(BigInt {
                negative: negative && !digits.is_empty(),
                weight,
                digits,
            }
            .normalize())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values() {
        let one = BigInt::from(1i64);
        assert_eq!(one.weight, 0);
        assert_eq!(one.digits, &[1]);
        assert!(!one.negative);

        let zero = BigInt::from(0i64);
        assert_eq!(zero.weight, 0);
        assert_eq!(zero.digits, &[] as &[u16]);
        assert!(!zero.negative);
    }

    #[test]
    fn digit_split() {
        let v = BigInt::from(-12345i64);
        assert!(v.negative);
        assert_eq!(v.weight, 1);
        assert_eq!(v.digits, &[1, 2345]);

        let v = BigInt::from(10000i64);
        assert_eq!(v.weight, 1);
        assert_eq!(v.digits, &[1]);
        assert_eq!(v.trailing_zero_digits(), 1);
    }

    #[test]
    fn i64_round_trip() {
        for value in [0i64, 7, -7, 9999, 10000, -12345, i64::MAX, i64::MIN + 1] {
            let big = BigInt::from(value);
            assert_eq!(i64::try_from(&big).unwrap(), value, "value {value}");
        }
    }
}
