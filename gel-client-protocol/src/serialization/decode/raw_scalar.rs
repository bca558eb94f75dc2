//! Scalar decoding from a raw, already length-sliced buffer.
//!
//! The framing layer strips the 4-byte length prefix before these run;
//! each decoder sees exactly the value bytes.

use bytes::Bytes;
use snafu::{ensure, ResultExt};
use uuid::Uuid;

use crate::errors::{self, DecodeError};
use crate::model::{BigInt, ConfigMemory, Decimal, Json};
use crate::model::{DateDuration, Datetime, Duration, LocalDate, LocalDatetime, LocalTime};
use crate::model::RelativeDuration;

pub trait RawCodec<'t>: Sized {
    fn decode(buf: &'t [u8]) -> Result<Self, DecodeError>;
}

fn ensure_exact(buf: &[u8], expected: usize) -> Result<(), DecodeError> {
    ensure!(buf.len() >= expected, errors::Underflow);
    ensure!(buf.len() <= expected, errors::ExtraData);
    Ok(())
}

impl RawCodec<'_> for i16 {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact(buf, 2)?;
        Ok(i16::from_be_bytes(buf.try_into().unwrap()))
    }
}

impl RawCodec<'_> for i32 {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact(buf, 4)?;
        Ok(i32::from_be_bytes(buf.try_into().unwrap()))
    }
}

impl RawCodec<'_> for i64 {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact(buf, 8)?;
        Ok(i64::from_be_bytes(buf.try_into().unwrap()))
    }
}

impl RawCodec<'_> for f32 {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact(buf, 4)?;
        Ok(f32::from_be_bytes(buf.try_into().unwrap()))
    }
}

impl RawCodec<'_> for f64 {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact(buf, 8)?;
        Ok(f64::from_be_bytes(buf.try_into().unwrap()))
    }
}

impl RawCodec<'_> for bool {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact(buf, 1)?;
        match buf[0] {
            0x00 => Ok(false),
            0x01 => Ok(true),
            val => errors::InvalidBool { val }.fail(),
        }
    }
}

impl<'t> RawCodec<'t> for &'t str {
    fn decode(buf: &'t [u8]) -> Result<Self, DecodeError> {
        std::str::from_utf8(buf).context(errors::InvalidUtf8)
    }
}

impl RawCodec<'_> for String {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        <&str as RawCodec>::decode(buf).map(|s| s.to_owned())
    }
}

impl<'t> RawCodec<'t> for &'t [u8] {
    fn decode(buf: &'t [u8]) -> Result<Self, DecodeError> {
        Ok(buf)
    }
}

impl RawCodec<'_> for Bytes {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        Ok(Bytes::copy_from_slice(buf))
    }
}

impl RawCodec<'_> for Uuid {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact(buf, 16)?;
        Ok(Uuid::from_bytes(buf.try_into().unwrap()))
    }
}

impl RawCodec<'_> for Json {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        ensure!(!buf.is_empty(), errors::Underflow);
        ensure!(buf[0] == 1, errors::InvalidJsonFormat);
        let json = std::str::from_utf8(&buf[1..])
            .context(errors::InvalidUtf8)?
            .to_owned();
        Ok(Json::new_unchecked(json))
    }
}

impl RawCodec<'_> for Datetime {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        i64::decode(buf).map(Datetime::from_postgres_micros)
    }
}

impl RawCodec<'_> for LocalDatetime {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        i64::decode(buf).map(LocalDatetime::from_postgres_micros)
    }
}

impl RawCodec<'_> for LocalDate {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        i32::decode(buf).map(LocalDate::from_days)
    }
}

impl RawCodec<'_> for LocalTime {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let micros = i64::decode(buf)?;
        let micros = u64::try_from(micros).map_err(|_| errors::InvalidDate.build())?;
        LocalTime::try_from_micros(micros).map_err(|_| errors::InvalidDate.build())
    }
}

impl RawCodec<'_> for Duration {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact(buf, 16)?;
        let micros = i64::from_be_bytes(buf[..8].try_into().unwrap());
        let days = i32::from_be_bytes(buf[8..12].try_into().unwrap());
        let months = i32::from_be_bytes(buf[12..16].try_into().unwrap());
        ensure!(days == 0 && months == 0, errors::NonZeroReservedBytes);
        Ok(Duration::from_micros(micros))
    }
}

impl RawCodec<'_> for RelativeDuration {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact(buf, 16)?;
        let micros = i64::from_be_bytes(buf[..8].try_into().unwrap());
        let days = i32::from_be_bytes(buf[8..12].try_into().unwrap());
        let months = i32::from_be_bytes(buf[12..16].try_into().unwrap());
        Ok(RelativeDuration::try_new(micros, days, months))
    }
}

impl RawCodec<'_> for DateDuration {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact(buf, 16)?;
        let micros = i64::from_be_bytes(buf[..8].try_into().unwrap());
        let days = i32::from_be_bytes(buf[8..12].try_into().unwrap());
        let months = i32::from_be_bytes(buf[12..16].try_into().unwrap());
        ensure!(micros == 0, errors::NonZeroReservedBytes);
        Ok(DateDuration { days, months })
    }
}

impl RawCodec<'_> for ConfigMemory {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        i64::decode(buf).map(ConfigMemory)
    }
}

impl RawCodec<'_> for BigInt {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        ensure!(buf.len() >= 8, errors::Underflow);
        let ndigits = u16::from_be_bytes(buf[..2].try_into().unwrap()) as usize;
        let weight = i16::from_be_bytes(buf[2..4].try_into().unwrap());
        let negative = match u16::from_be_bytes(buf[4..6].try_into().unwrap()) {
            0x0000 => false,
            0x4000 => true,
            _ => errors::BadSign.fail()?,
        };
        let decimal_digits = u16::from_be_bytes(buf[6..8].try_into().unwrap());
        ensure!(decimal_digits == 0, errors::BadSign);
        ensure_exact(&buf[8..], ndigits * 2)?;
        let mut digits = Vec::with_capacity(ndigits);
        for idx in 0..ndigits {
            digits.push(u16::from_be_bytes(
                buf[8 + idx * 2..10 + idx * 2].try_into().unwrap(),
            ));
        }
        Ok(BigInt {
            negative,
            weight,
            digits,
        })
    }
}

impl RawCodec<'_> for Decimal {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        ensure!(buf.len() >= 8, errors::Underflow);
        let ndigits = u16::from_be_bytes(buf[..2].try_into().unwrap()) as usize;
        let weight = i16::from_be_bytes(buf[2..4].try_into().unwrap());
        let negative = match u16::from_be_bytes(buf[4..6].try_into().unwrap()) {
            0x0000 => false,
            0x4000 => true,
            _ => errors::BadSign.fail()?,
        };
        let decimal_digits = u16::from_be_bytes(buf[6..8].try_into().unwrap());
        ensure_exact(&buf[8..], ndigits * 2)?;
        let mut digits = Vec::with_capacity(ndigits);
        for idx in 0..ndigits {
            digits.push(u16::from_be_bytes(
                buf[8 + idx * 2..10 + idx * 2].try_into().unwrap(),
            ));
        }
        Ok(Decimal {
            negative,
            weight,
            decimal_digits,
            digits,
        })
    }
}
