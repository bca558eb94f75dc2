use crate::errors::DecodeError;
use crate::serialization::decode::raw_scalar::RawCodec;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::errors;

impl RawCodec<'_> for DateTime<Utc> {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        crate::model::Datetime::decode(buf)
            .and_then(|dt| dt.try_into().map_err(|_| errors::InvalidDate.build()))
    }
}

impl RawCodec<'_> for NaiveDateTime {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        crate::model::LocalDatetime::decode(buf)
            .and_then(|dt| dt.try_into().map_err(|_| errors::InvalidDate.build()))
    }
}

impl RawCodec<'_> for NaiveDate {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        crate::model::LocalDate::decode(buf)
            .and_then(|d| d.try_into().map_err(|_| errors::InvalidDate.build()))
    }
}

impl RawCodec<'_> for NaiveTime {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        crate::model::LocalTime::decode(buf)
            .and_then(|t| t.try_into().map_err(|_| errors::InvalidDate.build()))
    }
}
