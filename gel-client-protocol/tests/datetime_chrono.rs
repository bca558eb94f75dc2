#![cfg(feature = "with-chrono")]

use chrono::naive::{NaiveDate, NaiveTime};
use chrono::{DateTime, Utc};

use gel_client_protocol::model::{Datetime, LocalDatetime};

#[test]
fn sub_microsecond_rounds_to_even() {
    // 1.5µs and 2.5µs both round to 2µs
    let base = NaiveDate::from_ymd_opt(2000, 1, 1)
        .unwrap()
        .and_time(NaiveTime::MIN);
    for (nanos, micros) in [(1_500, 2), (2_500, 2), (2_501, 3), (2_499, 2)] {
        let dt = base + chrono::TimeDelta::nanoseconds(nanos);
        let encoded = LocalDatetime::try_from(dt).unwrap();
        assert_eq!(encoded.postgres_micros(), micros, "nanos {nanos}");
    }
}

#[test]
fn datetime_round_trip() {
    let dt: DateTime<Utc> = "2023-07-14T12:34:56.123456Z".parse().unwrap();
    let wire = Datetime::try_from(dt).unwrap();
    let back: DateTime<Utc> = wire.try_into().unwrap();
    assert_eq!(dt, back);
}

#[test]
fn epoch_is_zero() {
    let dt: DateTime<Utc> = "2000-01-01T00:00:00Z".parse().unwrap();
    assert_eq!(Datetime::try_from(dt).unwrap().postgres_micros(), 0);
}
