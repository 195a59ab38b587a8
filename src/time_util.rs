use chrono::{DateTime, TimeZone, Utc};

/// 毫秒时间戳转UTC时间
pub fn ts_to_datetime(ts_millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ts_millis).single()
}

/// UTC时间转毫秒时间戳
pub fn datetime_to_ts(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let now = Utc::now();
        let ts = datetime_to_ts(&now);
        let back = ts_to_datetime(ts).unwrap();
        assert_eq!(back.timestamp_millis(), ts);
    }
}
