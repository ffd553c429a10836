use mongodb::bson::Bson;

/// Normalize a stored `last_timestamp` value to whole seconds.
///
/// Current documents store seconds as a number; legacy documents carry
/// `hh:mm:ss` (or `mm:ss`) text. A numeric parse is attempted first so the
/// conversion is idempotent: `"3723"` and `3723` both stay `3723`.
pub fn normalize_timestamp(value: &Bson) -> i64 {
    match value {
        Bson::Int32(n) => (*n).max(0) as i64,
        Bson::Int64(n) => (*n).max(0),
        Bson::Double(n) => (*n).max(0.0) as i64,
        Bson::String(s) => parse_timestamp_str(s),
        _ => 0,
    }
}

/// Parse `"hh:mm:ss"`, `"mm:ss"`, or plain seconds text into seconds.
pub fn parse_timestamp_str(raw: &str) -> i64 {
    let raw = raw.trim();

    if let Ok(seconds) = raw.parse::<i64>() {
        return seconds.max(0);
    }

    let mut total: i64 = 0;
    for (i, part) in raw.split(':').rev().enumerate() {
        let Ok(n) = part.trim().parse::<i64>() else {
            return 0;
        };
        total += match i {
            0 => n,
            1 => n * 60,
            2 => n * 3600,
            _ => return 0,
        };
    }
    total.max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_hms_to_seconds() {
        assert_eq!(parse_timestamp_str("01:02:03"), 3723);
        assert_eq!(parse_timestamp_str("00:00:00"), 0);
        assert_eq!(parse_timestamp_str("10:30"), 630);
    }

    #[test]
    fn numeric_values_pass_through_unchanged() {
        assert_eq!(parse_timestamp_str("3723"), 3723);
        assert_eq!(normalize_timestamp(&Bson::Int64(3723)), 3723);
        assert_eq!(normalize_timestamp(&Bson::Int32(45)), 45);
        assert_eq!(normalize_timestamp(&Bson::String("3723".into())), 3723);
    }

    #[test]
    fn garbage_and_negatives_clamp_to_zero() {
        assert_eq!(parse_timestamp_str("not a time"), 0);
        assert_eq!(parse_timestamp_str("1:2:3:4"), 0);
        assert_eq!(normalize_timestamp(&Bson::Int64(-5)), 0);
        assert_eq!(normalize_timestamp(&Bson::Null), 0);
    }
}
