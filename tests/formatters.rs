#[cfg(test)]
mod tests {
    use pomogroup::libs::formatter::{format_seconds, format_timestamp, mention_channel, mention_member, mention_tag};

    #[test]
    fn test_format_seconds_zero() {
        assert_eq!(format_seconds(0, false), "00:00");
        assert_eq!(format_seconds(0, true), "00:00:00");
    }

    #[test]
    fn test_format_seconds_minutes() {
        assert_eq!(format_seconds(1500, false), "00:25");
        assert_eq!(format_seconds(600, false), "00:10");
    }

    #[test]
    fn test_format_seconds_rounds_to_minute() {
        assert_eq!(format_seconds(1529, false), "00:25");
        assert_eq!(format_seconds(1530, false), "00:26");
        assert_eq!(format_seconds(3599, false), "01:00");
    }

    #[test]
    fn test_format_seconds_with_seconds() {
        assert_eq!(format_seconds(5430, true), "01:30:30");
        assert_eq!(format_seconds(59, true), "00:00:59");
    }

    #[test]
    fn test_format_seconds_large_hours() {
        assert_eq!(format_seconds(100 * 3600, false), "100:00");
    }

    #[test]
    fn test_format_seconds_negative_is_zero() {
        assert_eq!(format_seconds(-20, false), "00:00");
        assert_eq!(format_seconds(-3600, true), "00:00:00");
    }

    #[test]
    fn test_format_timestamp_shape() {
        let text = format_timestamp(1_700_000_000);
        assert_eq!(text.len(), 16);
        assert_eq!(&text[4..5], "-");
        assert_eq!(&text[13..14], ":");
    }

    #[test]
    fn test_mentions() {
        assert_eq!(mention_member(7), "<@7>");
        assert_eq!(mention_tag(1), "<@&1>");
        assert_eq!(mention_channel(100), "<#100>");
    }
}
