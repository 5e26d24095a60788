#[cfg(test)]
mod period_tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use harvester_core::HarvesterError;
    use harvester_dispatcher::period::IsoPeriod;

    #[test]
    fn test_parse_common_periods() {
        let hourly: IsoPeriod = "PT1H".parse().unwrap();
        assert_eq!(hourly.hours, 1);

        let fortnight: IsoPeriod = "P2W".parse().unwrap();
        assert_eq!(fortnight.weeks, 2);

        let lower: IsoPeriod = "p1d".parse().unwrap();
        assert_eq!(lower.days, 1);

        let full: IsoPeriod = "P1Y2M3DT4H5M6S".parse().unwrap();
        assert_eq!(
            full,
            IsoPeriod {
                years: 1,
                months: 2,
                weeks: 0,
                days: 3,
                hours: 4,
                minutes: 5,
                seconds: 6,
            }
        );
        assert_eq!(full.to_string(), "P1Y2M3DT4H5M6S");
    }

    #[test]
    fn test_invalid_periods() {
        for text in ["", "1D", "P", "PT", "P1X", "P1H", "PT1D", "P0D", "P1DT", "PT5"] {
            let result = text.parse::<IsoPeriod>();
            assert!(
                matches!(result, Err(HarvesterError::InvalidDefinition(_))),
                "{text:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_month_arithmetic_is_calendar_aware() {
        let month: IsoPeriod = "P1M".parse().unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 10, 0, 0).unwrap();
        assert_eq!(
            month.add_to(start),
            Some(Utc.with_ymd_and_hms(2024, 2, 29, 10, 0, 0).unwrap())
        );

        let mixed: IsoPeriod = "P1MT2H".parse().unwrap();
        let start = Utc.with_ymd_and_hms(2023, 12, 15, 23, 0, 0).unwrap();
        assert_eq!(
            mixed.add_to(start),
            Some(Utc.with_ymd_and_hms(2024, 1, 16, 1, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_delay_relative_to_last_harvest() {
        let period: IsoPeriod = "P30D".parse().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        // 没有采集记录时立即执行
        assert_eq!(period.delay(None, now), Duration::ZERO);

        // 已经过期
        let last = now - chrono::Duration::days(40);
        assert_eq!(period.delay(Some(last), now), Duration::ZERO);

        let last = now - chrono::Duration::days(10);
        assert_eq!(
            period.delay(Some(last), now),
            Duration::from_secs(20 * 24 * 3600)
        );

        // 正好到期
        let last = now - chrono::Duration::days(30);
        assert_eq!(period.delay(Some(last), now), Duration::ZERO);
    }
}
