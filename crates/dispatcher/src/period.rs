use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Months, TimeDelta, Utc};
use harvester_core::{HarvesterError, HarvesterResult};

/// ISO-8601 时间段，例如 `PT1H`、`P1D`、`P2W`、`P1M`
///
/// 年和月按日历计算（1月31日加一个月是2月的最后一天），其余部分按固定时长计算。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IsoPeriod {
    pub years: u32,
    pub months: u32,
    pub weeks: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl IsoPeriod {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// `start` 加上时间段，溢出时返回 None
    pub fn add_to(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let months = self.years.checked_mul(12)?.checked_add(self.months)?;
        let shifted = start.checked_add_months(Months::new(months))?;
        let days = i64::from(self.weeks) * 7 + i64::from(self.days);
        let fixed = TimeDelta::try_days(days)?
            + TimeDelta::try_hours(i64::from(self.hours))?
            + TimeDelta::try_minutes(i64::from(self.minutes))?
            + TimeDelta::try_seconds(i64::from(self.seconds))?;
        shifted.checked_add_signed(fixed)
    }

    /// 下一次运行前的等待时间
    ///
    /// 没有上次运行记录，或者下一次运行时间已过，都立即运行。
    pub fn delay(&self, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
        let Some(last) = last else {
            return Duration::ZERO;
        };
        match self.add_to(last) {
            Some(next) if next > now => (next - now).to_std().unwrap_or(Duration::ZERO),
            Some(_) => Duration::ZERO,
            // 溢出视为永远不会到达
            None => Duration::MAX,
        }
    }

    fn invalid(source: &str, reason: &str) -> HarvesterError {
        HarvesterError::invalid_definition(format!("无效的时间段 '{source}': {reason}"))
    }
}

impl FromStr for IsoPeriod {
    type Err = HarvesterError;

    fn from_str(s: &str) -> HarvesterResult<Self> {
        let text = s.trim().to_ascii_uppercase();
        let body = text
            .strip_prefix('P')
            .ok_or_else(|| Self::invalid(s, "必须以 P 开头"))?;

        let mut period = Self::default();
        let mut in_time = false;
        let mut number = String::new();
        let mut seen_designator = false;
        let mut seen_time_part = false;

        for c in body.chars() {
            match c {
                '0'..='9' => number.push(c),
                'T' => {
                    if in_time || !number.is_empty() {
                        return Err(Self::invalid(s, "T 的位置不正确"));
                    }
                    in_time = true;
                }
                designator => {
                    let value: u32 = number
                        .parse()
                        .map_err(|_| Self::invalid(s, "单位前缺少数字"))?;
                    number.clear();
                    let slot = match (in_time, designator) {
                        (false, 'Y') => &mut period.years,
                        (false, 'M') => &mut period.months,
                        (false, 'W') => &mut period.weeks,
                        (false, 'D') => &mut period.days,
                        (true, 'H') => &mut period.hours,
                        (true, 'M') => &mut period.minutes,
                        (true, 'S') => &mut period.seconds,
                        _ => return Err(Self::invalid(s, "未知的单位")),
                    };
                    *slot = value;
                    seen_designator = true;
                    seen_time_part |= in_time;
                }
            }
        }

        if !number.is_empty() {
            return Err(Self::invalid(s, "数字后缺少单位"));
        }
        if in_time && !seen_time_part {
            return Err(Self::invalid(s, "T 之后缺少时间部分"));
        }
        if !seen_designator {
            return Err(Self::invalid(s, "缺少时间段内容"));
        }
        if period.is_zero() {
            return Err(Self::invalid(s, "时间段不能为零"));
        }
        Ok(period)
    }
}

impl fmt::Display for IsoPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P")?;
        for (value, unit) in [
            (self.years, 'Y'),
            (self.months, 'M'),
            (self.weeks, 'W'),
            (self.days, 'D'),
        ] {
            if value > 0 {
                write!(f, "{value}{unit}")?;
            }
        }
        if self.hours + self.minutes + self.seconds > 0 {
            write!(f, "T")?;
            for (value, unit) in [(self.hours, 'H'), (self.minutes, 'M'), (self.seconds, 'S')] {
                if value > 0 {
                    write!(f, "{value}{unit}")?;
                }
            }
        }
        Ok(())
    }
}
