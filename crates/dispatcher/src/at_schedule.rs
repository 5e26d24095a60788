use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use harvester_core::{HarvesterError, HarvesterResult};
use tracing::warn;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// 从 `current` 到下一次 `target` 的分钟数（都是一天中的第几分钟）
///
/// 目标时间已过或正好是当前分钟时，顺延到第二天。
pub fn delay_minutes(target: u32, current: u32) -> u32 {
    if target > current {
        target - current
    } else {
        MINUTES_PER_DAY - current + target
    }
}

/// 每天固定时刻的调度表达式
///
/// 格式为 `HH:mm[:dow[:wom[:moy]]]`，后三段都是逗号分隔的整数列表或 `*`：
///
/// - `dow` 星期几，1 = 星期日 … 7 = 星期六
/// - `wom` 当月第几周，`(日 - 1) / 7 + 1`
/// - `moy` 月份，1 … 12
///
/// ```rust
/// use harvester_dispatcher::at_schedule::AtSchedule;
///
/// let schedule: AtSchedule = "02:30:2".parse().unwrap();
/// assert_eq!(schedule.minute_of_day(), 150);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtSchedule {
    hour: u32,
    minute: u32,
    days_of_week: Option<BTreeSet<u32>>,
    weeks_of_month: Option<BTreeSet<u32>>,
    months: Option<BTreeSet<u32>>,
}

impl AtSchedule {
    pub fn minute_of_day(&self) -> u32 {
        self.hour * 60 + self.minute
    }

    /// 日期是否满足星期、周次和月份条件
    pub fn matches(&self, date: NaiveDate) -> bool {
        let allowed = |set: &Option<BTreeSet<u32>>, value: u32| {
            set.as_ref().map_or(true, |set| set.contains(&value))
        };
        allowed(&self.days_of_week, date.weekday().number_from_sunday())
            && allowed(&self.weeks_of_month, (date.day() - 1) / 7 + 1)
            && allowed(&self.months, date.month())
    }

    /// 到点后是否执行：日期满足条件，且当天还没有执行过
    pub fn should_fire(&self, today: NaiveDate, last_fired: Option<NaiveDate>) -> bool {
        last_fired != Some(today) && self.matches(today)
    }

    /// 从 `now` 到下一次触发的等待时间，对齐到整分钟
    pub fn delay_from(&self, now: NaiveTime) -> Duration {
        let current = now.hour() * 60 + now.minute();
        let minutes = delay_minutes(self.minute_of_day(), current);
        Duration::from_secs(u64::from(minutes) * 60 - u64::from(now.second()))
    }

    fn parse_clock(part: &str, max: u32, what: &str, source: &str) -> HarvesterResult<u32> {
        part.trim()
            .parse::<u32>()
            .ok()
            .filter(|value| *value <= max)
            .ok_or_else(|| {
                HarvesterError::invalid_definition(format!("无效的{what} '{part}' (时间: {source})"))
            })
    }

    /// 解析整数列表，无法解析的项记录日志后跳过
    fn parse_set(part: &str, range: std::ops::RangeInclusive<u32>, what: &str) -> Option<BTreeSet<u32>> {
        let part = part.trim();
        if part.is_empty() || part == "*" {
            return None;
        }
        let set: BTreeSet<u32> = part
            .split(',')
            .filter_map(|item| match item.trim().parse::<u32>() {
                Ok(value) if range.contains(&value) => Some(value),
                _ => {
                    warn!("忽略无效的{what}: '{item}'");
                    None
                }
            })
            .collect();
        if set.is_empty() {
            warn!("{what}列表 '{part}' 没有有效值，触发器不会运行");
        }
        Some(set)
    }
}

impl FromStr for AtSchedule {
    type Err = HarvesterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() < 2 || parts.len() > 5 {
            return Err(HarvesterError::invalid_definition(format!(
                "时间格式应为 HH:mm[:dow[:wom[:moy]]], 实际为 '{s}'"
            )));
        }
        let field = |index: usize| parts.get(index).copied().unwrap_or("*");
        Ok(Self {
            hour: Self::parse_clock(parts[0], 23, "小时", s)?,
            minute: Self::parse_clock(parts[1], 59, "分钟", s)?,
            days_of_week: Self::parse_set(field(2), 1..=7, "星期"),
            weeks_of_month: Self::parse_set(field(3), 1..=5, "周次"),
            months: Self::parse_set(field(4), 1..=12, "月份"),
        })
    }
}

impl fmt::Display for AtSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set = |set: &Option<BTreeSet<u32>>| match set {
            None => "*".to_string(),
            Some(values) => values
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(","),
        };
        write!(
            f,
            "{:02}:{:02}:{}:{}:{}",
            self.hour,
            self.minute,
            set(&self.days_of_week),
            set(&self.weeks_of_month),
            set(&self.months)
        )
    }
}
