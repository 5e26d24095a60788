use std::fmt;

use serde::{Deserialize, Serialize};

/// 采集进程状态，只能单向流转
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProcessStatus {
    #[serde(rename = "SUBMITTED")]
    Submitted,
    #[serde(rename = "WORKING")]
    Working,
    #[serde(rename = "COMPLETED")]
    Completed,
}

impl ProcessStatus {
    /// 状态只能前进一步
    pub fn can_transition_to(self, next: ProcessStatus) -> bool {
        matches!(
            (self, next),
            (ProcessStatus::Submitted, ProcessStatus::Working)
                | (ProcessStatus::Working, ProcessStatus::Completed)
        )
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessStatus::Submitted => write!(f, "submitted"),
            ProcessStatus::Working => write!(f, "working"),
            ProcessStatus::Completed => write!(f, "completed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_monotonic() {
        assert!(ProcessStatus::Submitted.can_transition_to(ProcessStatus::Working));
        assert!(ProcessStatus::Working.can_transition_to(ProcessStatus::Completed));
        assert!(!ProcessStatus::Completed.can_transition_to(ProcessStatus::Working));
        assert!(!ProcessStatus::Submitted.can_transition_to(ProcessStatus::Completed));
        assert!(!ProcessStatus::Working.can_transition_to(ProcessStatus::Working));
    }
}
