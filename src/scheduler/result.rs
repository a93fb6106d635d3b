//! Outcome flags of one job firing.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Combinable outcome flags.
///
/// ```
/// use taskloom::TaskResult;
///
/// let r = TaskResult::SUCCESS | TaskResult::NO_DATA;
/// assert!(r.contains(TaskResult::SUCCESS));
/// assert!(!r.contains(TaskResult::FAIL));
/// assert_eq!(r.to_string(), "success|no_data");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TaskResult(u8);

impl TaskResult {
    pub const SUCCESS: TaskResult = TaskResult(1);
    pub const FAIL: TaskResult = TaskResult(2);
    pub const VALIDATION_FAILED: TaskResult = TaskResult(4);
    pub const SUCCESS_WITH_WARNINGS: TaskResult = TaskResult(8);
    pub const NO_DATA: TaskResult = TaskResult(16);
    pub const ABORTED: TaskResult = TaskResult(32);
    pub const NOT_EXECUTED: TaskResult = TaskResult(64);

    const NAMES: [(TaskResult, &'static str); 7] = [
        (TaskResult::SUCCESS, "success"),
        (TaskResult::FAIL, "fail"),
        (TaskResult::VALIDATION_FAILED, "validation_failed"),
        (TaskResult::SUCCESS_WITH_WARNINGS, "success_with_warnings"),
        (TaskResult::NO_DATA, "no_data"),
        (TaskResult::ABORTED, "aborted"),
        (TaskResult::NOT_EXECUTED, "not_executed"),
    ];

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Builds a result from raw bits; unknown bits are dropped.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        TaskResult(bits & 0x7f)
    }

    /// True when every flag of `other` is set.
    pub const fn contains(self, other: TaskResult) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True for `SUCCESS` or `SUCCESS_WITH_WARNINGS` without failure flags.
    pub fn is_success(self) -> bool {
        let ok = self.contains(TaskResult::SUCCESS)
            || self.contains(TaskResult::SUCCESS_WITH_WARNINGS);
        let bad = TaskResult::FAIL | TaskResult::ABORTED | TaskResult::VALIDATION_FAILED;
        ok && self.0 & bad.0 == 0
    }
}

impl BitOr for TaskResult {
    type Output = TaskResult;

    fn bitor(self, rhs: Self) -> Self::Output {
        TaskResult(self.0 | rhs.0)
    }
}

impl BitOrAssign for TaskResult {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut first = true;
        for (flag, name) in TaskResult::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskResult({self})")
    }
}
