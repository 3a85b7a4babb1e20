//! Time windows and their point budgets.

use std::fmt;
use std::time::Duration;

/// Granularity of a fixed-window counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    Minute,
    Hour,
    Day,
}

impl Window {
    /// Evaluation order: coarsest first.
    pub const ORDER: [Window; 3] = [Window::Day, Window::Hour, Window::Minute];

    pub fn duration(self) -> Duration {
        match self {
            Window::Minute => Duration::from_secs(60),
            Window::Hour => Duration::from_secs(60 * 60),
            Window::Day => Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Only exhausting the daily window counts as abuse.
    pub fn escalates(self) -> bool {
        matches!(self, Window::Day)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Minute => write!(f, "minute"),
            Window::Hour => write!(f, "hour"),
            Window::Day => write!(f, "day"),
        }
    }
}

/// Point budget per window. `0` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowBudgets {
    pub minute: u32,
    pub hour: u32,
    pub day: u32,
}

impl WindowBudgets {
    pub fn new(minute: u32, hour: u32, day: u32) -> Self {
        Self { minute, hour, day }
    }

    /// Builds budgets from signed configuration values; anything below one is unlimited.
    pub fn from_signed(minute: i64, hour: i64, day: i64) -> Self {
        let clamp = |v: i64| u32::try_from(v.max(0)).unwrap_or(u32::MAX);
        Self::new(clamp(minute), clamp(hour), clamp(day))
    }

    pub fn get(&self, window: Window) -> u32 {
        match window {
            Window::Minute => self.minute,
            Window::Hour => self.hour,
            Window::Day => self.day,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_day_hour_minute() {
        assert_eq!(Window::ORDER, [Window::Day, Window::Hour, Window::Minute]);
    }

    #[test]
    fn test_only_day_escalates() {
        assert!(Window::Day.escalates());
        assert!(!Window::Hour.escalates());
        assert!(!Window::Minute.escalates());
    }

    #[test]
    fn test_negative_budgets_are_unlimited() {
        let budgets = WindowBudgets::from_signed(-5, 0, 10);
        assert_eq!(budgets, WindowBudgets::new(0, 0, 10));
    }
}
