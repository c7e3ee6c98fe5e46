use crate::types::JoinedRecord;
use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportingPeriod {
    #[default]
    All,
    Week { year: i32, week: u32 },
    Month { year: i32, month: u32 },
    Range { from: Option<NaiveDate>, to: Option<NaiveDate> },
}

impl ReportingPeriod {
    pub fn contains(&self, r: &JoinedRecord) -> bool {
        let c = &r.feedback.calendar;
        match *self {
            ReportingPeriod::All => true,
            ReportingPeriod::Week { year, week } => c.iso_year == year && c.iso_week == week,
            ReportingPeriod::Month { year, month } => c.year == year && c.month == month,
            ReportingPeriod::Range { from, to } => {
                let d = r.feedback.registered_at.date();
                from.map_or(true, |f| d >= f) && to.map_or(true, |t| d <= t)
            }
        }
    }
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportingPeriod::All => write!(f, "all periods"),
            ReportingPeriod::Week { year, week } => write!(f, "{year}-W{week:02}"),
            ReportingPeriod::Month { year, month } => write!(f, "{year}-{month:02}"),
            ReportingPeriod::Range { from, to } => {
                let show = |d: &Option<NaiveDate>| d.map(|v| v.to_string()).unwrap_or_else(|| "..".into());
                write!(f, "{} to {}", show(from), show(to))
            }
        }
    }
}

/// Boolean-mask filter over the joined table. Empty lists match everything;
/// names compare case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct FeedbackFilter {
    pub period: ReportingPeriod,
    pub supervisors: Vec<String>,
    pub contractors: Vec<String>,
    pub routes: Vec<String>,
    pub reasons: Vec<String>,
    pub open_only: bool,
}

fn matches_any(values: &[String], candidate: &str) -> bool {
    let candidate = candidate.trim().to_lowercase();
    values.is_empty() || values.iter().any(|v| v.trim().to_lowercase() == candidate)
}

impl FeedbackFilter {
    pub fn for_period(period: ReportingPeriod) -> Self {
        FeedbackFilter {
            period,
            ..FeedbackFilter::default()
        }
    }

    pub fn matches(&self, r: &JoinedRecord) -> bool {
        self.period.contains(r)
            && matches_any(&self.supervisors, &r.supervisor)
            && matches_any(&self.contractors, &r.contractor)
            && matches_any(&self.routes, &r.feedback.route)
            && matches_any(&self.reasons, &r.feedback.reason)
            && (!self.open_only || !r.feedback.is_closed())
    }

    pub fn apply(&self, data: &[JoinedRecord]) -> Vec<JoinedRecord> {
        data.iter().filter(|r| self.matches(r)).cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.period == ReportingPeriod::All
            && self.supervisors.is_empty()
            && self.contractors.is_empty()
            && self.routes.is_empty()
            && self.reasons.is_empty()
            && !self.open_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample;

    #[test]
    fn week_and_month_periods() {
        let data = sample();
        let week2 = FeedbackFilter::for_period(ReportingPeriod::Week { year: 2025, week: 2 });
        assert_eq!(week2.apply(&data).len(), 5);
        let jan = FeedbackFilter::for_period(ReportingPeriod::Month { year: 2025, month: 1 });
        assert_eq!(jan.apply(&data).len(), data.len());
        let feb = FeedbackFilter::for_period(ReportingPeriod::Month { year: 2025, month: 2 });
        assert!(feb.apply(&data).is_empty());
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let data = sample();
        let f = FeedbackFilter::for_period(ReportingPeriod::Range {
            from: NaiveDate::from_ymd_opt(2025, 1, 8),
            to: NaiveDate::from_ymd_opt(2025, 1, 13),
        });
        assert_eq!(f.apply(&data).len(), 4);
    }

    #[test]
    fn name_lists_and_open_only_combine() {
        let data = sample();
        let f = FeedbackFilter {
            supervisors: vec!["ana".into()],
            open_only: true,
            ..FeedbackFilter::default()
        };
        let out = f.apply(&data);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.supervisor == "Ana" && !r.feedback.is_closed()));
        assert!(!f.is_empty());
        assert!(FeedbackFilter::default().is_empty());
    }

    #[test]
    fn periods_render_as_labels() {
        assert_eq!(ReportingPeriod::Week { year: 2025, week: 3 }.to_string(), "2025-W03");
        assert_eq!(ReportingPeriod::Month { year: 2025, month: 1 }.to_string(), "2025-01");
    }
}
