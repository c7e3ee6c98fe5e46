// Pure group-by helpers over the joined table. Nothing here keeps state;
// the dashboard and every report call these on each run.
use crate::types::{CountRow, GroupSummaryRow, JoinedRecord, PendingRow, TrendRow};
use crate::util::{average, days_between, format_number, format_opt, format_pct, mode, ratio};
use chrono::{NaiveDateTime, Weekday};
use clap::ValueEnum;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum GroupKey {
    Route,
    User,
    Vendor,
    Client,
    Reason,
    SubResponse,
    Supervisor,
    Contractor,
}

impl GroupKey {
    pub fn value<'a>(&self, r: &'a JoinedRecord) -> &'a str {
        let f = &r.feedback;
        match self {
            GroupKey::Route => &f.route_key,
            GroupKey::User => &f.user,
            GroupKey::Vendor => &f.vendor,
            GroupKey::Client => &f.client_code,
            GroupKey::Reason => &f.reason,
            GroupKey::SubResponse => &f.sub_response,
            GroupKey::Supervisor => &r.supervisor,
            GroupKey::Contractor => &r.contractor,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GroupKey::Route => "Route",
            GroupKey::User => "User",
            GroupKey::Vendor => "Vendor",
            GroupKey::Client => "Client",
            GroupKey::Reason => "Reason",
            GroupKey::SubResponse => "Sub-response",
            GroupKey::Supervisor => "Supervisor",
            GroupKey::Contractor => "Contractor",
        }
    }

    /// Keys that only carry information once route assignments are joined.
    pub fn needs_routes(&self) -> bool {
        matches!(self, GroupKey::Supervisor | GroupKey::Contractor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Week,
    Month,
    Quarter,
}

impl Period {
    /// Sortable label: `2025-W03`, `2025-01`, `2025-Q1`.
    pub fn label(&self, r: &JoinedRecord) -> String {
        let c = &r.feedback.calendar;
        match self {
            Period::Week => format!("{}-W{:02}", c.iso_year, c.iso_week),
            Period::Month => format!("{}-{:02}", c.year, c.month),
            Period::Quarter => format!("{}-Q{}", c.year, c.quarter),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub key: String,
    pub total: usize,
    pub closed: usize,
    pub open: usize,
    pub closure_rate: f64,
    pub avg_closure_days: Option<f64>,
    pub points: f64,
    pub top_reason: Option<String>,
}

impl GroupSummary {
    pub fn to_row(&self) -> GroupSummaryRow {
        GroupSummaryRow {
            key: self.key.clone(),
            total: self.total,
            closed: self.closed,
            open: self.open,
            closure_rate: format_pct(self.closure_rate),
            avg_closure_days: format_opt(self.avg_closure_days, 1),
            points: format_number(self.points, 0),
            top_reason: self.top_reason.clone().unwrap_or_default(),
        }
    }
}

fn sort_counts(mut counts: Vec<(String, usize)>) -> Vec<(String, usize)> {
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Row counts per group, largest first, ties by key.
pub fn count_by(data: &[JoinedRecord], key: GroupKey) -> Vec<(String, usize)> {
    let mut map: HashMap<&str, usize> = HashMap::new();
    for r in data {
        *map.entry(key.value(r)).or_insert(0) += 1;
    }
    sort_counts(map.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

pub fn count_rows(counts: &[(String, usize)], limit: usize) -> Vec<CountRow> {
    let total: usize = counts.iter().map(|(_, c)| c).sum();
    counts
        .iter()
        .take(limit)
        .map(|(value, count)| CountRow {
            value: if value.is_empty() { "(blank)".to_string() } else { value.clone() },
            count: *count,
            share: format_pct(ratio(*count, total)),
        })
        .collect()
}

pub fn closure_rate(data: &[JoinedRecord]) -> f64 {
    ratio(data.iter().filter(|r| r.feedback.is_closed()).count(), data.len())
}

/// Mean closure time over closed rows only; `None` when nothing is closed.
pub fn average_closure_days(data: &[JoinedRecord]) -> Option<f64> {
    let days = closure_days(data);
    if days.is_empty() {
        None
    } else {
        Some(average(&days))
    }
}

pub fn closure_days(data: &[JoinedRecord]) -> Vec<f64> {
    data.iter()
        .filter_map(|r| r.feedback.closure_days)
        .map(|d| d as f64)
        .collect()
}

pub fn summarize(data: &[JoinedRecord], key: GroupKey) -> Vec<GroupSummary> {
    let mut groups: HashMap<&str, Vec<&JoinedRecord>> = HashMap::new();
    for r in data {
        groups.entry(key.value(r)).or_default().push(r);
    }
    let mut out: Vec<GroupSummary> = groups
        .into_iter()
        .map(|(k, rows)| {
            let total = rows.len();
            let closed = rows.iter().filter(|r| r.feedback.is_closed()).count();
            let days: Vec<f64> = rows
                .iter()
                .filter_map(|r| r.feedback.closure_days)
                .map(|d| d as f64)
                .collect();
            GroupSummary {
                key: k.to_string(),
                total,
                closed,
                open: total - closed,
                closure_rate: ratio(closed, total),
                avg_closure_days: if days.is_empty() { None } else { Some(average(&days)) },
                points: rows.iter().filter_map(|r| r.feedback.points).sum(),
                top_reason: mode(rows.iter().map(|r| r.feedback.reason.as_str())),
            }
        })
        .collect();
    out.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.key.cmp(&b.key)));
    out
}

pub fn trend(data: &[JoinedRecord], period: Period) -> Vec<TrendRow> {
    let mut map: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for r in data {
        let e = map.entry(period.label(r)).or_insert((0, 0));
        e.0 += 1;
        if r.feedback.is_closed() {
            e.1 += 1;
        }
    }
    map.into_iter()
        .map(|(period, (total, closed))| TrendRow {
            period,
            total,
            closed,
            closure_rate: format_pct(ratio(closed, total)),
        })
        .collect()
}

pub const CLOSURE_BUCKETS: [&str; 6] = ["same day", "1 day", "2-3 days", "4-7 days", "8+ days", "open"];

pub fn closure_bucket(days: Option<i64>) -> &'static str {
    match days {
        None => CLOSURE_BUCKETS[5],
        Some(d) if d <= 0 => CLOSURE_BUCKETS[0],
        Some(1) => CLOSURE_BUCKETS[1],
        Some(2..=3) => CLOSURE_BUCKETS[2],
        Some(4..=7) => CLOSURE_BUCKETS[3],
        Some(_) => CLOSURE_BUCKETS[4],
    }
}

/// Counts per closure-time bucket, always in bucket order.
pub fn closure_distribution(data: &[JoinedRecord]) -> Vec<(String, usize)> {
    CLOSURE_BUCKETS
        .iter()
        .map(|b| {
            let n = data
                .iter()
                .filter(|r| closure_bucket(r.feedback.closure_days) == *b)
                .count();
            (b.to_string(), n)
        })
        .collect()
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub fn weekday_distribution(data: &[JoinedRecord]) -> Vec<(String, usize)> {
    WEEK.iter()
        .map(|d| {
            let n = data.iter().filter(|r| r.feedback.calendar.weekday == *d).count();
            (d.to_string(), n)
        })
        .collect()
}

/// Only hours that actually occur, in clock order.
pub fn hour_distribution(data: &[JoinedRecord]) -> Vec<(String, usize)> {
    let mut map: BTreeMap<u32, usize> = BTreeMap::new();
    for r in data {
        *map.entry(r.feedback.calendar.hour).or_insert(0) += 1;
    }
    map.into_iter().map(|(h, n)| (format!("{h:02}:00"), n)).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrossTab {
    pub row_label: String,
    pub columns: Vec<String>,
    /// (row key, counts per column, row total)
    pub rows: Vec<(String, Vec<usize>, usize)>,
}

/// Count pivot of `rows` x `cols`, keeping the `max_cols` most frequent
/// column values; rows sorted by total.
pub fn cross_tab(data: &[JoinedRecord], rows: GroupKey, cols: GroupKey, max_cols: usize) -> CrossTab {
    let columns: Vec<String> = count_by(data, cols)
        .into_iter()
        .take(max_cols)
        .map(|(k, _)| k)
        .collect();
    let index: HashMap<&str, usize> = columns.iter().enumerate().map(|(i, c)| (c.as_str(), i)).collect();

    let mut table: HashMap<&str, (Vec<usize>, usize)> = HashMap::new();
    for r in data {
        let e = table
            .entry(rows.value(r))
            .or_insert_with(|| (vec![0; columns.len()], 0));
        e.1 += 1;
        if let Some(i) = index.get(cols.value(r)) {
            e.0[*i] += 1;
        }
    }
    let mut out: Vec<(String, Vec<usize>, usize)> = table
        .into_iter()
        .map(|(k, (counts, total))| (k.to_string(), counts, total))
        .collect();
    out.sort_by(|a, b| match b.2.cmp(&a.2) {
        Ordering::Equal => a.0.cmp(&b.0),
        other => other,
    });
    CrossTab {
        row_label: rows.label().to_string(),
        columns,
        rows: out,
    }
}

/// Open feedback ordered by age, oldest first.
pub fn oldest_open(data: &[JoinedRecord], as_of: NaiveDateTime, limit: usize) -> Vec<PendingRow> {
    let mut open: Vec<&JoinedRecord> = data.iter().filter(|r| !r.feedback.is_closed()).collect();
    open.sort_by(|a, b| {
        a.feedback
            .registered_at
            .cmp(&b.feedback.registered_at)
            .then_with(|| a.feedback.topic_id.cmp(&b.feedback.topic_id))
    });
    open.into_iter()
        .take(limit)
        .map(|r| PendingRow {
            topic_id: r.feedback.topic_id.clone(),
            registered: r.feedback.registered_at.format("%Y-%m-%d %H:%M").to_string(),
            age_days: days_between(r.feedback.registered_at, as_of),
            route: r.feedback.route.clone(),
            client: format!("{} {}", r.feedback.client_code, r.feedback.client_name).trim().to_string(),
            reason: r.feedback.reason.clone(),
            supervisor: r.supervisor.clone(),
        })
        .collect()
}
