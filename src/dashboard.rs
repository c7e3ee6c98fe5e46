// Terminal dashboard: every call recomputes each panel from the filtered
// table. Panels that depend on route assignments are disabled, not dropped,
// when the route files could not be loaded.
use crate::aggregate::{
    average_closure_days, closure_distribution, closure_rate, count_by, count_rows, cross_tab, hour_distribution,
    oldest_open, summarize, trend, weekday_distribution, GroupKey, Period,
};
use crate::filter::FeedbackFilter;
use crate::loader::Dataset;
use crate::output::{markdown_grid, markdown_table};
use crate::types::{GroupSummaryRow, JoinedRecord};
use crate::util::{format_int, format_opt, format_pct, ratio};
use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub enum PanelBody {
    Table(String),
    Disabled(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub title: String,
    pub body: PanelBody,
}

impl Panel {
    fn table(title: &str, body: String) -> Self {
        Panel {
            title: title.to_string(),
            body: PanelBody::Table(body),
        }
    }

    fn disabled(title: &str, reason: &str) -> Self {
        Panel {
            title: title.to_string(),
            body: PanelBody::Disabled(reason.to_string()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.body, PanelBody::Table(_))
    }
}

fn kpis(data: &[JoinedRecord], total_loaded: usize) -> String {
    let closed = data.iter().filter(|r| r.feedback.is_closed()).count();
    let checked = data.iter().filter(|r| r.feedback.supervisor_checked).count();
    let rows = vec![
        vec!["Feedback (filtered / loaded)".to_string(), format!("{} / {}", format_int(data.len()), format_int(total_loaded))],
        vec!["Closed".to_string(), format_int(closed)],
        vec!["Open".to_string(), format_int(data.len() - closed)],
        vec!["Closure rate".to_string(), format_pct(closure_rate(data))],
        vec!["Avg closure days".to_string(), format_opt(average_closure_days(data), 1)],
        vec!["Supervisor check rate".to_string(), format_pct(ratio(checked, data.len()))],
    ];
    markdown_grid(vec!["Metric".to_string(), "Value".to_string()], rows)
}

fn counts_grid(title_col: &str, counts: Vec<(String, usize)>) -> String {
    markdown_grid(
        vec![title_col.to_string(), "Count".to_string()],
        counts.into_iter().map(|(k, n)| vec![k, format_int(n)]).collect(),
    )
}

fn summary_table(data: &[JoinedRecord], key: GroupKey, top: usize) -> String {
    let rows: Vec<GroupSummaryRow> = summarize(data, key).iter().map(|s| s.to_row()).collect();
    markdown_table(&rows, top)
}

pub fn build_panels(dataset: &Dataset, filter: &FeedbackFilter, top: usize, as_of: NaiveDateTime) -> Vec<Panel> {
    let data = filter.apply(&dataset.records);
    let mut panels = vec![Panel::table("Key figures", kpis(&data, dataset.records.len()))];

    if data.is_empty() {
        for title in ["Breakdowns", "Trends", "Pending"] {
            panels.push(Panel::disabled(title, "no feedback matches the current filters"));
        }
        return panels;
    }

    panels.push(Panel::table("By reason", summary_table(&data, GroupKey::Reason, top)));
    panels.push(Panel::table("By route", summary_table(&data, GroupKey::Route, top)));
    panels.push(Panel::table("By user", summary_table(&data, GroupKey::User, top)));
    panels.push(Panel::table(
        "Top clients",
        markdown_table(&count_rows(&count_by(&data, GroupKey::Client), top), top),
    ));

    let routes_note = "route assignment file not loaded";
    for (title, key) in [("By supervisor", GroupKey::Supervisor), ("By contractor", GroupKey::Contractor)] {
        if dataset.routes_available {
            panels.push(Panel::table(title, summary_table(&data, key, top)));
        } else {
            panels.push(Panel::disabled(title, routes_note));
        }
    }
    if dataset.routes_available {
        let ct = cross_tab(&data, GroupKey::Supervisor, GroupKey::Reason, 5);
        let mut header = vec![ct.row_label.clone()];
        header.extend(ct.columns.iter().cloned());
        header.push("Total".to_string());
        let rows = ct
            .rows
            .iter()
            .take(top)
            .map(|(k, counts, total)| {
                let mut r = vec![k.clone()];
                r.extend(counts.iter().map(|n| n.to_string()));
                r.push(total.to_string());
                r
            })
            .collect();
        panels.push(Panel::table("Supervisor x reason", markdown_grid(header, rows)));
    } else {
        panels.push(Panel::disabled("Supervisor x reason", routes_note));
    }

    panels.push(Panel::table("Weekly trend", markdown_table(&trend(&data, Period::Week), usize::MAX)));
    panels.push(Panel::table("Monthly trend", markdown_table(&trend(&data, Period::Month), usize::MAX)));
    panels.push(Panel::table("Quarterly trend", markdown_table(&trend(&data, Period::Quarter), usize::MAX)));
    panels.push(Panel::table("Closure time", counts_grid("Bucket", closure_distribution(&data))));
    panels.push(Panel::table("By weekday", counts_grid("Weekday", weekday_distribution(&data))));
    panels.push(Panel::table("By hour", counts_grid("Hour", hour_distribution(&data))));
    panels.push(Panel::table("Oldest open feedback", markdown_table(&oldest_open(&data, as_of, top), top)));
    panels
}

pub fn render(panels: &[Panel]) -> String {
    let mut out = String::new();
    for p in panels {
        out.push_str(&format!("## {}\n\n", p.title));
        match &p.body {
            PanelBody::Table(t) => out.push_str(t),
            PanelBody::Disabled(reason) => out.push_str(&format!("(disabled: {reason})")),
        }
        out.push_str("\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ReportingPeriod;
    use crate::fixtures::{dataset, sample};
    use crate::util::parse_datetime_safe;

    fn as_of() -> NaiveDateTime {
        parse_datetime_safe(Some("2025-01-20")).unwrap()
    }

    #[test]
    fn all_panels_enabled_with_routes() {
        let panels = build_panels(&dataset(sample(), true), &FeedbackFilter::default(), 5, as_of());
        assert_eq!(panels.len(), 15);
        assert!(panels.iter().all(Panel::is_enabled));
        let text = render(&panels);
        assert!(text.contains("## By supervisor"));
        assert!(text.contains("| Ana "));
    }

    #[test]
    fn route_panels_disabled_without_routes() {
        let panels = build_panels(&dataset(sample(), false), &FeedbackFilter::default(), 5, as_of());
        let disabled: Vec<&str> = panels
            .iter()
            .filter(|p| !p.is_enabled())
            .map(|p| p.title.as_str())
            .collect();
        assert_eq!(disabled, vec!["By supervisor", "By contractor", "Supervisor x reason"]);
    }

    #[test]
    fn empty_filter_result_keeps_only_key_figures() {
        let filter = FeedbackFilter::for_period(ReportingPeriod::Month { year: 2030, month: 1 });
        let panels = build_panels(&dataset(sample(), true), &filter, 5, as_of());
        assert!(panels[0].is_enabled());
        assert!(panels[1..].iter().all(|p| !p.is_enabled()));
        assert!(render(&panels).contains("0 / 8"));
    }
}
