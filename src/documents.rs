// Fixed-layout text documents for the batch reports. Rendering goes through
// `render_or_fallback` so a broken document becomes an error page instead of
// aborting the batch.
use crate::output::markdown_table;
use crate::reports::{DisciplinaryLetter, OffenderReport};
use crate::types::{ExecutiveSummary, KeyCount, TrendRow};
use crate::util::{format_int, format_number, format_opt, format_pct};
use chrono::{Month, NaiveDateTime};
use std::fmt::{self, Display, Write};
use tracing::error;

const SIGNATURE_BLOCK: &str = "\n\n______________________________\nOperations Manager\n\n\
______________________________\nHuman Resources\n\n\
______________________________\nReceived by (name and signature)\n";

fn month_name(month: u32) -> String {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name().to_string())
        .unwrap_or_else(|| format!("month {month}"))
}

pub fn error_document(title: &str, err: &dyn Display) -> String {
    format!(
        "# {title}\n\nThis document could not be generated.\n\nError: {err}\n\n\
Please check the input files and run the report again.\n"
    )
}

/// Run a renderer; on failure log it and hand back the error document.
pub fn render_or_fallback<E, F>(title: &str, render: F) -> String
where
    E: Display,
    F: FnOnce() -> Result<String, E>,
{
    match render() {
        Ok(doc) => doc,
        Err(e) => {
            error!(document = title, error = %e, "document rendering failed");
            error_document(title, &e)
        }
    }
}

fn key_count_lines(out: &mut String, items: &[KeyCount]) -> fmt::Result {
    if items.is_empty() {
        writeln!(out, "- (none)")?;
    }
    for k in items {
        writeln!(out, "- {}: {}", k.key, format_int(k.count))?;
    }
    Ok(())
}

pub fn render_offender_report(r: &OffenderReport, generated: NaiveDateTime) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "# Weekly Offender Report {}-W{:02}", r.year, r.week)?;
    writeln!(out, "Generated: {}\n", generated.format("%Y-%m-%d %H:%M"))?;
    writeln!(out, "Feedback registered this week: {}", format_int(r.total_feedback))?;
    writeln!(
        out,
        "Most reported reason: **{}** ({} reports)\n",
        r.top_reason,
        format_int(r.top_reason_count)
    )?;
    writeln!(out, "## Clients reporting \"{}\"\n", r.top_reason)?;
    writeln!(out, "{}\n", markdown_table(&r.offenders, usize::MAX))?;
    writeln!(out, "## Action plan\n")?;
    writeln!(out, "{}", r.action_plan)?;
    Ok(out)
}

pub fn render_letter(l: &DisciplinaryLetter, issued: NaiveDateTime) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "# {}", l.level.title().to_uppercase())?;
    writeln!(out, "Date: {}\n", issued.format("%Y-%m-%d"))?;
    writeln!(out, "To: {}", l.supervisor)?;
    writeln!(out, "Contractor: {}", l.contractor)?;
    writeln!(out, "Period: {} {}\n", month_name(l.month), l.year)?;
    writeln!(
        out,
        "During this period the routes under your supervision ({}) accumulated {} customer \
feedback reports, {} of which remain open. The weekly limit was exceeded in {} week(s): {}.\n",
        l.routes.join(", "),
        format_int(l.total),
        format_int(l.open),
        l.weeks_over.len(),
        l.weeks_over.join(", ")
    )?;
    writeln!(out, "Main reasons reported:")?;
    key_count_lines(&mut out, &l.top_reasons)?;
    writeln!(out, "\nRequired action plan:\n{}", l.action_plan)?;
    writeln!(
        out,
        "\nRepeated non-compliance will escalate this record to the next disciplinary level."
    )?;
    out.push_str(SIGNATURE_BLOCK);
    Ok(out)
}

pub fn render_executive_summary(s: &ExecutiveSummary, trend: &[TrendRow]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "# Executive Summary ({})\n", s.period)?;
    writeln!(out, "- Feedback received: {}", format_int(s.total_feedback))?;
    writeln!(
        out,
        "- Closed / open: {} / {}",
        format_int(s.closed_feedback),
        format_int(s.open_feedback)
    )?;
    writeln!(out, "- Closure rate: {}", format_pct(s.closure_rate))?;
    writeln!(
        out,
        "- Closure time (days): avg {}, median {}",
        format_opt(s.avg_closure_days, 1),
        format_opt(s.median_closure_days, 1)
    )?;
    writeln!(
        out,
        "- Clients / routes / supervisors: {} / {} / {}",
        format_int(s.distinct_clients),
        format_int(s.distinct_routes),
        format_int(s.distinct_supervisors)
    )?;
    writeln!(out, "- Without route assignment: {}", format_int(s.unassigned_feedback))?;
    writeln!(out, "- Supervisor check rate: {}", format_pct(s.supervisor_check_rate))?;
    writeln!(out, "- Points: {}\n", format_number(s.total_points, 0))?;
    writeln!(out, "## Top reasons")?;
    key_count_lines(&mut out, &s.top_reasons)?;
    writeln!(out, "\n## Top supervisors")?;
    key_count_lines(&mut out, &s.top_supervisors)?;
    writeln!(out, "\n## Top contractors")?;
    key_count_lines(&mut out, &s.top_contractors)?;
    writeln!(out, "\n## Weekly trend\n\n{}", markdown_table(trend, usize::MAX))?;
    Ok(out)
}
