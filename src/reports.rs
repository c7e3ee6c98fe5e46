use crate::aggregate::{average_closure_days, closure_days, closure_rate, count_by, GroupKey};
use crate::error::{ReportError, Result};
use crate::filter::ReportingPeriod;
use crate::types::{ExecutiveSummary, JoinedRecord, KeyCount, OffenderRow, UNASSIGNED};
use crate::util::{fold_text, median, mode, ratio};
use std::collections::{BTreeMap, BTreeSet, HashMap};

const DEFAULT_PLAN: &str = "Review each case with the route supervisor, contact the client within 48 hours \
and record the corrective action in the feedback system before the next weekly review.";

// First keyword hit wins; keywords are matched against the accent-folded,
// lower-cased reason.
const ACTION_PLANS: [(&[&str], &str); 7] = [
    (
        &["vencid", "caducad", "fecha corta"],
        "Audit stock rotation (FIFO) at the client, withdraw expired product on the next visit \
and check warehouse dispatch dates for the route.",
    ),
    (
        &["visita", "frecuencia", "no paso"],
        "Confirm the visit calendar with the client, validate GPS check-ins for the route \
and schedule a supervised ride-along this week.",
    ),
    (
        &["precio", "cobro", "descuento", "factura"],
        "Validate the price list applied on the route, issue credit notes for overcharges \
and reinforce current promotions with the sales rep.",
    ),
    (
        &["envase", "roto", "danad", "calidad", "sabor"],
        "Inspect handling and loading practices, replace damaged units \
and file a quality report with the plant.",
    ),
    (
        &["entrega", "pedido", "faltante", "incomplet"],
        "Reconcile orders against delivery notes, correct picking errors \
and confirm the delivery window with the client.",
    ),
    (
        &["trato", "atencion", "actitud", "grosero"],
        "Hold a service-standards session with the crew involved \
and follow up with the client by phone within 24 hours.",
    ),
    (
        &["refriger", "enfriador", "equipo", "cooler"],
        "Raise a technical service ticket for the cooler \
and verify the equipment inventory assigned to the client.",
    ),
];

pub fn action_plan(reason: &str) -> &'static str {
    let folded = fold_text(reason);
    ACTION_PLANS
        .iter()
        .find(|(keys, _)| keys.iter().any(|k| folded.contains(k)))
        .map(|(_, plan)| *plan)
        .unwrap_or(DEFAULT_PLAN)
}

fn key_counts(counts: Vec<(String, usize)>, limit: usize) -> Vec<KeyCount> {
    counts
        .into_iter()
        .filter(|(k, _)| !k.is_empty() && k != UNASSIGNED)
        .take(limit)
        .map(|(key, count)| KeyCount { key, count })
        .collect()
}

#[derive(Debug, Clone)]
pub struct OffenderReport {
    pub year: i32,
    pub week: u32,
    pub total_feedback: usize,
    pub top_reason: String,
    pub top_reason_count: usize,
    pub action_plan: &'static str,
    pub offenders: Vec<OffenderRow>,
}

/// ISO (year, week) pairs present in the data, oldest first.
pub fn available_weeks(data: &[JoinedRecord]) -> Vec<(i32, u32)> {
    data.iter()
        .map(|r| (r.feedback.calendar.iso_year, r.feedback.calendar.iso_week))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn latest_week(data: &[JoinedRecord]) -> Option<(i32, u32)> {
    available_weeks(data).pop()
}

/// Most-reported reason of the week and the clients that reported it most.
pub fn weekly_offenders(data: &[JoinedRecord], year: i32, week: u32, top_n: usize) -> Result<OffenderReport> {
    let period = ReportingPeriod::Week { year, week };
    let rows: Vec<&JoinedRecord> = data.iter().filter(|r| period.contains(r)).collect();
    let Some(top_reason) = mode(rows.iter().map(|r| r.feedback.reason.as_str())) else {
        return Err(ReportError::EmptyPeriod(period.to_string()));
    };

    let mut by_client: HashMap<&str, Vec<&JoinedRecord>> = HashMap::new();
    for r in rows.iter().filter(|r| r.feedback.reason == top_reason) {
        by_client.entry(r.feedback.client_code.as_str()).or_default().push(*r);
    }
    let top_reason_count = by_client.values().map(|v| v.len()).sum();

    let mut clients: Vec<(&str, Vec<&JoinedRecord>)> = by_client.into_iter().collect();
    clients.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)));

    let offenders = clients
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(i, (code, recs))| OffenderRow {
            rank: i + 1,
            client_code: code.to_string(),
            client_name: mode(recs.iter().map(|r| r.feedback.client_name.as_str())).unwrap_or_default(),
            reports: recs.len(),
            route: mode(recs.iter().map(|r| r.feedback.route_key.as_str())).unwrap_or_default(),
            supervisor: mode(recs.iter().map(|r| r.supervisor.as_str())).unwrap_or_default(),
        })
        .collect();

    Ok(OffenderReport {
        year,
        week,
        total_feedback: rows.len(),
        action_plan: action_plan(&top_reason),
        top_reason,
        top_reason_count,
        offenders,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Escalation {
    VerbalWarning,
    WrittenWarning,
    FinalNotice,
}

impl Escalation {
    pub fn from_weeks(weeks_over_threshold: usize) -> Option<Self> {
        match weeks_over_threshold {
            0 => None,
            1 => Some(Escalation::VerbalWarning),
            2 => Some(Escalation::WrittenWarning),
            _ => Some(Escalation::FinalNotice),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Escalation::VerbalWarning => "Verbal warning",
            Escalation::WrittenWarning => "Written warning",
            Escalation::FinalNotice => "Final notice",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DisciplinaryLetter {
    pub supervisor: String,
    pub contractor: String,
    pub year: i32,
    pub month: u32,
    pub level: Escalation,
    pub weeks_over: Vec<String>,
    pub total: usize,
    pub open: usize,
    pub top_reasons: Vec<KeyCount>,
    pub routes: Vec<String>,
    pub action_plan: &'static str,
}

/// One letter per supervisor whose weekly feedback count reached
/// `threshold` in at least one ISO week of the month. Supervisors with more
/// such weeks escalate further. Highest level first.
pub fn disciplinary_letters(data: &[JoinedRecord], year: i32, month: u32, threshold: usize) -> Vec<DisciplinaryLetter> {
    let period = ReportingPeriod::Month { year, month };
    let mut by_supervisor: BTreeMap<&str, Vec<&JoinedRecord>> = BTreeMap::new();
    for r in data.iter().filter(|r| period.contains(r) && r.supervisor != UNASSIGNED) {
        by_supervisor.entry(r.supervisor.as_str()).or_default().push(r);
    }

    let mut letters: Vec<DisciplinaryLetter> = by_supervisor
        .into_iter()
        .filter_map(|(supervisor, rows)| {
            let mut weekly: BTreeMap<(i32, u32), usize> = BTreeMap::new();
            for r in &rows {
                let c = &r.feedback.calendar;
                *weekly.entry((c.iso_year, c.iso_week)).or_insert(0) += 1;
            }
            let weeks_over: Vec<String> = weekly
                .into_iter()
                .filter(|(_, n)| *n >= threshold.max(1))
                .map(|((y, w), _)| format!("{y}-W{w:02}"))
                .collect();
            let level = Escalation::from_weeks(weeks_over.len())?;

            let owned: Vec<JoinedRecord> = rows.iter().map(|r| (*r).clone()).collect();
            let top_reasons = key_counts(count_by(&owned, GroupKey::Reason), 3);
            let plan = top_reasons.first().map(|k| action_plan(&k.key)).unwrap_or(DEFAULT_PLAN);
            let routes: BTreeSet<&str> = rows.iter().map(|r| r.feedback.route_key.as_str()).collect();

            Some(DisciplinaryLetter {
                supervisor: supervisor.to_string(),
                contractor: mode(rows.iter().map(|r| r.contractor.as_str())).unwrap_or_default(),
                year,
                month,
                level,
                weeks_over,
                total: rows.len(),
                open: rows.iter().filter(|r| !r.feedback.is_closed()).count(),
                top_reasons,
                routes: routes.into_iter().map(str::to_string).collect(),
                action_plan: plan,
            })
        })
        .collect();
    letters.sort_by(|a, b| b.level.cmp(&a.level).then_with(|| a.supervisor.cmp(&b.supervisor)));
    letters
}

pub fn executive_summary(data: &[JoinedRecord], period: ReportingPeriod) -> Result<ExecutiveSummary> {
    let rows: Vec<JoinedRecord> = data.iter().filter(|r| period.contains(r)).cloned().collect();
    if rows.is_empty() {
        return Err(ReportError::EmptyPeriod(period.to_string()));
    }
    let closed = rows.iter().filter(|r| r.feedback.is_closed()).count();
    let days = closure_days(&rows);
    let distinct = |key: GroupKey| {
        rows.iter()
            .map(|r| key.value(r))
            .filter(|v| !v.is_empty() && *v != UNASSIGNED)
            .collect::<BTreeSet<_>>()
            .len()
    };

    Ok(ExecutiveSummary {
        period: period.to_string(),
        total_feedback: rows.len(),
        closed_feedback: closed,
        open_feedback: rows.len() - closed,
        closure_rate: closure_rate(&rows),
        avg_closure_days: average_closure_days(&rows),
        median_closure_days: if days.is_empty() { None } else { Some(median(days)) },
        distinct_clients: distinct(GroupKey::Client),
        distinct_routes: distinct(GroupKey::Route),
        distinct_supervisors: distinct(GroupKey::Supervisor),
        unassigned_feedback: rows.iter().filter(|r| !r.route_matched).count(),
        supervisor_check_rate: ratio(rows.iter().filter(|r| r.feedback.supervisor_checked).count(), rows.len()),
        total_points: rows.iter().filter_map(|r| r.feedback.points).sum(),
        top_reasons: key_counts(count_by(&rows, GroupKey::Reason), 5),
        top_supervisors: key_counts(count_by(&rows, GroupKey::Supervisor), 5),
        top_contractors: key_counts(count_by(&rows, GroupKey::Contractor), 5),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{joined, sample};

    #[test]
    fn action_plans_match_by_keyword() {
        assert!(action_plan("PRODUCTO VENCIDO").contains("stock rotation"));
        assert!(action_plan("Falta de visita").contains("visit calendar"));
        assert!(action_plan("Mala atención del vendedor").contains("service-standards"));
        assert_eq!(action_plan("Otro"), DEFAULT_PLAN);
    }

    #[test]
    fn week_two_offenders() {
        let report = weekly_offenders(&sample(), 2025, 2, 10).unwrap();
        assert_eq!(report.total_feedback, 5);
        assert_eq!(report.top_reason, "Producto vencido");
        assert_eq!(report.top_reason_count, 3);
        assert_eq!(report.offenders.len(), 2);
        let first = &report.offenders[0];
        assert_eq!((first.rank, first.client_code.as_str(), first.reports), (1, "C1", 2));
        assert_eq!(first.client_name, "Tienda Sol");
        assert_eq!(first.supervisor, "Ana");
        assert!(report.action_plan.contains("stock rotation"));
    }

    #[test]
    fn offender_ties_prefer_the_lower_client_code() {
        // week 3: two "Falta de visita", one "Precio"
        let report = weekly_offenders(&sample(), 2025, 3, 1).unwrap();
        assert_eq!(report.top_reason, "Falta de visita");
        assert_eq!(report.offenders.len(), 1);
        assert_eq!(report.offenders[0].client_code, "C1");
    }

    #[test]
    fn empty_week_is_an_error() {
        assert!(matches!(
            weekly_offenders(&sample(), 2025, 30, 10),
            Err(ReportError::EmptyPeriod(_))
        ));
        assert_eq!(available_weeks(&sample()), vec![(2025, 2), (2025, 3)]);
        assert_eq!(latest_week(&sample()), Some((2025, 3)));
    }

    #[test]
    fn letters_escalate_by_weeks_over_threshold() {
        let letters = disciplinary_letters(&sample(), 2025, 1, 2);
        assert_eq!(letters.len(), 2);
        assert_eq!(letters[0].supervisor, "Ana");
        assert_eq!(letters[0].level, Escalation::WrittenWarning);
        assert_eq!(letters[0].weeks_over, vec!["2025-W02", "2025-W03"]);
        assert_eq!((letters[0].total, letters[0].open), (5, 2));
        assert_eq!(letters[0].routes, vec!["R1"]);
        assert_eq!(letters[0].top_reasons[0].key, "Producto vencido");
        assert_eq!(letters[1].supervisor, "Luis");
        assert_eq!(letters[1].level, Escalation::VerbalWarning);

        assert!(disciplinary_letters(&sample(), 2025, 1, 10).is_empty());
    }

    #[test]
    fn unassigned_rows_never_get_letters() {
        let mut rows = sample();
        let mut orphan = joined("R9", "2025-01-06", None, ("C9", "X"), "Precio", "Nadie");
        orphan.supervisor = UNASSIGNED.to_string();
        orphan.route_matched = false;
        rows.push(orphan.clone());
        rows.push(orphan);
        let letters = disciplinary_letters(&rows, 2025, 1, 2);
        assert!(letters.iter().all(|l| l.supervisor != UNASSIGNED));
    }

    #[test]
    fn executive_summary_for_january() {
        let s = executive_summary(&sample(), ReportingPeriod::Month { year: 2025, month: 1 }).unwrap();
        assert_eq!(s.total_feedback, 8);
        assert_eq!((s.closed_feedback, s.open_feedback), (4, 4));
        assert_eq!(s.closure_rate, 0.5);
        assert_eq!(s.avg_closure_days, Some(1.75));
        assert_eq!(s.median_closure_days, Some(1.5));
        assert_eq!((s.distinct_clients, s.distinct_routes, s.distinct_supervisors), (4, 3, 3));
        assert_eq!(s.unassigned_feedback, 0);
        assert_eq!(s.top_supervisors[0].key, "Ana");
        assert_eq!(s.top_reasons.len(), 3);
        assert!(executive_summary(&sample(), ReportingPeriod::Month { year: 2024, month: 1 }).is_err());
    }

    #[test]
    fn executive_summary_counts_route_variants_once() {
        let mut data = sample();
        data.push(joined("r1", "2025-01-16 08:00", None, ("C1", "Tienda Sol"), "Precio", "Ana"));
        data.push(joined("R3 ", "2025-01-16 09:00", None, ("C4", "Cremeria Paz"), "Precio", "Marta"));
        let s = executive_summary(&data, ReportingPeriod::All).unwrap();
        assert_eq!(s.distinct_routes, 3);
        assert_eq!(s.total_feedback, 10);
    }
}
