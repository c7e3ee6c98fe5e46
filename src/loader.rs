use crate::config::Sources;
use crate::error::Result;
use crate::names::clean_name;
use crate::sheet::{cell, read_table};
use crate::types::{CalendarFields, FeedbackRecord, JoinedRecord, RouteAssignment, UNASSIGNED};
use crate::util::{days_between, parse_datetime_safe, parse_f64_safe, parse_flag};
use chrono::{Datelike, NaiveDateTime, Timelike};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub parse_errors: usize,
    pub closed_rows: usize,
    pub route_rows: usize,
    pub duplicate_routes: usize,
    pub unmatched_rows: usize,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub records: Vec<JoinedRecord>,
    pub report: LoadReport,
    pub routes_available: bool,
}

pub fn calendar_fields(ts: NaiveDateTime) -> CalendarFields {
    let date = ts.date();
    let iso = date.iso_week();
    CalendarFields {
        year: date.year(),
        month: date.month(),
        quarter: (date.month() - 1) / 3 + 1,
        iso_year: iso.year(),
        iso_week: iso.week(),
        weekday: date.weekday(),
        hour: ts.hour(),
    }
}

/// Route codes join after trimming and upper-casing; exports keep the
/// value as typed in the feedback file.
pub fn route_key(route: &str) -> String {
    route.trim().to_uppercase()
}

pub fn load_feedback(path: &Path) -> Result<(Vec<FeedbackRecord>, LoadReport)> {
    let table = read_table(path)?;
    let registered_col = table.require("fecha_registro")?;
    let route_col = table.require("ruta")?;
    let client_code_col = table.require("codigo_cliente")?;
    let reason_col = table.require("motivo_retro")?;

    let topic_col = table.column("id_tema");
    let user_col = table.column("usuario");
    let vendor_col = table.column("vendedor");
    let client_name_col = table.column("nombre_cliente");
    let sub_col = table.column("respuesta_sub");
    let obs_col = table.column("observacion");
    let closed_col = table.column("fecha_cierre");
    let check_col = table.column("check_supervisor");
    let points_col = table.column("puntos");

    let mut report = LoadReport {
        total_rows: table.rows.len(),
        ..LoadReport::default()
    };
    let mut records = Vec::with_capacity(table.rows.len());

    for (idx, row) in table.rows.iter().enumerate() {
        let text = |col: Option<usize>| cell(row, col).unwrap_or_default().to_string();

        let Some(registered_at) = parse_datetime_safe(cell(row, Some(registered_col))) else {
            debug!(row = idx + 2, source = %table.source, "skipping row with unparseable fecha_registro");
            report.parse_errors += 1;
            continue;
        };
        let closed_at = parse_datetime_safe(cell(row, closed_col));
        let closure_days = closed_at.map(|c| days_between(registered_at, c));

        records.push(FeedbackRecord {
            topic_id: text(topic_col),
            route: text(Some(route_col)),
            route_key: route_key(&text(Some(route_col))),
            user: text(user_col),
            vendor: text(vendor_col),
            client_code: text(Some(client_code_col)),
            client_name: clean_name(&text(client_name_col)),
            reason: text(Some(reason_col)),
            sub_response: text(sub_col),
            observation: text(obs_col),
            registered_at,
            closed_at,
            supervisor_checked: parse_flag(cell(row, check_col)),
            points: parse_f64_safe(cell(row, points_col)),
            calendar: calendar_fields(registered_at),
            closure_days,
        });
    }

    report.loaded_rows = records.len();
    report.closed_rows = records.iter().filter(|r| r.is_closed()).count();
    info!(
        source = %table.source,
        rows = report.total_rows,
        loaded = report.loaded_rows,
        parse_errors = report.parse_errors,
        "feedback loaded"
    );
    Ok((records, report))
}

/// Read every route file in order and keep the first row per route code.
/// Returns the assignments and how many duplicate rows were dropped.
pub fn load_routes(paths: &[PathBuf]) -> Result<(Vec<RouteAssignment>, usize)> {
    let mut all = Vec::new();
    for path in paths {
        let table = read_table(path)?;
        let route_col = table.require("ruta")?;
        let supervisor_col = table.require("supervisor")?;
        let contractor_col = table.column("contratista");
        for row in &table.rows {
            let Some(route) = cell(row, Some(route_col)) else {
                continue;
            };
            all.push(RouteAssignment {
                route: route.to_string(),
                supervisor: clean_name(cell(row, Some(supervisor_col)).unwrap_or(UNASSIGNED)),
                contractor: clean_name(cell(row, contractor_col).unwrap_or(UNASSIGNED)),
                source: table.source.clone(),
            });
        }
    }
    let read = all.len();
    let routes = dedupe_routes(all);
    let dropped = read - routes.len();
    if dropped > 0 {
        warn!(dropped, "duplicate route codes in assignment files; keeping first occurrence");
    }
    Ok((routes, dropped))
}

pub fn dedupe_routes(rows: Vec<RouteAssignment>) -> Vec<RouteAssignment> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|r| seen.insert(route_key(&r.route)))
        .collect()
}

/// Left join of feedback onto route assignments. Every feedback row survives;
/// rows without an assignment carry the `UNASSIGNED` sentinel.
pub fn join(feedback: Vec<FeedbackRecord>, routes: &[RouteAssignment]) -> Vec<JoinedRecord> {
    let by_route: HashMap<String, &RouteAssignment> =
        routes.iter().map(|r| (route_key(&r.route), r)).collect();
    feedback
        .into_iter()
        .map(|f| match by_route.get(&f.route_key) {
            Some(a) => JoinedRecord {
                supervisor: a.supervisor.clone(),
                contractor: a.contractor.clone(),
                route_matched: true,
                feedback: f,
            },
            None => JoinedRecord {
                supervisor: UNASSIGNED.to_string(),
                contractor: UNASSIGNED.to_string(),
                route_matched: false,
                feedback: f,
            },
        })
        .collect()
}

fn assemble(
    feedback: Vec<FeedbackRecord>,
    mut report: LoadReport,
    routes: &[RouteAssignment],
    duplicates: usize,
    routes_available: bool,
) -> Dataset {
    let records = join(feedback, routes);
    report.route_rows = routes.len();
    report.duplicate_routes = duplicates;
    report.unmatched_rows = records.iter().filter(|r| !r.route_matched).count();
    if routes_available && report.unmatched_rows > 0 {
        warn!(unmatched = report.unmatched_rows, "feedback rows without route assignment");
    }
    Dataset {
        records,
        report,
        routes_available,
    }
}

pub fn load_dataset(sources: &Sources) -> Result<Dataset> {
    let (feedback, report) = load_feedback(&sources.feedback)?;
    let (routes, duplicates) = load_routes(&sources.routes)?;
    Ok(assemble(feedback, report, &routes, duplicates, true))
}

/// Dashboard variant: a broken or missing route file leaves the dataset
/// usable with `routes_available = false`.
pub fn load_dataset_lenient(sources: &Sources) -> Result<Dataset> {
    let (feedback, report) = load_feedback(&sources.feedback)?;
    match load_routes(&sources.routes) {
        Ok((routes, duplicates)) => Ok(assemble(feedback, report, &routes, duplicates, !routes.is_empty())),
        Err(e) => {
            warn!(error = %e, "route assignments unavailable; supervisor panels disabled");
            Ok(assemble(feedback, report, &[], 0, false))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use crate::fixtures::{feedback, route};
    use rust_xlsxwriter::Workbook;
    use std::io::Write;

    #[test]
    fn closure_days_and_supervisor_for_the_reference_row() {
        let f = feedback("R1", "2025-01-01", Some("2025-01-04"));
        assert_eq!(f.closure_days, Some(3));
        let joined = join(vec![f], &[route("R1", "Ana", "Distribuidora Norte")]);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].supervisor, "Ana");
        assert_eq!(joined[0].feedback.closure_days, Some(3));
        assert!(joined[0].route_matched);
    }

    #[test]
    fn open_feedback_has_no_closure_days() {
        let f = feedback("R1", "2025-01-01", None);
        assert_eq!(f.closure_days, None);
        assert!(!f.is_closed());
    }

    #[test]
    fn duplicate_routes_keep_first_occurrence() {
        let rows = vec![
            route("R1", "Ana", "C1"),
            route("R2", "Luis", "C1"),
            route(" r1 ", "Pedro", "C2"),
            route("R2", "Marta", "C3"),
        ];
        let deduped = dedupe_routes(rows);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].supervisor, "Ana");
        assert_eq!(deduped[1].supervisor, "Luis");
    }

    #[test]
    fn unmatched_rows_keep_their_fields_and_get_the_sentinel() {
        let mut f = feedback("R9", "2025-02-10 14:00", None);
        f.client_name = "Tienda Lupita".into();
        let joined = join(vec![f.clone()], &[route("R1", "Ana", "C1")]);
        assert_eq!(joined[0].supervisor, UNASSIGNED);
        assert_eq!(joined[0].contractor, UNASSIGNED);
        assert!(!joined[0].route_matched);
        assert_eq!(joined[0].feedback.client_name, "Tienda Lupita");
        assert_eq!(joined[0].feedback.route, "R9");
        assert_eq!(joined[0].feedback.calendar.hour, 14);
    }

    #[test]
    fn calendar_fields_use_iso_weeks() {
        let c = feedback("R1", "2025-12-29", None).calendar;
        assert_eq!((c.year, c.month, c.quarter), (2025, 12, 4));
        assert_eq!((c.iso_year, c.iso_week), (2026, 1));
        assert_eq!(c.weekday, chrono::Weekday::Mon);
    }

    fn write_csv(path: &Path, lines: &[&str]) {
        let mut f = std::fs::File::create(path).unwrap();
        for l in lines {
            writeln!(f, "{l}").unwrap();
        }
    }

    #[test]
    fn loads_and_joins_csv_sources() {
        let dir = tempfile::tempdir().unwrap();
        let fb = dir.path().join("feedback.csv");
        write_csv(
            &fb,
            &[
                "id_tema,ruta,usuario,codigo_cliente,nombre_cliente,motivo_retro,fecha_registro,fecha_cierre,check_supervisor,puntos",
                "T1,R1,jlopez,C100,Juan Perez Juan Perez,Producto vencido,2025-01-01,2025-01-04,SI,2",
                "T2,R2,jlopez,C200,Tienda Sol,Falta de visita,2025-01-02 09:15,,NO,",
                "T3,R1,mruiz,C300,Abarrotes,Precio,sin fecha,,,",
            ],
        );
        let routes_a = dir.path().join("rutas_enero.csv");
        write_csv(&routes_a, &["RUTA,SUPERVISOR,CONTRATISTA", "R1,Ana Ana,Transportes Uno"]);
        let routes_b = dir.path().join("rutas_febrero.csv");
        write_csv(&routes_b, &["RUTA,SUPERVISOR,CONTRATISTA", "R1,Pedro,Otro", "R3,Luis,Transportes Dos"]);

        let sources = Sources {
            feedback: fb,
            routes: vec![routes_a, routes_b],
        };
        let ds = load_dataset(&sources).unwrap();
        assert_eq!(ds.report.total_rows, 3);
        assert_eq!(ds.report.loaded_rows, 2);
        assert_eq!(ds.report.parse_errors, 1);
        assert_eq!(ds.report.closed_rows, 1);
        assert_eq!(ds.report.duplicate_routes, 1);
        assert_eq!(ds.report.unmatched_rows, 1);

        let first = &ds.records[0];
        assert_eq!(first.supervisor, "Ana");
        assert_eq!(first.feedback.client_name, "Juan Perez");
        assert_eq!(first.feedback.closure_days, Some(3));
        assert!(first.feedback.supervisor_checked);
        assert_eq!(first.feedback.points, Some(2.0));
        assert_eq!(ds.records[1].supervisor, UNASSIGNED);
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let fb = dir.path().join("feedback.csv");
        write_csv(&fb, &["ruta,codigo_cliente,motivo_retro", "R1,C1,Precio"]);
        match load_feedback(&fb) {
            Err(ReportError::MissingColumn { column, .. }) => assert_eq!(column, "fecha_registro"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn lenient_load_survives_missing_routes() {
        let dir = tempfile::tempdir().unwrap();
        let fb = dir.path().join("feedback.csv");
        write_csv(
            &fb,
            &["ruta,codigo_cliente,motivo_retro,fecha_registro", "R1,C1,Precio,2025-03-03"],
        );
        let sources = Sources {
            feedback: fb,
            routes: vec![dir.path().join("BD_Rutas.xlsx")],
        };
        assert!(matches!(load_dataset(&sources), Err(ReportError::MissingFile(_))));
        let ds = load_dataset_lenient(&sources).unwrap();
        assert!(!ds.routes_available);
        assert_eq!(ds.records[0].supervisor, UNASSIGNED);
    }

    #[test]
    fn reads_xlsx_workbooks() {
        let dir = tempfile::tempdir().unwrap();
        let fb = dir.path().join("Feedbacks H1.xlsx");
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        let headers = ["RUTA", "codigo_cliente", "motivo_retro", "fecha_registro", "fecha_cierre", "puntos"];
        for (c, h) in headers.iter().enumerate() {
            ws.write_string(0, c as u16, *h).unwrap();
        }
        ws.write_number(1, 0, 101.0).unwrap();
        ws.write_string(1, 1, "C1").unwrap();
        ws.write_string(1, 2, "Envase roto").unwrap();
        ws.write_string(1, 3, "2025-01-01 08:00:00").unwrap();
        ws.write_number(1, 4, 45661.5).unwrap();
        ws.write_number(1, 5, 3.0).unwrap();
        wb.save(&fb).unwrap();

        let rutas = dir.path().join("BD_Rutas.xlsx");
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        ws.write_string(0, 0, "RUTA").unwrap();
        ws.write_string(0, 1, "SUPERVISOR").unwrap();
        ws.write_string(1, 0, "101").unwrap();
        ws.write_string(1, 1, "Ana").unwrap();
        wb.save(&rutas).unwrap();

        let ds = load_dataset(&Sources { feedback: fb, routes: vec![rutas] }).unwrap();
        assert_eq!(ds.records.len(), 1);
        let r = &ds.records[0];
        assert_eq!(r.feedback.route, "101");
        assert_eq!(r.supervisor, "Ana");
        assert_eq!(r.contractor, UNASSIGNED);
        assert_eq!(r.feedback.closure_days, Some(3));
        assert_eq!(r.feedback.points, Some(3.0));
    }
}
