// Record builders shared by the unit tests.
use crate::loader::{calendar_fields, join, Dataset, LoadReport};
use crate::types::{FeedbackRecord, JoinedRecord, RouteAssignment};
use crate::util::{days_between, parse_datetime_safe};

pub fn feedback(route: &str, registered: &str, closed: Option<&str>) -> FeedbackRecord {
    let registered_at = parse_datetime_safe(Some(registered)).expect("valid registration date");
    let closed_at = closed.map(|c| parse_datetime_safe(Some(c)).expect("valid closure date"));
    FeedbackRecord {
        topic_id: format!("T-{route}-{registered}"),
        route: route.to_string(),
        route_key: crate::loader::route_key(route),
        user: "jlopez".to_string(),
        vendor: "V01".to_string(),
        client_code: "C000".to_string(),
        client_name: "Cliente".to_string(),
        reason: "Precio".to_string(),
        sub_response: String::new(),
        observation: String::new(),
        registered_at,
        closed_at,
        supervisor_checked: false,
        points: None,
        calendar: calendar_fields(registered_at),
        closure_days: closed_at.map(|c| days_between(registered_at, c)),
    }
}

pub fn route(code: &str, supervisor: &str, contractor: &str) -> RouteAssignment {
    RouteAssignment {
        route: code.to_string(),
        supervisor: supervisor.to_string(),
        contractor: contractor.to_string(),
        source: "test".to_string(),
    }
}

/// Joined record with the fields most tests vary.
pub fn joined(
    route_code: &str,
    registered: &str,
    closed: Option<&str>,
    client: (&str, &str),
    reason: &str,
    supervisor: &str,
) -> JoinedRecord {
    let mut f = feedback(route_code, registered, closed);
    f.client_code = client.0.to_string();
    f.client_name = client.1.to_string();
    f.reason = reason.to_string();
    let routes = [route(route_code, supervisor, &format!("Contratista {supervisor}"))];
    join(vec![f], &routes).remove(0)
}

/// Small two-week sample used by the aggregation, dashboard and report tests.
///
/// ISO week 2 of 2025 (Jan 6-12) and week 3 (Jan 13-19).
pub fn sample() -> Vec<JoinedRecord> {
    vec![
        joined("R1", "2025-01-06 08:00", Some("2025-01-07 08:00"), ("C1", "Tienda Sol"), "Producto vencido", "Ana"),
        joined("R1", "2025-01-07 09:00", None, ("C1", "Tienda Sol"), "Producto vencido", "Ana"),
        joined("R1", "2025-01-08 10:00", Some("2025-01-12 10:00"), ("C2", "Abarrotes Lupita"), "Producto vencido", "Ana"),
        joined("R2", "2025-01-08 11:00", Some("2025-01-08 15:00"), ("C3", "Minisuper Rio"), "Precio", "Luis"),
        joined("R2", "2025-01-09 12:00", None, ("C3", "Minisuper Rio"), "Falta de visita", "Luis"),
        joined("R1", "2025-01-13 08:00", None, ("C1", "Tienda Sol"), "Falta de visita", "Ana"),
        joined("R1", "2025-01-14 08:00", Some("2025-01-16 08:00"), ("C2", "Abarrotes Lupita"), "Falta de visita", "Ana"),
        joined("R3", "2025-01-15 08:00", None, ("C4", "Cremeria Paz"), "Precio", "Marta"),
    ]
}

pub fn dataset(records: Vec<JoinedRecord>, routes_available: bool) -> Dataset {
    let report = LoadReport {
        total_rows: records.len(),
        loaded_rows: records.len(),
        ..LoadReport::default()
    };
    Dataset {
        records,
        report,
        routes_available,
    }
}
