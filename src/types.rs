use chrono::{NaiveDateTime, Weekday};
use serde::Serialize;
use tabled::Tabled;

/// Supervisor/contractor value for feedback whose route has no assignment.
pub const UNASSIGNED: &str = "Sin asignar";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFields {
    pub year: i32,
    pub month: u32,
    pub quarter: u32,
    pub iso_year: i32,
    pub iso_week: u32,
    pub weekday: Weekday,
    pub hour: u32,
}

#[derive(Debug, Clone)]
pub struct FeedbackRecord {
    pub topic_id: String,
    /// Route code as typed in the feedback file.
    pub route: String,
    /// Trimmed, upper-cased route code used for joins and grouping.
    pub route_key: String,
    pub user: String,
    pub vendor: String,
    pub client_code: String,
    pub client_name: String,
    pub reason: String,
    pub sub_response: String,
    pub observation: String,
    pub registered_at: NaiveDateTime,
    pub closed_at: Option<NaiveDateTime>,
    pub supervisor_checked: bool,
    pub points: Option<f64>,
    pub calendar: CalendarFields,
    pub closure_days: Option<i64>,
}

impl FeedbackRecord {
    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAssignment {
    pub route: String,
    pub supervisor: String,
    pub contractor: String,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct JoinedRecord {
    pub feedback: FeedbackRecord,
    pub supervisor: String,
    pub contractor: String,
    pub route_matched: bool,
}

/// Flat row used for CSV/JSON/XLSX exports of the joined table.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ExportRow {
    #[serde(rename = "id_tema")]
    #[tabled(rename = "id_tema")]
    pub topic_id: String,
    #[serde(rename = "ruta")]
    #[tabled(rename = "ruta")]
    pub route: String,
    #[serde(rename = "usuario")]
    #[tabled(rename = "usuario")]
    pub user: String,
    #[serde(rename = "vendedor")]
    #[tabled(rename = "vendedor")]
    pub vendor: String,
    #[serde(rename = "codigo_cliente")]
    #[tabled(rename = "codigo_cliente")]
    pub client_code: String,
    #[serde(rename = "nombre_cliente")]
    #[tabled(rename = "nombre_cliente")]
    pub client_name: String,
    #[serde(rename = "motivo_retro")]
    #[tabled(rename = "motivo_retro")]
    pub reason: String,
    #[serde(rename = "respuesta_sub")]
    #[tabled(rename = "respuesta_sub")]
    pub sub_response: String,
    #[serde(rename = "observacion")]
    #[tabled(rename = "observacion")]
    pub observation: String,
    #[serde(rename = "fecha_registro")]
    #[tabled(rename = "fecha_registro")]
    pub registered_at: String,
    #[serde(rename = "fecha_cierre")]
    #[tabled(rename = "fecha_cierre")]
    pub closed_at: String,
    #[serde(rename = "dias_cierre")]
    #[tabled(rename = "dias_cierre")]
    pub closure_days: String,
    #[serde(rename = "check_supervisor")]
    #[tabled(rename = "check_supervisor")]
    pub supervisor_checked: bool,
    #[serde(rename = "puntos")]
    #[tabled(rename = "puntos")]
    pub points: String,
    #[serde(rename = "mes")]
    #[tabled(rename = "mes")]
    pub month: u32,
    #[serde(rename = "semana")]
    #[tabled(rename = "semana")]
    pub week: u32,
    #[serde(rename = "trimestre")]
    #[tabled(rename = "trimestre")]
    pub quarter: u32,
    #[serde(rename = "dia_semana")]
    #[tabled(rename = "dia_semana")]
    pub weekday: String,
    #[serde(rename = "SUPERVISOR")]
    #[tabled(rename = "SUPERVISOR")]
    pub supervisor: String,
    #[serde(rename = "CONTRATISTA")]
    #[tabled(rename = "CONTRATISTA")]
    pub contractor: String,
}

impl From<&JoinedRecord> for ExportRow {
    fn from(r: &JoinedRecord) -> Self {
        let f = &r.feedback;
        ExportRow {
            topic_id: f.topic_id.clone(),
            route: f.route.clone(),
            user: f.user.clone(),
            vendor: f.vendor.clone(),
            client_code: f.client_code.clone(),
            client_name: f.client_name.clone(),
            reason: f.reason.clone(),
            sub_response: f.sub_response.clone(),
            observation: f.observation.clone(),
            registered_at: f.registered_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            closed_at: f
                .closed_at
                .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            closure_days: f.closure_days.map(|d| d.to_string()).unwrap_or_default(),
            supervisor_checked: f.supervisor_checked,
            points: f.points.map(|p| p.to_string()).unwrap_or_default(),
            month: f.calendar.month,
            week: f.calendar.iso_week,
            quarter: f.calendar.quarter,
            weekday: f.calendar.weekday.to_string(),
            supervisor: r.supervisor.clone(),
            contractor: r.contractor.clone(),
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GroupSummaryRow {
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub key: String,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: usize,
    #[serde(rename = "Closed")]
    #[tabled(rename = "Closed")]
    pub closed: usize,
    #[serde(rename = "Open")]
    #[tabled(rename = "Open")]
    pub open: usize,
    #[serde(rename = "ClosureRate")]
    #[tabled(rename = "ClosureRate")]
    pub closure_rate: String,
    #[serde(rename = "AvgClosureDays")]
    #[tabled(rename = "AvgClosureDays")]
    pub avg_closure_days: String,
    #[serde(rename = "Points")]
    #[tabled(rename = "Points")]
    pub points: String,
    #[serde(rename = "TopReason")]
    #[tabled(rename = "TopReason")]
    pub top_reason: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CountRow {
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
    #[serde(rename = "Share")]
    #[tabled(rename = "Share")]
    pub share: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct TrendRow {
    #[serde(rename = "Period")]
    #[tabled(rename = "Period")]
    pub period: String,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: usize,
    #[serde(rename = "Closed")]
    #[tabled(rename = "Closed")]
    pub closed: usize,
    #[serde(rename = "ClosureRate")]
    #[tabled(rename = "ClosureRate")]
    pub closure_rate: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct OffenderRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "ClientCode")]
    #[tabled(rename = "ClientCode")]
    pub client_code: String,
    #[serde(rename = "ClientName")]
    #[tabled(rename = "ClientName")]
    pub client_name: String,
    #[serde(rename = "Reports")]
    #[tabled(rename = "Reports")]
    pub reports: usize,
    #[serde(rename = "Route")]
    #[tabled(rename = "Route")]
    pub route: String,
    #[serde(rename = "Supervisor")]
    #[tabled(rename = "Supervisor")]
    pub supervisor: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct PendingRow {
    #[serde(rename = "Topic")]
    #[tabled(rename = "Topic")]
    pub topic_id: String,
    #[serde(rename = "Registered")]
    #[tabled(rename = "Registered")]
    pub registered: String,
    #[serde(rename = "AgeDays")]
    #[tabled(rename = "AgeDays")]
    pub age_days: i64,
    #[serde(rename = "Route")]
    #[tabled(rename = "Route")]
    pub route: String,
    #[serde(rename = "Client")]
    #[tabled(rename = "Client")]
    pub client: String,
    #[serde(rename = "Reason")]
    #[tabled(rename = "Reason")]
    pub reason: String,
    #[serde(rename = "Supervisor")]
    #[tabled(rename = "Supervisor")]
    pub supervisor: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct KeyCount {
    pub key: String,
    pub count: usize,
}

#[derive(Debug, Serialize, Clone)]
pub struct ExecutiveSummary {
    pub period: String,
    pub total_feedback: usize,
    pub closed_feedback: usize,
    pub open_feedback: usize,
    pub closure_rate: f64,
    pub avg_closure_days: Option<f64>,
    pub median_closure_days: Option<f64>,
    pub distinct_clients: usize,
    pub distinct_routes: usize,
    pub distinct_supervisors: usize,
    pub unassigned_feedback: usize,
    pub supervisor_check_rate: f64,
    pub total_points: f64,
    pub top_reasons: Vec<KeyCount>,
    pub top_supervisors: Vec<KeyCount>,
    pub top_contractors: Vec<KeyCount>,
}
