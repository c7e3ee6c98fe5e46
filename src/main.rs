// Entry point and high-level CLI flow.
//
// Each subcommand loads the feedback export and the route files, joins
// them, and either prints the dashboard panels or writes report files into
// the output directory. `menu` keeps the interactive loop: load once, then
// generate reports as many times as needed.
mod aggregate;
mod cache;
mod config;
mod dashboard;
mod documents;
mod error;
#[cfg(test)]
mod fixtures;
mod filter;
mod loader;
mod names;
mod output;
mod reports;
mod sheet;
mod types;
mod util;

use aggregate::{summarize, trend, GroupKey, Period};
use anyhow::{bail, Context};
use cache::LoadMode;
use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use config::{Settings, DEFAULT_FEEDBACK_FILE, DEFAULT_OUTPUT_DIR, DEFAULT_ROUTES_FILE};
use filter::{FeedbackFilter, ReportingPeriod};
use loader::Dataset;
use output::WorkbookBuilder;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use types::{ExportRow, GroupSummaryRow};

#[derive(Parser)]
#[command(name = "feedback-report")]
#[command(about = "Customer feedback dashboard and weekly reports for the distribution center", long_about = None)]
struct Cli {
    /// Feedback export (xlsx, xls, ods or csv)
    #[arg(long, global = true, env = "FEEDBACK_FILE", default_value = DEFAULT_FEEDBACK_FILE)]
    feedback: PathBuf,

    /// Route assignment files, first match wins for duplicated routes
    #[arg(long = "routes", global = true, env = "ROUTE_FILES", value_delimiter = ',', default_value = DEFAULT_ROUTES_FILE)]
    routes: Vec<PathBuf>,

    #[arg(long, global = true, env = "REPORT_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Default)]
struct FilterArgs {
    /// First registration date (YYYY-MM-DD), inclusive
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last registration date (YYYY-MM-DD), inclusive
    #[arg(long)]
    to: Option<NaiveDate>,
    #[arg(long = "supervisor")]
    supervisors: Vec<String>,
    #[arg(long = "contractor")]
    contractors: Vec<String>,
    #[arg(long = "route", id = "route_filter")]
    routes: Vec<String>,
    #[arg(long = "reason")]
    reasons: Vec<String>,
    /// Only feedback without a closure date
    #[arg(long)]
    open_only: bool,
}

impl FilterArgs {
    fn to_filter(&self) -> FeedbackFilter {
        let period = if self.from.is_some() || self.to.is_some() {
            ReportingPeriod::Range {
                from: self.from,
                to: self.to,
            }
        } else {
            ReportingPeriod::All
        };
        FeedbackFilter {
            period,
            supervisors: self.supervisors.clone(),
            contractors: self.contractors.clone(),
            routes: self.routes.clone(),
            reasons: self.reasons.clone(),
            open_only: self.open_only,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Xlsx,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and join the input files, printing diagnostics
    Load,
    /// Print the dashboard panels for the filtered data
    Dashboard {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Summary table grouped by one key
    Summary {
        #[arg(long, value_enum, default_value = "supervisor")]
        by: GroupKey,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Weekly offender report(s)
    Offenders {
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=53), requires = "year")]
        week: Option<u32>,
        /// ISO year of --week
        #[arg(long, requires = "week", conflicts_with = "all")]
        year: Option<i32>,
        /// One report per week present in the data
        #[arg(long, conflicts_with = "week")]
        all: bool,
        #[arg(long, default_value_t = 10)]
        top: usize,
        /// Output directory (defaults to --output-dir)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Disciplinary escalation letters for one month
    Letters {
        #[arg(long)]
        year: i32,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,
        /// Weekly feedback count that triggers a warning
        #[arg(long, default_value_t = 5)]
        threshold: usize,
    },
    /// Executive summary workbook, JSON and text document
    Executive {
        #[arg(long, requires = "month")]
        year: Option<i32>,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12), requires = "year")]
        month: Option<u32>,
    },
    /// Export the joined table
    Export {
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Interactive menu
    Menu,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn load(settings: &Settings, mode: LoadMode) -> anyhow::Result<std::sync::Arc<Dataset>> {
    cache::cached_dataset(&settings.sources, mode).with_context(|| {
        format!(
            "failed to load {} with routes {:?}",
            settings.sources.feedback.display(),
            settings.sources.routes
        )
    })
}

fn handle_load(settings: &Settings) -> anyhow::Result<()> {
    let ds = load(settings, LoadMode::Strict)?;
    let r = &ds.report;
    println!(
        "Processing dataset... ({} rows read, {} loaded)",
        util::format_int(r.total_rows),
        util::format_int(r.loaded_rows)
    );
    println!(
        "Note: {} rows skipped due to an unreadable fecha_registro.",
        util::format_int(r.parse_errors)
    );
    println!(
        "Routes: {} assignments ({} duplicates dropped); {} feedback rows without assignment.",
        util::format_int(r.route_rows),
        util::format_int(r.duplicate_routes),
        util::format_int(r.unmatched_rows)
    );
    println!(
        "Closed: {} of {} ({}).\n",
        util::format_int(r.closed_rows),
        util::format_int(r.loaded_rows),
        util::format_pct(util::ratio(r.closed_rows, r.loaded_rows))
    );
    Ok(())
}

fn handle_dashboard(settings: &Settings, filter: &FeedbackFilter, top: usize) -> anyhow::Result<()> {
    let ds = load(settings, LoadMode::Lenient)?;
    if !filter.is_empty() {
        info!(?filter, "dashboard filters applied");
    }
    let panels = dashboard::build_panels(&ds, filter, top, now());
    let disabled = panels.iter().filter(|p| !p.is_enabled()).count();
    if disabled > 0 {
        warn!(disabled, routes_available = ds.routes_available, "some dashboard panels are disabled");
    }
    print!("{}", dashboard::render(&panels));
    Ok(())
}

fn handle_summary(settings: &Settings, key: GroupKey, filter: &FeedbackFilter) -> anyhow::Result<()> {
    let mode = if key.needs_routes() { LoadMode::Strict } else { LoadMode::Lenient };
    let ds = load(settings, mode)?;
    let data = filter.apply(&ds.records);
    let rows: Vec<GroupSummaryRow> = summarize(&data, key).iter().map(|s| s.to_row()).collect();
    println!("Feedback by {}\n", key.label());
    output::preview_table_rows(&rows, rows.len());
    Ok(())
}

fn handle_offenders(
    settings: &Settings,
    week: Option<u32>,
    year: Option<i32>,
    all: bool,
    top: usize,
    out_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let ds = load(settings, LoadMode::Strict)?;
    let weeks = if all {
        reports::available_weeks(&ds.records)
    } else {
        match (year, week) {
            (Some(y), Some(w)) => vec![(y, w)],
            _ => reports::latest_week(&ds.records).into_iter().collect(),
        }
    };
    if weeks.is_empty() {
        bail!("no feedback rows loaded; nothing to report");
    }
    let settings = match out_dir {
        Some(dir) => Settings {
            output_dir: dir,
            ..settings.clone()
        },
        None => settings.clone(),
    };

    let mut workbook = WorkbookBuilder::new();
    for (y, w) in weeks {
        let title = format!("Weekly Offender Report {y}-W{w:02}");
        let doc = match reports::weekly_offenders(&ds.records, y, w, top) {
            Ok(report) => {
                workbook.add_sheet(&format!("{y}-W{w:02}"), &report.offenders)?;
                println!("{title}: top reason \"{}\"\n", report.top_reason);
                output::preview_table_rows(&report.offenders, 5);
                documents::render_or_fallback(&title, || documents::render_offender_report(&report, now()))
            }
            Err(e) => {
                warn!(week = %format!("{y}-W{w:02}"), error = %e, "offender report not generated");
                documents::error_document(&title, &e)
            }
        };
        let path = settings.output_path(&format!("offenders_{y}_W{w:02}.md"))?;
        output::write_text(&path, &doc)?;
        info!(path = %path.display(), "offender report written");
    }
    let path = settings.output_path("offenders.xlsx")?;
    workbook.save(&path)?;
    println!("(Full tables exported to {})\n", path.display());
    Ok(())
}

fn handle_letters(settings: &Settings, year: i32, month: u32, threshold: usize) -> anyhow::Result<()> {
    let ds = load(settings, LoadMode::Strict)?;
    let letters = reports::disciplinary_letters(&ds.records, year, month, threshold);
    if letters.is_empty() {
        println!("No supervisor reached {threshold} feedback reports in a week during {year}-{month:02}.");
        return Ok(());
    }
    let issued = now();
    for l in &letters {
        let title = format!("{} - {}", l.level.title(), l.supervisor);
        let doc = documents::render_or_fallback(&title, || documents::render_letter(l, issued));
        let slug: String = l
            .supervisor
            .chars()
            .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        let path = settings.output_path(&format!("letter_{year}_{month:02}_{slug}.md"))?;
        output::write_text(&path, &doc)?;
        println!("{:<16} {} ({} reports)", l.level.title(), l.supervisor, l.total);
    }
    println!("\n{} letters written to {}", letters.len(), settings.output_dir.display());
    Ok(())
}

fn handle_executive(settings: &Settings, year: Option<i32>, month: Option<u32>) -> anyhow::Result<()> {
    let ds = load(settings, LoadMode::Strict)?;
    let period = match (year, month) {
        (Some(year), Some(month)) => ReportingPeriod::Month { year, month },
        _ => ReportingPeriod::All,
    };
    let summary = reports::executive_summary(&ds.records, period)?;
    let data = FeedbackFilter::for_period(period).apply(&ds.records);
    let weekly = trend(&data, Period::Week);
    let rows = |key| -> Vec<GroupSummaryRow> { summarize(&data, key).iter().map(|s| s.to_row()).collect() };

    let mut wb = WorkbookBuilder::new();
    wb.add_key_values(
        "Summary",
        &[
            ("Period", summary.period.clone()),
            ("Feedback", summary.total_feedback.to_string()),
            ("Closed", summary.closed_feedback.to_string()),
            ("Open", summary.open_feedback.to_string()),
            ("Closure rate", util::format_pct(summary.closure_rate)),
            ("Avg closure days", util::format_opt(summary.avg_closure_days, 1)),
            ("Median closure days", util::format_opt(summary.median_closure_days, 1)),
            ("Without route", summary.unassigned_feedback.to_string()),
            ("Supervisor check rate", util::format_pct(summary.supervisor_check_rate)),
        ],
    )?;
    wb.add_sheet("By Supervisor", &rows(GroupKey::Supervisor))?;
    wb.add_sheet("By Contractor", &rows(GroupKey::Contractor))?;
    wb.add_sheet("By Reason", &rows(GroupKey::Reason))?;
    wb.add_sheet("By Route", &rows(GroupKey::Route))?;
    wb.add_sheet("Weekly Trend", &weekly)?;
    let xlsx = settings.output_path("executive_summary.xlsx")?;
    wb.save(&xlsx)?;

    let json = settings.output_path("executive_summary.json")?;
    output::write_json(&json, &summary)?;

    let doc = documents::render_or_fallback("Executive Summary", || {
        documents::render_executive_summary(&summary, &weekly)
    });
    let md = settings.output_path("executive_summary.md")?;
    output::write_text(&md, &doc)?;

    println!(
        "Summary Stats ({}): {{\"total_feedback\": {}, \"closure_rate\": {}}}",
        summary.period,
        summary.total_feedback,
        util::format_number(summary.closure_rate, 4)
    );
    println!("Outputs saved to {}\n", settings.output_dir.display());
    Ok(())
}

fn handle_export(settings: &Settings, format: ExportFormat, filter: &FeedbackFilter) -> anyhow::Result<()> {
    let ds = load(settings, LoadMode::Lenient)?;
    let rows: Vec<ExportRow> = filter.apply(&ds.records).iter().map(ExportRow::from).collect();
    let path = match format {
        ExportFormat::Csv => {
            let p = settings.output_path("feedback_joined.csv")?;
            output::write_csv(&p, &rows)?;
            p
        }
        ExportFormat::Json => {
            let p = settings.output_path("feedback_joined.json")?;
            output::write_json(&p, &rows)?;
            p
        }
        ExportFormat::Xlsx => {
            let p = settings.output_path("feedback_joined.xlsx")?;
            WorkbookBuilder::new().add_sheet("Feedback", &rows)?.save(&p)?;
            p
        }
    };
    println!("{} rows exported to {}", util::format_int(rows.len()), path.display());
    Ok(())
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> String {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to Report Selection (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        if io::stdin().read_line(&mut buf).unwrap_or(0) == 0 {
            return false;
        }
        match buf.trim().to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn report_outcome(result: anyhow::Result<()>) {
    if let Err(e) = result {
        eprintln!("Error: {e:#}\n");
    }
}

fn run_menu(settings: &Settings) -> anyhow::Result<()> {
    loop {
        println!("Select an option:");
        println!("[1] Load the files");
        println!("[2] Dashboard");
        println!("[3] Offender report (latest week)");
        println!("[4] Executive summary");
        println!("[5] Reload files from disk");
        println!("[0] Exit\n");
        match read_choice().as_str() {
            "1" => report_outcome(handle_load(settings)),
            "2" => report_outcome(handle_dashboard(settings, &FeedbackFilter::default(), 10)),
            "3" => report_outcome(handle_offenders(settings, None, None, false, 10, None)),
            "4" => report_outcome(handle_executive(settings, None, None)),
            "5" => {
                cache::invalidate();
                report_outcome(handle_load(settings));
            }
            "0" | "" => {
                println!("Exiting the program.");
                return Ok(());
            }
            _ => {
                println!("Invalid choice. Please enter 0-5.\n");
                continue;
            }
        }
        if !prompt_back_to_menu() {
            println!("Exiting the program.");
            return Ok(());
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);
    let settings = Settings::new(cli.feedback, cli.routes, cli.output_dir);

    match cli.command {
        Commands::Load => handle_load(&settings),
        Commands::Dashboard { filter, top } => handle_dashboard(&settings, &filter.to_filter(), top),
        Commands::Summary { by, filter } => handle_summary(&settings, by, &filter.to_filter()),
        Commands::Offenders {
            week,
            year,
            all,
            top,
            output,
        } => handle_offenders(&settings, week, year, all, top, output),
        Commands::Letters { year, month, threshold } => handle_letters(&settings, year, month, threshold),
        Commands::Executive { year, month } => handle_executive(&settings, year, month),
        Commands::Export { format, filter } => handle_export(&settings, format, &filter.to_filter()),
        Commands::Menu => run_menu(&settings),
    }
}
