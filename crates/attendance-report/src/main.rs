mod bootstrap;

use anyhow::Result;
use chrono::NaiveDate;

use attendance_core::error::AttendanceError;
use attendance_core::models::{AttendanceStatus, UserId, UserProfile};
use attendance_core::settings::Settings;
use attendance_data::aggregator::AttendanceAggregator;
use attendance_data::analysis::{build_report, fetch_or_empty};
use attendance_data::source::{AttendanceSource, JsonlAttendanceSource};
use attendance_runtime::orchestrator::ReportOrchestrator;
use attendance_ui::app::App;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Attendance Report v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "View: {}, Theme: {}, Timezone: {}",
        settings.view,
        settings.theme,
        settings.timezone
    );

    let store = bootstrap::discover_data_path(settings.data_path.as_deref());
    tracing::info!("Attendance store: {}", store.display());
    let source = JsonlAttendanceSource::new(&store);

    let today = settings.today();
    let start_date = settings.effective_start_date();
    let view_date = settings.effective_view_date();

    if let Some(status) = settings.mark_status()? {
        let user = required_user(&settings, "--mark")?;
        mark_attendance(&source, user, view_date, status)?;
        println!("Recorded {user} as {} on {view_date}", status.label());
        return Ok(());
    }

    if let Err(e) = source.ensure_exists() {
        tracing::warn!("{e}; the report will be empty until attendance is recorded");
    }

    match settings.view.as_str() {
        "json" => {
            println!("{}", report_json(&source, start_date, view_date, today)?);
        }

        "history" => {
            let user = required_user(&settings, "--view history")?;
            println!("{}", history_json(&source, start_date, user)?);
        }

        _ => {
            tracing::info!("Starting attendance report...");

            let orchestrator = ReportOrchestrator::new(
                Box::new(source),
                u64::from(settings.refresh_rate),
                settings.timezone.clone(),
                start_date,
                view_date,
            );
            let (rx, cmd_tx, handle) = orchestrator.start();

            let app = App::new(
                &settings.theme,
                store.display().to_string(),
                settings.timezone.clone(),
                start_date,
                view_date,
                today,
            );

            // The loop exits on 'q' / Ctrl+C inside the TUI. Ctrl+C is also
            // handled at the OS level for signals received outside raw mode.
            tokio::select! {
                result = app.run_report(rx, cmd_tx) => {
                    handle.abort();
                    result?;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received; shutting down report task");
                    handle.abort();
                }
            }
        }
    }

    Ok(())
}

fn required_user<'a>(settings: &'a Settings, context: &str) -> Result<&'a str, AttendanceError> {
    settings
        .user
        .as_deref()
        .ok_or_else(|| AttendanceError::Config(format!("{context} requires --user")))
}

fn mark_attendance(
    source: &JsonlAttendanceSource,
    user: &str,
    date: NaiveDate,
    status: AttendanceStatus,
) -> Result<()> {
    source.record_attendance(&UserProfile::new(user), date, status)?;
    tracing::info!(user, %date, status = %status, "attendance recorded");
    Ok(())
}

fn report_json(
    source: &dyn AttendanceSource,
    start_date: NaiveDate,
    view_date: NaiveDate,
    today: NaiveDate,
) -> Result<String> {
    let report = build_report(source, start_date, view_date, today);
    Ok(serde_json::to_string_pretty(&report)?)
}

fn history_json(source: &dyn AttendanceSource, start_date: NaiveDate, user: &str) -> Result<String> {
    let log = fetch_or_empty(source, start_date);
    let history = AttendanceAggregator::history_for_user(&log, &UserId::from(user));
    Ok(serde_json::to_string_pretty(&history)?)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
