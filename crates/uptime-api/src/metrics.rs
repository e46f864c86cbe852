use std::fmt::Write;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use uptime_core::Collection;

use crate::state::AppState;

const SCANNER_STATES: [&str; 4] = ["idle", "active", "stopping", "stopped"];

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut out = String::with_capacity(2048);

    let _ = writeln!(out, "# TYPE uptime_records gauge");
    let _ = writeln!(out, "# HELP uptime_records Number of stored records per collection");
    for collection in Collection::ALL {
        match state.services.store.list(collection).await {
            Ok(ids) => {
                let _ = writeln!(
                    out,
                    "uptime_records{{collection=\"{}\"}} {}",
                    collection,
                    ids.len()
                );
            }
            Err(e) => tracing::warn!(%collection, error = %e, "Could not count records for metrics"),
        }
    }

    let _ = writeln!(out, "# TYPE uptime_max_checks_per_user gauge");
    let _ = writeln!(out, "# HELP uptime_max_checks_per_user Configured check quota per user");
    let _ = writeln!(
        out,
        "uptime_max_checks_per_user {}",
        state.services.config().max_checks
    );

    if let Some(scanner) = &state.scanner {
        let id = scanner.id();

        let _ = writeln!(out, "# TYPE uptime_scanner_state stateset");
        let _ = writeln!(out, "# HELP uptime_scanner_state Current state of the check scanner");
        let current = scanner.state().await.to_string();
        for variant in SCANNER_STATES {
            let _ = writeln!(
                out,
                "uptime_scanner_state{{scanner_id=\"{}\",state=\"{}\"}} {}",
                id,
                variant,
                u8::from(current == variant)
            );
        }

        let _ = writeln!(out, "# TYPE uptime_scanner_scans counter");
        let _ = writeln!(out, "# HELP uptime_scanner_scans Completed scans since start");
        let _ = writeln!(
            out,
            "uptime_scanner_scans_total{{scanner_id=\"{}\"}} {}",
            id,
            scanner.completed_scans()
        );

        let _ = writeln!(out, "# TYPE uptime_scanner_skipped_ticks counter");
        let _ = writeln!(
            out,
            "# HELP uptime_scanner_skipped_ticks Ticks skipped because a scan was still running"
        );
        let _ = writeln!(
            out,
            "uptime_scanner_skipped_ticks_total{{scanner_id=\"{}\"}} {}",
            id,
            scanner.skipped_ticks()
        );

        let _ = writeln!(out, "# TYPE uptime_scanner_uptime_seconds gauge");
        let _ = writeln!(out, "# HELP uptime_scanner_uptime_seconds Time since the scanner was created");
        let uptime = (chrono::Utc::now() - scanner.created_at()).num_milliseconds() as f64 / 1000.0;
        let _ = writeln!(
            out,
            "uptime_scanner_uptime_seconds{{scanner_id=\"{}\"}} {:.3}",
            id, uptime
        );

        if let Some(report) = scanner.last_report().await {
            let _ = writeln!(out, "# TYPE uptime_last_scan_checks gauge");
            let _ = writeln!(
                out,
                "# HELP uptime_last_scan_checks Checks seen by the last scan, by outcome"
            );
            for (outcome, count) in [
                ("well_formed", report.well_formed),
                ("malformed", report.malformed),
                ("unreadable", report.unreadable),
            ] {
                let _ = writeln!(
                    out,
                    "uptime_last_scan_checks{{scanner_id=\"{}\",outcome=\"{}\"}} {}",
                    id, outcome, count
                );
            }

            let _ = writeln!(out, "# TYPE uptime_last_scan_duration_seconds gauge");
            let _ = writeln!(
                out,
                "# HELP uptime_last_scan_duration_seconds Wall time of the last scan"
            );
            let _ = writeln!(
                out,
                "uptime_last_scan_duration_seconds{{scanner_id=\"{}\"}} {:.3}",
                id,
                report.duration_ms() as f64 / 1000.0
            );

            let _ = writeln!(out, "# TYPE uptime_last_scan_timestamp_seconds gauge");
            let _ = writeln!(
                out,
                "# HELP uptime_last_scan_timestamp_seconds Unix timestamp of the last completed scan"
            );
            let t = report.finished_at;
            let secs = t.timestamp() as f64 + (t.timestamp_subsec_millis() as f64 / 1000.0);
            let _ = writeln!(
                out,
                "uptime_last_scan_timestamp_seconds{{scanner_id=\"{}\"}} {:.3}",
                id, secs
            );
        }
    }

    let _ = writeln!(out, "# EOF");

    (
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        out,
    )
}
