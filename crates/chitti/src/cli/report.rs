//! Human-readable reports for cycle, audit and run results.

use std::fmt::Write;

use crate::audit::AuditRecord;
use crate::pipeline::RunSummary;
use crate::record::CycleRecord;

const RULE: &str = "============================================================";

/// Format the audit block shared by the cycle and audit reports.
#[must_use]
pub fn format_audit(audit: &AuditRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Retention audit");
    let _ = writeln!(out, "  Baseline:       {:.3} GB", audit.baseline_gb());
    let _ = writeln!(out, "  Final:          {:.3} GB", audit.final_gb());
    let _ = writeln!(
        out,
        "  Delta:          {:.3} GB ({} bytes)",
        audit.delta_gb(),
        audit.delta_bytes
    );
    let _ = writeln!(
        out,
        "  Purge:          {}",
        if audit.purge_succeeded { "ok" } else { "FAILED" }
    );
    let _ = writeln!(
        out,
        "  Zero retention: {}",
        if audit.retention_verified {
            "VERIFIED"
        } else {
            "VIOLATION"
        }
    );
    out
}

/// Format one cycle record.
#[must_use]
pub fn format_cycle(record: &CycleRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Perception cycle complete");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Timestamp:     {}", record.timestamp.to_rfc3339());
    let _ = writeln!(
        out,
        "Total latency: {:.3}s",
        record.total_latency.as_secs_f64()
    );
    let _ = writeln!(
        out,
        "Capture:       {}",
        if record.capture_success { "ok" } else { "failed" }
    );

    match &record.description {
        Some(description) => {
            let _ = writeln!(out);
            let _ = writeln!(out, "Chitti sees:   {}", description.text);
            let _ = writeln!(
                out,
                "Inference:     {:.3}s ({})",
                description.latency.as_secs_f64(),
                description.model
            );
            let _ = writeln!(
                out,
                "Speech:        {}",
                if record.speech_success { "ok" } else { "failed" }
            );
        }
        None => {
            let _ = writeln!(out, "Description:   none");
        }
    }

    if !record.errors.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Errors:");
        for err in &record.errors {
            let _ = writeln!(out, "  - {err}");
        }
    }

    let _ = writeln!(out);
    out.push_str(&format_audit(&record.audit));
    let _ = writeln!(out, "{RULE}");
    out
}

/// Format the totals of a continuous run.
#[must_use]
pub fn format_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Run summary");
    let _ = writeln!(out, "-----------");
    let _ = writeln!(out, "Cycles run:           {}", summary.cycles_run);
    let _ = writeln!(out, "Cycles recorded:      {}", summary.cycles_recorded());
    let _ = writeln!(out, "Cycles failed:        {}", summary.cycles_failed);
    let _ = writeln!(
        out,
        "Retention violations: {}",
        summary.retention_violations
    );
    let _ = writeln!(
        out,
        "Stopped by:           {}",
        if summary.interrupted {
            "signal"
        } else {
            "cycle limit"
        }
    );
    out
}
