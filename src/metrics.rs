//! Prometheus text exposition for operational telemetry.
//!
//! The gauge names mirror the wire format of the vips-based predecessor so
//! existing dashboards keep working: `active_jobs` comes from the job
//! limiter, the `vips_*` gauges from the transcoding engine's statistics.

use std::fmt::Write;

use crate::optimize::EngineStats;

/// Render the metrics page.
pub fn render(active_jobs: usize, stats: EngineStats) -> String {
    let mut out = String::with_capacity(512);

    gauge(&mut out, "active_jobs", "Transcode jobs currently in flight", active_jobs as u64);
    gauge(&mut out, "vips_mem", "Bytes of pixel buffers currently in flight", stats.mem);
    gauge(&mut out, "vips_mem_high", "High-water mark of vips_mem", stats.mem_high);
    gauge(&mut out, "vips_files", "Source files currently open", stats.files);
    gauge(&mut out, "vips_allocs", "Pixel buffers allocated since startup", stats.allocs);

    out
}

fn gauge(out: &mut String, name: &str, help: &str, value: u64) {
    // Writing to a String cannot fail.
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
    let _ = writeln!(out, "{name} {value}");
}

// =============================================================================
// Tests
// =============================================================================
