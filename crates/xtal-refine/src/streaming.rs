//! NDJSON streaming events for xtal-refine.
//!
//! Emits progress events to stderr for agent consumption.
//!
//! Event types:
//!   - refine_started: Model summary and selected parameter classes
//!   - layout_computed: Flat vector length expected vs supplied
//!   - shifts_applied: Shift application result
//!   - refine_complete: Final result envelope
//!   - error: Failure with a stable code

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RefineStartedEvent {
    pub total_sites: usize,
    pub anisotropic_sites: usize,
    pub selection: String,
    pub config_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LayoutComputedEvent {
    pub n_parameters: usize,
    pub supplied: usize,
}

#[derive(Debug, Clone)]
pub struct ShiftsAppliedEvent {
    pub total_sites: usize,
    pub n_parameters: usize,
    pub max_abs_shift: f64,
    /// Largest Cartesian site movement, in the cell's length unit.
    pub max_site_shift: f64,
    pub mean_displacements: bool,
    pub parallel: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RefineCompleteEvent {
    pub total_sites: usize,
    pub output_path: Option<String>,
    pub elapsed_ms: u64,
}

/// Streaming emitter for NDJSON events.
///
/// Emits to stderr so stdout stays free for command output.
#[derive(Debug, Clone, Copy)]
pub struct StreamEmitter {
    enabled: bool,
}

impl StreamEmitter {
    /// Create a new emitter.
    /// Pass `true` to enable NDJSON streaming to stderr.
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Create a disabled emitter (no output).
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    /// Create an enabled emitter.
    pub fn enabled() -> Self {
        Self { enabled: true }
    }

    /// Check if streaming is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn emit_json(&self, json: &str) {
        if self.enabled {
            eprintln!("{}", json);
        }
    }

    pub fn emit_refine_started(&self, event: &RefineStartedEvent) {
        let selection = serde_json::to_string(&event.selection).unwrap_or("\"\"".to_string());
        let path = serde_json::to_string(&event.config_path).unwrap_or("null".to_string());
        let json = format!(
            r#"{{"event":"refine_started","total_sites":{},"anisotropic_sites":{},"selection":{},"config_path":{}}}"#,
            event.total_sites, event.anisotropic_sites, selection, path
        );
        self.emit_json(&json);
    }

    pub fn emit_layout_computed(&self, event: &LayoutComputedEvent) {
        let json = format!(
            r#"{{"event":"layout_computed","n_parameters":{},"supplied":{},"matches":{}}}"#,
            event.n_parameters,
            event.supplied,
            event.n_parameters == event.supplied
        );
        self.emit_json(&json);
    }

    pub fn emit_shifts_applied(&self, event: &ShiftsAppliedEvent) {
        let json = format!(
            r#"{{"event":"shifts_applied","total_sites":{},"n_parameters":{},"max_abs_shift":{:.6e},"max_site_shift":{:.6e},"mean_displacements":{},"parallel":{},"elapsed_ms":{}}}"#,
            event.total_sites,
            event.n_parameters,
            event.max_abs_shift,
            event.max_site_shift,
            event.mean_displacements,
            event.parallel,
            event.elapsed_ms
        );
        self.emit_json(&json);
    }

    pub fn emit_refine_complete(&self, event: &RefineCompleteEvent) {
        let output = serde_json::to_string(&event.output_path).unwrap_or("null".to_string());
        let json = format!(
            r#"{{"event":"refine_complete","total_sites":{},"output_path":{},"elapsed_ms":{}}}"#,
            event.total_sites, output, event.elapsed_ms
        );
        self.emit_json(&json);
    }

    /// Emit an error event.
    pub fn emit_error(&self, code: &str, message: &str, context: Option<&str>) {
        let code = serde_json::to_string(code).unwrap_or("\"unknown\"".to_string());
        let message = serde_json::to_string(message).unwrap_or("\"Unknown error\"".to_string());
        let ctx = context
            .map(|s| serde_json::to_string(s).unwrap_or_default())
            .unwrap_or("null".to_string());
        let json = format!(
            r#"{{"event":"error","code":{},"message":{},"context":{}}}"#,
            code, message, ctx
        );
        self.emit_json(&json);
    }
}

pub(crate) fn duration_ms(d: Duration) -> u64 {
    d.as_millis().try_into().unwrap_or(u64::MAX)
}
