use std::fs;
use std::path::Path;
use std::time::Instant;

use xtal_core::UnitCell;

use crate::config::{OutputSpec, RefineConfig};
use crate::error::{RefineError, RefineResult};
use crate::minimization::{apply_shifts, apply_shifts_parallel, AppliedShifts};
use crate::packing::ParameterLayout;
use crate::scatterer::Site;
use crate::streaming::{
    duration_ms, LayoutComputedEvent, RefineCompleteEvent, RefineStartedEvent,
    ShiftsAppliedEvent, StreamEmitter,
};
use crate::vector_io::write_vector;

/// Applies `shifts` to the model described by `cfg`.
///
/// The config is validated first; events go to `emitter`. `config_path` is
/// the file `cfg` was loaded from, if any, and is only reported.
pub fn run_apply(
    cfg: &RefineConfig,
    config_path: Option<&Path>,
    shifts: &[f64],
    emitter: StreamEmitter,
) -> RefineResult<AppliedShifts> {
    let start = Instant::now();
    let cfg = cfg.normalized()?;
    let cell = cfg.cell.unit_cell()?;
    let mask = cfg.selection;
    emitter.emit_refine_started(&started_event(&cfg, config_path));

    let layout = ParameterLayout::new(&cfg.sites, mask);
    trace_layout(&cfg, &layout);
    emitter.emit_layout_computed(&LayoutComputedEvent {
        n_parameters: layout.total(),
        supplied: shifts.len(),
    });

    let applied = if cfg.parallel {
        apply_shifts_parallel(&cell, &cfg.sites, mask, shifts)?
    } else {
        apply_shifts(&cell, &cfg.sites, mask, shifts)?
    };
    let max_abs_shift = shifts.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    emitter.emit_shifts_applied(&ShiftsAppliedEvent {
        total_sites: applied.sites.len(),
        n_parameters: layout.total(),
        max_abs_shift,
        max_site_shift: max_site_shift(&cell, &cfg.sites, &applied.sites),
        mean_displacements: applied.mean_displacements.is_some(),
        parallel: cfg.parallel,
        elapsed_ms: duration_ms(start.elapsed()),
    });
    Ok(applied)
}

/// Writes the shifted model as a config with the same cell and selection,
/// and the mean displacements if requested and available.
pub fn write_output(
    cfg: &RefineConfig,
    applied: &AppliedShifts,
    spec: &OutputSpec,
) -> RefineResult<()> {
    let mut shifted = cfg.clone();
    shifted.sites = applied.sites.clone();
    shifted.shifts = None;
    shifted.output = None;
    let json = serde_json::to_string_pretty(&shifted)
        .map_err(|e| RefineError::Parse(format!("json encode error: {e}")))?;
    fs::write(&spec.path, json)?;
    if let (Some(path), Some(means)) = (&spec.mean_displacements, &applied.mean_displacements) {
        write_vector(Path::new(path), means)?;
    }
    Ok(())
}

/// Applies shifts, writes `output` if given, and emits the completion event.
pub fn run_and_write(
    cfg: &RefineConfig,
    config_path: Option<&Path>,
    shifts: &[f64],
    output: Option<&OutputSpec>,
    emitter: StreamEmitter,
) -> RefineResult<AppliedShifts> {
    let start = Instant::now();
    let result = run_apply(cfg, config_path, shifts, emitter).and_then(|applied| {
        if let Some(spec) = output {
            write_output(cfg, &applied, spec)?;
        }
        Ok(applied)
    });
    let applied = match result {
        Ok(applied) => applied,
        Err(err) => {
            emitter.emit_error(err.code(), &err.to_string(), None);
            return Err(err);
        }
    };
    emitter.emit_refine_complete(&RefineCompleteEvent {
        total_sites: applied.sites.len(),
        output_path: output.map(|s| s.path.clone()),
        elapsed_ms: duration_ms(start.elapsed()),
    });
    Ok(applied)
}

/// Combines the config's `output` entry with command-line overrides.
///
/// An explicit `output` path replaces the configured one and keeps its
/// mean-displacement path unless `means` is given. `means` alone attaches to
/// the configured output; with no output at all it is an error.
pub fn resolve_output(
    configured: Option<&OutputSpec>,
    output: Option<&Path>,
    means: Option<&Path>,
) -> RefineResult<Option<OutputSpec>> {
    let means = means.map(|m| m.to_string_lossy().to_string());
    let spec = match (output, configured) {
        (Some(path), configured) => OutputSpec {
            path: path.to_string_lossy().to_string(),
            mean_displacements: means
                .or_else(|| configured.and_then(|c| c.mean_displacements.clone())),
        },
        (None, Some(configured)) => OutputSpec {
            path: configured.path.clone(),
            mean_displacements: means.or_else(|| configured.mean_displacements.clone()),
        },
        (None, None) => {
            if means.is_some() {
                return Err(RefineError::Invalid(
                    "mean displacement output needs a model output (use --output or the config's 'output')"
                        .into(),
                ));
            }
            return Ok(None);
        }
    };
    Ok(Some(spec))
}

fn started_event(cfg: &RefineConfig, config_path: Option<&Path>) -> RefineStartedEvent {
    RefineStartedEvent {
        total_sites: cfg.sites.len(),
        anisotropic_sites: cfg.sites.iter().filter(|s| s.is_anisotropic()).count(),
        selection: cfg.selection.to_string(),
        config_path: config_path.map(|p| p.to_string_lossy().to_string()),
    }
}

/// Largest Cartesian distance any site moved.
fn max_site_shift(cell: &UnitCell, before: &[Site], after: &[Site]) -> f64 {
    before
        .iter()
        .zip(after)
        .map(|(b, a)| cell.orthogonalize(a.site.sub(b.site)).norm())
        .fold(0.0, f64::max)
}

fn trace_layout(cfg: &RefineConfig, layout: &ParameterLayout) {
    if std::env::var("XTAL_REFINE_TRACE_LAYOUT").is_err() {
        return;
    }
    for (idx, site) in cfg.sites.iter().enumerate() {
        let fields: Vec<String> = layout
            .site_fields(idx)
            .iter()
            .map(|(field, offset)| format!("{}@{}", field.as_str(), offset))
            .collect();
        eprintln!("layout site={} label={} {}", idx, site.label, fields.join(" "));
    }
    eprintln!("layout total={}", layout.total());
}

#[cfg(test)]
mod tests {
    use super::*;
    use xtal_core::Vec3;

    fn config() -> RefineConfig {
        serde_json::from_str(
            r#"{"cell": {"a": 5.0, "b": 5.0, "c": 5.0},
                "selection": {"site": true},
                "sites": [{"label": "S1", "site": [0.0, 0.0, 0.0], "displacement": {"isotropic": 0.01}}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn started_event_reports_config_path() {
        let cfg = config();
        let event = started_event(&cfg, Some(Path::new("runs/model.json")));
        assert_eq!(event.config_path.as_deref(), Some("runs/model.json"));
        assert_eq!(event.total_sites, 1);
        assert_eq!(event.selection, "site");
        assert!(started_event(&cfg, None).config_path.is_none());
    }

    #[test]
    fn max_site_shift_is_cartesian() {
        let cell = UnitCell::cubic(5.0).unwrap();
        let before = vec![
            Site::isotropic("A", Vec3::zero(), 0.01),
            Site::isotropic("B", Vec3::zero(), 0.01),
        ];
        let mut after = before.clone();
        after[0].site = Vec3::new(0.1, 0.0, 0.0);
        after[1].site = Vec3::new(0.0, 0.12, 0.16);
        assert!((max_site_shift(&cell, &before, &after) - 1.0).abs() < 1e-12);
    }
}
