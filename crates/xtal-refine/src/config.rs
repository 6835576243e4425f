use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use xtal_core::UnitCell;

use crate::error::{RefineError, RefineResult};
use crate::scatterer::{Displacement, Site};
use crate::selection::SelectionMask;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefineConfig {
    pub cell: CellSpec,
    #[serde(default)]
    pub selection: SelectionMask,
    pub sites: Vec<Site>,
    /// Flat shift vector file, text or JSON.
    #[serde(default)]
    pub shifts: Option<String>,
    #[serde(default)]
    pub output: Option<OutputSpec>,
    #[serde(default)]
    pub parallel: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CellSpec {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    #[serde(default = "default_angle")]
    pub alpha: f64,
    #[serde(default = "default_angle")]
    pub beta: f64,
    #[serde(default = "default_angle")]
    pub gamma: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputSpec {
    pub path: String,
    #[serde(default)]
    pub mean_displacements: Option<String>,
}

fn default_angle() -> f64 {
    90.0
}

impl CellSpec {
    pub fn parameters(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.alpha, self.beta, self.gamma]
    }

    pub fn unit_cell(&self) -> RefineResult<UnitCell> {
        Ok(UnitCell::new(self.parameters())?)
    }
}

impl RefineConfig {
    pub fn load(path: &Path) -> RefineResult<RefineConfig> {
        let content = fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        if ext == "yaml" || ext == "yml" {
            serde_yaml::from_str(&content)
                .map_err(|e| RefineError::Parse(format!("yaml parse error: {e}")))
        } else {
            serde_json::from_str(&content)
                .map_err(|e| RefineError::Parse(format!("json parse error: {e}")))
        }
    }

    pub fn normalized(&self) -> RefineResult<RefineConfig> {
        let mut cfg = self.clone();
        cfg.validate()?;
        for site in &mut cfg.sites {
            site.label = site.label.trim().to_string();
        }
        if let Some(output) = &mut cfg.output {
            if output.path.trim().is_empty() {
                return Err(RefineError::Invalid("output path cannot be empty".into()));
            }
        }
        Ok(cfg)
    }

    pub fn validate(&self) -> RefineResult<()> {
        self.cell.unit_cell()?;
        if self.sites.is_empty() {
            return Err(RefineError::Invalid("sites list is empty".into()));
        }
        if self.selection.sqrt_u_iso && !self.selection.u_iso {
            return Err(RefineError::Invalid(
                "sqrt_u_iso requires u_iso to be selected".into(),
            ));
        }
        let mut seen = HashSet::with_capacity(self.sites.len());
        for (idx, site) in self.sites.iter().enumerate() {
            let label = site.label.trim();
            if label.is_empty() {
                return Err(RefineError::Invalid(format!("site {idx} has an empty label")));
            }
            if !seen.insert(label) {
                return Err(RefineError::Invalid(format!("duplicate site label '{label}'")));
            }
            if !site.is_finite() {
                return Err(RefineError::Invalid(format!(
                    "site '{label}' has non-finite parameters"
                )));
            }
            if self.selection.uses_sqrt_u_iso() {
                if let Displacement::Isotropic(u) = site.displacement {
                    if u < 0.0 {
                        return Err(site.report_negative_u_iso(idx));
                    }
                }
            }
        }
        Ok(())
    }
}
