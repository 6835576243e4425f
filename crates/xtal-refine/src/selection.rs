//! Which parameter classes are refined in the current round.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RefineError;

/// Parameter classes under refinement.
///
/// One mask applies uniformly to every site in a pass. `sqrt_u_iso` only
/// modifies how `u_iso` is refined and has no effect on its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectionMask {
    pub site: bool,
    pub u_iso: bool,
    pub sqrt_u_iso: bool,
    pub u_aniso: bool,
    pub occupancy: bool,
    pub fp: bool,
    pub fdp: bool,
}

const CLASS_NAMES: [&str; 7] = [
    "site",
    "u_iso",
    "sqrt_u_iso",
    "u_aniso",
    "occupancy",
    "fp",
    "fdp",
];

impl SelectionMask {
    pub fn none() -> Self {
        Self::default()
    }

    /// Every class except the square-root variant.
    pub fn all() -> Self {
        Self {
            site: true,
            u_iso: true,
            sqrt_u_iso: false,
            u_aniso: true,
            occupancy: true,
            fp: true,
            fdp: true,
        }
    }

    pub fn uses_sqrt_u_iso(&self) -> bool {
        self.u_iso && self.sqrt_u_iso
    }

    pub fn is_empty(&self) -> bool {
        self.flags().iter().all(|f| !f)
    }

    fn flags(&self) -> [bool; 7] {
        [
            self.site,
            self.u_iso,
            self.sqrt_u_iso,
            self.u_aniso,
            self.occupancy,
            self.fp,
            self.fdp,
        ]
    }

    fn flag_mut(&mut self, name: &str) -> Option<&mut bool> {
        match name {
            "site" => Some(&mut self.site),
            "u_iso" => Some(&mut self.u_iso),
            "sqrt_u_iso" => Some(&mut self.sqrt_u_iso),
            "u_aniso" => Some(&mut self.u_aniso),
            "occupancy" => Some(&mut self.occupancy),
            "fp" => Some(&mut self.fp),
            "fdp" => Some(&mut self.fdp),
            _ => None,
        }
    }
}

impl FromStr for SelectionMask {
    type Err = RefineError;

    /// Parses a comma or whitespace separated list such as `"site,u_iso,occupancy"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mask = Self::none();
        for token in s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            let name = token.to_lowercase();
            if name == "none" {
                continue;
            }
            let flag = mask.flag_mut(&name).ok_or_else(|| {
                RefineError::Parse(format!(
                    "unknown parameter class '{token}' (expected one of {})",
                    CLASS_NAMES.join(", ")
                ))
            })?;
            *flag = true;
        }
        Ok(mask)
    }
}

impl fmt::Display for SelectionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = CLASS_NAMES
            .iter()
            .zip(self.flags())
            .filter(|(_, on)| *on)
            .map(|(name, _)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join(","))
        }
    }
}
