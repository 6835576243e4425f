//! Exchange between flat optimizer vectors and the structured site list.
//!
//! All four operations walk the sites with [`site_fields`] and take every
//! selected field's block from the buffer, so the position of each value is
//! decided in exactly one place.

use rayon::prelude::*;
use xtal_core::{SymMat3, UnitCell, Vec3};

use crate::cursor::{BlockCursor, BlockCursorMut};
use crate::error::{RefineError, RefineResult};
use crate::packing::{site_fields, Field, ParameterLayout};
use crate::scatterer::{Displacement, Site};
use crate::selection::SelectionMask;

const SHIFTS: &str = "shifts";
const GRADIENTS: &str = "gradients";

/// Result of [`apply_shifts`].
#[derive(Clone, Debug, PartialEq)]
pub struct AppliedShifts {
    pub sites: Vec<Site>,
    /// `sqrt(u_iso) + shift` per site when the square-root variant is
    /// refined; zero for sites it does not apply to.
    pub mean_displacements: Option<Vec<f64>>,
}

/// Applies a flat shift vector to a copy of `sites`.
///
/// Site shifts are Cartesian and converted with `cell`; anisotropic shifts
/// are added to the Cartesian tensor. The input sites are not modified.
pub fn apply_shifts(
    cell: &UnitCell,
    sites: &[Site],
    mask: SelectionMask,
    shifts: &[f64],
) -> RefineResult<AppliedShifts> {
    let mut cursor = BlockCursor::new(shifts, SHIFTS);
    let mut shifted = Vec::with_capacity(sites.len());
    let mut mean_displacements = mask.uses_sqrt_u_iso().then(|| vec![0.0; sites.len()]);
    for (index, site) in sites.iter().enumerate() {
        let (out, mean) = shift_site(cell, mask, index, site, &mut cursor)?;
        if let (Some(means), Some(mean)) = (mean_displacements.as_mut(), mean) {
            means[index] = mean;
        }
        shifted.push(out);
    }
    cursor.finish()?;
    Ok(AppliedShifts {
        sites: shifted,
        mean_displacements,
    })
}

/// Same result as [`apply_shifts`], with sites processed on the rayon pool.
///
/// The buffer length is checked before any site is touched, so a wrongly
/// sized buffer is reported ahead of any `NegativeDisplacement`. Among
/// failing sites the lowest index is reported.
pub fn apply_shifts_parallel(
    cell: &UnitCell,
    sites: &[Site],
    mask: SelectionMask,
    shifts: &[f64],
) -> RefineResult<AppliedShifts> {
    check_extent(sites, mask, shifts.len(), SHIFTS)?;
    let layout = ParameterLayout::new(sites, mask);
    let results: Vec<RefineResult<(Site, Option<f64>)>> = sites
        .par_iter()
        .enumerate()
        .map(|(index, site)| -> RefineResult<(Site, Option<f64>)> {
            let range = layout.site_range(index).unwrap_or_default();
            let mut cursor = BlockCursor::new(&shifts[range], SHIFTS);
            let out = shift_site(cell, mask, index, site, &mut cursor)?;
            cursor.finish()?;
            Ok(out)
        })
        .collect();

    let mut shifted = Vec::with_capacity(sites.len());
    let mut mean_displacements = mask.uses_sqrt_u_iso().then(|| vec![0.0; sites.len()]);
    for (index, result) in results.into_iter().enumerate() {
        let (out, mean) = result?;
        if let (Some(means), Some(mean)) = (mean_displacements.as_mut(), mean) {
            means[index] = mean;
        }
        shifted.push(out);
    }
    Ok(AppliedShifts {
        sites: shifted,
        mean_displacements,
    })
}

fn shift_site(
    cell: &UnitCell,
    mask: SelectionMask,
    index: usize,
    site: &Site,
    cursor: &mut BlockCursor<'_, f64>,
) -> RefineResult<(Site, Option<f64>)> {
    let mut out = site.clone();
    let mut mean = None;
    for field in site_fields(mask, &site.displacement) {
        match (field, &mut out.displacement) {
            (Field::Site, _) => {
                let d = cursor.take(3)?;
                let shift = cell.fractionalize(Vec3::new(d[0], d[1], d[2]));
                out.site = out.site.add(shift);
            }
            (Field::UIso, Displacement::Isotropic(u_iso)) => {
                if mask.uses_sqrt_u_iso() {
                    if *u_iso < 0.0 {
                        return Err(site.report_negative_u_iso(index));
                    }
                    let m = u_iso.sqrt() + *cursor.take_one()?;
                    *u_iso = m * m;
                    mean = Some(m);
                } else {
                    *u_iso += *cursor.take_one()?;
                }
            }
            (Field::UAniso, Displacement::Anisotropic(u_star)) => {
                let d = cursor.take(6)?;
                let delta = SymMat3::from_slice(d).unwrap_or_default();
                let u_cart = cell.u_star_as_u_cart(u_star).add(delta);
                *u_star = cell.u_cart_as_u_star(&u_cart);
            }
            // site_fields never pairs a displacement field with the other form
            (Field::UIso | Field::UAniso, _) => {
                cursor.take(field.stride())?;
            }
            (Field::Occupancy, _) => out.occupancy += *cursor.take_one()?,
            (Field::Fp, _) => out.fp += *cursor.take_one()?,
            (Field::Fdp, _) => out.fdp += *cursor.take_one()?,
        }
    }
    Ok((out, mean))
}

/// Adds per-site gradients with respect to the site coordinates into the
/// site blocks of `gradients`. Other blocks are left untouched.
pub fn scatter_position_gradients(
    sites: &[Site],
    mask: SelectionMask,
    gradients: &mut [f64],
    site_gradients: &[Vec3],
) -> RefineResult<()> {
    if !mask.site {
        return Err(RefineError::PreconditionViolated(
            "site gradients require site refinement to be selected".into(),
        ));
    }
    check_per_site("site gradients", sites.len(), site_gradients.len())?;
    check_extent(sites, mask, gradients.len(), GRADIENTS)?;
    let mut cursor = BlockCursorMut::new(gradients, GRADIENTS);
    for (site, grad) in sites.iter().zip(site_gradients) {
        for field in site_fields(mask, &site.displacement) {
            let block = cursor.take(field.stride())?;
            if field == Field::Site {
                for (g, v) in block.iter_mut().zip(grad.to_array()) {
                    *g += v;
                }
            }
        }
    }
    cursor.finish()
}

/// Adds per-site `u_iso` gradients into the `u_iso` blocks of `gradients`.
///
/// Entries for anisotropic sites are ignored since they own no `u_iso` block.
pub fn scatter_isotropic_gradients(
    sites: &[Site],
    mask: SelectionMask,
    gradients: &mut [f64],
    u_iso_gradients: &[f64],
) -> RefineResult<()> {
    if !mask.u_iso {
        return Err(RefineError::PreconditionViolated(
            "u_iso gradients require u_iso refinement to be selected".into(),
        ));
    }
    check_per_site("u_iso gradients", sites.len(), u_iso_gradients.len())?;
    check_extent(sites, mask, gradients.len(), GRADIENTS)?;
    let mut cursor = BlockCursorMut::new(gradients, GRADIENTS);
    for (site, grad) in sites.iter().zip(u_iso_gradients) {
        for field in site_fields(mask, &site.displacement) {
            let block = cursor.take(field.stride())?;
            if field == Field::UIso {
                block[0] += grad;
            }
        }
    }
    cursor.finish()
}

/// Reads the site blocks of `gradients` back into one vector per site.
pub fn gather_position_gradients(
    sites: &[Site],
    mask: SelectionMask,
    gradients: &[f64],
) -> RefineResult<Vec<Vec3>> {
    if !mask.site {
        return Err(RefineError::PreconditionViolated(
            "site gradients require site refinement to be selected".into(),
        ));
    }
    let mut cursor = BlockCursor::new(gradients, GRADIENTS);
    let mut result = Vec::with_capacity(sites.len());
    for site in sites {
        for field in site_fields(mask, &site.displacement) {
            let block = cursor.take(field.stride())?;
            if field == Field::Site {
                result.push(Vec3::new(block[0], block[1], block[2]));
            }
        }
    }
    cursor.finish()?;
    Ok(result)
}

fn check_per_site(what: &'static str, expected: usize, found: usize) -> RefineResult<()> {
    if expected == found {
        Ok(())
    } else {
        Err(RefineError::LengthMismatch {
            what,
            expected,
            found,
        })
    }
}

/// Walks the packing order against a buffer of `len` values without touching
/// it, failing exactly where a cursor traversal would.
pub(crate) fn check_extent(
    sites: &[Site],
    mask: SelectionMask,
    len: usize,
    buffer: &'static str,
) -> RefineResult<()> {
    let mut offset = 0usize;
    for site in sites {
        for field in site_fields(mask, &site.displacement) {
            let stride = field.stride();
            if offset + stride > len {
                return Err(RefineError::BufferTooSmall {
                    buffer,
                    offset,
                    requested: stride,
                    remaining: len - offset,
                });
            }
            offset += stride;
        }
    }
    if offset == len {
        Ok(())
    } else {
        Err(RefineError::BufferTooLarge {
            buffer,
            consumed: offset,
            leftover: len - offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell() -> UnitCell {
        UnitCell::cubic(10.0).unwrap()
    }

    fn mask_of(names: &str) -> SelectionMask {
        names.parse().unwrap()
    }

    #[test]
    fn site_shift_is_cartesian() {
        let sites = vec![Site::isotropic("A", Vec3::new(0.5, 0.5, 0.5), 0.01)];
        let out = apply_shifts(&cell(), &sites, mask_of("site"), &[1.0, -2.0, 0.5]).unwrap();
        let s = out.sites[0].site;
        assert!((s.x - 0.6).abs() < 1e-12);
        assert!((s.y - 0.3).abs() < 1e-12);
        assert!((s.z - 0.55).abs() < 1e-12);
        assert!(out.mean_displacements.is_none());
        assert_eq!(sites[0].site, Vec3::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn sqrt_u_iso_records_mean_displacement() {
        let sites = vec![
            Site::isotropic("A", Vec3::zero(), 0.04),
            Site::anisotropic("B", Vec3::zero(), SymMat3::zero()),
        ];
        let out = apply_shifts(&cell(), &sites, mask_of("u_iso,sqrt_u_iso"), &[0.1]).unwrap();
        let means = out.mean_displacements.unwrap();
        assert_eq!(means.len(), 2);
        assert!((means[0] - 0.3).abs() < 1e-15);
        assert_eq!(means[1], 0.0);
        assert_eq!(out.sites[0].displacement, Displacement::Isotropic(means[0] * means[0]));
    }

    #[test]
    fn negative_u_iso_is_checked_before_reading() {
        let sites = vec![
            Site::isotropic("A", Vec3::zero(), 0.04),
            Site::isotropic("B", Vec3::zero(), -0.01),
        ];
        // the buffer is one short, but the bad site is reported first
        let err = apply_shifts(&cell(), &sites, mask_of("u_iso,sqrt_u_iso"), &[0.1]).unwrap_err();
        assert!(matches!(err, RefineError::NegativeDisplacement { index: 1, .. }));
    }

    #[test]
    fn anisotropic_shift_is_added_in_cartesian_frame() {
        let c = cell();
        let sites = vec![Site::anisotropic("B", Vec3::zero(), c.u_iso_as_u_star(0.02))];
        let shifts = [0.01, 0.0, 0.0, 0.0, 0.0, 0.005];
        let out = apply_shifts(&c, &sites, mask_of("u_aniso"), &shifts).unwrap();
        let u_cart = c.u_star_as_u_cart(out.sites[0].displacement.u_star().unwrap());
        let expected = [0.03, 0.02, 0.02, 0.0, 0.0, 0.005];
        for (a, b) in u_cart.0.iter().zip(expected) {
            assert!((a - b).abs() < 1e-14, "{a} vs {b}");
        }
    }

    #[test]
    fn check_extent_matches_cursor_errors() {
        let sites = vec![Site::isotropic("A", Vec3::zero(), 0.0)];
        let mask = mask_of("site,occupancy");
        assert!(check_extent(&sites, mask, 4, GRADIENTS).is_ok());
        assert!(matches!(
            check_extent(&sites, mask, 3, GRADIENTS),
            Err(RefineError::BufferTooSmall {
                offset: 3,
                requested: 1,
                remaining: 0,
                ..
            })
        ));
        assert!(matches!(
            check_extent(&sites, mask, 6, GRADIENTS),
            Err(RefineError::BufferTooLarge { leftover: 2, .. })
        ));
    }

    #[test]
    fn failed_scatter_leaves_buffer_untouched() {
        let sites = vec![Site::isotropic("A", Vec3::zero(), 0.0)];
        let mut grads = vec![0.0; 5];
        let err = scatter_position_gradients(
            &sites,
            mask_of("site"),
            &mut grads,
            &[Vec3::new(1.0, 1.0, 1.0)],
        )
        .unwrap_err();
        assert!(matches!(err, RefineError::BufferTooLarge { .. }));
        assert!(grads.iter().all(|&g| g == 0.0));
    }
}
