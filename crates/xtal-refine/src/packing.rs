//! Packing-order convention for flat parameter vectors.
//!
//! Per site, in this order: site (3), displacement (1 if isotropic, 6 if
//! anisotropic), occupancy (1), fp (1), fdp (1). A field occupies space only
//! when its class is selected; which displacement field applies is decided
//! by the site itself, not by the mask.

use crate::scatterer::{Displacement, Site};
use crate::selection::SelectionMask;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Site,
    UIso,
    UAniso,
    Occupancy,
    Fp,
    Fdp,
}

impl Field {
    pub fn stride(self) -> usize {
        match self {
            Field::Site => 3,
            Field::UIso => 1,
            Field::UAniso => 6,
            Field::Occupancy | Field::Fp | Field::Fdp => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Site => "site",
            Field::UIso => "u_iso",
            Field::UAniso => "u_aniso",
            Field::Occupancy => "occupancy",
            Field::Fp => "fp",
            Field::Fdp => "fdp",
        }
    }
}

/// Fields a site contributes under `mask`, in packing order.
///
/// Every traversal of a flat buffer walks this sequence and takes
/// `field.stride()` values per field, whether it uses them or not.
pub fn site_fields(mask: SelectionMask, displacement: &Displacement) -> impl Iterator<Item = Field> {
    let adp = match displacement {
        Displacement::Isotropic(_) => mask.u_iso.then_some(Field::UIso),
        Displacement::Anisotropic(_) => mask.u_aniso.then_some(Field::UAniso),
    };
    mask.site
        .then_some(Field::Site)
        .into_iter()
        .chain(adp)
        .chain(mask.occupancy.then_some(Field::Occupancy))
        .chain(mask.fp.then_some(Field::Fp))
        .chain(mask.fdp.then_some(Field::Fdp))
}

pub fn site_stride(mask: SelectionMask, displacement: &Displacement) -> usize {
    site_fields(mask, displacement).map(Field::stride).sum()
}

/// Length a flat buffer must have for `sites` under `mask`.
pub fn n_parameters(sites: &[Site], mask: SelectionMask) -> usize {
    sites
        .iter()
        .map(|s| site_stride(mask, &s.displacement))
        .sum()
}

/// Offsets of every site and field within the flat buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterLayout {
    mask: SelectionMask,
    starts: Vec<usize>,
    fields: Vec<Vec<(Field, usize)>>,
    total: usize,
}

impl ParameterLayout {
    pub fn new(sites: &[Site], mask: SelectionMask) -> Self {
        let mut starts = Vec::with_capacity(sites.len());
        let mut fields = Vec::with_capacity(sites.len());
        let mut offset = 0usize;
        for site in sites {
            starts.push(offset);
            let mut entry = Vec::with_capacity(5);
            for field in site_fields(mask, &site.displacement) {
                entry.push((field, offset));
                offset += field.stride();
            }
            fields.push(entry);
        }
        Self {
            mask,
            starts,
            fields,
            total: offset,
        }
    }

    pub fn mask(&self) -> SelectionMask {
        self.mask
    }

    pub fn n_sites(&self) -> usize {
        self.starts.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Half-open range of the buffer owned by site `index`.
    pub fn site_range(&self, index: usize) -> Option<std::ops::Range<usize>> {
        let start = *self.starts.get(index)?;
        let end = self.starts.get(index + 1).copied().unwrap_or(self.total);
        Some(start..end)
    }

    pub fn offset_of(&self, index: usize, field: Field) -> Option<usize> {
        self.fields
            .get(index)?
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, offset)| *offset)
    }

    pub fn site_fields(&self, index: usize) -> &[(Field, usize)] {
        self.fields.get(index).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xtal_core::{SymMat3, Vec3};

    fn mixed_sites() -> Vec<Site> {
        vec![
            Site::isotropic("A", Vec3::zero(), 0.01),
            Site::anisotropic("B", Vec3::zero(), SymMat3::zero()),
            Site::isotropic("C", Vec3::zero(), 0.02),
        ]
    }

    #[test]
    fn order_follows_convention() {
        let mask = SelectionMask::all();
        let iso: Vec<Field> = site_fields(mask, &Displacement::Isotropic(0.0)).collect();
        assert_eq!(
            iso,
            vec![Field::Site, Field::UIso, Field::Occupancy, Field::Fp, Field::Fdp]
        );
        let aniso: Vec<Field> =
            site_fields(mask, &Displacement::Anisotropic(SymMat3::zero())).collect();
        assert_eq!(aniso[1], Field::UAniso);
        assert_eq!(site_stride(mask, &Displacement::Anisotropic(SymMat3::zero())), 12);
    }

    #[test]
    fn unselected_displacement_takes_no_space() {
        let mut mask = SelectionMask::none();
        mask.site = true;
        mask.u_iso = true;
        let aniso = Displacement::Anisotropic(SymMat3::zero());
        assert_eq!(site_fields(mask, &aniso).collect::<Vec<_>>(), vec![Field::Site]);
        assert_eq!(site_fields(SelectionMask::none(), &aniso).count(), 0);
    }

    #[test]
    fn layout_offsets_for_mixed_sites() {
        let mut mask = SelectionMask::none();
        mask.site = true;
        mask.u_iso = true;
        mask.u_aniso = true;
        mask.occupancy = true;
        let sites = mixed_sites();
        let layout = ParameterLayout::new(&sites, mask);
        assert_eq!(layout.total(), 3 + 1 + 1 + 3 + 6 + 1 + 3 + 1 + 1);
        assert_eq!(layout.total(), n_parameters(&sites, mask));
        assert_eq!(layout.site_range(0), Some(0..5));
        assert_eq!(layout.site_range(1), Some(5..15));
        assert_eq!(layout.site_range(2), Some(15..20));
        assert_eq!(layout.site_range(3), None);
        assert_eq!(layout.offset_of(1, Field::UAniso), Some(8));
        assert_eq!(layout.offset_of(1, Field::UIso), None);
        assert_eq!(layout.offset_of(2, Field::Occupancy), Some(19));
        assert_eq!(layout.site_fields(2).len(), 3);
    }
}
