#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::Rng;

use xtal_refine::config::{CellSpec, RefineConfig};
use xtal_refine::{SelectionMask, Site, SymMat3, UnitCell, Vec3};

pub fn temp_path(label: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let label_path = Path::new(label);
    let stem = label_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(label);
    let filename = match label_path.extension().and_then(|s| s.to_str()) {
        Some(ext) => format!("xtal_refine_test_{stem}_{}_{}.{ext}", std::process::id(), nanos),
        None => format!("xtal_refine_test_{label}_{}_{}", std::process::id(), nanos),
    };
    path.push(filename);
    path
}

pub fn monoclinic_cell() -> UnitCell {
    UnitCell::new([8.0, 9.5, 11.0, 90.0, 104.5, 90.0]).unwrap()
}

pub fn cell_spec() -> CellSpec {
    CellSpec {
        a: 8.0,
        b: 9.5,
        c: 11.0,
        alpha: 90.0,
        beta: 104.5,
        gamma: 90.0,
    }
}

/// Sites A (isotropic 0.01), B (anisotropic), C (isotropic 0.02).
pub fn heterogeneous_sites(cell: &UnitCell) -> Vec<Site> {
    let mut b = Site::anisotropic(
        "B",
        Vec3::new(0.4, 0.1, 0.8),
        cell.u_cart_as_u_star(&SymMat3::new(0.03, 0.025, 0.02, 0.002, -0.001, 0.003)),
    );
    b.fp = -0.3;
    b.fdp = 1.2;
    let mut c = Site::isotropic("C", Vec3::new(0.9, 0.5, 0.05), 0.02);
    c.occupancy = 0.5;
    vec![
        Site::isotropic("A", Vec3::new(0.1, 0.2, 0.3), 0.01),
        b,
        c,
    ]
}

pub fn base_config(sites: Vec<Site>, selection: SelectionMask) -> RefineConfig {
    RefineConfig {
        cell: cell_spec(),
        selection,
        sites,
        shifts: None,
        output: None,
        parallel: false,
    }
}

pub fn random_mask(rng: &mut StdRng) -> SelectionMask {
    SelectionMask {
        site: rng.gen_bool(0.6),
        u_iso: rng.gen_bool(0.5),
        sqrt_u_iso: rng.gen_bool(0.3),
        u_aniso: rng.gen_bool(0.5),
        occupancy: rng.gen_bool(0.5),
        fp: rng.gen_bool(0.3),
        fdp: rng.gen_bool(0.3),
    }
}

pub fn random_sites(rng: &mut StdRng, cell: &UnitCell, n: usize) -> Vec<Site> {
    (0..n)
        .map(|i| {
            let site = Vec3::new(rng.gen(), rng.gen(), rng.gen());
            let mut s = if rng.gen_bool(0.4) {
                let d = rng.gen_range(0.01..0.05);
                Site::anisotropic(format!("S{i}"), site, cell.u_iso_as_u_star(d))
            } else {
                Site::isotropic(format!("S{i}"), site, rng.gen_range(0.0..0.08))
            };
            s.occupancy = rng.gen_range(0.2..1.0);
            s.fp = rng.gen_range(-1.0..0.0);
            s.fdp = rng.gen_range(0.0..2.0);
            s
        })
        .collect()
}

pub fn random_vector(rng: &mut StdRng, len: usize, scale: f64) -> Vec<f64> {
    (0..len).map(|_| rng.gen_range(-scale..scale)).collect()
}

pub fn assert_close(a: f64, b: f64, eps: f64) {
    assert!((a - b).abs() < eps, "{a} vs {b} (eps {eps})");
}
