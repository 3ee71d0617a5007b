//! Direct one-particle density matrices.
//!
//! These routines make a single sequential pass over the excitation records and need no T1
//! scratch, which makes them the cheapest way to obtain a 1-RDM on its own. All results are
//! `norb × norb` arrays indexed `[creation, annihilation]`.

use std::fmt;

use anyhow;
use itertools::Itertools;
use log;
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::kernels::coefficient_matrix;
use crate::link::{CompactLinkTable, LinkIndex};


// ================
// Enum definitions
// ================

/// An enumerated type for the available direct 1-RDM routines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rdm1Kind {
    /// Alpha 1-RDM of the ket.
    Alpha,

    /// Beta 1-RDM of the ket.
    Beta,

    /// Alpha transition 1-RDM between bra and ket.
    TransitionAlpha,

    /// Beta transition 1-RDM between bra and ket.
    TransitionBeta,
}

impl Rdm1Kind {
    /// Returns `true` if the bra takes part in the construction.
    pub fn is_transition(&self) -> bool {
        matches!(self, Rdm1Kind::TransitionAlpha | Rdm1Kind::TransitionBeta)
    }
}

impl fmt::Display for Rdm1Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rdm1Kind::Alpha => write!(f, "alpha"),
            Rdm1Kind::Beta => write!(f, "beta"),
            Rdm1Kind::TransitionAlpha => write!(f, "alpha transition"),
            Rdm1Kind::TransitionBeta => write!(f, "beta transition"),
        }
    }
}

// =========
// Functions
// =========

/// Computes a 1-RDM of the given kind from raw coefficients and link indices.
///
/// # Arguments
///
/// * `kind` - The kind of 1-RDM.
/// * `bra` - Bra coefficients, row-major over (alpha string, beta string). Only read for
/// transition kinds.
/// * `ket` - Ket coefficients, row-major over (alpha string, beta string).
/// * `norb` - The number of orbitals.
/// * `link_a` - The alpha link index.
/// * `link_b` - The beta link index.
///
/// # Returns
///
/// The 1-RDM, `rdm1[[p, q]]` $`= \langle \mathrm{bra} | \hat{a}^{\dagger}_p \hat{a}_q | \mathrm{ket} \rangle`$.
///
/// # Errors
///
/// Errors if a coefficient array does not hold `na * nb` values or if the link index needed by
/// `kind` is malformed.
pub fn compute_rdm1(
    kind: Rdm1Kind,
    bra: &[f64],
    ket: &[f64],
    norb: usize,
    link_a: LinkIndex<'_>,
    link_b: LinkIndex<'_>,
) -> Result<Array2<f64>, anyhow::Error> {
    let (na, nb) = (link_a.nstr, link_b.nstr);
    log::debug!("Direct {kind} 1-RDM over {na} × {nb} determinants.");
    let ket = coefficient_matrix("ket", ket, na, nb)?;
    let bra = if kind.is_transition() {
        coefficient_matrix("bra", bra, na, nb)?
    } else {
        ket.view()
    };
    let rdm1 = match kind {
        Rdm1Kind::Alpha => make_rdm1a(&ket, &link_a.compact(norb)?),
        Rdm1Kind::Beta => make_rdm1b(&ket, &link_b.compact(norb)?),
        Rdm1Kind::TransitionAlpha => trans_rdm1a(&bra, &ket, &link_a.compact(norb)?),
        Rdm1Kind::TransitionBeta => trans_rdm1b(&bra, &ket, &link_b.compact(norb)?),
    };
    Ok(rdm1)
}

/// Alpha 1-RDM of `ci` (an `na × nb` matrix).
///
/// Only records with $`a \ge i`$ are visited; the upper triangle is then copied from the lower
/// one.
pub fn make_rdm1a(ci: &ArrayView2<f64>, clink_a: &CompactLinkTable) -> Array2<f64> {
    let mut rdm1 = Array2::zeros((clink_a.norb(), clink_a.norb()));
    for (str0, ci0) in ci.outer_iter().enumerate() {
        for rec in clink_a
            .excitations(str0)
            .iter()
            .filter(|rec| rec.a() >= rec.i())
        {
            rdm1[[rec.a(), rec.i()]] += rec.phase() * ci.row(rec.addr()).dot(&ci0);
        }
    }
    mirror_lower(&mut rdm1);
    rdm1
}

/// Beta 1-RDM of `ci` (an `na × nb` matrix).
pub fn make_rdm1b(ci: &ArrayView2<f64>, clink_b: &CompactLinkTable) -> Array2<f64> {
    let mut rdm1 = Array2::zeros((clink_b.norb(), clink_b.norb()));
    for (str0, ci0) in ci.axis_iter(Axis(1)).enumerate() {
        for rec in clink_b
            .excitations(str0)
            .iter()
            .filter(|rec| rec.a() >= rec.i())
        {
            rdm1[[rec.a(), rec.i()]] += rec.phase() * ci.column(rec.addr()).dot(&ci0);
        }
    }
    mirror_lower(&mut rdm1);
    rdm1
}

/// Alpha transition 1-RDM $`\langle \mathrm{bra} | \hat{a}^{\dagger}_{p\alpha} \hat{a}_{q\alpha} | \mathrm{ket} \rangle`$.
pub fn trans_rdm1a(
    bra: &ArrayView2<f64>,
    ket: &ArrayView2<f64>,
    clink_a: &CompactLinkTable,
) -> Array2<f64> {
    let mut rdm1 = Array2::zeros((clink_a.norb(), clink_a.norb()));
    for (str0, ket0) in ket.outer_iter().enumerate() {
        for rec in clink_a.excitations(str0) {
            rdm1[[rec.a(), rec.i()]] += rec.phase() * bra.row(rec.addr()).dot(&ket0);
        }
    }
    rdm1
}

/// Beta transition 1-RDM $`\langle \mathrm{bra} | \hat{a}^{\dagger}_{p\beta} \hat{a}_{q\beta} | \mathrm{ket} \rangle`$.
pub fn trans_rdm1b(
    bra: &ArrayView2<f64>,
    ket: &ArrayView2<f64>,
    clink_b: &CompactLinkTable,
) -> Array2<f64> {
    let mut rdm1 = Array2::zeros((clink_b.norb(), clink_b.norb()));
    for (str0, ket0) in ket.axis_iter(Axis(1)).enumerate() {
        for rec in clink_b.excitations(str0) {
            rdm1[[rec.a(), rec.i()]] += rec.phase() * bra.column(rec.addr()).dot(&ket0);
        }
    }
    rdm1
}

/// Copies the strict lower triangle of a square matrix into its upper triangle.
fn mirror_lower(mat: &mut Array2<f64>) {
    (0..mat.nrows()).tuple_combinations().for_each(|(i, a)| {
        mat[[i, a]] = mat[[a, i]];
    });
}
