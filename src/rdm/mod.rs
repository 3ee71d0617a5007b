//! Entry points for FCI density matrices.
//!
//! All coefficient arrays are flat, row-major over (alpha string, beta string), and all link
//! indices are raw `(a, i, destination, sign)` quadruples. The returned matrices follow the
//! excitation-operator order:
//!
//! - `rdm1[[p, q]]` $`= \langle \mathrm{bra} | \hat{a}^{\dagger}_p \hat{a}_q | \mathrm{ket} \rangle`$,
//! - `rdm2[[p, q, r, s]]`
//!   $`= \langle \mathrm{bra} | \hat{a}^{\dagger}_p \hat{a}_q \hat{a}^{\dagger}_r \hat{a}_s | \mathrm{ket} \rangle`$.
//!
//! [`reorder_rdm`] converts a 2-RDM into the normal-ordered convention.

use anyhow::{self, ensure, format_err};
use ndarray::{s, Array2, Array4};

use crate::drivers::rdm12::{Rdm12Driver, Rdm12Params};
use crate::drivers::RdmDriver;
use crate::error::RdmError;
use crate::kernels::{
    AlphaKernel, BetaKernel, Ms0Kernel, Rdm12Kernel, Spin0Kernel, TransitionAbKernel,
    TransitionAlphaKernel, TransitionBetaKernel, TransitionMs0Kernel,
};
use crate::link::LinkIndex;
use crate::rdm1::{compute_rdm1, Rdm1Kind};

#[cfg(test)]
#[path = "rdm_tests.rs"]
mod rdm_tests;

/// Spin-resolved 1-RDMs `(alpha, beta)`.
pub type SpinRdm1 = (Array2<f64>, Array2<f64>);

// ==========================
// Kernel-level entry points
// ==========================

/// Computes the 1-RDM and the 2-RDM of `bra` and `ket` with `kernel` under explicit control
/// parameters.
///
/// # Errors
///
/// Errors with [`RdmError::InvalidParameters`] if `params` are unusable, with
/// [`RdmError::ContractViolation`] if the coefficients or link indices are inconsistent, and with
/// [`RdmError::ResourceExhausted`] if the accumulators cannot be allocated.
pub fn build_rdm12_with_params<K>(
    kernel: K,
    bra: &[f64],
    ket: &[f64],
    norb: usize,
    link_a: LinkIndex<'_>,
    link_b: LinkIndex<'_>,
    params: &Rdm12Params,
) -> Result<(Array2<f64>, Array4<f64>), anyhow::Error>
where
    K: Rdm12Kernel + Clone,
{
    params.check()?;
    let mut driver = Rdm12Driver::builder()
        .parameters(params)
        .kernel(kernel)
        .bra(bra)
        .ket(ket)
        .norb(norb)
        .link_a(link_a)
        .link_b(link_b)
        .build()
        .map_err(|err| format_err!(err))?;
    driver.run()?;
    Ok(driver.result()?.clone().into_parts())
}

/// Computes the 1-RDM and the 2-RDM with `kernel` and default control parameters. If
/// `symmetrise` is set, the triangle left empty by ground-state kernels is filled in.
pub fn build_rdm12<K>(
    kernel: K,
    bra: &[f64],
    ket: &[f64],
    norb: usize,
    link_a: LinkIndex<'_>,
    link_b: LinkIndex<'_>,
    symmetrise: bool,
) -> Result<(Array2<f64>, Array4<f64>), anyhow::Error>
where
    K: Rdm12Kernel + Clone,
{
    let params = Rdm12Params {
        symmetrise,
        ..Rdm12Params::default()
    };
    build_rdm12_with_params(kernel, bra, ket, norb, link_a, link_b, &params)
}

/// Computes transition density matrices of an $`m_s = 0`$ pair of states sharing one link index
/// for both spins. The results are never symmetrised.
pub fn build_transition_rdm12<K>(
    kernel: K,
    bra: &[f64],
    ket: &[f64],
    norb: usize,
    link: LinkIndex<'_>,
) -> Result<(Array2<f64>, Array4<f64>), anyhow::Error>
where
    K: Rdm12Kernel + Clone,
{
    build_rdm12(kernel, bra, ket, norb, link, link, false)
}

/// Computes a 1-RDM of the given kind without building any T1 intermediate.
pub fn build_rdm1(
    kind: Rdm1Kind,
    bra: &[f64],
    ket: &[f64],
    norb: usize,
    link_a: LinkIndex<'_>,
    link_b: LinkIndex<'_>,
) -> Result<Array2<f64>, anyhow::Error> {
    compute_rdm1(kind, bra, ket, norb, link_a, link_b)
}

// ======================
// Spin-free observables
// ======================

/// Spin-free 1-RDM and 2-RDM of a single state.
pub fn make_rdm12(
    ci: &[f64],
    norb: usize,
    link_a: LinkIndex<'_>,
    link_b: LinkIndex<'_>,
) -> Result<(Array2<f64>, Array4<f64>), anyhow::Error> {
    build_rdm12(Ms0Kernel, ci, ci, norb, link_a, link_b, true)
}

/// Spin-free 1-RDM and 2-RDM of a single state whose coefficients are symmetric under the
/// exchange of alpha and beta strings. About half the work of [`make_rdm12`].
pub fn make_rdm12_spin0(
    ci: &[f64],
    norb: usize,
    link: LinkIndex<'_>,
) -> Result<(Array2<f64>, Array4<f64>), anyhow::Error> {
    build_rdm12(Spin0Kernel, ci, ci, norb, link, link, true)
}

/// Spin-free transition 1-RDM and 2-RDM.
pub fn trans_rdm12(
    bra: &[f64],
    ket: &[f64],
    norb: usize,
    link_a: LinkIndex<'_>,
    link_b: LinkIndex<'_>,
) -> Result<(Array2<f64>, Array4<f64>), anyhow::Error> {
    build_rdm12(TransitionMs0Kernel, bra, ket, norb, link_a, link_b, false)
}

/// Alpha and beta 1-RDMs of a single state.
pub fn make_rdm1s(
    ci: &[f64],
    norb: usize,
    link_a: LinkIndex<'_>,
    link_b: LinkIndex<'_>,
) -> Result<SpinRdm1, anyhow::Error> {
    Ok((
        build_rdm1(Rdm1Kind::Alpha, ci, ci, norb, link_a, link_b)?,
        build_rdm1(Rdm1Kind::Beta, ci, ci, norb, link_a, link_b)?,
    ))
}

/// Spin-summed 1-RDM of a single state.
pub fn make_rdm1(
    ci: &[f64],
    norb: usize,
    link_a: LinkIndex<'_>,
    link_b: LinkIndex<'_>,
) -> Result<Array2<f64>, anyhow::Error> {
    let (dm1a, dm1b) = make_rdm1s(ci, norb, link_a, link_b)?;
    Ok(dm1a + dm1b)
}

/// Alpha and beta transition 1-RDMs.
pub fn trans_rdm1s(
    bra: &[f64],
    ket: &[f64],
    norb: usize,
    link_a: LinkIndex<'_>,
    link_b: LinkIndex<'_>,
) -> Result<SpinRdm1, anyhow::Error> {
    Ok((
        build_rdm1(Rdm1Kind::TransitionAlpha, bra, ket, norb, link_a, link_b)?,
        build_rdm1(Rdm1Kind::TransitionBeta, bra, ket, norb, link_a, link_b)?,
    ))
}

/// Spin-summed transition 1-RDM.
pub fn trans_rdm1(
    bra: &[f64],
    ket: &[f64],
    norb: usize,
    link_a: LinkIndex<'_>,
    link_b: LinkIndex<'_>,
) -> Result<Array2<f64>, anyhow::Error> {
    let (dm1a, dm1b) = trans_rdm1s(bra, ket, norb, link_a, link_b)?;
    Ok(dm1a + dm1b)
}

// ======================
// Spin-resolved matrices
// ======================

/// Spin-resolved 1-RDMs and 2-RDMs of a single state.
///
/// # Returns
///
/// `((dm1a, dm1b), (dm2aa, dm2ab, dm2bb))`, where `dm2ab[[p, q, r, s]]`
/// $`= \langle \hat{a}^{\dagger}_{p\alpha} \hat{a}_{q\alpha} \hat{a}^{\dagger}_{r\beta} \hat{a}_{s\beta} \rangle`$.
#[allow(clippy::type_complexity)]
pub fn make_rdm12s(
    ci: &[f64],
    norb: usize,
    link_a: LinkIndex<'_>,
    link_b: LinkIndex<'_>,
) -> Result<(SpinRdm1, (Array4<f64>, Array4<f64>, Array4<f64>)), anyhow::Error> {
    let (dm1a, dm2aa) = build_rdm12(AlphaKernel, ci, ci, norb, link_a, link_b, true)?;
    let (dm1b, dm2bb) = build_rdm12(BetaKernel, ci, ci, norb, link_a, link_b, true)?;
    let (_, dm2ab) = build_rdm12(TransitionAbKernel, ci, ci, norb, link_a, link_b, false)?;
    Ok(((dm1a, dm1b), (dm2aa, dm2ab, dm2bb)))
}

/// Spin-resolved transition 1-RDMs and 2-RDMs.
///
/// # Returns
///
/// `((dm1a, dm1b), (dm2aa, dm2ab, dm2ba, dm2bb))`. The mixed-spin blocks are related by
/// `dm2ba[[p, q, r, s]] = dm2ab[[r, s, p, q]]`.
#[allow(clippy::type_complexity)]
pub fn trans_rdm12s(
    bra: &[f64],
    ket: &[f64],
    norb: usize,
    link_a: LinkIndex<'_>,
    link_b: LinkIndex<'_>,
) -> Result<
    (
        SpinRdm1,
        (Array4<f64>, Array4<f64>, Array4<f64>, Array4<f64>),
    ),
    anyhow::Error,
> {
    let (dm1a, dm2aa) = build_rdm12(TransitionAlphaKernel, bra, ket, norb, link_a, link_b, false)?;
    let (dm1b, dm2bb) = build_rdm12(TransitionBetaKernel, bra, ket, norb, link_a, link_b, false)?;
    let (_, dm2ab) = build_rdm12(TransitionAbKernel, bra, ket, norb, link_a, link_b, false)?;
    let dm2ba = dm2ab
        .view()
        .permuted_axes([2, 3, 0, 1])
        .as_standard_layout()
        .into_owned();
    Ok(((dm1a, dm1b), (dm2aa, dm2ab, dm2ba, dm2bb)))
}

// ===============
// Post-processing
// ===============

/// Converts a 2-RDM from the excitation-operator order into the normal-ordered convention,
/// ```math
///     \langle \hat{a}^{\dagger}_p \hat{a}^{\dagger}_r \hat{a}_s \hat{a}_q \rangle
///         = \langle \hat{a}^{\dagger}_p \hat{a}_q \hat{a}^{\dagger}_r \hat{a}_s \rangle
///         - \delta_{qr} \langle \hat{a}^{\dagger}_p \hat{a}_s \rangle,
/// ```
/// keeping the `[p, q, r, s]` index layout.
///
/// # Errors
///
/// Errors with [`RdmError::ContractViolation`] if the shapes of `rdm1` and `rdm2` do not belong
/// to the same number of orbitals.
pub fn reorder_rdm(
    rdm1: Array2<f64>,
    mut rdm2: Array4<f64>,
) -> Result<(Array2<f64>, Array4<f64>), anyhow::Error> {
    let norb = rdm1.nrows();
    ensure!(
        rdm1.dim() == (norb, norb) && rdm2.dim() == (norb, norb, norb, norb),
        RdmError::ContractViolation(format!(
            "cannot reorder a 2-RDM of shape {:?} with a 1-RDM of shape {:?}",
            rdm2.shape(),
            rdm1.shape()
        ))
    );
    for k in 0..norb {
        rdm2.slice_mut(s![.., k, k, ..]).scaled_add(-1.0, &rdm1);
    }
    Ok((rdm1, rdm2))
}
