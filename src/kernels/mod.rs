//! Density accumulation kernels.
//!
//! A kernel turns T1 intermediates of one block of determinants into contributions to the raw
//! one- and two-particle density-matrix accumulators. The raw accumulators are indexed by the
//! orbital-pair index $`i n_{\mathrm{orb}} + a`$:
//!
//! - `rdm1[(i, a)]` $`= \langle \mathrm{bra} | \hat{a}^{\dagger}_a \hat{a}_i | \mathrm{ket} \rangle`$,
//! - `rdm2[(i, a), (j, b)]`
//!   $`= \langle \mathrm{bra} | \hat{a}^{\dagger}_a \hat{a}_i \hat{a}^{\dagger}_j \hat{a}_b | \mathrm{ket} \rangle`$
//!   (for ground-state kernels only the upper triangle of this $`n_{\mathrm{orb}}^2 \times
//!   n_{\mathrm{orb}}^2`$ matrix is filled).

use std::fmt;

use anyhow::{self, ensure, format_err};
use ndarray::linalg::{general_mat_mul, general_mat_vec_mul};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{try_zeroed, RdmError};
use crate::link::CompactLinkTable;

pub mod ground_state;
pub mod spin_channel;
pub mod transition;

pub use ground_state::{Ms0Kernel, Spin0Kernel};
pub use spin_channel::{AlphaKernel, BetaKernel};
pub use transition::{
    TransitionAbKernel, TransitionAlphaKernel, TransitionBetaKernel, TransitionMs0Kernel,
};


// ==================
// Struct definitions
// ==================

/// A contiguous run of beta strings processed together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StringBlock {
    /// The first beta string of the block.
    pub start: usize,

    /// The number of beta strings in the block.
    pub len: usize,
}

impl StringBlock {
    /// Tiles `nstr` strings into blocks of at most `block_size` strings.
    pub fn tile(nstr: usize, block_size: usize) -> Vec<StringBlock> {
        (0..nstr)
            .step_by(block_size.max(1))
            .map(|start| StringBlock {
                start,
                len: block_size.max(1).min(nstr - start),
            })
            .collect()
    }

    /// One past the last beta string of the block.
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Read-only data shared by all workers during one density-matrix build.
pub struct KernelContext<'a> {
    /// Bra coefficients as an $`n_\alpha \times n_\beta`$ matrix.
    pub bra: ArrayView2<'a, f64>,

    /// Ket coefficients as an $`n_\alpha \times n_\beta`$ matrix.
    pub ket: ArrayView2<'a, f64>,

    /// Alpha link table.
    pub clink_a: &'a CompactLinkTable,

    /// Beta link table.
    pub clink_b: &'a CompactLinkTable,

    /// Blocks whose T1 squared norm does not exceed this threshold are skipped.
    pub prune_threshold: f64,
}

impl KernelContext<'_> {
    /// The number of orbitals.
    pub fn norb(&self) -> usize {
        self.clink_a.norb()
    }

    /// The number of orbital pairs.
    pub fn nnorb(&self) -> usize {
        self.norb() * self.norb()
    }

    /// Returns `true` if a block with squared T1 norm `csum` contributes.
    pub fn above_threshold(&self, csum: f64) -> bool {
        csum > self.prune_threshold
    }
}

/// Private accumulators and scratch space owned by a single worker.
#[derive(Clone, Debug)]
pub struct KernelWorkspace {
    /// Partial raw 1-RDM of length $`n_{\mathrm{orb}}^2`$.
    pub rdm1: Array1<f64>,

    /// Partial raw 2-RDM of shape $`n_{\mathrm{orb}}^2 \times n_{\mathrm{orb}}^2`$.
    pub rdm2: Array2<f64>,

    /// T1 scratch for the bra (or, for ground-state kernels, the only) intermediate.
    pub t1_bra: Array2<f64>,

    /// T1 scratch for the ket intermediate.
    pub t1_ket: Array2<f64>,

    /// Number of (alpha string, block) pairs that contributed.
    pub n_accumulated: usize,

    /// Number of (alpha string, block) pairs skipped because of negligible norms.
    pub n_pruned: usize,
}

impl KernelWorkspace {
    /// Allocates zeroed accumulators for `norb` orbitals and T1 scratch for blocks of up to
    /// `max_block` strings.
    pub fn try_new(norb: usize, max_block: usize) -> Result<Self, RdmError> {
        let nnorb = norb * norb;
        let rdm1 = Array1::from_vec(try_zeroed("1-RDM accumulator", nnorb)?);
        let rdm2 = Array2::from_shape_vec(
            (nnorb, nnorb),
            try_zeroed("2-RDM accumulator", nnorb * nnorb)?,
        )
        .map_err(|err| RdmError::ContractViolation(err.to_string()))?;
        let t1 = |what| {
            Array2::from_shape_vec((max_block, nnorb), try_zeroed(what, max_block * nnorb)?)
                .map_err(|err| RdmError::ContractViolation(err.to_string()))
        };
        Ok(Self {
            rdm1,
            rdm2,
            t1_bra: t1("bra T1 scratch")?,
            t1_ket: t1("ket T1 scratch")?,
            n_accumulated: 0,
            n_pruned: 0,
        })
    }

    /// Adds the accumulators and statistics of `other` into `self`.
    pub fn merge(&mut self, other: &KernelWorkspace) {
        self.rdm1 += &other.rdm1;
        self.rdm2 += &other.rdm2;
        self.n_accumulated += other.n_accumulated;
        self.n_pruned += other.n_pruned;
    }

    /// Records whether a block contributed.
    pub(crate) fn record(&mut self, accumulated: bool) {
        if accumulated {
            self.n_accumulated += 1;
        } else {
            self.n_pruned += 1;
        }
    }
}

// =================
// Trait definitions
// =================

/// Behaviour of a block kernel driven by [`Rdm12Driver`](crate::drivers::rdm12::Rdm12Driver).
pub trait Rdm12Kernel: Sync {
    /// The kind of this kernel.
    fn kind(&self) -> KernelKind;

    /// Accumulates the contributions of determinants `(stra_id, block)` into `ws`.
    ///
    /// # Returns
    ///
    /// `true` if the block contributed, `false` if it was skipped as negligible or lies outside
    /// the region this kernel is responsible for.
    fn accumulate(
        &self,
        ctx: &KernelContext<'_>,
        block: StringBlock,
        stra_id: usize,
        ws: &mut KernelWorkspace,
    ) -> bool;

    /// Checks the kernel's preconditions on the string-space dimensions.
    fn check_dimensions(&self, na: usize, nb: usize) -> Result<(), anyhow::Error> {
        let _ = (na, nb);
        Ok(())
    }
}

// ================
// Enum definitions
// ================

/// An enumerated type for the available density accumulation kernels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KernelKind {
    /// Spin-free ground-state kernel.
    Ms0,

    /// Ground-state kernel exploiting alpha/beta exchange symmetry of the coefficients.
    Spin0,

    /// Spin-free transition kernel.
    TransitionMs0,

    /// Ground-state alpha-alpha kernel.
    Alpha,

    /// Ground-state beta-beta kernel.
    Beta,

    /// Transition alpha-alpha kernel.
    TransitionAlpha,

    /// Transition beta-beta kernel.
    TransitionBeta,

    /// Mixed alpha-beta kernel, for ground-state (bra = ket) or transition densities.
    TransitionAb,
}

impl KernelKind {
    /// Returns `true` if the kernel fills only the upper triangle of the raw 2-RDM.
    pub fn is_upper_triangular(&self) -> bool {
        matches!(
            self,
            KernelKind::Ms0 | KernelKind::Spin0 | KernelKind::Alpha | KernelKind::Beta
        )
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelKind::Ms0 => write!(f, "spin-free (ms = 0)"),
            KernelKind::Spin0 => write!(f, "spin-free, alpha/beta-symmetric (spin = 0)"),
            KernelKind::TransitionMs0 => write!(f, "spin-free transition (ms = 0)"),
            KernelKind::Alpha => write!(f, "alpha-alpha"),
            KernelKind::Beta => write!(f, "beta-beta"),
            KernelKind::TransitionAlpha => write!(f, "alpha-alpha transition"),
            KernelKind::TransitionBeta => write!(f, "beta-beta transition"),
            KernelKind::TransitionAb => write!(f, "alpha-beta"),
        }
    }
}

impl Rdm12Kernel for KernelKind {
    fn kind(&self) -> KernelKind {
        *self
    }

    fn accumulate(
        &self,
        ctx: &KernelContext<'_>,
        block: StringBlock,
        stra_id: usize,
        ws: &mut KernelWorkspace,
    ) -> bool {
        match self {
            KernelKind::Ms0 => Ms0Kernel.accumulate(ctx, block, stra_id, ws),
            KernelKind::Spin0 => Spin0Kernel.accumulate(ctx, block, stra_id, ws),
            KernelKind::TransitionMs0 => TransitionMs0Kernel.accumulate(ctx, block, stra_id, ws),
            KernelKind::Alpha => AlphaKernel.accumulate(ctx, block, stra_id, ws),
            KernelKind::Beta => BetaKernel.accumulate(ctx, block, stra_id, ws),
            KernelKind::TransitionAlpha => {
                TransitionAlphaKernel.accumulate(ctx, block, stra_id, ws)
            }
            KernelKind::TransitionBeta => TransitionBetaKernel.accumulate(ctx, block, stra_id, ws),
            KernelKind::TransitionAb => TransitionAbKernel.accumulate(ctx, block, stra_id, ws),
        }
    }

    fn check_dimensions(&self, na: usize, nb: usize) -> Result<(), anyhow::Error> {
        match self {
            KernelKind::Spin0 => Spin0Kernel.check_dimensions(na, nb),
            _ => Ok(()),
        }
    }
}

// =========
// Functions
// =========

/// Rank-1 update `rdm1 += alpha * t1ᵀ · coeffs`.
pub(crate) fn accumulate_rdm1(
    rdm1: &mut Array1<f64>,
    t1: &ArrayView2<f64>,
    coeffs: &ArrayView1<f64>,
    alpha: f64,
) {
    general_mat_vec_mul(alpha, &t1.t(), coeffs, 1.0, rdm1);
}

/// Symmetric rank-k update of the upper triangle, `rdm2[p, q] += alpha * Σ_k t1[k, p] t1[k, q]`
/// for `p ≤ q`.
///
/// T1 rows are sparse (at most one nonzero per excitation record), so the update is carried out
/// as a sum of row-wise rank-1 updates over the nonzero entries only.
pub(crate) fn accumulate_rdm2_upper(rdm2: &mut Array2<f64>, t1: &ArrayView2<f64>, alpha: f64) {
    for t1_k in t1.outer_iter() {
        for (p, &t1_kp) in t1_k.indexed_iter() {
            if t1_kp != 0.0 {
                rdm2.slice_mut(s![p, p..])
                    .scaled_add(alpha * t1_kp, &t1_k.slice(s![p..]));
            }
        }
    }
}

/// General rank-k update `rdm2 += alpha * leftᵀ · right`.
pub(crate) fn accumulate_rdm2(
    rdm2: &mut Array2<f64>,
    left: &ArrayView2<f64>,
    right: &ArrayView2<f64>,
    alpha: f64,
) {
    general_mat_mul(alpha, &left.t(), right, 1.0, rdm2);
}

/// Views the flat coefficient slice `coeffs` of the `what` wavefunction as an `na × nb` matrix.
pub(crate) fn coefficient_matrix<'a>(
    what: &str,
    coeffs: &'a [f64],
    na: usize,
    nb: usize,
) -> Result<ArrayView2<'a, f64>, anyhow::Error> {
    ensure!(
        coeffs.len() == na * nb,
        RdmError::ContractViolation(format!(
            "{what} has {} coefficients, expected {na} × {nb} = {}",
            coeffs.len(),
            na * nb
        ))
    );
    ArrayView2::from_shape((na, nb), coeffs)
        .map_err(|err| format_err!(RdmError::ContractViolation(err.to_string())))
}

/// Verifies that a kernel requiring identical alpha and beta string spaces is given one.
pub(crate) fn ensure_square(kind: KernelKind, na: usize, nb: usize) -> Result<(), anyhow::Error> {
    if na == nb {
        Ok(())
    } else {
        Err(format_err!(RdmError::ContractViolation(format!(
            "the {kind} kernel requires equal alpha and beta string counts, got {na} and {nb}"
        ))))
    }
}
