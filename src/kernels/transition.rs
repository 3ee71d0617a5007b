//! Transition kernels, $`\langle \mathrm{bra} | \cdots | \mathrm{ket} \rangle`$ with
//! bra $`\ne`$ ket.
//!
//! Two T1 intermediates are built per block, one from each wavefunction, and combined by a
//! non-symmetric rank-k update. A block is skipped as soon as either intermediate is negligible.
//! The resulting 2-RDMs are not symmetric and are never mirrored.

use ndarray::s;

use crate::kernels::{
    accumulate_rdm1, accumulate_rdm2, KernelContext, KernelKind, KernelWorkspace, Rdm12Kernel,
    StringBlock,
};
use crate::t1::{add_alpha_t1, fill_beta_t1, fill_ms0_t1};

/// Spin-free transition kernel.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransitionMs0Kernel;

impl Rdm12Kernel for TransitionMs0Kernel {
    fn kind(&self) -> KernelKind {
        KernelKind::TransitionMs0
    }

    fn accumulate(
        &self,
        ctx: &KernelContext<'_>,
        block: StringBlock,
        stra_id: usize,
        ws: &mut KernelWorkspace,
    ) -> bool {
        let csum_bra = fill_ms0_t1(
            &ctx.bra,
            &mut ws.t1_bra.slice_mut(s![..block.len, ..]),
            block.start,
            stra_id,
            ctx.clink_a,
            ctx.clink_b,
        );
        let accumulated = ctx.above_threshold(csum_bra)
            && ctx.above_threshold(fill_ms0_t1(
                &ctx.ket,
                &mut ws.t1_ket.slice_mut(s![..block.len, ..]),
                block.start,
                stra_id,
                ctx.clink_a,
                ctx.clink_b,
            ));
        accumulate_transition(ctx, block, stra_id, ws, accumulated, true)
    }
}

/// Alpha-alpha transition kernel.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransitionAlphaKernel;

impl Rdm12Kernel for TransitionAlphaKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::TransitionAlpha
    }

    fn accumulate(
        &self,
        ctx: &KernelContext<'_>,
        block: StringBlock,
        stra_id: usize,
        ws: &mut KernelWorkspace,
    ) -> bool {
        let accumulated = ctx.above_threshold(alpha_t1(ctx, block, stra_id, true, ws))
            && ctx.above_threshold(alpha_t1(ctx, block, stra_id, false, ws));
        accumulate_transition(ctx, block, stra_id, ws, accumulated, true)
    }
}

/// Beta-beta transition kernel.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransitionBetaKernel;

impl Rdm12Kernel for TransitionBetaKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::TransitionBeta
    }

    fn accumulate(
        &self,
        ctx: &KernelContext<'_>,
        block: StringBlock,
        stra_id: usize,
        ws: &mut KernelWorkspace,
    ) -> bool {
        let accumulated = ctx.above_threshold(beta_t1(ctx, block, stra_id, true, ws))
            && ctx.above_threshold(beta_t1(ctx, block, stra_id, false, ws));
        accumulate_transition(ctx, block, stra_id, ws, accumulated, true)
    }
}

/// Mixed-spin kernel pairing the alpha T1 intermediate of the bra with the beta T1 intermediate
/// of the ket:
/// ```math
///     \Gamma^{\alpha\beta}_{(i,a),(j,b)} =
///         \langle \mathrm{bra} | \hat{a}^{\dagger}_{a\alpha} \hat{a}_{i\alpha}
///             \hat{a}^{\dagger}_{j\beta} \hat{a}_{b\beta} | \mathrm{ket} \rangle.
/// ```
/// No 1-RDM contribution is produced. With bra = ket this gives the alpha-beta block of a
/// ground-state 2-RDM.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransitionAbKernel;

impl Rdm12Kernel for TransitionAbKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::TransitionAb
    }

    fn accumulate(
        &self,
        ctx: &KernelContext<'_>,
        block: StringBlock,
        stra_id: usize,
        ws: &mut KernelWorkspace,
    ) -> bool {
        let accumulated = ctx.above_threshold(alpha_t1(ctx, block, stra_id, true, ws))
            && ctx.above_threshold(beta_t1(ctx, block, stra_id, false, ws));
        accumulate_transition(ctx, block, stra_id, ws, accumulated, false)
    }
}

/// Builds the alpha-only T1 intermediate of the bra (`from_bra`) or the ket into the matching
/// scratch buffer.
fn alpha_t1(
    ctx: &KernelContext<'_>,
    block: StringBlock,
    stra_id: usize,
    from_bra: bool,
    ws: &mut KernelWorkspace,
) -> f64 {
    let (ci, buf) = if from_bra {
        (&ctx.bra, &mut ws.t1_bra)
    } else {
        (&ctx.ket, &mut ws.t1_ket)
    };
    let mut t1 = buf.slice_mut(s![..block.len, ..]);
    t1.fill(0.0);
    add_alpha_t1(ci, &mut t1, block.start, stra_id, ctx.clink_a)
}

/// Builds the beta-only T1 intermediate of the bra (`from_bra`) or the ket into the matching
/// scratch buffer.
fn beta_t1(
    ctx: &KernelContext<'_>,
    block: StringBlock,
    stra_id: usize,
    from_bra: bool,
    ws: &mut KernelWorkspace,
) -> f64 {
    let (ci, buf) = if from_bra {
        (&ctx.bra, &mut ws.t1_bra)
    } else {
        (&ctx.ket, &mut ws.t1_ket)
    };
    fill_beta_t1(
        ci,
        &mut buf.slice_mut(s![..block.len, ..]),
        block.start,
        stra_id,
        ctx.clink_b,
    )
}

/// Accumulates `rdm1 += T1_braᵀ · ket` (if `with_rdm1`) and `rdm2 += T1_braᵀ · T1_ket` from the
/// first `block.len` rows of both scratch buffers, provided `accumulated` is set.
fn accumulate_transition(
    ctx: &KernelContext<'_>,
    block: StringBlock,
    stra_id: usize,
    ws: &mut KernelWorkspace,
    accumulated: bool,
    with_rdm1: bool,
) -> bool {
    if accumulated {
        let t1_bra = ws.t1_bra.slice(s![..block.len, ..]);
        let t1_ket = ws.t1_ket.slice(s![..block.len, ..]);
        if with_rdm1 {
            let ket_run = ctx.ket.slice(s![stra_id, block.start..block.end()]);
            accumulate_rdm1(&mut ws.rdm1, &t1_bra, &ket_run, 1.0);
        }
        accumulate_rdm2(&mut ws.rdm2, &t1_bra, &t1_ket, 1.0);
    }
    ws.record(accumulated);
    accumulated
}
