//! Spin-free ground-state kernels.

use std::f64::consts::SQRT_2;

use anyhow;
use ndarray::s;

use crate::kernels::{
    accumulate_rdm1, accumulate_rdm2_upper, ensure_square, KernelContext, KernelKind,
    KernelWorkspace, Rdm12Kernel, StringBlock,
};
use crate::t1::{add_alpha_t1, fill_beta_t1, fill_ms0_t1};

/// Spin-free kernel for a single state.
///
/// The combined alpha and beta T1 intermediate of each determinant in the block is built from the
/// ket, and
/// ```math
///     \gamma_{(i,a)} \mathrel{+}= \sum_K T_K^{(i,a)} c_K, \qquad
///     \Gamma_{(i,a),(j,b)} \mathrel{+}= \sum_K T_K^{(i,a)} T_K^{(j,b)} \quad ((i,a) \le (j,b)).
/// ```
/// No assumption is made on the spin of the state, so this is also valid when the alpha and beta
/// string spaces differ.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ms0Kernel;

impl Rdm12Kernel for Ms0Kernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Ms0
    }

    fn accumulate(
        &self,
        ctx: &KernelContext<'_>,
        block: StringBlock,
        stra_id: usize,
        ws: &mut KernelWorkspace,
    ) -> bool {
        let csum = fill_ms0_t1(
            &ctx.ket,
            &mut ws.t1_ket.slice_mut(s![..block.len, ..]),
            block.start,
            stra_id,
            ctx.clink_a,
            ctx.clink_b,
        );
        accumulate_ground_state(ctx, block, stra_id, ws, csum)
    }
}

/// Spin-free kernel for a state whose coefficients are symmetric under the exchange of alpha and
/// beta strings, $`c_{IJ} = c_{JI}`$.
///
/// Determinants $`(I, J)`$ and $`(J, I)`$ then share the same T1 intermediate, so only
/// $`I \ge J`$ is visited. Off-diagonal determinants are weighted by two. On the diagonal only the
/// alpha half of the intermediate is built; scaling it by $`\sqrt{2}`$ before the weighted rank-k
/// update recovers the full contribution.
#[derive(Clone, Copy, Debug, Default)]
pub struct Spin0Kernel;

impl Rdm12Kernel for Spin0Kernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Spin0
    }

    fn accumulate(
        &self,
        ctx: &KernelContext<'_>,
        block: StringBlock,
        stra_id: usize,
        ws: &mut KernelWorkspace,
    ) -> bool {
        if stra_id < block.start {
            return false;
        }
        // `fill0` off-diagonal rows; the diagonal row, if inside the block, is row `fill0`.
        let (fill0, fill1) = if block.end() <= stra_id {
            (block.len, block.len)
        } else {
            (stra_id - block.start, stra_id - block.start + 1)
        };

        let csum = {
            let mut rows = ws.t1_ket.slice_mut(s![..fill1, ..]);
            let csum_b = fill_beta_t1(
                &ctx.ket,
                &mut rows.slice_mut(s![..fill0, ..]),
                block.start,
                stra_id,
                ctx.clink_b,
            );
            rows.slice_mut(s![fill0.., ..]).fill(0.0);
            csum_b + add_alpha_t1(&ctx.ket, &mut rows, block.start, stra_id, ctx.clink_a)
        };
        let accumulated = ctx.above_threshold(csum);
        if accumulated {
            let ket_run = ctx
                .ket
                .slice(s![stra_id, block.start..block.start + fill1]);
            accumulate_rdm1(
                &mut ws.rdm1,
                &ws.t1_ket.slice(s![..fill1, ..]),
                &ket_run,
                2.0,
            );
            ws.t1_ket
                .slice_mut(s![fill0..fill1, ..])
                .mapv_inplace(|x| x * SQRT_2);
            accumulate_rdm2_upper(&mut ws.rdm2, &ws.t1_ket.slice(s![..fill1, ..]), 2.0);
        }
        ws.record(accumulated);
        accumulated
    }

    fn check_dimensions(&self, na: usize, nb: usize) -> Result<(), anyhow::Error> {
        ensure_square(self.kind(), na, nb)
    }
}

/// Rank-1 and symmetric rank-k updates from the first `block.len` rows of the ket T1 scratch,
/// unless `csum` is negligible.
pub(crate) fn accumulate_ground_state(
    ctx: &KernelContext<'_>,
    block: StringBlock,
    stra_id: usize,
    ws: &mut KernelWorkspace,
    csum: f64,
) -> bool {
    let accumulated = ctx.above_threshold(csum);
    if accumulated {
        let t1 = ws.t1_ket.slice(s![..block.len, ..]);
        let ket_run = ctx.ket.slice(s![stra_id, block.start..block.end()]);
        accumulate_rdm1(&mut ws.rdm1, &t1, &ket_run, 1.0);
        accumulate_rdm2_upper(&mut ws.rdm2, &t1, 1.0);
    }
    ws.record(accumulated);
    accumulated
}
