//! Same-spin ground-state kernels for states with $`m_s \ne 0`$ or spin-orbital treatments.

use ndarray::s;

use crate::kernels::ground_state::accumulate_ground_state;
use crate::kernels::{KernelContext, KernelKind, KernelWorkspace, Rdm12Kernel, StringBlock};
use crate::t1::{add_alpha_t1, fill_beta_t1};

/// Alpha-alpha kernel: the T1 intermediate contains alpha excitations only.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlphaKernel;

impl Rdm12Kernel for AlphaKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Alpha
    }

    fn accumulate(
        &self,
        ctx: &KernelContext<'_>,
        block: StringBlock,
        stra_id: usize,
        ws: &mut KernelWorkspace,
    ) -> bool {
        let csum = {
            let mut t1 = ws.t1_ket.slice_mut(s![..block.len, ..]);
            t1.fill(0.0);
            add_alpha_t1(&ctx.ket, &mut t1, block.start, stra_id, ctx.clink_a)
        };
        accumulate_ground_state(ctx, block, stra_id, ws, csum)
    }
}

/// Beta-beta kernel: the T1 intermediate contains beta excitations only.
#[derive(Clone, Copy, Debug, Default)]
pub struct BetaKernel;

impl Rdm12Kernel for BetaKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Beta
    }

    fn accumulate(
        &self,
        ctx: &KernelContext<'_>,
        block: StringBlock,
        stra_id: usize,
        ws: &mut KernelWorkspace,
    ) -> bool {
        let csum = fill_beta_t1(
            &ctx.ket,
            &mut ws.t1_ket.slice_mut(s![..block.len, ..]),
            block.start,
            stra_id,
            ctx.clink_b,
        );
        accumulate_ground_state(ctx, block, stra_id, ws, csum)
    }
}
