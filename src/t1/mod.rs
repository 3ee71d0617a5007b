//! Single-excitation contractions ("T1" intermediates).
//!
//! For a determinant $`|K\rangle = |I_\alpha J_\beta\rangle`$ the T1 intermediate collects, for every
//! orbital pair $`(i, a)`$,
//! ```math
//!     T_K^{(i,a)} = \sum_{L} c_L \langle L | \hat{a}^{\dagger}_a \hat{a}_i | K \rangle,
//! ```
//! restricted to the alpha or beta excitations (or both). Rows of a T1 buffer correspond to the
//! consecutive beta strings of one block with the alpha string held fixed; columns are orbital
//! pairs addressed by [`ExcitationRecord::pair_index`](crate::link::ExcitationRecord::pair_index).
//!
//! Every builder returns the sum of squares of the coefficients it has read. The kernels use this
//! to skip blocks whose intermediates are numerically zero.

use ndarray::{s, ArrayView2, ArrayViewMut2};

use crate::link::CompactLinkTable;


/// Adds the alpha-excitation contributions of string `stra_id` onto the rows of `t1`.
///
/// Row `k` of `t1` receives $`\pm c[I', J_k]`$ in the column of each excitation
/// $`I \to I'`$, where $`J_k`$ = `strb_start + k`. The existing content of `t1` is kept.
///
/// # Arguments
///
/// * `ci` - Coefficients as an $`n_\alpha \times n_\beta`$ matrix.
/// * `t1` - T1 rows for the beta strings `strb_start..strb_start + t1.nrows()`.
/// * `strb_start` - The first beta string of the block.
/// * `stra_id` - The fixed alpha string.
/// * `clink_a` - Alpha link table.
///
/// # Returns
///
/// The accumulated squared norm of the contributing coefficients.
pub fn add_alpha_t1(
    ci: &ArrayView2<f64>,
    t1: &mut ArrayViewMut2<f64>,
    strb_start: usize,
    stra_id: usize,
    clink_a: &CompactLinkTable,
) -> f64 {
    let norb = clink_a.norb();
    let fillcnt = t1.nrows();
    clink_a
        .excitations(stra_id)
        .iter()
        .fold(0.0, |csum, rec| {
            let run = ci.slice(s![rec.addr(), strb_start..strb_start + fillcnt]);
            t1.column_mut(rec.pair_index(norb))
                .scaled_add(rec.phase(), &run);
            csum + run.dot(&run)
        })
}

/// Overwrites the rows of `t1` with the beta-excitation contributions of the block's strings.
///
/// Row `k` is zeroed and then receives $`\pm c[I, J']`$ in the column of each excitation
/// $`J_k \to J'`$ of the beta string $`J_k`$ = `strb_start + k`, with $`I`$ = `stra_id` held
/// fixed.
///
/// # Arguments
///
/// * `ci` - Coefficients as an $`n_\alpha \times n_\beta`$ matrix.
/// * `t1` - T1 rows for the beta strings `strb_start..strb_start + t1.nrows()`.
/// * `strb_start` - The first beta string of the block.
/// * `stra_id` - The fixed alpha string.
/// * `clink_b` - Beta link table.
///
/// # Returns
///
/// The accumulated squared norm of the contributing coefficients.
pub fn fill_beta_t1(
    ci: &ArrayView2<f64>,
    t1: &mut ArrayViewMut2<f64>,
    strb_start: usize,
    stra_id: usize,
    clink_b: &CompactLinkTable,
) -> f64 {
    let norb = clink_b.norb();
    let ci_row = ci.row(stra_id);
    let mut csum = 0.0;
    for (k, mut t1_k) in t1.outer_iter_mut().enumerate() {
        t1_k.fill(0.0);
        for rec in clink_b.excitations(strb_start + k) {
            let c = ci_row[rec.addr()];
            t1_k[rec.pair_index(norb)] += rec.phase() * c;
            csum += c * c;
        }
    }
    csum
}

/// Overwrites the rows of `t1` with the combined beta and alpha contributions, i.e. the
/// spin-free T1 intermediate.
///
/// # Returns
///
/// The sum of the squared norms of both contributions.
pub fn fill_ms0_t1(
    ci: &ArrayView2<f64>,
    t1: &mut ArrayViewMut2<f64>,
    strb_start: usize,
    stra_id: usize,
    clink_a: &CompactLinkTable,
    clink_b: &CompactLinkTable,
) -> f64 {
    fill_beta_t1(ci, t1, strb_start, stra_id, clink_b)
        + add_alpha_t1(ci, t1, strb_start, stra_id, clink_a)
}
