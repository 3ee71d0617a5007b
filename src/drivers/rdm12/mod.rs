//! Parallel construction of one- and two-particle density matrices.

use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{self, format_err};
use derive_builder::Builder;
use itertools::Itertools;
use log;
use ndarray::{Array2, Array4};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::drivers::RdmDriver;
use crate::error::RdmError;
use crate::io::format::{log_title, nice_bool, rdm_output, RdmOutput};
use crate::io::{read_rdm_yaml, write_rdm_yaml};
use crate::kernels::{
    coefficient_matrix, KernelContext, KernelKind, KernelWorkspace, Rdm12Kernel, StringBlock,
};
use crate::link::LinkIndex;


/// Default number of beta strings per block.
pub const DEFAULT_BLOCK_SIZE: usize = 320;

/// Default threshold below which the squared norm of a T1 intermediate is deemed negligible.
pub const DEFAULT_PRUNE_THRESHOLD: f64 = 1.0e-28;

// ==================
// Struct definitions
// ==================

// ----------
// Parameters
// ----------

/// A structure containing control parameters for density-matrix construction.
#[derive(Clone, Builder, Debug, PartialEq, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct Rdm12Params {
    /// The maximum number of beta strings whose T1 intermediates are held at once by a worker.
    #[builder(default = "DEFAULT_BLOCK_SIZE")]
    pub block_size: usize,

    /// Blocks whose T1 intermediates have a squared norm not exceeding this threshold are skipped.
    #[builder(default = "DEFAULT_PRUNE_THRESHOLD")]
    pub prune_threshold: f64,

    /// Boolean indicating if the upper triangle accumulated by ground-state kernels is to be
    /// mirrored into the lower triangle. This has no effect on transition kernels, which always
    /// fill the whole matrices.
    #[builder(default = "true")]
    pub symmetrise: bool,

    /// The number of worker threads of a dedicated thread pool. If `None`, the global rayon pool
    /// is used.
    #[builder(default = "None")]
    pub num_threads: Option<usize>,
}

impl Default for Rdm12Params {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            prune_threshold: DEFAULT_PRUNE_THRESHOLD,
            symmetrise: true,
            num_threads: None,
        }
    }
}

impl Rdm12Params {
    /// Returns a builder to construct a [`Rdm12Params`] structure.
    pub fn builder() -> Rdm12ParamsBuilder {
        Rdm12ParamsBuilder::default()
    }

    /// Reads parameters from a YAML file. Fields absent from the file take their default values.
    pub fn from_yaml_file<P: AsRef<Path>>(name: P) -> Result<Self, anyhow::Error> {
        let params: Self = read_rdm_yaml(name)?;
        params.check()?;
        Ok(params)
    }

    /// Writes the parameters to a YAML file, replacing any extension of `name` with `.yml`.
    pub fn to_yaml_file<P: AsRef<Path>>(&self, name: P) -> Result<(), anyhow::Error> {
        write_rdm_yaml(name, self)
    }

    /// Checks that the parameter values are usable.
    pub fn check(&self) -> Result<(), RdmError> {
        check_values(self.block_size, self.prune_threshold, self.num_threads)
            .map_err(RdmError::InvalidParameters)
    }
}

impl Rdm12ParamsBuilder {
    fn validate(&self) -> Result<(), String> {
        check_values(
            self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE),
            self.prune_threshold.unwrap_or(DEFAULT_PRUNE_THRESHOLD),
            self.num_threads.flatten(),
        )
    }
}

impl fmt::Display for Rdm12Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Beta-string block size: {}", self.block_size)?;
        writeln!(f, "Prune threshold: {:.3e}", self.prune_threshold)?;
        writeln!(
            f,
            "Symmetrise ground-state matrices: {}",
            nice_bool(self.symmetrise)
        )?;
        writeln!(
            f,
            "Worker threads: {}",
            self.num_threads
                .map(|nthreads| nthreads.to_string())
                .unwrap_or_else(|| "global pool".to_string())
        )?;
        writeln!(f)?;
        Ok(())
    }
}

// ------
// Result
// ------

/// A structure to contain density-matrix construction results.
#[derive(Clone, Debug)]
pub struct Rdm12Result {
    /// The kernel used to obtain these density matrices.
    kernel: KernelKind,

    /// Boolean indicating if the lower triangle has been mirrored from the upper triangle.
    symmetrised: bool,

    /// The 1-RDM, `rdm1[[p, q]]` $`= \langle \mathrm{bra} | \hat{a}^{\dagger}_p \hat{a}_q | \mathrm{ket} \rangle`$.
    rdm1: Array2<f64>,

    /// The 2-RDM, `rdm2[[p, q, r, s]]`
    /// $`= \langle \mathrm{bra} | \hat{a}^{\dagger}_p \hat{a}_q \hat{a}^{\dagger}_r \hat{a}_s | \mathrm{ket} \rangle`$.
    rdm2: Array4<f64>,

    /// The number of (alpha string, beta block) pairs that contributed.
    n_accumulated: usize,

    /// The number of (alpha string, beta block) pairs skipped.
    n_pruned: usize,

    /// The number of private workspaces that were accumulated into and merged.
    n_workers: usize,
}

impl Rdm12Result {
    pub fn kernel(&self) -> KernelKind {
        self.kernel
    }

    pub fn symmetrised(&self) -> bool {
        self.symmetrised
    }

    pub fn rdm1(&self) -> &Array2<f64> {
        &self.rdm1
    }

    pub fn rdm2(&self) -> &Array4<f64> {
        &self.rdm2
    }

    pub fn n_accumulated(&self) -> usize {
        self.n_accumulated
    }

    pub fn n_pruned(&self) -> usize {
        self.n_pruned
    }

    pub fn n_workers(&self) -> usize {
        self.n_workers
    }

    /// Consumes the result and returns the 1-RDM and the 2-RDM.
    pub fn into_parts(self) -> (Array2<f64>, Array4<f64>) {
        (self.rdm1, self.rdm2)
    }
}

impl fmt::Display for Rdm12Result {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Kernel: {}", self.kernel)?;
        writeln!(f, "Orbitals: {}", self.rdm1.nrows())?;
        writeln!(f, "Contributing blocks: {}", self.n_accumulated)?;
        writeln!(f, "Pruned blocks: {}", self.n_pruned)?;
        writeln!(f, "Worker workspaces: {}", self.n_workers)?;
        writeln!(f, "Symmetrised: {}", nice_bool(self.symmetrised))?;
        writeln!(f, "1-RDM trace: {:+.7}", self.rdm1.diag().sum())?;
        writeln!(f)?;
        Ok(())
    }
}

// ------
// Driver
// ------

/// A driver for the construction of one- and two-particle density matrices with a chosen kernel.
///
/// The alpha strings are distributed over the workers of a rayon pool. Every worker owns private
/// accumulators and T1 scratch, visits all beta blocks of its alpha strings, and finally merges
/// its accumulators into the shared ones.
#[derive(Clone, Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct Rdm12Driver<'a, K>
where
    K: Rdm12Kernel + Clone,
{
    /// The control parameters for density-matrix construction.
    parameters: &'a Rdm12Params,

    /// The kernel accumulating each block.
    kernel: K,

    /// Bra coefficients, row-major over (alpha string, beta string).
    bra: &'a [f64],

    /// Ket coefficients, row-major over (alpha string, beta string).
    ket: &'a [f64],

    /// The number of orbitals.
    norb: usize,

    /// The alpha link index.
    link_a: LinkIndex<'a>,

    /// The beta link index.
    link_b: LinkIndex<'a>,

    /// The result of the construction.
    #[builder(setter(skip), default = "None")]
    result: Option<Rdm12Result>,
}

impl<'a, K> Rdm12DriverBuilder<'a, K>
where
    K: Rdm12Kernel + Clone,
{
    fn validate(&self) -> Result<(), String> {
        let params = self
            .parameters
            .ok_or("No density-matrix parameters found.".to_string())?;
        params.check().map_err(|err| err.to_string())
    }
}

impl<'a, K> Rdm12Driver<'a, K>
where
    K: Rdm12Kernel + Clone,
{
    /// Returns a builder to construct a [`Rdm12Driver`] structure.
    pub fn builder() -> Rdm12DriverBuilder<'a, K> {
        Rdm12DriverBuilder::default()
    }

    /// Executes density-matrix construction.
    fn build_rdm12(&mut self) -> Result<(), anyhow::Error> {
        let params = self.parameters;
        params.check()?;
        let kind = self.kernel.kind();
        log_title(&format!("Density Matrices ({kind})"));
        rdm_output!("");
        params.log_output_display();

        let (na, nb) = (self.link_a.nstr, self.link_b.nstr);
        let bra = coefficient_matrix("bra", self.bra, na, nb)?;
        let ket = coefficient_matrix("ket", self.ket, na, nb)?;
        self.kernel.check_dimensions(na, nb)?;
        let norb = self.norb;
        let clink_a = self.link_a.compact(norb)?;
        let clink_b = self.link_b.compact(norb)?;
        let ctx = KernelContext {
            bra,
            ket,
            clink_a: &clink_a,
            clink_b: &clink_b,
            prune_threshold: params.prune_threshold,
        };

        let blocks = StringBlock::tile(nb, params.block_size.min(nb));
        let max_block = blocks.iter().map(|block| block.len).max().unwrap_or(0);
        log::debug!(
            "{na} alpha strings, {nb} beta strings in {} blocks of at most {max_block}.",
            blocks.len()
        );

        let reduced = Mutex::new((KernelWorkspace::try_new(norb, 0)?, 0usize));
        let kernel = &self.kernel;
        // One private workspace per worker, with alpha strings dealt round-robin.
        let fan_out = || {
            let nworkers = rayon::current_num_threads().clamp(1, na.max(1));
            (0..nworkers)
                .into_par_iter()
                .map(|worker| -> Result<KernelWorkspace, anyhow::Error> {
                    let mut ws = KernelWorkspace::try_new(norb, max_block)?;
                    for stra_id in (worker..na).step_by(nworkers) {
                        for &block in blocks.iter() {
                            kernel.accumulate(&ctx, block, stra_id, &mut ws);
                        }
                    }
                    Ok(ws)
                })
                .try_for_each(|ws_res| -> Result<(), anyhow::Error> {
                    let ws = ws_res?;
                    let mut guard = reduced
                        .lock()
                        .map_err(|err| format_err!("Unable to lock the shared accumulators: {err}"))?;
                    guard.0.merge(&ws);
                    guard.1 += 1;
                    Ok(())
                })
        };
        match params.num_threads {
            Some(nthreads) => {
                log::debug!("Accumulating on a dedicated pool of {nthreads} threads.");
                rayon::ThreadPoolBuilder::new()
                    .num_threads(nthreads)
                    .build()?
                    .install(fan_out)?
            }
            None => {
                log::debug!(
                    "Accumulating on the global pool of {} threads.",
                    rayon::current_num_threads()
                );
                fan_out()?
            }
        };

        let (
            KernelWorkspace {
                rdm1,
                mut rdm2,
                n_accumulated,
                n_pruned,
                ..
            },
            n_workers,
        ) = reduced
            .into_inner()
            .map_err(|err| format_err!("Unable to retrieve the shared accumulators: {err}"))?;
        log::debug!(
            "{n_accumulated} blocks accumulated, {n_pruned} pruned, over {n_workers} workspaces."
        );

        let mut rdm1 = rdm1.into_shape((norb, norb))?;
        let symmetrised = params.symmetrise && kind.is_upper_triangular();
        if symmetrised {
            mirror_upper(&mut rdm1);
            mirror_upper(&mut rdm2);
        } else if params.symmetrise {
            log::debug!("The {kind} kernel fills whole matrices; symmetrisation skipped.");
        }

        // Raw accumulators are indexed by (i, a) pairs; the public layouts put the creation
        // operator first.
        let rdm1 = rdm1.reversed_axes().as_standard_layout().into_owned();
        let rdm2 = rdm2
            .into_shape((norb, norb, norb, norb))?
            .permuted_axes([1, 0, 2, 3])
            .as_standard_layout()
            .into_owned();

        self.result = Some(Rdm12Result {
            kernel: kind,
            symmetrised,
            rdm1,
            rdm2,
            n_accumulated,
            n_pruned,
            n_workers,
        });
        if let Some(res) = self.result.as_ref() {
            res.log_output_display();
        }

        Ok(())
    }
}

impl<'a, K> RdmDriver for Rdm12Driver<'a, K>
where
    K: Rdm12Kernel + Clone,
{
    type Params = Rdm12Params;

    type Outcome = Rdm12Result;

    fn result(&self) -> Result<&Self::Outcome, anyhow::Error> {
        self.result
            .as_ref()
            .ok_or_else(|| format_err!("No density-matrix results found."))
    }

    fn run(&mut self) -> Result<(), anyhow::Error> {
        self.build_rdm12()
    }
}

// =========
// Functions
// =========

/// Validates raw parameter values.
fn check_values(
    block_size: usize,
    prune_threshold: f64,
    num_threads: Option<usize>,
) -> Result<(), String> {
    if block_size == 0 {
        Err("`block_size` must be positive.".to_string())
    } else if !(prune_threshold.is_finite() && prune_threshold >= 0.0) {
        Err(format!(
            "`prune_threshold` must be finite and non-negative, got {prune_threshold:.3e}."
        ))
    } else if num_threads == Some(0) {
        Err("`num_threads` must be positive when given.".to_string())
    } else {
        Ok(())
    }
}

/// Copies the strict upper triangle of a square matrix into its lower triangle.
fn mirror_upper(mat: &mut Array2<f64>) {
    (0..mat.nrows()).tuple_combinations().for_each(|(p, q)| {
        mat[[q, p]] = mat[[p, q]];
    });
}
