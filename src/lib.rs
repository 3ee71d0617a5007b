//! # fcirdm: Reduced Density Matrices of Full Configuration-Interaction Wavefunctions
//!
//! fcirdm computes one- and two-particle reduced density matrices (1-RDMs and 2-RDMs) and their
//! transition analogues from full configuration-interaction (FCI) coefficient arrays. The
//! following are available:
//! - spin-free 1-RDMs and 2-RDMs of a single state, with a faster path for states whose
//!   coefficients are symmetric under alpha/beta exchange,
//! - spin-resolved (alpha-alpha, alpha-beta, beta-beta) 1-RDMs and 2-RDMs,
//! - spin-free and spin-resolved transition density matrices between two states, and
//! - direct 1-RDMs that skip the 2-RDM machinery entirely.
//!
//! ## Inputs
//!
//! The crate does not enumerate occupation strings. Callers supply, for each spin, a
//! single-excitation link index as a flat array of `(a, i, destination, sign)` quadruples, `nlink`
//! of them per source string, such that
//! $`\hat{a}^{\dagger}_a \hat{a}_i | \mathrm{source} \rangle = \mathrm{sign} | \mathrm{destination} \rangle`$.
//! FCI coefficients are flat arrays, row-major over (alpha string, beta string).
//!
//! ## Conventions
//!
//! Returned matrices are in the excitation-operator order:
//! - `rdm1[[p, q]]` $`= \langle \mathrm{bra} | \hat{a}^{\dagger}_p \hat{a}_q | \mathrm{ket} \rangle`$,
//! - `rdm2[[p, q, r, s]]`
//!   $`= \langle \mathrm{bra} | \hat{a}^{\dagger}_p \hat{a}_q \hat{a}^{\dagger}_r \hat{a}_s | \mathrm{ket} \rangle`$.
//!
//! [`rdm::reorder_rdm`] converts a 2-RDM into the normal-ordered convention.
//!
//! ## Parallelism and logging
//!
//! The 2-RDM construction is parallelised over alpha strings with
//! [rayon](https://docs.rs/rayon); the number of threads can be fixed through
//! [`drivers::rdm12::Rdm12Params`]. Progress is reported through the
//! [`log`](https://docs.rs/log) facade, with parameter and result summaries sent to the
//! `fcirdm-output` target.
//!
//! ## Examples and usage
//!
//! For most items (structs, enums, functions, and traits), their usages are illustrated in test
//! functions.
//!
//! ## License
//!
//! GNU Lesser General Public License v3.0.

pub mod drivers;
pub mod error;
mod io;
pub mod kernels;
pub mod link;
pub mod rdm;
pub mod rdm1;
pub mod t1;

#[cfg(test)]
mod test_fixtures;

pub use drivers::rdm12::{Rdm12Params, Rdm12Result};
pub use error::RdmError;
pub use kernels::KernelKind;
pub use link::{compact_links, CompactLinkTable, LinkIndex};
pub use rdm::{
    build_rdm1, build_rdm12, build_rdm12_with_params, build_transition_rdm12, make_rdm1,
    make_rdm12, make_rdm12_spin0, make_rdm12s, make_rdm1s, reorder_rdm, trans_rdm1, trans_rdm12,
    trans_rdm12s, trans_rdm1s,
};
pub use rdm1::Rdm1Kind;
