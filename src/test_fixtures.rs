//! Occupation-string spaces and wavefunctions for unit tests.

use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::link::LinkIndex;

/// All strings of `nelec` electrons in `norb` orbitals, with their single-excitation link index
/// in the `(a, i, destination, sign)` layout.
pub(crate) struct StringSpace {
    pub(crate) nstr: usize,
    pub(crate) nlink: usize,
    pub(crate) link_index: Vec<i32>,
}

impl StringSpace {
    pub(crate) fn new(norb: usize, nelec: usize) -> Self {
        let strings = (0..norb)
            .combinations(nelec)
            .map(|occ| occ.iter().fold(0u64, |acc, &p| acc | (1 << p)))
            .sorted()
            .collect::<Vec<_>>();
        let nstr = strings.len();
        let nlink = nelec + nelec * (norb - nelec);
        let addr = |s: u64| {
            i32::try_from(strings.binary_search(&s).expect("String not found."))
                .expect("Address does not fit.")
        };
        let orb = |p: usize| i32::try_from(p).expect("Orbital does not fit.");

        let mut link_index = Vec::with_capacity(nstr * nlink * 4);
        for &str0 in strings.iter() {
            let occ = (0..norb).filter(|&p| str0 & (1 << p) != 0).collect_vec();
            let vir = (0..norb).filter(|&p| str0 & (1 << p) == 0).collect_vec();
            for &i in occ.iter() {
                link_index.extend([orb(i), orb(i), addr(str0), 1]);
            }
            for (&i, &a) in occ.iter().cartesian_product(vir.iter()) {
                let str1 = (str0 ^ (1 << i)) | (1 << a);
                link_index.extend([orb(a), orb(i), addr(str1), excitation_sign(str0, i, a)]);
            }
        }
        Self {
            nstr,
            nlink,
            link_index,
        }
    }

    pub(crate) fn link(&self) -> LinkIndex<'_> {
        LinkIndex::new(&self.link_index, self.nstr, self.nlink)
    }
}

/// Fermionic phase of $`\hat{a}^{\dagger}_a \hat{a}_i`$ acting on `str0`.
fn excitation_sign(str0: u64, i: usize, a: usize) -> i32 {
    let below = |s: u64, p: usize| (s & ((1u64 << p) - 1)).count_ones();
    let removed = str0 & !(1 << i);
    if (below(str0, i) + below(removed, a)) % 2 == 0 {
        1
    } else {
        -1
    }
}

/// A normalised random coefficient array of `na × nb` determinants.
pub(crate) fn random_ci(na: usize, nb: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let ci = (0..na * nb)
        .map(|_| rng.gen_range(-0.5..0.5))
        .collect::<Vec<f64>>();
    normalised(ci)
}

/// A normalised random coefficient array symmetric under exchange of alpha and beta strings.
pub(crate) fn random_symmetric_ci(n: usize, seed: u64) -> Vec<f64> {
    let ci = random_ci(n, n, seed);
    let sym = (0..n)
        .cartesian_product(0..n)
        .map(|(i, j)| ci[i * n + j] + ci[j * n + i])
        .collect::<Vec<_>>();
    normalised(sym)
}

pub(crate) fn normalised(ci: Vec<f64>) -> Vec<f64> {
    let norm = ci.iter().map(|c| c * c).sum::<f64>().sqrt();
    ci.into_iter().map(|c| c / norm).collect()
}

/// Initialises test logging once per test binary.
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
