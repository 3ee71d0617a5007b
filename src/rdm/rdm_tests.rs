use approx::assert_abs_diff_eq;
use ndarray::{array, Array2, Array4};

use crate::drivers::rdm12::Rdm12Params;
use crate::error::RdmError;
use crate::kernels::{KernelKind, Ms0Kernel, TransitionMs0Kernel};
use crate::link::LinkIndex;
use crate::rdm::{
    build_rdm1, build_rdm12, build_rdm12_with_params, build_transition_rdm12, make_rdm1,
    make_rdm12, make_rdm12_spin0, make_rdm12s, make_rdm1s, reorder_rdm, trans_rdm1, trans_rdm12,
    trans_rdm12s, trans_rdm1s,
};
use crate::rdm1::Rdm1Kind;
use crate::test_fixtures::{init_logging, normalised, random_ci, random_symmetric_ci, StringSpace};

#[rustfmt::skip]
const TWO_ORBITAL_LINKS: [i32; 16] = [
    0, 0, 0,  1,
    1, 0, 1, -1,
    1, 1, 1,  1,
    0, 1, 0, -1,
];

/// `Σ_k rdm2[[p, q, k, k]]`.
fn partial_trace(rdm2: &Array4<f64>) -> Array2<f64> {
    let norb = rdm2.shape()[0];
    Array2::from_shape_fn((norb, norb), |(p, q)| {
        (0..norb).map(|k| rdm2[[p, q, k, k]]).sum()
    })
}

fn swap_spin_pairs(dm2ab: &Array4<f64>) -> Array4<f64> {
    dm2ab
        .view()
        .permuted_axes([2, 3, 0, 1])
        .as_standard_layout()
        .into_owned()
}

#[test]
fn test_two_orbital_single_determinant() {
    init_logging();
    let link = LinkIndex::new(&TWO_ORBITAL_LINKS, 2, 2);
    let ci = [1.0, 0.0, 0.0, 0.0];
    let ((dm1a, dm1b), (dm2aa, dm2ab, dm2bb)) = make_rdm12s(&ci, 2, link, link).unwrap();
    assert_abs_diff_eq!(dm1a, array![[1.0, 0.0], [0.0, 0.0]], epsilon = 1e-14);
    assert_abs_diff_eq!(dm1b, array![[1.0, 0.0], [0.0, 0.0]], epsilon = 1e-14);

    let mut expected_ab = Array4::<f64>::zeros((2, 2, 2, 2));
    expected_ab[[0, 0, 0, 0]] = 1.0;
    assert_abs_diff_eq!(dm2ab, expected_ab, epsilon = 1e-14);

    // One electron per spin: ⟨0⁺ 0 0⁺ 0⟩ = 1 and ⟨0⁺ 1 1⁺ 0⟩ = 1.
    for dm2 in [&dm2aa, &dm2bb] {
        assert_abs_diff_eq!(dm2[[0, 0, 0, 0]], 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(dm2[[0, 1, 1, 0]], 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(dm2.sum(), 2.0, epsilon = 1e-14);
    }
}

#[test]
fn test_two_orbital_open_shell_singlet() {
    let link = LinkIndex::new(&TWO_ORBITAL_LINKS, 2, 2);
    let ci = normalised(vec![0.0, 1.0, -1.0, 0.0]);
    let (rdm1, rdm2) = make_rdm12(&ci, 2, link, link).unwrap();
    assert_abs_diff_eq!(rdm1.diag().sum(), 2.0, epsilon = 1e-14);
    assert_abs_diff_eq!(rdm1, rdm1.t(), epsilon = 1e-14);
    assert_abs_diff_eq!(partial_trace(&rdm2), &rdm1 * 2.0, epsilon = 1e-14);
    assert_abs_diff_eq!(make_rdm1(&ci, 2, link, link).unwrap(), rdm1, epsilon = 1e-14);

    // This combination is symmetric under alpha/beta exchange.
    let symmetric = normalised(vec![0.0, 1.0, 1.0, 0.0]);
    let (rdm1_spin0, rdm2_spin0) = make_rdm12_spin0(&symmetric, 2, link).unwrap();
    let (rdm1_ms0, rdm2_ms0) = make_rdm12(&symmetric, 2, link, link).unwrap();
    assert_abs_diff_eq!(rdm1_spin0, rdm1_ms0, epsilon = 1e-14);
    assert_abs_diff_eq!(rdm2_spin0, rdm2_ms0, epsilon = 1e-14);
}

#[test]
fn test_make_rdm12_traces() {
    let alpha = StringSpace::new(5, 2);
    let beta = StringSpace::new(5, 1);
    let ci = random_ci(alpha.nstr, beta.nstr, 31);
    let (rdm1, rdm2) = make_rdm12(&ci, 5, alpha.link(), beta.link()).unwrap();
    assert_abs_diff_eq!(rdm1.diag().sum(), 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(rdm1, rdm1.t(), epsilon = 1e-14);
    assert_abs_diff_eq!(partial_trace(&rdm2), &rdm1 * 3.0, epsilon = 1e-12);

    let (rdm1, rdm2) = reorder_rdm(rdm1, rdm2).unwrap();
    assert_abs_diff_eq!(partial_trace(&rdm2), &rdm1 * 2.0, epsilon = 1e-12);
    let pair_count = (0..5)
        .flat_map(|p| (0..5).map(move |q| (p, q)))
        .map(|(p, q)| rdm2[[p, p, q, q]])
        .sum::<f64>();
    assert_abs_diff_eq!(pair_count, 6.0, epsilon = 1e-12);
}

#[test]
fn test_make_rdm12_invariant_to_tiling_and_workers() {
    let space = StringSpace::new(5, 2);
    let ci = random_ci(space.nstr, space.nstr, 32);
    let link = space.link();
    let (rdm1_ref, rdm2_ref) = make_rdm12(&ci, 5, link, link).unwrap();
    for block_size in [1, 7, space.nstr] {
        for num_threads in [Some(1), Some(3), None] {
            let params = Rdm12Params::builder()
                .block_size(block_size)
                .num_threads(num_threads)
                .build()
                .unwrap();
            let (rdm1, rdm2) =
                build_rdm12_with_params(Ms0Kernel, &ci, &ci, 5, link, link, &params).unwrap();
            assert_abs_diff_eq!(rdm1, rdm1_ref, epsilon = 1e-10);
            assert_abs_diff_eq!(rdm2, rdm2_ref, epsilon = 1e-10);
        }
    }
}

#[test]
fn test_make_rdm12_insensitive_to_prune_threshold() {
    let space = StringSpace::new(4, 2);
    let ci = random_ci(space.nstr, space.nstr, 33);
    let link = space.link();
    let (rdm1_ref, rdm2_ref) = make_rdm12(&ci, 4, link, link).unwrap();
    for prune_threshold in [0.0, 1e-20, 1e-14] {
        let params = Rdm12Params::builder()
            .prune_threshold(prune_threshold)
            .build()
            .unwrap();
        let (rdm1, rdm2) =
            build_rdm12_with_params(KernelKind::Ms0, &ci, &ci, 4, link, link, &params).unwrap();
        assert_abs_diff_eq!(rdm1, rdm1_ref, epsilon = 1e-10);
        assert_abs_diff_eq!(rdm2, rdm2_ref, epsilon = 1e-10);
    }
}

#[test]
fn test_make_rdm12_spin0_matches_ms0() {
    let space = StringSpace::new(5, 2);
    let ci = random_symmetric_ci(space.nstr, 34);
    let link = space.link();
    let (rdm1_ref, rdm2_ref) = make_rdm12(&ci, 5, link, link).unwrap();
    for block_size in [1, 3, 7, space.nstr] {
        let params = Rdm12Params::builder()
            .block_size(block_size)
            .build()
            .unwrap();
        let (rdm1, rdm2) =
            build_rdm12_with_params(KernelKind::Spin0, &ci, &ci, 5, link, link, &params).unwrap();
        assert_abs_diff_eq!(rdm1, rdm1_ref, epsilon = 1e-10);
        assert_abs_diff_eq!(rdm2, rdm2_ref, epsilon = 1e-10);
    }
    let (rdm1, rdm2) = make_rdm12_spin0(&ci, 5, link).unwrap();
    assert_abs_diff_eq!(rdm1, rdm1_ref, epsilon = 1e-10);
    assert_abs_diff_eq!(rdm2, rdm2_ref, epsilon = 1e-10);
}

#[test]
fn test_make_rdm12_spin0_rejects_unequal_spaces() {
    let alpha = StringSpace::new(4, 2);
    let beta = StringSpace::new(4, 1);
    let ci = random_ci(alpha.nstr, beta.nstr, 35);
    let err = build_rdm12(
        KernelKind::Spin0,
        &ci,
        &ci,
        4,
        alpha.link(),
        beta.link(),
        true,
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RdmError>(),
        Some(RdmError::ContractViolation(_))
    ));
}

#[test]
fn test_make_rdm12s_sums_to_spin_free() {
    let alpha = StringSpace::new(5, 2);
    let beta = StringSpace::new(5, 3);
    let ci = random_ci(alpha.nstr, beta.nstr, 36);
    let (rdm1, rdm2) = make_rdm12(&ci, 5, alpha.link(), beta.link()).unwrap();
    let ((dm1a, dm1b), (dm2aa, dm2ab, dm2bb)) =
        make_rdm12s(&ci, 5, alpha.link(), beta.link()).unwrap();

    assert_abs_diff_eq!(&dm1a + &dm1b, rdm1, epsilon = 1e-12);
    assert_abs_diff_eq!(dm1a.diag().sum(), 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(dm1b.diag().sum(), 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(
        &dm2aa + &dm2bb + &dm2ab + &swap_spin_pairs(&dm2ab),
        rdm2,
        epsilon = 1e-12
    );
    assert_abs_diff_eq!(partial_trace(&dm2ab), &dm1a * 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(partial_trace(&dm2aa), &dm1a * 2.0, epsilon = 1e-12);

    let (dm1a_direct, dm1b_direct) = make_rdm1s(&ci, 5, alpha.link(), beta.link()).unwrap();
    assert_abs_diff_eq!(dm1a_direct, dm1a, epsilon = 1e-12);
    assert_abs_diff_eq!(dm1b_direct, dm1b, epsilon = 1e-12);
}

#[test]
fn test_trans_rdm12_with_identical_states() {
    let space = StringSpace::new(4, 2);
    let ci = random_ci(space.nstr, space.nstr, 37);
    let link = space.link();
    let (rdm1_ref, rdm2_ref) = make_rdm12(&ci, 4, link, link).unwrap();
    let (rdm1, rdm2) = trans_rdm12(&ci, &ci, 4, link, link).unwrap();
    assert_abs_diff_eq!(rdm1, rdm1_ref, epsilon = 1e-12);
    assert_abs_diff_eq!(rdm2, rdm2_ref, epsilon = 1e-12);

    let (rdm1, rdm2) = build_transition_rdm12(TransitionMs0Kernel, &ci, &ci, 4, link).unwrap();
    assert_abs_diff_eq!(rdm1, rdm1_ref, epsilon = 1e-12);
    assert_abs_diff_eq!(rdm2, rdm2_ref, epsilon = 1e-12);
}

#[test]
fn test_trans_rdm12s_sums_to_spin_free() {
    let alpha = StringSpace::new(4, 2);
    let beta = StringSpace::new(4, 1);
    let bra = random_ci(alpha.nstr, beta.nstr, 38);
    let ket = random_ci(alpha.nstr, beta.nstr, 39);
    let (rdm1, rdm2) = trans_rdm12(&bra, &ket, 4, alpha.link(), beta.link()).unwrap();
    let ((dm1a, dm1b), (dm2aa, dm2ab, dm2ba, dm2bb)) =
        trans_rdm12s(&bra, &ket, 4, alpha.link(), beta.link()).unwrap();

    assert_abs_diff_eq!(&dm1a + &dm1b, rdm1, epsilon = 1e-12);
    assert_abs_diff_eq!(&dm2aa + &dm2ab + &dm2ba + &dm2bb, rdm2, epsilon = 1e-12);
    assert_abs_diff_eq!(dm2ba, swap_spin_pairs(&dm2ab), epsilon = 1e-14);

    let (tdm1a, tdm1b) = trans_rdm1s(&bra, &ket, 4, alpha.link(), beta.link()).unwrap();
    assert_abs_diff_eq!(tdm1a, dm1a, epsilon = 1e-12);
    assert_abs_diff_eq!(tdm1b, dm1b, epsilon = 1e-12);
    assert_abs_diff_eq!(
        trans_rdm1(&bra, &ket, 4, alpha.link(), beta.link()).unwrap(),
        rdm1,
        epsilon = 1e-12
    );

    // Exchanging bra and ket transposes the 1-RDM.
    let (rdm1_swapped, _) = trans_rdm12(&ket, &bra, 4, alpha.link(), beta.link()).unwrap();
    assert_abs_diff_eq!(rdm1_swapped, rdm1.t(), epsilon = 1e-12);
}

#[test]
fn test_build_rdm1_matches_driver() {
    let space = StringSpace::new(4, 2);
    let ci = random_ci(space.nstr, space.nstr, 40);
    let link = space.link();
    let (dm1a, _) = build_rdm12(KernelKind::Alpha, &ci, &ci, 4, link, link, true).unwrap();
    let (dm1b, _) = build_rdm12(KernelKind::Beta, &ci, &ci, 4, link, link, true).unwrap();
    assert_abs_diff_eq!(
        build_rdm1(Rdm1Kind::Alpha, &ci, &ci, 4, link, link).unwrap(),
        dm1a,
        epsilon = 1e-12
    );
    assert_abs_diff_eq!(
        build_rdm1(Rdm1Kind::Beta, &ci, &ci, 4, link, link).unwrap(),
        dm1b,
        epsilon = 1e-12
    );
}

#[test]
fn test_build_rdm12_unsymmetrised_keeps_upper_triangle() {
    let space = StringSpace::new(4, 2);
    let ci = random_ci(space.nstr, space.nstr, 41);
    let link = space.link();
    let (_, full) = build_rdm12(KernelKind::Ms0, &ci, &ci, 4, link, link, true).unwrap();
    let (_, upper) = build_rdm12(KernelKind::Ms0, &ci, &ci, 4, link, link, false).unwrap();
    // Element [p, q, r, s] is accumulated in row q·norb + p and column r·norb + s.
    assert_abs_diff_eq!(upper[[1, 0, 2, 3]], full[[1, 0, 2, 3]], epsilon = 1e-14);
    assert_eq!(upper[[2, 3, 1, 0]], 0.0);
    assert!(full[[2, 3, 1, 0]].abs() > 0.0);
}

#[test]
fn test_build_rdm12_rejects_bad_input() {
    let link = LinkIndex::new(&TWO_ORBITAL_LINKS, 2, 2);
    let ci = [1.0, 0.0, 0.0, 0.0];

    let params = Rdm12Params {
        prune_threshold: -1.0,
        ..Rdm12Params::default()
    };
    let err =
        build_rdm12_with_params(KernelKind::Ms0, &ci, &ci, 2, link, link, &params).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RdmError>(),
        Some(RdmError::InvalidParameters(_))
    ));

    let mut bad_links = TWO_ORBITAL_LINKS;
    bad_links[6] = 2;
    let bad_link = LinkIndex::new(&bad_links, 2, 2);
    let err = make_rdm12(&ci, 2, bad_link, link).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RdmError>(),
        Some(RdmError::ContractViolation(_))
    ));

    let err = trans_rdm12(&ci[..3], &ci, 2, link, link).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RdmError>(),
        Some(RdmError::ContractViolation(_))
    ));
}

#[test]
fn test_reorder_rdm_rejects_mismatched_shapes() {
    let rdm1 = Array2::<f64>::zeros((3, 3));
    let rdm2 = Array4::<f64>::zeros((2, 2, 2, 2));
    let err = reorder_rdm(rdm1, rdm2).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RdmError>(),
        Some(RdmError::ContractViolation(_))
    ));
}
