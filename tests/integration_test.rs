use approx::assert_abs_diff_eq;
use ndarray::{array, Array2, Array4};

use fcirdm::{
    build_rdm1, build_rdm12, build_transition_rdm12, compact_links, make_rdm1, make_rdm12,
    make_rdm12s, reorder_rdm, trans_rdm12s, KernelKind, LinkIndex, Rdm1Kind, RdmError,
};

#[rustfmt::skip]
const TWO_ORBITAL_LINKS: [i32; 16] = [
    0, 0, 0,  1,
    1, 0, 1, -1,
    1, 1, 1,  1,
    0, 1, 0, -1,
];

/// Link index of one electron in `norb` orbitals: string `s` has its electron in orbital `s`.
fn one_electron_links(norb: usize) -> Vec<i32> {
    (0..norb)
        .flat_map(|i| {
            let diagonal = [i, i, i, 1];
            let excitations = (0..norb)
                .filter(move |&a| a != i)
                .flat_map(move |a| [a, i, a, 1]);
            diagonal.into_iter().chain(excitations)
        })
        .map(|x| x as i32)
        .collect()
}

#[test]
fn test_single_determinant_scenario() {
    let link = LinkIndex::new(&TWO_ORBITAL_LINKS, 2, 2);
    let ci = [1.0, 0.0, 0.0, 0.0];
    let ((dm1a, dm1b), (_, dm2ab, _)) = make_rdm12s(&ci, 2, link, link).unwrap();
    assert_abs_diff_eq!(dm1a, array![[1.0, 0.0], [0.0, 0.0]], epsilon = 1e-14);
    assert_abs_diff_eq!(dm1b, array![[1.0, 0.0], [0.0, 0.0]], epsilon = 1e-14);
    for ((p, q, r, s), &x) in dm2ab.indexed_iter() {
        let expected = if (p, q, r, s) == (0, 0, 0, 0) { 1.0 } else { 0.0 };
        assert_abs_diff_eq!(x, expected, epsilon = 1e-14);
    }
}

#[test]
fn test_open_shell_scenario() {
    let link = LinkIndex::new(&TWO_ORBITAL_LINKS, 2, 2);
    let norm = 2.0_f64.sqrt();
    let ci = [0.0, 1.0 / norm, -1.0 / norm, 0.0];
    let (rdm1, _) = make_rdm12(&ci, 2, link, link).unwrap();
    assert_abs_diff_eq!(rdm1.diag().sum(), 2.0, epsilon = 1e-14);
    assert_abs_diff_eq!(rdm1, rdm1.t(), epsilon = 1e-14);
    assert_abs_diff_eq!(make_rdm1(&ci, 2, link, link).unwrap(), rdm1, epsilon = 1e-14);
}

#[test]
fn test_one_electron_in_three_orbitals() {
    let links = one_electron_links(3);
    let alpha = LinkIndex::new(&links, 3, 3);
    let beta = LinkIndex::new(&[], 1, 0);
    let ci = [0.6, 0.0, 0.8];

    let dm1 = build_rdm1(Rdm1Kind::Alpha, &ci, &ci, 3, alpha, beta).unwrap();
    let expected = array![[0.36, 0.0, 0.48], [0.0, 0.0, 0.0], [0.48, 0.0, 0.64]];
    assert_abs_diff_eq!(dm1, expected, epsilon = 1e-14);

    // A single electron has no pair density once the operators are normal-ordered.
    let (rdm1, rdm2) = build_rdm12(KernelKind::Ms0, &ci, &ci, 3, alpha, beta, true).unwrap();
    assert_abs_diff_eq!(rdm1, expected, epsilon = 1e-14);
    let (_, rdm2) = reorder_rdm(rdm1, rdm2).unwrap();
    assert_abs_diff_eq!(rdm2, Array4::<f64>::zeros((3, 3, 3, 3)), epsilon = 1e-14);
}

#[test]
fn test_transition_between_orthogonal_determinants() {
    let link = LinkIndex::new(&TWO_ORBITAL_LINKS, 2, 2);
    let ket = [1.0, 0.0, 0.0, 0.0];
    let bra = [0.0, 0.0, 1.0, 0.0];
    let (rdm1, _) = build_transition_rdm12(KernelKind::TransitionMs0, &bra, &ket, 2, link).unwrap();
    assert_abs_diff_eq!(rdm1, array![[0.0, 0.0], [-1.0, 0.0]], epsilon = 1e-14);

    let ((tdm1a, tdm1b), (_, dm2ab, dm2ba, _)) = trans_rdm12s(&bra, &ket, 2, link, link).unwrap();
    assert_abs_diff_eq!(tdm1a, rdm1, epsilon = 1e-14);
    assert_abs_diff_eq!(tdm1b, Array2::<f64>::zeros((2, 2)), epsilon = 1e-14);
    // ⟨bra| 1⁺α 0α 0⁺β 0β |ket⟩ = -1.
    assert_abs_diff_eq!(dm2ab[[1, 0, 0, 0]], -1.0, epsilon = 1e-14);
    assert_abs_diff_eq!(dm2ba[[0, 0, 1, 0]], -1.0, epsilon = 1e-14);
}

#[test]
fn test_malformed_link_index() {
    let mut links = TWO_ORBITAL_LINKS;
    links[3] = 0;
    let err = compact_links(&links, 2, 2, 2).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RdmError>(),
        Some(RdmError::ContractViolation(_))
    ));

    let err = compact_links(&TWO_ORBITAL_LINKS[..12], 2, 2, 2).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RdmError>(),
        Some(RdmError::ContractViolation(_))
    ));

    let table = compact_links(&TWO_ORBITAL_LINKS, 2, 2, 2).unwrap();
    assert_eq!(table.excitations(1)[1].a(), 0);
    assert_eq!(table.excitations(1)[1].i(), 1);
    assert_eq!(table.excitations(1)[1].sign(), -1);
}
