//! Fiber section aggregation, beam transformations and the triple product.

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use xfe_core::numeric::{triple_product, TripleProduct};
use xfe_core::sections::Fiber;
use xfe_core::{
    CrdTransf, Domain, ElasticMaterial, FiberSection, LinearCrdTransf2d, LinearCrdTransf3d, Node,
    SectionForceDeformation, Steel01,
};

fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> DMatrix<f64> {
    DMatrix::from_fn(rows, cols, |_, _| rng.gen_range(-1.0..1.0))
}

#[test]
fn test_two_fiber_section_stiffness() {
    println!("\n=== Two-fiber section ===");
    let (e, a) = (29_000.0, 2.5);
    for d in [0.1, 1.0, 7.5] {
        let s = FiberSection::plane(
            1,
            vec![
                Fiber::new(1, d, 0.0, a, ElasticMaterial::new(1, e)),
                Fiber::new(2, -d, 0.0, a, ElasticMaterial::new(2, e)),
            ],
        )
        .unwrap();
        let k = s.section_tangent();
        println!("  d = {d:5.2}  K = {k:.4}");
        assert_relative_eq!(k[(1, 1)], 2.0 * e * a * d * d, max_relative = 1e-14);
        assert_relative_eq!(k[(0, 0)], 2.0 * e * a, max_relative = 1e-14);
        assert_eq!(k[(0, 1)], 0.0);
        assert_eq!(k[(1, 0)], 0.0);
    }
}

#[test]
fn test_yielded_fibers_keep_the_section_consistent() {
    let fibers: Vec<Fiber> = (0..10)
        .map(|i| {
            let y = -0.45 + 0.1 * i as f64;
            Fiber::new(i, y, 0.0, 0.02, Steel01::new(i, 250.0, 200_000.0, 0.01))
        })
        .collect();
    let mut s = FiberSection::plane(1, fibers).unwrap();
    let kappa = 0.02;
    s.set_trial_section_deformation(&DVector::from_vec(vec![0.0, kappa]))
        .unwrap();
    let r = s.stress_resultant();
    let fibers = s.fibers();
    println!("N = {:.4}, Mz = {:.4}", r[0], r[1]);
    assert!(r[0].abs() < 1e-9);
    // Mz = −Σ σ·A·y
    assert_relative_eq!(r[1], -fibers.moment_z(0.0), max_relative = 1e-12);
    assert!(fibers.stress_max() <= 250.0 + 0.01 * 200_000.0 * kappa * 0.45);
    // outer fibers yielded: tangent well below the elastic one
    assert!(s.section_tangent()[(1, 1)] < 0.5 * s.initial_tangent()[(1, 1)]);
}

#[test]
fn test_initial_length_is_frozen_at_binding() {
    let mut d = Domain::new();
    d.add_node(Node::new(1, 3, &[1.0, 2.0])).unwrap();
    d.add_node(Node::new(2, 3, &[4.0, 6.0])).unwrap();
    d.add_node(Node::new(3, 6, &[0.0, 0.0, 0.0])).unwrap();
    d.add_node(Node::new(4, 6, &[2.0, 3.0, 6.0])).unwrap();

    let mut t2 = LinearCrdTransf2d::new(1);
    t2.initialize(d.node(1).unwrap(), d.node(2).unwrap()).unwrap();
    let mut t3 = LinearCrdTransf3d::new(2, [0.0, 0.0, 1.0]);
    t3.initialize(d.node(3).unwrap(), d.node(4).unwrap()).unwrap();
    assert_eq!(t2.initial_length(), 5.0);
    assert_eq!(t3.initial_length(), 7.0);

    d.set_trial_disp(2, &[3.0, -10.0, 0.4]).unwrap();
    d.set_trial_disp(4, &[-2.0, 1.0, 5.0, 0.1, 0.2, 0.3]).unwrap();
    t2.update(d.node(1).unwrap(), d.node(2).unwrap()).unwrap();
    t3.update(d.node(3).unwrap(), d.node(4).unwrap()).unwrap();
    assert_eq!(t2.initial_length(), 5.0);
    assert_eq!(t3.initial_length(), 7.0);
    assert_eq!(t2.deformed_length(), 5.0);
    assert_eq!(t3.deformed_length(), 7.0);
}

#[test]
fn test_global_stiffness_has_rigid_body_modes() {
    let mut d = Domain::new();
    d.add_node(Node::new(1, 3, &[0.0, 0.0])).unwrap();
    d.add_node(Node::new(2, 3, &[3.0, 4.0])).unwrap();
    let mut t = LinearCrdTransf2d::new(1);
    t.initialize(d.node(1).unwrap(), d.node(2).unwrap()).unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    let a = random_matrix(&mut rng, 3, 3);
    let kb = &a * a.transpose();
    let k = t.initial_global_stiff_matrix(&kb).unwrap();
    assert_relative_eq!(k, k.transpose(), epsilon = 1e-12);

    // translations and a rotation about node 1
    let modes = [
        [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0, -4.0, 3.0, 1.0],
    ];
    for m in modes {
        let f = &k * DVector::from_row_slice(&m);
        assert!(f.amax() < 1e-10 * k.amax(), "mode {m:?}: {f}");
    }
}

#[test]
fn test_triple_product_matches_naive_products() {
    let mut rng = StdRng::seed_from_u64(2024);
    for (m, n) in [(3, 6), (6, 12), (8, 24), (5, 5)] {
        let t = random_matrix(&mut rng, m, n);
        let a = random_matrix(&mut rng, m, m);
        let b = &a + a.transpose();
        let naive = t.transpose() * &b * &t;

        let mut out = random_matrix(&mut rng, n, n);
        let mut scratch = TripleProduct::default();
        scratch.add_to(&mut out, 0.0, &t, &b, 1.0).unwrap();
        let err = (&out - &naive).amax() / naive.amax();
        println!("  {m}x{n}: relative error {err:.2e}");
        assert!(err < 1e-10);
        assert_relative_eq!(triple_product(&t, &b).unwrap(), naive, max_relative = 1e-10, epsilon = 1e-12);

        // accumulation: out = 2·out − 0.5·TᵗBT
        let before = out.clone();
        scratch.add_to(&mut out, 2.0, &t, &b, -0.5).unwrap();
        assert_relative_eq!(out, &before * 2.0 - &naive * 0.5, max_relative = 1e-10, epsilon = 1e-12);
    }
}
