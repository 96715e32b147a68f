//! Element state determination through the public driver API.
//!
//! One domain carries a 2D frame, a 3D beam, a flat shell and a nonlinear
//! zero-length link, all updated together.

use xfe_core::elements::{ElasticSection3d, Spring};
use xfe_core::state::{revert_elements_to_start, set_domain_elements};
use xfe_core::{
    commit_elements, revert_elements, update_elements, Beam2d02, Domain, DynamicElement, ElasticBeam2d,
    ElasticBeam3d, ElasticMaterial, ElasticMembranePlateSection, Element, ElementLoad, FeError,
    LinearCrdTransf2d, LinearCrdTransf3d, Node, ShellQuad4, Snapshot, StateDeterminationConfig, Steel01,
    ZeroLength, DEAD_SRF,
};

fn model() -> (Domain, Vec<DynamicElement>) {
    let mut d = Domain::new();
    // 2D frame
    d.add_node(Node::new(1, 3, &[0.0, 0.0])).unwrap();
    d.add_node(Node::new(2, 3, &[0.0, 3.0])).unwrap();
    d.add_node(Node::new(3, 3, &[4.0, 3.0])).unwrap();
    // 3D nodes: beam 10-11, shell 10-13, link 14-15
    d.add_node(Node::new(10, 6, &[0.0, 0.0, 0.0])).unwrap();
    d.add_node(Node::new(11, 6, &[2.0, 0.0, 0.0])).unwrap();
    d.add_node(Node::new(12, 6, &[2.0, 1.5, 0.0])).unwrap();
    d.add_node(Node::new(13, 6, &[0.2, 1.6, 0.1])).unwrap();
    d.add_node(Node::new(14, 6, &[2.0, 1.5, 0.0])).unwrap();
    d.add_node(Node::new(15, 6, &[2.0, 1.5, 0.0])).unwrap();

    let section = ElasticSection3d {
        a: 0.01,
        e: 200e9,
        g: 80e9,
        j: 2e-5,
        iy: 1e-5,
        iz: 2e-5,
    };
    let plate = ElasticMembranePlateSection::new(1, 30e9, 0.2, 0.15, 2400.0).unwrap();
    let link = ZeroLength::new(
        30,
        3,
        [14, 15],
        [1.0, 1.0, 0.0],
        [-1.0, 1.0, 0.0],
        vec![
            Spring::new(Steel01::new(1, 1e3, 1e6, 0.05), 0),
            Spring::new(Steel01::new(2, 2e3, 1e6, 0.05), 1),
            Spring::new(ElasticMaterial::new(3, 5e5), 5),
        ],
    )
    .unwrap();

    let elements: Vec<DynamicElement> = vec![
        ElasticBeam2d::new(1, [1, 2], 0.02, 30e9, 2e-4, LinearCrdTransf2d::new(1))
            .with_rho(100.0)
            .into(),
        Beam2d02::new(2, [2, 3], 0.02, 30e9, 2e-4, LinearCrdTransf2d::p_delta(2)).into(),
        ElasticBeam3d::new(10, [10, 11], section, LinearCrdTransf3d::new(10, [0.0, 0.0, 1.0])).into(),
        ShellQuad4::new(20, [11, 12, 13, 10], &plate).into(),
        link.into(),
    ];
    (d, elements)
}

fn apply_step(d: &mut Domain, s: f64) {
    d.set_trial_disp(2, &[2e-3 * s, -1e-4 * s, 5e-4 * s]).unwrap();
    d.set_trial_disp(3, &[2.1e-3 * s, -3e-3 * s, -2e-4 * s]).unwrap();
    d.set_trial_disp(11, &[1e-4 * s, 2e-3 * s, -1e-3 * s, 1e-4 * s, 3e-4 * s, 1e-3 * s])
        .unwrap();
    d.set_trial_disp(12, &[2e-4 * s, 1e-3 * s, 4e-3 * s, -2e-4 * s, 0.0, 0.0])
        .unwrap();
    d.set_trial_disp(15, &[3e-3 * s, -1e-3 * s, 0.0, 0.0, 0.0, 2e-3 * s])
        .unwrap();
}

fn forces(elements: &[DynamicElement]) -> Vec<Vec<f64>> {
    elements
        .iter()
        .map(|e| e.resisting_force().unwrap().as_slice().to_vec())
        .collect()
}

#[test]
fn test_queries_need_binding_and_update() {
    let (d, mut elements) = model();
    for e in elements.iter_mut() {
        assert!(matches!(e.resisting_force(), Err(FeError::State(_))), "{}", e.type_name());
        e.set_domain(&d).unwrap();
        assert!(matches!(e.tangent_stiff(), Err(FeError::State(_))), "{}", e.type_name());
        assert!(matches!(e.resisting_force(), Err(FeError::State(_))), "{}", e.type_name());
        e.update(&d).unwrap();
        assert_eq!(e.resisting_force().unwrap().len(), e.num_dof());
    }

    let mut orphan = ElasticBeam2d::new(9, [1, 99], 1.0, 1.0, 1.0, LinearCrdTransf2d::new(9));
    assert!(matches!(orphan.set_domain(&d), Err(FeError::Configuration(_))));
    // 2D beam on 6-DOF nodes
    let mut wrong = ElasticBeam2d::new(8, [10, 11], 1.0, 1.0, 1.0, LinearCrdTransf2d::new(8));
    assert!(matches!(wrong.set_domain(&d), Err(FeError::Configuration(_))));
}

#[test]
fn test_update_is_idempotent() {
    let (mut d, mut elements) = model();
    let config = StateDeterminationConfig::default();
    set_domain_elements(&mut elements, &d).unwrap();
    apply_step(&mut d, 1.0);

    update_elements(&mut elements, &d, &config).unwrap();
    let first: Vec<_> = elements
        .iter_mut()
        .map(|e| (e.resisting_force().unwrap(), e.tangent_stiff().unwrap()))
        .collect();
    update_elements(&mut elements, &d, &config).unwrap();
    for (e, (p, k)) in elements.iter_mut().zip(first) {
        println!("{:>14}: |p| = {:.4e}", e.type_name(), p.norm());
        assert_eq!(e.resisting_force().unwrap(), p, "{}", e.type_name());
        assert_eq!(e.tangent_stiff().unwrap(), k, "{}", e.type_name());
    }
}

#[test]
fn test_revert_returns_to_the_committed_forces() {
    println!("\n=== Commit / revert cycle ===");
    let (mut d, mut elements) = model();
    let config = StateDeterminationConfig::default();
    set_domain_elements(&mut elements, &d).unwrap();

    apply_step(&mut d, 1.0);
    update_elements(&mut elements, &d, &config).unwrap();
    commit_elements(&mut elements, &config).unwrap();
    d.commit();
    let committed = forces(&elements);

    // a trial step far into the nonlinear range of the link
    apply_step(&mut d, 25.0);
    update_elements(&mut elements, &d, &config).unwrap();
    assert_ne!(forces(&elements), committed);

    d.revert_to_last_commit();
    revert_elements(&mut elements, &config).unwrap();
    assert_eq!(forces(&elements), committed);

    // re-running the committed step reproduces the same forces
    update_elements(&mut elements, &d, &config).unwrap();
    assert_eq!(forces(&elements), committed);

    revert_elements_to_start(&mut elements, &config).unwrap();
    d.revert_to_start();
    update_elements(&mut elements, &d, &config).unwrap();
    for p in forces(&elements) {
        assert!(p.iter().all(|&f| f == 0.0));
    }
}

#[test]
fn test_snapshot_restores_a_trial_step() {
    let (mut d, mut elements) = model();
    let config = StateDeterminationConfig {
        parallel: false,
        verbose: true,
    };
    set_domain_elements(&mut elements, &d).unwrap();
    apply_step(&mut d, 10.0);
    update_elements(&mut elements, &d, &config).unwrap();
    commit_elements(&mut elements, &config).unwrap();
    d.commit();
    apply_step(&mut d, 12.0);
    update_elements(&mut elements, &d, &config).unwrap();

    let json = elements.to_json().unwrap();
    println!("snapshot: {} bytes", json.len());
    let mut restored = Vec::<DynamicElement>::from_json(&json).unwrap();
    assert_eq!(restored, elements);
    assert_eq!(forces(&restored), forces(&elements));
    for (r, e) in restored.iter_mut().zip(elements.iter_mut()) {
        assert_eq!(r.tangent_stiff().unwrap(), e.tangent_stiff().unwrap());
    }

    // restored elements keep iterating like the originals
    revert_elements(&mut restored, &config).unwrap();
    revert_elements(&mut elements, &config).unwrap();
    assert_eq!(forces(&restored), forces(&elements));
}

#[test]
fn test_killed_elements_carry_residual_stiffness() {
    let (mut d, mut elements) = model();
    let config = StateDeterminationConfig::default();
    set_domain_elements(&mut elements, &d).unwrap();
    apply_step(&mut d, 1.0);
    update_elements(&mut elements, &d, &config).unwrap();

    for e in elements.iter_mut() {
        let p = e.resisting_force().unwrap();
        let k = e.tangent_stiff().unwrap();
        e.kill();
        assert!(!e.is_alive());
        let pk = e.resisting_force().unwrap();
        let kk = e.tangent_stiff().unwrap();
        for i in 0..p.len() {
            assert!((pk[i] - DEAD_SRF * p[i]).abs() <= 1e-12 * p.amax().max(1.0), "{}", e.type_name());
        }
        assert!((&kk - &k * DEAD_SRF).amax() <= 1e-12 * kk.amax().max(1.0));
        e.revive();
    }

    // loads on a killed beam are dropped
    let beam = &mut elements[0];
    beam.zero_load();
    let unloaded = beam.resisting_force().unwrap();
    beam.kill();
    beam.add_load(&ElementLoad::BeamUniform2d { wt: -5e3, wa: 0.0 }, 1.0)
        .unwrap();
    beam.revive();
    assert_eq!(beam.resisting_force().unwrap(), unloaded);

    beam.add_load(&ElementLoad::BeamUniform2d { wt: -5e3, wa: 0.0 }, 1.0)
        .unwrap();
    let loaded = beam.resisting_force().unwrap();
    println!("fixed-end shear at node 1: {:.1}", loaded[0] - unloaded[0]);
    assert_ne!(loaded, unloaded);
}

/// Global displacement vector of `e`, stacked from its nodes' trial displacements.
fn element_disp(e: &DynamicElement, d: &Domain) -> Vec<f64> {
    e.external_nodes()
        .iter()
        .flat_map(|&t| d.node(t).unwrap().trial_disp().iter().copied().collect::<Vec<_>>())
        .collect()
}

#[test]
fn test_linear_elements_satisfy_k_times_u() {
    println!("\n=== K u = p for linear elements ===");
    let (mut d, _) = model();
    let section = ElasticSection3d {
        a: 0.01,
        e: 200e9,
        g: 80e9,
        j: 2e-5,
        iy: 1e-5,
        iz: 2e-5,
    };
    let plate = ElasticMembranePlateSection::new(1, 30e9, 0.2, 0.15, 2400.0).unwrap();
    let link = ZeroLength::new(
        30,
        3,
        [14, 15],
        [1.0, 1.0, 0.0],
        [-1.0, 1.0, 0.0],
        vec![
            Spring::new(ElasticMaterial::new(1, 1e6), 0),
            Spring::new(ElasticMaterial::new(2, 2e6), 1),
            Spring::new(ElasticMaterial::new(3, 5e5), 5),
        ],
    )
    .unwrap();
    let mut elements: Vec<DynamicElement> = vec![
        ElasticBeam2d::new(1, [1, 2], 0.02, 30e9, 2e-4, LinearCrdTransf2d::new(1)).into(),
        Beam2d02::new(2, [2, 3], 0.02, 30e9, 2e-4, LinearCrdTransf2d::new(2)).into(),
        ElasticBeam3d::new(10, [10, 11], section, LinearCrdTransf3d::new(10, [0.0, 0.0, 1.0])).into(),
        ShellQuad4::new(20, [11, 12, 13, 10], &plate).into(),
        link.into(),
    ];
    set_domain_elements(&mut elements, &d).unwrap();
    apply_step(&mut d, 1.0);
    d.set_trial_disp(1, &[-4e-4, 1e-4, 2e-4]).unwrap();
    d.set_trial_disp(13, &[-1e-4, 5e-4, -2e-3, 3e-4, -1e-4, 2e-4])
        .unwrap();
    d.set_trial_disp(14, &[1e-3, 2e-3, 0.0, 0.0, 0.0, -1e-3])
        .unwrap();
    update_elements(&mut elements, &d, &StateDeterminationConfig::default()).unwrap();

    for e in elements.iter_mut() {
        let u = nalgebra::DVector::from_vec(element_disp(e, &d));
        let k = e.tangent_stiff().unwrap();
        let p = e.resisting_force().unwrap();
        assert!(p.norm() > 0.0, "{}", e.type_name());
        let residual = (&k * &u - &p).norm() / p.norm();
        let asym = (&k - k.transpose()).amax() / k.amax();
        println!("{:>14}: |Ku - p|/|p| = {residual:.3e}, asym = {asym:.3e}", e.type_name());
        assert!(residual < 1e-10, "{}", e.type_name());
        assert!(asym < 1e-12, "{}", e.type_name());
    }
}

#[test]
fn test_zero_length_rejects_mixed_coordinate_dimensions() {
    let mut d = Domain::new();
    d.add_node(Node::new(1, 3, &[1.0, 2.0])).unwrap();
    d.add_node(Node::new(2, 3, &[1.0, 2.0, 0.0])).unwrap();
    let mut link = ZeroLength::new(
        7,
        2,
        [1, 2],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        vec![Spring::new(ElasticMaterial::new(1, 1e3), 0)],
    )
    .unwrap();
    assert!(matches!(link.set_domain(&d), Err(FeError::DimensionMismatch { .. })));
    assert!(matches!(link.update(&d), Err(FeError::State(_))));
}
