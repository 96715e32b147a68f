//! Elastic/plastic boundary of the J2 return mapping.

use nalgebra::{DVector, Matrix3};
use xfe_core::materials::nd::ReturnMappingInfo;
use xfe_core::numeric::tensor::{deviator, root23, tensor_norm};
use xfe_core::{J2Params, J2Plasticity, NdMaterial, NdMode};

const E: f64 = 210_000.0;
const NU: f64 = 0.3;

fn params() -> J2Params {
    J2Params {
        bulk: E / (3.0 * (1.0 - 2.0 * NU)),
        shear: E / (2.0 * (1.0 + NU)),
        sigma_0: 235.0,
        sigma_infty: 360.0,
        delta: 20.0,
        hard: 800.0,
        eta: 0.0,
        rho: 0.0,
    }
}

fn uniaxial(e: f64) -> DVector<f64> {
    DVector::from_vec(vec![e, -NU * e, -NU * e, 0.0, 0.0, 0.0])
}

fn report(label: &str, m: &J2Plasticity) {
    let ReturnMappingInfo {
        plastic,
        gamma,
        iterations,
        residual,
    } = m.return_mapping_info();
    println!(
        "  {label:<12} plastic={plastic:<5} gamma={gamma:.3e} iterations={iterations} residual={residual:.2e} xi={:.3e}",
        m.xi()
    );
}

#[test]
fn test_elastic_increments_leave_internal_variables_untouched() {
    println!("\n=== J2 elastic steps ===");
    let mut m = J2Plasticity::new(1, NdMode::ThreeDimensional, params()).unwrap();

    // virgin material: below σ0
    let eps_y = params().sigma_0 / E;
    for f in [0.1, 0.5, 0.9, -0.9] {
        m.set_trial_strain(&uniaxial(f * eps_y), 0.0).unwrap();
        report("virgin", &m);
        assert!(!m.return_mapping_info().plastic);
        assert_eq!(*m.plastic_strain(), Matrix3::zeros());
        assert_eq!(m.xi(), 0.0);
    }

    // after hardening: elastic unloading keeps εp and ξ bit for bit
    m.set_trial_strain(&uniaxial(6e-3), 0.0).unwrap();
    m.commit_state().unwrap();
    let (ep, xi) = (*m.plastic_strain(), m.xi());
    assert!(xi > 0.0);
    for back in [1e-5, 1e-4, 5e-4] {
        m.set_trial_strain(&uniaxial(6e-3 - back), 0.0).unwrap();
        report("unloading", &m);
        assert!(!m.return_mapping_info().plastic);
        assert_eq!(*m.plastic_strain(), ep);
        assert_eq!(m.xi().to_bits(), xi.to_bits());

        let (dev, _) = deviator(m.stress_tensor());
        assert!(tensor_norm(&dev) < root23() * m.params.q(xi));
    }
}

#[test]
fn test_plastic_increments_converge_to_the_yield_surface() {
    println!("\n=== J2 plastic steps ===");
    let tol = 1e-8 * params().sigma_0;
    for mode in [NdMode::ThreeDimensional, NdMode::PlaneStrain] {
        let mut m = J2Plasticity::new(1, mode, params()).unwrap();
        assert_eq!(m.tolerance(), tol);
        for k in 1..=8 {
            let e = k as f64 * 2e-3;
            let strain = match mode {
                NdMode::ThreeDimensional => uniaxial(e),
                _ => DVector::from_vec(vec![e, -0.5 * e, 0.3 * e]),
            };
            let warning = m.set_trial_strain(&strain, 0.0).unwrap();
            report(&format!("{mode} {k}"), &m);
            assert!(warning.is_none());
            let info = m.return_mapping_info();
            assert!(info.plastic);
            assert!(info.residual < tol, "{mode}: |r(γ)| = {}", info.residual);

            let (dev, _) = deviator(m.stress_tensor());
            let radius = root23() * m.params.q(m.xi());
            assert!((tensor_norm(&dev) - radius).abs() <= 1e-6 * radius);
            m.commit_state().unwrap();
        }
    }
}

#[test]
fn test_zero_normal_stress_modes() {
    println!("\n=== J2 plane stress / plate fiber ===");
    let cases = [
        (NdMode::PlaneStress, DVector::from_vec(vec![6e-3, 1e-3, 2e-3])),
        (NdMode::PlateFiber, DVector::from_vec(vec![6e-3, 1e-3, 2e-3, 1e-4, -1e-4])),
    ];
    for (mode, strain) in cases {
        let mut m = J2Plasticity::new(1, mode, params()).unwrap();
        assert_eq!(m.order(), strain.len());
        m.set_trial_strain(&strain, 0.0).unwrap();
        report(&mode.to_string(), &m);
        let s33 = m.stress_tensor()[(2, 2)];
        println!("    sigma33 = {s33:.3e}");
        assert!(s33.abs() <= 1e-8 * params().sigma_0 * 10.0);
        assert!(m.return_mapping_info().plastic);
        assert_eq!(m.tangent().nrows(), strain.len());
    }
}
