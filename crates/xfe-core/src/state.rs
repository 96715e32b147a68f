//! Domain-level state determination.
//!
//! Elements own all of their scratch state, so a step's `update` can run over
//! the element list in parallel with rayon. Results are gathered back in
//! element order: the first failing element (by position) decides the error,
//! and convergence warnings are reported in element order.

use crate::domain::Domain;
use crate::elements::Element;
use crate::error::{ConvergenceWarning, Result, StepResult};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Options for the update/commit/revert drivers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateDeterminationConfig {
    /// Run element operations on the rayon thread pool
    pub parallel: bool,
    /// Log a summary line per driver call at `info` level
    pub verbose: bool,
}

impl Default for StateDeterminationConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            verbose: false,
        }
    }
}

fn run<E, F, T>(elements: &mut [E], config: &StateDeterminationConfig, op: F) -> Vec<Result<T>>
where
    E: Element + Send,
    F: Fn(&mut E) -> Result<T> + Sync + Send,
    T: Send,
{
    if config.parallel {
        elements.par_iter_mut().map(|e| op(e)).collect()
    } else {
        elements.iter_mut().map(op).collect()
    }
}

fn first_error<T>(results: Vec<Result<T>>) -> Result<Vec<T>> {
    results.into_iter().collect()
}

/// Bind every element to `domain`. Runs sequentially; binding happens once.
pub fn set_domain_elements<E: Element>(elements: &mut [E], domain: &Domain) -> Result<()> {
    for e in elements.iter_mut() {
        e.set_domain(domain)?;
    }
    debug!("bound {} elements to {} nodes", elements.len(), domain.num_nodes());
    Ok(())
}

/// Run `update` on every element against the current trial nodal state.
///
/// # Errors
/// The error of the first element (in slice order) whose update failed.
/// Elements after it may or may not have been updated.
pub fn update_elements<E: Element + Send>(
    elements: &mut [E],
    domain: &Domain,
    config: &StateDeterminationConfig,
) -> Result<Vec<ConvergenceWarning>> {
    let results: Vec<StepResult> = run(elements, config, |e| e.update(domain));
    let warnings: Vec<ConvergenceWarning> = first_error(results)?.into_iter().flatten().collect();
    for w in &warnings {
        warn!("{w}");
    }
    if config.verbose {
        info!(
            "updated {} elements ({} convergence warnings)",
            elements.len(),
            warnings.len()
        );
    }
    Ok(warnings)
}

pub fn commit_elements<E: Element + Send>(elements: &mut [E], config: &StateDeterminationConfig) -> Result<()> {
    first_error(run(elements, config, |e| e.commit_state()))?;
    if config.verbose {
        info!("committed {} elements", elements.len());
    }
    Ok(())
}

pub fn revert_elements<E: Element + Send>(elements: &mut [E], config: &StateDeterminationConfig) -> Result<()> {
    first_error(run(elements, config, |e| e.revert_to_last_commit()))?;
    debug!("reverted {} elements to last commit", elements.len());
    Ok(())
}

pub fn revert_elements_to_start<E: Element + Send>(
    elements: &mut [E],
    config: &StateDeterminationConfig,
) -> Result<()> {
    first_error(run(elements, config, |e| e.revert_to_start()))?;
    debug!("reverted {} elements to start", elements.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Node;
    use crate::elements::{DynamicElement, ElasticBeam2d};
    use crate::error::FeError;
    use crate::transforms::LinearCrdTransf2d;

    /// A chain of `n` beams along x.
    fn chain(n: usize) -> (Domain, Vec<DynamicElement>) {
        let mut d = Domain::new();
        for k in 0..=n {
            d.add_node(Node::new(k as i32 + 1, 3, &[k as f64, 0.0])).unwrap();
        }
        let elems = (0..n)
            .map(|k| {
                let tag = k as i32 + 1;
                ElasticBeam2d::new(tag, [tag, tag + 1], 0.01, 200e9, 1e-5, LinearCrdTransf2d::new(tag)).into()
            })
            .collect();
        (d, elems)
    }

    fn forces(elems: &[DynamicElement]) -> Vec<f64> {
        elems
            .iter()
            .flat_map(|e| e.resisting_force().unwrap().iter().copied().collect::<Vec<_>>())
            .collect()
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let (mut d, mut par) = chain(16);
        let mut seq = par.clone();
        set_domain_elements(&mut par, &d).unwrap();
        set_domain_elements(&mut seq, &d).unwrap();
        for k in 1..=17 {
            let x = k as f64;
            d.set_trial_disp(k, &[1e-4 * x, 1e-3 * (0.3 * x).sin(), 1e-4 * x.cos()]).unwrap();
        }
        let sequential = StateDeterminationConfig {
            parallel: false,
            ..Default::default()
        };
        let w1 = update_elements(&mut par, &d, &StateDeterminationConfig::default()).unwrap();
        let w2 = update_elements(&mut seq, &d, &sequential).unwrap();
        assert!(w1.is_empty() && w2.is_empty());
        assert_eq!(forces(&par), forces(&seq));
    }

    #[test]
    fn first_failure_in_order_is_reported() {
        let (d, mut elems) = chain(4);
        set_domain_elements(&mut elems[..2], &d).unwrap();
        let err = update_elements(&mut elems, &d, &StateDeterminationConfig::default()).unwrap_err();
        println!("{err}");
        match err {
            FeError::State(msg) => assert!(msg.contains("element 3"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn revert_discards_the_trial_step() {
        let (mut d, mut elems) = chain(3);
        let config = StateDeterminationConfig::default();
        set_domain_elements(&mut elems, &d).unwrap();
        d.set_trial_disp(4, &[1e-3, 2e-3, 0.0]).unwrap();
        update_elements(&mut elems, &d, &config).unwrap();
        commit_elements(&mut elems, &config).unwrap();
        d.commit();
        let committed = forces(&elems);

        d.set_trial_disp(4, &[5e-3, -1e-3, 1e-3]).unwrap();
        update_elements(&mut elems, &d, &config).unwrap();
        assert_ne!(forces(&elems), committed);

        d.revert_to_last_commit();
        revert_elements(&mut elems, &config).unwrap();
        assert_eq!(forces(&elems), committed);

        revert_elements_to_start(&mut elems, &config).unwrap();
        d.revert_to_start();
        assert!(forces(&elems).iter().all(|&f| f == 0.0));
    }
}
