//! SQUAREM acceleration of the EM fixed-point iteration.
//!
//! Each iteration performs two EM updates, extrapolates along the squared
//! difference of the iterates and keeps the extrapolation only if it doesn't
//! degrade the expected log-likelihood by more than a tolerance. Step length
//! bounds grow when extrapolation succeeds at the bound and shrink back when it
//! fails. See Varadhan & Roland, Scand. J. Statist. 35 (2008).

/* std use */
use std::mem::swap;

/* crate use */
use rayon::prelude::*;

/* project use */
use crate::em;
use crate::likelihood;
use crate::model::Model;
use crate::numeric;
use crate::options::SquaremParams;

/// Summary of one accelerator iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    /// Step length used, 1 if extrapolation was rejected
    pub alpha: f64,
    /// L1 distance between the two EM iterates
    pub delta: f64,
    /// Negative expected log-likelihood of the accepted point
    pub neg_log_likelihood: f64,
    pub accepted: bool,
    pub stabilized: bool,
}

/// Accelerator state, owns the current estimate and its work buffers
#[derive(Debug, Clone)]
pub struct Squarem {
    params: SquaremParams,
    min_step: f64,
    max_step: f64,
    neg_log_likelihood: f64,
    theta0: Vec<f64>,
    theta1: Vec<f64>,
    theta2: Vec<f64>,
    prime: Vec<f64>,
    r: Vec<f64>,
    v: Vec<f64>,
}

impl Squarem {
    /// Start from estimate `theta0`
    pub fn new(params: SquaremParams, theta0: Vec<f64>) -> Self {
        let len = theta0.len();

        Self {
            min_step: params.min_step0,
            max_step: params.max_step0,
            params,
            neg_log_likelihood: f64::INFINITY,
            theta0,
            theta1: vec![0.0; len],
            theta2: vec![0.0; len],
            prime: vec![0.0; len],
            r: vec![0.0; len],
            v: vec![0.0; len],
        }
    }

    /// Current estimate
    pub fn theta(&self) -> &[f64] {
        &self.theta0
    }

    /// Consume the state and return the current estimate
    pub fn into_theta(self) -> Vec<f64> {
        self.theta0
    }

    /// Current lower bound of the step length
    pub fn min_step(&self) -> f64 {
        self.min_step
    }

    /// Current upper bound of the step length
    pub fn max_step(&self) -> f64 {
        self.max_step
    }

    /// Perform one iteration, the accepted point becomes the current estimate
    pub fn step(&mut self, model: &Model) -> Step {
        em::update(model, &self.theta0, &mut self.theta1);

        if !self.neg_log_likelihood.is_finite() {
            self.neg_log_likelihood = -likelihood::expected_log_likelihood(model, &self.theta0);
        }

        em::update(model, &self.theta1, &mut self.theta2);

        let delta = numeric::abs_diff(&self.theta1, &self.theta2);

        // r = theta1 - theta0, v = (theta2 - theta1) - r
        self.r
            .par_iter_mut()
            .zip(self.v.par_iter_mut())
            .enumerate()
            .for_each(|(i, (r, v))| {
                *r = self.theta1[i] - self.theta0[i];
                *v = (self.theta2[i] - self.theta1[i]) - *r;
            });

        let r_norm = numeric::norm(&self.r);
        let v_norm = numeric::norm(&self.v);
        let ratio = r_norm / v_norm;

        let extrapolated = v_norm > 0.0 && ratio.is_finite();
        let mut stabilized = false;
        let mut alpha = if extrapolated {
            let alpha = ratio.min(self.max_step).max(self.min_step);

            let (theta0, r, v) = (&self.theta0, &self.r, &self.v);
            self.prime
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, prime)| {
                    *prime = (theta0[i] + 2.0 * alpha * r[i] + alpha * alpha * v[i]).max(0.0);
                });

            if (alpha - 1.0).abs() > self.params.stabilization {
                log::debug!("alpha = {}, performing a stabilization step", alpha);

                // theta1 isn't needed anymore and serve as buffer
                em::update(model, &self.prime, &mut self.theta1);
                swap(&mut self.prime, &mut self.theta1);
                stabilized = true;
            }

            alpha
        } else {
            // second difference vanish, EM iterates have converged
            self.prime.copy_from_slice(&self.theta2);
            1.0
        };

        let mut neg_log_likelihood = if self.params.nonmonotonicity.is_finite() {
            -likelihood::expected_log_likelihood(model, &self.prime)
        } else {
            self.neg_log_likelihood
        };

        let accepted =
            !(neg_log_likelihood > self.neg_log_likelihood + self.params.nonmonotonicity);

        if accepted && extrapolated {
            if alpha == self.max_step {
                self.max_step *= self.params.m_step;
            }
            if self.min_step < 0.0 && alpha == self.min_step {
                self.min_step *= self.params.m_step;
            }
        } else if !accepted {
            swap(&mut self.prime, &mut self.theta2);
            neg_log_likelihood = -likelihood::expected_log_likelihood(model, &self.prime);

            if extrapolated && alpha == self.max_step {
                self.max_step = self.params.max_step0.max(self.max_step / self.params.m_step);
            }
            alpha = 1.0;
        }

        swap(&mut self.prime, &mut self.theta0);

        if !neg_log_likelihood.is_nan() {
            self.neg_log_likelihood = neg_log_likelihood;
        }

        Step {
            alpha,
            delta,
            neg_log_likelihood: self.neg_log_likelihood,
            accepted,
            stabilized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rustc_hash::FxHashSet;

    use crate::input::CountTable;
    use crate::options::Options;

    /// t0 share a group of 30 with t1, t1 has a unique group of 10
    fn two_transcripts() -> Model {
        let counts = CountTable::new(vec![30, 10], 1, 50.0);
        let lut = vec![vec![0, 1], vec![1]];

        crate::collapse::build(
            &counts,
            &lut,
            &[100, 100],
            &FxHashSet::default(),
            &Options::default(),
        )
        .unwrap()
    }

    fn plain_em(model: &Model, start: &[f64], iterations: usize) -> Vec<f64> {
        let mut means = start.to_vec();
        let mut next = vec![0.0; means.len()];

        for _ in 0..iterations {
            em::update(model, &means, &mut next);
            swap(&mut means, &mut next);
        }

        means
    }

    /// Expected log-likelihood with group splits made from `means`
    fn log_likelihood_of(model: &Model, means: &[f64]) -> f64 {
        let mut next = vec![0.0; means.len()];
        em::update(model, means, &mut next);

        likelihood::expected_log_likelihood(model, means)
    }

    #[test]
    fn plain_em_is_monotonic() {
        let model = two_transcripts();
        let mut previous = f64::NEG_INFINITY;

        for iterations in 0..10 {
            let means = plain_em(&model, &[0.95, 0.05], iterations);
            let current = log_likelihood_of(&model, &means);

            assert!(current > previous);
            previous = current;
        }
    }

    #[test]
    fn faster_than_em() {
        let model = two_transcripts();
        let start = vec![0.95, 0.05];

        for iterations in 1..6 {
            let mut squarem = Squarem::new(SquaremParams::default(), start.clone());
            for _ in 0..iterations {
                squarem.step(&model);
            }
            let accelerated = squarem.into_theta();
            let plain = plain_em(&model, &start, iterations);

            assert!(
                log_likelihood_of(&model, &accelerated) >= log_likelihood_of(&model, &plain) - 1e-12
            );
        }
    }

    #[test]
    fn converge() {
        let model = two_transcripts();
        let mut squarem = Squarem::new(SquaremParams::default(), vec![0.95, 0.05]);

        for _ in 0..20 {
            let step = squarem.step(&model);
            assert!(step.alpha >= 1.0);
            assert!(step.neg_log_likelihood.is_finite());
        }

        // fixed point of 60 * t0 / (60 * t0 + 20 * t1 + 20 / 3)
        assert!((squarem.theta()[0] - 5.0 / 6.0).abs() < 1e-9);
        assert!((squarem.theta()[1] - 1.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn step_bounds_grow() {
        let model = two_transcripts();
        let mut squarem = Squarem::new(SquaremParams::default(), vec![0.95, 0.05]);

        // first ratio of norms is above 1, step is clamped to max step
        let step = squarem.step(&model);
        assert!(step.accepted);
        assert!(!step.stabilized);
        assert_eq!(step.alpha, 1.0);
        assert_eq!(squarem.max_step(), 4.0);
        assert_eq!(squarem.min_step(), 1.0);
    }

    #[test]
    fn step_bound_shrink() {
        let model = two_transcripts();
        let params = SquaremParams {
            m_step: 1.2,
            ..SquaremParams::default()
        };
        let mut squarem = Squarem::new(params, vec![0.95, 0.05]);

        // ratio of norms stay near 1.8, each step sit on max step and is accepted
        for _ in 0..3 {
            let max_step = squarem.max_step();
            let step = squarem.step(&model);
            assert!(step.accepted);
            assert_eq!(step.alpha, max_step);
        }
        assert!((squarem.max_step() - 1.728).abs() < 1e-12);

        squarem.params.nonmonotonicity = -10.0;
        let step = squarem.step(&model);

        assert!(!step.accepted);
        assert_eq!(step.alpha, 1.0);
        assert!((squarem.max_step() - 1.44).abs() < 1e-12);
        assert!((squarem.theta().iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rejection_fallback_to_em() {
        let model = two_transcripts();
        let params = SquaremParams {
            nonmonotonicity: f64::NEG_INFINITY,
            ..SquaremParams::default()
        };
        let mut squarem = Squarem::new(params, vec![0.95, 0.05]);

        for _ in 0..3 {
            let step = squarem.step(&model);
            assert!(!step.accepted);
            assert_eq!(step.alpha, 1.0);
        }

        assert_eq!(squarem.max_step(), 1.0);
        assert_eq!(squarem.theta(), plain_em(&model, &[0.95, 0.05], 6).as_slice());
    }

    #[test]
    fn converged_start() {
        let counts = CountTable::new(vec![30], 1, 50.0);
        let model = crate::collapse::build(
            &counts,
            &[vec![0]],
            &[100],
            &FxHashSet::default(),
            &Options::default(),
        )
        .unwrap();

        let mut squarem = Squarem::new(SquaremParams::default(), vec![1.0]);
        let step = squarem.step(&model);

        assert_eq!(step.alpha, 1.0);
        assert!(step.accepted);
        assert!((squarem.theta()[0] - 1.0).abs() < 1e-15);
        assert_eq!(squarem.max_step(), 1.0);
        assert_eq!(squarem.min_step(), 1.0);
    }
}
