//! Quantum-behaved Particle Swarm Optimization.
//!
//! QPSO replaces classical PSO's velocity update with a stochastic
//! delta-potential-well displacement: each dimension of each particle jumps
//! to its local attractor plus a logarithmically distributed offset scaled by
//! the contraction-expansion coefficient `beta` and the particle's distance
//! from the swarm's mean best position. Larger `beta` widens the search;
//! `beta = 0` collapses every particle onto its attractor.
//!
//! Fitness is minimized. The engine never evaluates particles in parallel:
//! callers typically close over a single mutable grid evaluator, so
//! evaluation order is part of the contract.

use qcm_core::{QcmError, QcmResult};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Lower bound for the log-domain draw. `ln(1/u)` is undefined at `u = 0`,
/// so draws are floored here.
const U_FLOOR: f64 = 1e-12;

/// Swarm parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QpsoConfig {
    /// Number of particles (N >= 1)
    pub particle_count: usize,
    /// Dimension of each candidate vector (D >= 1); must match the
    /// evaluator's expected action length
    pub dimension: usize,
    /// Contraction-expansion coefficient (>= 0, finite)
    pub beta: f64,
    /// Steps performed per [`QpsoEngine::run`] call (>= 1)
    pub iteration_budget: usize,
    /// RNG seed; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl QpsoConfig {
    pub fn new(particle_count: usize, dimension: usize, beta: f64) -> Self {
        Self {
            particle_count,
            dimension,
            beta,
            iteration_budget: 1,
            seed: None,
        }
    }

    pub fn with_iteration_budget(mut self, iteration_budget: usize) -> Self {
        self.iteration_budget = iteration_budget;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> QcmResult<()> {
        if self.particle_count == 0 {
            return Err(QcmError::Config("particle count must be >= 1".into()));
        }
        if self.dimension == 0 {
            return Err(QcmError::Config("dimension must be >= 1".into()));
        }
        if !self.beta.is_finite() || self.beta < 0.0 {
            return Err(QcmError::Config(format!(
                "beta must be finite and non-negative, got {}",
                self.beta
            )));
        }
        if self.iteration_budget == 0 {
            return Err(QcmError::Config("iteration budget must be >= 1".into()));
        }
        Ok(())
    }
}

/// One candidate solution and the best position it has visited.
#[derive(Debug, Clone)]
struct Particle {
    position: Vec<f64>,
    best: Vec<f64>,
    best_fitness: f64,
}

impl Particle {
    fn at(position: Vec<f64>) -> Self {
        let best = position.clone();
        Self {
            position,
            best,
            best_fitness: f64::INFINITY,
        }
    }
}

/// QPSO engine over a caller-supplied fitness function.
///
/// Fitness functions return `Err` (or a non-finite value) to mark a
/// candidate unevaluable; the engine assigns worst-case fitness and keeps
/// going rather than aborting the step.
pub struct QpsoEngine {
    config: QpsoConfig,
    particles: Vec<Particle>,
    global_best: Vec<f64>,
    global_best_fitness: f64,
    rng: StdRng,
}

impl QpsoEngine {
    /// Create a swarm with positions drawn uniformly from `[-1, 1]^D`.
    pub fn new(config: QpsoConfig) -> QcmResult<Self> {
        config.validate()?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let particles: Vec<Particle> = (0..config.particle_count)
            .map(|_| {
                let position: Vec<f64> = (0..config.dimension)
                    .map(|_| rng.gen_range(-1.0..=1.0))
                    .collect();
                Particle::at(position)
            })
            .collect();
        let global_best = particles[0].position.clone();
        Ok(Self {
            config,
            particles,
            global_best,
            global_best_fitness: f64::INFINITY,
            rng,
        })
    }

    /// Create a swarm from explicit starting positions (warm start).
    ///
    /// Position count and lengths must match the config.
    pub fn with_warm_start(config: QpsoConfig, positions: Vec<Vec<f64>>) -> QcmResult<Self> {
        config.validate()?;
        if positions.len() != config.particle_count {
            return Err(QcmError::Dimension(format!(
                "warm start has {} positions, config expects {}",
                positions.len(),
                config.particle_count
            )));
        }
        if let Some(bad) = positions.iter().find(|p| p.len() != config.dimension) {
            return Err(QcmError::Dimension(format!(
                "warm-start position has {} dimensions, config expects {}",
                bad.len(),
                config.dimension
            )));
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let particles: Vec<Particle> = positions.into_iter().map(Particle::at).collect();
        let global_best = particles[0].position.clone();
        Ok(Self {
            config,
            particles,
            global_best,
            global_best_fitness: f64::INFINITY,
            rng,
        })
    }

    /// Best position found so far.
    pub fn global_best(&self) -> &[f64] {
        &self.global_best
    }

    /// Fitness of the best position, `INFINITY` until an evaluation succeeds.
    pub fn global_best_fitness(&self) -> f64 {
        self.global_best_fitness
    }

    /// Mean of all personal-best positions.
    fn mean_best(&self) -> Vec<f64> {
        let n = self.particles.len() as f64;
        let mut mean = vec![0.0; self.config.dimension];
        for particle in &self.particles {
            for (m, &b) in mean.iter_mut().zip(&particle.best) {
                *m += b;
            }
        }
        for m in &mut mean {
            *m /= n;
        }
        mean
    }

    /// One delta-potential-well update and evaluation sweep.
    ///
    /// Particles are moved and evaluated strictly in order. The global best
    /// always equals the minimum personal-best fitness afterwards.
    pub fn step<F>(&mut self, fitness: &mut F) -> QcmResult<()>
    where
        F: FnMut(&[f64]) -> QcmResult<f64>,
    {
        let mean_best = self.mean_best();
        let beta = self.config.beta;

        for i in 0..self.particles.len() {
            for d in 0..self.config.dimension {
                let phi: f64 = self.rng.gen();
                let u: f64 = self.rng.gen::<f64>().max(U_FLOOR);
                let sign = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };

                let particle = &self.particles[i];
                let attractor = phi * particle.best[d] + (1.0 - phi) * self.global_best[d];
                let spread = (mean_best[d] - particle.position[d]).abs();
                let updated = attractor + sign * beta * spread * (1.0 / u).ln();

                if !updated.is_finite() {
                    return Err(QcmError::Solver(format!(
                        "non-finite position in particle {i}, dimension {d}"
                    )));
                }
                self.particles[i].position[d] = updated;
            }

            let value = match fitness(&self.particles[i].position) {
                Ok(v) if v.is_finite() => v,
                Ok(v) => {
                    warn!(particle = i, value = v, "non-finite fitness, assigning worst case");
                    f64::INFINITY
                }
                Err(err) => {
                    warn!(particle = i, error = %err, "fitness evaluation failed, assigning worst case");
                    f64::INFINITY
                }
            };

            let particle = &mut self.particles[i];
            if value < particle.best_fitness {
                particle.best_fitness = value;
                particle.best.copy_from_slice(&particle.position);
                if value < self.global_best_fitness {
                    self.global_best_fitness = value;
                    self.global_best.copy_from_slice(&particle.position);
                }
            }
        }
        Ok(())
    }

    /// Run the configured iteration budget and return the best position.
    pub fn run<F>(&mut self, fitness: &mut F) -> QcmResult<&[f64]>
    where
        F: FnMut(&[f64]) -> QcmResult<f64>,
    {
        for _ in 0..self.config.iteration_budget {
            self.step(fitness)?;
        }
        Ok(&self.global_best)
    }
}
