//! Adaptive control loop coupling the signal policy to the swarm optimizer.
//!
//! Each epoch observes the grid, derives an exploration coefficient from the
//! policy signal, runs a fresh QPSO search for a dispatch adjustment, commits
//! the best candidate, and feeds the resulting reward back into the policy
//! weights. The swarm is rebuilt every epoch; only the weights persist.
//!
//! The weight update is a pluggable [`WeightUpdate`] strategy. The default,
//! [`RewardScaledUpdate`], nudges every weight by the scaled reward; a
//! gradient estimator (finite-difference or parameter-shift) can slot in
//! behind the same interface.

use crate::evaluator::GridEvaluator;
use crate::qpso::{QpsoConfig, QpsoEngine};
use crate::signal::SignalSource;
use qcm_core::{QcmError, QcmResult};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::info;

/// Map a bounded signal to an exploration coefficient in `[0, 1]`.
///
/// `0.5 + 0.5 * mean(signal)`: a signal of all `-1` collapses the swarm, all
/// `+1` doubles the nominal spread.
pub fn exploration_coefficient(signal: &[f64]) -> f64 {
    if signal.is_empty() {
        return 0.5;
    }
    let mean = signal.iter().sum::<f64>() / signal.len() as f64;
    0.5 + 0.5 * mean
}

/// Policy-weight update strategy.
pub trait WeightUpdate {
    /// Update `weights` in place from the committed epoch's reward.
    fn update(&self, weights: &mut [f64], reward: f64);
}

/// `w += learning_rate * reward`, applied uniformly.
///
/// A placeholder update; swap in a gradient-estimation strategy for real
/// training.
#[derive(Debug, Clone)]
pub struct RewardScaledUpdate {
    pub learning_rate: f64,
}

impl RewardScaledUpdate {
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }
}

impl WeightUpdate for RewardScaledUpdate {
    fn update(&self, weights: &mut [f64], reward: f64) {
        for w in weights {
            *w += self.learning_rate * reward;
        }
    }
}

/// Control-loop parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlLoopConfig {
    /// Maximum number of epochs
    pub epochs: usize,
    /// Swarm size per epoch
    pub particle_count: usize,
    /// Dispatch-vector dimension; must equal the evaluator's action length
    pub dimension: usize,
    /// QPSO steps per epoch
    pub iteration_budget: usize,
    /// Stop after this many epochs without reward improvement
    pub plateau_patience: Option<usize>,
    /// Minimum improvement that resets the plateau counter
    pub plateau_tolerance: f64,
    /// Wall-clock budget in seconds, checked between epochs
    pub time_budget_secs: Option<u64>,
    /// Base RNG seed; each epoch derives its own swarm seed from it
    pub seed: Option<u64>,
}

impl ControlLoopConfig {
    pub fn new(epochs: usize, particle_count: usize, dimension: usize) -> Self {
        Self {
            epochs,
            particle_count,
            dimension,
            iteration_budget: 1,
            plateau_patience: None,
            plateau_tolerance: 1e-6,
            time_budget_secs: None,
            seed: None,
        }
    }

    pub fn with_iteration_budget(mut self, iteration_budget: usize) -> Self {
        self.iteration_budget = iteration_budget;
        self
    }

    pub fn with_plateau(mut self, patience: usize, tolerance: f64) -> Self {
        self.plateau_patience = Some(patience);
        self.plateau_tolerance = tolerance;
        self
    }

    pub fn with_time_budget(mut self, secs: u64) -> Self {
        self.time_budget_secs = Some(secs);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> QcmResult<()> {
        if self.epochs == 0 {
            return Err(QcmError::Config("epoch count must be >= 1".into()));
        }
        if self.particle_count == 0 {
            return Err(QcmError::Config("particle count must be >= 1".into()));
        }
        if self.dimension == 0 {
            return Err(QcmError::Config("dimension must be >= 1".into()));
        }
        if self.iteration_budget == 0 {
            return Err(QcmError::Config("iteration budget must be >= 1".into()));
        }
        if !self.plateau_tolerance.is_finite() || self.plateau_tolerance < 0.0 {
            return Err(QcmError::Config(
                "plateau tolerance must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of one committed epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    /// Exploration coefficient used for this epoch's swarm
    pub beta: f64,
    /// Reward after committing the best action
    pub reward: f64,
    /// Best fitness the swarm found (negated reward of the best candidate)
    pub best_fitness: f64,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    EpochBudget,
    RewardPlateau,
    TimeBudget,
}

/// Full trace of a loop run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopReport {
    pub records: Vec<EpochRecord>,
    pub stop_reason: StopReason,
    /// Final policy weights after the last committed epoch
    pub final_weights: Vec<f64>,
}

/// Epoch driver over an evaluator, a signal policy, and an update strategy.
pub struct ControlLoop<E: GridEvaluator, S: SignalSource> {
    evaluator: E,
    policy: S,
    update_rule: Box<dyn WeightUpdate>,
    weights: Vec<f64>,
    config: ControlLoopConfig,
}

impl<E: GridEvaluator, S: SignalSource> ControlLoop<E, S> {
    /// Wire up a loop, checking every dimension coupling up front.
    ///
    /// Fails with `QcmError::Config` when the swarm dimension differs from
    /// the evaluator's action length, or when the policy's qubit count does
    /// not match the state-vector length or the initial weight count.
    pub fn new(
        evaluator: E,
        policy: S,
        update_rule: Box<dyn WeightUpdate>,
        initial_weights: Vec<f64>,
        config: ControlLoopConfig,
    ) -> QcmResult<Self> {
        config.validate()?;
        if config.dimension != evaluator.action_len() {
            return Err(QcmError::Config(format!(
                "swarm dimension {} does not match evaluator action length {}",
                config.dimension,
                evaluator.action_len()
            )));
        }
        let qubits = policy.qubit_count();
        let state_len = evaluator.state().len();
        if qubits != state_len {
            return Err(QcmError::Config(format!(
                "policy qubit count {qubits} does not match state-vector length {state_len}"
            )));
        }
        if initial_weights.len() != qubits {
            return Err(QcmError::Config(format!(
                "{} initial weights for a {qubits}-qubit policy",
                initial_weights.len()
            )));
        }
        Ok(Self {
            evaluator,
            policy,
            update_rule,
            weights: initial_weights,
            config,
        })
    }

    /// Current policy weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// The wrapped evaluator (e.g. for inspecting the committed grid).
    pub fn evaluator_mut(&mut self) -> &mut E {
        &mut self.evaluator
    }

    fn epoch_seed(&self, epoch: usize) -> Option<u64> {
        self.config
            .seed
            .map(|seed| seed ^ (epoch as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    /// Run one epoch: observe, search, commit, learn.
    pub fn run_epoch(&mut self, epoch: usize) -> QcmResult<EpochRecord> {
        let state = self.evaluator.state();
        let signal = self.policy.evaluate(&self.weights, &state)?;
        let beta = exploration_coefficient(&signal);

        let mut swarm_config =
            QpsoConfig::new(self.config.particle_count, self.config.dimension, beta)
                .with_iteration_budget(self.config.iteration_budget);
        if let Some(seed) = self.epoch_seed(epoch) {
            swarm_config = swarm_config.with_seed(seed);
        }
        let mut engine = QpsoEngine::new(swarm_config)?;

        // Every candidate is scored against the same baseline so fitness is
        // a function of the candidate alone, not of evaluation order.
        let baseline = self.evaluator.snapshot();
        {
            let evaluator = &mut self.evaluator;
            let mut fitness = |action: &[f64]| -> QcmResult<f64> {
                evaluator.restore(&baseline);
                evaluator.apply(action)?;
                Ok(-evaluator.reward()?)
            };
            engine.run(&mut fitness)?;
        }
        let best = engine.global_best().to_vec();
        let best_fitness = engine.global_best_fitness();

        // Commit the winning adjustment from the baseline grid.
        self.evaluator.restore(&baseline);
        self.evaluator.apply(&best)?;
        let reward = self.evaluator.reward()?;
        self.update_rule.update(&mut self.weights, reward);

        info!(epoch, beta, reward, best_fitness, "epoch committed");
        Ok(EpochRecord {
            epoch,
            beta,
            reward,
            best_fitness,
        })
    }

    /// Run until the epoch budget, reward plateau, or time budget is hit.
    pub fn run(&mut self) -> QcmResult<LoopReport> {
        let started = Instant::now();
        let time_budget = self.config.time_budget_secs.map(Duration::from_secs);
        let mut records = Vec::with_capacity(self.config.epochs);
        let mut best_reward = f64::NEG_INFINITY;
        let mut stalled = 0usize;
        let mut stop_reason = StopReason::EpochBudget;

        for epoch in 0..self.config.epochs {
            if let Some(budget) = time_budget {
                if started.elapsed() >= budget {
                    info!(epoch, "time budget exhausted, stopping");
                    stop_reason = StopReason::TimeBudget;
                    break;
                }
            }

            let record = self.run_epoch(epoch)?;
            if record.reward > best_reward + self.config.plateau_tolerance {
                best_reward = record.reward;
                stalled = 0;
            } else {
                stalled += 1;
            }
            records.push(record);

            if let Some(patience) = self.config.plateau_patience {
                if stalled >= patience {
                    info!(epoch, stalled, "reward plateau reached, stopping");
                    stop_reason = StopReason::RewardPlateau;
                    break;
                }
            }
        }

        Ok(LoopReport {
            records,
            stop_reason,
            final_weights: self.weights.clone(),
        })
    }
}
