//! Bounded control signals derived from circuit-style policies.
//!
//! The control loop tunes its exploration coefficient from a vector of
//! values in `[-1, 1]`, one per qubit/control dimension. [`SignalSource`]
//! is the seam; [`RotationLadderPolicy`] is the bundled implementation, a
//! closed-form surrogate for the original angle-encoding circuit (RY state
//! encoding, nearest-neighbor entangling ladder, per-wire rotation weights).
//! No circuit is simulated; the surrogate is deterministic and bounded by
//! construction.

use qcm_core::{QcmError, QcmResult};

/// Produces a bounded signal vector from policy weights and a grid state.
pub trait SignalSource {
    /// Number of control dimensions; output length, and the required length
    /// of both `weights` and `state`.
    fn qubit_count(&self) -> usize;

    /// Evaluate the signal. Every component of the result is in `[-1, 1]`.
    fn evaluate(&self, weights: &[f64], state: &[f64]) -> QcmResult<Vec<f64>>;
}

/// Closed-form rotation-ladder policy.
///
/// Wire `i` reads `cos(pi * state[i] + weights[i])`, damped by the previous
/// wire's encoding angle to mimic the nearest-neighbor entangling ladder.
/// Products of cosines keep every component in `[-1, 1]` exactly.
#[derive(Debug, Clone)]
pub struct RotationLadderPolicy {
    qubits: usize,
}

impl RotationLadderPolicy {
    pub fn new(qubits: usize) -> QcmResult<Self> {
        if qubits == 0 {
            return Err(QcmError::Config("qubit count must be >= 1".into()));
        }
        Ok(Self { qubits })
    }
}

impl SignalSource for RotationLadderPolicy {
    fn qubit_count(&self) -> usize {
        self.qubits
    }

    fn evaluate(&self, weights: &[f64], state: &[f64]) -> QcmResult<Vec<f64>> {
        if weights.len() != self.qubits {
            return Err(QcmError::Dimension(format!(
                "policy has {} weights, expected {}",
                weights.len(),
                self.qubits
            )));
        }
        if state.len() != self.qubits {
            return Err(QcmError::Dimension(format!(
                "state has {} features, policy expects {}",
                state.len(),
                self.qubits
            )));
        }

        let signal: Vec<f64> = (0..self.qubits)
            .map(|i| {
                let wire = (std::f64::consts::PI * state[i] + weights[i]).cos();
                if i == 0 {
                    wire
                } else {
                    wire * (std::f64::consts::PI * state[i - 1]).cos()
                }
            })
            .collect();

        if let Some(bad) = signal.iter().find(|s| !s.is_finite()) {
            return Err(QcmError::Signal(format!(
                "non-finite signal component {bad} from non-finite input"
            )));
        }
        Ok(signal)
    }
}
