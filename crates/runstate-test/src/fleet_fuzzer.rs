//! Fleet Fuzzer - Randomized convergence testing
//!
//! Each trial builds a fleet with random enable/standalone flags, echo delays
//! and silent programs, then walks the global state along the run cycle.
//! A transition must converge exactly when every active program echoes; a
//! fleet with an active silent program must time out on its first transition
//! and report that program as pending.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use runstate_coord::ProgramDefinition;
use runstate_core::{RunStateError, RunStateResult};
use runstate_types::{ACTIVE, BEGINNING, ENDING, NOT_READY, READY, READYING};
use tracing::debug;

use crate::{EchoBehavior, Fleet, FleetMember};

/// Legal walk through the run-state machine, starting from the initial state
const RUN_CYCLE: [&str; 7] = [NOT_READY, READYING, READY, BEGINNING, ACTIVE, ENDING, READY];

/// Fuzzer configuration
#[derive(Clone, Debug)]
pub struct FleetFuzzConfig {
    /// Number of fleets to build
    pub trials: usize,
    /// Largest fleet size
    pub max_programs: usize,
    /// Transitions walked per converging fleet
    pub transitions: usize,
    /// Probability a program is disabled
    pub disabled_prob: f64,
    /// Probability a program is standalone
    pub standalone_prob: f64,
    /// Probability a program never echoes
    pub silent_prob: f64,
    /// Upper bound on a program's echo delay
    pub max_echo_delay_ms: u64,
    /// Random seed
    pub seed: u64,
}

impl Default for FleetFuzzConfig {
    fn default() -> Self {
        FleetFuzzConfig {
            trials: 8,
            max_programs: 6,
            transitions: 5,
            disabled_prob: 0.2,
            standalone_prob: 0.2,
            silent_prob: 0.1,
            max_echo_delay_ms: 20,
            seed: 42,
        }
    }
}

impl FleetFuzzConfig {
    /// Light fuzzing for quick tests
    pub fn light() -> Self {
        FleetFuzzConfig {
            trials: 4,
            max_programs: 4,
            transitions: 3,
            disabled_prob: 0.2,
            standalone_prob: 0.2,
            silent_prob: 0.1,
            max_echo_delay_ms: 5,
            seed: 42,
        }
    }

    /// Heavy fuzzing for thorough testing
    pub fn heavy() -> Self {
        FleetFuzzConfig {
            trials: 32,
            max_programs: 12,
            transitions: 7,
            disabled_prob: 0.3,
            standalone_prob: 0.3,
            silent_prob: 0.15,
            max_echo_delay_ms: 50,
            seed: 42,
        }
    }
}

/// Outcome of one trial
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrialOutcome {
    /// Every transition converged, as expected
    Converged { transitions: usize },
    /// The first transition timed out, as expected, waiting on these programs
    TimedOut { pending: Vec<String> },
    /// The fleet did something its composition does not allow
    Mismatch { reason: String },
}

/// Fuzzing result
#[derive(Debug, Default)]
pub struct FleetFuzzResult {
    pub outcomes: Vec<TrialOutcome>,
}

impl FleetFuzzResult {
    pub fn converged(&self) -> usize {
        self.count(|o| matches!(o, TrialOutcome::Converged { .. }))
    }

    pub fn timed_out(&self) -> usize {
        self.count(|o| matches!(o, TrialOutcome::TimedOut { .. }))
    }

    pub fn mismatches(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                TrialOutcome::Mismatch { reason } => Some(reason.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn is_valid(&self) -> bool {
        self.mismatches().is_empty()
    }

    fn count(&self, f: impl Fn(&TrialOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| f(o)).count()
    }
}

/// Fleet fuzzer
pub struct FleetFuzzer {
    config: FleetFuzzConfig,
    rng: StdRng,
}

impl FleetFuzzer {
    pub fn new(config: FleetFuzzConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        FleetFuzzer { config, rng }
    }

    /// Random fleet composition
    pub fn generate_members(&mut self) -> Vec<FleetMember> {
        let count = self.rng.gen_range(1..=self.config.max_programs.max(1));
        (0..count)
            .map(|i| {
                let definition = ProgramDefinition::new(format!("/opt/daq/bin/prog{}", i), "localhost")
                    .enabled(!self.rng.gen_bool(self.config.disabled_prob))
                    .standalone(self.rng.gen_bool(self.config.standalone_prob));
                let behavior = if self.rng.gen_bool(self.config.silent_prob) {
                    EchoBehavior::Silent
                } else {
                    EchoBehavior::delayed(self.rng.gen_range(0..=self.config.max_echo_delay_ms))
                };
                FleetMember {
                    name: format!("prog{:02}", i),
                    definition,
                    behavior,
                }
            })
            .collect()
    }

    /// Run every trial
    pub fn run(&mut self) -> RunStateResult<FleetFuzzResult> {
        let mut result = FleetFuzzResult::default();
        for trial in 0..self.config.trials {
            let members = self.generate_members();
            let outcome = self.run_trial(members)?;
            debug!(trial, ?outcome, "fleet trial finished");
            result.outcomes.push(outcome);
        }
        Ok(result)
    }

    fn run_trial(&self, members: Vec<FleetMember>) -> RunStateResult<TrialOutcome> {
        let mut builder = Fleet::builder().timeout_secs(1);
        for m in &members {
            builder = builder.program(&m.name, m.definition.clone(), m.behavior);
        }
        let mut fleet = builder.build()?;

        let expected_pending: Vec<String> = members
            .iter()
            .filter(|m| m.definition.is_active() && !m.behavior.echoes())
            .map(|m| m.name.clone())
            .collect();

        if !fleet.expects_convergence() {
            return Ok(match fleet.transition(NOT_READY) {
                Err(RunStateError::Timeout { pending, .. }) if pending == expected_pending => {
                    TrialOutcome::TimedOut { pending }
                }
                Err(RunStateError::Timeout { pending, .. }) => TrialOutcome::Mismatch {
                    reason: format!("pending {:?}, expected {:?}", pending, expected_pending),
                },
                Ok(()) => TrialOutcome::Mismatch {
                    reason: format!("converged while {:?} stayed silent", expected_pending),
                },
                Err(e) => return Err(e),
            });
        }

        let steps = self.config.transitions.min(RUN_CYCLE.len());
        for state in &RUN_CYCLE[..steps] {
            match fleet.transition(state) {
                Ok(()) => {}
                Err(RunStateError::Timeout { pending, .. }) => {
                    return Ok(TrialOutcome::Mismatch {
                        reason: format!("{} timed out waiting on {:?}", state, pending),
                    })
                }
                Err(e) => return Err(e),
            }
        }
        Ok(TrialOutcome::Converged { transitions: steps })
    }
}
