//! Simulation time bookkeeping.

/// Physical time, step counter and time-step history.
///
/// Only the orchestrator advances a `TimeState`; every other stage reads
/// it. `index` counts completed [`advance`](TimeState::advance) calls and
/// is the counter that gates periodic work such as velocity capping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeState {
    /// Current physical time.
    pub value: f64,
    /// Number of time steps taken.
    pub index: u64,
    /// Time step used to reach `value`.
    pub delta_t: f64,
    /// Time step used on the step before that.
    pub delta_t0: f64,
    /// Time at which the run stops.
    pub end_time: f64,
}

impl TimeState {
    /// Create a time state at `start` with an initial step `delta_t`.
    pub fn new(start: f64, end_time: f64, delta_t: f64) -> Self {
        Self {
            value: start,
            index: 0,
            delta_t,
            delta_t0: delta_t,
            end_time,
        }
    }

    /// True while the run has not reached its end time.
    ///
    /// A half-step tolerance keeps accumulated round-off from adding a
    /// spurious final step.
    pub fn is_running(&self) -> bool {
        self.value < self.end_time - 0.5 * self.delta_t
    }

    /// Set the step for the next [`advance`](TimeState::advance).
    ///
    /// The step is shortened so the run lands on `end_time` exactly.
    pub fn set_delta_t(&mut self, delta_t: f64) {
        let remaining = self.end_time - self.value;
        self.delta_t = if remaining > 0.0 && delta_t > remaining {
            remaining
        } else {
            delta_t
        };
    }

    /// Move to the next time level.
    pub fn advance(&mut self) {
        self.value += self.delta_t;
        self.index += 1;
    }

    /// Finish a step: the current step becomes the previous one.
    pub fn end_step(&mut self) {
        self.delta_t0 = self.delta_t;
    }

    /// Reciprocal of the current step.
    pub fn r_delta_t(&self) -> f64 {
        1.0 / self.delta_t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_increments_index_and_time() {
        let mut t = TimeState::new(0.0, 1.0, 0.25);
        t.advance();
        t.advance();
        assert_eq!(t.index, 2);
        assert!((t.value - 0.5).abs() < 1e-15);
        assert!(t.is_running());
    }

    #[test]
    fn final_step_is_shortened_to_end_time() {
        let mut t = TimeState::new(0.0, 1.0, 0.4);
        t.advance();
        t.advance();
        t.set_delta_t(0.4);
        assert!((t.delta_t - 0.2).abs() < 1e-12);
        t.advance();
        assert!(!t.is_running());
    }

    #[test]
    fn end_step_records_previous_delta_t() {
        let mut t = TimeState::new(0.0, 1.0, 0.1);
        t.set_delta_t(0.05);
        t.end_step();
        assert_eq!(t.delta_t0, 0.05);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn run_lands_on_end_time(end in 0.01f64..10.0, dt in 1e-3f64..1.0) {
                let mut t = TimeState::new(0.0, end, dt);
                let mut steps = 0u64;
                while t.is_running() {
                    t.set_delta_t(dt);
                    t.advance();
                    steps += 1;
                    prop_assert!(t.value <= end + 1e-9);
                }
                prop_assert!((t.value - end).abs() < 0.5 * dt + 1e-9);
                prop_assert_eq!(t.index, steps);
            }
        }
    }
}
