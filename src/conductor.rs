//! Step-indexed state machine driving the connection supervisor.
//!
//! Pure data and a single transition rule; no I/O happens here. Actions in
//! [`crate::supervisor`] call [`Conductor::set_step`] for themselves before
//! doing their work, so the next `organizer` pass always reads the step's own
//! base/success/fail/retry configuration rather than a stale one.

/// The organizer's own step index. Reserved; never a valid action target.
pub const ORGANIZER: usize = 0;

/// Working record for the currently-executing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDescriptor {
    /// Step index currently being executed.
    pub current: usize,
    /// Step index to retry on failure when retries remain.
    pub base: usize,
    /// Step index to jump to on success.
    pub success: usize,
    /// Step index to jump to when retries are exhausted.
    pub fail: usize,
    /// Seconds (fractional) to sleep after this step.
    pub interval: f32,
    /// Last attempt outcome, consumed (reset to `false`) on transition.
    pub ok: bool,
    /// Maximum consecutive failures tolerated before taking the `fail` branch.
    pub retry: u32,
    /// Current consecutive-failure count.
    pub counter: u32,
}

impl Default for StepDescriptor {
    fn default() -> Self {
        // base == 0 triggers the organizer's bootstrap branch on first tick.
        Self { current: ORGANIZER, base: 0, success: 0, fail: 0, interval: 0., ok: false, retry: 0, counter: 0 }
    }
}

/// Owner of the [`StepDescriptor`]; mutated only by the supervisor and the
/// organizer itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct Conductor {
    step: StepDescriptor,
}

impl Conductor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current step index.
    pub fn current(&self) -> usize {
        self.step.current
    }

    /// Replace the descriptor wholesale. `counter` is intentionally left
    /// untouched — callers clear it explicitly on `fail`-branch entry via
    /// [`Conductor::clear_counter`].
    #[allow(clippy::too_many_arguments)]
    pub fn set_step(
        &mut self,
        current: usize,
        base: usize,
        success: usize,
        fail: usize,
        interval: f32,
        ok: bool,
        retry: u32,
    ) {
        self.step.current = current;
        self.step.base = base;
        self.step.success = success;
        self.step.fail = fail;
        self.step.interval = interval;
        self.step.ok = ok;
        self.step.retry = retry;
    }

    pub fn clear_counter(&mut self) {
        self.step.counter = 0;
    }

    pub fn tick_counter(&mut self) {
        self.step.counter += 1;
    }

    pub fn set_ok(&mut self, ok: bool) {
        self.step.ok = ok;
    }

    pub fn interval(&self) -> f32 {
        self.step.interval
    }

    /// Step 0: the pure transition function deciding the next step.
    pub fn organizer(&mut self) {
        if self.step.base == 0 {
            // Bootstrap: go straight to identification.
            self.step.current = 1;
        } else if self.step.ok {
            self.step.current = self.step.success;
            self.step.ok = false;
        } else if self.step.counter >= self.step.retry {
            self.step.current = self.step.fail;
            self.step.counter = 0;
        } else {
            self.step.current = self.step.base;
            self.step.counter += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_goes_to_identification() {
        let mut conductor = Conductor::new();
        conductor.organizer();
        assert_eq!(conductor.current(), 1);
    }

    #[test]
    fn success_consumes_ok_flag_and_jumps_to_success() {
        let mut conductor = Conductor::new();
        conductor.set_step(1, 1, 2, 15, 2., true, 20);
        conductor.organizer();
        assert_eq!(conductor.current(), 2);
        assert!(!conductor.step.ok);
    }

    #[test]
    fn failure_under_budget_retries_base_and_ticks_counter() {
        let mut conductor = Conductor::new();
        conductor.set_step(1, 1, 2, 15, 2., false, 20);
        conductor.organizer();
        assert_eq!(conductor.current(), 1);
        assert_eq!(conductor.step.counter, 1);
    }

    #[test]
    fn exhausted_retry_budget_takes_fail_branch_and_clears_counter() {
        let mut conductor = Conductor::new();
        conductor.set_step(1, 1, 2, 15, 2., false, 1);
        conductor.step.counter = 1;
        conductor.organizer();
        assert_eq!(conductor.current(), 15);
        assert_eq!(conductor.step.counter, 0);
    }

    /// Step 8/10 register with `retry=0`; the organizer's `counter >= retry`
    /// then fires on the very first failure. Preserved literally per
    /// DESIGN.md's Open Question resolution — not special-cased.
    #[test]
    fn retry_zero_escalates_immediately() {
        let mut conductor = Conductor::new();
        conductor.set_step(8, 8, 5, 9, 10., false, 0);
        conductor.organizer();
        assert_eq!(conductor.current(), 9);
        assert_eq!(conductor.step.counter, 0);
    }

    #[test]
    fn never_transitions_to_fail_while_under_retry_budget() {
        for retry in 1..5u32 {
            for counter in 0..retry {
                let mut conductor = Conductor::new();
                conductor.set_step(1, 1, 2, 15, 2., false, retry);
                conductor.step.counter = counter;
                conductor.organizer();
                assert_ne!(conductor.current(), 15);
            }
        }
    }
}
