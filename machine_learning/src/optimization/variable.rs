/// The optimization state of a single variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableState {
    pub current_value: f32,
    pub iterations: usize,
    pub converged: bool,
}

impl VariableState {
    /// Creates a fresh state starting at `value`.
    pub fn new(value: f32) -> Self {
        Self {
            current_value: value,
            iterations: 0,
            converged: false,
        }
    }

    /// Moves the variable to `value`, marking it converged if the change is within
    /// `epsilon` or the iteration budget is spent. Converged variables are left untouched.
    pub fn advance(&mut self, value: f32, epsilon: f32, max_iterations: usize) {
        if self.converged {
            return;
        }

        let delta = (value - self.current_value).abs();
        self.current_value = value;
        self.iterations += 1;

        if delta <= epsilon || self.iterations >= max_iterations {
            self.converged = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_on_small_steps_or_budget() {
        let mut state = VariableState::new(1.);
        state.advance(0.5, 0.1, 10);
        assert!(!state.converged);

        state.advance(0.45, 0.1, 10);
        assert!(state.converged);
        assert_eq!(state.iterations, 2);

        state.advance(100., 0.1, 10);
        assert_eq!(state.current_value, 0.45);

        let mut state = VariableState::new(1.);
        state.advance(10., 0., 1);
        assert!(state.converged);
    }
}
