//! State machine trait for status enums.
//!
//! Gives the connection lifecycle and the test execution status the same
//! interface for validating transitions.

/// Trait for status enums that represent state machines.
///
/// Implementors define valid state transitions; terminal detection
/// comes for free.
///
/// # Example
///
/// ```ignore
/// impl StateMachine for TestStatus {
///     fn can_transition_to(&self, target: &Self) -> bool {
///         matches!((self, target), (Running, Completed) | (Running, Failed))
///     }
///     // ...
/// }
///
/// assert!(!TestStatus::Completed.can_transition_to(&TestStatus::Running));
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}
