/// Common trait for entity status machines.
///
/// Implementors define which transitions are legal; mutation paths consult
/// `can_transition_to` before persisting a status change so illegal
/// transitions are rejected uniformly.
pub trait LifecycleState {
    /// Returns true if this is a terminal state (no further transitions).
    fn is_terminal(&self) -> bool;

    /// Returns true if transition to the given state is valid.
    fn can_transition_to(&self, next: &Self) -> bool;
}
