//! Building blocks shared by the stage driven state machines.
//!
//! A state machine is a closed enum implementing [`Stage`]. Each stage lists
//! the stages it may move to; a handler answers with a [`Transition`] which
//! the driver validates against that table before persisting it.

use crate::error::ControllerError;
use std::fmt::Debug;
use std::time::Duration;
use tracing::warn;

/// Requeue delay after a stage advanced, so the next stage runs promptly
pub const ADVANCE_REQUEUE: Duration = Duration::from_secs(1);

/// One stage of a persisted state machine
pub trait Stage: Copy + Eq + Debug + Send + Sync + 'static {
    /// Stage of a resource that was never reconciled
    const INITIAL: Self;

    /// Every stage of the machine
    const ALL: &'static [Self];

    /// Persisted name of the stage
    fn as_str(self) -> &'static str;

    /// Stages a handler of this stage may move to, besides staying
    fn successors(self) -> &'static [Self];

    /// Stage stored under `raw`
    ///
    /// Unknown names restart the machine from [`Stage::INITIAL`].
    fn from_persisted(raw: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == raw)
            .unwrap_or_else(|| {
                warn!("Unknown stage {:?}, restarting from {:?}", raw, Self::INITIAL);
                Self::INITIAL
            })
    }
}

/// Outcome of one stage handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<S> {
    /// Stage to persist
    pub stage: S,
    /// Delay before the next pass when the handler waits on something
    pub requeue_after: Option<Duration>,
}

impl<S: Stage> Transition<S> {
    /// Move to `stage` and run it right away
    #[must_use]
    pub fn advance(stage: S) -> Self {
        Self {
            stage,
            requeue_after: None,
        }
    }

    /// Stay in (or move to) `stage` and come back after `delay`
    #[must_use]
    pub fn wait(stage: S, delay: Duration) -> Self {
        Self {
            stage,
            requeue_after: Some(delay),
        }
    }

    /// Whether the handler asked to be revisited later
    #[must_use]
    pub fn is_wait(&self) -> bool {
        self.requeue_after.is_some()
    }

    /// Check the transition against the table of `from`
    pub fn validate(&self, from: S) -> Result<(), ControllerError> {
        if self.stage == from || from.successors().contains(&self.stage) {
            Ok(())
        } else {
            Err(ControllerError::InvalidTransition {
                from: from.as_str().to_string(),
                to: self.stage.as_str().to_string(),
            })
        }
    }

    /// Delay the driver requeues with
    #[must_use]
    pub fn requeue(&self) -> Duration {
        self.requeue_after.unwrap_or(ADVANCE_REQUEUE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Light {
        Off,
        Warming,
        On,
    }

    impl Stage for Light {
        const INITIAL: Self = Self::Off;
        const ALL: &'static [Self] = &[Self::Off, Self::Warming, Self::On];

        fn as_str(self) -> &'static str {
            match self {
                Self::Off => "",
                Self::Warming => "Warming",
                Self::On => "On",
            }
        }

        fn successors(self) -> &'static [Self] {
            match self {
                Self::Off => &[Self::Warming],
                Self::Warming => &[Self::On, Self::Off],
                Self::On => &[Self::Off],
            }
        }
    }

    #[test]
    fn test_persisted_names() {
        assert_eq!(Light::from_persisted(""), Light::Off);
        assert_eq!(Light::from_persisted("Warming"), Light::Warming);
        assert_eq!(Light::from_persisted("Exploded"), Light::Off);
    }

    #[test]
    fn test_validate_against_table() {
        assert!(Transition::advance(Light::Warming).validate(Light::Off).is_ok());
        assert!(Transition::wait(Light::Off, Duration::from_secs(30)).validate(Light::Off).is_ok());

        let err = Transition::advance(Light::On).validate(Light::Off).unwrap_err();
        assert!(matches!(
            err,
            ControllerError::InvalidTransition { ref from, ref to } if from.is_empty() && to == "On"
        ));
    }

    #[test]
    fn test_requeue_delay() {
        assert_eq!(Transition::advance(Light::On).requeue(), ADVANCE_REQUEUE);
        let wait = Transition::wait(Light::Warming, Duration::from_secs(30));
        assert!(wait.is_wait());
        assert_eq!(wait.requeue(), Duration::from_secs(30));
    }
}
