//! Transform/proof mode state machine.
//!
//! # Responsibility
//! - Hold the process-wide editing mode and persist it across sessions.
//! - Gate operations on the current mode.
//!
//! # Invariants
//! - A missing or unreadable preference starts in `Mode::Transform`.
//! - Toggling is refused while the overview view is open; state is unchanged.
//! - The in-memory mode only changes after the preference write succeeded.

use crate::model::mode::{Mode, Operation};
use crate::repo::settings_repo::SettingsRepository;
use crate::repo::RepoError;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Preference key holding `active` / `inactive`.
pub const PROOF_MODE_KEY: &str = "proof_mode";

/// Errors from mode transitions and checks.
#[derive(Debug)]
pub enum ModeError {
    /// Toggle requested while the overview view is open.
    OverviewOpen,
    /// Operation requires a different mode.
    Disallowed { operation: Operation, current: Mode },
    /// Preference storage failed.
    Preference(RepoError),
}

impl Display for ModeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OverviewOpen => write!(f, "close the overview before switching modes"),
            Self::Disallowed { operation, current } => write!(
                f,
                "{} is not available in {} mode",
                operation.as_str(),
                current.as_str()
            ),
            Self::Preference(err) => write!(f, "mode preference: {err}"),
        }
    }
}

impl Error for ModeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Preference(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ModeError {
    fn from(value: RepoError) -> Self {
        Self::Preference(value)
    }
}

/// Mode state backed by a settings repository.
pub struct ModeController<S: SettingsRepository> {
    settings: S,
    mode: Mode,
    overview_open: bool,
}

impl<S: SettingsRepository> ModeController<S> {
    /// Loads the persisted mode.
    ///
    /// # Errors
    /// - `Preference` when the repository cannot be read.
    pub fn initialize(settings: S) -> Result<Self, ModeError> {
        let stored = settings.get(PROOF_MODE_KEY)?;
        let mode = match stored.as_deref() {
            None => Mode::Transform,
            Some(value) => Mode::from_preference_value(value).unwrap_or_else(|| {
                warn!(
                    "event=mode_init module=mode status=warn error_code=unknown_preference value={value}"
                );
                Mode::Transform
            }),
        };
        info!("event=mode_init module=mode status=ok mode={}", mode.as_str());
        Ok(Self {
            settings,
            mode,
            overview_open: false,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_proof(&self) -> bool {
        self.mode == Mode::Proof
    }

    pub fn is_overview_open(&self) -> bool {
        self.overview_open
    }

    pub fn set_overview_open(&mut self, open: bool) {
        self.overview_open = open;
    }

    /// Flips the mode and persists it. Returns the new mode.
    pub fn toggle(&mut self) -> Result<Mode, ModeError> {
        if self.overview_open {
            info!("event=mode_toggle module=mode status=rejected error_code=overview_open");
            return Err(ModeError::OverviewOpen);
        }
        let next = self.mode.toggled();
        self.settings
            .set(PROOF_MODE_KEY, next.preference_value())?;
        self.mode = next;
        info!("event=mode_toggle module=mode status=ok mode={}", next.as_str());
        Ok(next)
    }

    /// Checks that `operation` is available in the current mode.
    pub fn ensure(&self, operation: Operation) -> Result<(), ModeError> {
        if operation.required_mode() == self.mode {
            Ok(())
        } else {
            Err(ModeError::Disallowed {
                operation,
                current: self.mode,
            })
        }
    }

    /// Returns to transform mode and forgets the persisted preference.
    pub fn reset(&mut self) -> Result<(), ModeError> {
        self.settings.remove(PROOF_MODE_KEY)?;
        self.mode = Mode::Transform;
        self.overview_open = false;
        Ok(())
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::{ModeController, ModeError, PROOF_MODE_KEY};
    use crate::model::mode::{Mode, Operation};
    use crate::repo::settings_repo::{MemorySettingsRepository, SettingsRepository};

    #[test]
    fn missing_preference_starts_in_transform() {
        let controller = ModeController::initialize(MemorySettingsRepository::new()).unwrap();
        assert_eq!(controller.mode(), Mode::Transform);
        assert!(controller.ensure(Operation::CreateObject).is_ok());
        assert!(matches!(
            controller.ensure(Operation::ApplyRule),
            Err(ModeError::Disallowed {
                operation: Operation::ApplyRule,
                current: Mode::Transform
            })
        ));
    }

    #[test]
    fn toggle_persists_and_is_blocked_by_overview() {
        let mut controller = ModeController::initialize(MemorySettingsRepository::new()).unwrap();
        assert_eq!(controller.toggle().unwrap(), Mode::Proof);
        assert_eq!(
            controller.settings().get(PROOF_MODE_KEY).unwrap().as_deref(),
            Some("active")
        );

        controller.set_overview_open(true);
        assert!(matches!(controller.toggle(), Err(ModeError::OverviewOpen)));
        assert_eq!(controller.mode(), Mode::Proof);

        controller.set_overview_open(false);
        assert_eq!(controller.toggle().unwrap(), Mode::Transform);
    }

    #[test]
    fn unknown_preference_falls_back_to_transform() {
        let settings = MemorySettingsRepository::new();
        settings.set(PROOF_MODE_KEY, "sideways").unwrap();
        let controller = ModeController::initialize(settings).unwrap();
        assert_eq!(controller.mode(), Mode::Transform);
    }

    #[test]
    fn reset_clears_preference() {
        let mut controller = ModeController::initialize(MemorySettingsRepository::new()).unwrap();
        controller.toggle().unwrap();
        controller.reset().unwrap();
        assert_eq!(controller.mode(), Mode::Transform);
        assert_eq!(controller.settings().get(PROOF_MODE_KEY).unwrap(), None);
    }
}
