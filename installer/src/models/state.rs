// Wizard states
//
// Ordering is fixed: Welcome -> TestConfig -> SiteSettings -> AdminAccount -> Summary -> Completed.
// `Failed` is terminal and reachable only from an unrecoverable commit failure.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardState {
    #[default]
    Welcome,
    TestConfig,
    SiteSettings,
    AdminAccount,
    Summary,
    Completed,
    Failed,
}

impl WizardState {
    /// Forward successor. Terminal states have none.
    pub fn next(&self) -> Option<WizardState> {
        match self {
            WizardState::Welcome => Some(WizardState::TestConfig),
            WizardState::TestConfig => Some(WizardState::SiteSettings),
            WizardState::SiteSettings => Some(WizardState::AdminAccount),
            WizardState::AdminAccount => Some(WizardState::Summary),
            WizardState::Summary => Some(WizardState::Completed),
            WizardState::Completed | WizardState::Failed => None,
        }
    }

    /// Backward predecessor, for the steps that allow going back.
    pub fn prev(&self) -> Option<WizardState> {
        match self {
            WizardState::TestConfig => Some(WizardState::Welcome),
            WizardState::SiteSettings => Some(WizardState::TestConfig),
            WizardState::AdminAccount => Some(WizardState::SiteSettings),
            WizardState::Summary => Some(WizardState::AdminAccount),
            WizardState::Welcome | WizardState::Completed | WizardState::Failed => None,
        }
    }

    /// 1-based position shown to the user ("step 2 of 5").
    pub fn step_number(&self) -> u8 {
        match self {
            WizardState::Welcome => 1,
            WizardState::TestConfig => 2,
            WizardState::SiteSettings => 3,
            WizardState::AdminAccount => 4,
            WizardState::Summary | WizardState::Completed | WizardState::Failed => 5,
        }
    }

    pub fn total_steps() -> u8 {
        5
    }

    /// Stable identifier used in logs (`[STEP: ...]`) and message keys.
    pub fn as_id(&self) -> &'static str {
        match self {
            WizardState::Welcome => "welcome",
            WizardState::TestConfig => "test_config",
            WizardState::SiteSettings => "site_settings",
            WizardState::AdminAccount => "admin_account",
            WizardState::Summary => "summary",
            WizardState::Completed => "completed",
            WizardState::Failed => "failed",
        }
    }
}

impl fmt::Display for WizardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_chain_reaches_completed_in_five_hops() {
        let mut state = WizardState::Welcome;
        let mut hops = 0;
        while let Some(next) = state.next() {
            state = next;
            hops += 1;
        }
        assert_eq!(state, WizardState::Completed);
        assert_eq!(hops, 5);
    }

    #[test]
    fn prev_is_inverse_of_next_for_non_terminal_steps() {
        for state in [
            WizardState::Welcome,
            WizardState::TestConfig,
            WizardState::SiteSettings,
            WizardState::AdminAccount,
        ] {
            let next = state.next().unwrap();
            assert_eq!(next.prev(), Some(state));
        }
    }

    #[test]
    fn terminal_states_go_nowhere() {
        for state in [WizardState::Completed, WizardState::Failed] {
            assert_eq!(state.next(), None);
            assert_eq!(state.prev(), None);
        }
    }
}
