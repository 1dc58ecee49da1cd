// Wizard state machine
//
// Owns one install session: the current state, the in-memory draft and the visited-state history.
// `advance` and `back` refuse to queue behind a running request (`SessionBusy`); `complete` waits
// for the session, so a double submit resolves into one install and one `AlreadyInstalled`.

use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::api::admin::AdminBootstrapper;
use crate::api::preflight::DependencyValidator;
use crate::config::store::ConfigStore;
use crate::database::connection::DbConnector;
use crate::errors::{DependencyUnavailable, PersistError, WizardError};
use crate::localization::Language;
use crate::models::draft::WizardDraft;
use crate::models::requests::StepInput;
use crate::models::responses::{InstallOutcome, StepView};
use crate::models::state::WizardState;
use crate::utils::path_resolver::resolve_under_site_root;
use crate::utils::settings::InstallerSettings;
use crate::wizard::steps::{self, DependencyCheck};

#[derive(Debug, Default)]
struct Session {
    state: WizardState,
    draft: WizardDraft,
    history: Vec<WizardState>,
}

impl Session {
    fn new() -> Self {
        Self {
            history: vec![WizardState::Welcome],
            ..Self::default()
        }
    }

    fn enter(&mut self, state: WizardState) {
        self.state = state;
        self.history.push(state);
    }

    fn view(&self) -> StepView {
        StepView {
            state: self.state,
            step_number: self.state.step_number(),
            total_steps: WizardState::total_steps(),
            title_key: steps::title_key(self.state),
            draft: self.draft.view(),
        }
    }
}

pub struct WizardStateMachine {
    session: Mutex<Session>,
    store: Arc<ConfigStore>,
    validator: Arc<DependencyValidator>,
    admin: AdminBootstrapper,
    site_root: PathBuf,
    language: Language,
}

impl WizardStateMachine {
    pub fn new(
        store: Arc<ConfigStore>,
        validator: Arc<DependencyValidator>,
        admin: AdminBootstrapper,
        site_root: PathBuf,
    ) -> Self {
        Self {
            session: Mutex::new(Session::new()),
            store,
            validator,
            admin,
            site_root,
            language: Language::default(),
        }
    }

    /// Session over a store shared with other sessions of the same deployment.
    pub fn from_settings(
        settings: &InstallerSettings,
        store: Arc<ConfigStore>,
        connector: Arc<dyn DbConnector>,
    ) -> Self {
        Self::new(
            store,
            Arc::new(DependencyValidator::new(connector)),
            AdminBootstrapper::from_settings(settings),
            settings.site_root.clone(),
        )
        .with_language(settings.default_language())
    }

    /// Display language for this session. Only step titles and messages use it.
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub async fn current_step(&self) -> StepView {
        self.session.lock().await.view()
    }

    /// States visited so far, in order, starting with `Welcome`.
    pub async fn history(&self) -> Vec<WizardState> {
        self.session.lock().await.history.clone()
    }

    /// Validate `input` for the current step and move forward.
    ///
    /// On any error the state and the draft are left exactly as they were.
    pub async fn advance(&self, input: StepInput) -> Result<StepView, WizardError> {
        let mut session = self
            .session
            .try_lock()
            .map_err(|_| WizardError::SessionBusy)?;
        let state = session.state;

        let descriptor = match steps::descriptor(state) {
            Some(d) if input.step() == state => d,
            _ => {
                warn!(
                    "[PHASE: wizard] [STEP: {}] Rejected {} in state {}",
                    state,
                    input.label(),
                    state
                );
                return Err(WizardError::InvalidTransition {
                    state,
                    attempted: input.label(),
                });
            }
        };

        if let Err(e) = (descriptor.predicate)(&input) {
            info!(
                "[PHASE: wizard] [STEP: {}] Validation failed: {}",
                state, e
            );
            return Err(e.into());
        }
        self.check_dependency(descriptor.dependency, &input).await?;

        merge(&mut session.draft, input);
        let next = state.next().unwrap_or(WizardState::Summary);
        session.enter(next);
        info!("[PHASE: wizard] [STEP: {}] Step accepted, now at {}", state, next);
        Ok(session.view())
    }

    /// Return to the previous step, clearing what it and every later step collected.
    pub async fn back(&self) -> Result<StepView, WizardError> {
        let mut session = self
            .session
            .try_lock()
            .map_err(|_| WizardError::SessionBusy)?;
        let state = session.state;
        let Some(previous) = state.prev() else {
            warn!("[PHASE: wizard] [STEP: {}] Rejected back()", state);
            return Err(WizardError::InvalidTransition {
                state,
                attempted: "back",
            });
        };

        for field in steps::fields_from(previous) {
            session.draft.clear(field);
        }
        session.enter(previous);
        info!("[PHASE: wizard] [STEP: {}] Went back to {}", state, previous);
        Ok(session.view())
    }

    /// Provision the administrator and commit the configuration.
    pub async fn complete(&self) -> Result<InstallOutcome, WizardError> {
        let mut session = self.session.lock().await;
        match session.state {
            WizardState::Summary => {}
            WizardState::Completed => return Err(WizardError::AlreadyInstalled),
            state => {
                warn!("[PHASE: wizard] [STEP: {}] Rejected complete()", state);
                return Err(WizardError::InvalidTransition {
                    state,
                    attempted: "complete",
                });
            }
        }

        let result = self.install(&session.draft).await;
        match result {
            Ok(outcome) => {
                // Drop the draft (and with it the plaintext password) now that it is persisted.
                session.draft = WizardDraft::default();
                session.enter(WizardState::Completed);
                info!(
                    "[PHASE: wizard] [STEP: summary] Install complete for '{}'",
                    outcome.config.site_name
                );
                Ok(outcome)
            }
            Err(e @ WizardError::Persist(PersistError::Locked { .. })) => {
                // Nothing was written; the user may retry once the other installer is done.
                warn!("[PHASE: wizard] [STEP: summary] Install deferred: {}", e);
                Err(e)
            }
            Err(e) => {
                session.enter(WizardState::Failed);
                warn!("[PHASE: wizard] [STEP: summary] Install failed: {}", e);
                Err(e)
            }
        }
    }

    async fn install(&self, draft: &WizardDraft) -> Result<InstallOutcome, WizardError> {
        let email = draft
            .admin_email
            .as_deref()
            .ok_or(PersistError::IncompleteDraft("admin email"))?;
        let password = draft
            .admin_password
            .as_ref()
            .ok_or(PersistError::IncompleteDraft("admin password"))?;

        let admin = self
            .admin
            .provision(email, password.expose(), password.expose())?;
        let config = self.store.commit(draft).await?;
        Ok(InstallOutcome { config, admin })
    }

    async fn check_dependency(
        &self,
        check: DependencyCheck,
        input: &StepInput,
    ) -> Result<(), WizardError> {
        match (check, input) {
            (DependencyCheck::NotInstalled, _) => {
                if self.store.is_installed().await? {
                    info!("[PHASE: wizard] [STEP: welcome] Site is already installed");
                    return Err(WizardError::AlreadyInstalled);
                }
            }
            (DependencyCheck::ConfigAndDatabase, StepInput::TestConfig(i)) => {
                for path in [self.store.config_path(), self.store.connection_path()] {
                    self.validator
                        .check_writable(path)
                        .await
                        .map_err(|e| DependencyUnavailable::new("configuration", e.to_string()))?;
                }
                self.validator
                    .check_database(i.database_provider, i.connection_string.expose())
                    .await?;
            }
            (DependencyCheck::AttachmentsFolder, StepInput::SiteSettings(i)) => {
                let folder = resolve_under_site_root(&self.site_root, &i.attachments_folder);
                self.validator
                    .check_directory_writable(&folder)
                    .await
                    .map_err(|e| DependencyUnavailable::new("attachments", e.to_string()))?;
            }
            (DependencyCheck::PasswordPolicy, StepInput::AdminAccount(i)) => {
                self.admin.check_password_policy(i.admin_password.expose())?;
            }
            _ => {}
        }
        Ok(())
    }
}

fn merge(draft: &mut WizardDraft, input: StepInput) {
    match input {
        StepInput::Welcome => {}
        StepInput::TestConfig(i) => {
            draft.database_provider = Some(i.database_provider);
            draft.connection_string = Some(i.connection_string);
        }
        StepInput::SiteSettings(i) => {
            draft.site_name = Some(i.site_name.trim().to_string());
            draft.site_url = i.site_url.filter(|u| !u.trim().is_empty());
            draft.attachments_folder = Some(i.attachments_folder.trim().to_string());
            draft.markup_type = i.markup_type;
            draft.theme = i.theme.filter(|t| !t.trim().is_empty());
            draft.enable_object_cache = i.enable_object_cache;
            draft.allow_user_signup = i.allow_user_signup;
        }
        StepInput::AdminAccount(i) => {
            draft.admin_email = Some(i.admin_email.trim().to_string());
            draft.admin_password = Some(i.admin_password);
        }
    }
}
