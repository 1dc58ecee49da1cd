// Roadkill wiki installer
// Library entry point: module tree, logging setup and the headless runners used by the binary.

pub mod api;
pub mod config;
pub mod database;
pub mod errors;
pub mod localization;
pub mod models;
pub mod security;
#[cfg(test)]
mod test_support;
pub mod utils;
pub mod wizard;

pub use api::wizard::WizardStateMachine;
pub use config::store::ConfigStore;
pub use errors::{PersistError, ValidationError, WizardError};
pub use localization::{Language, LocalizationProvider};
pub use models::requests::{AnswersFile, StepInput};
pub use models::responses::{InstallOutcome, StepView};
pub use models::state::WizardState;
pub use utils::settings::InstallerSettings;

use anyhow::Context;
use log::{error, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use database::connection::{DbConnector, RealDbConnector};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_ALREADY_INSTALLED: i32 = 3;

/// Initialize logging with dual format (JSON `.log` + human-readable `.txt`), optionally echoing
/// the text format to stdout. Returns the log directory.
pub fn init_logging(settings: &InstallerSettings, with_stdout: bool) -> anyhow::Result<PathBuf> {
    let log_dir =
        utils::path_resolver::resolve_log_folder(&settings.site_root, settings.log_dir.as_deref())?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%d-%H%M%S");
    let json_log_file = log_dir.join(format!("installer-{}.log", timestamp));
    let txt_log_file = log_dir.join(format!("installer-{}.txt", timestamp));

    let mut dispatch = fern::Dispatch::new()
        .level(log::LevelFilter::Debug)
        .level_for("sqlx", log::LevelFilter::Warn)
        .level_for("tiberius", log::LevelFilter::Warn);

    if with_stdout {
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .level(log::LevelFilter::Info)
                .format(|out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = message.to_string();
                    let (phase, step, cleaned) = utils::logging::parse_log_metadata(&message_str);
                    out.finish(format_args!(
                        "{}",
                        utils::logging::format_human_readable_log(
                            &timestamp_local.to_string(),
                            record.level(),
                            record.target(),
                            &cleaned,
                            phase.as_deref(),
                            step.as_deref(),
                        )
                    ));
                })
                .chain(std::io::stdout()),
        );
    }

    dispatch = dispatch
        .chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    let timestamp_utc = chrono::Utc::now().to_rfc3339();
                    let message_str = message.to_string();
                    let (phase, step, cleaned) = utils::logging::parse_log_metadata(&message_str);
                    out.finish(format_args!(
                        "{}",
                        utils::logging::format_json_log(
                            &timestamp_utc,
                            record.level(),
                            record.target(),
                            &cleaned,
                            phase.as_deref(),
                            step.as_deref(),
                        )
                    ));
                })
                .chain(fern::log_file(&json_log_file)?),
        )
        .chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = message.to_string();
                    let (phase, step, cleaned) = utils::logging::parse_log_metadata(&message_str);
                    out.finish(format_args!(
                        "{}",
                        utils::logging::format_human_readable_log(
                            &timestamp_local.to_string(),
                            record.level(),
                            record.target(),
                            &cleaned,
                            phase.as_deref(),
                            step.as_deref(),
                        )
                    ));
                })
                .chain(fern::log_file(&txt_log_file)?),
        );

    dispatch.apply()?;

    info!(
        "[PHASE: initialization] Logging initialized, log directory: {:?}",
        log_dir
    );
    Ok(log_dir)
}

/// Settings from an explicit file, else the first `roadkill-installer.toml` found, plus env.
pub fn load_settings(explicit: Option<&Path>) -> anyhow::Result<InstallerSettings> {
    let file = explicit
        .map(Path::to_path_buf)
        .or_else(utils::path_resolver::resolve_settings_file);
    InstallerSettings::load(file.as_deref())
}

pub fn read_answers(path: &Path) -> anyhow::Result<AnswersFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read answers file {:?}", path))?;
    toml::from_str(&text).with_context(|| format!("Invalid answers file {:?}", path))
}

/// Command-line code first, then the answers file, then the configured default.
pub fn pick_language(cli: Option<&str>, answers: Option<&str>, default: Language) -> Language {
    for code in [cli, answers].into_iter().flatten() {
        match Language::from_code(code) {
            Some(language) => return language,
            None => warn!(
                "[PHASE: initialization] [STEP: language] Unsupported language '{}', ignoring",
                code
            ),
        }
    }
    default
}

/// Drive a full wizard session from prepared answers, reporting progress to `out`.
pub async fn install_from_answers(
    settings: &InstallerSettings,
    store: Arc<ConfigStore>,
    connector: Arc<dyn DbConnector>,
    answers: AnswersFile,
    language: Language,
    out: &mut dyn Write,
) -> Result<InstallOutcome, WizardError> {
    let text = LocalizationProvider::new();
    let wizard = WizardStateMachine::from_settings(settings, store, connector).with_language(language);

    let _ = writeln!(out, "{}", text.resolve(language, "welcome.intro"));
    for input in answers.into_inputs() {
        let view = wizard.current_step().await;
        let _ = writeln!(
            out,
            "[{}/{}] {}",
            view.step_number,
            view.total_steps,
            view.localized_title(&text, language)
        );
        if let Err(e) = wizard.advance(input).await {
            let _ = writeln!(out, "{}", text.localize_error(language, &e));
            return Err(e);
        }
    }

    let view = wizard.current_step().await;
    let _ = writeln!(
        out,
        "[{}/{}] {}",
        view.step_number,
        view.total_steps,
        view.localized_title(&text, language)
    );
    match wizard.complete().await {
        Ok(outcome) => {
            let done = wizard.current_step().await;
            let _ = writeln!(out, "{}", done.localized_title(&text, language));
            Ok(outcome)
        }
        Err(e) => {
            let _ = writeln!(out, "{}", text.localize_error(language, &e));
            Err(e)
        }
    }
}

/// `--answers <file>`: headless install. Returns the process exit code.
pub async fn run_answers(
    settings: &InstallerSettings,
    answers_path: &Path,
    language: Option<&str>,
) -> i32 {
    let answers = match read_answers(answers_path) {
        Ok(a) => a,
        Err(e) => {
            error!("[PHASE: initialization] [STEP: answers] {:#}", e);
            eprintln!("Installer error: {:#}", e);
            return EXIT_FAILED;
        }
    };
    let language = pick_language(
        language,
        answers.language.as_deref(),
        settings.default_language(),
    );
    info!(
        "[PHASE: initialization] [STEP: answers] Headless install from {:?} (language={})",
        answers_path, language
    );

    let store = Arc::new(ConfigStore::from_settings(settings));
    let connector = Arc::new(RealDbConnector::from_settings(settings));
    let mut stdout = std::io::stdout();
    match install_from_answers(settings, store, connector, answers, language, &mut stdout).await {
        Ok(_) => EXIT_OK,
        Err(WizardError::AlreadyInstalled) => EXIT_ALREADY_INSTALLED,
        Err(e) if e.is_user_correctable() => {
            warn!(
                "[PHASE: wizard] [STEP: answers] Answers rejected, fix {:?} and run again: {}",
                answers_path, e
            );
            EXIT_FAILED
        }
        Err(e) => {
            error!("[PHASE: wizard] [STEP: fatal] Headless install failed: {}", e);
            EXIT_FAILED
        }
    }
}

/// `--status`: print whether the site is installed.
pub async fn run_status(settings: &InstallerSettings) -> i32 {
    let store = ConfigStore::from_settings(settings);
    match store.load().await {
        Ok(Some(site)) => {
            let cfg = &site.config;
            println!("installed: {}", if cfg.installed { "yes" } else { "no" });
            println!("site: {}", cfg.site_name);
            println!("database: {}", cfg.database_provider);
            if let Some(at) = cfg.installed_utc {
                println!("installed at: {}", at.to_rfc3339());
            }
            EXIT_OK
        }
        Ok(None) => {
            println!("installed: no");
            println!("config: {:?} (not found)", store.config_path());
            EXIT_OK
        }
        Err(e) => {
            error!("[PHASE: status] [STEP: load] {}", e);
            eprintln!("Installer error: {}", e);
            EXIT_FAILED
        }
    }
}

/// `--reset`: reopen the wizard for an installed site.
pub async fn run_reset(settings: &InstallerSettings) -> i32 {
    let store = ConfigStore::from_settings(settings);
    match store.reset().await {
        Ok(true) => {
            println!("{:?} reset; the installer will run again.", store.config_path());
            EXIT_OK
        }
        Ok(false) => {
            println!("Nothing to reset: {:?} not found.", store.config_path());
            EXIT_OK
        }
        Err(e) => {
            error!("[PHASE: reset] [STEP: fatal] {}", e);
            eprintln!("Installer error: {}", e);
            EXIT_FAILED
        }
    }
}

/// `--languages`: supported languages by code.
pub fn print_languages(out: &mut dyn Write) -> std::io::Result<()> {
    for option in LocalizationProvider::new().languages() {
        writeln!(out, "{}\t{}", option.code, option.native_name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::KeywordStub;

    const ANSWERS: &str = r#"
language = "de"

[database]
databaseProvider = "SqlServer2008"
connectionString = 'Server=(LocalDB)\v11.0;Integrated Security=true;'

[site]
siteName = "Acceptance tests"
enableObjectCache = true

[admin]
adminEmail = "admin@localhost"
adminPassword = "password"
confirmPassword = "password"
"#;

    fn settings_in(dir: &Path) -> InstallerSettings {
        InstallerSettings {
            site_root: dir.to_path_buf(),
            pbkdf2_iterations: 1_000,
            ..InstallerSettings::default()
        }
    }

    #[tokio::test]
    async fn answers_install_prints_localized_progress() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_in(tmp.path());
        let store = Arc::new(ConfigStore::from_settings(&settings));
        let answers: AnswersFile = toml::from_str(ANSWERS).unwrap();
        let language = pick_language(None, answers.language.as_deref(), Language::English);
        let mut out = Vec::new();

        let outcome = install_from_answers(
            &settings,
            Arc::clone(&store),
            Arc::new(KeywordStub),
            answers,
            language,
            &mut out,
        )
        .await
        .unwrap();

        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("Danke, dass Sie Roadkill .NET Wiki-Engine herunterladen"));
        assert!(printed.contains("[3/5] Website-Einstellungen"), "{}", printed);
        assert!(printed.contains("Installation abgeschlossen"), "{}", printed);
        assert!(outcome.config.installed);
        assert!(store.is_installed().await.unwrap());
    }

    #[tokio::test]
    async fn second_headless_run_reports_already_installed() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_in(tmp.path());
        let store = Arc::new(ConfigStore::from_settings(&settings));
        for expect_ok in [true, false] {
            let answers: AnswersFile = toml::from_str(ANSWERS).unwrap();
            let mut out = Vec::new();
            let result = install_from_answers(
                &settings,
                Arc::clone(&store),
                Arc::new(KeywordStub),
                answers,
                Language::English,
                &mut out,
            )
            .await;
            if expect_ok {
                assert!(result.is_ok());
            } else {
                assert!(matches!(result, Err(WizardError::AlreadyInstalled)));
                let printed = String::from_utf8(out).unwrap();
                assert!(printed.contains("Roadkill is already installed."));
            }
        }
    }

    #[test]
    fn language_precedence_is_cli_then_answers_then_default() {
        assert_eq!(
            pick_language(Some("sv"), Some("de"), Language::English),
            Language::Swedish
        );
        assert_eq!(
            pick_language(Some("xx"), Some("de"), Language::English),
            Language::German
        );
        assert_eq!(pick_language(None, None, Language::Dutch), Language::Dutch);
    }

    #[test]
    fn language_listing_is_keyed_by_code() {
        let mut out = Vec::new();
        print_languages(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 12);
        assert_eq!(lines[0], "en\tEnglish");
        assert!(lines.contains(&"sv\tSvenska"));
    }

    #[test]
    fn answers_file_errors_name_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("answers.toml");
        std::fs::write(&path, "[database]\n").unwrap();
        let err = read_answers(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("answers.toml"));
    }
}
