//! Installer UI text.
//!
//! Each supported language ships a flat TOML catalog (`locales/<code>.toml`) embedded in the
//! binary. Lookups fall back to English, then to the key itself, so a partial translation never
//! leaves a blank label. Languages are always addressed by code, never by list position.

use log::warn;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::errors::WizardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    #[default]
    English,
    Catalan,
    Czech,
    German,
    Dutch,
    Spanish,
    Italian,
    Hindi,
    Polish,
    Portuguese,
    Russian,
    Swedish,
}

impl Language {
    /// Display order of the language picker.
    pub const ALL: [Language; 12] = [
        Language::English,
        Language::Catalan,
        Language::Czech,
        Language::German,
        Language::Dutch,
        Language::Spanish,
        Language::Italian,
        Language::Hindi,
        Language::Polish,
        Language::Portuguese,
        Language::Russian,
        Language::Swedish,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Catalan => "ca",
            Language::Czech => "cs",
            Language::German => "de",
            Language::Dutch => "nl",
            Language::Spanish => "es",
            Language::Italian => "it",
            Language::Hindi => "hi",
            Language::Polish => "pl",
            Language::Portuguese => "pt",
            Language::Russian => "ru",
            Language::Swedish => "sv",
        }
    }

    /// Accepts a bare code (`de`) or a culture tag (`de-DE`, `pt_BR`), case-insensitively.
    pub fn from_code(code: &str) -> Option<Language> {
        let primary = code
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        Language::ALL.into_iter().find(|l| l.code() == primary)
    }

    /// Name of the language in that language, as shown in the picker.
    pub fn native_name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Catalan => "Català",
            Language::Czech => "Čeština",
            Language::German => "Deutsch",
            Language::Dutch => "Nederlands",
            Language::Spanish => "Español",
            Language::Italian => "Italiano",
            Language::Hindi => "हिन्दी",
            Language::Polish => "Polski",
            Language::Portuguese => "Português",
            Language::Russian => "Русский",
            Language::Swedish => "Svenska",
        }
    }

    fn source(&self) -> &'static str {
        match self {
            Language::English => include_str!("../../locales/en.toml"),
            Language::Catalan => include_str!("../../locales/ca.toml"),
            Language::Czech => include_str!("../../locales/cs.toml"),
            Language::German => include_str!("../../locales/de.toml"),
            Language::Dutch => include_str!("../../locales/nl.toml"),
            Language::Spanish => include_str!("../../locales/es.toml"),
            Language::Italian => include_str!("../../locales/it.toml"),
            Language::Hindi => include_str!("../../locales/hi.toml"),
            Language::Polish => include_str!("../../locales/pl.toml"),
            Language::Portuguese => include_str!("../../locales/pt.toml"),
            Language::Russian => include_str!("../../locales/ru.toml"),
            Language::Swedish => include_str!("../../locales/sv.toml"),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Parsed message table for one language.
#[derive(Debug, Default)]
pub struct LanguageCatalog {
    language: Language,
    entries: HashMap<String, String>,
}

impl LanguageCatalog {
    fn parse(language: Language) -> Self {
        let entries = match toml::from_str::<HashMap<String, String>>(language.source()) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "[PHASE: localization] [STEP: load] Catalog for {} is unreadable, using fallback: {}",
                    language, e
                );
                HashMap::new()
            }
        };
        Self { language, entries }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Entry for a language picker.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageOption {
    pub code: &'static str,
    pub native_name: &'static str,
}

/// Resolves message keys against the embedded catalogs.
///
/// Catalogs are parsed on first use and shared by every provider in the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalizationProvider;

static CATALOGS: OnceLock<Vec<LanguageCatalog>> = OnceLock::new();

impl LocalizationProvider {
    pub fn new() -> Self {
        Self
    }

    pub fn catalog(&self, language: Language) -> &'static LanguageCatalog {
        let catalogs = CATALOGS.get_or_init(|| {
            Language::ALL
                .into_iter()
                .map(LanguageCatalog::parse)
                .collect()
        });
        // ALL and the catalog list share one order.
        let index = Language::ALL
            .iter()
            .position(|l| *l == language)
            .unwrap_or_default();
        &catalogs[index]
    }

    pub fn languages(&self) -> Vec<LanguageOption> {
        Language::ALL
            .into_iter()
            .map(|l| LanguageOption {
                code: l.code(),
                native_name: l.native_name(),
            })
            .collect()
    }

    /// Text for `key` in `language`; English when the language lacks it, the key when both do.
    pub fn resolve(&self, language: Language, key: &str) -> String {
        if let Some(text) = self.catalog(language).get(key) {
            return text.to_string();
        }
        if language != Language::English {
            if let Some(text) = self.catalog(Language::English).get(key) {
                warn!(
                    "[PHASE: localization] [STEP: resolve] Missing '{}' for {}, using English",
                    key, language
                );
                return text.to_string();
            }
        }
        warn!(
            "[PHASE: localization] [STEP: resolve] Missing '{}' in every catalog",
            key
        );
        key.to_string()
    }

    pub fn localize_error(&self, language: Language, error: &WizardError) -> String {
        self.resolve(language, error.message_key())
    }
}
