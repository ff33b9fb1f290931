//! Internationalization (i18n) module
//!
//! Picks the console language from the system locale. Supports English and
//! Chinese Simplified; strings live in `locales/*.yml`.
//! Note: Log messages remain in English for consistency.

/// Supported languages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    ChineseSimplified,
}

impl Language {
    /// Locale key understood by `rust_i18n`
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::ChineseSimplified => "zh-CN",
        }
    }

    /// Map a BCP 47 / POSIX locale name onto a supported language
    pub fn from_locale(locale: &str) -> Self {
        let locale = locale.to_lowercase();
        if locale.starts_with("zh") || locale.contains("hans") {
            Language::ChineseSimplified
        } else {
            Language::English
        }
    }
}

/// Detect the system language and make it the active locale
pub fn init_locale() -> Language {
    let language = sys_locale::get_locale()
        .map(|locale| Language::from_locale(&locale))
        .unwrap_or(Language::English);
    rust_i18n::set_locale(language.code());
    language
}
