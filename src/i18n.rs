//! Localized UI strings.
//!
//! English and Korean tables are compiled in from `locales/`. `t!` reads the
//! active table and falls back to English, then to the key itself.

use std::collections::HashMap;
use std::sync::Mutex;

const FALLBACK: &str = "en";

/// Selectable languages as (code, name shown in the picker).
pub const LANGUAGES: &[(&str, &str)] = &[("en", "English"), ("ko", "한국어")];

static CATALOG: Mutex<Option<Catalog>> = Mutex::new(None);

struct Catalog {
    active: String,
    tables: HashMap<&'static str, HashMap<String, String>>,
}

impl Catalog {
    fn embedded() -> Self {
        let tables = HashMap::from([
            ("en", parse_translations(include_str!("../locales/en.txt"))),
            ("ko", parse_translations(include_str!("../locales/ko.txt"))),
        ]);
        Self {
            active: FALLBACK.to_string(),
            tables,
        }
    }

    fn lookup(&self, lang: &str, key: &str) -> Option<&String> {
        self.tables.get(lang)?.get(key)
    }
}

/// Load the embedded tables. English is active until [`set_language`].
pub fn init() {
    if let Ok(mut guard) = CATALOG.lock() {
        *guard = Some(Catalog::embedded());
    }
}

/// Switch tables. Unknown codes select English.
pub fn set_language(code: &str) {
    let Ok(mut guard) = CATALOG.lock() else {
        return;
    };
    let Some(catalog) = guard.as_mut() else {
        return;
    };
    catalog.active = if catalog.tables.contains_key(code) {
        code.to_string()
    } else {
        log::debug!("unknown language {:?}, using {}", code, FALLBACK);
        FALLBACK.to_string()
    };
}

pub fn current_language() -> String {
    CATALOG
        .lock()
        .ok()
        .and_then(|guard| guard.as_ref().map(|c| c.active.clone()))
        .unwrap_or_else(|| FALLBACK.to_string())
}

/// String for `key` in the active language, else English, else `key`.
pub fn translate(key: &str) -> String {
    if let Ok(guard) = CATALOG.lock()
        && let Some(catalog) = guard.as_ref()
        && let Some(text) = catalog
            .lookup(&catalog.active, key)
            .or_else(|| catalog.lookup(FALLBACK, key))
    {
        return text.clone();
    }
    key.to_string()
}

/// First supported language named by the POSIX locale variables.
pub fn detect_system_language() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG", "LANGUAGE"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find_map(|value| match_system_locale(&value))
        .unwrap_or_else(|| FALLBACK.to_string())
}

/// `ko_KR.UTF-8` → `ko`, `en-US` → `en`; `None` when unsupported.
fn match_system_locale(locale: &str) -> Option<String> {
    let lowered = locale.to_lowercase();
    let tag = lowered.split(['.', '@']).next().unwrap_or_default();
    let primary = tag.split(['-', '_']).next().unwrap_or_default();
    LANGUAGES
        .iter()
        .map(|(code, _)| *code)
        .find(|code| *code == primary)
        .map(str::to_string)
}

/// `key = value` per line; blank lines and `#` lines are skipped.
fn parse_translations(data: &str) -> HashMap<String, String> {
    data.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// `t!("ui.generate")`, or with substitutions:
/// `t!("ui.load_failed", reason = err)` fills `{reason}`.
#[macro_export]
macro_rules! t {
    ($key:expr) => {
        $crate::i18n::translate($key)
    };
    ($key:expr, $($name:ident = $val:expr),+ $(,)?) => {{
        let mut text = $crate::i18n::translate($key);
        $(
            text = text.replace(concat!("{", stringify!($name), "}"), &format!("{}", $val));
        )+
        text
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comments_and_blank_lines() {
        let map = parse_translations("# header\n\nblend.color = Color\nbroken line\nui.x=a=b\n");
        assert_eq!(map.len(), 2);
        assert_eq!(map["blend.color"], "Color");
        assert_eq!(map["ui.x"], "a=b");
    }

    #[test]
    fn matches_locales() {
        assert_eq!(match_system_locale("ko_KR.UTF-8").as_deref(), Some("ko"));
        assert_eq!(match_system_locale("en-US").as_deref(), Some("en"));
        assert_eq!(match_system_locale("C"), None);
        assert_eq!(match_system_locale("fr_FR"), None);
    }

    #[test]
    fn locales_share_keys() {
        let en = parse_translations(include_str!("../locales/en.txt"));
        let ko = parse_translations(include_str!("../locales/ko.txt"));
        for key in en.keys() {
            assert!(ko.contains_key(key), "ko is missing {}", key);
        }
    }

    #[test]
    fn switching_language() {
        init();
        set_language("ko");
        assert_eq!(current_language(), "ko");
        assert_eq!(translate("blend.multiply"), "곱하기");
        assert_eq!(translate("no.such.key"), "no.such.key");
        set_language("xx");
        assert_eq!(current_language(), "en");
        assert_eq!(translate("blend.multiply"), "Multiply");
        assert_eq!(t!("ui.load_failed", reason = "gone"), "Could not load image: gone");
    }
}
