//! Internationalization (i18n) support
//!
//! UI strings ship embedded for `pt-BR` (the default) and `en`. A site can
//! override or add strings with `languages/<lang>.yml` files.

use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Language used when a key is missing from the current language
pub const FALLBACK_LANGUAGE: &str = "pt-BR";

const BUILTIN: [(&str, &str); 2] = [
    ("pt-BR", include_str!("pt-BR.yml")),
    ("en", include_str!("en.yml")),
];

type Translations = HashMap<String, serde_yaml::Value>;

/// Internationalization handler
pub struct I18n {
    /// Current language
    language: String,
    /// Language data: lang -> key -> translation
    translations: HashMap<String, Translations>,
}

impl I18n {
    /// Create a handler with the built-in languages loaded
    pub fn new(language: &str) -> Self {
        let mut translations = HashMap::new();
        for (lang, source) in BUILTIN {
            match serde_yaml::from_str::<Translations>(source) {
                Ok(data) => {
                    translations.insert(lang.to_string(), data);
                }
                Err(e) => tracing::error!("Built-in language {} is invalid: {}", lang, e),
            }
        }

        Self {
            language: resolve_language(language, &translations),
            translations,
        }
    }

    /// Load `<lang>.yml` files from a directory, merging over the built-ins
    pub fn load_languages<P: AsRef<Path>>(&mut self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        if !dir.exists() {
            return Ok(());
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let ext = path.extension().and_then(|e| e.to_str());
            if !path.is_file() || !matches!(ext, Some("yml") | Some("yaml")) {
                continue;
            }

            let Some(lang) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let content = fs::read_to_string(&path)?;
            match serde_yaml::from_str::<Translations>(&content) {
                Ok(data) => {
                    let target = self.translations.entry(lang.to_string()).or_default();
                    merge(target, data);
                    tracing::debug!("Loaded language file: {:?}", path);
                }
                Err(e) => tracing::warn!("Failed to parse language file {:?}: {}", path, e),
            }
        }

        self.language = resolve_language(&self.language, &self.translations);
        Ok(())
    }

    /// Get the current language
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Get a translation by key, e.g. `list.load_more`
    pub fn get(&self, key: &str) -> String {
        for lang in [self.language.as_str(), FALLBACK_LANGUAGE] {
            if let Some(value) = self
                .translations
                .get(lang)
                .and_then(|data| get_nested_value(data, key))
            {
                return yaml_value_to_string(value);
            }
        }

        // Return key as fallback
        key.to_string()
    }

    /// All translations for the current language, flattened with dot keys
    /// and completed from the fallback language
    pub fn get_all_translations(&self) -> HashMap<String, String> {
        let mut result = HashMap::new();

        if let Some(lang_data) = self.translations.get(&self.language) {
            flatten_translations(lang_data, "", &mut result);
        }

        if self.language != FALLBACK_LANGUAGE {
            if let Some(fallback) = self.translations.get(FALLBACK_LANGUAGE) {
                let mut fallback_result = HashMap::new();
                flatten_translations(fallback, "", &mut fallback_result);
                for (k, v) in fallback_result {
                    result.entry(k).or_insert(v);
                }
            }
        }

        result
    }
}

impl Default for I18n {
    fn default() -> Self {
        Self::new(FALLBACK_LANGUAGE)
    }
}

/// Match `pt-br`, `pt_BR`, `en-US`... to a loaded language
fn resolve_language(requested: &str, translations: &HashMap<String, Translations>) -> String {
    let normalized = requested.replace('_', "-");
    if let Some(lang) = translations
        .keys()
        .find(|lang| lang.eq_ignore_ascii_case(&normalized))
    {
        return lang.clone();
    }

    let base = normalized.split('-').next().unwrap_or("");
    translations
        .keys()
        .find(|lang| {
            lang.split('-')
                .next()
                .map(|b| b.eq_ignore_ascii_case(base))
                .unwrap_or(false)
        })
        .cloned()
        .unwrap_or_else(|| FALLBACK_LANGUAGE.to_string())
}

/// Deep-merge `overrides` into `target`
fn merge(target: &mut Translations, overrides: Translations) {
    for (key, value) in overrides {
        match (target.get_mut(&key), value) {
            (Some(serde_yaml::Value::Mapping(existing)), serde_yaml::Value::Mapping(new)) => {
                for (k, v) in new {
                    existing.insert(k, v);
                }
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

/// Get a nested value from a YAML map using dot notation
fn get_nested_value<'a>(data: &'a Translations, key: &str) -> Option<&'a serde_yaml::Value> {
    let mut parts = key.split('.');
    let mut current = data.get(parts.next()?);

    for part in parts {
        match current {
            Some(serde_yaml::Value::Mapping(map)) => {
                current = map.get(serde_yaml::Value::String(part.to_string()));
            }
            _ => return None,
        }
    }

    current
}

/// Convert a YAML value to a string
fn yaml_value_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => String::new(),
        _ => format!("{:?}", value),
    }
}

/// Flatten translations into a HashMap with dot-notation keys
fn flatten_translations(data: &Translations, prefix: &str, result: &mut HashMap<String, String>) {
    for (key, value) in data {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            serde_yaml::Value::Mapping(map) => {
                let nested: Translations = map
                    .iter()
                    .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v.clone())))
                    .collect();
                flatten_translations(&nested, &full_key, result);
            }
            serde_yaml::Value::Sequence(_) | serde_yaml::Value::Tagged(_) => {}
            other => {
                result.insert(full_key, yaml_value_to_string(other));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_portuguese() {
        let i18n = I18n::default();
        assert_eq!(i18n.language(), "pt-BR");
        assert_eq!(i18n.get("list.load_more"), "Carregar mais posts");
        assert_eq!(i18n.get("post.loading"), "Carregando...");
        assert_eq!(i18n.get("unknown.key"), "unknown.key");
    }

    #[test]
    fn test_language_resolution() {
        assert_eq!(I18n::new("en-US").language(), "en");
        assert_eq!(I18n::new("pt_br").language(), "pt-BR");
        assert_eq!(I18n::new("fr").language(), "pt-BR");
        assert_eq!(I18n::new("en").get("list.load_more"), "Load more posts");
    }

    #[test]
    fn test_get_all_translations() {
        let all = I18n::new("en").get_all_translations();
        assert_eq!(all.get("post.reading_time"), Some(&"min".to_string()));
        assert_eq!(all.get("list.retry"), Some(&"Try again".to_string()));
    }

    #[test]
    fn test_override_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("pt-BR.yml"),
            "list:\n  load_more: Mais posts\n",
        )
        .unwrap();

        let mut i18n = I18n::default();
        i18n.load_languages(dir.path()).unwrap();
        assert_eq!(i18n.get("list.load_more"), "Mais posts");
        // sibling keys survive the merge
        assert_eq!(i18n.get("list.retry"), "Tentar novamente");
    }
}
