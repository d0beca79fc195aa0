use std::collections::BTreeMap;

use thiserror::Error;

use crate::static_config::{StaticConfigItem, STATIC_CONFIG_TABLE};

#[derive(Clone, Debug, PartialEq)]
pub enum ConfigValue {
    Text(String),
    Number(i64),
    Flag(bool),
}

impl ConfigValue {
    fn default_for(item: &StaticConfigItem) -> Option<Self> {
        match item.value_type {
            "string" => Some(Self::Text(item.default_value.to_string())),
            "number" => item.default_value.parse().ok().map(Self::Number),
            "boolean" => item.default_value.parse().ok().map(Self::Flag),
            _ => None,
        }
    }
}

/// Validated `section.key` settings. Keys missing from the file resolve to
/// their default in the static key table.
#[derive(Clone, Debug, Default)]
pub struct SystemConfig {
    values: BTreeMap<String, ConfigValue>,
}

impl SystemConfig {
    pub fn value(&self, key: &str) -> Option<ConfigValue> {
        self.values
            .get(key)
            .cloned()
            .or_else(|| lookup(key).and_then(ConfigValue::default_for))
    }

    pub fn get_string(&self, key: &str) -> String {
        match self.value(key) {
            Some(ConfigValue::Text(text)) => text,
            Some(ConfigValue::Number(number)) => number.to_string(),
            Some(ConfigValue::Flag(flag)) => flag.to_string(),
            None => String::new(),
        }
    }

    pub fn get_number(&self, key: &str) -> i64 {
        match self.value(key) {
            Some(ConfigValue::Number(number)) => number,
            _ => 0,
        }
    }

    /// Zero or negative values fall back to `fallback`.
    pub fn get_positive(&self, key: &str, fallback: u64) -> u64 {
        u64::try_from(self.get_number(key))
            .ok()
            .filter(|value| *value > 0)
            .unwrap_or(fallback)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.value(key), Some(ConfigValue::Flag(true)))
    }

    /// Keys present in the file, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config file: {0}")]
    Parse(String),
    #[error("unrecognized config key `{0}`")]
    UnknownKey(String),
    #[error("config key `{0}` expects a {1} value")]
    TypeMismatch(String, String),
}

pub struct SystemConfigLoader;

impl SystemConfigLoader {
    /// Fails on the first unknown key or mistyped value.
    pub fn from_str(input: &str) -> Result<SystemConfig, ConfigError> {
        let root: toml::Table =
            toml::from_str(input).map_err(|err| ConfigError::Parse(err.to_string()))?;
        let mut config = SystemConfig::default();
        flatten("", &root, &mut config.values)?;
        Ok(config)
    }

    /// Renders every known key with its default, grouped by section.
    pub fn default_template() -> String {
        let mut sections: BTreeMap<&str, Vec<&StaticConfigItem>> = BTreeMap::new();
        for item in STATIC_CONFIG_TABLE {
            let section = item.key.split_once('.').map(|(section, _)| section).unwrap_or("");
            sections.entry(section).or_default().push(item);
        }
        let mut out = String::new();
        for (section, items) in sections {
            out.push_str(&format!("[{section}]\n"));
            for item in items {
                let name = item.key.rsplit('.').next().unwrap_or(item.key);
                let value = match item.value_type {
                    "string" => format!("{:?}", item.default_value),
                    _ => item.default_value.to_string(),
                };
                out.push_str(&format!("# {}\n{name} = {value}\n", item.description));
            }
            out.push('\n');
        }
        out
    }
}

fn flatten(
    prefix: &str,
    table: &toml::Table,
    out: &mut BTreeMap<String, ConfigValue>,
) -> Result<(), ConfigError> {
    for (name, value) in table {
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        if let toml::Value::Table(nested) = value {
            flatten(&key, nested, out)?;
            continue;
        }
        let item = lookup(&key).ok_or_else(|| ConfigError::UnknownKey(key.clone()))?;
        let parsed = match (item.value_type, value) {
            ("string", toml::Value::String(text)) => ConfigValue::Text(text.clone()),
            ("number", toml::Value::Integer(number)) => ConfigValue::Number(*number),
            ("boolean", toml::Value::Boolean(flag)) => ConfigValue::Flag(*flag),
            (expected, _) => return Err(ConfigError::TypeMismatch(key, expected.to_string())),
        };
        out.insert(key, parsed);
    }
    Ok(())
}

fn lookup(key: &str) -> Option<&'static StaticConfigItem> {
    STATIC_CONFIG_TABLE.iter().find(|item| item.key == key)
}
