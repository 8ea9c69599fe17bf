//! Serializer configuration.
//!
//! The host pipeline hands over a flat string-to-string context. The same
//! keys can also be read from a YAML file or from the environment.

use serde_yaml::Value as YamlValue;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::document_id::DigestAlgorithm;

/// Fields that may contain a JSON string, to be parsed as an object
pub const OBJECT_FIELDS: &str = "objectFields";
/// Set to true to drop the `@fields` wrapper around custom fields
pub const REMOVE_FIELDS_PREFIX: &str = "removeFieldsPrefix";
/// Set to true to collate dot-notated field names into objects
pub const COLLATE_OBJECTS: &str = "collateObjects";
/// Accepted for compatibility. Collation depth is unlimited.
pub const COLLATE_DEPTH: &str = "collateDepth";
/// Set to true to derive document ids from the serialized content
pub const GENERATE_ID: &str = "generateId";
/// Digest used for document ids
pub const ID_DIGEST: &str = "idDigest";

const ENV_PREFIX: &str = "LOGSTASH_DOC_";

/// Error type for configuration loading
#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    YamlError(serde_yaml::Error),
    InvalidValue { key: String, reason: String },
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::YamlError(err)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::YamlError(e) => write!(f, "YAML error: {}", e),
            ConfigError::InvalidValue { key, reason } => {
                write!(f, "Invalid value for '{}': {}", key, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Immutable serializer settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SerializerConfig {
    /// Header names (plus the synthetic `body`) parsed as embedded documents
    pub object_fields: BTreeSet<String>,
    pub remove_fields_prefix: bool,
    pub collate_objects: bool,
    /// Raw `collateDepth` value, kept only for diagnostics
    pub collate_depth: Option<String>,
    pub generate_id: bool,
    pub id_digest: DigestAlgorithm,
}

impl SerializerConfig {
    /// Build a configuration from the host's flat context.
    ///
    /// Unknown keys are ignored. Boolean switches are on only for `true` or
    /// `1` (case-insensitive); any other value leaves them off.
    pub fn from_context(context: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            context
                .get(key)
                .map(|v| v.as_str())
                .filter(|v| !v.trim().is_empty())
        };

        let mut config = Self::default();
        if let Some(fields) = get(OBJECT_FIELDS) {
            config.object_fields = parse_field_list(fields);
        }
        config.remove_fields_prefix = get(REMOVE_FIELDS_PREFIX).map_or(false, is_truthy);
        config.collate_objects = get(COLLATE_OBJECTS).map_or(false, is_truthy);
        config.generate_id = get(GENERATE_ID).map_or(false, is_truthy);
        config.collate_depth = get(COLLATE_DEPTH).map(|s| s.to_string());
        if let Some(name) = get(ID_DIGEST) {
            config.id_digest = DigestAlgorithm::from_name(name);
        }
        config
    }

    /// Load a configuration from a YAML mapping using the context keys.
    ///
    /// Scalars are taken as their string form; `objectFields` may also be a
    /// sequence of names.
    ///
    /// # Example
    /// ```yaml
    /// objectFields: [params, anotherField]
    /// removeFieldsPrefix: true
    /// collateObjects: "1"
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    /// Parse a YAML configuration document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(Self::from_context(&context_from_yaml_str(contents)?))
    }

    /// Read the context keys from `LOGSTASH_DOC_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_context(&env_context())
    }

    /// Whether `name` is configured as an object field.
    pub fn is_object_field(&self, name: &str) -> bool {
        self.object_fields.contains(name)
    }
}

/// Flatten a YAML mapping into a context map.
pub fn context_from_yaml_str(contents: &str) -> Result<HashMap<String, String>, ConfigError> {
    let yaml: YamlValue = serde_yaml::from_str(contents)?;
    let mapping = match yaml {
        YamlValue::Mapping(mapping) => mapping,
        YamlValue::Null => return Ok(HashMap::new()),
        _ => {
            return Err(ConfigError::InvalidValue {
                key: "<root>".to_string(),
                reason: "expected a mapping".to_string(),
            })
        }
    };

    let mut context = HashMap::new();
    for (key, value) in mapping {
        let key = match key {
            YamlValue::String(s) => s,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: format!("{:?}", other),
                    reason: "keys must be strings".to_string(),
                })
            }
        };
        let value = match value {
            YamlValue::Sequence(items) if key == OBJECT_FIELDS => items
                .iter()
                .map(|item| yaml_scalar(&key, item))
                .collect::<Result<Vec<_>, _>>()?
                .join(","),
            other => yaml_scalar(&key, &other)?,
        };
        context.insert(key, value);
    }
    Ok(context)
}

/// Context entries taken from `LOGSTASH_DOC_*` environment variables.
pub fn env_context() -> HashMap<String, String> {
    [
        OBJECT_FIELDS,
        REMOVE_FIELDS_PREFIX,
        COLLATE_OBJECTS,
        GENERATE_ID,
        ID_DIGEST,
    ]
    .iter()
    .filter_map(|key| {
        std::env::var(env_name(key))
            .ok()
            .map(|value| (key.to_string(), value))
    })
    .collect()
}

/// `objectFields` -> `LOGSTASH_DOC_OBJECT_FIELDS`
fn env_name(key: &str) -> String {
    let mut name = String::from(ENV_PREFIX);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            name.push('_');
        }
        name.push(c.to_ascii_uppercase());
    }
    name
}

fn parse_field_list(fields: &str) -> BTreeSet<String> {
    fields
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(|f| f.to_string())
        .collect()
}

fn is_truthy(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

fn yaml_scalar(key: &str, value: &YamlValue) -> Result<String, ConfigError> {
    match value {
        YamlValue::String(s) => Ok(s.clone()),
        YamlValue::Bool(b) => Ok(b.to_string()),
        YamlValue::Number(n) => Ok(n.to_string()),
        YamlValue::Null => Ok(String::new()),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: "expected a scalar".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = SerializerConfig::from_context(&HashMap::new());

        assert!(config.object_fields.is_empty());
        assert!(!config.remove_fields_prefix);
        assert!(!config.collate_objects);
        assert!(!config.generate_id);
        assert_eq!(config.id_digest, DigestAlgorithm::Sha1);
    }

    #[test]
    fn test_object_fields_are_trimmed() {
        let config = SerializerConfig::from_context(&context(&[(
            OBJECT_FIELDS,
            " params, anotherField ,,",
        )]));

        assert_eq!(config.object_fields.len(), 2);
        assert!(config.is_object_field("params"));
        assert!(config.is_object_field("anotherField"));
        assert!(!config.is_object_field(""));
    }

    #[test]
    fn test_truthy_values() {
        for value in ["true", "TRUE", "True", "1"] {
            let config =
                SerializerConfig::from_context(&context(&[(REMOVE_FIELDS_PREFIX, value)]));
            assert!(config.remove_fields_prefix, "{} should be truthy", value);
        }
        for value in ["yes", "0", "false", " "] {
            let config = SerializerConfig::from_context(&context(&[(COLLATE_OBJECTS, value)]));
            assert!(!config.collate_objects, "{} should not be truthy", value);
        }
    }

    #[test]
    fn test_invalid_collate_depth_is_ignored() {
        let config = SerializerConfig::from_context(&context(&[
            (COLLATE_OBJECTS, "true"),
            (COLLATE_DEPTH, "blabla"),
        ]));

        assert!(config.collate_objects);
        assert_eq!(config.collate_depth.as_deref(), Some("blabla"));
    }

    #[test]
    fn test_id_digest_selection() {
        let config = SerializerConfig::from_context(&context(&[(ID_DIGEST, "sha-256")]));
        assert_eq!(config.id_digest, DigestAlgorithm::Sha256);

        let config = SerializerConfig::from_context(&context(&[(ID_DIGEST, "whirlpool")]));
        assert_eq!(
            config.id_digest,
            DigestAlgorithm::Unavailable("whirlpool".to_string())
        );
    }

    #[test]
    fn test_from_yaml_str() {
        let config = SerializerConfig::from_yaml_str(
            "objectFields: [params, other]\nremoveFieldsPrefix: true\ncollateObjects: 1\ngenerateId: \"no\"\n",
        )
        .unwrap();

        assert!(config.is_object_field("params"));
        assert!(config.is_object_field("other"));
        assert!(config.remove_fields_prefix);
        assert!(config.collate_objects);
        assert!(!config.generate_id);
    }

    #[test]
    fn test_from_yaml_str_rejects_non_mapping() {
        let result = SerializerConfig::from_yaml_str("- a\n- b\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_env_name() {
        assert_eq!(env_name(OBJECT_FIELDS), "LOGSTASH_DOC_OBJECT_FIELDS");
        assert_eq!(env_name(REMOVE_FIELDS_PREFIX), "LOGSTASH_DOC_REMOVE_FIELDS_PREFIX");
    }
}
