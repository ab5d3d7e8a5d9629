//! Fixture specifications.

use std::path::PathBuf;

use portcullis_spec::{parse_spec, parse_spec_file, ApiSpec, ParseError};
use thiserror::Error;

/// Errors from loading a fixture.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("fixture {name}: {source}")]
    Spec {
        name: String,
        #[source]
        source: ParseError,
    },

    #[error("fixture {name}: {source}")]
    Yaml {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("fixture {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Absolute path of a file under `fixtures/`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

/// Load a fixture specification as-is.
pub fn load_fixture(name: &str) -> Result<ApiSpec, FixtureError> {
    parse_spec_file(&fixture_path(name)).map_err(|source| FixtureError::Spec {
        name: name.to_string(),
        source,
    })
}

/// Load a fixture after editing its YAML tree.
pub fn load_fixture_with(
    name: &str,
    edit: impl FnOnce(&mut serde_yaml::Value),
) -> Result<ApiSpec, FixtureError> {
    let text = std::fs::read_to_string(fixture_path(name)).map_err(|source| FixtureError::Io {
        name: name.to_string(),
        source,
    })?;
    let yaml_error = |source| FixtureError::Yaml {
        name: name.to_string(),
        source,
    };
    let mut doc: serde_yaml::Value = serde_yaml::from_str(&text).map_err(yaml_error)?;
    edit(&mut doc);
    let text = serde_yaml::to_string(&doc).map_err(yaml_error)?;
    parse_spec(&text).map_err(|source| FixtureError::Spec {
        name: name.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_load() {
        for name in ["petstore.yaml", "inventory-3.0.yaml"] {
            let spec = load_fixture(name).unwrap();
            assert!(spec.version.is_some(), "{}", name);
        }
    }

    #[test]
    fn fixtures_can_be_edited() {
        let spec = load_fixture_with("petstore.yaml", |doc| {
            doc["openapi"] = serde_yaml::Value::String("2.0".into());
        })
        .unwrap();
        assert_eq!(spec.openapi, "2.0");
        assert!(spec.version.is_none());
    }

    #[test]
    fn missing_fixture_is_an_error() {
        assert!(load_fixture("nope.yaml").is_err());
    }
}
