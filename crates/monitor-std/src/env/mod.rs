mod in_memory;
mod system;

use std::env::VarError;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use tracing::warn;

#[cfg(any(test, feature = "test-support"))]
pub use in_memory::InMemoryEnv;
pub use system::SystemEnv;

/// Read access to process environment variables.
pub trait ReadEnv {
    fn var(&self, key: &str) -> Result<String, VarError>;
}

/// Parse `key` as `T`, falling back to `default` when it is unset or invalid.
pub fn parse_var<E: ReadEnv, T: FromStr>(env: &E, key: &str, default: T) -> T {
    match env.var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("{key}={raw:?} is not valid, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Decode `key` as JSON. `Ok(None)` when the variable is unset.
pub fn json_var<E: ReadEnv, T: DeserializeOwned>(
    env: &E,
    key: &str,
) -> Result<Option<T>, JsonVarError> {
    match env.var(key) {
        Ok(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| JsonVarError {
                key: key.to_string(),
                source,
            }),
        Err(_) => Ok(None),
    }
}

#[derive(Debug)]
pub struct JsonVarError {
    pub key: String,
    pub source: serde_json::Error,
}

impl std::fmt::Display for JsonVarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} is not valid JSON for its type: {}", self.key, self.source)
    }
}

impl std::error::Error for JsonVarError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn parse_var_reads_value() {
        let env = InMemoryEnv::new();
        env.set("HTTP_TIMEOUT", "2500");
        assert_eq!(parse_var(&env, "HTTP_TIMEOUT", 5000u64), 2500);
    }

    #[test]
    fn parse_var_tolerates_surrounding_whitespace() {
        let env = InMemoryEnv::new();
        env.set("PORT", " 8080 ");
        assert_eq!(parse_var(&env, "PORT", 3000u16), 8080);
    }

    #[test]
    fn parse_var_defaults_when_missing_or_invalid() {
        let env = InMemoryEnv::new();
        assert_eq!(parse_var(&env, "PORT", 3000u16), 3000);

        env.set("PORT", "not-a-port");
        assert_eq!(parse_var(&env, "PORT", 3000u16), 3000);

        env.set("PORT", "70000");
        assert_eq!(parse_var(&env, "PORT", 3000u16), 3000);
    }

    #[test]
    fn json_var_unset_is_none() {
        let env = InMemoryEnv::new();
        let value: Option<Vec<String>> = json_var(&env, "IDP_URLS").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn json_var_decodes_array_and_object() {
        let env = InMemoryEnv::new();
        env.set("IDP_URLS", r#"["https://a.test","https://b.test"]"#);
        env.set("MAP", r#"{"idp-a":"https://a.test"}"#);

        let urls: Vec<String> = json_var(&env, "IDP_URLS").unwrap().unwrap();
        assert_eq!(urls, vec!["https://a.test", "https://b.test"]);

        let map: HashMap<String, String> = json_var(&env, "MAP").unwrap().unwrap();
        assert_eq!(map.get("idp-a").map(String::as_str), Some("https://a.test"));
    }

    #[test]
    fn json_var_rejects_wrong_shape() {
        let env = InMemoryEnv::new();
        env.set("IDP_URLS", r#"{"not":"an array"}"#);

        let err = json_var::<_, Vec<String>>(&env, "IDP_URLS").unwrap_err();
        assert_eq!(err.key, "IDP_URLS");
        assert!(err.to_string().contains("IDP_URLS"));
    }

    #[test]
    fn json_var_rejects_invalid_json() {
        let env = InMemoryEnv::new();
        env.set("MAP", "{broken");
        assert!(json_var::<_, HashMap<String, String>>(&env, "MAP").is_err());
    }
}
