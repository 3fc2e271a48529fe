use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::DesignError;

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, DesignError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(located)
}

/// Same as [`from_str_with_path`], for documents already parsed (after jq
/// preprocessing or pointer selection).
pub fn from_value_with_path<T: DeserializeOwned>(value: Value) -> Result<T, DesignError> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(located)
}

fn located(err: serde_path_to_error::Error<serde_json::Error>) -> DesignError {
    let path = err.path().to_string();
    DesignError::Parse { path, message: err.into_inner().to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::DesignDocument;

    #[test]
    fn errors_name_the_failing_path() {
        let err = from_str_with_path::<DesignDocument>(r#"{"transforms": [{"source": "A"}]}"#).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("invalid design at JSON path transforms[0]"), "{msg}");
        assert!(msg.contains("missing field `target`"), "{msg}");
    }

    #[test]
    fn values_and_text_deserialize_alike() {
        let text = r#"{"contexts": {"pb": {"namespace": "genpb"}}}"#;
        let a: DesignDocument = from_str_with_path(text).unwrap();
        let b: DesignDocument = from_value_with_path(serde_json::from_str(text).unwrap()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.contexts["pb"].namespace, "genpb");
    }
}
