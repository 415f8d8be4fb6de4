/**
 * Helper functions for creating common error types
 */
use crate::error::Error;
use k8s_openapi::serde_json;

/// Create a `TypeMismatch` error for a projection from `expected` onto `requested`
#[must_use]
pub fn type_mismatch_error(expected: &str, requested: &str) -> Error {
    Error::TypeMismatch {
        expected: expected.to_string(),
        requested: requested.to_string(),
    }
}

/// Create an `UnknownEventKind` error for an event type name we do not handle
#[must_use]
pub fn unknown_event_kind_error(kind: &str) -> Error {
    Error::UnknownEventKind(kind.to_string())
}

/// Classify a failure from the kube watch stream.
///
/// A watch line whose `type` is not one of the known variants fails to decode with an
/// "unknown variant" serde error; that is a contract violation, not a transport hiccup.
#[must_use]
pub fn classify_watch_error(err: kube::Error) -> Error {
    match err {
        kube::Error::SerdeError(e) if is_unknown_variant(&e) => {
            Error::UnknownEventKind(e.to_string())
        }
        other => Error::Kube(other),
    }
}

fn is_unknown_variant(err: &serde_json::Error) -> bool {
    err.is_data() && err.to_string().contains("unknown variant")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_variant_is_fatal() {
        let decode = serde_json::from_str::<kube::api::WatchEvent<k8s_openapi::api::core::v1::ConfigMap>>(
            r#"{"type":"EXPLODED","object":{}}"#,
        )
        .unwrap_err();
        let err = classify_watch_error(kube::Error::SerdeError(decode));
        assert!(err.is_fatal());
        assert!(matches!(err, Error::UnknownEventKind(_)));
    }

    #[test]
    fn test_other_decode_errors_are_recoverable() {
        let decode = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = classify_watch_error(kube::Error::SerdeError(decode));
        assert!(!err.is_fatal());
        assert!(matches!(err, Error::Kube(_)));
    }

    #[test]
    fn test_type_mismatch_names_both_types() {
        let err = type_mismatch_error("v1/ConfigMap", "v1/Secret");
        let text = err.to_string();
        assert!(text.contains("ConfigMap"));
        assert!(text.contains("Secret"));
    }
}
