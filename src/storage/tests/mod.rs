
use crate::storage::validate_path;

#[test]
fn validate_path_accepts_nested_keys() {
    assert!(validate_path("media/alice/3/abcdef").is_ok());
    assert!(validate_path("tmp/0123").is_ok());
}

#[test]
fn validate_path_rejects_escapes() {
    for bad in ["", "/etc/passwd", "media/../secret", "a//b", "a/./b", ".meta/x", "a\\b"] {
        assert!(validate_path(bad).is_err(), "{bad:?} should be rejected");
    }
}
