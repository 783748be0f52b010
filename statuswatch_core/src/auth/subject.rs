//! Proxy-asserted subject DN handling (`CN=alice, OU=eng, O=Example`).

/// Returns the lowercased `cn` value of a comma-separated subject DN.
pub fn common_name(subject: &str) -> Option<String> {
    subject
        .split(',')
        .filter_map(attribute)
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("cn"))
        .map(|(_, value)| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
}

/// Splits `key=value`. Parts with no `=` or more than one are skipped.
fn attribute(part: &str) -> Option<(&str, &str)> {
    let mut pieces = part.trim().split('=');
    match (pieces.next(), pieces.next(), pieces.next()) {
        (Some(key), Some(value), None) => Some((key, value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_common_name() {
        assert_eq!(common_name("CN=alice, OU=eng"), Some("alice".to_string()));
        assert_eq!(common_name("ou=eng,cn=Bob,o=Example"), Some("bob".to_string()));
        assert_eq!(common_name("  Cn = carol "), Some("carol".to_string()));
    }

    #[test]
    fn test_first_common_name_wins() {
        assert_eq!(common_name("CN=alice,CN=mallory"), Some("alice".to_string()));
    }

    #[test]
    fn test_ambiguous_parts_are_skipped() {
        assert_eq!(common_name("CN=a=b"), None);
        assert_eq!(common_name("CN=a=b, CN=alice"), Some("alice".to_string()));
        assert_eq!(common_name("OU=x=y,cn=bob"), Some("bob".to_string()));
    }

    #[test]
    fn test_missing_common_name() {
        assert_eq!(common_name(""), None);
        assert_eq!(common_name("OU=eng, O=Example"), None);
        assert_eq!(common_name("CN="), None);
        assert_eq!(common_name("garbage"), None);
    }
}
