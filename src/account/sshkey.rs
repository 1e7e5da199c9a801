//! SSH public key line parsing
//!
//! Declared keys arrive as raw OpenSSH public-key lines
//! (`<type> <material> <comment>`). The comment doubles as the unique
//! sub-identifier for the key's resource node, so a line without one is
//! rejected along with everything else that does not decompose into
//! exactly three parts.

use serde::Serialize;
use thiserror::Error;

/// One parsed SSH public key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SshKeyEntry {
    /// Key type, e.g. "ssh-rsa" or "ssh-ed25519"
    pub key_type: String,
    /// Base64 key material
    pub material: String,
    /// Trailing comment, used as the key's unique name
    pub name: String,
}

/// A declared SSH key line that does not match `type material comment`
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed ssh key: {line:?}")]
pub struct MalformedKeyError {
    /// The offending raw line
    pub line: String,
}

/// Parse a single public-key line into its three parts
///
/// Pure string transformation; the same input always yields the same
/// output or the same error.
pub fn parse(line: &str) -> Result<SshKeyEntry, MalformedKeyError> {
    let mut tokens = line.split_whitespace();
    match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
        (Some(key_type), Some(material), Some(name), None) => Ok(SshKeyEntry {
            key_type: key_type.to_string(),
            material: material.to_string(),
            name: name.to_string(),
        }),
        _ => Err(MalformedKeyError {
            line: line.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_conventional_line() {
        let entry = parse("ssh-rsa AABBCCDDEEFFGGHHIIJJKKLLMMNNOOPPQQRRSSTTUUVV== test1@test")
            .unwrap();
        assert_eq!(entry.key_type, "ssh-rsa");
        assert_eq!(entry.material, "AABBCCDDEEFFGGHHIIJJKKLLMMNNOOPPQQRRSSTTUUVV==");
        assert_eq!(entry.name, "test1@test");
    }

    #[test]
    fn test_parse_tolerates_extra_whitespace() {
        let entry = parse("  ssh-ed25519\tAAAAC3Nz   ci@build  ").unwrap();
        assert_eq!(entry.key_type, "ssh-ed25519");
        assert_eq!(entry.material, "AAAAC3Nz");
        assert_eq!(entry.name, "ci@build");
    }

    #[test]
    fn test_parse_rejects_single_token() {
        let err = parse("blah").unwrap_err();
        assert_eq!(err.line, "blah");
        assert!(err.to_string().contains("malformed"));
    }

    #[test]
    fn test_parse_rejects_missing_comment() {
        assert!(parse("ssh-rsa AAAA==").is_err());
    }

    #[test]
    fn test_parse_rejects_four_tokens() {
        assert!(parse("ssh-rsa AAAA== a comment with spaces").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_line() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
    }

    #[test]
    fn test_parse_is_deterministic() {
        let line = "ssh-rsa 12345678910123456789012345678901234567890123== test2@test";
        assert_eq!(parse(line), parse(line));
    }
}
