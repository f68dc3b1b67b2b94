use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;

const MAX_NAME_LEN: usize = 30;
const MAX_HOST_NAME_LEN: usize = 100;

fn validate_simple_name(
    value: &str,
    kind: &str,
    max_len: usize,
    allowed: fn(char) -> bool,
) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if trimmed.len() > max_len {
        return Err(Error::InvalidId(format!("{kind} length must be <= {max_len}")));
    }
    if let Some(ch) = trimmed.chars().find(|ch| !allowed(*ch)) {
        return Err(Error::InvalidId(format!(
            "{kind} contains invalid character '{ch}'"
        )));
    }
    Ok(trimmed.to_string())
}

fn is_domain_char(ch: char) -> bool {
    ch.is_ascii_uppercase() || ch.is_ascii_digit() || matches!(ch, '-' | '_' | '.')
}

fn is_host_char(ch: char) -> bool {
    ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '-' | '_' | '.')
}

fn is_principal_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '@')
}

macro_rules! define_id_type {
    ($(#[$doc:meta])* $name:ident, $kind:expr, $max_len:expr, $allowed:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(String);

        impl $name {
            /// Creates a validated identifier.
            pub fn new(value: impl AsRef<str>) -> Result<Self> {
                validate_simple_name(value.as_ref(), $kind, $max_len, $allowed).map(Self)
            }

            /// Creates an identifier from a trusted string without validation.
            pub fn from_string(value: String) -> Self {
                Self(value)
            }

            /// Returns the underlying string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::from_string(value)
            }
        }
    };
}

define_id_type!(
    /// Domain name, upper case (`ROOT`, `EXAMPLE.ORG`).
    DomainName,
    "domain name",
    MAX_NAME_LEN,
    is_domain_char
);
define_id_type!(
    /// Host name, lower case.
    HostName,
    "host name",
    MAX_HOST_NAME_LEN,
    is_host_char
);
define_id_type!(
    /// User login name.
    UserName,
    "user name",
    MAX_NAME_LEN,
    is_principal_char
);
define_id_type!(
    /// Group name.
    GroupName,
    "group name",
    MAX_NAME_LEN,
    is_principal_char
);

impl DomainName {
    /// Name of the domain used when a host cannot be mapped to any other.
    pub const ROOT: &'static str = "ROOT";

    /// Returns the root domain name.
    pub fn root() -> Self {
        Self(Self::ROOT.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_name_should_reject_lower_case() {
        let err = DomainName::try_from("example").expect_err("must reject");
        assert!(err.to_string().contains("domain name"));
        assert!(DomainName::try_from("EXAMPLE.ORG").is_ok());
    }

    #[test]
    fn host_name_should_trim_and_accept_dots() {
        let host = HostName::try_from(" www.example.org ").expect("host name");
        assert_eq!(host.as_str(), "www.example.org");
    }

    #[test]
    fn user_name_should_reject_empty() {
        let err = UserName::try_from("   ").expect_err("must reject");
        assert!(matches!(err, Error::InvalidId(_)));
    }

    #[test]
    fn group_name_should_reject_spaces() {
        let err = GroupName::try_from("web editors").expect_err("must reject");
        assert!(err.to_string().contains("' '"));
    }
}
