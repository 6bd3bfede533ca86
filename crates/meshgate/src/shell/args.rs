// ── key=value argument parsing ──
//
// Every shell command takes `key=value` tokens. Keys are checked against
// the command's own list so a typo is an error instead of a silently
// ignored option.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::CliError;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeyValueArgs {
    values: BTreeMap<String, String>,
}

impl KeyValueArgs {
    /// Parse whitespace-separated `key=value` tokens, rejecting keys not in `allowed`.
    pub fn parse(input: &str, allowed: &[&str]) -> Result<Self, CliError> {
        let mut values = BTreeMap::new();
        for token in input.split_whitespace() {
            let Some((key, value)) = token.split_once('=') else {
                return Err(CliError::validation(
                    "argument",
                    format!("expected key=value, got '{token}'"),
                ));
            };
            let key = key.trim().to_ascii_lowercase();
            if !allowed.contains(&key.as_str()) {
                let valid = if allowed.is_empty() {
                    "none".to_owned()
                } else {
                    allowed.join(", ")
                };
                return Err(CliError::validation(
                    "argument",
                    format!("unknown key '{key}' (valid keys: {valid})"),
                ));
            }
            values.insert(key, value.trim().to_owned());
        }
        Ok(Self { values })
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.str(key).is_some()
    }

    /// Parse an optional value.
    pub fn get<T>(&self, key: &str) -> Result<Option<T>, CliError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.str(key)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|e| CliError::validation(key, format!("'{raw}': {e}")))
            })
            .transpose()
    }

    pub fn get_or<T>(&self, key: &str, default: T) -> Result<T, CliError>
    where
        T: FromStr,
        T::Err: Display,
    {
        Ok(self.get(key)?.unwrap_or(default))
    }

    pub fn required<T>(&self, key: &str) -> Result<T, CliError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key)?
            .ok_or_else(|| CliError::validation(key, "is required"))
    }

    pub fn flag(&self, key: &str, default: bool) -> Result<bool, CliError> {
        Ok(self.optional_flag(key)?.unwrap_or(default))
    }

    pub fn optional_flag(&self, key: &str) -> Result<Option<bool>, CliError> {
        self.str(key)
            .map(|raw| {
                parse_bool(raw).ok_or_else(|| {
                    CliError::validation(key, format!("'{raw}' is not one of true/false/1/0/yes/no"))
                })
            })
            .transpose()
    }

    /// Byte payload: hex when it decodes as hex, otherwise the literal text.
    pub fn bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.str(key).map(parse_bytes)
    }

    /// Loop bound; absent or `inf` means unbounded.
    pub fn iterations(&self, key: &str) -> Result<Option<u64>, CliError> {
        match self.str(key) {
            None => Ok(None),
            Some(raw) if raw.eq_ignore_ascii_case("inf") => Ok(None),
            Some(_) => self.get(key),
        }
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

pub fn parse_bytes(raw: &str) -> Vec<u8> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(digits).unwrap_or_else(|_| raw.as_bytes().to_vec())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const KEYS: &[&str] = &["payload", "qos", "silent", "iterations"];

    #[test]
    fn unknown_keys_are_rejected_with_the_valid_list() {
        let err = KeyValueArgs::parse("qso=1", KEYS).unwrap_err();
        let CliError::Validation { reason, .. } = err else {
            panic!("expected validation error");
        };
        assert!(reason.contains("qso"));
        assert!(reason.contains("payload, qos, silent, iterations"));
    }

    #[test]
    fn bare_words_are_rejected() {
        assert!(KeyValueArgs::parse("payload", KEYS).is_err());
    }

    #[test]
    fn typed_values() {
        let args = KeyValueArgs::parse("qos=1 silent=yes iterations=inf", KEYS).unwrap();
        assert_eq!(args.required::<u8>("qos").unwrap(), 1);
        assert!(args.flag("silent", false).unwrap());
        assert_eq!(args.iterations("iterations").unwrap(), None);
        assert!(args.required::<u8>("payload").is_err());
    }

    #[test]
    fn out_of_range_numbers_fail() {
        let args = KeyValueArgs::parse("qos=300", KEYS).unwrap();
        assert!(matches!(
            args.get::<u8>("qos"),
            Err(CliError::Validation { ref field, .. }) if field == "qos"
        ));
    }

    #[test]
    fn payload_is_hex_or_text() {
        assert_eq!(parse_bytes("0011aa"), vec![0x00, 0x11, 0xaa]);
        assert_eq!(parse_bytes("0x0102"), vec![0x01, 0x02]);
        assert_eq!(parse_bytes("hello"), b"hello".to_vec());
    }

    #[test]
    fn empty_value_counts_as_absent() {
        let args = KeyValueArgs::parse("payload=", KEYS).unwrap();
        assert!(!args.contains("payload"));
        assert_eq!(args.bytes("payload"), None);
    }
}
