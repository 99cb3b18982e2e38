use super::models::Config;
use thiserror::Error;

pub const MAX_DEBOUNCE_MS: u64 = 10_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("autosave.debounce_ms must be within 1..={MAX_DEBOUNCE_MS}, got {0}")]
    DebounceOutOfRange(u64),

    #[error("storage.max_photo_bytes must be positive")]
    ZeroPhotoLimit,

    #[error("drafts.key_prefix must not be empty")]
    EmptyKeyPrefix,

    #[error("drafts.key_prefix must not contain ':' (got '{0}')")]
    InvalidKeyPrefix(String),
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_autosave(config)?;
    validate_storage(config)?;
    validate_drafts(config)?;
    Ok(())
}

fn validate_autosave(config: &Config) -> Result<(), ValidationError> {
    let debounce = config.autosave.debounce_ms;
    if !(1..=MAX_DEBOUNCE_MS).contains(&debounce) {
        return Err(ValidationError::DebounceOutOfRange(debounce));
    }
    Ok(())
}

fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    if config.storage.max_photo_bytes.as_u64() == 0 {
        return Err(ValidationError::ZeroPhotoLimit);
    }
    Ok(())
}

/// The prefix is the first segment of every draft key
fn validate_drafts(config: &Config) -> Result<(), ValidationError> {
    let prefix = config.drafts.key_prefix.trim();
    if prefix.is_empty() {
        return Err(ValidationError::EmptyKeyPrefix);
    }
    if prefix.contains(':') {
        return Err(ValidationError::InvalidKeyPrefix(prefix.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::ByteSize;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate(&Config::default()), Ok(()));
    }

    #[test]
    fn test_debounce_bounds() {
        let mut config = Config::default();

        config.autosave.debounce_ms = 0;
        assert_eq!(validate(&config), Err(ValidationError::DebounceOutOfRange(0)));

        config.autosave.debounce_ms = MAX_DEBOUNCE_MS;
        assert!(validate(&config).is_ok());

        config.autosave.debounce_ms = MAX_DEBOUNCE_MS + 1;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::DebounceOutOfRange(_))
        ));
    }

    #[test]
    fn test_zero_photo_limit() {
        let mut config = Config::default();
        config.storage.max_photo_bytes = ByteSize(0);
        assert_eq!(validate(&config), Err(ValidationError::ZeroPhotoLimit));
    }

    #[test]
    fn test_key_prefix() {
        let mut config = Config::default();

        config.drafts.key_prefix = "  ".to_string();
        assert_eq!(validate(&config), Err(ValidationError::EmptyKeyPrefix));

        config.drafts.key_prefix = "pm:draft".to_string();
        assert_eq!(
            validate(&config),
            Err(ValidationError::InvalidKeyPrefix("pm:draft".to_string()))
        );
    }
}
