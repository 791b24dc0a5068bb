use std::collections::HashSet;

pub const MAX_OPTION_LENGTH: usize = 40;
pub const MAX_OPTIONS: usize = 20;
pub const MIN_OPTIONS: usize = 1;
pub const MAX_USER_ID_LENGTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Option text exceeds maximum length of {MAX_OPTION_LENGTH}")]
    OptionTooLong,
    #[error("Too many options (maximum {MAX_OPTIONS})")]
    TooManyOptions,
    #[error("Too few options (minimum {MIN_OPTIONS})")]
    TooFewOptions,
    #[error("Duplicate option: {0}")]
    DuplicateOption(String),
    #[error("Empty option text")]
    EmptyOption,
    #[error("Empty user id")]
    EmptyUserId,
    #[error("User id exceeds maximum length of {MAX_USER_ID_LENGTH}")]
    UserIdTooLong,
}

pub fn validate_user_id(user_id: &str) -> Result<(), ValidationError> {
    if user_id.trim().is_empty() { return Err(ValidationError::EmptyUserId); }
    if user_id.len() > MAX_USER_ID_LENGTH { return Err(ValidationError::UserIdTooLong); }
    Ok(())
}

pub fn validate_options(options: &[String]) -> Result<(), ValidationError> {
    if options.len() > MAX_OPTIONS { return Err(ValidationError::TooManyOptions); }
    if options.len() < MIN_OPTIONS { return Err(ValidationError::TooFewOptions); }

    if options.iter().any(|opt| opt.trim().is_empty()) { return Err(ValidationError::EmptyOption); }
    if options.iter().any(|opt| opt.len() > MAX_OPTION_LENGTH) { return Err(ValidationError::OptionTooLong); }

    let mut seen = HashSet::with_capacity(options.len());
    for option in options {
        if !seen.insert(option.to_lowercase()) {
            return Err(ValidationError::DuplicateOption(option.clone()));
        }
    }

    Ok(())
}
