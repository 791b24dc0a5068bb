use crate::error::ApiError;
use rustrict::CensorStr;
use uuid::Uuid;

pub fn parse_poll_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::InvalidId)
}

/// Rejects option names that are inappropriate on their own or when read
/// together with their neighbours.
pub fn check_options_for_profanity(options: &[String]) -> Result<(), String> {
    if let Some(option) = options.iter().find(|option| option.is_inappropriate()) {
        return Err(format!("Possible profanity detected in option: {}", option));
    }

    for window_size in 2..=options.len() {
        for window in options.windows(window_size) {
            if window.join("").is_inappropriate() {
                return Err(format!(
                    "Inappropriate content detected across options: {}",
                    window.join(", ")
                ));
            }
        }
    }

    Ok(())
}
