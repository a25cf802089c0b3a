//! Configuration validation logic.

/// The dialogue service cannot be reached without an API key.
pub(super) fn validate_openai_api_key(api_key: &Option<String>) -> Result<(), String> {
    match api_key {
        Some(key) if !key.trim().is_empty() => Ok(()),
        _ => Err("OPENAI_API_KEY is required".to_string()),
    }
}

/// Twilio SMS settings are all-or-nothing.
pub(super) fn validate_twilio_credentials(
    account_sid: &Option<String>,
    auth_token: &Option<String>,
    from_number: &Option<String>,
) -> Result<(), String> {
    let present = [account_sid, auth_token, from_number]
        .iter()
        .filter(|value| value.is_some())
        .count();

    if present == 0 || present == 3 {
        return Ok(());
    }

    Err(
        "TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN and DEFAULT_FROM_NUMBER must be set together"
            .to_string(),
    )
}

pub(super) fn validate_timeouts(values: &[(&str, u64)]) -> Result<(), String> {
    for (name, seconds) in values {
        if *seconds == 0 {
            return Err(format!("{name} must be greater than zero"));
        }
    }
    Ok(())
}

pub(super) fn validate_temperature(temperature: Option<f32>) -> Result<(), String> {
    match temperature {
        Some(t) if !(0.0..=2.0).contains(&t) => {
            Err(format!("TEMPERATURE must be between 0.0 and 2.0, got {t}"))
        }
        _ => Ok(()),
    }
}
