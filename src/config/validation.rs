use crate::config::types::{
    DispatchSettings, RedirectSettings, RetrySettings, Settings, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire settings structure
pub fn validate(settings: &Settings) -> Result<(), ConfigError> {
    validate_retry(&settings.retry)?;
    validate_redirect(&settings.redirect)?;
    validate_dispatch(&settings.dispatch)?;
    validate_user_agent(&settings.user_agent)?;
    Ok(())
}

fn validate_retry(retry: &RetrySettings) -> Result<(), ConfigError> {
    for code in &retry.http_codes {
        if !(100..=599).contains(code) {
            return Err(ConfigError::Validation(format!(
                "retry.http-codes contains {} which is not a valid HTTP status",
                code
            )));
        }
    }

    if retry.priority_adjust.abs() > 1000 {
        return Err(ConfigError::Validation(format!(
            "retry.priority-adjust must be within ±1000, got {}",
            retry.priority_adjust
        )));
    }

    Ok(())
}

fn validate_redirect(redirect: &RedirectSettings) -> Result<(), ConfigError> {
    if redirect.max_times < 1 {
        return Err(ConfigError::Validation(format!(
            "redirect.max-times must be >= 1, got {}",
            redirect.max_times
        )));
    }

    if redirect.priority_adjust.abs() > 1000 {
        return Err(ConfigError::Validation(format!(
            "redirect.priority-adjust must be within ±1000, got {}",
            redirect.priority_adjust
        )));
    }

    Ok(())
}

fn validate_dispatch(dispatch: &DispatchSettings) -> Result<(), ConfigError> {
    if dispatch.max_workers < 1 || dispatch.max_workers > 512 {
        return Err(ConfigError::Validation(format!(
            "dispatch.max-workers must be between 1 and 512, got {}",
            dispatch.max_workers
        )));
    }

    if dispatch.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "dispatch.timeout-secs must be >= 1, got {}",
            dispatch.timeout_secs
        )));
    }

    Ok(())
}

fn validate_user_agent(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent.crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "user-agent.crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url).map_err(|e| {
        ConfigError::Validation(format!("Invalid user-agent.contact-url: {}", e))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_validate() {
        assert!(validate(&Settings::default()).is_ok());
    }

    #[test]
    fn test_invalid_http_code_rejected() {
        let mut settings = Settings::default();
        settings.retry.http_codes.insert(999);
        assert!(matches!(
            validate(&settings).unwrap_err(),
            ConfigError::Validation(_)
        ));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut settings = Settings::default();
        settings.dispatch.max_workers = 0;
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn test_zero_redirect_cap_rejected() {
        let mut settings = Settings::default();
        settings.redirect.max_times = 0;
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn test_bad_crawler_name_rejected() {
        let mut settings = Settings::default();
        settings.user_agent.crawler_name = "weir bot!".to_string();
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn test_bad_contact_url_rejected() {
        let mut settings = Settings::default();
        settings.user_agent.contact_url = "not a url".to_string();
        assert!(validate(&settings).is_err());
    }
}
