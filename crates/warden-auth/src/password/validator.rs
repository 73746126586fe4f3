//! Password policy enforcement for new passwords.

use warden_core::config::PasswordConfig;
use warden_core::error::AppError;

/// Validates password strength against configured policies.
#[derive(Debug, Clone)]
pub struct PasswordValidator {
    min_length: usize,
    max_length: usize,
}

impl PasswordValidator {
    /// Creates a new validator from password configuration.
    pub fn new(config: &PasswordConfig) -> Self {
        Self {
            min_length: config.min_length,
            max_length: config.max_length,
        }
    }

    /// Validates a password against all configured policies.
    ///
    /// Returns `Ok(())` if the password meets all requirements,
    /// or an error describing the first violation found.
    pub fn validate(&self, password: &str) -> Result<(), AppError> {
        let length = password.chars().count();
        if length < self.min_length || length > self.max_length {
            return Err(AppError::validation(format!(
                "Password must be between {} and {} characters long",
                self.min_length, self.max_length
            )));
        }

        if !password.chars().any(|c| c.is_lowercase()) {
            return Err(AppError::validation(
                "Password must contain at least one lowercase letter",
            ));
        }

        if !password.chars().any(|c| c.is_uppercase()) {
            return Err(AppError::validation(
                "Password must contain at least one uppercase letter",
            ));
        }

        if !password.chars().any(|c| c.is_numeric()) {
            return Err(AppError::validation(
                "Password must contain at least one digit",
            ));
        }

        if !password
            .chars()
            .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
        {
            return Err(AppError::validation(
                "Password must contain at least one special character",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> PasswordValidator {
        PasswordValidator::new(&PasswordConfig::default())
    }

    #[test]
    fn test_accepts_policy_compliant_password() {
        assert!(validator().validate("Secret1!").is_ok());
    }

    #[test]
    fn test_rejects_each_missing_class() {
        let v = validator();
        for weak in ["secret1!", "SECRET1!", "Secretxx!", "Secret11", "Secret 11"] {
            assert!(v.validate(weak).is_err(), "{weak} should be rejected");
        }
    }

    #[test]
    fn test_length_bounds() {
        let v = validator();
        assert!(v.validate("Se1!").is_err());
        let long = format!("Aa1!{}", "x".repeat(61));
        assert_eq!(long.len(), 65);
        assert!(v.validate(&long).is_err());
        assert!(v.validate(&long[..64]).is_ok());
    }
}
