/// Account management system
///
/// Registration, email activation and credential authentication. Request
/// bodies are validated here, at the boundary, before `AccountManager` sees
/// them.

mod manager;

pub use manager::AccountManager;

use crate::{
    db::account::{Address, User},
    error::{BankError, BankResult, FieldError},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

/// Postal address supplied at registration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressRequest {
    #[validate(custom(function = "not_blank", message = "Street is required"))]
    pub street: String,
    #[validate(custom(function = "not_blank", message = "City is required"))]
    pub city: String,
    #[validate(custom(function = "not_blank", message = "County is required"))]
    pub county: String,
    #[validate(
        custom(function = "not_blank", message = "Postal code is required"),
        length(min = 5, max = 10, message = "Postal code must be 5 to 10 characters")
    )]
    pub postal_code: String,
    #[validate(custom(function = "not_blank", message = "Country is required"))]
    pub country: String,
}

impl From<AddressRequest> for Address {
    fn from(address: AddressRequest) -> Self {
        Address {
            street: address.street,
            city: address.city,
            county: address.county,
            postal_code: address.postal_code,
            country: address.country,
        }
    }
}

/// Registration request
///
/// Missing string fields deserialize as empty so they surface as field
/// errors rather than a body rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationRequest {
    #[validate(custom(function = "not_blank", message = "First name is required"))]
    pub first_name: String,
    #[validate(custom(function = "not_blank", message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Email is not well formatted"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password should be 8 characters long minimum"))]
    pub password: String,
    pub pin: String,
    pub address: Option<AddressRequest>,
}

/// Login request. Exactly one of `password` or `pin` is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthenticationRequest {
    #[validate(email(message = "Email is not well formatted"))]
    pub email: String,
    pub password: Option<String>,
    pub pin: Option<String>,
}

/// Which stored secret a login attempt is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Secret<'a> {
    Password(&'a str),
    Pin(&'a str),
}

impl AuthenticationRequest {
    /// Password wins when both are present; blank values count as absent
    pub fn secret(&self) -> BankResult<Secret<'_>> {
        fn present(value: &Option<String>) -> Option<&str> {
            value.as_deref().filter(|v| !v.is_empty())
        }

        if let Some(password) = present(&self.password) {
            Ok(Secret::Password(password))
        } else if let Some(pin) = present(&self.pin) {
            Ok(Secret::Pin(pin))
        } else {
            Err(BankError::MissingCredential)
        }
    }
}

/// Login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationResponse {
    pub token: String,
}

/// `GET /auth/activate-account` query string
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ActivateAccountQuery {
    pub token: String,
}

/// Profile returned to an authenticated caller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: String,
    pub roles: Vec<String>,
    pub enabled: bool,
    pub address: Address,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            email: user.email.clone(),
            roles: user.role_names(),
            enabled: user.enabled,
            address: user.address.clone(),
            created_at: user.created_at,
        }
    }
}

/// Check a registration body, collecting every field error
pub fn validate_registration(request: &RegistrationRequest) -> BankResult<()> {
    let mut errors = Vec::new();

    if let Err(e) = request.validate() {
        collect_field_errors("", &e, &mut errors);
    }

    if request.pin.len() != 4 || !request.pin.bytes().all(|b| b.is_ascii_digit()) {
        errors.push(FieldError::new("pin", "Pin must be exactly 4 digits"));
    }

    match &request.address {
        Some(address) => {
            if let Err(e) = address.validate() {
                collect_field_errors("address.", &e, &mut errors);
            }
        }
        None => errors.push(FieldError::new("address", "Address is required")),
    }

    finish(errors)
}

/// Check a login body. A missing secret is not a field error here; it is
/// reported as `MissingCredential` by the workflow.
pub fn validate_authentication(request: &AuthenticationRequest) -> BankResult<()> {
    let mut errors = Vec::new();

    if let Err(e) = request.validate() {
        collect_field_errors("", &e, &mut errors);
    }

    finish(errors)
}

/// Whitespace-only text counts as missing
fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn finish(mut errors: Vec<FieldError>) -> BankResult<()> {
    if errors.is_empty() {
        return Ok(());
    }
    errors.sort_by(|a, b| a.field.cmp(&b.field));
    Err(BankError::Validation(errors))
}

fn collect_field_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldError>) {
    for (field, field_errors) in errors.field_errors() {
        let name = format!("{}{}", prefix, camel_case(&field.to_string()));
        for error in field_errors.iter() {
            let message = error
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| error.code.to_string());
            out.push(FieldError::new(name.clone(), message));
        }
    }
}

/// `postal_code` -> `postalCode`, matching the JSON body
fn camel_case(field: &str) -> String {
    let mut result = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            result.extend(c.to_uppercase());
            upper = false;
        } else {
            result.push(c);
        }
    }
    result
}
