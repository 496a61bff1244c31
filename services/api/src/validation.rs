//! Input validation utilities
//!
//! Payloads arrive with every field optional; the functions here turn them
//! into typed inputs or a [`FieldErrors`] map keyed by field name.

use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::models::{
    AttributePayload, AttributeQuery, Nullable, ProfileUpdate, RecipeChanges, RecipeDraft,
    RecipeFields, RecipeFilter, RecipePayload, RecipeQuery, RecipeUpdate, Registration,
    TokenRequest, UserPayload,
};

pub const MAX_CHAR_LENGTH: usize = 255;
pub const MIN_PASSWORD_LENGTH: usize = 5;
pub const PRICE_MAX_DIGITS: u32 = 5;
pub const PRICE_DECIMAL_PLACES: u32 = 2;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const NULL: &str = "This field may not be null.";
pub const INVALID_INTEGER: &str = "A valid integer is required.";
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Per-field validation messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map holding exactly one message
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(value)` when nothing was recorded
    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

/// PUT replaces a resource and needs every required field, PATCH does not
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Full,
    Partial,
}

/// Lowercase the domain part of an address, keeping the local part as typed
pub fn normalize_email(email: &str) -> String {
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err(BLANK.to_string());
    }

    if email.chars().count() > MAX_CHAR_LENGTH {
        return Err(max_length_message(MAX_CHAR_LENGTH));
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Enter a valid email address.".to_string());
    }

    Ok(())
}

/// Validate password; whitespace is significant and never trimmed
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err(BLANK.to_string());
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Ensure this field has at least {} characters.",
            MIN_PASSWORD_LENGTH
        ));
    }

    Ok(())
}

/// Validate a required, non-blank text field
pub fn validate_char_field(value: &str, max_length: usize) -> Result<(), String> {
    if value.is_empty() {
        return Err(BLANK.to_string());
    }
    validate_optional_char_field(value, max_length)
}

/// Validate a text field that may be blank
pub fn validate_optional_char_field(value: &str, max_length: usize) -> Result<(), String> {
    if value.chars().count() > max_length {
        return Err(max_length_message(max_length));
    }
    Ok(())
}

/// Validate a price against NUMERIC(5, 2)
pub fn validate_price(price: &Decimal) -> Result<(), String> {
    let decimals = price.scale();
    let total_digits = digit_count(price.mantissa().unsigned_abs()).max(decimals);
    let whole_digits = total_digits - decimals;

    if total_digits > PRICE_MAX_DIGITS {
        return Err(format!(
            "Ensure that there are no more than {} digits in total.",
            PRICE_MAX_DIGITS
        ));
    }

    if decimals > PRICE_DECIMAL_PLACES {
        return Err(format!(
            "Ensure that there are no more than {} decimal places.",
            PRICE_DECIMAL_PLACES
        ));
    }

    if whole_digits > PRICE_MAX_DIGITS - PRICE_DECIMAL_PLACES {
        return Err(format!(
            "Ensure that there are no more than {} digits before the decimal point.",
            PRICE_MAX_DIGITS - PRICE_DECIMAL_PLACES
        ));
    }

    Ok(())
}

/// Parse `"1,2,3"` into ids
pub fn parse_id_list(raw: &str) -> Result<Vec<i64>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|_| format!("\"{}\" is not a valid id.", part))
        })
        .collect()
}

/// Sign-up payload: email, password and name are all required
pub fn registration(payload: &UserPayload) -> Result<Registration, FieldErrors> {
    let mut errors = FieldErrors::new();

    let email = supplied(&mut errors, "email", &payload.email, WriteMode::Full)
        .and_then(|email| valid_email(&mut errors, email));
    let password = supplied(&mut errors, "password", &payload.password, WriteMode::Full)
        .and_then(|password| valid_password(&mut errors, password));
    let name = supplied(&mut errors, "name", &payload.name, WriteMode::Full)
        .and_then(|name| valid_char(&mut errors, "name", name));

    match (email, password, name) {
        (Some(email), Some(password), Some(name)) => errors.into_result(Registration {
            email,
            password,
            name,
        }),
        _ => Err(errors),
    }
}

/// Token request: email and password present and non-blank, no format checks
pub fn token_request(request: &TokenRequest) -> Result<(String, String), FieldErrors> {
    let mut errors = FieldErrors::new();

    let email = supplied(&mut errors, "email", &request.email, WriteMode::Full)
        .and_then(|email| valid_char(&mut errors, "email", email));
    let password = supplied(&mut errors, "password", &request.password, WriteMode::Full)
        .and_then(|password| {
            if password.is_empty() {
                errors.add("password", BLANK);
                None
            } else {
                Some(password.clone())
            }
        });

    match (email, password) {
        (Some(email), Some(password)) => Ok((email, password)),
        _ => Err(errors),
    }
}

/// Profile update payload
pub fn profile_update(payload: &UserPayload, mode: WriteMode) -> Result<ProfileUpdate, FieldErrors> {
    let mut errors = FieldErrors::new();

    let update = ProfileUpdate {
        email: supplied(&mut errors, "email", &payload.email, mode)
            .and_then(|email| valid_email(&mut errors, email)),
        password: supplied(&mut errors, "password", &payload.password, mode)
            .and_then(|password| valid_password(&mut errors, password)),
        name: supplied(&mut errors, "name", &payload.name, mode)
            .and_then(|name| valid_char(&mut errors, "name", name)),
    };

    errors.into_result(update)
}

/// Standalone tag/ingredient payload; `None` means no rename requested
pub fn attribute_name(
    payload: &AttributePayload,
    mode: WriteMode,
) -> Result<Option<String>, FieldErrors> {
    let mut errors = FieldErrors::new();

    let name = supplied(&mut errors, "name", &payload.name, mode)
        .and_then(|name| valid_char(&mut errors, "name", name));

    errors.into_result(name)
}

/// Recipe create payload
pub fn recipe_draft(payload: &RecipePayload) -> Result<RecipeDraft, FieldErrors> {
    let update = recipe_update(payload, WriteMode::Full)?;
    let RecipeChanges {
        title,
        description,
        time_minutes,
        price,
        link,
    } = update.changes;

    match (title, time_minutes, price) {
        (Some(title), Some(time_minutes), Some(price)) => Ok(RecipeDraft {
            fields: RecipeFields {
                title,
                description: description.unwrap_or_default(),
                time_minutes,
                price,
                link: link.unwrap_or_default(),
            },
            tags: update.tags.unwrap_or_default(),
            ingredients: update.ingredients.unwrap_or_default(),
        }),
        _ => Err(FieldErrors::single(NON_FIELD_ERRORS, "Incomplete recipe.")),
    }
}

/// Recipe update payload
///
/// Optional fields are never required, but none of them accepts `null`.
pub fn recipe_update(payload: &RecipePayload, mode: WriteMode) -> Result<RecipeUpdate, FieldErrors> {
    let mut errors = FieldErrors::new();

    let changes = RecipeChanges {
        title: supplied(&mut errors, "title", &payload.title, mode)
            .and_then(|title| valid_char(&mut errors, "title", title)),
        description: supplied(
            &mut errors,
            "description",
            &payload.description,
            WriteMode::Partial,
        )
        .map(|description| description.trim().to_string()),
        time_minutes: supplied(&mut errors, "time_minutes", &payload.time_minutes, mode).copied(),
        price: supplied(&mut errors, "price", &payload.price, mode).and_then(|price| {
            match validate_price(price) {
                Ok(()) => Some(*price),
                Err(message) => {
                    errors.add("price", message);
                    None
                }
            }
        }),
        link: supplied(&mut errors, "link", &payload.link, WriteMode::Partial).and_then(|link| {
            let link = link.trim();
            match validate_optional_char_field(link, MAX_CHAR_LENGTH) {
                Ok(()) => Some(link.to_string()),
                Err(message) => {
                    errors.add("link", message);
                    None
                }
            }
        }),
    };

    let tags = supplied(&mut errors, "tags", &payload.tags, WriteMode::Partial)
        .map(|items| nested_names(&mut errors, "tags", items));
    let ingredients = supplied(&mut errors, "ingredients", &payload.ingredients, WriteMode::Partial)
        .map(|items| nested_names(&mut errors, "ingredients", items));

    errors.into_result(RecipeUpdate {
        changes,
        tags,
        ingredients,
    })
}

/// Recipe listing query
pub fn recipe_filter(query: &RecipeQuery) -> Result<RecipeFilter, FieldErrors> {
    let mut errors = FieldErrors::new();
    let mut filter = RecipeFilter::default();

    if let Some(raw) = query.tags.as_deref() {
        match parse_id_list(raw) {
            Ok(ids) => filter.tags = ids,
            Err(message) => errors.add("tags", message),
        }
    }

    if let Some(raw) = query.ingredients.as_deref() {
        match parse_id_list(raw) {
            Ok(ids) => filter.ingredients = ids,
            Err(message) => errors.add("ingredients", message),
        }
    }

    errors.into_result(filter)
}

/// `assigned_only` flag of an attribute listing; absent means off
pub fn assigned_only(query: &AttributeQuery) -> Result<bool, FieldErrors> {
    match query.assigned_only.as_deref().map(str::trim) {
        None => Ok(false),
        Some(raw) => raw
            .parse::<i64>()
            .map(|value| value != 0)
            .map_err(|_| FieldErrors::single("assigned_only", INVALID_INTEGER)),
    }
}

fn nested_names(errors: &mut FieldErrors, field: &str, items: &[AttributePayload]) -> Vec<String> {
    let mut names = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let result = match &item.name {
            None => Err(REQUIRED.to_string()),
            Some(None) => Err(NULL.to_string()),
            Some(Some(name)) => {
                let name = name.trim();
                validate_char_field(name, MAX_CHAR_LENGTH).map(|()| name.to_string())
            }
        };

        match result {
            Ok(name) => names.push(name),
            Err(message) => errors.add(field, format!("Item {}: name: {}", index, message)),
        }
    }

    names
}

/// Value of a payload field; records `null`, and absence in full writes
fn supplied<'a, T>(
    errors: &mut FieldErrors,
    field: &str,
    value: &'a Nullable<T>,
    mode: WriteMode,
) -> Option<&'a T> {
    match value {
        Some(Some(value)) => Some(value),
        Some(None) => {
            errors.add(field, NULL);
            None
        }
        None => {
            if mode == WriteMode::Full {
                errors.add(field, REQUIRED);
            }
            None
        }
    }
}

fn valid_email(errors: &mut FieldErrors, email: &str) -> Option<String> {
    let email = email.trim();
    match validate_email(email) {
        Ok(()) => Some(normalize_email(email)),
        Err(message) => {
            errors.add("email", message);
            None
        }
    }
}

fn valid_password(errors: &mut FieldErrors, password: &str) -> Option<String> {
    match validate_password(password) {
        Ok(()) => Some(password.to_string()),
        Err(message) => {
            errors.add("password", message);
            None
        }
    }
}

fn valid_char(errors: &mut FieldErrors, field: &str, value: &str) -> Option<String> {
    let value = value.trim();
    match validate_char_field(value, MAX_CHAR_LENGTH) {
        Ok(()) => Some(value.to_string()),
        Err(message) => {
            errors.add(field, message);
            None
        }
    }
}

fn max_length_message(max_length: usize) -> String {
    format!(
        "Ensure this field has no more than {} characters.",
        max_length
    )
}

fn digit_count(mut value: u128) -> u32 {
    let mut digits = 1;
    while value >= 10 {
        value /= 10;
        digits += 1;
    }
    digits
}
