use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use time::{macros::format_description, Date};

use super::dto::{LoginRequest, RegisterRequest, UpdateUserRequest};
use crate::error::{AppError, FieldError};

pub const MIN_PASSWORD_LEN: usize = 6;
const MAX_AGE: i64 = 150;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid");
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub date_of_birth: Option<Date>,
    pub age: Option<i32>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: String,
}

/// Collects rule violations so every bad field is reported at once.
#[derive(Default)]
struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn fail(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    fn required(&mut self, field: &'static str, value: Option<String>, message: &str) -> String {
        let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
        if value.is_empty() {
            self.fail(field, message);
        }
        value
    }

    fn email(&mut self, value: Option<String>) -> String {
        let email = normalize_email(value.as_deref().unwrap_or_default());
        if !is_valid_email(&email) {
            self.fail("email", "Invalid email");
        }
        email
    }

    fn optional_text(&mut self, field: &'static str, value: Option<String>, message: &str) -> Option<String> {
        let value = value?.trim().to_string();
        if value.is_empty() {
            self.fail(field, message);
        }
        Some(value)
    }

    fn date_of_birth(&mut self, value: Option<String>) -> Option<Date> {
        let raw = self.optional_text("dateOfBirth", value, "Date of birth must not be empty")?;
        if raw.is_empty() {
            return None;
        }
        match Date::parse(&raw, format_description!("[year]-[month]-[day]")) {
            Ok(d) => Some(d),
            Err(_) => {
                self.fail("dateOfBirth", "Date of birth must be a valid date (YYYY-MM-DD)");
                None
            }
        }
    }

    fn age(&mut self, value: Option<Value>) -> Option<i32> {
        let parsed = match value? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) if s.trim().is_empty() => {
                self.fail("age", "Age must not be empty");
                return None;
            }
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        match parsed {
            Some(n) if (0..=MAX_AGE).contains(&n) => i32::try_from(n).ok(),
            Some(_) => {
                self.fail("age", format!("Age must be between 0 and {MAX_AGE}"));
                None
            }
            None => {
                self.fail("age", "Age must be an integer");
                None
            }
        }
    }

    fn finish<T>(self, value: T) -> Result<T, AppError> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(AppError::Validation(self.errors))
        }
    }
}

pub fn registration(req: RegisterRequest) -> Result<Registration, AppError> {
    let mut c = Checker::default();
    let name = c.required("name", req.name, "Name is required");
    let email = c.email(req.email);
    let password = req.password.unwrap_or_default();
    if password.chars().count() < MIN_PASSWORD_LEN {
        c.fail(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }
    let date_of_birth = c.date_of_birth(req.date_of_birth);
    let age = c.age(req.age);
    let gender = c.optional_text("gender", req.gender, "Gender must not be empty");
    c.finish(Registration {
        name,
        email,
        password,
        date_of_birth,
        age,
        gender,
    })
}

pub fn login(req: LoginRequest) -> Result<Credentials, AppError> {
    let mut c = Checker::default();
    let email = c.email(req.email);
    let password = req.password.unwrap_or_default();
    if password.is_empty() {
        c.fail("password", "Password is required");
    }
    c.finish(Credentials { email, password })
}

pub fn profile_update(req: UpdateUserRequest) -> Result<ProfileUpdate, AppError> {
    let mut c = Checker::default();
    let name = c.required("name", req.name, "Name is required");
    let email = c.email(req.email);
    c.finish(ProfileUpdate { name, email })
}
