use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use super::SchoolRecord;

/// The user-editable columns, in the order the form presents them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    EmailId,
    Address,
    City,
    State,
    Contact,
    Image,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Name,
        Field::EmailId,
        Field::Address,
        Field::City,
        Field::State,
        Field::Contact,
        Field::Image,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::EmailId => "email_id",
            Field::Address => "address",
            Field::City => "city",
            Field::State => "state",
            Field::Contact => "contact",
            Field::Image => "image",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::Name => "School Name",
            Field::EmailId => "Email Address",
            Field::Address => "Address",
            Field::City => "City",
            Field::State => "State",
            Field::Contact => "Contact Number",
            Field::Image => "School Image URL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "name" => Some(Field::Name),
            "email" | "email_id" => Some(Field::EmailId),
            "address" => Some(Field::Address),
            "city" => Some(Field::City),
            "state" => Some(Field::State),
            "contact" | "phone" => Some(Field::Contact),
            "image" | "image_url" => Some(Field::Image),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: &'static str,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Raw form values as typed by the user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchoolDraft {
    pub name: String,
    pub email_id: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub contact: String,
    pub image: String,
}

impl SchoolDraft {
    pub fn from_record(record: &SchoolRecord) -> Self {
        Self {
            name: record.name.clone(),
            email_id: record.email_id.clone(),
            address: record.address.clone(),
            city: record.city.clone(),
            state: record.state.clone(),
            contact: record.contact.clone(),
            image: record.image.clone().unwrap_or_default(),
        }
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.name,
            Field::EmailId => &self.email_id,
            Field::Address => &self.address,
            Field::City => &self.city,
            Field::State => &self.state,
            Field::Contact => &self.contact,
            Field::Image => &self.image,
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        match field {
            Field::Name => self.name = value,
            Field::EmailId => self.email_id = value,
            Field::Address => self.address = value,
            Field::City => self.city = value,
            Field::State => self.state = value,
            Field::Contact => self.contact = value,
            Field::Image => self.image = value,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn normalized_image(&self) -> Option<String> {
        if self.image.is_empty() {
            None
        } else {
            Some(self.image.clone())
        }
    }

    /// Insert payload. Callers are expected to have run [`validate`] first.
    pub fn to_new_school(&self) -> NewSchool {
        NewSchool {
            name: self.name.clone(),
            email_id: self.email_id.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            contact: self.contact.clone(),
            image: self.normalized_image(),
        }
    }

    pub fn to_patch(&self) -> SchoolPatch {
        SchoolPatch {
            name: self.name.clone(),
            email_id: self.email_id.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            contact: self.contact.clone(),
            image: self.normalized_image(),
        }
    }
}

/// Body of an insert. `image` is sent as `null` when absent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewSchool {
    pub name: String,
    pub email_id: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub contact: String,
    pub image: Option<String>,
}

/// Body of an update. Never carries `id` or `created_at`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SchoolPatch {
    pub name: String,
    pub email_id: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub contact: String,
    pub image: Option<String>,
}

fn contact_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{10}$").expect("static contact pattern"))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^[A-Z0-9_'+\-.]*[A-Z0-9_+\-]@([A-Z0-9][A-Z0-9\-]*\.)+[A-Z]{2,}$")
            .expect("static email pattern")
    })
}

pub fn is_valid_contact(value: &str) -> bool {
    // \d is Unicode-aware in the regex crate; contact numbers are ASCII only.
    value.is_ascii() && contact_regex().is_match(value)
}

pub fn is_valid_email(value: &str) -> bool {
    if value.starts_with('.') || value.contains("..") {
        return false;
    }
    email_regex().is_match(value)
}

pub fn is_valid_image_url(value: &str) -> bool {
    match reqwest::Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

fn min_chars(value: &str, min: usize) -> bool {
    value.chars().count() >= min
}

/// Length thresholds and messages for one form. Creating and editing a
/// school check the same fields with different limits and wording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rules {
    pub name_min: usize,
    pub address_min: usize,
    pub city_min: usize,
    pub state_min: usize,
    pub name_message: &'static str,
    pub address_message: &'static str,
    pub city_message: &'static str,
    pub state_message: &'static str,
    pub contact_message: &'static str,
}

impl Rules {
    pub const CREATE: Rules = Rules {
        name_min: 2,
        address_min: 5,
        city_min: 2,
        state_min: 2,
        name_message: "School name must be at least 2 characters",
        address_message: "Address must be at least 5 characters",
        city_message: "City name must be at least 2 characters",
        state_message: "State name must be at least 2 characters",
        contact_message: "Contact must be exactly 10 digits",
    };

    pub const EDIT: Rules = Rules {
        name_min: 3,
        address_min: 10,
        city_min: 2,
        state_min: 2,
        name_message: "School name must be at least 3 characters",
        address_message: "Address must be at least 10 characters",
        city_message: "City must be at least 2 characters",
        state_message: "State must be at least 2 characters",
        contact_message: "Contact must be a 10-digit number",
    };
}

/// Field-scoped validation of a new school, one error per invalid field in
/// form order. An empty result means the draft may be submitted.
pub fn validate(draft: &SchoolDraft) -> Vec<FieldError> {
    validate_with(draft, &Rules::CREATE)
}

/// Validation of an edited school; stricter on name and address.
pub fn validate_edit(draft: &SchoolDraft) -> Vec<FieldError> {
    validate_with(draft, &Rules::EDIT)
}

pub fn validate_with(draft: &SchoolDraft, rules: &Rules) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let mut check = |field: Field, ok: bool, message: &'static str| {
        if !ok {
            errors.push(FieldError { field, message });
        }
    };

    check(
        Field::Name,
        min_chars(&draft.name, rules.name_min),
        rules.name_message,
    );
    check(
        Field::EmailId,
        is_valid_email(&draft.email_id),
        "Please enter a valid email address",
    );
    check(
        Field::Address,
        min_chars(&draft.address, rules.address_min),
        rules.address_message,
    );
    check(
        Field::City,
        min_chars(&draft.city, rules.city_min),
        rules.city_message,
    );
    check(
        Field::State,
        min_chars(&draft.state, rules.state_min),
        rules.state_message,
    );
    check(
        Field::Contact,
        is_valid_contact(&draft.contact),
        rules.contact_message,
    );
    check(
        Field::Image,
        draft.image.is_empty() || is_valid_image_url(&draft.image),
        "Please enter a valid image URL",
    );

    errors
}
