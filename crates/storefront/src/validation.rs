//! Form validation.
//!
//! Every form the storefront accepts is deserialized into a `*Form` struct
//! and converted into a `Valid*` value with [`Validate::validate`] before
//! anything reaches the backend. Failures carry one Persian message per
//! offending field, in the order the fields were checked.

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use serde::ser::{Serialize, SerializeMap, Serializer};

use golzar_core::{Email, EmailError, Price, PhoneNumber, ProductCategory, ProductFeatureId};

const PHONE_FORMAT: &str = "فرمت شماره تماس نامعتبر است (مثال: 09123456789)";

/// Field-level validation failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<(String, String)>);

impl FieldErrors {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Record a failure; only the first message per field is kept.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let field = field.into();
        if !self.0.iter().any(|(f, _)| *f == field) {
            self.0.push((field, message.into()));
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Message recorded for `field`, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, m)| m.as_str())
    }

    /// The first message, suitable for a single toast-style error.
    #[must_use]
    pub fn first_message(&self) -> Option<&str> {
        self.0.first().map(|(_, m)| m.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(f, m)| (f.as_str(), m.as_str()))
    }

    /// `Ok(value)` when nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one field failed.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.0.iter().map(|(field, _)| field.as_str()).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

impl std::error::Error for FieldErrors {}

impl Serialize for FieldErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (field, message) in &self.0 {
            map.serialize_entry(field, message)?;
        }
        map.end()
    }
}

/// Conversion from raw form input to validated values.
pub trait Validate {
    type Output;

    /// # Errors
    ///
    /// Returns [`FieldErrors`] naming every field that failed.
    fn validate(self) -> Result<Self::Output, FieldErrors>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Field helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Trim and check character-count bounds. Returns the trimmed text.
fn bounded(
    errors: &mut FieldErrors,
    field: &str,
    raw: &str,
    min: (usize, &str),
    max: (usize, &str),
) -> String {
    let value = raw.trim();
    let len = value.chars().count();
    if len < min.0 {
        errors.add(field, min.1);
    } else if len > max.0 {
        errors.add(field, max.1);
    }
    value.to_string()
}

/// Trim an optional text field; empty becomes `None`.
fn optional(
    errors: &mut FieldErrors,
    field: &str,
    raw: Option<&str>,
    max: (usize, &str),
) -> Option<String> {
    let value = raw.map(str::trim).filter(|v| !v.is_empty())?;
    if value.chars().count() > max.0 {
        errors.add(field, max.1);
    }
    Some(value.to_string())
}

/// Optional mobile number; empty is allowed.
fn optional_phone(errors: &mut FieldErrors, field: &str, raw: Option<&str>) -> Option<PhoneNumber> {
    let value = raw.map(str::trim).filter(|v| !v.is_empty())?;
    PhoneNumber::parse(value)
        .inspect_err(|_| errors.add(field, PHONE_FORMAT))
        .ok()
}

fn email(errors: &mut FieldErrors, raw: &str) -> Option<Email> {
    match Email::parse(raw) {
        Ok(email) => Some(email),
        Err(EmailError::TooLong { .. }) => {
            errors.add("email", "ایمیل حداکثر ۲۵۵ کاراکتر");
            None
        }
        Err(_) => {
            errors.add("email", "فرمت ایمیل نامعتبر است");
            None
        }
    }
}

fn password(errors: &mut FieldErrors, raw: &str) {
    let len = raw.chars().count();
    if len < 6 {
        errors.add("password", "رمز عبور باید حداقل ۶ کاراکتر باشد");
    } else if len > 128 {
        errors.add("password", "رمز عبور حداکثر ۱۲۸ کاراکتر");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Address
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AddressForm {
    pub title: String,
    pub full_address: String,
    pub phone: String,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidAddress {
    pub title: String,
    pub full_address: String,
    pub phone: PhoneNumber,
    pub postal_code: Option<String>,
    pub is_default: bool,
}

impl Validate for AddressForm {
    type Output = ValidAddress;

    fn validate(self) -> Result<ValidAddress, FieldErrors> {
        let mut errors = FieldErrors::new();
        let title = bounded(
            &mut errors,
            "title",
            &self.title,
            (1, "عنوان آدرس الزامی است"),
            (50, "عنوان آدرس نباید بیشتر از ۵۰ کاراکتر باشد"),
        );
        let full_address = bounded(
            &mut errors,
            "full_address",
            &self.full_address,
            (10, "آدرس باید حداقل ۱۰ کاراکتر باشد"),
            (500, "آدرس نباید بیشتر از ۵۰۰ کاراکتر باشد"),
        );
        let phone = if self.phone.trim().is_empty() {
            errors.add("phone", "شماره تماس الزامی است");
            None
        } else {
            PhoneNumber::parse(&self.phone)
                .inspect_err(|_| errors.add("phone", PHONE_FORMAT))
                .ok()
        };
        let postal_code = optional(
            &mut errors,
            "postal_code",
            self.postal_code.as_deref(),
            (10, "کد پستی نباید بیشتر از ۱۰ رقم باشد"),
        );

        match phone {
            Some(phone) if errors.is_empty() => Ok(ValidAddress {
                title,
                full_address,
                phone,
                postal_code,
                is_default: self.is_default.unwrap_or(false),
            }),
            _ => Err(errors),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Product
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ProductForm {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: f64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_available: Option<bool>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub stock: u32,
    pub image_url: Option<String>,
    pub is_available: bool,
    pub category: ProductCategory,
}

const MAX_PRICE: i64 = 1_000_000_000;
const MAX_STOCK: f64 = 1_000_000.0;

impl Validate for ProductForm {
    type Output = ValidProduct;

    fn validate(self) -> Result<ValidProduct, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = bounded(
            &mut errors,
            "name",
            &self.name,
            (1, "نام محصول الزامی است"),
            (100, "نام محصول نباید بیشتر از ۱۰۰ کاراکتر باشد"),
        );
        let description = optional(
            &mut errors,
            "description",
            self.description.as_deref(),
            (1000, "توضیحات نباید بیشتر از ۱۰۰۰ کاراکتر باشد"),
        );

        if self.price.is_sign_negative() && !self.price.is_zero() {
            errors.add("price", "قیمت نمی‌تواند منفی باشد");
        } else if self.price > Decimal::from(MAX_PRICE) {
            errors.add("price", "قیمت بسیار زیاد است");
        }

        if !self.stock.is_finite() || self.stock.fract() != 0.0 {
            errors.add("stock", "موجودی باید عدد صحیح باشد");
        } else if self.stock < 0.0 {
            errors.add("stock", "موجودی نمی‌تواند منفی باشد");
        } else if self.stock > MAX_STOCK {
            errors.add("stock", "موجودی بسیار زیاد است");
        }

        let image_url = optional(
            &mut errors,
            "image_url",
            self.image_url.as_deref(),
            (500, "آدرس لینک نباید بیشتر از ۵۰۰ کاراکتر باشد"),
        );
        if let Some(url) = &image_url
            && !(url.starts_with("https://") || url.starts_with("http://"))
        {
            errors.add("image_url", "آدرس لینک باید با http:// یا https:// شروع شود");
        }

        let category = match self.category.as_deref().map(str::trim) {
            None | Some("") => ProductCategory::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                errors.add("category", "دسته‌بندی نامعتبر است");
                ProductCategory::default()
            }),
        };

        // Range-checked above.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let stock = self.stock as u32;

        errors.into_result(ValidProduct {
            name,
            description,
            price: Price::new(self.price),
            stock,
            image_url,
            is_available: self.is_available.unwrap_or(true),
            category,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Product features
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureForm {
    /// Present for features that already exist.
    #[serde(default)]
    pub id: Option<ProductFeatureId>,
    pub feature_name: String,
    pub feature_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidFeature {
    pub id: Option<ProductFeatureId>,
    pub name: String,
    pub value: String,
}

/// The full feature list of one product, saved together.
#[derive(Debug, Clone, Deserialize)]
pub struct FeaturesForm {
    pub features: Vec<FeatureForm>,
}

impl Validate for FeaturesForm {
    type Output = Vec<ValidFeature>;

    fn validate(self) -> Result<Vec<ValidFeature>, FieldErrors> {
        let mut errors = FieldErrors::new();
        let features = self
            .features
            .into_iter()
            .enumerate()
            .map(|(index, form)| {
                let name = form.feature_name.trim().to_string();
                let value = form.feature_value.trim().to_string();
                if name.is_empty() {
                    errors.add(format!("features[{index}].feature_name"), "لطفاً همه فیلدها را پر کنید");
                }
                if value.is_empty() {
                    errors.add(format!("features[{index}].feature_value"), "لطفاً همه فیلدها را پر کنید");
                }
                ValidFeature { id: form.id, name, value }
            })
            .collect();
        errors.into_result(features)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct StoreForm {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidStore {
    pub name: String,
    pub description: Option<String>,
    pub phone: Option<PhoneNumber>,
    pub address: Option<String>,
    pub logo_url: Option<String>,
}

impl Validate for StoreForm {
    type Output = ValidStore;

    fn validate(self) -> Result<ValidStore, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = bounded(
            &mut errors,
            "name",
            &self.name,
            (1, "نام غرفه الزامی است"),
            (100, "نام غرفه نباید بیشتر از ۱۰۰ کاراکتر باشد"),
        );
        let description = optional(
            &mut errors,
            "description",
            self.description.as_deref(),
            (1000, "توضیحات نباید بیشتر از ۱۰۰۰ کاراکتر باشد"),
        );
        let phone = optional_phone(&mut errors, "phone", self.phone.as_deref());
        let address = optional(
            &mut errors,
            "address",
            self.address.as_deref(),
            (500, "آدرس نباید بیشتر از ۵۰۰ کاراکتر باشد"),
        );
        let logo_url = optional(
            &mut errors,
            "logo_url",
            self.logo_url.as_deref(),
            (500, "آدرس لوگو نباید بیشتر از ۵۰۰ کاراکتر باشد"),
        );

        errors.into_result(ValidStore {
            name,
            description,
            phone,
            address,
            logo_url,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileForm {
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidProfile {
    pub full_name: String,
    pub phone: Option<PhoneNumber>,
}

impl Validate for ProfileForm {
    type Output = ValidProfile;

    fn validate(self) -> Result<ValidProfile, FieldErrors> {
        let mut errors = FieldErrors::new();
        let full_name = bounded(
            &mut errors,
            "full_name",
            &self.full_name,
            (1, "نام و نام خانوادگی الزامی است"),
            (100, "نام نباید بیشتر از ۱۰۰ کاراکتر باشد"),
        );
        let phone = optional_phone(&mut errors, "phone", self.phone.as_deref());
        errors.into_result(ValidProfile { full_name, phone })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sign-up and login
// ─────────────────────────────────────────────────────────────────────────────

/// Implements `Debug` manually to keep passwords out of logs.
#[derive(Clone, Deserialize)]
pub struct SignupForm {
    #[serde(alias = "fullName")]
    pub full_name: String,
    pub email: String,
    pub password: String,
    #[serde(alias = "confirmPassword")]
    pub confirm_password: String,
}

impl std::fmt::Debug for SignupForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupForm")
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ValidSignup {
    pub full_name: String,
    pub email: Email,
    pub password: SecretString,
}

impl Validate for SignupForm {
    type Output = ValidSignup;

    fn validate(self) -> Result<ValidSignup, FieldErrors> {
        let mut errors = FieldErrors::new();
        let full_name = bounded(
            &mut errors,
            "full_name",
            &self.full_name,
            (2, "نام باید حداقل ۲ کاراکتر باشد"),
            (100, "نام حداکثر ۱۰۰ کاراکتر"),
        );
        let email = email(&mut errors, &self.email);
        password(&mut errors, &self.password);
        if self.password != self.confirm_password {
            errors.add("confirm_password", "رمزهای عبور یکسان نیستند");
        }

        match email {
            Some(email) if errors.is_empty() => Ok(ValidSignup {
                full_name,
                email,
                password: SecretString::from(self.password),
            }),
            _ => Err(errors),
        }
    }
}

/// Implements `Debug` manually to keep the password out of logs.
#[derive(Clone, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ValidLogin {
    pub email: Email,
    pub password: SecretString,
}

impl Validate for LoginForm {
    type Output = ValidLogin;

    fn validate(self) -> Result<ValidLogin, FieldErrors> {
        let mut errors = FieldErrors::new();
        let email = email(&mut errors, &self.email);
        password(&mut errors, &self.password);

        match email {
            Some(email) if errors.is_empty() => Ok(ValidLogin {
                email,
                password: SecretString::from(self.password),
            }),
            _ => Err(errors),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Order notes
// ─────────────────────────────────────────────────────────────────────────────

/// Trim checkout notes; empty becomes `None`.
///
/// # Errors
///
/// Returns [`FieldErrors`] when the trimmed notes exceed 500 characters.
pub fn validate_notes(raw: Option<&str>) -> Result<Option<String>, FieldErrors> {
    let mut errors = FieldErrors::new();
    let notes = optional(
        &mut errors,
        "notes",
        raw,
        (500, "توضیحات نباید بیشتر از ۵۰۰ کاراکتر باشد"),
    );
    errors.into_result(notes)
}
