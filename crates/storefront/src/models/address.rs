//! Saved shipping addresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use apothecary_core::{AddressId, Phone, UserId};

use crate::services::CommerceError;

/// A saved address. At most one per user has `is_default` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub full_name: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw address body.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressRequest {
    pub full_name: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Validated address fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressDraft {
    pub full_name: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

impl AddressRequest {
    /// Validate into an [`AddressDraft`] and the requested default flag.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Validation` naming the first blank field, or
    /// if the phone number is malformed.
    pub fn validate(self) -> Result<(AddressDraft, bool), CommerceError> {
        let phone = Phone::parse(&self.phone).map_err(|e| CommerceError::Validation(e.to_string()))?;

        let draft = AddressDraft {
            full_name: required(&self.full_name, "full name")?,
            phone: phone.into(),
            address_line1: required(&self.address_line1, "address line 1")?,
            address_line2: self
                .address_line2
                .map(|l| l.trim().to_owned())
                .filter(|l| !l.is_empty()),
            city: required(&self.city, "city")?,
            state: required(&self.state, "state")?,
            pincode: required(&self.pincode, "pincode")?,
        };
        Ok((draft, self.is_default))
    }
}

pub(super) fn required(value: &str, field: &str) -> Result<String, CommerceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CommerceError::Validation(format!("{field} is required")));
    }
    Ok(value.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request() -> AddressRequest {
        AddressRequest {
            full_name: "Asha Rao".into(),
            phone: "9876543210".into(),
            address_line1: "12 MG Road".into(),
            address_line2: Some("   ".into()),
            city: "Pune".into(),
            state: "Maharashtra".into(),
            pincode: "411001".into(),
            is_default: true,
        }
    }

    #[test]
    fn test_validate_ok() {
        let (draft, is_default) = request().validate().unwrap();
        assert!(is_default);
        assert_eq!(draft.address_line2, None);
        assert_eq!(draft.city, "Pune");
    }

    #[test]
    fn test_validate_missing_field() {
        let mut req = request();
        req.pincode = String::new();
        let err = req.validate().unwrap_err();
        assert!(matches!(err, CommerceError::Validation(msg) if msg == "pincode is required"));
    }
}
