//! Customer account types.
//!
//! Accounts are provisioned by the identity provider; the storefront reads
//! them and lets the customer maintain a phone number and default address.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use apothecary_core::{Phone, UserId};

use super::address::{Address, AddressDraft};
use crate::services::CommerceError;

/// A storefront customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account profile: the user plus their default address, if any.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    pub default_address: Option<Address>,
}

/// Raw profile update body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdateRequest {
    pub phone: Option<String>,
    pub address: Option<ProfileAddressRequest>,
}

/// Default-address fields accepted on the profile form.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileAddressRequest {
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

/// Validated profile update.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub phone: Option<Phone>,
    pub address: Option<ProfileAddress>,
}

/// Validated default-address fields. Name and phone come from the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileAddress {
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

impl ProfileAddress {
    /// Complete the address with the recipient's name and phone.
    #[must_use]
    pub fn into_draft(self, full_name: String, phone: String) -> AddressDraft {
        AddressDraft {
            full_name,
            phone,
            address_line1: self.address_line1,
            address_line2: self.address_line2,
            city: self.city,
            state: self.state,
            pincode: self.pincode,
        }
    }
}

impl ProfileUpdateRequest {
    /// Validate the update.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Validation` if the phone is malformed or a
    /// required address field is blank.
    pub fn validate(self) -> Result<ProfileUpdate, CommerceError> {
        let phone = self
            .phone
            .filter(|p| !p.trim().is_empty())
            .map(|p| Phone::parse(&p).map_err(|e| CommerceError::Validation(e.to_string())))
            .transpose()?;

        let address = self
            .address
            .map(|a| -> Result<ProfileAddress, CommerceError> {
                Ok(ProfileAddress {
                    address_line1: super::address::required(&a.address_line1, "address line 1")?,
                    address_line2: a
                        .address_line2
                        .map(|l| l.trim().to_owned())
                        .filter(|l| !l.is_empty()),
                    city: super::address::required(&a.city, "city")?,
                    state: super::address::required(&a.state, "state")?,
                    pincode: super::address::required(&a.pincode, "pincode")?,
                })
            })
            .transpose()?;

        Ok(ProfileUpdate { phone, address })
    }
}
