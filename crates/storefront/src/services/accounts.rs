//! Saved addresses and the account profile.

use tracing::{info, instrument};

use apothecary_core::AddressId;

use super::{CommerceError, finish};
use crate::db::{Store, Transaction};
use crate::models::{Address, AddressDraft, Principal, Profile, ProfileUpdate};

/// Recipient name used when the account has none.
const FALLBACK_RECIPIENT: &str = "Customer";

/// Account service.
pub struct AccountService<'a, S> {
    store: &'a S,
}

impl<'a, S: Store> AccountService<'a, S> {
    /// Create a new account service.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// The caller's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` if the query fails.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn list_addresses(&self, principal: &Principal) -> Result<Vec<Address>, CommerceError> {
        let mut tx = self.store.begin().await?;
        let result = tx
            .list_addresses(principal.user_id)
            .await
            .map_err(CommerceError::from);
        finish(tx, result).await
    }

    /// Save an address. A new default replaces the previous one.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` if a write fails.
    #[instrument(skip(self, principal, draft), fields(user_id = %principal.user_id))]
    pub async fn create_address(
        &self,
        principal: &Principal,
        draft: AddressDraft,
        is_default: bool,
    ) -> Result<Address, CommerceError> {
        let mut tx = self.store.begin().await?;
        let result: Result<Address, CommerceError> = async {
            if is_default {
                tx.clear_default_addresses(principal.user_id).await?;
            }
            Ok(tx.insert_address(principal.user_id, &draft, is_default).await?)
        }
        .await;
        let address = finish(tx, result).await?;

        info!(address_id = %address.id, "Address saved");
        Ok(address)
    }

    /// Delete one of the caller's addresses.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the caller has no such address.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id, address_id = %id))]
    pub async fn delete_address(&self, principal: &Principal, id: AddressId) -> Result<(), CommerceError> {
        let mut tx = self.store.begin().await?;
        let result = match tx.delete_address(principal.user_id, id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(CommerceError::not_found("address", id)),
            Err(e) => Err(e.into()),
        };
        finish(tx, result).await?;

        info!("Address deleted");
        Ok(())
    }

    /// The caller's account and default address.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the account does not exist.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn profile(&self, principal: &Principal) -> Result<Profile, CommerceError> {
        let mut tx = self.store.begin().await?;
        let result = Self::profile_in(&mut tx, principal).await;
        finish(tx, result).await
    }

    async fn profile_in(tx: &mut S::Tx, principal: &Principal) -> Result<Profile, CommerceError> {
        let user = tx
            .get_user(principal.user_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("user", principal.user_id))?;
        let default_address = tx.get_default_address(principal.user_id).await?;
        Ok(Profile {
            user,
            default_address,
        })
    }

    /// Update the caller's phone and default address.
    ///
    /// The existing default address is edited in place; if there is none a
    /// new default is created. The recipient name comes from the account and
    /// the phone from the update or, failing that, what is already stored.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Validation` if an address is given but no
    /// phone number is known for the account.
    #[instrument(skip(self, principal, update), fields(user_id = %principal.user_id))]
    pub async fn update_profile(&self, principal: &Principal, update: ProfileUpdate) -> Result<Profile, CommerceError> {
        let mut tx = self.store.begin().await?;
        let result = Self::update_profile_in(&mut tx, principal, update).await;
        let profile = finish(tx, result).await?;

        info!("Profile updated");
        Ok(profile)
    }

    async fn update_profile_in(
        tx: &mut S::Tx,
        principal: &Principal,
        update: ProfileUpdate,
    ) -> Result<Profile, CommerceError> {
        let user_id = principal.user_id;
        let user = tx
            .get_user(user_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("user", user_id))?;

        let phone: Option<String> = update.phone.map(String::from);
        if let Some(phone) = &phone {
            tx.set_user_phone(user_id, phone).await?;
        }

        if let Some(address) = update.address {
            let existing = tx.get_default_address(user_id).await?;
            let phone = phone
                .or_else(|| existing.as_ref().map(|a| a.phone.clone()))
                .or(user.phone)
                .ok_or_else(|| {
                    CommerceError::Validation("phone number is required to save an address".into())
                })?;
            let full_name = user.name.unwrap_or_else(|| FALLBACK_RECIPIENT.to_owned());
            let draft = address.into_draft(full_name, phone);

            match existing {
                Some(current) => {
                    tx.update_address(current.id, &draft)
                        .await?
                        .ok_or_else(|| CommerceError::not_found("address", current.id))?;
                }
                None => {
                    tx.insert_address(user_id, &draft, true).await?;
                }
            }
        }

        Self::profile_in(tx, principal).await
    }
}
