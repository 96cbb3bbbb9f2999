//! Framework-agnostic shop and account-holder entities.

pub mod account_holder;
pub mod shop;
pub mod sync_state;

pub use account_holder::{
    gender_from_civility, AccountHolderDetails, CreateAccountHolderRequest,
    CreateAccountHolderResponse, Gender, IndividualDetails, InvalidField, LegalEntity, Name,
    ProviderError, ProviderMessage, ShareholderContact,
};
pub use shop::{AdditionalField, AdditionalFieldType, ContactInformation, ShopPage, ShopRecord};
pub use sync_state::SyncState;
