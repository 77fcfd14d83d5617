//! Domain models for the storefront.
//!
//! Request bodies (`*Request`) are validated once into the types the services
//! accept; stored entities are plain structs separate from database rows.

pub mod address;
pub mod order;
pub mod product;
pub mod session;
pub mod user;
pub mod wishlist;

pub use address::{Address, AddressDraft, AddressRequest};
pub use order::{
    Checkout, CheckoutLine, CheckoutRequest, ContactUpdate, ContactUpdateRequest, NewOrder,
    NewOrderItem, Order, OrderItem, OrderTracking, PaymentConfirmation, PaymentIntent, PaymentRecord,
    StatusUpdateRequest, order_total,
};
pub use product::{
    Product, ProductDraft, ProductFilter, ProductQuery, ProductRequest, ProductSort,
    RemoveImageRequest,
};
pub use session::{Principal, keys as session_keys};
pub use user::{Profile, ProfileAddress, ProfileUpdate, ProfileUpdateRequest, User};
pub use wishlist::{ProductSummary, WishlistEntry, WishlistItem, WishlistRequest};
