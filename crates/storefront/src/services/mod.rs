//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Registration, login, token signing, sessions
//! - `cache` - In-process catalog cache
//! - `catalog` - Products and collections
//! - `coupons` - Coupon rules and administration
//! - `checkout` - Order pricing, creation, and lifecycle
//! - `paystack` - Paystack API client and webhook signatures
//! - `payments` - Payment initialization, verification, settlement, refunds
//!
//! Services borrow the pool for the length of one request and are built in
//! the handler: `CatalogService::new(state.pool(), state.cache())`.

pub mod auth;
pub mod cache;
pub mod catalog;
pub mod checkout;
pub mod coupons;
pub mod payments;
pub mod paystack;

pub use auth::{AuthError, AuthService, TokenSigner};
pub use cache::CatalogCache;
pub use catalog::{CatalogError, CatalogService};
pub use checkout::{CheckoutError, OrderService};
pub use coupons::{CouponError, CouponService};
pub use payments::{PaymentError, PaymentService};
pub use paystack::{PaystackClient, PaystackError};
