//! The settings payload is a JSON blob that WooCommerce ships inside an inline script as
//! `var wcSettings = wcSettings || JSON.parse( decodeURIComponent( '...' ) );`.
//!
//! [`codec`] opens and re-seals that envelope, [`rewrite`] points the URLs inside it at the
//! frontend and the proxy.
pub mod codec;
pub mod rewrite;

pub use self::codec::*;
pub use self::rewrite::*;
