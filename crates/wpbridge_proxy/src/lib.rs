//! Routes WordPress asset URLs through the reverse proxy.
//!
//! * [`path`] translates between backend URLs and proxy paths
//! * [`codec`] obfuscates the backend origin for transport to the browser
//! * [`origin`] resolves and caches the backend origin of each instance
pub mod codec;
pub mod origin;
pub mod path;

pub use self::origin::*;
pub use self::path::*;
