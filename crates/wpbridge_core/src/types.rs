pub use self::asset_descriptor::*;
pub use self::options::*;

mod asset_descriptor;
mod options;
