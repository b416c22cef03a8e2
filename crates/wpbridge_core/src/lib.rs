pub mod diagnostic;
pub mod from_env;
pub mod resolver;
pub mod types;

pub use self::resolver::resolve;
pub use self::resolver::resolve_with_report;
