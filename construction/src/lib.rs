// Stoa construction engine - main library exports

pub mod build;
pub mod fees;
pub mod parse;
pub mod service;
pub mod translate;

pub use self::build::*;
pub use self::fees::*;
pub use self::parse::*;
pub use self::service::*;
pub use self::translate::*;
