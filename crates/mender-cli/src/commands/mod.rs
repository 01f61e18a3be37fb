//! Command implementations.

pub mod ask;
pub mod inspect;
pub mod tools;

pub use self::ask::execute_ask;
pub use self::inspect::execute_inspect;
pub use self::tools::execute_tools;
