pub use diagnostic::*;
pub use session::*;
pub use source_map::*;

mod diagnostic;
mod session;
mod source_map;
