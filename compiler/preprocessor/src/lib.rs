pub use include::*;

mod include;
