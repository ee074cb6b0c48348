pub mod cache;
pub mod providers;
pub mod runs;
pub mod setup;
pub mod util;
pub mod validate;

pub use cache::*;
pub use providers::*;
pub use runs::*;
pub use setup::*;
pub use util::*;
pub use validate::*;
