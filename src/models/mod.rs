pub mod diagnostics;
pub mod error;
pub mod events;
pub mod health;
pub mod identity;
pub mod snapshot;

pub use diagnostics::*;
pub use error::*;
pub use events::*;
pub use health::*;
pub use identity::*;
pub use snapshot::*;
