pub mod enums;
pub mod event;
pub mod question;
pub mod summary;

pub use enums::*;
pub use event::*;
pub use question::*;
pub use summary::*;
