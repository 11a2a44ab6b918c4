pub mod enums;
pub mod page;
pub mod patient;
pub mod scan;
pub mod system_log;

pub use enums::*;
pub use page::*;
pub use patient::*;
pub use scan::*;
pub use system_log::*;
