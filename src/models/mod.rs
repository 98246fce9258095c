pub mod page;
pub mod record;
pub mod source;

pub use page::*;
pub use record::*;
pub use source::*;
