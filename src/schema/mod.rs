pub mod layout;
pub mod types;

pub use layout::{ColumnLayout, LayoutDeviation};
pub use types::Column;
