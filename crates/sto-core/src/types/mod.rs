//! Core data types: enums, the socket envelope, symbol metadata, chart bars,
//! and trading structs.

pub mod envelope;
pub mod enums;
pub mod market_data;
pub mod symbol;
pub mod trading;

pub use envelope::*;
pub use enums::*;
pub use market_data::*;
pub use symbol::*;
pub use trading::*;
