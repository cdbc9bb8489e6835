pub mod element;
pub mod fingerprint;
pub mod step;

pub use element::{Element, ParseElementError};
pub use fingerprint::Fingerprint;
pub use step::{BondRow, Cell, Step, Structure};
