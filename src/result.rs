use crate::error::Error as RelayErr;
pub type Result<T> = std::result::Result<T, RelayErr>;
