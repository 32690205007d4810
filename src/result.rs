use crate::error::Error as ForumErr;
/// Result of every fallible operation in this crate.
pub type Result<T> = std::result::Result<T, ForumErr>;
