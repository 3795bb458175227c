//! Error interfaces for this crate.

use std::borrow::Cow;
use std::ops::Range;

pub use crate::asm::{AsmErr, AsmErrKind};
pub use crate::asm::encoding::MemFormatErr;
pub use crate::ast::{OffsetNewErr, OperandErr};
pub use crate::ast::sim::{FieldAccessErr, InvalidOpcode};
pub use crate::parse::lex::LexErr;
pub use crate::parse::ParseErr;
pub use crate::sim::SimErr;

/// Unified error interface for all errors in this crate.
///
/// Note that the [`Display`] implementation is used for a brief message,
/// where as [`Error::help`] is used for any clarifying messages.
///
/// [`Display`]: std::fmt::Display
pub trait Error: std::error::Error {
    /// The source line (1-indexed) where this error occurs.
    ///
    /// If this is not known, this can be set to `None`.
    fn line(&self) -> Option<usize> {
        None
    }

    /// The range within the source line where this error occurs.
    ///
    /// If this is not known (or the whole line is at fault), this can be set to `None`.
    fn span(&self) -> Option<Range<usize>> {
        None
    }

    /// A clarifying message to help aid someone in how to fix the message.
    ///
    /// If there is none to add, this can be set to `None`.
    fn help(&self) -> Option<Cow<str>>;
}
