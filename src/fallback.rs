//! Substitute results for terminal failures.
//!
//! A [`Fallback`] is passed at call time to
//! [`CommandExecutor::invoke`](crate::executor::CommandExecutor::invoke) and
//! consulted exactly once, only after the command failed terminally. It
//! either produces a substitute value or hands the error back.
//!
//! Closures work as fallbacks:
//!
//! ```
//! use cloudcmd_core::error::CommandError;
//! use cloudcmd_core::fallback::Fallback;
//!
//! let zero_on_not_found = |error: CommandError| {
//!     if error.is_not_found() { Ok(0_u64) } else { Err(error) }
//! };
//! let error = CommandError::Cancelled { attempts: 1 };
//! assert!(zero_on_not_found.create(error).is_err());
//! ```

use crate::error::CommandError;

/// Converts a terminal failure into a substitute result, or rethrows it.
pub trait Fallback<T>: Send + Sync {
    /// Returns a substitute for `error`, or `Err(error)` to surface it.
    ///
    /// # Errors
    ///
    /// Returns the error when no substitute applies.
    fn create(&self, error: CommandError) -> Result<T, CommandError>;
}

impl<T, F> Fallback<T> for F
where
    F: Fn(CommandError) -> Result<T, CommandError> + Send + Sync,
{
    fn create(&self, error: CommandError) -> Result<T, CommandError> {
        self(error)
    }
}

/// Surfaces every error unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rethrow;

impl<T> Fallback<T> for Rethrow {
    fn create(&self, error: CommandError) -> Result<T, CommandError> {
        Err(error)
    }
}

/// `None` on `404`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOnNotFound;

impl<T> Fallback<Option<T>> for NullOnNotFound {
    fn create(&self, error: CommandError) -> Result<Option<T>, CommandError> {
        if error.is_not_found() {
            Ok(None)
        } else {
            Err(error)
        }
    }
}

/// `false` on `404`, e.g. for existence checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct FalseOnNotFound;

impl Fallback<bool> for FalseOnNotFound {
    fn create(&self, error: CommandError) -> Result<bool, CommandError> {
        if error.is_not_found() {
            Ok(false)
        } else {
            Err(error)
        }
    }
}

/// `true` on `404`, e.g. for deletes that are already done.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrueOnNotFound;

impl Fallback<bool> for TrueOnNotFound {
    fn create(&self, error: CommandError) -> Result<bool, CommandError> {
        if error.is_not_found() {
            Ok(true)
        } else {
            Err(error)
        }
    }
}

/// `()` on `404`.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoidOnNotFound;

impl Fallback<()> for VoidOnNotFound {
    fn create(&self, error: CommandError) -> Result<(), CommandError> {
        if error.is_not_found() {
            Ok(())
        } else {
            Err(error)
        }
    }
}

/// An empty collection (any `Default` value) on `404`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyOnNotFound;

impl<T: Default> Fallback<T> for EmptyOnNotFound {
    fn create(&self, error: CommandError) -> Result<T, CommandError> {
        if error.is_not_found() {
            Ok(T::default())
        } else {
            Err(error)
        }
    }
}
