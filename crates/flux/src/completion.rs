// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Failure payload carried by an errored routine.
///
/// The engine treats the payload as opaque; it is produced either by user
/// code (via [`Flux::failed`](crate::Flux::failed)) or by the host when it
/// answers a request with a failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Terminal outcome of a routine.
///
/// Once a routine reaches `Completed(outcome)`, the outcome is immutable.
#[derive(Debug)]
pub enum Completion<T> {
    /// Normal completion.
    Value(T),

    /// User-raised or host-reported failure.
    Error(BoxError),

    /// The routine was unwound by cancellation, either through the
    /// distinguished cancellation event or by a sibling combinator
    /// cancelling a loser.
    Cancelled,
}

impl<T> Completion<T> {
    /// Applies `f` to a `Value`; `Error` and `Cancelled` pass through.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Completion<U> {
        match self {
            Self::Value(value) => Completion::Value(f(value)),
            Self::Error(error) => Completion::Error(error),
            Self::Cancelled => Completion::Cancelled,
        }
    }

    /// Monadic composition: binding over an `Error` or `Cancelled`
    /// short-circuits without invoking `f`.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Completion<U>) -> Completion<U> {
        match self {
            Self::Value(value) => f(value),
            Self::Error(error) => Completion::Error(error),
            Self::Cancelled => Completion::Cancelled,
        }
    }

    /// Whether this is a `Value`.
    #[must_use]
    pub const fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Whether this is an `Error`.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Whether this is `Cancelled`.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Carries an `Error` or `Cancelled` outcome over to another value type.
    ///
    /// # Panics
    ///
    /// Panics on a `Value` - callers must have ruled it out.
    pub fn propagate<U>(self) -> Completion<U> {
        match self {
            Self::Value(_) => panic!("a value outcome cannot be propagated as a failure"),
            Self::Error(error) => Completion::Error(error),
            Self::Cancelled => Completion::Cancelled,
        }
    }
}
