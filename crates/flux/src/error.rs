// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

use crate::BoxError;

/// An error originating in the engine itself.
///
/// User failures travel through the algebra as opaque
/// [`BoxError`](crate::BoxError) payloads; this enum covers the cases the
/// engine reports on its own behalf.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FluxError {
    /// The host answered a request with a response that could not be
    /// downcast to the type the requester asked for.
    #[error("request reply could not be downcast to `{expected}`")]
    ReplyTypeMismatch {
        /// The response type the requesting routine expected.
        expected: &'static str,
    },

    /// We are re-packaging an error we obtained from some downstream
    /// mechanism without adding further details in the engine layer.
    #[error(transparent)]
    Other(#[from] BoxError),
}
