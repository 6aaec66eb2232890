// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// An error originating in the host runtime.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HostError {
    /// The run loop is gone: the host was dropped or `run` has returned,
    /// so submissions can no longer be observed.
    #[error("the host run loop is no longer accepting submissions")]
    Closed,

    /// A routine addressed a request to a host that was configured not to
    /// expect any.
    #[error("unexpected request `{type_name}` reached the host")]
    UnexpectedRequest {
        /// Payload type of the offending request.
        type_name: &'static str,
    },
}
