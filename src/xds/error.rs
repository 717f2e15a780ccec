/*
 * Copyright 2020 Google LLC
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::net::SocketAddr;

use crate::{
    node::ParseError,
    xds::{BuildError, ResourceType, UnknownResourceType},
};

/// The remote end of a discovery stream, when the transport knows it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Peer(pub Option<SocketAddr>);

impl std::fmt::Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(address) => address.fmt(f),
            None => f.write_str("unknown peer address"),
        }
    }
}

impl From<Option<SocketAddr>> for Peer {
    fn from(address: Option<SocketAddr>) -> Self {
        Self(address)
    }
}

/// Why a discovery session or fetch ended abnormally.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("discovery request has no node")]
    MissingNode,
    #[error(transparent)]
    Identity(#[from] ParseError),
    #[error("failed to build {kind} resources: {source}")]
    Build {
        kind: ResourceType,
        #[source]
        source: BuildError,
    },
    #[error("stream serves {expected} resources, received a request for {found:?}")]
    UnexpectedResourceType {
        expected: ResourceType,
        found: String,
    },
    #[error(transparent)]
    UnknownResourceType(#[from] UnknownResourceType),
    #[error("failed to receive from {peer}: {status}")]
    Receive { peer: Peer, status: tonic::Status },
    #[error("failed to send response to {peer}")]
    SendFailed { peer: Peer },
}

impl From<Error> for tonic::Status {
    fn from(error: Error) -> Self {
        match error {
            Error::Receive { status, .. } => status,
            Error::Identity(error) => error.into(),
            Error::UnknownResourceType(error) => error.into(),
            Error::MissingNode | Error::UnexpectedResourceType { .. } => {
                tonic::Status::invalid_argument(error.to_string())
            }
            Error::Build { .. } => tonic::Status::internal(error.to_string()),
            Error::SendFailed { .. } => tonic::Status::unavailable(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeIdentity;
    use pretty_assertions::assert_eq;

    #[test]
    fn status_codes() {
        let identity = NodeIdentity::parse("garbage").unwrap_err();
        assert_eq!(
            tonic::Status::from(Error::from(identity)).code(),
            tonic::Code::InvalidArgument
        );
        assert_eq!(
            tonic::Status::from(Error::MissingNode).code(),
            tonic::Code::InvalidArgument
        );
        assert_eq!(
            tonic::Status::from(Error::Build {
                kind: ResourceType::Listener,
                source: BuildError::InvalidAddress {
                    address: "reviews".into()
                },
            })
            .code(),
            tonic::Code::Internal
        );

        let status = tonic::Status::data_loss("truncated");
        let converted = tonic::Status::from(Error::Receive {
            peer: Peer(None),
            status,
        });
        assert_eq!(converted.code(), tonic::Code::DataLoss);
        assert_eq!(converted.message(), "truncated");
    }

    #[test]
    fn peer_display() {
        assert_eq!(Peer(None).to_string(), "unknown peer address");
        assert_eq!(
            Peer(Some("127.0.0.1:5000".parse().unwrap())).to_string(),
            "127.0.0.1:5000"
        );
    }
}
