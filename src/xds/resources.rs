/*
 * Copyright 2023 Google LLC
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

//! The [`Kind`][crate::xds::Kind] of each resource type served.

mod cluster;
mod endpoint;
mod listener;
mod route;

use std::net::IpAddr;

use crate::xds::{
    convert::{self, ConversionError},
    core::Address,
    BuildError,
};

pub use self::{cluster::Clusters, endpoint::Endpoints, listener::Listeners, route::Routes};

/// Parses a bind or endpoint address, which must be an IP address.
fn ip(address: &str) -> Result<IpAddr, BuildError> {
    address
        .parse()
        .map_err(|_| BuildError::InvalidAddress {
            address: address.into(),
        })
}

fn socket_address(ip: IpAddr, port: u32) -> Result<Address, BuildError> {
    Ok(convert::to_wire_address(&ip.to_string(), port)?)
}

fn optional_timeout(
    duration: Option<crate::mesh::WireDuration>,
) -> Result<Option<prost_types::Duration>, ConversionError> {
    duration
        .map(|duration| convert::timeout(&duration.into()))
        .transpose()
}

fn address_key(address: Option<&Address>) -> Result<String, BuildError> {
    Ok(convert::address_key(
        address.ok_or(ConversionError::MissingAddress)?,
    )?)
}
