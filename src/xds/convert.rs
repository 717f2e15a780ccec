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

//! Conversions between xDS wire values and the types resources are built
//! from.

use std::net::{IpAddr, SocketAddr};

use crate::xds::core::{
    address, socket_address::PortSpecifier, socket_address::Protocol, Address, SocketAddress,
};

const NANOS_PER_SECOND: i128 = 1_000_000_000;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("address has no host")]
    EmptyHost,
    #[error("port {0} does not fit in 16 bits")]
    PortOutOfRange(u32),
    #[error("socket address for {0:?} has no port")]
    MissingPort(String),
    #[error("named port {0:?} cannot be resolved by the control plane")]
    NamedPort(String),
    #[error("address is empty")]
    MissingAddress,
    #[error("{0} addresses are not socket addresses")]
    UnsupportedAddress(&'static str),
    #[error("duration of {seconds}s and {nanos}ns is out of range")]
    DurationOutOfRange { seconds: i64, nanos: i32 },
    #[error("negative duration {0} is not allowed here")]
    NegativeDuration(time::Duration),
}

/// Builds the wire address for `host` and `port`.
pub fn to_wire_address(host: &str, port: u32) -> Result<Address, ConversionError> {
    if host.is_empty() {
        return Err(ConversionError::EmptyHost);
    }

    if u16::try_from(port).is_err() {
        return Err(ConversionError::PortOutOfRange(port));
    }

    Ok(Address {
        address: Some(address::Address::SocketAddress(SocketAddress {
            protocol: Protocol::Tcp as i32,
            address: host.into(),
            port_specifier: Some(PortSpecifier::PortValue(port)),
            ..<_>::default()
        })),
    })
}

/// Extracts the host and port from a wire address.
pub fn from_wire_address(address: &Address) -> Result<(String, u16), ConversionError> {
    let socket = match &address.address {
        Some(address::Address::SocketAddress(socket)) => socket,
        Some(address::Address::Pipe(_)) => return Err(ConversionError::UnsupportedAddress("pipe")),
        Some(address::Address::EnvoyInternalAddress(_)) => {
            return Err(ConversionError::UnsupportedAddress("internal"))
        }
        None => return Err(ConversionError::MissingAddress),
    };

    if socket.address.is_empty() {
        return Err(ConversionError::EmptyHost);
    }

    let port = match &socket.port_specifier {
        Some(PortSpecifier::PortValue(port)) => {
            u16::try_from(*port).map_err(|_| ConversionError::PortOutOfRange(*port))?
        }
        Some(PortSpecifier::NamedPort(name)) => {
            return Err(ConversionError::NamedPort(name.clone()))
        }
        None => return Err(ConversionError::MissingPort(socket.address.clone())),
    };

    Ok((socket.address.clone(), port))
}

/// The `host:port` form of a wire address, with IPv6 hosts in brackets.
pub fn address_key(address: &Address) -> Result<String, ConversionError> {
    let (host, port) = from_wire_address(address)?;
    Ok(match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port).to_string(),
        Err(_) => format!("{host}:{port}"),
    })
}

/// Converts a wire duration, which may carry more than a second of nanos or
/// mixed signs, into a normalized duration.
pub fn from_wire_duration(
    duration: &prost_types::Duration,
) -> Result<time::Duration, ConversionError> {
    let total =
        i128::from(duration.seconds) * NANOS_PER_SECOND + i128::from(duration.nanos);
    let out_of_range = || ConversionError::DurationOutOfRange {
        seconds: duration.seconds,
        nanos: duration.nanos,
    };

    // Truncating division keeps the remainder's sign equal to the seconds'.
    let seconds = i64::try_from(total / NANOS_PER_SECOND).map_err(|_| out_of_range())?;
    let nanos = i32::try_from(total % NANOS_PER_SECOND).map_err(|_| out_of_range())?;

    Ok(time::Duration::new(seconds, nanos))
}

pub fn to_wire_duration(duration: time::Duration) -> prost_types::Duration {
    prost_types::Duration {
        seconds: duration.whole_seconds(),
        nanos: duration.subsec_nanoseconds(),
    }
}

/// Normalizes a wire duration, rejecting negative values. Used for timeouts,
/// where a negative value has no meaning.
pub fn timeout(duration: &prost_types::Duration) -> Result<prost_types::Duration, ConversionError> {
    let duration = from_wire_duration(duration)?;
    if duration.is_negative() {
        return Err(ConversionError::NegativeDuration(duration));
    }

    Ok(to_wire_duration(duration))
}

pub fn from_std_duration(duration: std::time::Duration) -> Result<time::Duration, ConversionError> {
    time::Duration::try_from(duration).map_err(|_| ConversionError::DurationOutOfRange {
        seconds: i64::try_from(duration.as_secs()).unwrap_or(i64::MAX),
        nanos: duration.subsec_nanos() as i32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn wire(seconds: i64, nanos: i32) -> prost_types::Duration {
        prost_types::Duration { seconds, nanos }
    }

    #[test]
    fn address_round_trip() {
        for (host, port) in [
            ("10.0.0.5", 80),
            ("0.0.0.0", 15001),
            ("fd00::1", 443),
            ("reviews.default.svc.cluster.local", 9080),
        ] {
            let address = to_wire_address(host, port.into()).unwrap();
            assert_eq!(from_wire_address(&address).unwrap(), (host.to_owned(), port));
        }
    }

    #[test]
    fn address_keys() {
        let key = |host, port| address_key(&to_wire_address(host, port).unwrap()).unwrap();

        assert_eq!(key("10.0.0.5", 80), "10.0.0.5:80");
        assert_eq!(key("fd00::1", 443), "[fd00::1]:443");
        assert_eq!(key("example.com", 8080), "example.com:8080");
    }

    #[test]
    fn invalid_addresses() {
        assert_eq!(to_wire_address("", 80), Err(ConversionError::EmptyHost));
        assert_eq!(
            to_wire_address("10.0.0.5", 70_000),
            Err(ConversionError::PortOutOfRange(70_000))
        );
        assert_eq!(
            from_wire_address(&Address::default()),
            Err(ConversionError::MissingAddress)
        );

        let pipe = Address {
            address: Some(address::Address::Pipe(<_>::default())),
        };
        assert_eq!(
            from_wire_address(&pipe),
            Err(ConversionError::UnsupportedAddress("pipe"))
        );

        let named = Address {
            address: Some(address::Address::SocketAddress(SocketAddress {
                address: "10.0.0.5".into(),
                port_specifier: Some(PortSpecifier::NamedPort("http".into())),
                ..<_>::default()
            })),
        };
        assert_eq!(
            from_wire_address(&named),
            Err(ConversionError::NamedPort("http".into()))
        );

        let wide = Address {
            address: Some(address::Address::SocketAddress(SocketAddress {
                address: "10.0.0.5".into(),
                port_specifier: Some(PortSpecifier::PortValue(65_536)),
                ..<_>::default()
            })),
        };
        assert_eq!(
            from_wire_address(&wide),
            Err(ConversionError::PortOutOfRange(65_536))
        );
    }

    #[test]
    fn duration_round_trip() {
        for duration in [
            time::Duration::ZERO,
            time::Duration::new(1, 500),
            time::Duration::new(-3, -999_999_999),
            time::Duration::nanoseconds(1),
            time::Duration::MAX,
            time::Duration::MIN,
        ] {
            assert_eq!(
                from_wire_duration(&to_wire_duration(duration)).unwrap(),
                duration
            );
        }
    }

    #[test]
    fn unnormalized_wire_durations() {
        let normalize = |d: prost_types::Duration| to_wire_duration(from_wire_duration(&d).unwrap());

        assert_eq!(normalize(wire(1, 1_500_000_000)), wire(2, 500_000_000));
        assert_eq!(normalize(wire(1, -250_000_000)), wire(0, 750_000_000));
        assert_eq!(normalize(wire(-1, 250_000_000)), wire(0, -750_000_000));
        assert_eq!(normalize(wire(0, -2_000_000_001)), wire(-2, -1));
        assert_eq!(normalize(wire(5, 0)), wire(5, 0));
    }

    #[test]
    fn out_of_range_durations_do_not_panic() {
        assert_eq!(
            from_wire_duration(&wire(i64::MAX, 999_999_999)),
            Ok(time::Duration::MAX)
        );
        assert_eq!(
            from_wire_duration(&wire(i64::MAX, i32::MAX)),
            Err(ConversionError::DurationOutOfRange {
                seconds: i64::MAX,
                nanos: i32::MAX
            })
        );
        assert!(from_wire_duration(&wire(i64::MIN, i32::MIN)).is_err());
    }

    #[test]
    fn timeouts_reject_negative_values() {
        assert_eq!(timeout(&wire(1, 0)), Ok(wire(1, 0)));
        assert!(matches!(
            timeout(&wire(0, -1)),
            Err(ConversionError::NegativeDuration(_))
        ));
    }

    #[test]
    fn std_durations() {
        assert_eq!(
            from_std_duration(std::time::Duration::from_millis(1500)),
            Ok(time::Duration::milliseconds(1500))
        );
        assert!(from_std_duration(std::time::Duration::MAX).is_err());
    }
}
