/// \[#next-free-field: 36\]
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Listener {
    /// The unique name by which this listener is known. If no name is provided,
    /// Envoy will allocate an internal UUID for the listener. If the listener is to be dynamically
    /// updated or removed via :ref:`LDS <config_listeners_lds>` a unique name must be provided.
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    /// The address that the listener should listen on. In general, the address must be unique, though
    /// that is governed by the bind rules of the OS. E.g., multiple listeners can listen on port 0 on
    /// Linux as the actual port will be allocated by the OS.
    #[prost(message, optional, tag = "2")]
    pub address: ::core::option::Option<super::super::core::v3::Address>,
    /// If a connection is redirected using *iptables*, the port on which the proxy
    /// receives it might be different from the original destination address. When this flag is set to
    /// true, the listener hands off redirected connections to the listener associated with the
    /// original destination address. If there is no listener associated with the original destination
    /// address, the connection is handled by the listener that receives it.
    #[prost(message, optional, tag = "4")]
    pub use_original_dst: ::core::option::Option<bool>,
    /// The timeout to wait for all listener filters to complete operation. If the timeout is reached,
    /// the accepted socket is closed without a connection being created unless
    /// `continue_on_listener_filters_timeout` is set to true. Specify 0 to disable the
    /// timeout. If not specified, a default timeout of 15s is used.
    #[prost(message, optional, tag = "15")]
    pub listener_filters_timeout: ::core::option::Option<::prost_types::Duration>,
    /// Specifies the intended direction of the traffic relative to the local Envoy.
    #[prost(enumeration = "super::super::core::v3::TrafficDirection", tag = "16")]
    pub traffic_direction: i32,
    /// Optional prefix to use on listener stats. If empty, the stats will be rooted at
    /// `listener.<address as string>.`. If non-empty, stats will be rooted at
    /// `listener.<stat_prefix>.`.
    #[prost(string, tag = "28")]
    pub stat_prefix: ::prost::alloc::string::String,
}
