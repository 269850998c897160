//! Wire messages of the master-list stream (`master.proto`).
//!
//! Only the fields the transformer consumes are declared; prost skips
//! the rest (players, resources, protocol, ...) while decoding.

use std::collections::BTreeMap;

/// One entry of the master list.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Server {
    /// Join id of the server.
    #[prost(string, tag = "1")]
    pub end_point: String,
    #[prost(message, optional, tag = "2")]
    pub data: Option<ServerData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServerData {
    #[prost(int32, tag = "1")]
    pub sv_maxclients: i32,
    #[prost(int32, tag = "2")]
    pub clients: i32,
    #[prost(string, tag = "4")]
    pub hostname: String,
    #[prost(string, tag = "5")]
    pub gametype: String,
    #[prost(string, tag = "6")]
    pub mapname: String,
    #[prost(string, tag = "9")]
    pub server: String,
    /// Absent when the server never uploaded an icon.
    #[prost(int32, optional, tag = "11")]
    pub icon_version: Option<i32>,
    #[prost(btree_map = "string, string", tag = "12")]
    pub vars: BTreeMap<String, String>,
    #[prost(int32, tag = "17")]
    pub upvote_power: i32,
    #[prost(string, repeated, tag = "18")]
    pub connect_end_points: Vec<String>,
    #[prost(int32, tag = "19")]
    pub burst_power: i32,
}
