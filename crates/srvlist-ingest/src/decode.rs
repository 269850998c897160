//! Frame → raw record decoding.

use std::collections::BTreeMap;

use bytes::Bytes;
use prost::Message;

use crate::error::DecodeError;
use crate::frame::LengthPrefixed;
use crate::proto;

/// Undecorated contents of one master-list entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawServerRecord {
    pub endpoint_id: String,
    pub data: RawServerData,
}

/// The fields of a server's data section the transformer understands,
/// plus the raw variable bag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawServerData {
    pub hostname: String,
    pub gametype: String,
    pub mapname: String,
    pub server: String,
    pub clients: i32,
    pub max_clients: i32,
    pub upvote_power: i32,
    pub burst_power: i32,
    pub icon_version: Option<i32>,
    pub connect_endpoints: Vec<String>,
    pub vars: BTreeMap<String, String>,
}

impl RawServerRecord {
    /// The advertised `gamename` variable, if any.
    pub fn gamename(&self) -> Option<&str> {
        self.data.vars.get("gamename").map(String::as_str)
    }

    /// Encode as one length-prefixed master-list frame.
    pub fn to_frame(&self) -> Bytes {
        let payload = proto::Server::from(self.clone()).encode_to_vec();
        let mut out = Vec::with_capacity(payload.len() + 4);
        LengthPrefixed::encode(&payload, &mut out);
        Bytes::from(out)
    }
}

/// Decode one frame payload.
///
/// `Ok(None)` means the entry is well-formed but lacks an endpoint id or
/// a data section and carries nothing to ingest.
pub fn decode(frame: &[u8]) -> Result<Option<RawServerRecord>, DecodeError> {
    let server = proto::Server::decode(frame)?;
    let Some(data) = server.data else {
        return Ok(None);
    };
    if server.end_point.is_empty() {
        return Ok(None);
    }
    Ok(Some(RawServerRecord {
        endpoint_id: server.end_point,
        data: data.into(),
    }))
}

impl From<proto::ServerData> for RawServerData {
    fn from(data: proto::ServerData) -> Self {
        Self {
            hostname: data.hostname,
            gametype: data.gametype,
            mapname: data.mapname,
            server: data.server,
            clients: data.clients,
            max_clients: data.sv_maxclients,
            upvote_power: data.upvote_power,
            burst_power: data.burst_power,
            icon_version: data.icon_version,
            connect_endpoints: data.connect_end_points,
            vars: data.vars,
        }
    }
}

impl From<RawServerRecord> for proto::Server {
    fn from(record: RawServerRecord) -> Self {
        let data = record.data;
        Self {
            end_point: record.endpoint_id,
            data: Some(proto::ServerData {
                sv_maxclients: data.max_clients,
                clients: data.clients,
                hostname: data.hostname,
                gametype: data.gametype,
                mapname: data.mapname,
                server: data.server,
                icon_version: data.icon_version,
                vars: data.vars,
                upvote_power: data.upvote_power,
                connect_end_points: data.connect_endpoints,
                burst_power: data.burst_power,
            }),
        }
    }
}
