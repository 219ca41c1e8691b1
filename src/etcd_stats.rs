//! etcd v2 stats lookups
//!
//! `-m <stat>:<path>` fetches `<etcd url>/<stat>` (a JSON document) and walks
//! the `/`-separated path into it. `-m v2/members` produces a Zabbix
//! low-level discovery document instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::error::{ProbeError, ProbeResult};

pub const MEMBERS: &str = "v2/members";
pub const LEADER_STATS: &str = "v2/stats/leader";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsQuery {
    /// Member discovery (`v2/members`)
    Members,
    /// One value out of a stats document
    Metric { stat: String, path: Vec<String> },
}

impl StatsQuery {
    /// Endpoint path relative to the etcd client URL
    pub fn stat(&self) -> &str {
        match self {
            Self::Members => MEMBERS,
            Self::Metric { stat, .. } => stat,
        }
    }
}

impl FromStr for StatsQuery {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == MEMBERS {
            return Ok(Self::Members);
        }

        let parts: Vec<&str> = s.split(':').collect();
        let [stat, path] = parts.as_slice() else {
            return Err(ProbeError::BadQuerySyntax(format!(
                "wrong metric syntax '{}' (expected <stat>:<path>)",
                s
            )));
        };

        if stat.is_empty() || path.is_empty() {
            return Err(ProbeError::BadQuerySyntax(format!(
                "wrong metric syntax '{}' (empty stat or path)",
                s
            )));
        }

        Ok(Self::Metric {
            stat: stat.to_lowercase(),
            path: path.split('/').map(str::to_string).collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct MemberList {
    members: Vec<Member>,
}

#[derive(Debug, Deserialize)]
struct Member {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct Discovery {
    data: Vec<DiscoveredMember>,
}

#[derive(Debug, Serialize)]
struct DiscoveredMember {
    #[serde(rename = "{#NAME}")]
    name: String,
    #[serde(rename = "{#ID}")]
    id: String,
}

/// Turn a `v2/members` document into low-level discovery JSON (4-space indent)
pub fn members_discovery(body: &[u8]) -> ProbeResult<String> {
    let list: MemberList = serde_json::from_slice(body)?;

    let discovery = Discovery {
        data: list
            .members
            .into_iter()
            .map(|m| DiscoveredMember {
                name: m.name,
                id: m.id,
            })
            .collect(),
    };

    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    discovery.serialize(&mut ser)?;

    String::from_utf8(out).map_err(|e| ProbeError::Parse(e.to_string()))
}

/// Resolve `path` inside a stats document
///
/// Leader stats get two shortcuts: asking the leader about itself yields `0`,
/// and asking a follower for leader stats yields `-1`.
///
/// # Errors
/// - `ProbeError::Parse` if the body is not a JSON object
/// - `ProbeError::NotFound` if the path does not resolve or ends at `null`
pub fn lookup(body: &[u8], stat: &str, path: &[String]) -> ProbeResult<String> {
    let stats: Value = serde_json::from_slice(body)?;
    if !stats.is_object() {
        return Err(ProbeError::Parse(format!("response for {} is not an object", stat)));
    }

    if stat == LEADER_STATS {
        if let Some(member) = path.get(1) {
            if stats.get("leader").and_then(Value::as_str) == Some(member.as_str()) {
                return Ok("0".to_string());
            }
        }
        if stats.get("message").and_then(Value::as_str) == Some("not current leader") {
            return Ok("-1".to_string());
        }
    }

    let value = path
        .iter()
        .try_fold(&stats, |node, key| child(node, key))
        .ok_or_else(|| ProbeError::NotFound(format!("{}:{}", stat, path.join("/"))))?;

    match value {
        Value::Null => Err(ProbeError::NotFound(format!("{}:{} is null", stat, path.join("/")))),
        Value::String(s) => Ok(s.clone()),
        other => Ok(other.to_string()),
    }
}

fn child<'a>(node: &'a Value, key: &str) -> Option<&'a Value> {
    match node {
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => node.get(key),
    }
}
