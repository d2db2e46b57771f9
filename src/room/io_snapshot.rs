// Reading the JSON export of the voting rooms.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;

use irv_tally::CandidateId;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use snafu::prelude::*;

use crate::room::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Active,
    Closed,
}

impl Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RoomStatus::Waiting => "waiting",
            RoomStatus::Active => "active",
            RoomStatus::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RoomInfo {
    pub title: String,
    pub description: Option<String>,
    pub status: RoomStatus,
    #[serde(rename = "adminKey")]
    pub admin_key: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: i64,
    #[serde(rename = "maxRank")]
    pub max_rank: Option<u32>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(rename = "id")]
    _id: JSValue,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub display_order: i64,
}

impl CandidateRecord {
    pub fn id(&self) -> RoomResult<CandidateId> {
        read_js_candidate_id(&self._id)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VoterRecord {
    /// The session of the voter.
    #[serde(rename = "oderId")]
    pub session_id: String,
    pub nickname: String,
    #[serde(rename = "hasVoted", default)]
    pub has_voted: bool,
    #[serde(rename = "joinedAt", default)]
    pub joined_at: i64,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    /// rank (1 = first choice) -> candidate id
    #[serde(default)]
    pub rankings: Keyed<JSValue>,
    #[serde(rename = "votedAt", default)]
    pub voted_at: i64,
}

impl VoteRecord {
    /// The candidates, by rank.
    pub fn ranks(&self) -> RoomResult<BTreeMap<u32, CandidateId>> {
        let mut res: BTreeMap<u32, CandidateId> = BTreeMap::new();
        for (key, value) in self.rankings.entries() {
            let rank = key
                .parse::<u32>()
                .ok()
                .context(InvalidRankSnafu { key: key.clone() })?;
            res.insert(rank, read_js_candidate_id(value)?);
        }
        Ok(res)
    }

    /// The candidates, by rank, without the entries that cannot be read.
    pub fn readable_ranks(&self) -> BTreeMap<u32, CandidateId> {
        let mut res: BTreeMap<u32, CandidateId> = BTreeMap::new();
        for (key, value) in self.rankings.entries() {
            match (key.parse::<u32>(), read_js_candidate_id(value)) {
                (Ok(rank), Ok(cid)) => {
                    res.insert(rank, cid);
                }
                _ => {
                    warn!("readable_ranks: dropping ranking entry {:?}: {}", key, value);
                }
            }
        }
        res
    }
}

/// A collection keyed by strings.
///
/// When all the keys are small integers, the database exports the collection as an array,
/// with null for the missing keys.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Keyed<T> {
    Map(BTreeMap<String, T>),
    List(Vec<Option<T>>),
}

impl<T> Default for Keyed<T> {
    fn default() -> Self {
        Keyed::Map(BTreeMap::new())
    }
}

impl<T> Keyed<T> {
    pub fn entries(&self) -> Vec<(String, &T)> {
        match self {
            Keyed::Map(m) => m.iter().map(|(k, v)| (k.clone(), v)).collect(),
            Keyed::List(l) => l
                .iter()
                .enumerate()
                .filter_map(|(idx, v)| v.as_ref().map(|x| (idx.to_string(), x)))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        match self {
            Keyed::Map(m) => m.get(key),
            Keyed::List(l) => {
                let idx = key.parse::<usize>().ok()?;
                l.get(idx).and_then(|v| v.as_ref())
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Keyed::Map(m) => m.len(),
            Keyed::List(l) => l.iter().filter(|v| v.is_some()).count(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RoomData {
    pub info: RoomInfo,
    #[serde(default)]
    pub candidates: Keyed<CandidateRecord>,
    #[serde(default)]
    pub voters: Keyed<VoterRecord>,
    #[serde(default)]
    pub votes: Keyed<VoteRecord>,
}

/// A candidate, as presented to the users.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CandidateView {
    pub id: u32,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub display_order: i64,
}

impl RoomData {
    /// The candidates in display order.
    pub fn candidate_views(&self) -> RoomResult<Vec<CandidateView>> {
        let mut res: Vec<CandidateView> = Vec::new();
        for (_, c) in self.candidates.entries() {
            res.push(CandidateView {
                id: c.id()?.0,
                name: c.name.clone(),
                description: c.description.clone(),
                image_url: c.image_url.clone(),
                display_order: c.display_order,
            });
        }
        res.sort_by_key(|c| (c.display_order, c.id));
        Ok(res)
    }

    /// The voter with this key and the vote it cast, for all the votes of the room.
    /// Votes without a known voter are returned with None.
    pub fn votes_with_voters(&self) -> Vec<(String, Option<&VoterRecord>, &VoteRecord)> {
        self.votes
            .entries()
            .into_iter()
            .map(|(key, vote)| {
                let voter = self.voters.get(&key);
                (key, voter, vote)
            })
            .collect()
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    #[serde(default)]
    pub rooms: BTreeMap<String, RoomData>,
}

/// The rooms of a JSON export, held in memory.
pub struct SnapshotStore {
    snapshot: RoomSnapshot,
}

impl SnapshotStore {
    pub fn from_path(path: &str) -> RoomResult<SnapshotStore> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
        SnapshotStore::from_json_str(&contents)
    }

    pub fn from_json_str(contents: &str) -> RoomResult<SnapshotStore> {
        let snapshot: RoomSnapshot = serde_json::from_str(contents).context(ParsingJsonSnafu {})?;
        debug!(
            "SnapshotStore: rooms: {:?}",
            snapshot.rooms.keys().collect::<Vec<_>>()
        );
        Ok(SnapshotStore { snapshot })
    }
}

impl RoomStore for SnapshotStore {
    fn room(&self, code: &RoomCode) -> RoomResult<RoomData> {
        self.snapshot
            .rooms
            .get(code.as_str())
            .cloned()
            .context(RoomNotFoundSnafu {
                code: code.to_string(),
            })
    }
}

/// Candidate ids are written either as numbers or as strings.
pub fn read_js_candidate_id(x: &JSValue) -> RoomResult<CandidateId> {
    let id: Option<u32> = match x {
        JSValue::Number(n) => n.as_u64().and_then(|x| u32::try_from(x).ok()),
        JSValue::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    id.map(CandidateId).context(InvalidCandidateIdSnafu {
        content: x.to_string(),
    })
}
