use std::collections::BTreeMap;

use chrono::{SecondsFormat, TimeZone, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::room::io_snapshot::*;
use crate::room::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct StatusView {
    pub room_code: String,
    pub title: String,
    pub status: RoomStatus,
    pub voter_count: usize,
    pub vote_count: usize,
    pub candidates: Vec<CandidateView>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub candidate_id: u32,
    pub candidate_name: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VerificationView {
    pub nickname: String,
    pub has_voted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rankings: Option<BTreeMap<u32, RankedCandidate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voted_at: Option<String>,
    pub message: String,
}

pub const MSG_UNKNOWN_NICKNAME: &str = "No voter with this nickname";
pub const MSG_NOT_VOTED: &str = "This voter has not voted";
pub const MSG_RECORDED: &str = "The vote is recorded";

pub fn room_status(code: &RoomCode, room: &RoomData) -> RoomResult<StatusView> {
    Ok(StatusView {
        room_code: code.to_string(),
        title: room.info.title.clone(),
        status: room.info.status,
        voter_count: room.voters.len(),
        vote_count: room.votes.len(),
        candidates: room.candidate_views()?,
    })
}

/// Looks up the vote of the first voter registered with this nickname.
pub fn verify_vote(room: &RoomData, nickname: &str) -> RoomResult<VerificationView> {
    let not_voted = |message: &str| VerificationView {
        nickname: nickname.to_string(),
        has_voted: false,
        rankings: None,
        voted_at: None,
        message: message.to_string(),
    };

    let voter_key = room
        .voters
        .entries()
        .into_iter()
        .find(|(_, v)| v.nickname == nickname)
        .map(|(key, _)| key);
    let voter_key = match voter_key {
        Some(k) => k,
        None => return Ok(not_voted(MSG_UNKNOWN_NICKNAME)),
    };
    let vote = match room.votes.get(&voter_key) {
        Some(v) => v,
        None => return Ok(not_voted(MSG_NOT_VOTED)),
    };
    debug!("verify_vote: {} has voted as {}", nickname, voter_key);

    let names: BTreeMap<u32, String> = room
        .candidate_views()?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();
    let rankings: BTreeMap<u32, RankedCandidate> = vote
        .ranks()?
        .into_iter()
        .map(|(rank, cid)| {
            let candidate_name = names
                .get(&cid.0)
                .cloned()
                .unwrap_or_else(|| format!("Candidate {}", cid));
            (
                rank,
                RankedCandidate {
                    candidate_id: cid.0,
                    candidate_name,
                },
            )
        })
        .collect();

    Ok(VerificationView {
        nickname: nickname.to_string(),
        has_voted: true,
        rankings: Some(rankings),
        voted_at: format_timestamp(vote.voted_at),
        message: MSG_RECORDED.to_string(),
    })
}

/// Milliseconds since the epoch, in RFC 3339 format.
fn format_timestamp(ms: i64) -> Option<String> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}
