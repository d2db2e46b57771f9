use std::collections::BTreeMap;

use irv_tally::{CandidateId, ElectionResult, Round, TabulationRules, Tabulator};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::room::io_snapshot::*;
use crate::room::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RoundView {
    pub round_number: u32,
    /// candidate id -> count
    pub vote_counts: BTreeMap<String, u64>,
    pub eliminated_candidate_id: Option<u32>,
    pub eliminated_candidate_name: Option<String>,
    /// eliminated candidate id -> (candidate id or "exhausted") -> count
    pub vote_transfers: Option<BTreeMap<String, BTreeMap<String, u64>>>,
    pub is_final: bool,
    pub winner_id: Option<u32>,
    pub winner_name: Option<String>,
    pub total_votes: u64,
    pub threshold: u64,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct BallotDetailRanking {
    pub name: String,
    pub image_url: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct BallotDetail {
    pub voter_nickname: String,
    pub rankings: Vec<BallotDetailRanking>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ResultsView {
    pub room_code: String,
    pub room_title: String,
    pub total_voters: usize,
    pub total_votes: usize,
    pub rounds: Vec<RoundView>,
    pub winner_id: Option<u32>,
    pub winner_name: Option<String>,
    pub ballot_details: Vec<BallotDetail>,
    pub candidates: Vec<CandidateView>,
}

/// The results are public once the voting is closed. Before that, only the holder of the
/// admin key can see them.
pub fn check_access(code: &RoomCode, info: &RoomInfo, admin_token: Option<&str>) -> RoomResult<()> {
    if info.status == RoomStatus::Closed {
        return Ok(());
    }
    match admin_token {
        Some(token) if token == info.admin_key => {
            debug!("check_access: room {} is {}, admin access", code, info.status);
            Ok(())
        }
        _ => VotingNotClosedSnafu {
            code: code.to_string(),
        }
        .fail(),
    }
}

/// Loads the ballots of the room into a tabulator.
///
/// Ranking entries that cannot be read are dropped, the rest of the ballot is kept.
pub fn make_tabulator(room: &RoomData, candidates: &[CandidateView]) -> Tabulator {
    let ids: Vec<CandidateId> = candidates.iter().map(|c| CandidateId(c.id)).collect();
    let rules = TabulationRules {
        max_rankings: room.info.max_rank.filter(|m| *m > 0),
    };
    let mut tabulator = Tabulator::with_rules(&ids, &rules);
    for (key, voter, vote) in room.votes_with_voters() {
        let voter = match voter {
            Some(v) => v,
            None => {
                warn!("make_tabulator: vote {} has no registered voter, skipping", key);
                continue;
            }
        };
        let ranks = vote.readable_ranks();
        debug!("make_tabulator: ballot of {}: {:?}", voter.nickname, ranks);
        tabulator.add_ranked_ballot(&voter.session_id, &voter.nickname, &ranks);
    }
    tabulator
}

pub fn build_results(
    code: &RoomCode,
    room: &RoomData,
    admin_token: Option<&str>,
) -> RoomResult<ResultsView> {
    check_access(code, &room.info, admin_token)?;

    let candidates = room.candidate_views()?;
    let tabulator = make_tabulator(room, &candidates);
    info!(
        "build_results: room {}: {} candidates, {} ballots",
        code,
        candidates.len(),
        tabulator.ballots().len()
    );
    let result = tabulator.run_election();

    Ok(result_to_view(code, room, &result, candidates))
}

fn result_to_view(
    code: &RoomCode,
    room: &RoomData,
    result: &ElectionResult,
    candidates: Vec<CandidateView>,
) -> ResultsView {
    let candidates_by_id: BTreeMap<CandidateId, &CandidateView> = candidates
        .iter()
        .map(|c| (CandidateId(c.id), c))
        .collect();
    let name_of =
        |cid: Option<CandidateId>| cid.and_then(|c| candidates_by_id.get(&c).map(|cv| cv.name.clone()));

    let rounds: Vec<RoundView> = result
        .rounds
        .iter()
        .map(|r| round_to_view(r, &name_of))
        .collect();

    let ballot_details: Vec<BallotDetail> = result
        .ballots
        .iter()
        .map(|b| BallotDetail {
            voter_nickname: b.label.clone(),
            rankings: b
                .rankings
                .iter()
                .map(|cid| match candidates_by_id.get(cid) {
                    Some(cv) => BallotDetailRanking {
                        name: cv.name.clone(),
                        image_url: cv.image_url.clone(),
                    },
                    None => BallotDetailRanking {
                        name: format!("Candidate {}", cid),
                        image_url: None,
                    },
                })
                .collect(),
        })
        .collect();

    let winner_name = name_of(result.winner);
    ResultsView {
        room_code: code.to_string(),
        room_title: room.info.title.clone(),
        total_voters: room.voters.len(),
        total_votes: room.votes.len(),
        rounds,
        winner_id: result.winner.map(|c| c.0),
        winner_name,
        ballot_details,
        candidates,
    }
}

fn round_to_view<F>(r: &Round, name_of: &F) -> RoundView
where
    F: Fn(Option<CandidateId>) -> Option<String>,
{
    let eliminated = r.eliminated.as_ref().map(|e| e.candidate);
    let vote_transfers: Option<BTreeMap<String, BTreeMap<String, u64>>> =
        r.eliminated.as_ref().map(|e| {
            let transfers: BTreeMap<String, u64> = e
                .transfers
                .iter()
                .map(|(target, count)| (target.to_string(), *count))
                .collect();
            [(e.candidate.to_string(), transfers)].into_iter().collect()
        });
    RoundView {
        round_number: r.round,
        vote_counts: r
            .tally
            .iter()
            .map(|(cid, count)| (cid.to_string(), *count))
            .collect(),
        eliminated_candidate_id: eliminated.map(|c| c.0),
        eliminated_candidate_name: name_of(eliminated),
        vote_transfers,
        is_final: r.is_final,
        winner_id: r.winner.map(|c| c.0),
        winner_name: name_of(r.winner),
        total_votes: r.total_votes,
        threshold: r.threshold,
    }
}
