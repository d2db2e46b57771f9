// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::fmt::Display;

/// The identifier of a candidate in an election.
///
/// Identifiers are totally ordered: ties in the tabulation are always broken
/// in favor of the smallest identifier.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct CandidateId(pub u32);

impl From<u32> for CandidateId {
    fn from(id: u32) -> Self {
        CandidateId(id)
    }
}

impl Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ballot, after the unknown candidates have been removed.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Ballot {
    pub voter_id: String,
    /// The display name of the voter (a nickname).
    pub label: String,
    /// The candidates in order of preference. The first one is the most preferred.
    pub rankings: Vec<CandidateId>,
}

// ******** Output data structures *********

/// Where the votes of an eliminated candidate went.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum TransferTarget {
    /// The next preference on the ballot.
    Candidate(CandidateId),
    /// No preference left on the ballot.
    Exhausted,
}

impl Display for TransferTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferTarget::Candidate(cid) => write!(f, "{}", cid),
            TransferTarget::Exhausted => write!(f, "exhausted"),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct EliminationStats {
    pub candidate: CandidateId,
    pub transfers: BTreeMap<TransferTarget, u64>,
}

impl EliminationStats {
    /// The number of ballots that had no further preference.
    pub fn exhausted(&self) -> u64 {
        self.transfers
            .get(&TransferTarget::Exhausted)
            .cloned()
            .unwrap_or(0)
    }

    /// All the ballots moved by this elimination, exhausted ones included.
    pub fn total(&self) -> u64 {
        self.transfers.values().sum()
    }
}

/// Statistics for one round
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Round {
    /// Starts at 1.
    pub round: u32,
    /// The count for every candidate still running in this round.
    pub tally: BTreeMap<CandidateId, u64>,
    pub eliminated: Option<EliminationStats>,
    pub is_final: bool,
    pub winner: Option<CandidateId>,
    /// The number of ballots that were not exhausted in this round.
    pub total_votes: u64,
    pub threshold: u64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ElectionResult {
    pub rounds: Vec<Round>,
    pub winner: Option<CandidateId>,
    pub ballots: Vec<Ballot>,
}

// ********* Configuration **********

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TabulationRules {
    /// If set, only the first preferences of each ballot are considered.
    pub max_rankings: Option<u32>,
}

impl TabulationRules {
    pub const DEFAULT_RULES: TabulationRules = TabulationRules { max_rankings: None };
}

impl Default for TabulationRules {
    fn default() -> Self {
        TabulationRules::DEFAULT_RULES
    }
}
