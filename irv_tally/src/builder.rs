use log::debug;
use std::collections::{BTreeMap, BTreeSet};

pub use crate::config::*;

/// Collects the ballots of an election before running it.
///
/// ```
/// use irv_tally::{CandidateId, Tabulator};
///
/// let mut tabulator = Tabulator::new(&[CandidateId(1), CandidateId(2)]);
///
/// // Candidate 7 is not running, it is silently dropped.
/// tabulator.add_ballot("session-1", "Brave Otter", &[CandidateId(7), CandidateId(2)]);
/// tabulator.add_ballot("session-2", "Quiet Heron", &[CandidateId(1)]);
///
/// assert_eq!(tabulator.ballots()[0].rankings, vec![CandidateId(2)]);
/// ```
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Tabulator {
    pub(crate) _rules: TabulationRules,
    pub(crate) _candidates: BTreeSet<CandidateId>,
    pub(crate) _ballots: Vec<Ballot>,
}

impl Tabulator {
    pub fn new(candidates: &[CandidateId]) -> Tabulator {
        Tabulator::with_rules(candidates, &TabulationRules::DEFAULT_RULES)
    }

    pub fn with_rules(candidates: &[CandidateId], rules: &TabulationRules) -> Tabulator {
        Tabulator {
            _rules: rules.clone(),
            _candidates: candidates.iter().cloned().collect(),
            _ballots: Vec::new(),
        }
    }

    pub fn candidates(&self) -> &BTreeSet<CandidateId> {
        &self._candidates
    }

    pub fn ballots(&self) -> &[Ballot] {
        &self._ballots
    }

    /// Adds a ballot.
    ///
    /// rankings: the choices of the voter, most preferred first. The candidates
    /// that are not part of this election are dropped, the order of the others is kept.
    pub fn add_ballot(&mut self, voter_id: &str, label: &str, rankings: &[CandidateId]) {
        let considered = match self._rules.max_rankings {
            Some(max) => &rankings[..rankings.len().min(max as usize)],
            None => rankings,
        };
        let valid: Vec<CandidateId> = considered
            .iter()
            .filter(|cid| self._candidates.contains(*cid))
            .cloned()
            .collect();
        if valid.len() != rankings.len() {
            debug!(
                "add_ballot: voter {}: kept {:?} out of {:?}",
                voter_id, valid, rankings
            );
        }
        self._ballots.push(Ballot {
            voter_id: voter_id.to_string(),
            label: label.to_string(),
            rankings: valid,
        });
    }

    /// Adds ballots in bulk. The rankings go through the same filtering as `add_ballot`.
    pub fn add_ballots<I: IntoIterator<Item = Ballot>>(&mut self, ballots: I) {
        for b in ballots {
            self.add_ballot(&b.voter_id, &b.label, &b.rankings);
        }
    }

    /// Adds a ballot stored as a mapping from rank (1 = first choice) to candidate.
    ///
    /// Ranks do not need to be contiguous. Ranks above the maximum number of rankings
    /// allowed by the rules are ignored.
    pub fn add_ranked_ballot(
        &mut self,
        voter_id: &str,
        label: &str,
        ranks: &BTreeMap<u32, CandidateId>,
    ) {
        let rankings: Vec<CandidateId> = ranks
            .iter()
            .filter(|(rank, _)| match self._rules.max_rankings {
                Some(max) => **rank <= max,
                None => true,
            })
            .map(|(_, cid)| *cid)
            .collect();
        self.add_ballot(voter_id, label, &rankings);
    }
}
