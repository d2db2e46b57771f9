pub mod builder;
mod config;
pub mod manual;

use log::{debug, info};

use std::{
    collections::{BTreeMap, BTreeSet},
    ops::AddAssign,
};

pub use crate::builder::Tabulator;
pub use crate::config::*;

// **** Private structures ****

type RoundId = u32;

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
struct VoteCount(u64);

impl VoteCount {
    const EMPTY: VoteCount = VoteCount(0);
    const ONE: VoteCount = VoteCount(1);
}

impl std::iter::Sum for VoteCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        VoteCount(iter.map(|vc| vc.0).sum())
    }
}

impl AddAssign for VoteCount {
    fn add_assign(&mut self, rhs: VoteCount) {
        self.0 += rhs.0;
    }
}

type Tally = BTreeMap<CandidateId, VoteCount>;

/// The state of a single run. It is created fresh by every call to `run_election`.
struct RunState {
    eliminated: BTreeSet<CandidateId>,
    rounds: Vec<Round>,
}

impl Tabulator {
    /// Runs the instant-runoff algorithm on the ballots added so far.
    ///
    /// Every round counts the current choice of each ballot. A candidate with a strict
    /// majority of the counted ballots wins. Otherwise, with two candidates or fewer left,
    /// the candidate with the most votes wins. Otherwise the candidate with the fewest
    /// votes is eliminated and its ballots move to their next choice.
    ///
    /// All the ties are resolved in favor of the smallest candidate id.
    ///
    /// If no ballot names a running candidate, the result has no round and no winner.
    pub fn run_election(&self) -> ElectionResult {
        info!(
            "run_election: Processing {} ballots, candidates: {:?}",
            self._ballots.len(),
            self._candidates
        );
        let mut state = RunState {
            eliminated: BTreeSet::new(),
            rounds: Vec::new(),
        };

        let mut round_id: RoundId = 1;
        loop {
            let tally = compute_tally(&self._ballots, &self._candidates, &state.eliminated);
            let total: VoteCount = tally.values().cloned().sum();
            if total == VoteCount::EMPTY {
                debug!("run_election: no valid ballot left in round {}", round_id);
                break;
            }
            let threshold = get_threshold(total);
            info!("Round {} (winning threshold: {})", round_id, threshold.0);
            for (cid, count) in tally.iter() {
                info!("      {} {}", count.0, cid);
            }

            if let Some(winner) = find_majority_winner(&tally, threshold) {
                info!("Round {}: {} elected with a majority", round_id, winner);
                state
                    .rounds
                    .push(make_round(round_id, &tally, None, Some(winner), total, threshold));
                break;
            }

            if tally.len() <= 2 {
                // tally only holds the running candidates.
                let winner = find_leader(&tally);
                info!(
                    "Round {}: two candidates left, {:?} elected",
                    round_id, winner
                );
                state
                    .rounds
                    .push(make_round(round_id, &tally, None, winner, total, threshold));
                break;
            }

            let loser = match find_eliminated_candidate(&tally) {
                Some(cid) => cid,
                None => break,
            };
            let transfers = compute_transfers(&self._ballots, &state.eliminated, loser);
            info!(
                "Round {}: {} eliminated, transfers: {:?}",
                round_id, loser, transfers
            );
            let stats = EliminationStats {
                candidate: loser,
                transfers: transfers.iter().map(|(t, vc)| (*t, vc.0)).collect(),
            };
            state.rounds.push(make_round(
                round_id,
                &tally,
                Some(stats),
                None,
                total,
                threshold,
            ));
            state.eliminated.insert(loser);

            let remaining: Vec<CandidateId> = self
                ._candidates
                .iter()
                .filter(|cid| !state.eliminated.contains(*cid))
                .cloned()
                .collect();
            if let [last] = remaining.as_slice() {
                // Safety net: the two-left rule stops the loop before an elimination
                // can leave a single candidate.
                debug!(
                    "run_election: only {} is left after round {}",
                    last, round_id
                );
                let last_tally: Tally = [(*last, total)].into_iter().collect();
                state.rounds.push(make_round(
                    round_id + 1,
                    &last_tally,
                    None,
                    Some(*last),
                    total,
                    threshold,
                ));
                break;
            }
            round_id += 1;
        }

        let winner = match state.rounds.last() {
            Some(r) if r.is_final => r.winner,
            _ => None,
        };
        info!("run_election: winner: {:?}", winner);
        ElectionResult {
            rounds: state.rounds,
            winner,
            ballots: self._ballots.clone(),
        }
    }
}

fn make_round(
    round_id: RoundId,
    tally: &Tally,
    eliminated: Option<EliminationStats>,
    winner: Option<CandidateId>,
    total: VoteCount,
    threshold: VoteCount,
) -> Round {
    Round {
        round: round_id,
        tally: tally.iter().map(|(cid, vc)| (*cid, vc.0)).collect(),
        eliminated,
        is_final: winner.is_some(),
        winner,
        total_votes: total.0,
        threshold: threshold.0,
    }
}

/// The most preferred candidate of the ballot that is not eliminated.
/// None if the ballot is exhausted.
fn current_choice(ballot: &Ballot, eliminated: &BTreeSet<CandidateId>) -> Option<CandidateId> {
    ballot
        .rankings
        .iter()
        .find(|cid| !eliminated.contains(*cid))
        .cloned()
}

fn compute_tally(
    ballots: &[Ballot],
    candidates: &BTreeSet<CandidateId>,
    eliminated: &BTreeSet<CandidateId>,
) -> Tally {
    // Initialize the tally with the running candidates to capture the candidates who do
    // not even have a vote.
    let mut tally: Tally = candidates
        .iter()
        .filter(|cid| !eliminated.contains(*cid))
        .map(|cid| (*cid, VoteCount::EMPTY))
        .collect();
    for b in ballots.iter() {
        if let Some(cid) = current_choice(b, eliminated) {
            if let Some(vc) = tally.get_mut(&cid) {
                *vc += VoteCount::ONE;
            }
        }
    }
    debug!("compute_tally: {:?}", tally);
    tally
}

fn get_threshold(total: VoteCount) -> VoteCount {
    VoteCount((total.0 / 2) + 1)
}

fn find_majority_winner(tally: &Tally, threshold: VoteCount) -> Option<CandidateId> {
    tally
        .iter()
        .find(|(_, vc)| **vc >= threshold)
        .map(|(cid, _)| *cid)
}

/// The candidate with the most votes, the smallest id in case of tie.
fn find_leader(tally: &Tally) -> Option<CandidateId> {
    let mut leader: Option<(CandidateId, VoteCount)> = None;
    // The tally is sorted by id: only a strictly greater count replaces the leader.
    for (cid, vc) in tally.iter() {
        match leader {
            Some((_, best)) if *vc <= best => {}
            _ => leader = Some((*cid, *vc)),
        }
    }
    leader.map(|(cid, _)| cid)
}

/// The candidate with the fewest votes, the smallest id in case of tie.
fn find_eliminated_candidate(tally: &Tally) -> Option<CandidateId> {
    let min_count: VoteCount = *tally.values().min()?;
    let all_smallest: Vec<CandidateId> = tally
        .iter()
        .filter_map(|(cid, vc)| if *vc == min_count { Some(*cid) } else { None })
        .collect();
    if all_smallest.len() > 1 {
        debug!(
            "find_eliminated_candidate: tiebreak between {:?} at {} votes",
            all_smallest, min_count.0
        );
    }
    all_smallest.first().cloned()
}

/// Where the ballots currently counted for `loser` go once it is eliminated.
fn compute_transfers(
    ballots: &[Ballot],
    eliminated: &BTreeSet<CandidateId>,
    loser: CandidateId,
) -> BTreeMap<TransferTarget, VoteCount> {
    let mut after: BTreeSet<CandidateId> = eliminated.clone();
    after.insert(loser);

    let mut transfers: BTreeMap<TransferTarget, VoteCount> = BTreeMap::new();
    for b in ballots.iter() {
        if current_choice(b, eliminated) != Some(loser) {
            continue;
        }
        let target = match current_choice(b, &after) {
            Some(next) => TransferTarget::Candidate(next),
            None => TransferTarget::Exhausted,
        };
        *transfers.entry(target).or_insert(VoteCount::EMPTY) += VoteCount::ONE;
    }
    transfers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cids(ids: &[u32]) -> Vec<CandidateId> {
        ids.iter().map(|i| CandidateId(*i)).collect()
    }

    fn tally_of(pairs: &[(u32, u64)]) -> BTreeMap<CandidateId, u64> {
        pairs.iter().map(|(c, n)| (CandidateId(*c), *n)).collect()
    }

    fn tabulator(candidates: &[u32], ballots: &[(usize, &[u32])]) -> Tabulator {
        let mut t = Tabulator::new(&cids(candidates));
        let mut idx = 0;
        for (count, rankings) in ballots.iter() {
            for _ in 0..*count {
                idx += 1;
                t.add_ballot(&format!("v{}", idx), &format!("voter {}", idx), &cids(rankings));
            }
        }
        t
    }

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn clear_majority() {
        init_logs();
        let t = tabulator(&[1, 2, 3], &[(6, &[1]), (2, &[2]), (2, &[3])]);
        let res = t.run_election();
        assert_eq!(res.rounds.len(), 1);
        let r = &res.rounds[0];
        assert_eq!(r.round, 1);
        assert_eq!(r.tally, tally_of(&[(1, 6), (2, 2), (3, 2)]));
        assert_eq!(r.total_votes, 10);
        assert_eq!(r.threshold, 6);
        assert!(r.is_final);
        assert_eq!(r.winner, Some(CandidateId(1)));
        assert_eq!(r.eliminated, None);
        assert_eq!(res.winner, Some(CandidateId(1)));
        assert_eq!(res.ballots.len(), 10);
    }

    #[test]
    fn one_elimination_then_majority() {
        init_logs();
        let t = tabulator(&[1, 2, 3], &[(4, &[1, 2]), (3, &[2, 1]), (3, &[3, 1])]);
        let res = t.run_election();
        assert_eq!(res.rounds.len(), 2);

        let r1 = &res.rounds[0];
        assert_eq!(r1.tally, tally_of(&[(1, 4), (2, 3), (3, 3)]));
        assert_eq!(r1.threshold, 6);
        assert!(!r1.is_final);
        assert_eq!(r1.winner, None);
        let elim = r1.eliminated.clone().unwrap();
        assert_eq!(elim.candidate, CandidateId(2));
        let expected: BTreeMap<TransferTarget, u64> =
            [(TransferTarget::Candidate(CandidateId(1)), 3)]
                .into_iter()
                .collect();
        assert_eq!(elim.transfers, expected);
        assert_eq!(elim.exhausted(), 0);

        let r2 = &res.rounds[1];
        assert_eq!(r2.round, 2);
        assert_eq!(r2.tally, tally_of(&[(1, 7), (3, 3)]));
        assert_eq!(r2.total_votes, 10);
        assert_eq!(r2.threshold, 6);
        assert!(r2.is_final);
        assert_eq!(res.winner, Some(CandidateId(1)));
    }

    #[test]
    fn exhausted_ballot_and_final_tie() {
        init_logs();
        let t = tabulator(&[1, 2], &[(1, &[1]), (1, &[2]), (1, &[])]);
        let res = t.run_election();
        assert_eq!(res.rounds.len(), 1);
        let r = &res.rounds[0];
        assert_eq!(r.tally, tally_of(&[(1, 1), (2, 1)]));
        assert_eq!(r.total_votes, 2);
        assert_eq!(r.threshold, 2);
        assert!(r.is_final);
        assert_eq!(res.winner, Some(CandidateId(1)));
        assert_eq!(res.ballots.len(), 3);
    }

    #[test]
    fn no_ballots() {
        let t = tabulator(&[1, 2, 3], &[]);
        let res = t.run_election();
        assert!(res.rounds.is_empty());
        assert_eq!(res.winner, None);
    }

    #[test]
    fn only_unknown_candidates() {
        let t = tabulator(&[1, 2], &[(3, &[5, 6])]);
        let res = t.run_election();
        assert!(res.rounds.is_empty());
        assert_eq!(res.winner, None);
        assert_eq!(res.ballots.len(), 3);
    }

    #[test]
    fn no_candidates() {
        let t = tabulator(&[], &[(2, &[1])]);
        let res = t.run_election();
        assert!(res.rounds.is_empty());
        assert_eq!(res.winner, None);
    }

    #[test]
    fn single_candidate() {
        let t = tabulator(&[4], &[(2, &[4]), (1, &[])]);
        let res = t.run_election();
        assert_eq!(res.rounds.len(), 1);
        assert_eq!(res.rounds[0].tally, tally_of(&[(4, 2)]));
        assert_eq!(res.winner, Some(CandidateId(4)));
    }

    #[test]
    fn candidates_without_votes_are_eliminated_first() {
        init_logs();
        // 3 and 4 have no vote: 3 goes first (smaller id), then 4.
        let t = tabulator(&[1, 2, 3, 4], &[(2, &[1]), (3, &[2]), (1, &[1, 2])]);
        let res = t.run_election();
        assert_eq!(res.rounds.len(), 3);
        let r1 = &res.rounds[0];
        assert_eq!(r1.tally, tally_of(&[(1, 3), (2, 3), (3, 0), (4, 0)]));
        let e1 = r1.eliminated.clone().unwrap();
        assert_eq!(e1.candidate, CandidateId(3));
        assert!(e1.transfers.is_empty());
        let r2 = &res.rounds[1];
        assert_eq!(r2.tally, tally_of(&[(1, 3), (2, 3), (4, 0)]));
        assert_eq!(r2.eliminated.clone().unwrap().candidate, CandidateId(4));
        // Two candidates left and tied: the smallest id wins.
        let r3 = &res.rounds[2];
        assert_eq!(r3.tally, tally_of(&[(1, 3), (2, 3)]));
        assert_eq!(r3.threshold, 4);
        assert!(r3.is_final);
        assert_eq!(r3.winner, Some(CandidateId(1)));
    }

    #[test]
    fn transfers_record_exhausted_ballots() {
        init_logs();
        let t = tabulator(
            &[1, 2, 3],
            &[(4, &[1]), (3, &[2]), (1, &[3, 2]), (1, &[3]), (1, &[3, 3])],
        );
        let res = t.run_election();
        let r1 = &res.rounds[0];
        assert_eq!(r1.tally, tally_of(&[(1, 4), (2, 3), (3, 3)]));
        let elim = r1.eliminated.clone().unwrap();
        // Tie between 2 and 3, 2 has the smaller id.
        assert_eq!(elim.candidate, CandidateId(2));
        assert_eq!(elim.total(), 3);
        assert_eq!(elim.exhausted(), 3);

        let r2 = &res.rounds[1];
        assert_eq!(r2.tally, tally_of(&[(1, 4), (3, 3)]));
        assert_eq!(r2.total_votes, 7);
        assert_eq!(r2.threshold, 4);
        assert_eq!(r2.winner, Some(CandidateId(1)));
    }

    #[test]
    fn duplicates_only_count_once() {
        // The second mention of 3 is unreachable once 3 is eliminated.
        let t = tabulator(&[1, 2, 3], &[(3, &[1]), (2, &[2]), (1, &[3, 3, 2])]);
        let res = t.run_election();
        let elim = res.rounds[0].eliminated.clone().unwrap();
        assert_eq!(elim.candidate, CandidateId(3));
        let expected: BTreeMap<TransferTarget, u64> =
            [(TransferTarget::Candidate(CandidateId(2)), 1)]
                .into_iter()
                .collect();
        assert_eq!(elim.transfers, expected);
        assert_eq!(res.rounds[1].tally, tally_of(&[(1, 3), (2, 3)]));
        // Tie in the final two: smallest id.
        assert_eq!(res.winner, Some(CandidateId(1)));
    }

    #[test]
    fn running_twice_gives_the_same_result() {
        let t = tabulator(&[1, 2, 3], &[(4, &[1, 2]), (3, &[2, 1]), (3, &[3, 1])]);
        assert_eq!(t.run_election(), t.run_election());
    }

    #[test]
    fn find_leader_prefers_smallest_id() {
        let tally: Tally = [
            (CandidateId(5), VoteCount(3)),
            (CandidateId(2), VoteCount(3)),
            (CandidateId(9), VoteCount(1)),
        ]
        .into_iter()
        .collect();
        assert_eq!(find_leader(&tally), Some(CandidateId(2)));
        assert_eq!(find_eliminated_candidate(&tally), Some(CandidateId(9)));
        assert_eq!(find_leader(&Tally::new()), None);
    }

    #[test]
    fn threshold_is_strict_majority() {
        assert_eq!(get_threshold(VoteCount(10)), VoteCount(6));
        assert_eq!(get_threshold(VoteCount(7)), VoteCount(4));
        assert_eq!(get_threshold(VoteCount(1)), VoteCount(1));
    }

    mod properties {
        use super::*;
        use quickcheck::{Arbitrary, Gen};
        use quickcheck_macros::quickcheck;

        #[derive(Clone, Debug)]
        struct SmallElection {
            candidates: Vec<CandidateId>,
            ballots: Vec<Vec<CandidateId>>,
        }

        impl Arbitrary for SmallElection {
            fn arbitrary(g: &mut Gen) -> Self {
                // Keep the elections small: a handful of candidates, a class of voters.
                let num_candidates = (u32::arbitrary(g) % 6) + 1;
                let num_ballots = usize::arbitrary(g) % 40;
                // Ids are not contiguous, and some of the ballot entries are unknown ids.
                let candidates: Vec<CandidateId> =
                    (1..=num_candidates).map(|i| CandidateId(i * 3)).collect();
                let ballots = (0..num_ballots)
                    .map(|_| {
                        let len = usize::arbitrary(g) % (num_candidates as usize + 2);
                        (0..len)
                            .map(|_| CandidateId(u32::arbitrary(g) % (num_candidates * 3 + 2)))
                            .collect()
                    })
                    .collect();
                SmallElection {
                    candidates,
                    ballots,
                }
            }
        }

        impl SmallElection {
            fn tabulator(&self) -> Tabulator {
                let mut t = Tabulator::new(&self.candidates);
                for (idx, b) in self.ballots.iter().enumerate() {
                    t.add_ballot(&format!("v{}", idx), "voter", b);
                }
                t
            }
        }

        #[quickcheck]
        fn majority_short_circuit(e: SmallElection) -> bool {
            let t = e.tabulator();
            let res = t.run_election();
            let first: Tally = compute_tally(t.ballots(), t.candidates(), &BTreeSet::new());
            let total: u64 = first.values().map(|vc| vc.0).sum();
            match first.iter().find(|(_, vc)| vc.0 * 2 > total) {
                Some((cid, _)) => {
                    let r = &res.rounds[0];
                    r.is_final && r.winner == Some(*cid) && r.threshold == total / 2 + 1
                }
                None => true,
            }
        }

        #[quickcheck]
        fn conservation(e: SmallElection) -> bool {
            let t = e.tabulator();
            let res = t.run_election();
            let mut eliminated: BTreeSet<CandidateId> = BTreeSet::new();
            for r in res.rounds.iter() {
                let counted = t
                    .ballots()
                    .iter()
                    .filter(|b| current_choice(b, &eliminated).is_some())
                    .count() as u64;
                let sum: u64 = r.tally.values().sum();
                if sum != counted || sum != r.total_votes || sum > t.ballots().len() as u64 {
                    return false;
                }
                if let Some(elim) = &r.eliminated {
                    eliminated.insert(elim.candidate);
                }
            }
            true
        }

        #[quickcheck]
        fn monotonic_elimination(e: SmallElection) -> bool {
            let res = e.tabulator().run_election();
            let mut eliminated: BTreeSet<CandidateId> = BTreeSet::new();
            for r in res.rounds.iter() {
                if r.tally.keys().any(|cid| eliminated.contains(cid)) {
                    return false;
                }
                if let Some(elim) = &r.eliminated {
                    if !eliminated.insert(elim.candidate) {
                        return false;
                    }
                }
            }
            true
        }

        #[quickcheck]
        fn transfers_add_up(e: SmallElection) -> bool {
            let res = e.tabulator().run_election();
            res.rounds.iter().all(|r| match &r.eliminated {
                Some(elim) => r.tally.get(&elim.candidate) == Some(&elim.total()),
                None => true,
            })
        }

        #[quickcheck]
        fn terminates_with_a_final_round(e: SmallElection) -> bool {
            let res = e.tabulator().run_election();
            if res.rounds.len() > e.candidates.len() {
                return false;
            }
            let numbered = res
                .rounds
                .iter()
                .enumerate()
                .all(|(idx, r)| r.round == idx as u32 + 1);
            let only_last_final = res
                .rounds
                .iter()
                .rev()
                .skip(1)
                .all(|r| !r.is_final && r.eliminated.is_some());
            match res.rounds.last() {
                Some(last) => {
                    numbered && only_last_final && last.is_final && res.winner == last.winner
                }
                None => res.winner.is_none(),
            }
        }

        #[quickcheck]
        fn deterministic(e: SmallElection) -> bool {
            e.tabulator().run_election() == e.tabulator().run_election()
        }

        #[quickcheck]
        fn insertion_order_does_not_matter(e: SmallElection) -> bool {
            let mut reversed = e.clone();
            reversed.ballots.reverse();
            let a = e.tabulator().run_election();
            let b = reversed.tabulator().run_election();
            a.rounds == b.rounds && a.winner == b.winner
        }
    }
}
