/*!

This is the long-form manual for `irv_tally` and `roomvote`.

## Tabulation rules

The election is decided by instant-runoff voting. Every round:

1. Each ballot counts for its most preferred candidate that is still running. A ballot
   whose candidates have all been eliminated is *exhausted*: it stays in the list of
   ballots but counts for nobody.
2. The winning threshold is `floor(total / 2) + 1`, where `total` is the number of ballots
   counted in this round (exhausted ballots are not part of the total).
3. A candidate reaching the threshold is elected.
4. Otherwise, if two candidates or fewer are still running, the one with the most votes
   is elected.
5. Otherwise the candidate with the fewest votes is eliminated. Its ballots move to their
   next running choice, or are exhausted.

Ties, both for the elimination and between the last two candidates, are resolved in favor
of the candidate with the smallest id. There is no randomness: the same ballots always
produce the same rounds, whatever the order in which they were added.

Candidates that are not part of the election are removed from the ballots when the
ballots are added. A ballot that names no valid candidate is kept (it shows up in the
audit list of ballots) but is exhausted from the first round.

When no ballot names a valid candidate, the election has no round and no winner.

## Room snapshots

`roomvote` works on a JSON export of the voting rooms:

```text
{
  "rooms": {
    "K7PQ2M": {
      "info": {
        "title": "Class president",
        "description": null,
        "status": "closed",
        "adminKey": "4d1c9a2e-...",
        "createdAt": 1760000000000,
        "maxRank": 3
      },
      "candidates": {
        "1": {"id": 1, "name": "Alice", "description": null, "image_url": null, "display_order": 0},
        "2": {"id": 2, "name": "Bob", "description": null, "image_url": null, "display_order": 1}
      },
      "voters": {
        "-Nv1": {"oderId": "session-1", "nickname": "Brave Otter", "hasVoted": true, "joinedAt": 1760000100000}
      },
      "votes": {
        "-Nv1": {"rankings": {"1": 2, "2": 1}, "votedAt": 1760000200000}
      }
    }
  }
}
```

Notes:
- the votes are keyed by the same key as the voter who cast them. A vote without a voter
  is ignored.
- `rankings` maps the rank (1 is the first choice) to a candidate id.
- collections keyed by consecutive integers (`candidates`, `rankings`) may also be exported
  as arrays, with `null` for the missing keys. Both forms are accepted.
- candidate ids may be written as numbers or as strings. In a vote, a ranking entry whose
  rank or candidate id cannot be read is dropped with a warning, and the rest of the
  ballot still counts. An unreadable id in the list of candidates is an error.
- `maxRank` limits the number of ranks taken into account.

## Commands

```bash
# Results of a closed room
roomvote -i rooms.json --room K7PQ2M results

# Results before the room is closed
roomvote -i rooms.json --room K7PQ2M results --admin-token 4d1c9a2e-...

# Write the results to a file and compare with a reference
roomvote -i rooms.json --room K7PQ2M results --out results.json --reference expected.json

# Room status and vote verification
roomvote -i rooms.json --room K7PQ2M status
roomvote -i rooms.json --room K7PQ2M verify --nickname "Brave Otter"
```

Room codes are six letters or digits. They are not case sensitive.

Logging is controlled with `RUST_LOG`, or with `--verbose` for the full debug output.

 */
