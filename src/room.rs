use log::{debug, info, warn};

use snafu::{prelude::*, ErrorCompat, Snafu};

use std::fmt::Display;
use std::fs;

use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::{Args, Command};
use crate::room::io_snapshot::*;

pub mod io_snapshot;
pub mod results;
pub mod verify;

#[derive(Debug, Snafu)]
pub enum RoomError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON content"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Invalid room code {code:?}: expected 6 letters or digits"))]
    InvalidRoomCode { code: String },
    #[snafu(display("Room {code} not found"))]
    RoomNotFound { code: String },
    #[snafu(display("The voting in room {code} is not closed yet"))]
    VotingNotClosed { code: String },
    #[snafu(display("Could not read a candidate id from {content}"))]
    InvalidCandidateId { content: String },
    #[snafu(display("Could not read a rank from {key:?}"))]
    InvalidRank { key: String },
    #[snafu(display("Difference detected between the results and the reference {path}"))]
    ReferenceMismatch { path: String },
}

pub type RoomResult<T> = Result<T, RoomError>;

/// The code that identifies a voting room: 6 letters or digits, in upper case.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct RoomCode(String);

impl RoomCode {
    pub const LENGTH: usize = 6;

    pub fn parse(s: &str) -> RoomResult<RoomCode> {
        let code = s.trim().to_ascii_uppercase();
        ensure!(
            code.len() == RoomCode::LENGTH && code.chars().all(|c| c.is_ascii_alphanumeric()),
            InvalidRoomCodeSnafu { code: s }
        );
        Ok(RoomCode(code))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read access to the stored rooms.
pub trait RoomStore {
    fn room(&self, code: &RoomCode) -> RoomResult<RoomData>;
}

pub fn run_command(args: &Args) -> RoomResult<()> {
    let store = SnapshotStore::from_path(&args.input)?;
    let code = RoomCode::parse(&args.room)?;
    match &args.command {
        Command::Results {
            admin_token,
            out,
            reference,
        } => run_results(
            &store,
            &code,
            admin_token.as_deref(),
            out.as_deref(),
            reference.as_deref(),
        ),
        Command::Status => run_status(&store, &code),
        Command::Verify { nickname } => run_verify(&store, &code, nickname),
    }
}

pub fn run_results<S: RoomStore>(
    store: &S,
    code: &RoomCode,
    admin_token: Option<&str>,
    out: Option<&str>,
    reference: Option<&str>,
) -> RoomResult<()> {
    let room = store.room(code)?;
    let view = results::build_results(code, &room, admin_token)?;
    info!(
        "run_results: room {}: {} rounds, winner: {:?}",
        code,
        view.rounds.len(),
        view.winner_name
    );

    let result_js = serde_json::to_value(&view).context(ParsingJsonSnafu {})?;
    let pretty_js_results = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;
    write_output(out, &pretty_js_results)?;

    // The reference results, if provided for comparison
    if let Some(reference_p) = reference {
        let reference_js = read_reference(reference_p)?;
        let pretty_js_reference =
            serde_json::to_string_pretty(&reference_js).context(ParsingJsonSnafu {})?;
        if pretty_js_reference != pretty_js_results {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_reference.as_str(),
                pretty_js_results.as_str(),
                "\n",
            );
            return ReferenceMismatchSnafu { path: reference_p }.fail();
        }
        info!("run_results: results match the reference {}", reference_p);
    }
    Ok(())
}

pub fn run_status<S: RoomStore>(store: &S, code: &RoomCode) -> RoomResult<()> {
    let room = store.room(code)?;
    let view = verify::room_status(code, &room)?;
    let pretty = serde_json::to_string_pretty(&view).context(ParsingJsonSnafu {})?;
    write_output(None, &pretty)
}

pub fn run_verify<S: RoomStore>(store: &S, code: &RoomCode, nickname: &str) -> RoomResult<()> {
    let room = store.room(code)?;
    let view = verify::verify_vote(&room, nickname)?;
    let pretty = serde_json::to_string_pretty(&view).context(ParsingJsonSnafu {})?;
    write_output(None, &pretty)
}

fn write_output(out: Option<&str>, contents: &str) -> RoomResult<()> {
    match out {
        None | Some("stdout") => {
            println!("{}", contents);
        }
        Some(path) => {
            info!("Writing output to {}", path);
            fs::write(path, contents).context(WritingOutputSnafu { path })?;
        }
    }
    Ok(())
}

pub fn read_reference(path: &str) -> RoomResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_reference: {} bytes from {}", contents.len(), path);
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})
}

pub fn report_error(e: &RoomError) {
    eprintln!("An error occured: {}", e);
    if let Some(bt) = ErrorCompat::backtrace(e) {
        eprintln!("trace: {}", bt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_fixture_test(test_name: &str, room_code: &str) -> RoomResult<()> {
        let test_dir = format!("{}/tests/data/{}", env!("CARGO_MANIFEST_DIR"), test_name);
        info!("Running test {}", test_name);
        let store = SnapshotStore::from_path(&format!("{}/{}_rooms.json", test_dir, test_name))?;
        let code = RoomCode::parse(room_code)?;
        let res = run_results(
            &store,
            &code,
            None,
            None,
            Some(format!("{}/{}_expected_results.json", test_dir, test_name).as_str()),
        );
        if let Err(e) = &res {
            warn!("Error occured {:?}", e);
            report_error(e);
        }
        res
    }

    #[test]
    fn room_codes() {
        assert_eq!(RoomCode::parse("k7pq2m").unwrap().as_str(), "K7PQ2M");
        assert_eq!(RoomCode::parse(" AB3XYZ ").unwrap().to_string(), "AB3XYZ");
        assert!(matches!(
            RoomCode::parse("AB3XY"),
            Err(RoomError::InvalidRoomCode { .. })
        ));
        assert!(matches!(
            RoomCode::parse("AB3XY!"),
            Err(RoomError::InvalidRoomCode { .. })
        ));
        assert!(matches!(
            RoomCode::parse("AB3XYZ7"),
            Err(RoomError::InvalidRoomCode { .. })
        ));
    }

    #[test]
    fn missing_room() {
        let store = SnapshotStore::from_json_str(r#"{"rooms": {}}"#).unwrap();
        let code = RoomCode::parse("AAAAAA").unwrap();
        assert!(matches!(
            run_status(&store, &code),
            Err(RoomError::RoomNotFound { .. })
        ));
    }

    #[test]
    fn missing_snapshot_file() {
        assert!(matches!(
            SnapshotStore::from_path("/nonexistent/rooms.json"),
            Err(RoomError::OpeningJson { .. })
        ));
    }

    #[test]
    fn class_president() {
        let _ = env_logger::builder().is_test(true).try_init();
        assert!(run_fixture_test("class_president", "k7pq2m").is_ok());
    }

    #[test]
    fn class_president_wrong_reference() {
        let test_dir = format!("{}/tests/data/class_president", env!("CARGO_MANIFEST_DIR"));
        let store =
            SnapshotStore::from_path(&format!("{}/class_president_rooms.json", test_dir)).unwrap();
        let code = RoomCode::parse("K7PQ2M").unwrap();
        // The reference of a room is not the reference of another room.
        let res = run_results(
            &store,
            &RoomCode::parse("W2DK9F").unwrap(),
            Some("9b0e7c51-admin"),
            None,
            Some(format!("{}/class_president_expected_results.json", test_dir).as_str()),
        );
        assert!(matches!(res, Err(RoomError::ReferenceMismatch { .. })));
        assert!(run_results(&store, &code, None, None, None).is_ok());
    }
}
