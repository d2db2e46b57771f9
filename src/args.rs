use clap::{Parser, Subcommand};

/// Tabulates the ranked-choice voting rooms.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON export of the voting rooms.
    /// For more information about the file format, read the documentation of `irv_tally::manual`.
    #[clap(short, long, value_parser)]
    pub input: String,

    /// (6 letters or digits) The code of the room.
    #[clap(long, value_parser)]
    pub room: String,

    #[clap(subcommand)]
    pub command: Command,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Runs the instant-runoff tabulation of the room.
    Results {
        /// The admin key of the room. Required if the voting is not closed yet.
        #[clap(long, value_parser)]
        admin_token: Option<String>,

        /// (file path, 'stdout' or empty) Where to write the results in JSON format.
        #[clap(short, long, value_parser)]
        out: Option<String>,

        /// (file path) A reference file containing the results in JSON format. If provided,
        /// roomvote will check that the tabulated results match the reference.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
    /// Shows the status of the room and the number of voters.
    Status,
    /// Checks that the vote of a voter has been recorded.
    Verify {
        /// The nickname of the voter.
        #[clap(long, value_parser)]
        nickname: String,
    },
}
