use clap::Parser;
use log::{info, warn, LevelFilter};

mod args;
mod room;

fn main() {
    let args = args::Args::parse();

    if args.verbose {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    info!(
        "roomvote: input {:?}, room {:?}, command {:?}",
        args.input,
        args.room,
        command_name(&args.command)
    );

    if let Err(e) = room::run_command(&args) {
        warn!("Error occured {:?}", e);
        room::report_error(&e);
        std::process::exit(1);
    }
}

// The admin token stays out of the logs.
fn command_name(command: &args::Command) -> &'static str {
    match command {
        args::Command::Results { .. } => "results",
        args::Command::Status => "status",
        args::Command::Verify { .. } => "verify",
    }
}
