//! Provides the main entry point to the program.
use human_panic::{metadata, setup_panic};

fn main() {
    setup_panic!(metadata!().support("Open an issue on the project's issue tracker."));

    if let Err(err) = cesm::cli::run_cli() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}
