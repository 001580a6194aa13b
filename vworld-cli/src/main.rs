//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    env_logger::init();
    if let Err(err) = vworld_cli::run() {
        eprintln!("vworld: {err}");
        std::process::exit(1);
    }
}
