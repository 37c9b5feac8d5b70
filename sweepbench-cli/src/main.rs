fn main() {
    if let Err(e) = sweepbench_cli::run() {
        eprintln!("sweepbench: {e:#}");
        std::process::exit(1);
    }
}
