fn main() {
    scoremark_cli::init_logging();

    if let Err(error) = scoremark_cli::run(std::env::args_os()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
