fn main() -> std::process::ExitCode {
    holdings_cli::cli::run()
}
