//! lotledger - Reconstruct tax lots from investment transactions.

fn main() -> std::process::ExitCode {
    lotledger::cmd::main()
}
