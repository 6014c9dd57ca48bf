fn main() -> std::process::ExitCode {
    risklens_lib::run()
}
