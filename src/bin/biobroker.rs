use std::process::ExitCode;

fn main() -> ExitCode {
    match biobroker::apps::run(std::env::args_os()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("biobroker: {err}");
            ExitCode::FAILURE
        }
    }
}
