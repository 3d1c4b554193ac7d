use std::process::ExitCode;

fn main() -> ExitCode {
    qrdecoder_lib::run()
}
