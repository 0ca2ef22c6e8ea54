use clap::Parser;
use tfs_server::config::Args;
use tracing::error;

fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    match tfs_server::run(&args.server_pipe_path) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "fatal error");
            std::process::ExitCode::FAILURE
        }
    }
}
