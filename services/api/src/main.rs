use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match kost_api::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("kost-api: {err}");
            ExitCode::FAILURE
        }
    }
}
