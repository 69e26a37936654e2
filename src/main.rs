use std::env;
use std::process::ExitCode;

use savings_forecast::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let raw_args: Vec<String> = env::args().collect();
    if raw_args.get(1).map(|s| s.as_str()) == Some("serve") {
        init_logging("info");
        let port = raw_args
            .get(2)
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8080);
        if let Err(e) = savings_forecast::api::run_http_server(port).await {
            eprintln!("Server error: {e}");
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    }

    init_logging("warn");
    savings_forecast::api::run_cli(raw_args)
}
