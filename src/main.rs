use sloggers::terminal::{Destination, TerminalLoggerBuilder};
use sloggers::types::Severity;
use sloggers::Build;

#[rocket::main]
async fn main() -> Result<(), rocket::Error> {
    let mut builder = TerminalLoggerBuilder::new();
    builder.level(Severity::Info);
    builder.destination(Destination::Stderr);
    let logger = builder.build().expect("terminal logger");
    let _guard = slog_scope::set_global_logger(logger);

    usageregi::rocket().launch().await
}
