use sitecheck::handlers;
use tracing::Level;

mod commands;

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cmd = commands::command_argument_builder();
    let matches = cmd.get_matches();

    init_tracing(matches.get_count("verbose"));

    match matches.subcommand() {
        Some(("crawl", sub_matches)) => handlers::handle_crawl(sub_matches).await,
        Some(("check", sub_matches)) => handlers::handle_check(sub_matches).await,
        _ => unreachable!("clap should ensure we don't get here"),
    }
}
