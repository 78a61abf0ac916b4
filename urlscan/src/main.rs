use colored::Colorize;
use tracing::Level;
use urlscan::commands::command_argument_builder;
use urlscan::handle_crawl;
use urlscan_core::print_banner;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let matches = cmd.get_matches();
    let quiet = matches.get_flag("quiet");
    let json = matches.get_flag("json");

    // logs go to stderr so --json output on stdout stays parseable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if quiet { Level::WARN } else { Level::INFO })
        .init();

    if !quiet && !json {
        print_banner();
    }

    if let Err(e) = handle_crawl(&matches).await {
        eprintln!("{} {:#}", "✗".red(), e);
        std::process::exit(1);
    }
}
