pub mod crawl;
pub mod sink;

use colored::Colorize;

pub use crawl::{CrawlOptions, CrawlReport, ProgressObserver, execute_crawl, generate_crawl_report};
pub use sink::{IN_SCOPE_HEADER, OUT_OF_SCOPE_HEADER, OutputPaths, OutputSink};

pub fn print_banner() {
    let banner = r#"
                 __
  __  ___________/ /_____________ _____
 / / / / ___/ __/ / ___/ ___/ __ `/ __ \
/ /_/ / /  / /_/ (__  ) /__/ /_/ / / / /
\__,_/_/   \__/_/____/\___/\__,_/_/ /_/
"#;
    println!("{}", banner.bright_cyan());
    println!(
        "  {} {}\n",
        "closed-world URL crawler".bright_black(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
}
