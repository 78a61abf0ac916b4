use crate::CLAP_STYLING;
use clap::arg;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("urlscan")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("urlscan")
        .about("Crawl a site, following only in-scope links, and record every URL found")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and progress output").required(false))
        .arg(
            arg!(-u --"url" <URL>)
                .required(true)
                .help("The http(s) URL to start crawling from"),
        )
        .arg(
            arg!(-o --"output" <PATH>)
                .required(false)
                .help(
                    "Base output path. Results go to <stem>-inscope.<ext> and \
                <stem>-outscope.<ext> beside it",
                )
                .default_value("output.txt"),
        )
        .arg(
            arg!(--"inscope" <DOMAINS>)
                .required(false)
                .help("Comma-separated host suffixes to treat as in scope"),
        )
        .arg(
            arg!(--"outscope" <DOMAINS>)
                .required(false)
                .help("Comma-separated host suffixes to treat as out of scope"),
        )
        .arg(
            arg!(-t --"threads" <N>)
                .required(false)
                .help("Number of concurrent crawl workers")
                .value_parser(clap::value_parser!(usize))
                .default_value("1"),
        )
        .arg(
            arg!(--"timeout" <SECONDS>)
                .required(false)
                .help("Per-request timeout in seconds (no timeout when omitted)")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            arg!(--"dedupe-assets" "Fetch each embedded script or stylesheet URL at most once")
                .required(false),
        )
        .arg(arg!(--"json" "Print the final crawl report as JSON").required(false))
}
