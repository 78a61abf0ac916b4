use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use urlscan_core::{CrawlOptions, execute_crawl, generate_crawl_report};

/// Split a comma-separated suffix list, trimming entries and dropping empty ones
pub fn parse_scope_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|list| {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Expand a leading `~` in the output path
pub fn resolve_output_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

pub fn build_crawl_options(args: &ArgMatches) -> Result<CrawlOptions> {
    let url = args
        .get_one::<String>("url")
        .context("--url is required")?;
    let output = args
        .get_one::<String>("output")
        .map(|raw| resolve_output_path(raw))
        .unwrap_or_else(|| PathBuf::from("output.txt"));

    let quiet = args.get_flag("quiet");
    let json = args.get_flag("json");

    let mut options = CrawlOptions::new(url.as_str(), output);
    options.in_scope = parse_scope_list(args.get_one::<String>("inscope").map(String::as_str));
    options.out_of_scope = parse_scope_list(args.get_one::<String>("outscope").map(String::as_str));
    options.threads = args.get_one::<usize>("threads").copied().unwrap_or(1);
    options.timeout = args.get_one::<u64>("timeout").map(|secs| Duration::from_secs(*secs));
    options.dedupe_assets = args.get_flag("dedupe-assets");
    options.show_progress_bars = !quiet && !json;

    Ok(options)
}

pub async fn handle_crawl(args: &ArgMatches) -> Result<()> {
    let options = build_crawl_options(args)?;
    let json = args.get_flag("json");
    let chatty = options.show_progress_bars;

    if chatty {
        println!("\n{} {}", "Crawling".bold(), options.url);
        println!("Workers: {}", options.threads);
        println!(
            "In scope: {}",
            describe_list(&options.in_scope, "everything not excluded")
        );
        println!("Out of scope: {}\n", describe_list(&options.out_of_scope, "nothing"));
    }

    let report = execute_crawl(options, None)
        .await
        .context("Crawl failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if chatty {
        println!("\n{}", "SCAN FINISHED".green().bold());
        print!("{}", generate_crawl_report(&report));
    }

    if report.summary.sink.write_errors > 0 {
        eprintln!(
            "{} {} URL(s) could not be written to the output files",
            "!".yellow(),
            report.summary.sink.write_errors
        );
    }

    Ok(())
}

fn describe_list(entries: &[String], empty: &str) -> String {
    if entries.is_empty() {
        empty.to_string()
    } else {
        entries.join(", ")
    }
}
