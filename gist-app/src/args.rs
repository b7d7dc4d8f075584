use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use gist_common::{SummaryFormat, SummaryLength, SummaryOptions};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gist")]
#[command(about = "Scrape web pages in a headless browser and summarize them with a language model")]
#[command(version)]
pub struct Args {
    /// Page(s) to summarize. One URL runs a single summary, several run a batch
    #[arg(value_name = "URL", required = true)]
    pub urls: Vec<String>,

    /// Summary length
    #[arg(short, long, value_enum, default_value_t = LengthArg::Medium)]
    pub length: LengthArg,

    /// Summary layout
    #[arg(short, long, value_enum, default_value_t = FormatArg::Paragraphs)]
    pub format: FormatArg,

    /// Show page title, description and capture time in the report
    #[arg(long)]
    pub include_metadata: bool,

    /// Also write the report to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Add a comparative analysis across the summarized pages
    #[arg(short, long)]
    pub comparative: bool,

    /// Summarize up to N same-site links found on the page (single URL only)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u8).range(1..=20))]
    pub follow_links: Option<u8>,

    /// Retries per URL before giving up
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub max_retries: u32,

    /// Base retry delay in milliseconds, doubled on every retry
    #[arg(long, value_name = "MS", default_value_t = 2000, value_parser = clap::value_parser!(u64).range(100..=30_000))]
    pub retry_delay: u64,

    /// Emit the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Configuration file (defaults to ./gist.yaml and the user config dir)
    #[arg(long, env = "GIST_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// WebDriver endpoint, overriding the configuration
    #[arg(long, env = "GIST_WEBDRIVER_URL", value_name = "URL")]
    pub webdriver_url: Option<String>,

    /// Run the browser headless, overriding the configuration
    #[arg(long, overrides_with = "no_headless")]
    pub headless: bool,

    /// Show the browser window, overriding the configuration
    #[arg(long, overrides_with = "headless")]
    pub no_headless: bool,

    /// Debug logging, mirrored to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LengthArg {
    Short,
    Medium,
    Long,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Paragraphs,
    Bullets,
    Json,
}

impl From<LengthArg> for SummaryLength {
    fn from(arg: LengthArg) -> Self {
        match arg {
            LengthArg::Short => SummaryLength::Short,
            LengthArg::Medium => SummaryLength::Medium,
            LengthArg::Long => SummaryLength::Long,
        }
    }
}

impl From<FormatArg> for SummaryFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Paragraphs => SummaryFormat::Paragraphs,
            FormatArg::Bullets => SummaryFormat::Bullets,
            FormatArg::Json => SummaryFormat::Json,
        }
    }
}

impl Args {
    pub fn summary_options(&self) -> SummaryOptions {
        SummaryOptions {
            length: self.length.into(),
            format: self.format.into(),
            include_metadata: self.include_metadata,
            save_to_file: self.output.clone(),
            comparative: self.comparative,
            follow_links: self.follow_links,
            max_retries: self.max_retries,
            retry_delay_ms: self.retry_delay,
        }
    }

    /// Flag combinations clap cannot express on its own.
    pub fn validate(&self) -> Result<()> {
        if self.follow_links.is_some() && self.urls.len() > 1 {
            bail!("--follow-links needs exactly one URL, got {}", self.urls.len());
        }
        Ok(())
    }

    /// `Some` only when one of the headless flags was given.
    pub fn headless_override(&self) -> Option<bool> {
        if self.no_headless {
            Some(false)
        } else if self.headless {
            Some(true)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_summary_options() {
        let args = Args::try_parse_from(["gist", "https://example.com"]).unwrap();
        assert_eq!(args.summary_options(), SummaryOptions::default());
        assert_eq!(args.headless_override(), None);
    }

    #[test]
    fn parses_full_flag_set() {
        let args = Args::try_parse_from([
            "gist",
            "https://a.test",
            "https://b.test",
            "--length",
            "short",
            "--format",
            "bullets",
            "--comparative",
            "--max-retries",
            "0",
            "--retry-delay",
            "100",
            "--no-headless",
            "-o",
            "out.md",
        ])
        .unwrap();
        let opts = args.summary_options();
        assert_eq!(args.urls.len(), 2);
        assert_eq!(opts.length, SummaryLength::Short);
        assert_eq!(opts.format, SummaryFormat::Bullets);
        assert!(opts.comparative);
        assert_eq!(opts.max_retries, 0);
        assert_eq!(opts.retry_delay_ms, 100);
        assert_eq!(opts.save_to_file, Some(PathBuf::from("out.md")));
        assert_eq!(args.headless_override(), Some(false));
    }

    #[test]
    fn follow_links_needs_a_single_url() {
        let single =
            Args::try_parse_from(["gist", "https://a.test", "--follow-links", "3"]).unwrap();
        assert!(single.validate().is_ok());

        let batch = Args::try_parse_from([
            "gist",
            "https://a.test",
            "https://b.test",
            "--follow-links",
            "3",
        ])
        .unwrap();
        let err = batch.validate().unwrap_err();
        assert!(err.to_string().contains("exactly one URL"));
    }

    #[test]
    fn rejects_out_of_range_values() {
        for bad in [
            vec!["gist", "https://a.test", "--follow-links", "0"],
            vec!["gist", "https://a.test", "--follow-links", "21"],
            vec!["gist", "https://a.test", "--max-retries", "11"],
            vec!["gist", "https://a.test", "--retry-delay", "50"],
            vec!["gist", "https://a.test", "--length", "tweet"],
            vec!["gist"],
        ] {
            assert!(Args::try_parse_from(&bad).is_err(), "{bad:?} should fail");
        }
    }
}
