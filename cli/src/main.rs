use clap::Parser;
use colored::*;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use xsschk_core::{
    list_payload_files, timeout_or_default, ConsoleSink, EventLog, PayloadLoader, ResultAggregator,
    ScanConfig, ScanEngine, ScanError, DEFAULT_CONCURRENCY, DEFAULT_LOG_FILE, DEFAULT_PAYLOAD_DIR,
};

#[derive(Parser, Debug)]
#[command(
    name = "xsschk",
    version,
    about = "Stored and reflected XSS prober",
    after_help = "\x1b[1;36mEXAMPLES:\x1b[0m
  Basic run:                 xsschk --stored http://target/comment --reflected 'http://target/search?q=' -p payloads/xss.txt
  Built-in payloads:         xsschk --stored target/comment --reflected 'target/search?q=' --builtin -y
  Through Burp:              xsschk --stored ... --reflected ... --proxy http://127.0.0.1:8080
  Save a JSON report:        xsschk --stored ... --reflected ... -o report.json
  Check the plan only:       xsschk --stored ... --reflected ... --dry-run"
)]
pub struct Args {
    #[arg(long, help = "Endpoint receiving the payload as the `input` form field")]
    pub stored: String,

    #[arg(long, help = "URL prefix the encoded payload is appended to (e.g. http://host/search?q=)")]
    pub reflected: String,

    #[arg(short = 'p', long, conflicts_with = "builtin", help = "Payload file, one payload per line")]
    pub payloads: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_PAYLOAD_DIR, help = "Directory searched for .txt payload files when -p is not given")]
    pub payload_dir: PathBuf,

    #[arg(long, help = "Use the built-in payload list")]
    pub builtin: bool,

    #[arg(long, default_value = "10", help = "Request timeout in seconds (invalid values fall back to 10)")]
    pub timeout: String,

    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY, help = "Maximum requests in flight per phase")]
    pub concurrency: usize,

    #[arg(short = 'o', long, help = "Write a JSON report to this path")]
    pub output: Option<String>,

    #[arg(long, default_value = DEFAULT_LOG_FILE, help = "Append-only event log")]
    pub log_file: String,

    #[arg(long, help = "Override the User-Agent header")]
    pub user_agent: Option<String>,

    #[arg(long, help = "Rotate through a pool of browser User-Agents")]
    pub random_agent: bool,

    #[arg(long, help = "Proxy URL (e.g. http://127.0.0.1:8080)")]
    pub proxy: Option<String>,

    #[arg(short = 'H', long = "header", help = "Custom header (e.g. \"Cookie: session=abc\")")]
    pub headers: Vec<String>,

    #[arg(long, help = "Classify 4xx/5xx response bodies instead of counting them as failed requests")]
    pub classify_error_pages: bool,

    #[arg(short = 'y', long, help = "Skip the confirmation prompt")]
    pub yes: bool,

    #[arg(long, help = "Load payloads and print the plan without sending requests")]
    pub dry_run: bool,

    #[arg(short = 'v', long, help = "Debug-level diagnostics on stderr")]
    pub verbose: bool,
}

impl Args {
    fn to_config(&self) -> ScanConfig {
        ScanConfig {
            stored_url: self.stored.clone(),
            reflected_url: self.reflected.clone(),
            timeout_secs: timeout_or_default(&self.timeout),
            concurrency: self.concurrency,
            log_file: self.log_file.clone(),
            output: self.output.clone(),
            user_agent: self.user_agent.clone(),
            random_agent: self.random_agent,
            proxy: self.proxy.clone(),
            headers: self.headers.clone(),
            classify_error_pages: self.classify_error_pages,
            dry_run: self.dry_run,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let args = Args::parse();
    init_logger(args.verbose);
    print_banner();

    match run(&args).await {
        Ok(code) => code,
        Err(ScanError::SourceUnavailable { path, reason }) => {
            eprintln!("{}", format!("[!] No payloads to test ({}: {}). Nothing was sent.", path.display(), reason).red());
            ExitCode::from(1)
        }
        Err(e @ ScanError::ConfigInvalid(_)) => {
            eprintln!("{}", format!("[!] {}", e).red());
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("{}", format!("[!] {}", e).red());
            ExitCode::from(1)
        }
    }
}

fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn print_banner() {
    println!("{}", "=== xsschk: stored / reflected XSS prober ===".bright_cyan().bold());
    println!("{}", "──────────────────────────────────────────────────".dimmed());
}

async fn run(args: &Args) -> Result<ExitCode, ScanError> {
    let config = args.to_config();

    // Payloads are resolved before anything touches the network.
    let loader = resolve_payloads(args)?;
    let payloads = loader.into_payloads();
    println!("{}", format!("[+] Loaded {} payload(s)", payloads.len()).green().bold());

    print_scan_config(&config);

    if config.dry_run {
        println!(
            "[DRY RUN] Would send {} stored and {} reflected request(s)",
            payloads.len(),
            payloads.len()
        );
        return Ok(ExitCode::SUCCESS);
    }

    if !args.yes && !confirm(&config, payloads.len())? {
        println!("{}", "[-] Aborted, no requests sent.".yellow());
        return Ok(ExitCode::SUCCESS);
    }

    let event_log = EventLog::open(&config.log_file)?.into_ref();
    let client = Arc::new(config.build_client()?);
    let engine = ScanEngine::from_config(&config, client, Arc::clone(&event_log), ConsoleSink::new_ref())?;

    let report = engine.run(&payloads).await?;

    if let Some(ref output) = config.output {
        match ResultAggregator::write_report(&report, output) {
            Ok(()) => println!("{}", format!("[+] Report written to {}", output).green()),
            Err(e) => log::warn!("Report not written: {}", e),
        }
    }
    event_log.flush();

    println!("\n{}", "[+] Scan complete!".green().bold());
    Ok(ExitCode::SUCCESS)
}

fn resolve_payloads(args: &Args) -> Result<PayloadLoader, ScanError> {
    if args.builtin {
        return Ok(PayloadLoader::builtin());
    }
    if let Some(ref path) = args.payloads {
        return PayloadLoader::from_file(path);
    }

    let files = list_payload_files(&args.payload_dir)?;
    let chosen = if files.len() == 1 {
        files[0].clone()
    } else {
        println!("{}", "Available payload files:".bright_cyan());
        for (i, file) in files.iter().enumerate() {
            println!("  {}. {}", i + 1, file.display());
        }
        let answer = prompt(&format!("Select payload file [1-{}]: ", files.len()))?;
        let index = parse_selection(&answer, files.len())?;
        files[index].clone()
    };
    log::info!("Using payload file {}", chosen.display());
    PayloadLoader::from_file(chosen)
}

/// Parses a 1-based menu choice into an index.
fn parse_selection(answer: &str, count: usize) -> Result<usize, ScanError> {
    match answer.trim().parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Ok(n - 1),
        _ => Err(ScanError::ConfigInvalid(format!("'{}' is not a file number between 1 and {}", answer.trim(), count))),
    }
}

fn confirm(config: &ScanConfig, count: usize) -> Result<bool, ScanError> {
    let answer = prompt(&format!(
        "Send {} payload(s) to {} and {}? [y/N]: ",
        count, config.stored_url, config.reflected_url
    ))?;
    parse_confirmation(&answer)
}

/// `y`/`yes` proceeds, `n`/`no`/empty declines, anything else is invalid.
fn parse_confirmation(answer: &str) -> Result<bool, ScanError> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Ok(true),
        "" | "n" | "no" => Ok(false),
        other => Err(ScanError::ConfigInvalid(format!("unrecognized confirmation '{}'", other))),
    }
}

fn prompt(question: &str) -> Result<String, ScanError> {
    print!("{}", question);
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| ScanError::io("<stdin>", e))?;
    Ok(line)
}

fn print_scan_config(config: &ScanConfig) {
    println!("{}", format!("[+] Stored:      {}", config.stored_url).green().bold());
    println!("{}", format!("[+] Reflected:   {}", config.reflected_url).green().bold());
    println!("{}", format!("[+] Timeout:     {}s", config.timeout_secs).blue());
    println!("{}", format!("[+] Concurrency: {}", config.concurrency.max(1)).blue());
    println!("{}", format!("[+] Event log:   {}", config.log_file).blue());
    if let Some(ref output) = config.output {
        println!("{}", format!("[+] Report:      {}", output).blue());
    }
    if let Some(ref proxy) = config.proxy {
        println!("{}", format!("[+] Proxy:       {}", proxy).yellow());
    }
    if !config.headers.is_empty() {
        println!("{}", format!("[+] Headers:     {} custom", config.headers.len()).yellow());
    }
    if config.classify_error_pages {
        println!("{}", "[+] Error pages: classified".yellow());
    }
    println!("{}", "──────────────────────────────────────────────────".dimmed());
}
