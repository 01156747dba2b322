//! Replay driver
//!
//! Runs a directory of candidate inputs through a configured harness and
//! reports verdicts. This is a replay/triage tool, not a fuzzer: corpus
//! management and mutation belong to an external engine (see `fuzz/`).
//!
//! Usage:
//!   cinder <config.json> <inputs-dir> [--verify]
//!   cinder --demo <inputs-dir> [--verify]
//!
//! `--demo` runs the built-in sample target over the direct-call channel.
//! `--verify` replays every input twice and aborts on any determinism
//! mismatch. Objectives are copied, with a JSON state report, into a
//! timestamped `findings-*` directory next to the inputs.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use chrono::Local;
use log::{error, info, warn};

use cinder::firmware::sample_target;
use cinder::{ChannelKind, Harness, HarnessConfig, Verdict, DEFAULT_BUDGET};

struct Args {
    config: Option<PathBuf>,
    demo: bool,
    inputs: PathBuf,
    verify: bool,
}

fn parse_args() -> Option<Args> {
    let mut config = None;
    let mut demo = false;
    let mut inputs = None;
    let mut verify = false;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--demo" => demo = true,
            "--verify" => verify = true,
            _ if config.is_none() && !demo => config = Some(PathBuf::from(arg)),
            _ if inputs.is_none() => inputs = Some(PathBuf::from(arg)),
            _ => return None,
        }
    }

    if demo == config.is_some() {
        return None;
    }
    Some(Args {
        config,
        demo,
        inputs: inputs?,
        verify,
    })
}

fn build_harness(args: &Args) -> Result<Harness, Box<dyn std::error::Error>> {
    if args.demo {
        let (image, layout) = sample_target();
        Ok(Harness::from_parts(
            &image,
            None,
            ChannelKind::DirectCall,
            layout,
            DEFAULT_BUDGET,
        ))
    } else {
        let path = args.config.as_ref().unwrap();
        let text = fs::read_to_string(path)?;
        let config: HarnessConfig = serde_json::from_str(&text)?;
        Ok(Harness::new(&config)?)
    }
}

fn input_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

fn save_finding(
    findings: &mut Option<PathBuf>,
    inputs: &Path,
    case: &Path,
    harness: &Harness,
) -> std::io::Result<()> {
    let dir = match findings {
        Some(dir) => dir.clone(),
        None => {
            let stamp = Local::now().format("%Y%m%d-%H%M%S");
            let dir = inputs.join(format!("../findings-{}", stamp));
            fs::create_dir_all(&dir)?;
            *findings = Some(dir.clone());
            dir
        }
    };

    let name = case.file_name().unwrap_or_default();
    fs::copy(case, dir.join(name))?;
    if let Some(report) = harness.case_report() {
        let mut report_name = name.to_os_string();
        report_name.push(".report.json");
        let json = serde_json::to_string_pretty(&report).unwrap_or_default();
        fs::write(dir.join(report_name), json)?;
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let args = match parse_args() {
        Some(args) => args,
        None => {
            eprintln!("usage: cinder <config.json> <inputs-dir> [--verify]");
            eprintln!("       cinder --demo <inputs-dir> [--verify]");
            process::exit(2);
        }
    };

    let mut harness = match build_harness(&args) {
        Ok(harness) => harness,
        Err(err) => {
            error!("setup failed: {}", err);
            process::exit(1);
        }
    };

    let files = match input_files(&args.inputs) {
        Ok(files) => files,
        Err(err) => {
            error!("cannot list {}: {}", args.inputs.display(), err);
            process::exit(1);
        }
    };

    let mut findings_dir = None;
    let (mut objectives, mut timeouts, mut clean) = (0u64, 0u64, 0u64);

    for path in &files {
        let input = match fs::read(path) {
            Ok(input) => input,
            Err(err) => {
                warn!("skipping {}: {}", path.display(), err);
                continue;
            }
        };

        let verdict = if args.verify {
            harness.run_case_verified(&input)
        } else {
            harness.run_case(&input)
        };
        info!("{}: {}", path.display(), verdict);

        match verdict {
            Verdict::Objective => {
                objectives += 1;
                if let Err(err) = save_finding(&mut findings_dir, &args.inputs, path, &harness) {
                    warn!("could not save finding for {}: {}", path.display(), err);
                }
            }
            Verdict::Timeout => timeouts += 1,
            Verdict::Continue => clean += 1,
        }
    }

    println!(
        "{} inputs: {} objective, {} timeout, {} clean",
        files.len(),
        objectives,
        timeouts,
        clean
    );
    if let Some(dir) = findings_dir {
        println!("findings written to {}", dir.display());
    }
    if objectives > 0 {
        process::exit(1);
    }
}
