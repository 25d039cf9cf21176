use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use pasmhon::RunConfig;

fn main() -> Result<()> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut threshold: Option<usize> = None;
    let mut module_dir: Option<PathBuf> = None;
    let mut input_path: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                config_path = Some(
                    args.next()
                        .ok_or_else(|| anyhow!("Missing config path after {arg}"))?
                        .into(),
                );
            }
            "--threshold" => {
                let raw = args
                    .next()
                    .ok_or_else(|| anyhow!("Missing call count after {arg}"))?;
                threshold = Some(
                    raw.parse()
                        .with_context(|| format!("Invalid threshold '{raw}'"))?,
                );
            }
            "--module-dir" => {
                module_dir = Some(
                    args.next()
                        .ok_or_else(|| anyhow!("Missing directory after {arg}"))?
                        .into(),
                );
            }
            _ => {
                input_path = Some(arg.into());
                if args.next().is_some() {
                    bail!("Only one input file is supported");
                }
                break;
            }
        }
    }

    let mut config = match &config_path {
        Some(path) => RunConfig::from_yaml_file(path)?,
        None => RunConfig::default(),
    };
    if let Some(threshold) = threshold {
        config.specialize_threshold = threshold;
    }
    if module_dir.is_some() {
        config.module_dir = module_dir;
    }
    config.validate()?;

    let output = if let Some(path) = input_path {
        pasmhon::run_file(&path, &config)?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Reading stdin")?;
        pasmhon::run_source(&buffer, &config)?
    };

    // Output is only written once the whole program has succeeded.
    if !output.is_empty() {
        print!("{output}");
    }
    Ok(())
}

/// Installs a stderr subscriber when `RUST_LOG` is set; stdout carries only
/// program output.
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(EnvFilter::from_default_env())
            .init();
    }
}
