use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use weft_parser::{format_error, parse_with_path, serialize};

#[derive(Args, Debug)]
pub struct RoundtripArgs {
    /// Document to round-trip
    pub input: PathBuf,
}

pub fn roundtrip(args: RoundtripArgs) -> Result<()> {
    let source = fs::read_to_string(&args.input)?;
    let filename = args.input.display().to_string();

    let tree = parse_with_path(&source, &filename).map_err(|err| {
        eprintln!("{}", format_error(&source, &filename, &err));
        anyhow::anyhow!("{} could not be tokenized", filename)
    })?;
    let output = serialize(&tree);

    if let Some(offset) = first_difference(&source, &output) {
        anyhow::bail!(
            "{} differs after round trip at byte {} ({} -> {} bytes)",
            filename,
            offset,
            source.len(),
            output.len()
        );
    }

    println!("{} {} round-trips ({} bytes)", "✓".green(), filename, source.len());
    Ok(())
}

fn first_difference(left: &str, right: &str) -> Option<usize> {
    let common = left
        .bytes()
        .zip(right.bytes())
        .position(|(a, b)| a != b);
    match common {
        Some(offset) => Some(offset),
        None if left.len() != right.len() => Some(left.len().min(right.len())),
        None => None,
    }
}
