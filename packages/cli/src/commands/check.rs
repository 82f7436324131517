use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use weft_parser::{format_error, parse_with_path, NodeStats};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Document to check
    pub input: PathBuf,

    /// Print node statistics
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn check(args: CheckArgs) -> Result<()> {
    let source = fs::read_to_string(&args.input)?;
    let filename = args.input.display().to_string();

    let tree = match parse_with_path(&source, &filename) {
        Ok(tree) => tree,
        Err(err) => {
            eprintln!("{}", format_error(&source, &filename, &err));
            anyhow::bail!("{} could not be tokenized", filename);
        }
    };

    for diagnostic in tree.diagnostics() {
        eprintln!("{}", format_error(&source, &filename, diagnostic));
    }

    if args.verbose {
        let stats = NodeStats::collect(&tree);
        println!("   Elements:   {}", stats.elements);
        println!("   Attributes: {}", stats.attributes);
        println!("   Text nodes: {}", stats.texts);
        println!("   Tokens:     {}", stats.tokens);
    }

    if tree.is_well_formed() {
        println!("{} {} is well-formed", "✓".green(), filename);
        Ok(())
    } else {
        anyhow::bail!(
            "{} is not well-formed ({} diagnostic(s))",
            filename,
            tree.diagnostics().len().max(1)
        )
    }
}
