use crate::config::Config;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use weft_editor::{ChangeKind, ComponentId, ReconciliationReport, SyncEngine, SyncResult};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Starting version of the document
    pub old: PathBuf,

    /// Version to sync to
    pub new: PathBuf,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

pub fn sync(args: SyncArgs, config: &Config) -> Result<()> {
    let old = fs::read_to_string(&args.old).with_context(|| format!("reading {}", args.old.display()))?;
    let new = fs::read_to_string(&args.new).with_context(|| format!("reading {}", args.new.display()))?;

    let mut engine = SyncEngine::for_path(&args.old.display().to_string(), config.engine.clone());
    if engine.sync(&old)? != SyncResult::Valid {
        anyhow::bail!("{} is not well-formed", args.old.display());
    }
    if let Some(root) = engine.root() {
        observe_all(&mut engine, root)?;
    }

    let result = engine.sync(&new)?;
    if result != SyncResult::Valid {
        anyhow::bail!("{} is not well-formed; nothing was synced", args.new.display());
    }

    let report = engine.last_report().cloned().unwrap_or_default();
    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => print_report(&engine, &report),
        other => anyhow::bail!("Unknown output format: {}. Use: text or json", other),
    }
    Ok(())
}

/// Materialise every component so units anchor as deep as possible
fn observe_all(engine: &mut SyncEngine, root: ComponentId) -> Result<()> {
    let mut stack = vec![root];
    while let Some(component) = stack.pop() {
        stack.extend(engine.children(component)?);
    }
    Ok(())
}

fn label(engine: &SyncEngine, component: ComponentId) -> String {
    match engine.view(component) {
        Ok(view) => match view.as_element() {
            Some(element) => format!("<{}> {}", element.name, component),
            None => format!("#text {}", component),
        },
        Err(_) => component.to_string(),
    }
}

fn print_report(engine: &SyncEngine, report: &ReconciliationReport) {
    if report.units.is_empty() {
        println!("{} no structural changes", "✓".green());
        return;
    }

    if report.root_replaced {
        println!("{} document element replaced", "!".yellow().bold());
    }
    for unit in &report.units {
        println!("{} {}", "unit".cyan().bold(), label(engine, unit.anchor));
        for record in &unit.records {
            let change = match record.change {
                ChangeKind::Inserted => "+".green(),
                ChangeKind::Removed => "-".red(),
                ChangeKind::Modified => "~".yellow(),
            };
            println!("   {} {:?} {}", change, record.kind, record.node);
        }
    }

    let rebuild = &report.rebuild;
    println!();
    println!(
        "   created {}, rebound {}, detached {}, destroyed {}",
        rebuild.created.len(),
        rebuild.rebound.len(),
        rebuild.detached.len(),
        rebuild.destroyed.len()
    );
}
