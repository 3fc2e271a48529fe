//! Golden-file runner: compiles every design under `fixtures/` twice,
//! checks both runs agree, then compares against `<fixture>.golden`.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use pretty_assertions::StrComparison;
use regex::Regex;
use typeform::code::Fragment;
use typeform::design::Design;
use typeform::render::GoRenderer;

#[derive(Parser, Debug)]
struct Settings {
    /// rewrite the golden files with the current output
    #[arg(long)]
    bless: bool,

    /// only run fixtures whose file stem matches this regex
    #[arg(long)]
    filter: Option<String>,

    /// fixture directory
    #[arg(long, default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/../fixtures"))]
    fixtures: PathBuf,
}

enum Outcome {
    Pass,
    Blessed,
    Fail(String),
}

fn main() {
    let settings = Settings::parse();
    match run(&settings) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(error) => {
            eprintln!("{} {error:#}", "error:".red().bold());
            std::process::exit(1);
        }
    }
}

fn run(settings: &Settings) -> Result<bool> {
    let filter = settings.filter.as_deref().map(Regex::new).transpose().context("invalid --filter")?;
    let pattern = settings.fixtures.join("*.json");
    let mut fixtures = glob::glob(&pattern.to_string_lossy())?.collect::<Result<Vec<_>, _>>()?;
    fixtures.sort();
    if fixtures.is_empty() {
        bail!("no fixtures under {}", settings.fixtures.display());
    }

    let mut failed = 0usize;
    for path in &fixtures {
        let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        if filter.as_ref().is_some_and(|re| !re.is_match(&stem)) {
            continue;
        }
        match check(path, settings.bless) {
            Ok(Outcome::Pass) => eprintln!("{} {stem}", "✅ pass".green()),
            Ok(Outcome::Blessed) => eprintln!("{} {stem}", "✏️  blessed".yellow()),
            Ok(Outcome::Fail(diff)) => {
                failed += 1;
                eprintln!("{} {stem}\n{diff}", "❌ fail".red());
            }
            Err(error) => {
                failed += 1;
                eprintln!("{} {stem}: {error:#}", "❌ error".red());
            }
        }
    }
    Ok(failed == 0)
}

fn check(path: &Path, bless: bool) -> Result<Outcome> {
    let source = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let first = compile(&source)?;
    let second = compile(&source)?;
    if first != second {
        return Ok(Outcome::Fail(diff("first run", &first, "second run", &second)));
    }

    let golden_path = path.with_extension("golden");
    if bless {
        std::fs::write(&golden_path, &first).with_context(|| format!("failed to write {}", golden_path.display()))?;
        return Ok(Outcome::Blessed);
    }
    let golden = std::fs::read_to_string(&golden_path)
        .with_context(|| format!("missing {} (run with --bless)", golden_path.display()))?;
    if golden == first {
        Ok(Outcome::Pass)
    } else {
        Ok(Outcome::Fail(diff("golden", &golden, "actual", &first)))
    }
}

/// Transforms, projections and validations of the design, in that order.
fn compile(source: &str) -> Result<String> {
    let design = Design::parse(source)?;
    let r = GoRenderer;
    let session = design.session();
    let mut sections = Vec::new();

    let transforms = design.compile_transforms(&session)?;
    if let Some(failure) = transforms.failures.first() {
        bail!("{}: {}", failure.request, failure.error);
    }
    let mut funcs = transforms.functions;
    funcs.extend(transforms.helpers.iter().map(|h| h.to_func(&r)));
    sections.push(Fragment { types: Vec::new(), funcs }.render(&r));
    for projection in design.compile_projections()? {
        sections.push(projection.render(&r));
    }
    let validations = design.compile_validations(&session)?;
    sections.push(Fragment { types: Vec::new(), funcs: validations }.render(&r));

    sections.retain(|s| !s.is_empty());
    Ok(sections.join("\n"))
}

/// Line diff of the two outputs, `<` lines from the left, `>` from the right.
fn diff(left_name: &str, left: &str, right_name: &str, right: &str) -> String {
    format!("  < {left_name}\n  > {right_name}\n{}", StrComparison::new(left, right))
}

