//! Command-line interface: design documents in, Go code out.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use tracing::info;

use crate::code::Fragment;
use crate::design::Design;
use crate::render::{GoRenderer, Render};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile type transformations, result views and validations from design documents
#[derive(Parser, Debug)]
#[command(name = "typeform", version)]
pub struct CommandLineInterface {
    /// log every compilation step to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// emit the conversion functions of every transform request, plus their helpers
    Transform(Target),
    /// emit projected types, constructors and validations of every projection request
    Views(Target),
    /// emit the validation functions of every validation request
    Validate(Target),
    /// check the designs and print a summary of their types and requests
    Inspect(Target),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON), one design per line
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select the design in each document (e.g. /design)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document; every output is a design
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct Target {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

/// A checked design and where it came from.
struct Loaded {
    origin: String,
    design: Design,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_designs(&self) -> Result<Vec<Loaded>> {
        let source_paths = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        let mut out = Vec::new();
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .map_err(|source| crate::error::DesignError::Io { path: source_path.clone(), source })?;
            let documents = if self.ndjson {
                source
                    .lines()
                    .enumerate()
                    .filter(|(_, line)| !line.trim().is_empty())
                    .map(|(i, line)| {
                        serde_json::from_str::<Value>(line)
                            .with_context(|| format!("failed to parse JSON ({source_path_str}, line {})", i + 1))
                    })
                    .collect::<Result<Vec<_>>>()?
            } else {
                vec![serde_json::from_str::<Value>(&source).with_context(|| format!("failed to parse JSON ({source_path_str})"))?]
            };
            for document in documents {
                for value in self.preprocess(document).with_context(|| format!("failed to preprocess {source_path_str}"))? {
                    let design = Design::from_value(value).with_context(|| format!("invalid design in {source_path_str}"))?;
                    out.push(Loaded { origin: source_path_str.clone(), design });
                }
            }
            info!(path = %source_path_str, "loaded input");
        }
        Ok(out)
    }

    /// Pointer selection first, then the jq filter.
    fn preprocess(&self, document: Value) -> Result<Vec<Value>> {
        let document = match self.json_pointer.as_deref() {
            None => document,
            Some(pointer) => document
                .pointer(pointer)
                .cloned()
                .ok_or_else(|| anyhow!("JSON pointer `{pointer}` selects nothing"))?,
        };
        match self.jq_expr.as_deref() {
            None => Ok(vec![document]),
            Some(jq_expr) => Ok(crate::jq_exec::run_jaq(jq_expr, &document)?),
        }
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> Result<()> {
        let (target, emit): (&Target, Emit) = match &self.cmd {
            Command::Transform(target) => (target, emit_transforms),
            Command::Views(target) => (target, emit_views),
            Command::Validate(target) => (target, emit_validations),
            Command::Inspect(target) => (target, emit_summary),
        };
        // debug path
        if target.no_op {
            eprintln!("{self:#?}");
            return Ok(());
        }

        let loaded = target.input_settings.load_designs()?;
        info!(designs = loaded.len(), "compiling");
        let renderer = GoRenderer;
        let mut chunks = Vec::with_capacity(loaded.len());
        let mut failures = Vec::new();
        for Loaded { origin, design } in &loaded {
            let chunk = emit(design, &renderer, &mut failures)
                .with_context(|| format!("failed to compile the design in {origin}"))?;
            if !chunk.is_empty() {
                chunks.push(chunk);
            }
        }
        write_output(target.out.as_deref(), &chunks.join("\n"))?;
        if !failures.is_empty() {
            bail!("{} request(s) produced no code:\n  {}", failures.len(), failures.join("\n  "));
        }
        Ok(())
    }
}

/// Renders one design; requests that fail on their own are described in
/// the failure list instead of aborting the run.
type Emit = fn(&Design, &dyn Render, &mut Vec<String>) -> Result<String>;

fn emit_transforms(design: &Design, r: &dyn Render, failures: &mut Vec<String>) -> Result<String> {
    let session = design.session();
    let out = design.compile_transforms(&session)?;
    info!(functions = out.functions.len(), helpers = out.helpers.len(), "compiled transforms");
    failures.extend(out.failures.iter().map(|f| format!("{}: {}", f.request, f.error)));
    let mut funcs = out.functions;
    funcs.extend(out.helpers.iter().map(|h| h.to_func(r)));
    Ok(Fragment { types: Vec::new(), funcs }.render(r))
}

fn emit_views(design: &Design, r: &dyn Render, _: &mut Vec<String>) -> Result<String> {
    let projections = design.compile_projections()?;
    info!(projections = projections.len(), "compiled projections");
    let rendered: Vec<String> = projections.iter().map(|p| p.render(r)).collect();
    Ok(rendered.join("\n"))
}

fn emit_validations(design: &Design, r: &dyn Render, _: &mut Vec<String>) -> Result<String> {
    let funcs = design.compile_validations(&design.session())?;
    info!(functions = funcs.len(), "compiled validations");
    Ok(Fragment { types: Vec::new(), funcs }.render(r))
}

fn emit_summary(design: &Design, _: &dyn Render, _: &mut Vec<String>) -> Result<String> {
    let session = design.session();
    let reg = &design.registry;
    let mut types = Vec::with_capacity(reg.len());
    for ut in reg.iter() {
        let views: Vec<&str> = ut.views.iter().map(|v| v.name.as_str()).collect();
        types.push(json!({
            "id": ut.id,
            "name": session.scope().name(&ut.id)?,
            "kind": ut.kind,
            "category": reg.kind(&ut.attribute)?.to_string(),
            "views": views,
        }));
    }
    let summary = json!({
        "types": types,
        "contexts": design.contexts.keys().collect::<Vec<_>>(),
        "transforms": design.transforms,
        "projections": design.projections,
        "validations": design.validations,
    });
    Ok(serde_json::to_string_pretty(&summary)? + "\n")
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_output(out: Option<&Path>, text: &str) -> Result<()> {
    let Some(out) = out else {
        print!("{text}");
        return Ok(());
    };
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(out, text).with_context(|| format!("failed to write {}", out.display()))?;
    info!(path = %out.display(), "wrote output");
    Ok(())
}

pub fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>, crate::error::DesignError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    use crate::error::DesignError;

    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            let entries = glob::glob(pattern).map_err(|e| DesignError::Glob(format!("{pattern}: {e}")))?;
            for entry in entries {
                let path = entry.map_err(|e| DesignError::Glob(e.to_string()))?;
                matched_any = true;
                out.push(path);
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                return Err(DesignError::Glob(format!("glob pattern matched no files: {pattern}")));
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subcommands_parse_shared_input_flags() {
        let cli = CommandLineInterface::try_parse_from([
            "typeform", "--verbose", "views", "--input", "a.json", "b.json", "--jq-expr", ".design", "--out", "out.go",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Command::Views(target) = &cli.cmd else { panic!("expected views") };
        assert_eq!(target.input_settings.input, ["a.json", "b.json"]);
        assert_eq!(target.input_settings.jq_expr.as_deref(), Some(".design"));
        assert_eq!(target.out.as_deref(), Some(Path::new("out.go")));
    }

    #[test]
    fn input_is_required() {
        assert!(CommandLineInterface::try_parse_from(["typeform", "transform"]).is_err());
    }

    #[test]
    fn literal_paths_pass_through_and_empty_globs_fail() {
        let paths = resolve_file_path_patterns(["some/file.json"]).unwrap();
        assert_eq!(paths, [PathBuf::from("some/file.json")]);
        let err = resolve_file_path_patterns(["/nonexistent-typeform-dir/*.json"]).unwrap_err();
        assert!(err.to_string().contains("matched no files"), "{err}");
    }

    #[test]
    fn pointer_then_jq_select_designs() {
        let settings = InputSettings {
            ndjson: false,
            json_pointer: Some("/api".into()),
            jq_expr: Some(".designs[]".into()),
            input: vec![],
        };
        let doc = json!({"api": {"designs": [{"types": []}, {"types": []}]}});
        assert_eq!(settings.preprocess(doc).unwrap().len(), 2);
        let missing = settings.preprocess(json!({})).unwrap_err();
        assert!(missing.to_string().contains("`/api`"), "{missing}");
    }

    #[test]
    fn summary_lists_types_with_their_go_names() {
        let design = Design::parse(
            r#"{"types": [{"id": "user-id", "attribute": {"type": "string"}},
                          {"id": "Post", "kind": "result", "attribute": {"type": {"object": {"id": {"type": {"user": "user-id"}}}}}}]}"#,
        )
        .unwrap();
        let summary: Value = serde_json::from_str(&emit_summary(&design, &GoRenderer, &mut Vec::new()).unwrap()).unwrap();
        assert_eq!(summary["types"][0]["name"], "UserID");
        assert_eq!(summary["types"][1]["kind"], "result");
        assert_eq!(summary["types"][1]["views"], json!(["default"]));
        assert_eq!(summary["types"][1]["category"], "object");
    }
}
