//! archcanvas command-line tool.
//!
//! Works on saved diagram documents (`-` reads stdin); usage errors exit 2:
//!
//! - `archcanvas check <file>`: lint diagnostics; exit 1 on errors.
//! - `archcanvas fmt <file>`: re-emit the document in canonical form.
//! - `archcanvas submit <file>`: print the submission payload.
//! - `archcanvas stats <file>`: node counts per kind and edge count.
//!
//! Set `RUST_LOG=debug` for import details.

use ac_core::{
    DiagramGraph, LintSeverity, NodeKind, Viewport, encode_submission, export_document,
    import_document, lint, lint_document,
};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use time::OffsetDateTime;

#[derive(Debug, Parser)]
#[command(
    name = "archcanvas",
    about = "Check, format, and encode system-design diagram documents",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print lint diagnostics; exits 1 when any is an error.
    Check {
        /// Diagram document, or `-` for stdin.
        file: PathBuf,
    },
    /// Re-emit the document in canonical form.
    Fmt { file: PathBuf },
    /// Print the submission payload.
    Submit { file: PathBuf },
    /// Print node counts per kind and the edge count.
    Stats { file: PathBuf },
}

impl Command {
    fn file(&self) -> &Path {
        match self {
            Command::Check { file }
            | Command::Fmt { file }
            | Command::Submit { file }
            | Command::Stats { file } => file,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Command::Check { .. } => "check",
            Command::Fmt { .. } => "fmt",
            Command::Submit { .. } => "submit",
            Command::Stats { .. } => "stats",
        }
    }
}

fn read_input(path: &Path) -> Result<String, String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| format!("failed to read stdin: {e}"))?;
        Ok(text)
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))
    }
}

fn load(text: &str) -> Result<(DiagramGraph, Viewport), String> {
    import_document(text).map_err(|e| e.to_string())
}

fn check(text: &str) -> Result<ExitCode, String> {
    let doc = ac_core::document::parse_document(text).map_err(|e| e.to_string())?;
    let diags = lint_document(&doc);
    for d in &diags {
        println!("{d}");
    }
    let errors = diags
        .iter()
        .filter(|d| d.severity == LintSeverity::Error)
        .count();
    eprintln!(
        "{} nodes, {} edges: {errors} error(s), {} other diagnostic(s)",
        doc.nodes.len(),
        doc.edges.len(),
        diags.len() - errors
    );
    Ok(if lint::has_errors(&diags) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn fmt(text: &str) -> Result<ExitCode, String> {
    let (graph, viewport) = load(text)?;
    let out = export_document(&graph, viewport).map_err(|e| e.to_string())?;
    println!("{out}");
    Ok(ExitCode::SUCCESS)
}

fn submit(text: &str) -> Result<ExitCode, String> {
    let (graph, viewport) = load(text)?;
    let payload =
        encode_submission(&graph, viewport, OffsetDateTime::now_utc()).map_err(|e| e.to_string())?;
    let out = serde_json::to_string_pretty(&payload).map_err(|e| e.to_string())?;
    println!("{out}");
    Ok(ExitCode::SUCCESS)
}

fn stats(text: &str) -> Result<ExitCode, String> {
    let (graph, _) = load(text)?;
    let mut per_kind: BTreeMap<&'static str, usize> = BTreeMap::new();
    for kind in [
        NodeKind::Component,
        NodeKind::Text,
        NodeKind::Group,
        NodeKind::Shape,
    ] {
        per_kind.insert(kind.as_str(), 0);
    }
    for node in graph.nodes() {
        *per_kind.entry(node.kind().as_str()).or_default() += 1;
    }
    for (kind, count) in &per_kind {
        println!("{kind:<10} {count}");
    }
    println!("{:<10} {}", "edges", graph.edge_count());
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let path = cli.command.file();

    let text = match read_input(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("archcanvas: {e}");
            return ExitCode::FAILURE;
        }
    };
    log::debug!("read {} bytes from {}", text.len(), path.display());

    let result = match &cli.command {
        Command::Check { .. } => check(&text),
        Command::Fmt { .. } => fmt(&text),
        Command::Submit { .. } => submit(&text),
        Command::Stats { .. } => stats(&text),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("archcanvas {}: {e}", cli.command.name());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_subcommand_and_stdin_marker() {
        let cli = Cli::try_parse_from(["archcanvas", "check", "-"]).unwrap();
        assert_eq!(cli.command.name(), "check");
        assert_eq!(cli.command.file(), Path::new("-"));

        let cli = Cli::try_parse_from(["archcanvas", "stats", "diagram.json"]).unwrap();
        assert_eq!(cli.command.file(), Path::new("diagram.json"));
    }

    #[test]
    fn rejects_unknown_command_and_missing_file() {
        assert!(Cli::try_parse_from(["archcanvas", "render", "d.json"]).is_err());
        assert!(Cli::try_parse_from(["archcanvas", "fmt"]).is_err());
    }

    #[test]
    fn dangling_edge_is_rejected() {
        let text = r#"{"nodes": [{"id": "a", "type": "text", "position": {"x": 0, "y": 0},
            "data": {"text": "x"}}], "edges": [{"id": "e", "source": "a", "target": "gone"}]}"#;
        let diags = lint_document(&ac_core::document::parse_document(text).unwrap());
        assert!(lint::has_errors(&diags));
        assert!(check(text).is_ok());
        assert!(fmt(text).is_err());
        assert!(submit(text).is_err());
    }
}
