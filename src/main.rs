use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use srctree::config::{load_from_path, load_or_default};
use srctree::tree::{ImportField, ImportGroups, ImportRecord};
use srctree::{FindResult, Node, Pattern, ReplaceOptions, SearchOptions, TreeBuilder, TreeConfig, WriteSummary};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "srctree")]
#[command(about = "Navigate, search and rewrite source trees line by line", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./srctree.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PatternArgs {
    /// Pattern to search for
    pattern: String,

    /// Treat `{}` as a marker that skips a balanced bracket span
    #[arg(short, long)]
    smart: bool,

    /// Match whole words only
    #[arg(short, long)]
    word: bool,

    /// Case-insensitive matching
    #[arg(short, long)]
    ignore_case: bool,

    /// Match the pattern text literally
    #[arg(short = 'F', long)]
    literal: bool,

    /// Let `.` and bracket spans cross newlines
    #[arg(long)]
    dotall: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List every line matching a pattern
    Find {
        #[command(flatten)]
        pattern: PatternArgs,

        /// File or directory to search
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Only search below this dotted name
        #[arg(short, long)]
        target: Option<String>,

        /// Emit one JSON object per finding
        #[arg(long)]
        json: bool,
    },

    /// Replace a pattern across a tree (preview unless --apply)
    Replace {
        #[command(flatten)]
        pattern: PatternArgs,

        /// Replacement text, inserted literally
        replacement: String,

        /// File or directory to rewrite
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Only rewrite below this dotted name
        #[arg(short, long)]
        target: Option<String>,

        /// Write the changes
        #[arg(short, long)]
        apply: bool,

        /// Show a unified diff of the changes
        #[arg(short, long)]
        diff: bool,

        /// Write to `_copy` siblings instead of in place
        #[arg(long)]
        copy: bool,
    },

    /// Print the node hierarchy
    Tree {
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Maximum depth to print
        #[arg(short, long)]
        depth: Option<usize>,
    },

    /// Print one node's source and location
    Show {
        /// Dotted or slash-separated name, relative to PATH
        target: String,

        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// List import statements
    Imports {
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Group by field (owner, module, name, alias, type-checking); repeatable
        #[arg(short, long = "by", value_parser = parse_import_field)]
        by: Vec<ImportField>,

        /// Drop duplicate imports
        #[arg(short, long)]
        unique: bool,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = load_config(cli.config)?;
    let builder = TreeBuilder::from_config(&config);

    match cli.command {
        Commands::Find {
            pattern,
            path,
            target,
            json,
        } => cmd_find(&builder, &config, &pattern, path, target, json),

        Commands::Replace {
            pattern,
            replacement,
            path,
            target,
            apply,
            diff,
            copy,
        } => cmd_replace(
            &builder,
            &config,
            &pattern,
            &replacement,
            path,
            target,
            ReplaceMode { apply, diff, copy },
        ),

        Commands::Tree { path, depth } => cmd_tree(&builder, path, depth),

        Commands::Show { target, path } => cmd_show(&builder, path, &target),

        Commands::Imports { path, by, unique } => cmd_imports(&builder, path, &by, unique),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("SRCTREE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Explicit --config first, then the nearest srctree.toml upwards, then defaults.
fn load_config(path: Option<PathBuf>) -> Result<TreeConfig> {
    let config = match path {
        Some(path) => load_from_path(&path)?,
        None => load_or_default(env::current_dir()?)?,
    };
    Ok(config)
}

fn parse_import_field(value: &str) -> Result<ImportField, String> {
    match value {
        "owner" => Ok(ImportField::Owner),
        "module" | "source" => Ok(ImportField::SourceModule),
        "name" => Ok(ImportField::ImportedName),
        "alias" => Ok(ImportField::Alias),
        "type-checking" => Ok(ImportField::TypeCheckingOnly),
        other => Err(format!(
            "unknown field '{other}' (expected owner, module, name, alias or type-checking)"
        )),
    }
}

/// Command-line switches override the `[search]` table.
fn search_options(config: &TreeConfig, args: &PatternArgs) -> SearchOptions {
    let base = config.search;
    SearchOptions {
        whole_word: base.whole_word || args.word,
        case_sensitive: base.case_sensitive && !args.ignore_case,
        regex: base.regex && !args.literal,
        dotall: base.dotall || args.dotall,
    }
}

fn compile(args: &PatternArgs) -> Result<Pattern> {
    let pattern = if args.smart {
        Pattern::smart(&args.pattern)
    } else {
        Pattern::regex(&args.pattern)
    };
    pattern.with_context(|| format!("invalid pattern '{}'", args.pattern))
}

fn open_target(builder: &TreeBuilder, path: PathBuf, target: Option<&str>) -> Result<Arc<Node>> {
    let root = builder
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    match target {
        Some(name) => Ok(root.jumpto(name)?),
        None => Ok(root),
    }
}

fn cmd_find(
    builder: &TreeBuilder,
    config: &TreeConfig,
    args: &PatternArgs,
    path: PathBuf,
    target: Option<String>,
    json: bool,
) -> Result<()> {
    let pattern = compile(args)?;
    let root = open_target(builder, path, target.as_deref())?;
    let mut found = root.find_all(&pattern, &search_options(config, args))?;
    found.sort();

    if json {
        for f in &found {
            let record = serde_json::json!({
                "node": f.node.absolute_name(),
                "kind": f.node.kind().as_str(),
                "path": f.path(),
                "line": f.line_number,
                "text": f.line_text,
            });
            println!("{record}");
        }
        return Ok(());
    }

    print_findings(&found);
    println!(
        "\n{}",
        format!("{} matching line(s)", found.len()).dimmed()
    );
    Ok(())
}

struct ReplaceMode {
    apply: bool,
    diff: bool,
    copy: bool,
}

fn cmd_replace(
    builder: &TreeBuilder,
    config: &TreeConfig,
    args: &PatternArgs,
    replacement: &str,
    path: PathBuf,
    target: Option<String>,
    mode: ReplaceMode,
) -> Result<()> {
    let pattern = compile(args)?;
    let root = open_target(builder, path, target.as_deref())?;
    let options = ReplaceOptions {
        search: search_options(config, args),
        overwrite: !mode.copy,
        based_on: None,
    };
    let mut tx = root.replace(&pattern, replacement, &options)?;

    if tx.is_empty() {
        println!("{}", "No matches.".yellow());
        return Ok(());
    }

    if mode.diff {
        print_diff(&tx.diff());
    } else {
        print_findings(&tx.preview()?);
    }

    println!(
        "\n{}",
        format!("{} replacement(s) in {} file(s)", tx.count(), tx.len()).bold()
    );

    if !mode.apply {
        println!("{}", "Preview only; pass --apply to write.".dimmed());
        return Ok(());
    }

    let summary = tx.confirm()?;
    print_summary(&summary);
    if !summary.is_clean() {
        anyhow::bail!("{} file(s) could not be written", summary.failed.len());
    }
    Ok(())
}

fn cmd_tree(builder: &TreeBuilder, path: PathBuf, depth: Option<usize>) -> Result<()> {
    let root = open_target(builder, path, None)?;
    print_node(&root, 0, depth.unwrap_or(usize::MAX));
    Ok(())
}

fn print_node(node: &Arc<Node>, level: usize, max_depth: usize) {
    let indent = "  ".repeat(level);
    let location = if node.is_dir() {
        String::new()
    } else {
        format!(" :{}", node.start_line())
    };
    println!(
        "{indent}{} {}{}",
        node.name().bold(),
        format!("[{}]", node.kind()).cyan(),
        location.dimmed()
    );
    if level >= max_depth {
        return;
    }
    for child in node.children() {
        print_node(child, level + 1, max_depth);
    }
}

fn cmd_show(builder: &TreeBuilder, path: PathBuf, target: &str) -> Result<()> {
    let root = open_target(builder, path, None)?;
    let node = root.jumpto(target)?;

    let location = node
        .relative_path()
        .map(|p| format!("{}:{}", p.display(), node.start_line()))
        .unwrap_or_else(|| format!("line {}", node.start_line()));
    println!("{} {}", node.to_string().bold(), location.dimmed());

    let summary = node.doc().summary();
    if !summary.is_empty() {
        println!("{}", summary.italic());
    }
    println!();

    let width = node.end_line().to_string().len();
    let padding = " ".repeat(node.indent_offset());
    for (offset, line) in node.text().lines().enumerate() {
        let number = format!("{:>width$}", node.start_line() + offset);
        println!("{} {padding}{line}", number.dimmed());
    }
    Ok(())
}

fn cmd_imports(builder: &TreeBuilder, path: PathBuf, by: &[ImportField], unique: bool) -> Result<()> {
    let root = open_target(builder, path, None)?;
    let imports = root.imports();
    let records: Vec<ImportRecord> = if unique {
        imports.unique()
    } else {
        imports.records().to_vec()
    };

    if by.is_empty() {
        for record in &records {
            print_import(record, 0);
        }
        return Ok(());
    }

    let grouped = srctree::tree::Imports::from(records).group_by(by);
    print_groups(&grouped, 0);
    Ok(())
}

fn print_groups(groups: &ImportGroups, level: usize) {
    match groups {
        ImportGroups::Records(records) => {
            for record in records {
                print_import(record, level);
            }
        }
        ImportGroups::Groups(map) => {
            for (key, inner) in map {
                println!("{}{}", "  ".repeat(level), key.to_string().bold());
                print_groups(inner, level + 1);
            }
        }
    }
}

fn print_import(record: &ImportRecord, level: usize) {
    let mut line = match &record.source_module {
        Some(module) => format!("from {module} import {}", record.imported_name),
        None => format!("import {}", record.imported_name),
    };
    if let Some(alias) = &record.alias {
        line.push_str(&format!(" as {alias}"));
    }
    let guard = if record.type_checking_only {
        " (TYPE_CHECKING)".yellow().to_string()
    } else {
        String::new()
    };
    println!(
        "{}{}  {}{guard}",
        "  ".repeat(level),
        line,
        record.owner.dimmed()
    );
}

fn print_findings(found: &FindResult) {
    let mut current: Option<String> = None;
    for f in found {
        let header = f
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| f.node.absolute_name().to_string());
        if current.as_deref() != Some(header.as_str()) {
            println!("\n{}", header.bold());
            current = Some(header);
        }
        println!(
            "{:>6}  {}  {}",
            f.line_number.to_string().dimmed(),
            highlight(&f.line_text, &f.spans()),
            f.node.relative_name().cyan()
        );
    }
}

fn highlight(line: &str, spans: &[std::ops::Range<usize>]) -> String {
    let mut out = String::with_capacity(line.len());
    let mut last = 0;
    for span in spans {
        out.push_str(&line[last..span.start]);
        out.push_str(&line[span.clone()].red().bold().to_string());
        last = span.end;
    }
    out.push_str(&line[last..]);
    out
}

fn print_diff(diff: &str) {
    for line in diff.lines() {
        let colored = if line.starts_with("+++") || line.starts_with("---") {
            line.dimmed()
        } else if line.starts_with('+') {
            line.green()
        } else if line.starts_with('-') {
            line.red()
        } else if line.starts_with("@@") {
            line.cyan()
        } else {
            line.normal()
        };
        println!("{colored}");
    }
}

fn print_summary(summary: &WriteSummary) {
    for path in &summary.successful {
        println!("{} {}", "✓".green(), path.display());
    }
    for failure in &summary.failed {
        println!(
            "{} {} ({})",
            "✗".red(),
            failure.path.display(),
            failure.reason
        );
    }
    println!(
        "\n{}: {} written, {} failed",
        "Summary".bold(),
        summary.successful.len(),
        summary.failed.len()
    );
}
