use crate::fs_runtime::FsRuntime;
use anyhow::{Context, Result, bail};
use clap::Args;
use pw_core::generator::{GeneratorConfig, regenerate};
use pw_core::id::{ElementTag, TagAllocator};
use pw_core::lint::{LintSeverity, lint_source};
use pw_core::render::mount;
use pw_core::scanner::{LayerTree, scan};
use pw_core::splice::{self, InsertionAnchor};
use pw_editor::sync::{EditOp, SyncConfig, SyncController};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Component source file
    pub input: PathBuf,

    /// Print the layer tree as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    pub input: PathBuf,

    /// Rewrite the file in place instead of printing
    #[arg(short, long)]
    pub write: bool,
}

#[derive(Args, Debug)]
pub struct InsertArgs {
    pub input: PathBuf,

    /// Fragment markup, or `@path` to read it from a file
    pub fragment: String,

    /// Tag of the element to insert into or near
    #[arg(short, long)]
    pub anchor: Option<String>,

    #[arg(short, long)]
    pub write: bool,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    pub input: PathBuf,

    /// Tag of the element to remove
    pub tag: String,

    #[arg(short, long)]
    pub write: bool,
}

#[derive(Args, Debug)]
pub struct LintArgs {
    pub input: PathBuf,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct TagArgs {
    pub input: PathBuf,

    /// Name to derive the tag from (e.g. "Primary Button")
    pub hint: String,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    pub input: PathBuf,

    /// Tag of the element to edit
    pub tag: String,

    /// `style.<prop>`, `textContent`, `id`, or `class`
    pub property: String,

    pub value: String,

    /// Seconds to wait for the reload
    #[arg(long, default_value_t = 5)]
    pub timeout: u64,
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

fn emit(path: &Path, text: &str, write: bool) -> Result<()> {
    if write {
        fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))?;
        log::info!("wrote {}", path.display());
    } else {
        print!("{text}");
    }
    Ok(())
}

pub fn scan_cmd(args: ScanArgs) -> Result<()> {
    let source = read(&args.input)?;
    let dom = mount(&source)?;
    let Some(layers) = scan(&dom).into_layers() else {
        if args.json {
            println!("[]");
        } else {
            println!("(no editable layers)");
        }
        return Ok(());
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&layers.snapshot())?);
    } else {
        print!("{}", layer_outline(&layers));
    }
    Ok(())
}

/// Indented outline of a layer tree, one layer per line.
pub fn layer_outline(layers: &LayerTree) -> String {
    let mut out = String::new();
    for layer in layers.iter() {
        out.push_str(&"  ".repeat(layer.depth));
        out.push_str(&layer.name);
        out.push_str(&format!(" <{}>", layer.element));
        if layer.name != layer.tag.as_str() {
            out.push_str(&format!(" #{}", layer.tag));
        }
        if !layer.visible {
            out.push_str(" [hidden]");
        }
        if layer.locked {
            out.push_str(" [locked]");
        }
        out.push('\n');
    }
    out
}

pub fn generate_cmd(args: GenerateArgs) -> Result<()> {
    let source = read(&args.input)?;
    let dom = mount(&source)?;
    let text = regenerate(&dom, &GeneratorConfig::from_source(&source))?;
    emit(&args.input, &text, args.write)
}

pub fn insert_cmd(args: InsertArgs) -> Result<()> {
    let source = read(&args.input)?;
    let fragment = match args.fragment.strip_prefix('@') {
        Some(path) => read(Path::new(path))?,
        None => args.fragment.clone(),
    };
    let hint = args.anchor.as_deref().map(ElementTag::intern);
    let inserted = splice::insert(&source, &fragment, hint)?;
    let rule = match inserted.anchor {
        InsertionAnchor::Container(t) => format!("into container {t}"),
        InsertionAnchor::Root(t) => format!("into a new container under {t}"),
        InsertionAnchor::TopLevel(Some(t)) => format!("into a new container under {t} (no root)"),
        InsertionAnchor::TopLevel(None) => "into a new container under the top element (no root)".to_string(),
        InsertionAnchor::Hint(t) => format!("into {t}"),
        InsertionAnchor::Synthesized => "into a new component".to_string(),
    };
    log::info!("inserted {} {rule}", inserted.tag);
    emit(&args.input, &inserted.source, args.write)
}

pub fn remove_cmd(args: RemoveArgs) -> Result<()> {
    let source = read(&args.input)?;
    let removed = splice::remove(&source, ElementTag::intern(&args.tag))?;
    log::info!("removed {} (lines {}-{})", args.tag, removed.first_line, removed.last_line);
    emit(&args.input, &removed.source, args.write)
}

/// Returns whether any error-level diagnostic was reported.
pub fn lint_cmd(args: LintArgs) -> Result<bool> {
    let source = read(&args.input)?;
    let diags = lint_source(&source);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&diags)?);
    } else {
        for d in &diags {
            let level = match d.severity {
                LintSeverity::Error => "error",
                LintSeverity::Warning => "warning",
                LintSeverity::Info => "info",
            };
            println!("{}:{}: {level}[{}]: {}", args.input.display(), d.line, d.rule, d.message);
        }
        if diags.is_empty() {
            println!("{}: no issues", args.input.display());
        }
    }
    Ok(diags.iter().any(|d| d.severity == LintSeverity::Error))
}

pub fn tag_cmd(args: TagArgs) -> Result<()> {
    let source = read(&args.input)?;
    let dom = mount(&source)?;
    let mut tags = TagAllocator::new();
    let tag = pw_core::assign_tag(&mut tags, Some(&dom), &args.hint)?;
    println!("{tag}");
    Ok(())
}

/// Apply one property edit through the full sync cycle on disk.
pub async fn edit_cmd(args: EditArgs) -> Result<()> {
    let (root, entry) = split_path(&args.input)?;
    let runtime = FsRuntime::open(&root, &entry).await?;
    let config = SyncConfig {
        ready_timeout: Duration::from_secs(args.timeout),
        ..SyncConfig::default()
    };
    let mut controller = SyncController::attach(runtime, &entry, config).await?;
    let status = controller
        .edit(EditOp::ApplyProperty {
            target: ElementTag::intern(&args.tag),
            property: args.property.clone(),
            value: args.value.clone(),
        })
        .await;
    if let Some(message) = status.message {
        bail!("{message}");
    }
    log::info!("{} now at generation {} ({:?})", entry, status.generation, status.state);
    if let Ok(selected) = controller.select(ElementTag::intern(&args.tag)) {
        println!("{} <{}>", selected.tag, selected.element);
        for (property, value) in &selected.styles {
            println!("  {property}: {value}");
        }
    }
    Ok(())
}

fn split_path(path: &Path) -> Result<(PathBuf, String)> {
    let entry = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("not a file path: {}", path.display()))?
        .to_string();
    let root = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((root, entry))
}
