//! Command-line entry point.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::app::document::SourceDocument;
use crate::app::imports::{ImportEntry, add_import};
use crate::app::markers::{end_of, start_of};
use crate::app::report::ReportFormat;
use crate::app::session::ScaffoldSession;
use crate::app::wiring::NavEntry;
use crate::app::writer::{BatchPolicy, PendingFile};
use crate::domain::model::{DomainNames, RouteGroup};
use crate::infra::config::Config;

#[derive(Parser)]
#[command(author, version, about = "Merge generated code into hand-edited source files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the markers declared in a file
    Markers { file: PathBuf },
    /// Inject a fragment at a marker
    Inject(InjectArgs),
    /// Add an entry to a file's import list
    Import {
        file: PathBuf,
        path: String,
        #[arg(long)]
        alias: Option<String>,
        #[command(flatten)]
        save: SaveArgs,
    },
    /// Register a domain's model, dependencies, and routes
    Wire(WireArgs),
    /// Add a navigation menu entry to a layout
    Nav {
        file: PathBuf,
        #[arg(long)]
        label: String,
        #[arg(long)]
        href: String,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long, value_enum, default_value_t = RouteGroup::Authenticated)]
        group: RouteGroup,
        #[command(flatten)]
        save: SaveArgs,
    },
    /// Add an inverse has-many field to a parent model
    Relate {
        file: PathBuf,
        #[arg(long)]
        parent: String,
        #[command(flatten)]
        child: DomainArgs,
        #[command(flatten)]
        save: SaveArgs,
    },
    /// Write generated files, refusing to clobber existing ones
    Write(WriteArgs),
    /// Print shell completions
    Completions { shell: Shell },
}

#[derive(Args)]
struct SaveArgs {
    /// Print the resulting document instead of saving it
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct DomainArgs {
    #[arg(long)]
    model: String,
    #[arg(long)]
    alias: String,
    #[arg(long = "var")]
    var_name: String,
}

impl DomainArgs {
    fn names(&self) -> DomainNames {
        DomainNames::new(&self.model, &self.alias, &self.var_name)
    }
}

#[derive(Args)]
struct InjectArgs {
    file: PathBuf,
    /// Fragment text; use `-` to read it from stdin
    #[arg(long)]
    fragment: String,
    /// Block name whose START/END markers surround the insertion point
    #[arg(long, conflicts_with_all = ["after", "before"], required_unless_present_any = ["after", "before"])]
    block: Option<String>,
    /// Replace the block's interior instead of appending to it
    #[arg(long, requires = "block")]
    replace: bool,
    #[arg(long, conflicts_with = "before")]
    after: Option<String>,
    #[arg(long)]
    before: Option<String>,
    #[command(flatten)]
    save: SaveArgs,
}

#[derive(Args)]
struct WireArgs {
    file: PathBuf,
    #[command(flatten)]
    domain: DomainArgs,
    #[arg(long, value_enum, default_value_t = RouteGroup::Authenticated)]
    group: RouteGroup,
    /// Related domain as `Model:alias:var`; repeatable
    #[arg(long = "relation", value_parser = parse_relation)]
    relations: Vec<DomainNames>,
    #[command(flatten)]
    save: SaveArgs,
}

#[derive(Args)]
struct WriteArgs {
    /// Files to write as `TARGET=SOURCE`
    #[arg(required = true, value_parser = parse_pending)]
    files: Vec<(PathBuf, PathBuf)>,
    #[arg(long)]
    force: bool,
    #[arg(long)]
    dry_run: bool,
    #[arg(long, value_enum)]
    batch_policy: Option<BatchPolicy>,
    #[arg(long, value_enum)]
    format: Option<ReportFormat>,
}

fn parse_relation(raw: &str) -> Result<DomainNames, String> {
    match raw.split(':').collect::<Vec<_>>().as_slice() {
        [model, alias, var] if !model.is_empty() && !alias.is_empty() && !var.is_empty() => {
            Ok(DomainNames::new(*model, *alias, *var))
        }
        _ => Err(format!("expected Model:alias:var, got '{raw}'")),
    }
}

fn parse_pending(raw: &str) -> Result<(PathBuf, PathBuf), String> {
    match raw.split_once('=') {
        Some((target, source)) if !target.is_empty() && !source.is_empty() => {
            Ok((PathBuf::from(target), PathBuf::from(source)))
        }
        _ => Err(format!("expected TARGET=SOURCE, got '{raw}'")),
    }
}

/// Parse arguments, run the command, and map conflicts to a failing exit status.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::load()?;
    let session = ScaffoldSession::from_config(&config)?;
    execute(cli.command, session)
}

fn execute(command: Commands, session: ScaffoldSession) -> Result<ExitCode> {
    match command {
        Commands::Markers { file } => {
            let doc = session.open_document(&file)?;
            for name in doc.locator().list(doc.content()) {
                println!("{name}");
            }
        }
        Commands::Inject(args) => {
            let fragment = read_fragment(&args.fragment)?;
            let mut doc = session.open_document(&args.file)?;
            let injection = match (&args.block, &args.after, &args.before) {
                (Some(block), _, _) if args.replace => {
                    doc.replace_between(&start_of(block), &end_of(block), &fragment)?
                }
                (Some(block), _, _) => {
                    doc.inject_between(&start_of(block), &end_of(block), &fragment)?
                }
                (None, Some(marker), _) => doc.inject_after(marker, &fragment)?,
                (None, None, Some(marker)) => doc.inject_before(marker, &fragment)?,
                (None, None, None) => return Err(anyhow!("no injection point given")),
            };
            finish_document(doc, injection.changed(), &args.save)?;
        }
        Commands::Import {
            file,
            path,
            alias,
            save,
        } => {
            let entry = match alias {
                Some(alias) => ImportEntry::aliased(path, alias),
                None => ImportEntry::new(path),
            };
            let mut doc = session.open_document(&file)?;
            let injection = add_import(&mut doc, &entry)?;
            finish_document(doc, injection.changed(), &save)?;
        }
        Commands::Wire(args) => {
            let mut doc = session.open_document(&args.file)?;
            let report = session.wiring().wire_domain(
                &mut doc,
                &args.domain.names(),
                &args.relations,
                args.group,
            )?;
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize wiring report")?
            );
            finish_document(doc, report.changed(), &args.save)?;
        }
        Commands::Nav {
            file,
            label,
            href,
            icon,
            group,
            save,
        } => {
            let mut entry = NavEntry::new(label, href);
            entry.icon = icon;
            let mut doc = session.open_document(&file)?;
            let injection = session.wiring().add_nav_item(&mut doc, &entry, group)?;
            finish_document(doc, injection.changed(), &save)?;
        }
        Commands::Relate {
            file,
            parent,
            child,
            save,
        } => {
            let mut doc = session.open_document(&file)?;
            let injection = session
                .wiring()
                .add_relationship(&mut doc, &parent, &child.names())?;
            finish_document(doc, injection.changed(), &save)?;
        }
        Commands::Write(args) => return write(args, session),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "scaffold", &mut io::stdout());
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn write(args: WriteArgs, session: ScaffoldSession) -> Result<ExitCode> {
    let mut files = Vec::with_capacity(args.files.len());
    for (target, source) in &args.files {
        let content = fs::read_to_string(source)
            .with_context(|| format!("failed to read generated content from {}", source.display()))?;
        files.push(PendingFile::new(target, content));
    }

    let mut options = session.options();
    options.force |= args.force;
    options.dry_run |= args.dry_run;
    if let Some(policy) = args.batch_policy {
        options.batch_policy = policy;
    }
    let mut session = session.with_options(options);
    if let Some(format) = args.format {
        session = session.with_report_format(format);
    }

    let outcome = session.write_files(&files)?;
    println!("{}", outcome.to_json()?);
    Ok(if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn read_fragment(raw: &str) -> Result<String> {
    if raw == "-" {
        return io::read_to_string(io::stdin()).context("failed to read fragment from stdin");
    }
    Ok(raw.to_owned())
}

fn finish_document(mut doc: SourceDocument, changed: bool, save: &SaveArgs) -> Result<()> {
    if save.dry_run {
        print!("{}", doc.content());
        return Ok(());
    }
    if changed {
        doc.save()?;
    }
    if let Some(path) = doc.path() {
        tracing::info!(path = %path.display(), changed, "document processed");
    }
    Ok(())
}
