// Command-line inspector for snapshot files.
//
// Subcommands decode a snapshot file and print its records, its schema
// registry and its reconstructed object graph.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};

use crate::io::{DecodeStats, decode_file_with};
use crate::snapshot::{Record, Snapshot, SnapshotDecoder};
use crate::wire::registry::{ObjectModelNode, SchemaRegistry};
use crate::wire::state::{DEFAULT_MAX_DEPTH, DecodeOptions, RefScope};
use crate::wire::tag::TypeTag;
use crate::wire::tree::{Slot, ValueTree};

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Object-graph snapshot decoder.
#[derive(Parser, Debug)]
#[command(
    name = "snapwire",
    version,
    about = "Decode and inspect object-graph snapshot files",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Print records, schemas and value trees of a snapshot file.
    Inspect(InputArgs),
    /// Print the schema registry of a snapshot file.
    Schemas(InputArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RefScopeArg {
    Session,
    State,
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Snapshot file to decode.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Maximum object nesting depth.
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Where object references are resolved.
    #[arg(long, value_enum, default_value_t = RefScopeArg::State)]
    ref_scope: RefScopeArg,

    /// Accept array headers whose element flags disagree.
    #[arg(long)]
    no_verify_arrays: bool,
}

// ---------------------------------------------------------------------------
// Resolved options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Inspect,
    Schemas,
    Config,
}

struct Options {
    command: Command,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    input_file: Option<PathBuf>,
    decode: DecodeOptions,
}

fn decode_options(args: &InputArgs) -> DecodeOptions {
    DecodeOptions {
        max_depth: args.max_depth,
        ref_scope: match args.ref_scope {
            RefScopeArg::Session => RefScope::Session,
            RefScopeArg::State => RefScope::State,
        },
        verify_array_headers: !args.no_verify_arrays,
    }
}

fn resolve_options(cli: Cli) -> Options {
    let (command, input_file, decode) = match cli.command {
        Cmd::Inspect(args) => (Command::Inspect, Some(args.input.clone()), decode_options(&args)),
        Cmd::Schemas(args) => (Command::Schemas, Some(args.input.clone()), decode_options(&args)),
        Cmd::Config => (Command::Config, None, DecodeOptions::default()),
    };
    Options {
        command,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
        input_file,
        decode,
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn describe_node(node: &ObjectModelNode) -> String {
    let name = node.name.as_deref().unwrap_or("<anonymous>");
    let mut line = format!("{} {} {name:?}", node.id, node.data_type);
    if let Some(sub) = node.data_sub_type {
        line.push_str(&format!(" of {sub}"));
    }
    if let Some(children) = &node.children {
        let ids: Vec<String> = children.iter().map(|c| c.to_string()).collect();
        line.push_str(&format!(" [{}]", ids.join(", ")));
    }
    if node.is_type_primitive {
        line.push_str(" (primitive)");
    }
    line
}

fn write_schemas<W: Write>(out: &mut W, registry: &SchemaRegistry) -> io::Result<()> {
    writeln!(out, "schemas ({}):", registry.len())?;
    for node in registry.iter() {
        writeln!(out, "  {}", describe_node(node))?;
    }
    Ok(())
}

fn describe_record(record: &Record) -> String {
    match record {
        Record::Schema(id) => format!("schema {id}"),
        Record::Object { model, root } => format!("object {root} (schema {model})"),
        Record::Array {
            element_model,
            array,
        } => {
            let mut line = format!("array of {} x{}", array.element_type, array.elements.len());
            if let Some(model) = element_model {
                line.push_str(&format!(" (schema {model})"));
            }
            line
        }
        Record::Null { model: Some(model) } => format!("null (schema {model})"),
        Record::Null { model: None } => "null".to_string(),
    }
}

/// Field name for slot `i` of a tree, from its schema.
fn slot_name(registry: &SchemaRegistry, tree: &ValueTree, i: usize) -> String {
    tree.model_id
        .and_then(|m| registry.get(m))
        .and_then(|node| node.child_ids().get(i).copied())
        .and_then(|child| registry.get(child))
        .and_then(|child| child.name.clone())
        .unwrap_or_else(|| format!("[{i}]"))
}

fn write_slot<W: Write>(
    out: &mut W,
    snapshot: &Snapshot,
    registry: &SchemaRegistry,
    parent: usize,
    label: &str,
    slot: &Slot,
    indent: usize,
) -> io::Result<()> {
    let pad = "  ".repeat(indent);
    match slot {
        Slot::Null => writeln!(out, "{pad}{label} = null"),
        Slot::Value(v) => writeln!(out, "{pad}{label} = {v}"),
        Slot::Ref(id) => writeln!(out, "{pad}{label} -> {id}"),
        Slot::Object(id) => match snapshot.child_index(parent, *id) {
            Some(child) => {
                writeln!(out, "{pad}{label}:")?;
                write_tree(out, snapshot, registry, child, indent + 1)
            }
            None => writeln!(out, "{pad}{label} = {id} (missing)"),
        },
        Slot::Array(array) => {
            writeln!(
                out,
                "{pad}{label}: {}[{}]",
                array.element_type,
                array.elements.len()
            )?;
            for (i, element) in array.elements.iter().enumerate() {
                write_slot(
                    out,
                    snapshot,
                    registry,
                    parent,
                    &format!("[{i}]"),
                    element,
                    indent + 1,
                )?;
            }
            Ok(())
        }
    }
}

fn write_tree<W: Write>(
    out: &mut W,
    snapshot: &Snapshot,
    registry: &SchemaRegistry,
    index: usize,
    indent: usize,
) -> io::Result<()> {
    let tree = &snapshot.trees[index];
    let pad = "  ".repeat(indent);
    let model = tree
        .model_id
        .map_or_else(|| "?".to_string(), |m| m.to_string());
    writeln!(out, "{pad}{} (schema {model})", tree.id)?;
    for (i, slot) in tree.slots.iter().enumerate() {
        let label = slot_name(registry, tree, i);
        write_slot(out, snapshot, registry, index, &label, slot, indent + 1)?;
    }
    Ok(())
}

fn write_inspection<W: Write>(
    out: &mut W,
    snapshot: &Snapshot,
    registry: &SchemaRegistry,
) -> io::Result<()> {
    writeln!(out, "records ({}):", snapshot.records.len())?;
    for (i, record) in snapshot.records.iter().enumerate() {
        writeln!(out, "  [{i}] {}", describe_record(record))?;
    }
    write_schemas(out, registry)?;
    writeln!(out, "trees ({}):", snapshot.trees.len())?;
    for (index, tree) in snapshot.trees.iter().enumerate() {
        if tree.parent_id.is_none() {
            write_tree(out, snapshot, registry, index, 1)?;
        }
    }
    Ok(())
}

fn stats_json(command: &str, stats: &DecodeStats) -> serde_json::Value {
    serde_json::json!({
        "command": command,
        "input_size": stats.input_size,
        "records": stats.records,
        "schemas": stats.schemas,
        "trees": stats.trees,
        "sha256": stats.sha256_hex(),
    })
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_decode(opts: &Options) -> i32 {
    let Some(path) = &opts.input_file else {
        eprintln!("snapwire: missing input file");
        return 1;
    };
    let label = match opts.command {
        Command::Inspect => "inspect",
        _ => "schemas",
    };

    let mut decoder = SnapshotDecoder::with_options(opts.decode);
    let (snapshot, stats) = match decode_file_with(&mut decoder, path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("snapwire: {label}: {}: {e}", path.display());
            return 1;
        }
    };
    let registry = decoder.registry();

    if !opts.quiet {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let written = match opts.command {
            Command::Inspect => write_inspection(&mut out, &snapshot, registry),
            _ => write_schemas(&mut out, registry),
        };
        if let Err(e) = written.and_then(|()| out.flush()) {
            eprintln!("snapwire: {label}: write: {e}");
            return 1;
        }
    }

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "snapwire: {label}: {} bytes, {} records, {} schemas, {} trees",
            stats.input_size, stats.records, stats.schemas, stats.trees
        );
    }

    if opts.json_output {
        match serde_json::to_string_pretty(&stats_json(label, &stats)) {
            Ok(json) => eprintln!("{json}"),
            Err(e) => {
                eprintln!("snapwire: {label}: json: {e}");
                return 1;
            }
        }
    }

    0
}

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("snapwire version {version} (Rust)");

    let file_io = cfg!(feature = "file-io") as u8;
    let parallel = cfg!(feature = "parallel") as u8;
    let ptr_size = std::mem::size_of::<*const ()>();

    eprintln!("FILE_IO={file_io}");
    eprintln!("PARALLEL={parallel}");
    eprintln!("DEFAULT_MAX_DEPTH={DEFAULT_MAX_DEPTH}");
    eprintln!(
        "TAGS={}..={}",
        TypeTag::Byte.as_byte(),
        TypeTag::Unknown.as_byte()
    );
    eprintln!("sizeof(usize)={ptr_size}");

    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    let filter = match opts.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match opts.command {
        Command::Inspect | Command::Schemas => cmd_decode(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
