//! xur CLI - Tool for inspecting, verifying and converting XUR files.

use std::env;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use xur::model::{XuObject, XuPropertyValue, XuValue};
use xur::schema::Schema;
use xur::xur::{
    sniff_file, Generation, ReadOptions, Sniffed, VerifyMode, WriteOptions, XurDocument, XurReader, XurWriter,
};

/// Log filter for each verbosity flag.
const LOG_QUIET: &str = "error";
const LOG_DEBUG: &str = "xur=debug";
const LOG_TRACE: &str = "xur=trace";
const LOG_DEFAULT: &str = "warn";

struct Globals {
    /// Extension XML loaded on top of the built-in classes.
    schema: Option<String>,
    strict: bool,
}

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level: Option<&str> = None;
    let mut globals = Globals { schema: None, strict: false };
    let mut filtered_args: Vec<&str> = Vec::new();
    let mut iter = args[1..].iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => level = Some(LOG_DEBUG),
            "-vv" | "--trace" => level = Some(LOG_TRACE),
            "-q" | "--quiet" => level = Some(LOG_QUIET),
            "--strict" => globals.strict = true,
            "-s" | "--schema" => match iter.next() {
                Some(path) => globals.schema = Some(path.clone()),
                None => {
                    eprintln!("Error: --schema needs a file argument");
                    std::process::exit(1);
                }
            },
            _ => filtered_args.push(arg),
        }
    }
    init_logging(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let result = match filtered_args[0] {
        "info" | "i" => with_file(&filtered_args, "info <file.xur>", |path| cmd_info(&globals, path)),
        "tree" | "t" => with_file(&filtered_args, "tree <file.xur>", |path| cmd_tree(&globals, path)),
        "dump" | "d" => {
            let json_mode = filtered_args.iter().any(|&s| s == "--json" || s == "-j");
            let rest: Vec<&str> = filtered_args.iter().copied().filter(|&s| s != "--json" && s != "-j").collect();
            with_file(&rest, "dump <file.xur> [--json]", |path| cmd_dump(&globals, path, json_mode))
        }
        "verify" | "check" => {
            if filtered_args.len() < 2 {
                usage("verify <file.xur>...")
            } else {
                cmd_verify(&globals, &filtered_args[1..])
            }
        }
        "convert" | "c" => {
            let target = if filtered_args.contains(&"--v5") {
                Some(Generation::V5)
            } else if filtered_args.contains(&"--v8") {
                Some(Generation::V8)
            } else {
                None
            };
            let files: Vec<&str> = filtered_args[1..].iter().copied().filter(|s| !s.starts_with("--")).collect();
            if files.len() < 2 {
                usage("convert <in.xur> <out.xur> [--v5|--v8]")
            } else {
                cmd_convert(&globals, files[0], files[1], target)
            }
        }
        "sniff" => {
            if filtered_args.len() < 2 {
                usage("sniff <file>...")
            } else {
                cmd_sniff(&filtered_args[1..])
            }
        }
        "version" | "--version" | "-V" => {
            println!("xur {} ({})", env!("CARGO_PKG_VERSION"), env!("XUR_BUILD_DATE"));
            Ok(())
        }
        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        // Default: if file exists, show info; otherwise error
        other => {
            if Path::new(other).exists() {
                cmd_info(&globals, other)
            } else {
                eprintln!("Unknown command: {other}");
                eprintln!();
                print_help();
                std::process::exit(1);
            }
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(LOG_DEFAULT)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn usage(text: &str) -> Result<()> {
    bail!("missing arguments\nUsage: xur {text}")
}

fn with_file(args: &[&str], text: &str, run: impl FnOnce(&str) -> Result<()>) -> Result<()> {
    match args.get(1) {
        Some(&path) => run(path),
        None => usage(text),
    }
}

fn print_help() {
    println!("xur - XUR compiled UI toolkit");
    println!();
    println!("USAGE:");
    println!("    xur [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    i, info    <file>                  Show header, sections, pools and counts");
    println!("    t, tree    <file>                  Show the object tree with properties");
    println!("    d, dump    <file> [--json]         Dump pools, or the whole document as JSON");
    println!("    verify     <files...>              Decode, check counts and round-trip (parallel)");
    println!("    c, convert <in> <out> [--v5|--v8]  Re-encode as another generation (default V8)");
    println!("    sniff      <files...>              Detect XUR generation or XUI 12 source");
    println!("    version                            Show version and build date");
    println!("    h, help                            Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose         Show debug output");
    println!("    -vv, --trace          Show trace output (very verbose)");
    println!("    -q, --quiet           Only show errors");
    println!("    -s, --schema <xml>    Load extension classes on top of the built-in set");
    println!("    --strict              Fail on count header or string table mismatches");
    println!();
    println!("EXAMPLES:");
    println!("    xur info menu.xur                     # Quick overview");
    println!("    xur tree menu.xur                     # See hierarchy");
    println!("    xur dump menu.xur --json              # Export the tree as JSON");
    println!("    xur verify skins/*.xur                # Batch check");
    println!("    xur convert old.xur new.xur --v8      # Upgrade a V5 file");
    println!();
    println!("NOTES:");
    println!("    - Passing a .xur file directly is equivalent to 'info'");
    println!("    - RUST_LOG is honoured unless -v, -vv or -q is given");
}

// ============================================================================
// Helpers
// ============================================================================

fn load_schema(globals: &Globals) -> Result<Schema> {
    let mut schema = Schema::builtin().context("loading built-in classes")?;
    if let Some(path) = &globals.schema {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
        schema.load_xml(&text).with_context(|| format!("loading {path}"))?;
    }
    tracing::debug!(classes = schema.len(), "schema ready");
    Ok(schema)
}

fn read_options(globals: &Globals) -> ReadOptions {
    let verify = if globals.strict { VerifyMode::Strict } else { VerifyMode::Warn };
    ReadOptions::new().verify(verify).strict_strings(globals.strict)
}

fn open(globals: &Globals, schema: &Schema, path: &str) -> Result<XurDocument> {
    XurReader::with_options(schema, read_options(globals))
        .read_file(path)
        .with_context(|| format!("failed to read {path}"))
}

fn format_value(value: &XuValue) -> String {
    match value {
        XuValue::Bool(b) => b.to_string(),
        XuValue::Integer(i) => i.to_string(),
        XuValue::Unsigned(u) => u.to_string(),
        XuValue::String(s) => format!("{s:?}"),
        XuValue::Float(f) => f.to_string(),
        XuValue::Vector(v) => format!("({}, {}, {})", v.x, v.y, v.z),
        XuValue::Quaternion(q) => format!("({}, {}, {}, {})", q.x, q.y, q.z, q.w),
        XuValue::Colour(c) => format!("#{:08X}", c.to_argb()),
        XuValue::Custom(fig) => format!("figure[{} points]", fig.points.len()),
        XuValue::Object(props) => {
            let inner: Vec<String> =
                props.iter().map(|p| format!("{}: {}", p.name(), format_property_value(&p.value))).collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

fn format_property_value(value: &XuPropertyValue) -> String {
    match value {
        XuPropertyValue::Single(v) => format_value(v),
        XuPropertyValue::Indexed(vs) => {
            let inner: Vec<String> = vs.iter().map(format_value).collect();
            format!("[{}]", inner.join(", "))
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_info(globals: &Globals, path: &str) -> Result<()> {
    let schema = load_schema(globals)?;
    let doc = open(globals, &schema, path)?;

    println!("File: {path}");
    println!("Generation: {} (version {})", doc.generation, doc.header.version);
    println!("Tool version: {:#06x}", doc.header.tool_version);
    println!("Flags: {:#x}", doc.header.flags);
    println!("Size: {} bytes", doc.header.file_size);
    println!();

    println!("Sections ({}):", doc.sections.len());
    for entry in doc.sections.entries() {
        println!("  {}  offset {:#08x}  {} bytes", entry.name(), entry.offset, entry.length);
    }
    println!();

    let v = &doc.values;
    println!("Pools:");
    println!("  Strings:     {}", v.strings.len());
    println!("  Vectors:     {}", v.vectors.len());
    println!("  Quaternions: {}", v.quaternions.len());
    println!("  Colours:     {}", v.colours.len());
    println!("  Floats:      {}", v.floats.len());
    println!("  Figures:     {}", v.figures.len());
    println!("  Keyframe values: {}", doc.animation.keyframe_values.len());
    println!("  Keyframes:       {}", doc.animation.keyframes.len());
    println!("  Named frames:    {}", doc.animation.named_frames.len());
    println!();

    match &doc.counts {
        Some(counts) => {
            println!("Count header:");
            for (name, value) in counts.fields(doc.generation) {
                println!("  {name:<30} {value}");
            }
        }
        None => println!("Count header: none"),
    }
    println!();
    println!("Total objects: {}", doc.root.object_count());
    Ok(())
}

fn cmd_tree(globals: &Globals, path: &str) -> Result<()> {
    let schema = load_schema(globals)?;
    let doc = open(globals, &schema, path)?;
    println!("File: {path}");
    println!();
    print_tree(&doc.root, 0);
    Ok(())
}

fn print_tree(obj: &XuObject, depth: usize) {
    let indent = "  ".repeat(depth);
    let class = if obj.class_name.is_empty() { "<root>" } else { obj.class_name.as_str() };
    match obj.id() {
        Some(id) => println!("{indent}{class} \"{id}\""),
        None => println!("{indent}{class}"),
    }
    for prop in &obj.properties {
        println!("{indent}  .{} = {}", prop.name(), format_property_value(&prop.value));
    }
    for frame in &obj.named_frames {
        match &frame.target {
            Some(target) => println!("{indent}  @{} {} {:?} -> {target}", frame.frame, frame.name, frame.command),
            None => println!("{indent}  @{} {} {:?}", frame.frame, frame.name, frame.command),
        }
    }
    for timeline in &obj.timelines {
        let paths: Vec<String> = timeline.properties.iter().map(|p| p.display_path()).collect();
        println!(
            "{indent}  ~{} [{}] {} keyframes",
            timeline.element_name,
            paths.join(", "),
            timeline.keyframes.len()
        );
    }
    for child in &obj.children {
        print_tree(child, depth + 1);
    }
}

fn cmd_dump(globals: &Globals, path: &str, json_mode: bool) -> Result<()> {
    let schema = load_schema(globals)?;
    let doc = open(globals, &schema, path)?;

    if json_mode {
        let json = serde_json::json!({
            "file": path,
            "generation": doc.generation,
            "header": doc.header,
            "sections": doc.sections.entries(),
            "counts": doc.counts,
            "animation": doc.animation,
            "root": doc.root,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("File: {path}");
    println!();
    let v = &doc.values;
    println!("STRN ({}):", v.strings.len());
    for (i, s) in v.strings.iter().enumerate() {
        println!("  [{}] {s:?}", i + 1);
    }
    println!("VECT ({}):", v.vectors.len());
    for (i, x) in v.vectors.iter().enumerate() {
        println!("  [{i}] {}", format_value(&XuValue::Vector(*x)));
    }
    println!("QUAT ({}):", v.quaternions.len());
    for (i, x) in v.quaternions.iter().enumerate() {
        println!("  [{i}] {}", format_value(&XuValue::Quaternion(*x)));
    }
    println!("COLR ({}):", v.colours.len());
    for (i, x) in v.colours.iter().enumerate() {
        println!("  [{i}] {}", format_value(&XuValue::Colour(*x)));
    }
    println!("FLOT ({}):", v.floats.len());
    for (i, x) in v.floats.iter().enumerate() {
        println!("  [{i}] {x}");
    }
    println!("CUST ({} figures, {} bytes)", v.figures.len(), v.figures.byte_len());
    println!("KEYP ({}): {:?}", doc.animation.keyframe_values.len(), doc.animation.keyframe_values);
    println!("KEYD ({}):", doc.animation.keyframes.len());
    for (i, d) in doc.animation.keyframes.iter().enumerate() {
        println!("  [{i}] frame {} {:?} -> KEYP {}", d.frame, d.interpolation, d.keyp_base);
    }
    println!("NAME ({}):", doc.animation.named_frames.len());
    for (i, d) in doc.animation.named_frames.iter().enumerate() {
        println!("  [{i}] frame {} {:?}", d.frame, d.command);
    }
    for section in &doc.opaque {
        println!("{} (opaque, {} bytes)", section.name(), section.data.len());
    }
    Ok(())
}

fn cmd_verify(globals: &Globals, paths: &[&str]) -> Result<()> {
    let schema = load_schema(globals)?;
    let options = ReadOptions::new().verify(VerifyMode::Strict).strict_strings(globals.strict);

    let results: Vec<(&str, Result<usize>)> = paths
        .par_iter()
        .map(|&path| {
            let result = (|| -> Result<usize> {
                let doc = XurReader::with_options(&schema, options.clone()).read_file(path)?;
                let write = WriteOptions::new().generation(doc.generation).verify(true);
                XurWriter::with_options(&schema, write).write_document(&doc)?;
                Ok(doc.root.object_count())
            })();
            (path, result)
        })
        .collect();

    let mut failed = 0;
    for (path, result) in &results {
        match result {
            Ok(objects) => println!("OK    {path} ({objects} objects)"),
            Err(e) => {
                failed += 1;
                println!("FAIL  {path}: {e:#}");
            }
        }
    }
    println!();
    println!("{} checked, {} failed", results.len(), failed);
    if failed > 0 {
        bail!("{failed} file(s) failed verification");
    }
    Ok(())
}

fn cmd_convert(globals: &Globals, input: &str, output: &str, target: Option<Generation>) -> Result<()> {
    let schema = load_schema(globals)?;
    let doc = open(globals, &schema, input)?;
    let generation = target.unwrap_or(Generation::V8);
    let options = WriteOptions::new()
        .generation(generation)
        .tool_version(doc.header.tool_version)
        .verify(true);
    let bytes = XurWriter::with_options(&schema, options)
        .write_document(&doc)
        .with_context(|| format!("failed to encode {input} as {generation}"))?;
    std::fs::write(output, &bytes).with_context(|| format!("failed to write {output}"))?;
    println!("{input} ({}) -> {output} ({generation}, {} bytes)", doc.generation, bytes.len());
    Ok(())
}

fn cmd_sniff(paths: &[&str]) -> Result<()> {
    for path in paths {
        let kind = match sniff_file(path).with_context(|| format!("failed to read {path}"))? {
            Sniffed::Xur(generation) => format!("XUR {generation}"),
            Sniffed::XurUnsupported(version) => format!("XUR (unsupported version {version})"),
            Sniffed::Xui12 => "XUI 12 source".to_string(),
            Sniffed::Unknown => "unknown".to_string(),
        };
        println!("{path}: {kind}");
    }
    Ok(())
}
