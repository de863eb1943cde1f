//! vrscene CLI - export JSON scene descriptions to .vrscene files.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vrscene_export::core::BufferFormat;
use vrscene_export::scene::JsonScene;
use vrscene_export::schema::SchemaRegistry;
use vrscene_export::session::{ExportSession, ExportStatus};
use vrscene_export::settings::ExportSettings;

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            _ => filtered_args.push(arg),
        }
    }
    init_logging(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let result = match filtered_args[0] {
        "e" | "export" => cmd_export(&filtered_args[1..]),
        "s" | "schema" => cmd_schema(&filtered_args[1..]),
        "h" | "help" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_help();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn print_help() {
    println!("vrscene - incremental .vrscene exporter");
    println!();
    println!("USAGE:");
    println!("    vrscene [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    e, export <scene.json> <out.vrscene>   Export a scene");
    println!("    s, schema [PluginID]                   List plugins or show one plugin's attributes");
    println!("    h, help                                Show this help");
    println!();
    println!("EXPORT OPTIONS:");
    println!("    --animation          Export the frame range with keyframes");
    println!("    --start <f>          First frame");
    println!("    --end <f>            Last frame");
    println!("    --step <f>           Frame step");
    println!("    --zip                Compress geometry buffers");
    println!("    --separate           One file per output channel");
    println!("    --no-instancer       Export instances as separate nodes");
    println!("    --config <file>      Load settings from JSON (flags override)");
    println!("    --schema <file>      Merge extra plugin descriptions");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show errors");
    println!();
    println!("EXAMPLES:");
    println!("    vrscene export shot.json shot.vrscene");
    println!("    vrscene export shot.json shot.vrscene --animation --start 1 --end 48 --zip");
    println!("    vrscene schema LightOmni");
}

fn parse_frame(flag: &str, value: Option<&&str>) -> anyhow::Result<f64> {
    let Some(value) = value else {
        bail!("{} needs a value", flag);
    };
    value
        .parse()
        .with_context(|| format!("{} expects a number, got '{}'", flag, value))
}

fn load_schema(extra: Option<&Path>) -> anyhow::Result<SchemaRegistry> {
    let mut schema = SchemaRegistry::builtin().context("built-in plugin table")?;
    if let Some(path) = extra {
        let more = SchemaRegistry::load(path).with_context(|| format!("loading schema {}", path.display()))?;
        schema.merge(more);
    }
    Ok(schema)
}

fn cmd_export(args: &[&str]) -> anyhow::Result<()> {
    let mut positional = Vec::new();
    let mut config: Option<PathBuf> = None;
    let mut schema_path: Option<PathBuf> = None;
    let mut overrides: Vec<Box<dyn Fn(&mut ExportSettings)>> = Vec::new();

    let mut it = args.iter();
    while let Some(&arg) = it.next() {
        match arg {
            "--animation" => overrides.push(Box::new(|s: &mut ExportSettings| s.animation = true)),
            "--zip" => overrides.push(Box::new(|s: &mut ExportSettings| s.buffer_format = BufferFormat::Zip)),
            "--separate" => overrides.push(Box::new(|s: &mut ExportSettings| s.separate_files = true)),
            "--no-instancer" => overrides.push(Box::new(|s: &mut ExportSettings| s.use_instancer = false)),
            "--start" => {
                let f = parse_frame(arg, it.next())?;
                overrides.push(Box::new(move |s: &mut ExportSettings| s.frame_start = f));
            }
            "--end" => {
                let f = parse_frame(arg, it.next())?;
                overrides.push(Box::new(move |s: &mut ExportSettings| s.frame_end = f));
            }
            "--step" => {
                let f = parse_frame(arg, it.next())?;
                overrides.push(Box::new(move |s: &mut ExportSettings| s.frame_step = f));
            }
            "--config" => config = it.next().map(PathBuf::from),
            "--schema" => schema_path = it.next().map(PathBuf::from),
            _ if arg.starts_with("--") => bail!("unknown option {}", arg),
            _ => positional.push(arg),
        }
    }

    let [scene_path, out_path] = positional[..] else {
        bail!("usage: vrscene export <scene.json> <out.vrscene> [options]");
    };

    let mut settings = match &config {
        Some(path) => ExportSettings::load(path).with_context(|| format!("loading settings {}", path.display()))?,
        None => ExportSettings::default(),
    };
    for apply in &overrides {
        apply(&mut settings);
    }
    if settings.frame_end < settings.frame_start {
        settings.frame_end = settings.frame_start;
    }

    let schema = load_schema(schema_path.as_deref())?;
    let mut scene = JsonScene::load(scene_path).with_context(|| format!("loading scene {}", scene_path))?;
    info!("Exporting {} objects from {}", scene.len(), scene_path);

    let mut session = ExportSession::create(settings, schema, Path::new(out_path))?;
    let status = session.export(&mut scene)?;
    session.finish()?;

    match status {
        ExportStatus::Completed => info!("Wrote {}", out_path),
        ExportStatus::Interrupted => info!("Export interrupted, partial output in {}", out_path),
    }
    Ok(())
}

fn cmd_schema(args: &[&str]) -> anyhow::Result<()> {
    let schema = load_schema(None)?;
    let Some(id) = args.first() else {
        for id in schema.ids() {
            println!("{}", id);
        }
        return Ok(());
    };

    let Some(desc) = schema.lookup(id) else {
        bail!("unknown plugin {}", id);
    };
    println!("{} ({:?})", desc.id, desc.plugin_type);
    for attr in &desc.attributes {
        let skip = if attr.skip { "  [skip]" } else { "" };
        println!("    {:<28} {:?}{}", attr.name, attr.ty, skip);
    }
    Ok(())
}
