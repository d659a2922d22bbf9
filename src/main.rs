//! canvas – command-line report exporter.
//!
//! Usage:
//!   canvas <document.json> [output.pdf] [--landscape] [--title "Relatório"]
//!          [--scale 2] [--api URL] [--job ID]
//!   canvas --list-charts [--api URL] [--job ID]
//!
//! If `output.pdf` is omitted the PDF is written next to the input file with
//! the same stem (e.g. `report.json` → `report.pdf`). Library charts and
//! remote images are downloaded from the backend before rasterizing; without
//! a job id library charts export as placeholders.

use std::{env, fs, path::PathBuf, process};

use report_canvas::config::EditorConfig;
use report_canvas::document::Document;
use report_canvas::editor::Editor;
use report_canvas::library::{prefetch_assets, LibraryClient};
use report_canvas::pipeline::{ExportConfig, PageOrientation};
use report_canvas::raster::SoftwareRasterizer;

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut input_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut landscape = false;
    let mut list_charts = false;
    let mut title: Option<String> = None;
    let mut scale: Option<f32> = None;
    let mut config = EditorConfig::from_env();
    let mut positional = 0usize;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--landscape" | "-l" => landscape = true,
            "--list-charts" => list_charts = true,
            "--title" | "-t" => title = Some(flag_value(&mut iter, arg, &args[0])),
            "--scale" | "-s" => {
                let raw = flag_value(&mut iter, arg, &args[0]);
                match raw.parse::<f32>() {
                    Ok(v) if v.is_finite() && v > 0.0 => scale = Some(v),
                    _ => {
                        eprintln!("Invalid scale: {raw}");
                        process::exit(1);
                    }
                }
            }
            "--api" => config.api_base_url = flag_value(&mut iter, arg, &args[0]).trim_end_matches('/').to_string(),
            "--job" | "-j" => config.job_id = Some(flag_value(&mut iter, arg, &args[0])),
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown flag: {other}");
                print_usage(&args[0]);
                process::exit(1);
            }
            path => {
                if positional == 0 {
                    input_path = Some(PathBuf::from(path));
                } else if positional == 1 {
                    output_path = Some(PathBuf::from(path));
                } else {
                    eprintln!("Unexpected argument: {path}");
                    print_usage(&args[0]);
                    process::exit(1);
                }
                positional += 1;
            }
        }
    }

    let client = match LibraryClient::new(config.api_base_url.clone()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    if list_charts {
        let Some(job) = config.job_id.as_deref() else {
            eprintln!("Error: --list-charts needs --job or REPORT_JOB_ID.");
            process::exit(1);
        };
        match client.list_charts(job).await {
            Ok(charts) => {
                for chart in &charts {
                    println!("{}\t{}\t{}", chart.group, chart.filename, client.asset_url(job, chart));
                }
                eprintln!("{} chart{}", charts.len(), if charts.len() == 1 { "" } else { "s" });
            }
            Err(e) => {
                eprintln!("Error listing charts: {e}");
                process::exit(1);
            }
        }
        return;
    }

    let input = match input_path {
        Some(p) => p,
        None => {
            eprintln!("Error: no input document specified.");
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    // Default output: same directory + same stem as input, but with .pdf
    let output = output_path.unwrap_or_else(|| {
        let mut o = input.clone();
        o.set_extension("pdf");
        o
    });

    let json = match fs::read_to_string(&input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading '{}': {e}", input.display());
            process::exit(1);
        }
    };

    let mut document = match Document::from_json(&json) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error loading '{}': {e}", input.display());
            process::exit(1);
        }
    };
    if landscape {
        document.orientation = PageOrientation::Landscape;
    }

    // Default title: stem of the input filename.
    let default_title = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Relatório")
        .to_string();

    let assets = prefetch_assets(&document, config.job_id.as_deref(), &client).await;
    let mut editor = Editor::from_document(config, document);
    let mut rasterizer = SoftwareRasterizer::new(assets);

    let defaults = ExportConfig::default();
    let export = ExportConfig {
        title: title.unwrap_or(default_title),
        scale: scale.unwrap_or(defaults.scale),
        ..defaults
    };

    match editor.export_pdf(&mut rasterizer, &export) {
        Ok(bytes) => {
            // Create output directory if necessary.
            if let Some(parent) = output.parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(e) = fs::create_dir_all(parent) {
                        eprintln!("Error creating output directory: {e}");
                        process::exit(1);
                    }
                }
            }
            if let Err(e) = fs::write(&output, &bytes) {
                eprintln!("Error writing '{}': {e}", output.display());
                process::exit(1);
            }
            let pages = editor.document().page_count();
            eprintln!(
                "Wrote '{}' ({} bytes, {} page{})",
                output.display(),
                bytes.len(),
                pages,
                if pages == 1 { "" } else { "s" }
            );
        }
        Err(e) => {
            eprintln!("Error exporting PDF: {e}");
            process::exit(1);
        }
    }
}

fn flag_value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str, prog: &str) -> String {
    match iter.next() {
        Some(v) => v.clone(),
        None => {
            eprintln!("Missing value for {flag}");
            print_usage(prog);
            process::exit(1);
        }
    }
}

fn print_usage(prog: &str) {
    eprintln!("canvas – report canvas exporter (report-canvas)");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <document.json> [output.pdf] [--landscape] [--title \"Relatório\"] [--scale 2]");
    eprintln!("  {prog} --list-charts --job <id>");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <document.json> Saved report document");
    eprintln!("  [output.pdf]    Output path  (default: same stem as input with .pdf)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --title, -t     Document title in PDF metadata (default: input filename stem)");
    eprintln!("  --landscape     Export every page in landscape (A4 841×595 pt)");
    eprintln!("  --scale, -s     Raster pixels per canvas unit (default: 2)");
    eprintln!("  --api URL       Backend base URL (default: $REPORT_API_URL or http://localhost:8000)");
    eprintln!("  --job, -j ID    Job whose chart library images are referenced (default: $REPORT_JOB_ID)");
    eprintln!("  --list-charts   Print the job's chart library and exit");
    eprintln!("  --help          Print this message");
}
