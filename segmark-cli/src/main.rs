use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use std::{
    fmt::Write,
    ops::Range,
    path::{Path, PathBuf},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use segmark_core::{
    convert_document,
    entities::{PageNumber, PdfFeatures, SegmentBox, SegmentType},
    layout::{predictions_to_segment_boxes, PagePredictions},
    text::{extract_all_text, extract_text_by_types},
    toc::{extract_table_of_contents, format_toc_for_uwazi, TocEntry},
    translate_markup,
    utils::{create_dirs, save_conversion},
    ConversionConfig, OllamaConfig, OllamaTranslator, OutputFormat, TranslationConfig,
};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Segmark - Structured markup from PDF layout segments",
    long_about = "Segmark rebuilds the reading order, table of contents and Markdown/HTML of a PDF document from its extracted features and predicted layout segments, with optional machine translation."
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a document to markdown or html
    Convert(ConvertArgs),
    /// Print the table of contents of a segmentation file as JSON
    Toc(TocArgs),
    /// Print the text of a segmentation file
    Text(TextArgs),
}

#[derive(ClapArgs, Debug)]
struct ConvertArgs {
    /// PDF features JSON produced by the feature provider
    #[arg(long)]
    features: PathBuf,

    /// Segment boxes JSON, in reading order
    #[arg(long, required_unless_present = "predictions", conflicts_with = "predictions")]
    segments: Option<PathBuf>,

    /// Per page layout predictions JSON, used instead of segment boxes
    #[arg(long)]
    predictions: Option<PathBuf>,

    #[arg(long, short('f'), default_value_t = OutputFormat::Markdown)]
    format: OutputFormat,

    #[arg(long, default_value_t = false, help = "Prepend a table of contents")]
    toc: bool,

    #[arg(
        long,
        short('r'),
        help = "Specify pages to convert (e.g., '1-5' or '1' for single page)"
    )]
    page_range: Option<String>,

    /// Specifies the target directory where results will be saved
    ///
    /// If not specified, defaults to the current working directory.
    #[arg(
        long,
        env = "SEGMARK_OUTPUT_DIR",
        help = "Specify the directory to store conversion results"
    )]
    output_dir: Option<PathBuf>,

    #[arg(long, help = "Base name of the picture files")]
    image_base_name: Option<String>,

    /// Languages to translate the markup to
    #[arg(long, value_delimiter = ',')]
    translate: Vec<String>,

    #[arg(long, default_value = "gpt-oss", help = "Ollama model used for translation")]
    translation_model: String,

    #[arg(long, env = "OLLAMA_HOST", default_value = "http://ollama:11434")]
    ollama_host: String,

    #[arg(long, default_value = "1", help = "Chunks translated concurrently")]
    translation_concurrency: usize,
}

#[derive(ClapArgs, Debug)]
struct TocArgs {
    /// Segmentation JSON (`<name>_segmentation.json`)
    segments: PathBuf,

    #[arg(long, default_value_t = false, help = "Skip the document name on the first page")]
    skip_document_name: bool,

    #[arg(long, default_value_t = false, help = "Output the uwazi selection rectangles format")]
    uwazi: bool,
}

#[derive(ClapArgs, Debug)]
struct TextArgs {
    /// Segmentation JSON (`<name>_segmentation.json`)
    segments: PathBuf,

    /// Segment types to keep (e.g. 'title,text'), all types when empty
    #[arg(long, value_delimiter = ',')]
    types: Vec<String>,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new("segmark=info,segmark_core=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn parse_page_range(range_str: &str) -> anyhow::Result<Range<PageNumber>> {
    if let Some((start, end)) = range_str.split_once('-') {
        let start: PageNumber = start.trim().parse()?;
        let end: PageNumber = end.trim().parse()?;
        if start > 0 && end >= start {
            Ok(start..end + 1)
        } else {
            anyhow::bail!("Invalid page range: start must be > 0 and end must be >= start")
        }
    } else {
        // Single page
        let page: PageNumber = range_str.trim().parse()?;
        if page > 0 {
            Ok(page..page + 1)
        } else {
            anyhow::bail!("Page number must be greater than 0")
        }
    }
}

fn setup_progress_bar(length: usize) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(length as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {msg}",
        )?
        .with_key("eta", |state: &ProgressState, w: &mut dyn Write| {
            let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
        })
        .progress_chars("#>-"),
    );
    Ok(pb)
}

fn pages_in_range(features: &PdfFeatures, page_range: Option<&Range<PageNumber>>) -> usize {
    features
        .pages
        .iter()
        .filter(|p| page_range.map_or(true, |r| r.contains(&p.page_number)))
        .count()
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("can't read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid json in {}", path.display()))
}

async fn convert(args: ConvertArgs) -> anyhow::Result<()> {
    let features_json = std::fs::read_to_string(&args.features)
        .with_context(|| format!("can't read {}", args.features.display()))?;
    let features = PdfFeatures::from_json(&features_json)?;

    let segment_boxes: Vec<SegmentBox> = match (&args.segments, &args.predictions) {
        (Some(path), _) => read_json(path)?,
        (None, Some(path)) => {
            let predictions: Vec<PagePredictions> = read_json(path)?;
            predictions_to_segment_boxes(&features.pages, &predictions)?
        }
        (None, None) => anyhow::bail!("either --segments or --predictions is required"),
    };

    let page_range = args
        .page_range
        .as_deref()
        .map(parse_page_range)
        .transpose()?;
    let config = ConversionConfig {
        format: args.format,
        extract_toc: args.toc,
        image_base_name: args.image_base_name.clone(),
        page_range,
    };

    let pb = setup_progress_bar(pages_in_range(&features, config.page_range.as_ref()))?;
    let conversion = convert_document(
        &features,
        segment_boxes,
        &[],
        &config,
        Some(|page_number| {
            pb.set_message(format!("Page #{}", page_number));
            pb.inc(1u64);
        }),
    )?;
    pb.finish_with_message(format!(
        "Parsed document in {}ms",
        conversion.document.metadata.parsing_duration_ms
    ));

    let mut translations = Vec::with_capacity(args.translate.len());
    if !args.translate.is_empty() {
        let translator = OllamaTranslator::new(&OllamaConfig {
            host: args.ollama_host.clone(),
            model: args.translation_model.clone(),
            ..OllamaConfig::default()
        })?;
        translator
            .ensure_service_ready()
            .await
            .context("translation service not ready")?;
        let translation_config = TranslationConfig {
            concurrency: args.translation_concurrency,
            ..TranslationConfig::default()
        };

        for language in &args.translate {
            let parts = &conversion.rendered.parts;
            let pb = setup_progress_bar(parts.iter().filter(|p| p.segment_type.is_some()).count())?;
            pb.set_message(format!("Translating to {}", language));
            let translated = translate_markup(
                &translator,
                args.format,
                parts,
                language,
                &translation_config,
                || pb.inc(1u64),
            )
            .await;
            pb.finish_with_message(format!("Translated to {}", language));
            translations.push((language.clone(), translated));
        }
    }

    let res_dir_path = create_dirs(args.output_dir.as_ref(), &features.file_name)?;
    let saved = save_conversion(
        &res_dir_path,
        &features.file_name,
        args.format,
        &conversion.rendered,
        &conversion.segment_boxes(),
        &translations,
    )?;
    if let Some(manifest) = &saved.pictures {
        println!(
            "{} {} pictures to extract, listed in: {}",
            "ℹ".yellow().bold(),
            conversion.rendered.pictures.len(),
            manifest.display().to_string().yellow().underline()
        );
    }
    println!(
        "{} Results saved in: {}",
        "✓".green().bold(),
        res_dir_path.display().to_string().cyan().underline()
    );
    Ok(())
}

fn toc(args: TocArgs) -> anyhow::Result<()> {
    let segments: Vec<SegmentBox> = read_json(&args.segments)?;
    let items = extract_table_of_contents(&segments, args.skip_document_name);
    let json = if args.uwazi {
        serde_json::to_string_pretty(&format_toc_for_uwazi(&items))?
    } else {
        serde_json::to_string_pretty(&items.iter().map(TocEntry::from).collect::<Vec<_>>())?
    };
    println!("{}", json);
    Ok(())
}

fn text(args: TextArgs) -> anyhow::Result<()> {
    let segments: Vec<SegmentBox> = read_json(&args.segments)?;
    let text = if args.types.is_empty() {
        extract_all_text(&segments)
    } else {
        let types: Vec<SegmentType> = args.types.iter().map(|t| SegmentType::from_text(t)).collect();
        extract_text_by_types(&segments, &types)
    };
    println!("{}", text);
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    tracing::debug!("running {:?}", args.command);

    match args.command {
        Command::Convert(args) => convert(args).await,
        Command::Toc(args) => toc(args),
        Command::Text(args) => text(args),
    }
}
