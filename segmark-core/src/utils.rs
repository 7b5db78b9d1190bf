use anyhow::Context;
use serde::Serialize;
use std::{
    fs::{create_dir, create_dir_all, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::{
    entities::SegmentBox,
    render::{OutputFormat, RenderedDocument},
};

/// File stem of `doc_name` usable as a file name: whitespace becomes `_`,
/// anything else outside `[A-Za-z0-9_-]` becomes `-`.
pub fn sanitize_doc_name(doc_name: &str) -> String {
    let stem = Path::new(doc_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(doc_name);
    stem.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else if c.is_whitespace() {
                '_'
            } else {
                '-'
            }
        })
        .collect()
}

/// Creates (or recreates) the `<doc>-results` directory.
pub fn create_dirs<P: AsRef<Path>>(output_dir: Option<P>, doc_name: &str) -> anyhow::Result<PathBuf> {
    let result_dir_name = format!("{}-results", sanitize_doc_name(doc_name));
    let res_dir_path = match output_dir {
        Some(p) => {
            create_dir_all(p.as_ref()).context("can't create output dir")?;
            p.as_ref().join(&result_dir_name)
        }
        None => PathBuf::from(".").join(&result_dir_name),
    };
    if create_dir(&res_dir_path).is_err() {
        std::fs::remove_dir_all(&res_dir_path)?;
        create_dir(&res_dir_path).context("can't create result dir")?;
    }
    Ok(res_dir_path)
}

fn pretty_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}

/// Segmentation sidecar content, segment boxes in reading order.
pub fn segmentation_json(segments: &[SegmentBox]) -> anyhow::Result<String> {
    pretty_json(segments)
}

fn write_file(path: &Path, content: &str) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("can't create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(content.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Paths written by [`save_conversion`].
#[derive(Debug, Clone, PartialEq)]
pub struct SavedConversion {
    pub markup: PathBuf,
    pub segmentation: PathBuf,
    pub translations: Vec<PathBuf>,
    pub pictures: Option<PathBuf>,
}

/// Writes the markup, the segmentation sidecar, one file per translation
/// `(language, markup)` and the picture manifest when the document has pictures.
#[tracing::instrument(skip_all, fields(doc_name = doc_name))]
pub fn save_conversion(
    res_dir_path: &Path,
    doc_name: &str,
    format: OutputFormat,
    rendered: &RenderedDocument,
    segments: &[SegmentBox],
    translations: &[(String, String)],
) -> anyhow::Result<SavedConversion> {
    let name = sanitize_doc_name(doc_name);
    let ext = format.extension();

    let markup = res_dir_path.join(format!("{name}.{ext}"));
    write_file(&markup, &rendered.markup())?;

    let segmentation = res_dir_path.join(format!("{name}_segmentation.json"));
    write_file(&segmentation, &segmentation_json(segments)?)?;

    let translations = translations
        .iter()
        .map(|(language, content)| {
            let path = res_dir_path.join(format!("{name}_{}.{ext}", sanitize_doc_name(language)));
            write_file(&path, content)?;
            Ok(path)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let pictures = if rendered.pictures.is_empty() {
        None
    } else {
        let path = res_dir_path.join(format!("{name}_pictures.json"));
        write_file(&path, &pretty_json(&rendered.pictures)?)?;
        Some(path)
    };

    tracing::debug!("saved conversion of {} in {}", doc_name, res_dir_path.display());
    Ok(SavedConversion {
        markup,
        segmentation,
        translations,
        pictures,
    })
}
