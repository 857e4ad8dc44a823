//! Read a DICOM file the way the read-path checks do and report the outcome.
//!
//! Usage:
//!
//! ```none
//! dcmread-check <file.dcm> [--defer-size 2KB] [--stop-before-pixels] [--force]
//!               [--tag PatientName]... [--reference expected.json] [--preview]
//! dcmread-check --request request.json
//! dcmread-check --self-check
//! ```
use std::path::{Path, PathBuf};

use clap::Parser;
use dicom::core::Tag;
use serde::Serialize;
use snafu::{Report, ResultExt, Whatever};

use dcmread_suite::utils::{format_tag, parse_tag, tag_alias, value_to_string};
use dcmread_suite::verify::compare_json;
use dcmread_suite::{
    DeferSize, FramePreview, ReadDataset, ReadOptions, ReadRequest, ScratchFile, SyntheticRecord,
    Verifier, VerifyReport,
};

/// Exit code for when the file could not be read.
const ERROR_READ: i32 = -2;
/// Exit code for when what was read differs from what was expected.
const ERROR_MISMATCH: i32 = -3;

/// Read a DICOM file and check what comes back
#[derive(Debug, Parser)]
#[command(version)]
struct App {
    /// the DICOM file to read
    #[arg(required_unless_present_any = ["request", "self_check"])]
    file: Option<PathBuf>,
    /// a JSON read request holding the path and the read options
    #[arg(long, conflicts_with_all = ["file", "self_check"])]
    request: Option<PathBuf>,
    /// write a synthetic record to a temporary file and read it back
    #[arg(long, conflicts_with = "file")]
    self_check: bool,

    /// load values larger than this only when accessed (e.g. "512", "2 KB")
    #[arg(long)]
    defer_size: Option<DeferSize>,
    /// do not read the pixel data or anything after it
    #[arg(long)]
    stop_before_pixels: bool,
    /// read files without a preamble and meta group
    #[arg(long)]
    force: bool,
    /// only keep these attributes (keyword, `(gggg,eeee)` or `ggggeeee`)
    #[arg(short = 't', long = "tag", value_parser = parse_tag)]
    tags: Vec<Tag>,

    /// DICOM JSON file the attributes are compared against
    #[arg(long)]
    reference: Option<PathBuf>,
    /// render the first frame of the pixel data
    #[arg(long)]
    preview: bool,
    /// print a JSON summary instead of the element listing
    #[arg(long)]
    json: bool,
}

impl App {
    fn read_options(&self) -> ReadOptions {
        let mut options = ReadOptions::new()
            .defer_size(self.defer_size.unwrap_or_default())
            .stop_before_pixels(self.stop_before_pixels)
            .force(self.force);
        if !self.tags.is_empty() {
            options = options.specific_tags(self.tags.iter().copied());
        }
        options
    }
}

#[derive(Debug, Serialize)]
struct ElementRow {
    tag: String,
    vr: String,
    alias: &'static str,
    value: String,
    deferred: bool,
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    file: &'a Path,
    transfer_syntax: &'a str,
    meta_len: usize,
    elements: Vec<ElementRow>,
    preview: Option<[u32; 2]>,
    verification: Option<&'a VerifyReport>,
}

fn main() {
    let _ = env_logger::Builder::from_default_env()
        .format_timestamp_secs()
        .try_init();

    let app = App::parse();

    match run(&app) {
        Ok(true) => {}
        Ok(false) => std::process::exit(ERROR_MISMATCH),
        Err(e) => {
            log::error!("{}", Report::from_error(e));
            std::process::exit(ERROR_READ);
        }
    }
}

/// Returns whether every comparison made matched.
fn run(app: &App) -> Result<bool, Whatever> {
    if app.self_check {
        return self_check(app);
    }

    let request = match (&app.request, &app.file) {
        (Some(request), _) => load_request(request)?,
        (None, Some(file)) => ReadRequest::new(file, app.read_options()),
        (None, None) => snafu::whatever!("no file to read"),
    };

    let dataset = request
        .read()
        .with_whatever_context(|_| format!("could not read {}", request.path.display()))?;

    let verification = match &app.reference {
        Some(reference) => Some(check_reference(&dataset, reference)?),
        None => None,
    };
    let preview = if app.preview {
        build_preview(&dataset)?
    } else {
        None
    };

    report(app, &dataset, preview.as_ref(), verification.as_ref())?;
    Ok(verification.map_or(true, |v| v.is_ok()))
}

fn load_request(path: &Path) -> Result<ReadRequest, Whatever> {
    let text = std::fs::read_to_string(path)
        .with_whatever_context(|_| format!("could not read request {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).whatever_context("request is not valid JSON")?;
    ReadRequest::from_json(&value).whatever_context("invalid read request")
}

fn self_check(app: &App) -> Result<bool, Whatever> {
    let scratch = ScratchFile::new().whatever_context("could not prepare scratch file")?;
    let record = SyntheticRecord::new().with_pixel_data();
    scratch
        .save(&record)
        .whatever_context("could not write synthetic record")?;

    let (dataset, verification) = Verifier::new(&record)
        .read_and_verify(scratch.path(), &app.read_options())
        .whatever_context("could not read back synthetic record")?;
    let preview = if app.preview {
        build_preview(&dataset)?
    } else {
        None
    };

    report(app, &dataset, preview.as_ref(), Some(&verification))?;
    Ok(verification.is_ok())
}

fn check_reference(dataset: &ReadDataset, reference: &Path) -> Result<VerifyReport, Whatever> {
    let text = std::fs::read_to_string(reference)
        .with_whatever_context(|_| format!("could not read reference {}", reference.display()))?;
    let expected: serde_json::Value =
        serde_json::from_str(&text).whatever_context("reference is not valid JSON")?;
    let actual = dataset
        .to_json()
        .whatever_context("could not convert data set to JSON")?;
    Ok(compare_json(&expected, &actual))
}

fn build_preview(dataset: &ReadDataset) -> Result<Option<FramePreview>, Whatever> {
    let Some(object) = dataset
        .to_file_object()
        .whatever_context("could not load deferred values")?
    else {
        log::warn!("No file meta group, skipping frame preview");
        return Ok(None);
    };
    match FramePreview::render_first_frame(&object) {
        Ok(preview) => Ok(preview),
        Err(err) => {
            log::warn!("Unable to build frame preview: {err}");
            Ok(None)
        }
    }
}

fn element_rows(dataset: &ReadDataset) -> Result<Vec<ElementRow>, Whatever> {
    let mut rows = Vec::with_capacity(dataset.len());
    for tag in dataset.tags() {
        let row = match dataset.deferred_info(tag) {
            Some((vr, length)) => ElementRow {
                tag: format_tag(tag),
                vr: vr.to_string().to_owned(),
                alias: tag_alias(tag),
                value: format!("(deferred, {length} bytes)"),
                deferred: true,
            },
            None => {
                let element = dataset
                    .element(tag)
                    .whatever_context("could not fetch element")?;
                let Some(element) = element else { continue };
                ElementRow {
                    tag: format_tag(tag),
                    vr: element.vr().to_string().to_owned(),
                    alias: tag_alias(tag),
                    value: value_to_string(element.value(), element.vr()),
                    deferred: false,
                }
            }
        };
        rows.push(row);
    }
    Ok(rows)
}

fn report(
    app: &App,
    dataset: &ReadDataset,
    preview: Option<&FramePreview>,
    verification: Option<&VerifyReport>,
) -> Result<(), Whatever> {
    let elements = element_rows(dataset)?;

    if app.json {
        let summary = Summary {
            file: dataset.filename(),
            transfer_syntax: dataset.transfer_syntax(),
            meta_len: dataset.meta_len(),
            elements,
            preview: preview.map(|p| [p.width, p.height]),
            verification,
        };
        let text = serde_json::to_string_pretty(&summary)
            .whatever_context("could not serialize summary")?;
        println!("{text}");
        return Ok(());
    }

    println!("# {}", dataset.filename().display());
    println!(
        "# transfer syntax {}, {} meta elements",
        dataset.transfer_syntax(),
        dataset.meta_len()
    );
    for row in &elements {
        println!("{} {} {:<32} {}", row.tag, row.vr, row.alias, row.value);
    }
    if let Some(preview) = preview {
        println!("# preview {}x{}", preview.width, preview.height);
    }
    if let Some(verification) = verification {
        println!("# {verification}");
    }
    Ok(())
}
