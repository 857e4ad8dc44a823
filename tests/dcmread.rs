use std::path::PathBuf;

use dicom::core::{Tag, VR};
use dicom::dictionary_std::tags;
use pretty_assertions::assert_eq;
use serde_json::json;

use dcmread_suite::fixtures::{self, TTFM, TTFM_REFERENCE};
use dcmread_suite::model::FieldValue;
use dcmread_suite::verify::{compare_json, expect_error_kind, verify_allow_list};
use dcmread_suite::{
    read_file, DeferSize, ErrorKind, FramePreview, ReadOptions, ReadRequest, ScratchFile,
    SyntheticRecord, Verifier,
};

fn write(record: &SyntheticRecord) -> ScratchFile {
    let scratch = ScratchFile::new().unwrap();
    scratch.save(record).unwrap();
    scratch
}

#[test]
fn default_attributes_read_back() {
    let scratch = ScratchFile::new().unwrap();
    let record = scratch.create_default().unwrap();

    let (dataset, report) = Verifier::new(&record)
        .read_and_verify(scratch.path(), &ReadOptions::new())
        .unwrap();
    assert!(report.is_ok(), "{report}");
    assert_eq!(dataset.len(), record.len());
    assert_eq!(
        dataset.text(tags::PATIENT_NAME).unwrap().as_deref(),
        Some("Test^Firstname")
    );
    assert!(dataset.is_little_endian());
    assert!(dataset.is_implicit_vr());
    assert!(dataset.meta_len() > 0);
}

#[test]
fn path_and_path_buf_are_both_accepted() {
    let record = SyntheticRecord::new();
    let scratch = write(&record);

    let by_path = read_file(scratch.path(), &ReadOptions::new()).unwrap();
    let path_buf: PathBuf = scratch.path().to_path_buf();
    let by_path_buf = read_file(&path_buf, &ReadOptions::new()).unwrap();

    assert_eq!(by_path.filename(), by_path_buf.filename());
    assert!(Verifier::new(&record).verify(&path_buf, &by_path_buf).unwrap().is_ok());
}

#[test]
fn null_attributes_read_back_empty() {
    let mut record = SyntheticRecord::new();
    record.set_patient_name(None).set_patient_id(None);
    let scratch = write(&record);

    let (dataset, report) = Verifier::new(&record)
        .read_and_verify(scratch.path(), &ReadOptions::new())
        .unwrap();
    assert!(report.is_ok(), "{report}");
    assert_eq!(dataset.text(tags::PATIENT_NAME).unwrap().as_deref(), Some(""));
    assert_eq!(dataset.text(tags::PATIENT_ID).unwrap().as_deref(), Some(""));
}

#[test]
fn file_errors_are_classified() {
    let report = expect_error_kind(
        read_file("/not_a_file", &ReadOptions::new()),
        ErrorKind::FileNotFound,
    );
    assert!(report.is_ok(), "{report}");

    let report = expect_error_kind(
        ReadRequest::from_json(&json!({ "path": 7 })).and_then(|request| request.read()),
        ErrorKind::TypeMismatch,
    );
    assert!(report.is_ok(), "{report}");

    let report = expect_error_kind(
        ReadRequest::from_json(&json!({ "path": "/not_a_file" })).and_then(|r| r.read()),
        ErrorKind::FileNotFound,
    );
    assert!(report.is_ok(), "{report}");
}

#[test]
fn valid_defer_sizes() {
    let record = SyntheticRecord::new().with_pixel_data();
    let scratch = write(&record);

    for (size, deferred) in [
        (json!(0), true),
        (json!(1024), true),
        (json!(1516.15615), true),
        (json!(1e40), false),
        (json!("0 KB"), true),
        (json!("1 KB"), true),
        (json!("0.001 GB"), false),
        (json!("1.5 kb"), true),
        (json!("2 MB"), false),
        (json!(null), false),
    ] {
        let request = ReadRequest::from_json(&json!({
            "path": scratch.path().to_str().unwrap(),
            "defer_size": size,
        }))
        .unwrap();
        let dataset = request.read().unwrap();
        assert_eq!(dataset.is_deferred(tags::PIXEL_DATA), deferred, "{size}");

        let report = Verifier::new(&record).verify(scratch.path(), &dataset).unwrap();
        assert!(report.is_ok(), "{size}: {report}");
    }
}

#[test]
fn invalid_defer_sizes() {
    for (size, kind) in [
        (json!("lots"), ErrorKind::InvalidValue),
        (json!("12 parsecs"), ErrorKind::InvalidValue),
        (json!({}), ErrorKind::TypeMismatch),
        (json!([1024]), ErrorKind::TypeMismatch),
        (json!(true), ErrorKind::TypeMismatch),
    ] {
        let err = DeferSize::from_json(&size).unwrap_err();
        assert_eq!(err.kind(), kind, "{size}");
    }
}

#[test]
fn deferred_values_match_a_full_read() {
    let path = fixtures::file_path(TTFM);
    let full = read_file(&path, &ReadOptions::new()).unwrap();
    let options = ReadOptions::new().defer_size(DeferSize::bytes(16));
    let deferred = read_file(&path, &options).unwrap();

    assert!(deferred.is_deferred(tags::PIXEL_DATA));
    assert_eq!(deferred.deferred_info(tags::PIXEL_DATA), Some((VR::OW, 32)));
    assert_eq!(full.len(), deferred.len());
    for tag in full.tags() {
        let expected = full.element(tag).unwrap().unwrap().into_owned();
        let actual = deferred.element(tag).unwrap().unwrap().into_owned();
        assert_eq!(actual, expected, "{tag}");
    }
}

#[test]
fn stop_before_pixels_drops_pixel_data() {
    let path = fixtures::file_path(TTFM);
    let full = read_file(&path, &ReadOptions::new()).unwrap();
    let partial = read_file(&path, &ReadOptions::new().stop_before_pixels(true)).unwrap();

    assert!(partial.len() < full.len());
    assert!(full.contains(tags::PIXEL_DATA));
    assert!(!partial.contains(tags::PIXEL_DATA));
    assert!(partial.contains(tags::PATIENT_NAME));
}

#[test]
fn missing_meta_header_needs_force() {
    let record = SyntheticRecord::new().without_meta();
    let scratch = write(&record);

    let report = expect_error_kind(
        read_file(scratch.path(), &ReadOptions::new()),
        ErrorKind::InvalidDicom,
    );
    assert!(report.is_ok(), "{report}");
    let report = expect_error_kind(
        read_file(scratch.path(), &ReadOptions::new().force(false)),
        ErrorKind::InvalidDicom,
    );
    assert!(report.is_ok(), "{report}");

    let (dataset, report) = Verifier::new(&record)
        .read_and_verify(scratch.path(), &ReadOptions::new().force(true))
        .unwrap();
    assert!(report.is_ok(), "{report}");
    assert!(dataset.meta().is_none());
    assert_eq!(dataset.meta_len(), 0);
    assert_eq!(dataset.len(), record.len());
}

#[test]
fn dicm_prefix_without_preamble_needs_force() {
    let scratch = ScratchFile::new().unwrap();
    let record = scratch.create_default().unwrap();
    let bytes = std::fs::read(scratch.path()).unwrap();
    assert_eq!(&bytes[128..132], b"DICM");
    std::fs::write(scratch.path(), &bytes[128..]).unwrap();

    for options in [ReadOptions::new(), ReadOptions::new().force(false)] {
        let report =
            expect_error_kind(read_file(scratch.path(), &options), ErrorKind::InvalidDicom);
        assert!(report.is_ok(), "{report}");
    }

    let (dataset, report) = Verifier::new(&record)
        .read_and_verify(scratch.path(), &ReadOptions::new().force(true))
        .unwrap();
    assert!(report.is_ok(), "{report}");
    assert!(dataset.meta().is_some());
    assert!(dataset.meta_len() > 0);
}

#[test]
fn empty_record_reads_back_empty_when_forced() {
    let record = SyntheticRecord::empty();
    let scratch = write(&record);

    let report = expect_error_kind(
        read_file(scratch.path(), &ReadOptions::new()),
        ErrorKind::InvalidDicom,
    );
    assert!(report.is_ok(), "{report}");

    let (dataset, report) = Verifier::new(&record)
        .read_and_verify(scratch.path(), &ReadOptions::new().force(true))
        .unwrap();
    assert!(report.is_ok(), "{report}");
    assert_eq!(dataset.len(), 0);
    assert_eq!(dataset.meta_len(), 0);
    assert!(dataset.meta().is_none());
}

#[test]
fn differing_pixel_words_are_reported() {
    let record = SyntheticRecord::new().with_pixel_data();
    let scratch = write(&record);
    let dataset = read_file(scratch.path(), &ReadOptions::new()).unwrap();

    let words = match &record.field(tags::PIXEL_DATA).unwrap().value {
        FieldValue::Words(words) => words.len(),
        other => panic!("unexpected pixel data {other:?}"),
    };
    let mut altered = record.clone();
    altered.set(
        tags::PIXEL_DATA,
        VR::OW,
        FieldValue::Words(vec![0xBEEF; words]),
    );

    assert!(Verifier::new(&record).verify(scratch.path(), &dataset).unwrap().is_ok());
    let report = Verifier::new(&altered).verify(scratch.path(), &dataset).unwrap();
    assert_eq!(report.mismatches.len(), 1, "{report}");
    assert!(report.mismatches[0].field.contains("PixelData"), "{report}");
}

#[test]
fn specific_tags_only() {
    let record = SyntheticRecord::new();
    let scratch = write(&record);
    let requested = [tags::PATIENT_NAME, tags::ROWS, tags::WINDOW_WIDTH];

    let (dataset, report) = Verifier::new(&record)
        .read_and_verify(scratch.path(), &ReadOptions::new().specific_tags(requested))
        .unwrap();
    assert!(report.is_ok(), "{report}");
    assert_eq!(dataset.len(), 3);
    assert!(verify_allow_list(&dataset, &requested).is_ok());
    assert!(!dataset.contains(tags::PATIENT_ID));
}

#[test]
fn empty_allow_list_keeps_character_set() {
    let record = SyntheticRecord::new().with_element(
        tags::SPECIFIC_CHARACTER_SET,
        VR::CS,
        FieldValue::text("utf8"),
    );
    let scratch = write(&record);

    let options = ReadOptions::new().specific_tags(Vec::<Tag>::new());
    let dataset = read_file(scratch.path(), &options).unwrap();
    assert_eq!(dataset.len(), 1);
    assert!(dataset.contains(tags::SPECIFIC_CHARACTER_SET));
    assert!(verify_allow_list(&dataset, &[]).is_ok());
}

#[test]
fn all_options_on_the_sample() {
    let request = ReadRequest::from_json(&json!({
        "path": fixtures::file_path(TTFM).to_str().unwrap(),
        "defer_size": "1 KB",
        "stop_before_pixels": true,
        "force": true,
        "specific_tags": ["PatientName", "(0028,0010)", "00280011", "PixelData"],
    }))
    .unwrap();
    let dataset = request.read().unwrap();

    // character set, name, rows and columns; pixel data is past the stop
    assert_eq!(dataset.len(), 4);
    assert_eq!(
        dataset.text(tags::PATIENT_NAME).unwrap().as_deref(),
        Some("Doe^John")
    );
    assert!(!dataset.contains(tags::PIXEL_DATA));
}

#[test]
fn sample_matches_its_json_reference() {
    let reference = fixtures::read_json(TTFM_REFERENCE).unwrap();
    let dataset = read_file(fixtures::file_path(TTFM), &ReadOptions::new()).unwrap();
    let actual = dataset.to_json().unwrap();

    let report = compare_json(&reference, &actual);
    assert!(report.is_ok(), "{report}");
    assert_eq!(report.checked, reference.as_object().unwrap().len());
}

#[test]
fn sample_pixel_data_renders() {
    let dataset = read_file(fixtures::file_path(TTFM), &ReadOptions::new()).unwrap();
    let object = dataset.to_file_object().unwrap().unwrap();

    let preview = FramePreview::render_first_frame(&object).unwrap().unwrap();
    assert_eq!((preview.width, preview.height), (4, 4));
    assert_eq!(preview.rgba.len(), 4 * 4 * 4);
    assert_eq!(preview.gray_at(0, 0), Some(0));
    assert_eq!(preview.gray_at(3, 3), Some(255));
}
