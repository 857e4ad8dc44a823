//! Comparing what was read against what was written.
use std::fmt;
use std::path::Path;

use dicom::core::value::PrimitiveValue;
use dicom::core::Tag;
use dicom::dictionary_std::tags;
use dicom::object::mem::InMemElement;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ErrorKind, ReadError};
use crate::model::{read_file, FieldValue, ReadDataset, ReadOptions, SyntheticRecord};
use crate::utils::{format_tag, tag_alias, trim_padding, value_to_string};

const ABSENT: &str = "(absent)";

/// One field whose read-back value differs from what was expected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub field: String,
    pub expected: String,
    pub actual: String,
}

impl Mismatch {
    fn new(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Mismatch {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    fn for_tag(tag: Tag, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Mismatch::new(
            format!("{} {}", format_tag(tag), tag_alias(tag)),
            expected,
            actual,
        )
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.field, self.expected, self.actual
        )
    }
}

/// Outcome of a verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub checked: usize,
    pub mismatches: Vec<Mismatch>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty()
    }

    fn check(&mut self, mismatch: Option<Mismatch>) {
        self.checked += 1;
        self.mismatches.extend(mismatch);
    }

    pub fn merge(&mut self, other: VerifyReport) {
        self.checked += other.checked;
        self.mismatches.extend(other.mismatches);
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} checked, {} mismatched",
            self.checked,
            self.mismatches.len()
        )?;
        for mismatch in &self.mismatches {
            write!(f, "\n  {mismatch}")?;
        }
        Ok(())
    }
}

/// Checks a read data set against the record that was written.
#[derive(Debug, Clone, Copy)]
pub struct Verifier<'a> {
    record: &'a SyntheticRecord,
}

impl<'a> Verifier<'a> {
    pub fn new(record: &'a SyntheticRecord) -> Self {
        Verifier { record }
    }

    /// Compare every record field the read options did not exclude,
    /// plus the container and encoding flags.
    pub fn verify(
        &self,
        path: impl AsRef<Path>,
        dataset: &ReadDataset,
    ) -> Result<VerifyReport, ReadError> {
        let mut report = verify_source(dataset, path);
        report.merge(self.verify_transfer_syntax(dataset));

        for (tag, field) in self.record.fields() {
            if !dataset.options().allows(tag) {
                continue;
            }
            let mismatch = match dataset.element(tag)? {
                None => Some(Mismatch::for_tag(tag, describe(&field.value), ABSENT)),
                Some(element) => compare_field(tag, &field.value, &element),
            };
            report.check(mismatch);
        }
        Ok(report)
    }

    /// Read `path` with `options` and verify the result.
    pub fn read_and_verify(
        &self,
        path: impl AsRef<Path>,
        options: &ReadOptions,
    ) -> Result<(ReadDataset, VerifyReport), ReadError> {
        let path = path.as_ref();
        let dataset = read_file(path, options)?;
        let report = self.verify(path, &dataset)?;
        Ok((dataset, report))
    }

    /// Endianness and implicit VR flags match the record's encoding.
    pub fn verify_transfer_syntax(&self, dataset: &ReadDataset) -> VerifyReport {
        let mut report = VerifyReport::default();
        report.check(
            (self.record.is_little_endian() != dataset.is_little_endian()).then(|| {
                Mismatch::new(
                    "little endian",
                    self.record.is_little_endian().to_string(),
                    dataset.is_little_endian().to_string(),
                )
            }),
        );
        report.check(
            (self.record.is_implicit_vr() != dataset.is_implicit_vr()).then(|| {
                Mismatch::new(
                    "implicit VR",
                    self.record.is_implicit_vr().to_string(),
                    dataset.is_implicit_vr().to_string(),
                )
            }),
        );
        report
    }
}

/// The data set is file-backed and comes from `path`.
pub fn verify_source(dataset: &ReadDataset, path: impl AsRef<Path>) -> VerifyReport {
    let path = path.as_ref();
    let mut report = VerifyReport::default();
    report.check((dataset.filename() != path).then(|| {
        Mismatch::new(
            "filename",
            path.display().to_string(),
            dataset.filename().display().to_string(),
        )
    }));
    report
}

/// A read with an allow-list holds exactly the requested tags,
/// plus Specific Character Set when the file has one.
pub fn verify_allow_list(dataset: &ReadDataset, requested: &[Tag]) -> VerifyReport {
    let mut report = VerifyReport::default();
    let mut expected_len = 0;
    for (i, tag) in requested.iter().enumerate() {
        if requested[..i].contains(tag) {
            continue;
        }
        expected_len += 1;
        report.check(
            (!dataset.contains(*tag)).then(|| Mismatch::for_tag(*tag, "present", ABSENT)),
        );
    }
    if dataset.contains(tags::SPECIFIC_CHARACTER_SET)
        && !requested.contains(&tags::SPECIFIC_CHARACTER_SET)
    {
        expected_len += 1;
    }
    for tag in dataset.tags() {
        if tag != tags::SPECIFIC_CHARACTER_SET && !requested.contains(&tag) {
            report.check(Some(Mismatch::for_tag(tag, ABSENT, "present")));
        }
    }
    report.check((dataset.len() != expected_len).then(|| {
        Mismatch::new(
            "length",
            expected_len.to_string(),
            dataset.len().to_string(),
        )
    }));
    report
}

/// Compare a DICOM JSON reference to the JSON of a read data set.
/// Keys missing from the actual document, or null there, are skipped.
pub fn compare_json(reference: &Value, actual: &Value) -> VerifyReport {
    let mut report = VerifyReport::default();
    let (Some(reference), Some(actual)) = (reference.as_object(), actual.as_object()) else {
        report.check(Some(Mismatch::new(
            "document",
            "two JSON objects",
            format!("{reference} / {actual}"),
        )));
        return report;
    };

    for (key, expected) in reference {
        match actual.get(key) {
            None | Some(Value::Null) => {}
            Some(value) => report.check(
                (value != expected)
                    .then(|| Mismatch::new(key.as_str(), expected.to_string(), value.to_string())),
            ),
        }
    }
    report
}

/// Check that a read failed with the given kind of error.
pub fn expect_error_kind<T>(result: Result<T, ReadError>, expected: ErrorKind) -> VerifyReport {
    let mut report = VerifyReport::default();
    let mismatch = match result {
        Ok(_) => Some(Mismatch::new("error", format!("{expected:?}"), "success")),
        Err(e) if e.kind() == expected => None,
        Err(e) => Some(Mismatch::new(
            "error",
            format!("{expected:?}"),
            format!("{:?} ({e})", e.kind()),
        )),
    };
    report.check(mismatch);
    report
}

fn compare_field(tag: Tag, expected: &FieldValue, element: &InMemElement) -> Option<Mismatch> {
    let mismatch = || {
        Some(Mismatch::for_tag(
            tag,
            describe(expected),
            value_to_string(element.value(), element.vr()),
        ))
    };
    let Some(actual) = element.value().primitive() else {
        return mismatch();
    };

    let equal = match expected {
        FieldValue::Empty => is_blank(actual),
        FieldValue::Text(values) => {
            let text = actual.to_str();
            let parts: Vec<&str> = text.split('\\').map(trim_padding).collect();
            parts.len() == values.len()
                && parts
                    .iter()
                    .zip(values)
                    .all(|(a, e)| *a == trim_padding(e))
        }
        FieldValue::Decimal(values) => {
            let expected: Option<Vec<f64>> =
                values.iter().map(|v| v.trim().parse::<f64>().ok()).collect();
            match (expected, actual.to_multi_float64()) {
                (Some(expected), Ok(actual)) => {
                    expected.len() == actual.len()
                        && expected.iter().zip(&actual).all(|(e, a)| same_decimal(*e, *a))
                }
                _ => false,
            }
        }
        FieldValue::Unsigned(values) => actual
            .to_multi_int::<i64>()
            .map(|ints| ints.iter().copied().eq(values.iter().map(|v| i64::from(*v))))
            .unwrap_or(false),
        FieldValue::Words(values) => same_words(values, actual),
    };

    if equal {
        None
    } else {
        mismatch()
    }
}

fn is_blank(value: &PrimitiveValue) -> bool {
    match value {
        PrimitiveValue::Empty => true,
        PrimitiveValue::Str(s) => trim_padding(s).is_empty(),
        PrimitiveValue::Strs(strings) => strings.iter().all(|s| trim_padding(s).is_empty()),
        other => other.calculate_byte_len() == 0,
    }
}

/// Word values read as bytes are taken to be little endian.
fn same_words(expected: &[u16], actual: &PrimitiveValue) -> bool {
    match actual {
        PrimitiveValue::U16(words) => words.as_slice() == expected,
        PrimitiveValue::U8(bytes) => {
            bytes.len() == expected.len() * 2
                && bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .eq(expected.iter().copied())
        }
        PrimitiveValue::Empty => expected.is_empty(),
        _ => false,
    }
}

fn same_decimal(expected: f64, actual: f64) -> bool {
    (expected - actual).abs() <= 1e-12 * expected.abs().max(1.)
}

fn describe(value: &FieldValue) -> String {
    match value {
        FieldValue::Empty => String::from("(empty)"),
        FieldValue::Text(values) | FieldValue::Decimal(values) => values.join("\\"),
        FieldValue::Unsigned(values) => values
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join("\\"),
        FieldValue::Words(values) => format!("Binary data ({} bytes)", values.len() * 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::core::{DataElement, VR};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn padded_text_matches() {
        let element = DataElement::new(tags::PATIENT_ID, VR::LO, PrimitiveValue::from("123456 "));
        assert_eq!(
            compare_field(tags::PATIENT_ID, &FieldValue::text("123456"), &element),
            None
        );
        let mismatch =
            compare_field(tags::PATIENT_ID, &FieldValue::text("654321"), &element).unwrap();
        assert_eq!(mismatch.field, "(0010,0020) PatientID");
        assert_eq!(mismatch.actual, "123456");
    }

    #[test]
    fn decimals_compare_numerically() {
        let element = DataElement::new(
            tags::PIXEL_SPACING,
            VR::DS,
            PrimitiveValue::Strs(["3".to_string(), "3.000".to_string()].into_iter().collect()),
        );
        assert_eq!(
            compare_field(
                tags::PIXEL_SPACING,
                &FieldValue::decimals(["3.0", "3.0"]),
                &element
            ),
            None
        );
        let single = FieldValue::decimals(["3.0"]);
        assert!(compare_field(tags::PIXEL_SPACING, &single, &element).is_some());
    }

    #[test]
    fn pixel_words_compare_by_value() {
        let element = DataElement::new(
            tags::PIXEL_DATA,
            VR::OW,
            PrimitiveValue::U16([0, 0, 0, 0].into_iter().collect()),
        );
        assert_eq!(
            compare_field(tags::PIXEL_DATA, &FieldValue::Words(vec![0; 4]), &element),
            None
        );
        let mismatch =
            compare_field(tags::PIXEL_DATA, &FieldValue::Words(vec![0xBEEF; 4]), &element);
        assert!(mismatch.is_some());

        let bytes = DataElement::new(
            tags::PIXEL_DATA,
            VR::OB,
            PrimitiveValue::U8([0xEF, 0xBE, 0x01, 0x00].into_iter().collect()),
        );
        assert_eq!(
            compare_field(tags::PIXEL_DATA, &FieldValue::Words(vec![0xBEEF, 1]), &bytes),
            None
        );
    }

    #[test]
    fn empty_matches_blank_values() {
        let element = DataElement::new(tags::PATIENT_NAME, VR::PN, PrimitiveValue::Empty);
        assert_eq!(compare_field(tags::PATIENT_NAME, &FieldValue::Empty, &element), None);
        let element = DataElement::new(tags::PATIENT_NAME, VR::PN, PrimitiveValue::from(""));
        assert_eq!(compare_field(tags::PATIENT_NAME, &FieldValue::Empty, &element), None);
    }

    #[test]
    fn json_reference_keys_only() {
        let reference = json!({
            "00100010": { "vr": "PN", "Value": [{ "Alphabetic": "Doe^John" }] },
            "00100020": { "vr": "LO", "Value": ["X"] },
            "00080060": { "vr": "CS", "Value": ["MR"] },
        });
        let actual = json!({
            "00100010": { "vr": "PN", "Value": [{ "Alphabetic": "Doe^John" }] },
            "00080060": { "vr": "CS", "Value": ["CT"] },
            "00280010": { "vr": "US", "Value": [4] },
        });
        let report = compare_json(&reference, &actual);
        assert_eq!(report.checked, 2);
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].field, "00080060");
    }

    #[test]
    fn error_kinds() {
        let ok: Result<(), ReadError> = Ok(());
        assert!(!expect_error_kind(ok, ErrorKind::FileNotFound).is_ok());
        let err: Result<(), ReadError> =
            Err(crate::error::MissingArgumentSnafu { argument: "path" }.build());
        assert!(expect_error_kind(err, ErrorKind::TypeMismatch).is_ok());
    }
}
