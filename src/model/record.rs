//! Synthetic records: minimal DICOM data sets built from scratch.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::Local;
use dicom::core::value::PrimitiveValue;
use dicom::core::{DataElement, Tag, VR};
use dicom::dictionary_std::tags;
use dicom::encoding::transfer_syntax::TransferSyntaxIndex;
use dicom::object::{FileMetaTableBuilder, InMemDicomObject};
use dicom::transfer_syntax::TransferSyntaxRegistry;
use snafu::{OptionExt, ResultExt};

use crate::error::{
    boxed, BuildMetaSnafu, CreateFileSnafu, FlushFileSnafu, SaveError, UnknownTransferSyntaxSnafu,
    WriteFileSnafu,
};

pub const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
pub const EXPLICIT_VR_BIG_ENDIAN: &str = "1.2.840.10008.1.2.2";

/// CT Image Storage
pub const DEFAULT_SOP_CLASS_UID: &str = "1.2.840.10008.5.1.4.1.1.2";
pub const DEFAULT_SOP_INSTANCE_UID: &str = "1.2.3";
pub const DEFAULT_IMPLEMENTATION_CLASS_UID: &str = "1.2.3.4";

/// Value of a record field as it is written to the file.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Present with a zero-length value.
    Empty,
    /// Text values (one per multiplicity), compared after trimming padding.
    Text(Vec<String>),
    /// Decimal strings, compared numerically.
    Decimal(Vec<String>),
    /// Unsigned short values.
    Unsigned(Vec<u16>),
    /// 16-bit words of binary data such as pixel samples.
    Words(Vec<u16>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(vec![value.into()])
    }

    pub fn decimals<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldValue::Decimal(values.into_iter().map(Into::into).collect())
    }

    fn to_primitive(&self) -> PrimitiveValue {
        match self {
            FieldValue::Empty => PrimitiveValue::Empty,
            FieldValue::Text(values) | FieldValue::Decimal(values) => match values.as_slice() {
                [] => PrimitiveValue::Empty,
                [single] => PrimitiveValue::from(single.as_str()),
                many => PrimitiveValue::Strs(many.iter().cloned().collect()),
            },
            FieldValue::Unsigned(values) | FieldValue::Words(values) => {
                PrimitiveValue::U16(values.iter().copied().collect())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub vr: VR,
    pub value: FieldValue,
}

/// Identification of the storage class and encoding, written as group 0002.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaHeader {
    pub media_storage_sop_class_uid: String,
    pub media_storage_sop_instance_uid: String,
    pub implementation_class_uid: String,
    pub transfer_syntax: String,
}

impl Default for MetaHeader {
    fn default() -> Self {
        Self {
            media_storage_sop_class_uid: DEFAULT_SOP_CLASS_UID.to_owned(),
            media_storage_sop_instance_uid: DEFAULT_SOP_INSTANCE_UID.to_owned(),
            implementation_class_uid: DEFAULT_IMPLEMENTATION_CLASS_UID.to_owned(),
            transfer_syntax: IMPLICIT_VR_LITTLE_ENDIAN.to_owned(),
        }
    }
}

/// An in-memory stand-in for a minimal DICOM image file.
///
/// Fields are kept in tag order.
/// Setting a nullable field to `None` keeps the element
/// but writes it with an empty value.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticRecord {
    fields: BTreeMap<Tag, Field>,
    meta: Option<MetaHeader>,
}

impl Default for SyntheticRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticRecord {
    /// The default record: patient identification, a 50x50 16-bit
    /// monochrome image geometry and the current content date and time.
    pub fn new() -> Self {
        let now = Local::now();
        let mut record = Self {
            fields: BTreeMap::new(),
            meta: Some(MetaHeader::default()),
        };
        record
            .set_patient_name(Some("Test^Firstname"))
            .set_patient_id(Some("123456"))
            .set_text(tags::CONTENT_DATE, VR::DA, now.format("%Y%m%d").to_string())
            .set_text(tags::CONTENT_TIME, VR::TM, now.format("%H%M%S.%6f").to_string())
            .set(
                tags::PIXEL_SPACING,
                VR::DS,
                FieldValue::decimals(["3.0", "3.0"]),
            )
            .set(
                tags::IMAGE_POSITION_PATIENT,
                VR::DS,
                FieldValue::decimals([
                    "-74.87273061275482",
                    "-147.24999237060547",
                    "-147.1303328871727",
                ]),
            )
            .set(
                tags::IMAGE_ORIENTATION_PATIENT,
                VR::DS,
                FieldValue::decimals([
                    "0.9995653468771569",
                    "0.027916281967051135",
                    "-0.00947620828628687",
                    "-0.02835352390030065",
                    "0.9983635539946439",
                    "-0.04966177340388578",
                ]),
            )
            .set_unsigned(tags::ROWS, 50)
            .set_unsigned(tags::COLUMNS, 50)
            .set_unsigned(tags::SAMPLES_PER_PIXEL, 1)
            .set_text(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2")
            .set_unsigned(tags::PLANAR_CONFIGURATION, 0)
            .set_unsigned(tags::BITS_ALLOCATED, 16)
            .set_unsigned(tags::BITS_STORED, 16)
            .set_unsigned(tags::HIGH_BIT, 15)
            .set_unsigned(tags::PIXEL_REPRESENTATION, 1)
            .set(tags::WINDOW_CENTER, VR::DS, FieldValue::decimals(["0"]))
            .set(tags::WINDOW_WIDTH, VR::DS, FieldValue::decimals(["100"]));
        record
    }

    /// A record with no elements and no meta header.
    pub fn empty() -> Self {
        Self {
            fields: BTreeMap::new(),
            meta: None,
        }
    }

    pub fn set(&mut self, tag: Tag, vr: VR, value: FieldValue) -> &mut Self {
        self.fields.insert(tag, Field { vr, value });
        self
    }

    pub fn set_text(&mut self, tag: Tag, vr: VR, value: impl Into<String>) -> &mut Self {
        self.set(tag, vr, FieldValue::text(value))
    }

    pub fn set_unsigned(&mut self, tag: Tag, value: u16) -> &mut Self {
        self.set(tag, VR::US, FieldValue::Unsigned(vec![value]))
    }

    fn set_nullable(&mut self, tag: Tag, vr: VR, value: Option<&str>) -> &mut Self {
        let value = value.map(FieldValue::text).unwrap_or(FieldValue::Empty);
        self.set(tag, vr, value)
    }

    pub fn set_patient_name(&mut self, name: Option<&str>) -> &mut Self {
        self.set_nullable(tags::PATIENT_NAME, VR::PN, name)
    }

    pub fn set_patient_id(&mut self, id: Option<&str>) -> &mut Self {
        self.set_nullable(tags::PATIENT_ID, VR::LO, id)
    }

    pub fn set_content_date(&mut self, date: Option<&str>) -> &mut Self {
        self.set_nullable(tags::CONTENT_DATE, VR::DA, date)
    }

    pub fn set_content_time(&mut self, time: Option<&str>) -> &mut Self {
        self.set_nullable(tags::CONTENT_TIME, VR::TM, time)
    }

    /// Add zero-valued pixel data sized after the record's rows and columns.
    pub fn set_pixel_data(&mut self) -> &mut Self {
        let rows = self.unsigned(tags::ROWS).unwrap_or(0) as usize;
        let columns = self.unsigned(tags::COLUMNS).unwrap_or(0) as usize;
        self.set(
            tags::PIXEL_DATA,
            VR::OW,
            FieldValue::Words(vec![0; rows * columns]),
        )
    }

    pub fn remove(&mut self, tag: Tag) -> Option<Field> {
        self.fields.remove(&tag)
    }

    pub fn set_meta(&mut self, meta: Option<MetaHeader>) -> &mut Self {
        self.meta = meta;
        self
    }

    pub fn with_element(mut self, tag: Tag, vr: VR, value: FieldValue) -> Self {
        self.set(tag, vr, value);
        self
    }

    pub fn with_pixel_data(mut self) -> Self {
        self.set_pixel_data();
        self
    }

    pub fn without_meta(mut self) -> Self {
        self.meta = None;
        self
    }

    pub fn field(&self, tag: Tag) -> Option<&Field> {
        self.fields.get(&tag)
    }

    pub fn fields(&self) -> impl Iterator<Item = (Tag, &Field)> + '_ {
        self.fields.iter().map(|(tag, field)| (*tag, field))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn meta(&self) -> Option<&MetaHeader> {
        self.meta.as_ref()
    }

    pub fn text(&self, tag: Tag) -> Option<&str> {
        match self.field(tag).map(|field| &field.value) {
            Some(FieldValue::Text(values)) => values.first().map(String::as_str),
            _ => None,
        }
    }

    pub fn unsigned(&self, tag: Tag) -> Option<u16> {
        match self.field(tag).map(|field| &field.value) {
            Some(FieldValue::Unsigned(values)) => values.first().copied(),
            _ => None,
        }
    }

    /// Transfer syntax the data set is encoded with.
    /// Without a meta header the data set is implicit VR little endian.
    pub fn transfer_syntax(&self) -> &str {
        self.meta
            .as_ref()
            .map(|meta| meta.transfer_syntax.as_str())
            .unwrap_or(IMPLICIT_VR_LITTLE_ENDIAN)
    }

    pub fn is_little_endian(&self) -> bool {
        self.transfer_syntax() != EXPLICIT_VR_BIG_ENDIAN
    }

    pub fn is_implicit_vr(&self) -> bool {
        self.transfer_syntax() == IMPLICIT_VR_LITTLE_ENDIAN
    }

    pub fn to_object(&self) -> InMemDicomObject {
        InMemDicomObject::from_element_iter(
            self.fields
                .iter()
                .map(|(tag, field)| DataElement::new(*tag, field.vr, field.value.to_primitive())),
        )
    }

    /// Write the record to `path`.
    ///
    /// With a meta header the file gets the 128-byte preamble,
    /// the `DICM` prefix and the file meta group.
    /// Without one, only the bare data set is written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SaveError> {
        let path = path.as_ref();
        let object = self.to_object();

        match &self.meta {
            Some(meta) => {
                log::debug!(
                    "Writing {} with file meta ({})",
                    path.display(),
                    meta.transfer_syntax
                );
                let table = FileMetaTableBuilder::new()
                    .media_storage_sop_class_uid(meta.media_storage_sop_class_uid.as_str())
                    .media_storage_sop_instance_uid(meta.media_storage_sop_instance_uid.as_str())
                    .implementation_class_uid(meta.implementation_class_uid.as_str())
                    .transfer_syntax(meta.transfer_syntax.as_str())
                    .build()
                    .map_err(boxed)
                    .context(BuildMetaSnafu)?;
                object
                    .with_exact_meta(table)
                    .write_to_file(path)
                    .map_err(boxed)
                    .context(WriteFileSnafu { filename: path })
            }
            None => {
                log::debug!("Writing {} without file meta", path.display());
                let ts = TransferSyntaxRegistry
                    .get(IMPLICIT_VR_LITTLE_ENDIAN)
                    .context(UnknownTransferSyntaxSnafu {
                        uid: IMPLICIT_VR_LITTLE_ENDIAN,
                    })?;
                let file = File::create(path).context(CreateFileSnafu { filename: path })?;
                let mut writer = BufWriter::new(file);
                object
                    .write_dataset_with_ts(&mut writer, ts)
                    .map_err(boxed)
                    .context(WriteFileSnafu { filename: path })?;
                writer.flush().context(FlushFileSnafu { filename: path })
            }
        }
    }
}
