//! Reading DICOM files with a configurable option set.
//!
//! Parsing is entirely delegated to the DICOM library.
//! This module picks how the library is invoked
//! (preamble handling, pixel data cut-off, forced reads of bare data sets)
//! and shapes what comes back (tag allow-list, deferred values).
use std::borrow::Cow;
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use dicom::core::header::{HasLength, Header};
use dicom::core::value::Value;
use dicom::core::{Tag, VR};
use dicom::dictionary_std::tags;
use dicom::encoding::transfer_syntax::TransferSyntaxIndex;
use dicom::object::file::ReadPreamble;
use dicom::object::mem::InMemElement;
use dicom::object::{DefaultDicomObject, FileMetaTable, InMemDicomObject, OpenFileOptions};
use dicom::transfer_syntax::TransferSyntaxRegistry;
use snafu::{OptionExt, ResultExt};

use super::defer::DeferSize;
use super::record::{
    EXPLICIT_VR_BIG_ENDIAN, EXPLICIT_VR_LITTLE_ENDIAN, IMPLICIT_VR_LITTLE_ENDIAN,
};
use crate::error::{
    boxed, DeferredElementMissingSnafu, FileNotFoundSnafu, MissingHeaderSnafu, ParseDataSetSnafu,
    ParseFileSnafu, ReadError, ReadFileSnafu, ToJsonSnafu, UnsupportedTransferSyntaxSnafu,
};

const PREAMBLE_LEN: usize = 128;
const MAGIC: &[u8; 4] = b"DICM";

/// Options for [`read_file`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadOptions {
    pub defer_size: DeferSize,
    pub stop_before_pixels: bool,
    pub force: bool,
    pub specific_tags: Option<Vec<Tag>>,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defer_size(mut self, defer_size: impl Into<DeferSize>) -> Self {
        self.defer_size = defer_size.into();
        self
    }

    pub fn stop_before_pixels(mut self, stop: bool) -> Self {
        self.stop_before_pixels = stop;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn specific_tags<I>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = Tag>,
    {
        self.specific_tags = Some(tags.into_iter().collect());
        self
    }

    /// Whether an element with this tag belongs in the result.
    /// Specific Character Set is always kept,
    /// as it is needed to decode the other text values.
    pub fn allows(&self, tag: Tag) -> bool {
        if self.stop_before_pixels && tag >= tags::PIXEL_DATA {
            return false;
        }
        match &self.specific_tags {
            None => true,
            Some(allowed) => tag == tags::SPECIFIC_CHARACTER_SET || allowed.contains(&tag),
        }
    }
}

/// Where the element value currently lives.
#[derive(Debug, Clone)]
enum Slot {
    Loaded(InMemElement),
    Deferred { vr: VR, length: u64 },
}

/// A data set read from a file.
#[derive(Debug, Clone)]
pub struct ReadDataset {
    filename: PathBuf,
    meta: Option<FileMetaTable>,
    transfer_syntax: String,
    elements: BTreeMap<Tag, Slot>,
    options: ReadOptions,
    /// Full re-read of the file, made on the first deferred access.
    reloaded: OnceCell<InMemDicomObject>,
}

/// Read the DICOM file at `path`.
pub fn read_file(path: impl AsRef<Path>, options: &ReadOptions) -> Result<ReadDataset, ReadError> {
    let path = path.as_ref();
    log::info!("Reading DICOM file: {}", path.display());
    let source = load_object(path, options.force, options.stop_before_pixels)?;

    let mut elements = BTreeMap::new();
    for element in source.object.iter() {
        let tag = element.tag();
        if !options.allows(tag) {
            continue;
        }
        let slot = match deferred_length(element, options.defer_size) {
            Some(length) => {
                log::debug!("Deferring {tag} ({length} bytes)");
                Slot::Deferred {
                    vr: element.vr(),
                    length,
                }
            }
            None => Slot::Loaded(element.clone()),
        };
        elements.insert(tag, slot);
    }

    Ok(ReadDataset {
        filename: path.to_path_buf(),
        meta: source.meta,
        transfer_syntax: source.transfer_syntax,
        elements,
        options: options.clone(),
        reloaded: OnceCell::new(),
    })
}

impl ReadDataset {
    /// The file this data set was read from.
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    /// The file meta table, absent when a bare data set was read with force.
    pub fn meta(&self) -> Option<&FileMetaTable> {
        self.meta.as_ref()
    }

    /// Number of elements in the file meta group.
    pub fn meta_len(&self) -> usize {
        self.meta
            .as_ref()
            .map(|meta| meta.clone().into_element_iter().count())
            .unwrap_or(0)
    }

    pub fn transfer_syntax(&self) -> &str {
        &self.transfer_syntax
    }

    pub fn is_little_endian(&self) -> bool {
        self.transfer_syntax != EXPLICIT_VR_BIG_ENDIAN
    }

    pub fn is_implicit_vr(&self) -> bool {
        self.transfer_syntax == IMPLICIT_VR_LITTLE_ENDIAN
    }

    /// Number of elements in the data set, not counting the meta group.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.elements.contains_key(&tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.elements.keys().copied()
    }

    pub fn is_deferred(&self, tag: Tag) -> bool {
        matches!(self.elements.get(&tag), Some(Slot::Deferred { .. }))
    }

    pub fn deferred_tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.elements.iter().filter_map(|(tag, slot)| match slot {
            Slot::Deferred { .. } => Some(*tag),
            Slot::Loaded(_) => None,
        })
    }

    /// VR and stored length of a deferred element.
    pub fn deferred_info(&self, tag: Tag) -> Option<(VR, u64)> {
        match self.elements.get(&tag) {
            Some(Slot::Deferred { vr, length }) => Some((*vr, *length)),
            _ => None,
        }
    }

    /// Fetch an element, reading deferred values back from the file.
    ///
    /// The first deferred access parses the whole file again
    /// and keeps the result for later ones.
    pub fn element(&self, tag: Tag) -> Result<Option<Cow<'_, InMemElement>>, ReadError> {
        match self.elements.get(&tag) {
            None => Ok(None),
            Some(Slot::Loaded(element)) => Ok(Some(Cow::Borrowed(element))),
            Some(Slot::Deferred { .. }) => self.reload(tag).map(|e| Some(Cow::Borrowed(e))),
        }
    }

    /// The element value as trimmed text, if present.
    pub fn text(&self, tag: Tag) -> Result<Option<String>, ReadError> {
        Ok(self.element(tag)?.map(|element| {
            element
                .to_str()
                .map(|text| crate::utils::trim_padding(&text).to_string())
                .unwrap_or_default()
        }))
    }

    /// All elements with deferred values loaded.
    pub fn to_object(&self) -> Result<InMemDicomObject, ReadError> {
        let mut elements = Vec::with_capacity(self.elements.len());
        for tag in self.elements.keys() {
            if let Some(element) = self.element(*tag)? {
                elements.push(element.into_owned());
            }
        }
        Ok(InMemDicomObject::from_element_iter(elements))
    }

    /// The data set together with its meta table,
    /// or `None` when there is no meta table to attach.
    pub fn to_file_object(&self) -> Result<Option<DefaultDicomObject>, ReadError> {
        let Some(meta) = &self.meta else {
            return Ok(None);
        };
        Ok(Some(self.to_object()?.with_exact_meta(meta.clone())))
    }

    /// The data set in the DICOM JSON model, without the meta group.
    /// Encapsulated pixel data has no JSON form and is left out.
    pub fn to_json(&self) -> Result<serde_json::Value, ReadError> {
        let object = InMemDicomObject::from_element_iter(
            self.to_object()?
                .into_iter()
                .filter(|element| !matches!(element.value(), Value::PixelSequence { .. })),
        );
        dicom_json::to_value(&object).context(ToJsonSnafu)
    }

    fn reload(&self, tag: Tag) -> Result<&InMemElement, ReadError> {
        let object = match self.reloaded.get() {
            Some(object) => object,
            None => {
                log::debug!("Loading deferred values from {}", self.filename.display());
                let source = load_object(&self.filename, self.options.force, false)?;
                self.reloaded.get_or_init(|| source.object)
            }
        };
        object.element(tag).ok().context(DeferredElementMissingSnafu {
            filename: &self.filename,
            tag,
        })
    }
}

/// Stored length of an element if its value is to be deferred.
/// Sequences and undefined lengths are always loaded.
fn deferred_length(element: &InMemElement, defer_size: DeferSize) -> Option<u64> {
    if defer_size == DeferSize::Never {
        return None;
    }
    let primitive = element.value().primitive()?;
    let length = element
        .length()
        .get()
        .map(u64::from)
        .unwrap_or_else(|| primitive.calculate_byte_len() as u64);
    defer_size.should_defer(length).then_some(length)
}

struct LoadedObject {
    meta: Option<FileMetaTable>,
    transfer_syntax: String,
    object: InMemDicomObject,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Signature {
    /// 128-byte preamble followed by `DICM`
    Preamble,
    /// `DICM` right at the start of the file
    Magic,
    Missing,
}

fn sniff_header(path: &Path) -> Result<Signature, ReadError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(e).context(FileNotFoundSnafu { filename: path })
        }
        Err(e) => return Err(e).context(ReadFileSnafu { filename: path }),
    };
    let mut head = Vec::with_capacity(PREAMBLE_LEN + MAGIC.len());
    file.take((PREAMBLE_LEN + MAGIC.len()) as u64)
        .read_to_end(&mut head)
        .context(ReadFileSnafu { filename: path })?;

    if head.get(PREAMBLE_LEN..) == Some(&MAGIC[..]) {
        Ok(Signature::Preamble)
    } else if head.starts_with(MAGIC) {
        Ok(Signature::Magic)
    } else {
        Ok(Signature::Missing)
    }
}

fn load_object(
    path: &Path,
    force: bool,
    stop_before_pixels: bool,
) -> Result<LoadedObject, ReadError> {
    let preamble = match sniff_header(path)? {
        Signature::Preamble => ReadPreamble::Always,
        Signature::Magic if force => {
            log::warn!("{}: no preamble before DICM prefix", path.display());
            ReadPreamble::Never
        }
        Signature::Missing if force => return load_bare_data_set(path),
        Signature::Magic | Signature::Missing => {
            return MissingHeaderSnafu { filename: path }.fail()
        }
    };

    let mut options = OpenFileOptions::new().read_preamble(preamble);
    if stop_before_pixels {
        options = options.read_until(tags::PIXEL_DATA);
    }
    let object = options
        .open_file(path)
        .map_err(boxed)
        .context(ParseFileSnafu { filename: path })?;

    let meta = object.meta().clone();
    let transfer_syntax = trim_uid(&meta.transfer_syntax).to_string();
    Ok(LoadedObject {
        meta: Some(meta),
        transfer_syntax,
        object: object.into_inner(),
    })
}

/// Read a data set which has neither preamble nor file meta group.
/// The transfer syntax is guessed from the first element header:
/// two VR characters after the tag mean explicit VR.
fn load_bare_data_set(path: &Path) -> Result<LoadedObject, ReadError> {
    log::warn!(
        "{}: no file meta header, reading bare data set",
        path.display()
    );
    let data = std::fs::read(path).context(ReadFileSnafu { filename: path })?;

    let uid = match data.get(4..6) {
        Some(&[a, b]) if VR::from_binary([a, b]).is_some() => EXPLICIT_VR_LITTLE_ENDIAN,
        _ => IMPLICIT_VR_LITTLE_ENDIAN,
    };
    log::debug!("Guessed transfer syntax {uid}");

    let object = if data.is_empty() {
        InMemDicomObject::new_empty()
    } else {
        let ts = TransferSyntaxRegistry
            .get(uid)
            .context(UnsupportedTransferSyntaxSnafu { uid })?;
        InMemDicomObject::read_dataset_with_ts(data.as_slice(), ts)
            .map_err(boxed)
            .context(ParseDataSetSnafu {
                filename: path,
                transfer_syntax: uid,
            })?
    };

    Ok(LoadedObject {
        meta: None,
        transfer_syntax: uid.to_string(),
        object,
    })
}

fn trim_uid(uid: &str) -> &str {
    uid.trim_end_matches(['\0', ' '])
}
