use dicom::core::dictionary::DataDictionary;
use dicom::core::value::{PrimitiveValue, Value};
use dicom::core::{Tag, VR};
use dicom::dictionary_std::StandardDataDictionary;

use crate::error::{ReadError, UnknownTagSnafu};

const MAX_VALUE_LEN: usize = 120;

pub fn value_to_string<I, P>(value: &Value<I, P>, vr: VR) -> String {
    let rendered = match value {
        Value::Primitive(primitive) => format_primitive_value(primitive, vr),
        Value::Sequence(sequence) => {
            let count = sequence.multiplicity() as usize;
            let suffix = if count == 1 { "" } else { "s" };
            format!("Sequence ({count} item{suffix})")
        }
        Value::PixelSequence(sequence) => {
            let fragments = sequence.fragments().len();
            let suffix = if fragments == 1 { "" } else { "s" };
            format!("Pixel data ({fragments} fragment{suffix})")
        }
    };

    if rendered.len() > MAX_VALUE_LEN {
        let mut truncated = rendered.chars().take(MAX_VALUE_LEN).collect::<String>();
        truncated.push_str("...");
        truncated
    } else {
        rendered
    }
}

pub fn format_tag(tag: Tag) -> String {
    format!("({:04X},{:04X})", tag.group(), tag.element())
}

/// Keyword of a tag in the standard dictionary, `Unknown` otherwise.
pub fn tag_alias(tag: Tag) -> &'static str {
    StandardDataDictionary
        .by_tag(tag)
        .map(|entry| entry.alias)
        .unwrap_or("Unknown")
}

/// Accepts `(gggg,eeee)`, `gggg,eeee`, `ggggeeee` or a dictionary keyword.
pub fn parse_tag(text: &str) -> Result<Tag, ReadError> {
    let trimmed = text.trim();
    let bare = trimmed
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(trimmed);

    let hex = match bare.split_once(',') {
        Some((group, element)) => Some((group.trim(), element.trim())),
        None if bare.len() == 8 && bare.chars().all(|c| c.is_ascii_hexdigit()) => {
            Some(bare.split_at(4))
        }
        None => None,
    };
    if let Some((group, element)) = hex {
        if let (Ok(group), Ok(element)) = (
            u16::from_str_radix(group, 16),
            u16::from_str_radix(element, 16),
        ) {
            return Ok(Tag(group, element));
        }
        return UnknownTagSnafu { value: trimmed }.fail();
    }

    match StandardDataDictionary.parse_tag(bare) {
        Some(tag) => Ok(tag),
        None => UnknownTagSnafu { value: trimmed }.fail(),
    }
}

/// Strip the space and null padding DICOM puts at the end of text values.
pub fn trim_padding(text: &str) -> &str {
    text.trim_end_matches([' ', '\0'])
}

fn format_primitive_value(value: &PrimitiveValue, vr: VR) -> String {
    match value {
        PrimitiveValue::Empty => String::from("(empty)"),
        PrimitiveValue::Tags(values) => values
            .iter()
            .map(|tag| format_tag(*tag))
            .collect::<Vec<_>>()
            .join("\\"),
        PrimitiveValue::U8(_) | PrimitiveValue::U16(_) if is_binary_vr(vr) => {
            format!("Binary data ({} bytes)", value.calculate_byte_len())
        }
        _ => trim_padding(&value.to_str()).to_string(),
    }
}

fn is_binary_vr(vr: VR) -> bool {
    matches!(
        vr,
        VR::OB | VR::OD | VR::OF | VR::OL | VR::OV | VR::OW | VR::UN
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::dictionary_std::tags;

    #[test]
    fn tags_in_any_notation() {
        assert_eq!(parse_tag("(0010,0010)").unwrap(), tags::PATIENT_NAME);
        assert_eq!(parse_tag("0020,0037").unwrap(), tags::IMAGE_ORIENTATION_PATIENT);
        assert_eq!(parse_tag("00280006").unwrap(), tags::PLANAR_CONFIGURATION);
        assert_eq!(parse_tag("PatientID").unwrap(), tags::PATIENT_ID);
        assert!(parse_tag("NotAKeyword").is_err());
        assert!(parse_tag("(XYZW,0010)").is_err());
    }

    #[test]
    fn tag_rendering() {
        assert_eq!(format_tag(Tag(0x0008, 0x0005)), "(0008,0005)");
        assert_eq!(tag_alias(tags::PATIENT_NAME), "PatientName");
    }

    #[test]
    fn values_are_rendered_without_padding() {
        let value: Value<(), ()> = Value::Primitive(PrimitiveValue::from("Doe^John "));
        assert_eq!(value_to_string(&value, VR::PN), "Doe^John");
        let empty: Value<(), ()> = Value::Primitive(PrimitiveValue::Empty);
        assert_eq!(value_to_string(&empty, VR::LO), "(empty)");
        let pixels: Value<(), ()> = Value::Primitive(PrimitiveValue::U16(vec![0u16; 4].into()));
        assert_eq!(value_to_string(&pixels, VR::OW), "Binary data (8 bytes)");
    }
}
