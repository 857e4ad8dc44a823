pub mod formatting;

pub use formatting::{format_tag, parse_tag, tag_alias, trim_padding, value_to_string};
