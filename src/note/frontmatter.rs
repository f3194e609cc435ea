//! YAML frontmatter splitting.
//!
//! A note has frontmatter when its first line is `---` and a later line is
//! `---` too; the lines between are parsed as a YAML mapping. Everything else
//! is body text.

use serde_yaml::Mapping;

/// Split `text` into its frontmatter mapping (if any) and body.
///
/// An unterminated opening fence means the file has no frontmatter at all.
/// A terminated block that is not valid YAML, or is YAML but not a mapping,
/// is an error.
pub fn split_frontmatter(text: &str) -> Result<(Option<Mapping>, String), serde_yaml::Error> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let Some(rest) = strip_fence_line(text) else {
        return Ok((None, text.to_string()));
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            let mapping = parse_mapping(yaml)?;
            return Ok((Some(mapping), trim_leading_blank_line(body).to_string()));
        }
        offset += line.len();
    }

    Ok((None, text.to_string()))
}

fn strip_fence_line(text: &str) -> Option<&str> {
    text.strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
}

fn parse_mapping(yaml: &str) -> Result<Mapping, serde_yaml::Error> {
    if yaml.trim().is_empty() {
        return Ok(Mapping::new());
    }
    serde_yaml::from_str::<Mapping>(yaml)
}

fn trim_leading_blank_line(body: &str) -> &str {
    body.strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body)
}
