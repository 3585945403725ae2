use std::fs;
use std::path::Path;

use image::Rgb;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub color: Rgb<u8>,
}

/// Ordered class names with their display colors. Index `i` is class `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<Label>,
}

const PASCAL_VOC: [&str; 21] = [
    "background",
    "aeroplane",
    "bicycle",
    "bird",
    "boat",
    "bottle",
    "bus",
    "car",
    "cat",
    "chair",
    "cow",
    "diningtable",
    "dog",
    "horse",
    "motorbike",
    "person",
    "pottedplant",
    "sheep",
    "sofa",
    "train",
    "tvmonitor",
];

impl LabelSet {
    pub fn new(labels: Vec<Label>) -> Self {
        Self { labels }
    }

    /// Label set built from names only, colored with the VOC palette.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Label {
                name: name.into(),
                color: palette_color(i),
            })
            .collect();
        Self { labels }
    }

    pub fn pascal_voc() -> Self {
        Self::from_names(PASCAL_VOC)
    }

    /// Read a label file: one `name` or `name r g b` per line, `#` comments allowed.
    ///
    /// An unreadable, empty or malformed file is a [`PipelineError::ModelLoad`]
    /// naming the file, since the model cannot be used without its labels.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let text = fs::read_to_string(path)
            .map_err(|e| label_err(&origin, format!("cannot read label file: {e}")))?;
        Self::parse_from(&text, &origin)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_from(text, "label set")
    }

    fn parse_from(text: &str, origin: &str) -> Result<Self> {
        let mut labels = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            // Skip blanks and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            let color = match fields.len() {
                // Name only: fall back to the palette slot for this index
                1 => palette_color(labels.len()),
                4 => {
                    let mut rgb = [0u8; 3];
                    for (slot, field) in rgb.iter_mut().zip(&fields[1..]) {
                        *slot = field.parse().map_err(|_| {
                            label_err(
                                origin,
                                format!("line {}: invalid color component {field:?}", line_no + 1),
                            )
                        })?;
                    }
                    Rgb(rgb)
                }
                n => {
                    return Err(label_err(
                        origin,
                        format!(
                            "line {}: expected `name` or `name r g b`, found {n} fields",
                            line_no + 1
                        ),
                    ))
                }
            };
            labels.push(Label {
                name: fields[0].to_string(),
                color,
            });
        }
        if labels.is_empty() {
            return Err(label_err(origin, "label file defines no labels".to_string()));
        }
        Ok(Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&Label> {
        self.labels.get(index as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.labels.iter().map(|l| l.name.as_str()).collect()
    }
}

fn label_err(origin: &str, reason: String) -> PipelineError {
    PipelineError::ModelLoad {
        model: origin.to_string(),
        reason,
    }
}

/// The VOC color map: bits of the index are spread across the high bits of r, g and b.
pub fn palette_color(index: usize) -> Rgb<u8> {
    let mut rgb = [0u8; 3];
    let mut c = index;
    for shift in (0..8).rev() {
        for (channel, value) in rgb.iter_mut().enumerate() {
            *value |= (((c >> channel) & 1) as u8) << shift;
        }
        c >>= 3;
    }
    Rgb(rgb)
}
