use crate::config::AppConfig;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::{trace, warn};

/// Number of leading bytes read for signature matching.
pub const HEADER_READ_LEN: usize = 16;

/// A byte sequence expected at a fixed offset of the file header.
#[derive(Debug, Clone, Copy)]
pub struct Magic {
    pub offset: usize,
    pub bytes: &'static [u8],
}

impl Magic {
    const fn at(offset: usize, bytes: &'static [u8]) -> Self {
        Self { offset, bytes }
    }

    fn matches(&self, header: &[u8]) -> bool {
        header
            .get(self.offset..self.offset + self.bytes.len())
            .map_or(false, |window| window == self.bytes)
    }
}

/// Every `Magic` in a signature must match; any one signature of an
/// extension is enough.
type Signature = &'static [Magic];

const ID3: Magic = Magic::at(0, b"ID3");
const FTYP: Magic = Magic::at(4, b"ftyp");

static MAGIC_TABLE: &[(&str, &[Signature])] = &[
    (
        "mp3",
        &[
            &[ID3],
            &[Magic::at(0, &[0xFF, 0xFB])],
            &[Magic::at(0, &[0xFF, 0xFA])],
            &[Magic::at(0, &[0xFF, 0xF3])],
            &[Magic::at(0, &[0xFF, 0xF2])],
        ],
    ),
    ("flac", &[&[Magic::at(0, b"fLaC")], &[ID3]]),
    ("wav", &[&[Magic::at(0, b"RIFF"), Magic::at(8, b"WAVE")]]),
    (
        "aiff",
        &[
            &[Magic::at(0, b"FORM"), Magic::at(8, b"AIFF")],
            &[Magic::at(0, b"FORM"), Magic::at(8, b"AIFC")],
        ],
    ),
    ("ogg", &[&[Magic::at(0, b"OggS")]]),
    ("m4a", &[&[FTYP]]),
    ("alac", &[&[FTYP]]),
    (
        "aac",
        &[
            &[Magic::at(0, &[0xFF, 0xF1])],
            &[Magic::at(0, &[0xFF, 0xF9])],
            &[Magic::at(0, b"ADIF")],
            &[ID3],
        ],
    ),
    ("ape", &[&[Magic::at(0, b"MAC ")]]),
    (
        "wma",
        &[&[Magic::at(
            0,
            &[0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11],
        )]],
    ),
];

/// Check `header` against the signatures registered for `extension`.
/// Returns `None` when the extension has no signature on record.
pub fn matches_signature(extension: &str, header: &[u8]) -> Option<bool> {
    MAGIC_TABLE
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, signatures)| {
            signatures
                .iter()
                .any(|signature| signature.iter().all(|magic| magic.matches(header)))
        })
}

/// Lower-cased extension without the leading dot.
pub fn normalized_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| !ext.is_empty())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    pub extension_allowed: bool,
    pub header_valid: bool,
}

impl Classification {
    pub fn is_audio(&self) -> bool {
        self.extension_allowed && self.header_valid
    }
}

/// Extension allow-set plus magic-byte header validation.
#[derive(Debug, Clone)]
pub struct Classifier {
    allowed_extensions: HashSet<String>,
    permissive_headers: bool,
}

impl Classifier {
    pub fn new<S: AsRef<str>>(extensions: &[S], permissive_headers: bool) -> Self {
        let allowed_extensions = extensions
            .iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self {
            allowed_extensions,
            permissive_headers,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.audio_extensions, config.permissive_headers)
    }

    pub fn is_extension_allowed(&self, extension: &str) -> bool {
        self.allowed_extensions.contains(extension)
    }

    pub fn classify(&self, path: &Path) -> Classification {
        let extension = match normalized_extension(path) {
            Some(ext) if self.is_extension_allowed(&ext) => ext,
            _ => return Classification::default(),
        };

        Classification {
            extension_allowed: true,
            header_valid: self.validate_header(path, &extension),
        }
    }

    fn validate_header(&self, path: &Path, extension: &str) -> bool {
        let header = match read_header(path) {
            Ok(header) => header,
            Err(e) => {
                warn!("Unable to read header of {}: {}", path.display(), e);
                return false;
            }
        };

        match matches_signature(extension, &header) {
            Some(valid) => {
                trace!(path = %path.display(), valid, "Header checked");
                valid
            }
            None => {
                trace!(
                    path = %path.display(),
                    extension,
                    permissive = self.permissive_headers,
                    "No signature on record for extension"
                );
                self.permissive_headers
            }
        }
    }
}

fn read_header(path: &Path) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut header = Vec::with_capacity(HEADER_READ_LEN);
    file.take(HEADER_READ_LEN as u64).read_to_end(&mut header)?;
    Ok(header)
}
