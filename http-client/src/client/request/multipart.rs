use mime::Mime;
use rand::{thread_rng, Rng};
use std::{
    fmt::{self, Debug},
    fs::File,
    io::{copy, Read, Result as IoResult, Write},
    path::{Path, PathBuf},
};
use taskline_engine::{
    header::{IntoHeaderName, CONTENT_TYPE},
    HeaderMap, HeaderValue,
};

pub type FieldName = String;
pub type FileName = String;

/// A `multipart/form-data` payload under construction.
///
/// Fields keep their insertion order. The boundary is chosen at random per
/// payload and never validated against field contents, the odds of a
/// collision with 128 random bits are not worth streaming every part twice.
#[derive(Debug)]
pub struct Multipart {
    boundary: String,
    fields: Vec<(FieldName, Part)>,
}

/// A single field of a multipart payload.
pub struct Part {
    metadata: PartMetadata,
    body: PartBody,
}

enum PartBody {
    Bytes(Vec<u8>),
    Stream(Box<dyn Read + Send + Sync>),
    FilePath(PathBuf),
}

/// Extra headers and the file name of one part.
#[derive(Clone, Debug, Default)]
pub struct PartMetadata {
    headers: HeaderMap,
    file_name: Option<FileName>,
}

impl PartMetadata {
    /// Sets the part's `Content-Type`.
    #[inline]
    #[must_use]
    pub fn mime(mut self, mime: Mime) -> Self {
        self.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(mime.as_ref()).unwrap_or_else(|_| {
                HeaderValue::from_static("application/octet-stream")
            }),
        );
        self
    }

    /// Adds one extra header to the part.
    #[inline]
    #[must_use]
    pub fn add_header(mut self, name: impl IntoHeaderName, value: impl Into<HeaderValue>) -> Self {
        self.headers.insert(name, value.into());
        self
    }

    /// Sets the file name announced in `Content-Disposition`.
    #[inline]
    #[must_use]
    pub fn file_name(mut self, file_name: impl Into<FileName>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

impl Part {
    /// A text field.
    #[inline]
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            metadata: Default::default(),
            body: PartBody::Bytes(value.into().into_bytes()),
        }
    }

    /// A binary field.
    #[inline]
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            metadata: Default::default(),
            body: PartBody::Bytes(bytes.into()),
        }
    }

    /// A field read from a stream at encoding time.
    #[inline]
    pub fn stream(reader: impl Read + Send + Sync + 'static) -> Self {
        Self {
            metadata: Default::default(),
            body: PartBody::Stream(Box::new(reader)),
        }
    }

    /// A field read from a file at encoding time.
    ///
    /// The file name defaults to the path's final component and the
    /// `Content-Type` is guessed from the extension.
    pub fn file_path(path: impl AsRef<Path>) -> IoResult<Self> {
        let path = path.as_ref().to_owned();
        let mut metadata = PartMetadata::default();
        if let Some(file_name) = path.file_name() {
            metadata = metadata.file_name(file_name.to_string_lossy().into_owned());
        }
        metadata = metadata.mime(
            mime_guess::from_path(&path)
                .first()
                .unwrap_or(mime::APPLICATION_OCTET_STREAM),
        );
        Ok(Self {
            metadata,
            body: PartBody::FilePath(path),
        })
    }

    /// Replaces the part's metadata.
    #[inline]
    #[must_use]
    pub fn metadata(mut self, metadata: PartMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl Debug for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match &self.body {
            PartBody::Bytes(bytes) => format!("bytes({})", bytes.len()),
            PartBody::Stream(_) => "stream".to_owned(),
            PartBody::FilePath(path) => format!("file({})", path.display()),
        };
        f.debug_struct("Part")
            .field("metadata", &self.metadata)
            .field("body", &body)
            .finish()
    }
}

impl Multipart {
    #[inline]
    pub fn new() -> Self {
        Self {
            boundary: gen_boundary(),
            fields: Default::default(),
        }
    }

    /// Boundary separating the parts.
    #[inline]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Appends one named part.
    #[inline]
    #[must_use]
    pub fn add_part(mut self, name: impl Into<FieldName>, part: Part) -> Self {
        self.fields.push((name.into(), part));
        self
    }

    /// Encodes the whole payload into memory.
    pub(super) fn into_bytes(self) -> IoResult<Vec<u8>> {
        let mut encoded = Vec::new();
        for (name, part) in self.fields {
            encoded.write_all(b"--")?;
            encoded.write_all(self.boundary.as_bytes())?;
            encoded.write_all(b"\r\n")?;
            write!(encoded, "content-disposition: form-data; name=\"{}\"", escape_quoted(&name))?;
            if let Some(file_name) = &part.metadata.file_name {
                write!(encoded, "; filename=\"{}\"", escape_quoted(file_name))?;
            }
            encoded.write_all(b"\r\n")?;
            for (header_name, header_value) in part.metadata.headers.iter() {
                write!(encoded, "{}: ", header_name)?;
                encoded.write_all(header_value.as_bytes())?;
                encoded.write_all(b"\r\n")?;
            }
            encoded.write_all(b"\r\n")?;
            match part.body {
                PartBody::Bytes(bytes) => encoded.write_all(&bytes)?,
                PartBody::Stream(mut reader) => {
                    copy(&mut reader, &mut encoded)?;
                }
                PartBody::FilePath(path) => {
                    copy(&mut File::open(path)?, &mut encoded)?;
                }
            }
            encoded.write_all(b"\r\n")?;
        }
        encoded.write_all(b"--")?;
        encoded.write_all(self.boundary.as_bytes())?;
        encoded.write_all(b"--\r\n")?;
        Ok(encoded)
    }
}

impl Default for Multipart {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

fn gen_boundary() -> String {
    let mut rng = thread_rng();
    format!("{:016x}{:016x}", rng.gen::<u64>(), rng.gen::<u64>())
}

fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
