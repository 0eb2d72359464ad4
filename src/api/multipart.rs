//! Single-file `multipart/form-data` bodies.
//!
//! The boundary is random per body and is guaranteed not to occur in the payload.

use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

pub const ZIP_CONTENT_TYPE: &str = "application/zip";

#[derive(Debug, Clone)]
pub struct MultipartBody {
    boundary: String,
    body: Bytes,
}

impl MultipartBody {
    /// Body with one file part holding a zip archive.
    pub fn zip_archive(part_name: &str, file_name: &str, archive: &[u8]) -> Self {
        Self::single_file(part_name, file_name, ZIP_CONTENT_TYPE, archive, random_boundary)
    }

    fn single_file(
        part_name: &str,
        file_name: &str,
        content_type: &str,
        payload: &[u8],
        mut next_boundary: impl FnMut() -> String,
    ) -> Self {
        let boundary = loop {
            let candidate = next_boundary();
            if !contains(payload, candidate.as_bytes()) {
                break candidate;
            }
        };

        let mut body = BytesMut::with_capacity(payload.len() + 256);
        body.put_slice(format!("--{}\r\n", boundary).as_bytes());
        body.put_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                part_name, file_name
            )
            .as_bytes(),
        );
        body.put_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.put_slice(payload);
        body.put_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        Self {
            boundary,
            body: body.freeze(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}

fn random_boundary() -> String {
    format!("npl-boundary-{}", Uuid::new_v4().simple())
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}
