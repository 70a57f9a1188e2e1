//! multipart/form-data encoding of a camera frame
//!
//! Layout of the body:
//! ```text
//! --<B>\r\n
//! Content-Disposition: form-data; name="image"; filename="capture.jpg"\r\n
//! Content-Type: image/jpeg\r\n
//! \r\n
//! <jpeg bytes>
//! \r\n--<B>\r\n                                   (only with a camera id)
//! Content-Disposition: form-data; name="camera_id"\r\n
//! \r\n
//! <camera id>
//! \r\n--<B>--\r\n
//! ```

use crate::system::error::SyncError;
use alloc::vec::Vec;

macro_rules! boundary {
    () => {
        "----ParkingGateFrameBoundary"
    };
}

/// Part boundary
pub const BOUNDARY: &str = boundary!();

/// `Content-Type` header value for the encoded body
pub const CONTENT_TYPE: &str = concat!("multipart/form-data; boundary=", boundary!());

const IMAGE_HEAD: &str = concat!(
    "--",
    boundary!(),
    "\r\nContent-Disposition: form-data; name=\"image\"; filename=\"capture.jpg\"\r\n",
    "Content-Type: image/jpeg\r\n\r\n"
);

const CAMERA_ID_HEAD: &str = concat!(
    "\r\n--",
    boundary!(),
    "\r\nContent-Disposition: form-data; name=\"camera_id\"\r\n\r\n"
);

const TAIL: &str = concat!("\r\n--", boundary!(), "--\r\n");

/// Total body size for a frame of `frame_len` bytes
pub fn encoded_len(frame_len: usize, camera_id: Option<&str>) -> usize {
    IMAGE_HEAD.len()
        + frame_len
        + camera_id.map_or(0, |id| CAMERA_ID_HEAD.len() + id.len())
        + TAIL.len()
}

/// Encode `frame` (and optionally the camera id) as a multipart body
///
/// The whole body is allocated up front. If the heap cannot hold it the
/// upload is abandoned with [`SyncError::OutOfMemory`] instead of aborting.
pub fn encode_frame(frame: &[u8], camera_id: Option<&str>) -> Result<Vec<u8>, SyncError> {
    let total = encoded_len(frame.len(), camera_id);
    let mut body = Vec::new();
    body.try_reserve_exact(total).map_err(|_| SyncError::OutOfMemory)?;

    body.extend_from_slice(IMAGE_HEAD.as_bytes());
    body.extend_from_slice(frame);
    if let Some(id) = camera_id {
        body.extend_from_slice(CAMERA_ID_HEAD.as_bytes());
        body.extend_from_slice(id.as_bytes());
    }
    body.extend_from_slice(TAIL.as_bytes());
    Ok(body)
}
