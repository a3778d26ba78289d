//! Rendering framers into sample bytes

use bytes::{BufMut, Bytes, BytesMut};

use crate::framer::{Frame, Framer, UNBOUNDED};
use crate::protocol::ServerInfo;

/// Scale an amplitude to a signed 8-bit sample, saturating at ±127
pub fn to_clamped_byte(value: f64) -> i8 {
    (value * 127.0).round().clamp(-127.0, 127.0) as i8
}

fn to_clamped_i16(value: f64) -> i16 {
    (value * 32767.0).round().clamp(-32767.0, 32767.0) as i16
}

fn sum_at(framers: &[Framer], pos: Frame) -> f64 {
    framers.iter().map(|f| f.at(pos)).sum()
}

/// Render `len` signed 8-bit mono samples starting at frame `from`.
///
/// Byte `i` is the sum of all framers at `from + i`, scaled by 127 and
/// clamped, so overlapping framers saturate instead of wrapping.
pub fn mix(from: Frame, len: usize, framers: &[Framer]) -> Bytes {
    let mut buf = BytesMut::with_capacity(len);
    for i in 0..len as Frame {
        buf.put_i8(to_clamped_byte(sum_at(framers, from + i)));
    }
    buf.freeze()
}

/// Like [`mix`], but positions wrap around the longest framer so a finite
/// tune plays forever
pub fn mix_looped(from: Frame, len: usize, framers: &[Framer]) -> Bytes {
    let period = framers.iter().map(Framer::len).max().unwrap_or(0);
    match period {
        0 => Bytes::from(vec![0u8; len]),
        UNBOUNDED => mix(from, len, framers),
        period => {
            let mut buf = BytesMut::with_capacity(len);
            for i in 0..len as Frame {
                let pos = (from + i).rem_euclid(period);
                buf.put_i8(to_clamped_byte(sum_at(framers, pos)));
            }
            buf.freeze()
        }
    }
}

/// Render up to `len` bytes in the server's sample format.
///
/// `from` is a byte position as announced by the server; it is converted to
/// a frame index. Samples are big-endian and copied to every channel. Only
/// whole frames are produced, so the result is shorter than `len` when `len`
/// does not end on a frame boundary.
pub fn render(info: &ServerInfo, from: i64, len: usize, framers: &[Framer]) -> Bytes {
    let frame_bytes = info.frame_bytes();
    if frame_bytes == 1 {
        return mix(from, len, framers);
    }

    let first_frame = from.div_euclid(frame_bytes as i64);
    let frames = len / frame_bytes;
    let channels = info.channels.max(1) as usize;

    let mut buf = BytesMut::with_capacity(frames * frame_bytes);
    for i in 0..frames as Frame {
        let value = sum_at(framers, first_frame + i);
        for _ in 0..channels {
            if info.sample_bytes() == 2 {
                buf.put_i16(to_clamped_i16(value));
            } else {
                buf.put_i8(to_clamped_byte(value));
            }
        }
    }
    buf.freeze()
}
