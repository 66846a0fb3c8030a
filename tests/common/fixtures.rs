//! Byte fixtures with real magic numbers
//!
//! Upload validation sniffs file content, so fixtures only need valid
//! headers, not playable media. The fake tools never parse them.

/// A minimal RIFF/WAVE header padded to 64 bytes.
pub fn wav_bytes() -> Vec<u8> {
    let mut bytes = b"RIFF\x24\x00\x00\x00WAVE".to_vec();
    bytes.resize(64, 0);
    bytes
}

/// A WAVE header followed by the marker that makes the fake probe
/// report the file as corrupt.
pub fn corrupt_wav_bytes() -> Vec<u8> {
    let mut bytes = wav_bytes();
    bytes.extend_from_slice(b"CORRUPT");
    bytes
}

/// An MP3 upload (ID3 header).
pub fn mp3_bytes() -> Vec<u8> {
    let mut bytes = b"ID3\x04\x00\x00\x00\x00\x00\x00".to_vec();
    bytes.resize(64, 0);
    bytes
}

/// A minimal JPEG.
pub fn jpeg_bytes() -> Vec<u8> {
    let mut bytes = b"\xff\xd8\xff\xe0".to_vec();
    bytes.resize(64, 0);
    bytes
}

/// A minimal PNG.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.resize(64, 0);
    bytes
}

/// Bytes no sniffer recognizes.
pub fn unknown_bytes() -> Vec<u8> {
    vec![0u8; 64]
}
