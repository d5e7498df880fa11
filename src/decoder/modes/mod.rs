//! QR code data mode decoders
//!
//! Byte mode needs no decoder of its own; the payload parser copies bytes
//! straight from the stream.
//! - Numeric: Efficient encoding for digits (0-9)
//! - Alphanumeric: Letters, numbers, and symbols
//! - Kanji: 13-bit packed Shift JIS

/// Alphanumeric mode
pub mod alphanumeric;
/// Kanji mode
pub mod kanji;
/// Numeric mode
pub mod numeric;
