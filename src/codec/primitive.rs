//! Primitive field codec.
//!
//! Every function either writes/reads a whole value or leaves the buffer
//! untouched. A `false`/`None` result means "not enough room yet", never an
//! error. All multi-byte integers are Big Endian.

use bytes::{Buf, BufMut};

macro_rules! fixed_width {
    ($put:ident, $get:ident, $ty:ty, $buf_put:ident, $buf_get:ident) => {
        #[doc = concat!("Write a `", stringify!($ty), "` if it fits.")]
        #[inline]
        pub fn $put(buf: &mut dyn BufMut, value: $ty) -> bool {
            if buf.remaining_mut() < std::mem::size_of::<$ty>() {
                return false;
            }
            buf.$buf_put(value);
            true
        }

        #[doc = concat!("Read a `", stringify!($ty), "` if enough bytes are available.")]
        #[inline]
        pub fn $get(buf: &mut dyn Buf) -> Option<$ty> {
            if buf.remaining() < std::mem::size_of::<$ty>() {
                return None;
            }
            Some(buf.$buf_get())
        }
    };
}

fixed_width!(try_put_u8, try_get_u8, u8, put_u8, get_u8);
fixed_width!(try_put_i8, try_get_i8, i8, put_i8, get_i8);
fixed_width!(try_put_i32, try_get_i32, i32, put_i32, get_i32);
fixed_width!(try_put_i64, try_get_i64, i64, put_i64, get_i64);

/// Write a boolean as a single byte (0 or 1).
#[inline]
pub fn try_put_bool(buf: &mut dyn BufMut, value: bool) -> bool {
    try_put_u8(buf, u8::from(value))
}

/// Read a boolean; any non-zero byte is `true`.
#[inline]
pub fn try_get_bool(buf: &mut dyn Buf) -> Option<bool> {
    try_get_u8(buf).map(|b| b != 0)
}

/// Write two bytes together or not at all.
#[inline]
pub fn try_put_pair(buf: &mut dyn BufMut, first: u8, second: u8) -> bool {
    if buf.remaining_mut() < 2 {
        return false;
    }
    buf.put_u8(first);
    buf.put_u8(second);
    true
}

/// Read two bytes together or not at all.
#[inline]
pub fn try_get_pair(buf: &mut dyn Buf) -> Option<(u8, u8)> {
    if buf.remaining() < 2 {
        return None;
    }
    Some((buf.get_u8(), buf.get_u8()))
}

/// Copy as much of `src` as fits. Returns the number of bytes written.
#[inline]
pub fn put_partial(buf: &mut dyn BufMut, src: &[u8]) -> usize {
    let n = src.len().min(buf.remaining_mut());
    buf.put_slice(&src[..n]);
    n
}

/// Move up to `want` bytes into `dst`. Returns the number of bytes read.
#[inline]
pub fn get_partial(buf: &mut dyn Buf, dst: &mut Vec<u8>, want: usize) -> usize {
    let n = want.min(buf.remaining());
    let start = dst.len();
    dst.resize(start + n, 0);
    buf.copy_to_slice(&mut dst[start..]);
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_i64_big_endian() {
        let mut storage = [0u8; 8];
        let mut window: &mut [u8] = &mut storage;
        assert!(try_put_i64(&mut window, 0x0102_0304_0506_0708));
        assert_eq!(storage, [1, 2, 3, 4, 5, 6, 7, 8]);

        let mut input: &[u8] = &storage;
        assert_eq!(try_get_i64(&mut input), Some(0x0102_0304_0506_0708));
        assert!(input.is_empty());
    }

    #[test]
    fn test_put_does_not_split_value() {
        let mut storage = [0u8; 3];
        let mut window: &mut [u8] = &mut storage;
        assert!(!try_put_i32(&mut window, 7));
        // Nothing consumed
        assert_eq!(window.len(), 3);
        assert!(try_put_u8(&mut window, 9));
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_get_does_not_consume_partial_value() {
        let bytes = [0u8, 0, 1];
        let mut input: &[u8] = &bytes;
        assert_eq!(try_get_i32(&mut input), None);
        assert_eq!(input.len(), 3);
    }

    #[test]
    fn test_bool_and_i8() {
        let mut storage = [0u8; 2];
        let mut window: &mut [u8] = &mut storage;
        assert!(try_put_bool(&mut window, true));
        assert!(try_put_i8(&mut window, -1));
        assert_eq!(storage, [1, 0xFF]);

        let mut input: &[u8] = &[2, 0xFF];
        assert_eq!(try_get_bool(&mut input), Some(true));
        assert_eq!(try_get_i8(&mut input), Some(-1));
        assert_eq!(try_get_bool(&mut input), None);
    }

    #[test]
    fn test_pair_is_atomic() {
        let mut storage = [0u8; 1];
        let mut window: &mut [u8] = &mut storage;
        assert!(!try_put_pair(&mut window, 21, 23));
        assert_eq!(window.len(), 1);

        let mut input: &[u8] = &[21];
        assert_eq!(try_get_pair(&mut input), None);
        assert_eq!(input.len(), 1);
    }

    #[test]
    fn test_partial_copy() {
        let mut storage = [0u8; 4];
        let mut window: &mut [u8] = &mut storage;
        assert_eq!(put_partial(&mut window, b"abcdef"), 4);
        assert_eq!(&storage, b"abcd");

        let mut input: &[u8] = b"xyz";
        let mut out = b"ab".to_vec();
        assert_eq!(get_partial(&mut input, &mut out, 5), 3);
        assert_eq!(out, b"abxyz");
    }
}
