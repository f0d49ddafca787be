//! Binding for the engine's native block codec
//!
//! The codec lives in a vendor library this crate does not link against.
//! Whoever locates the library hands the entry point to
//! [`NativeDecompressor::bind`]; the first binding wins for the rest of the
//! process.

use std::ffi::c_void;
use std::sync::OnceLock;
use tracing::info;

use super::{BlockDecompressor, DecompressError, DecompressResult, check_expected_size};

/// Native entry point signature
///
/// Arguments: compressed pointer and length, output pointer and capacity,
/// fuzz-safe flag, CRC-check flag, verbosity, five callback/scratch pointers
/// (always null), thread phase. Returns the number of bytes written, or a
/// non-positive value on failure.
pub type DecompressRoutine = unsafe extern "C" fn(
    src: *const u8,
    src_len: i64,
    dst: *mut u8,
    dst_len: i64,
    fuzz_safe: i32,
    check_crc: i32,
    verbosity: i32,
    dec_buf_base: *mut c_void,
    dec_buf_size: *mut c_void,
    callback: *mut c_void,
    callback_user_data: *mut c_void,
    decoder_memory: *mut c_void,
    thread_phase: i32,
) -> i64;

/// Reject inputs that could make the decoder read out of bounds
pub const FUZZ_SAFE_YES: i32 = 1;
/// Skip block CRC verification
pub const CHECK_CRC_NO: i32 = 0;
/// No diagnostic output from the codec
pub const VERBOSITY_NONE: i32 = 0;
/// Decode the whole block on the calling thread
pub const THREAD_PHASE_UNTHREADED: i32 = 3;

static NATIVE: OnceLock<NativeDecompressor> = OnceLock::new();

/// The bound native codec
#[derive(Clone, Copy)]
pub struct NativeDecompressor {
    routine: DecompressRoutine,
}

impl std::fmt::Debug for NativeDecompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeDecompressor").finish_non_exhaustive()
    }
}

impl NativeDecompressor {
    /// Bind the native routine for this process
    ///
    /// Only the first call stores `routine`; later calls are no-ops that
    /// return the instance already bound.
    ///
    /// # Safety
    ///
    /// `routine` must follow [`DecompressRoutine`]'s contract: write at most
    /// `dst_len` bytes to `dst`, read at most `src_len` bytes from `src`, and
    /// stay valid for the lifetime of the process.
    #[allow(unsafe_code)]
    pub unsafe fn bind(routine: DecompressRoutine) -> &'static Self {
        NATIVE.get_or_init(|| {
            info!("native block decompressor bound");
            Self { routine }
        })
    }

    /// The instance bound by [`Self::bind`], if any
    pub fn bound() -> Option<&'static Self> {
        NATIVE.get()
    }
}

impl BlockDecompressor for NativeDecompressor {
    #[allow(unsafe_code)]
    fn decompress(&self, compressed: &[u8], expected_size: usize) -> DecompressResult<Vec<u8>> {
        check_expected_size(expected_size)?;

        let mut out = vec![0u8; expected_size];
        let null = std::ptr::null_mut::<c_void>();

        // SAFETY: both buffers are live for the call and their lengths are
        // passed alongside; `bind` requires the routine to respect them.
        let written = unsafe {
            (self.routine)(
                compressed.as_ptr(),
                compressed.len() as i64,
                out.as_mut_ptr(),
                expected_size as i64,
                FUZZ_SAFE_YES,
                CHECK_CRC_NO,
                VERBOSITY_NONE,
                null,
                null,
                null,
                null,
                null,
                THREAD_PHASE_UNTHREADED,
            )
        };

        if written <= 0 {
            return Err(DecompressError::CodecFailed(written));
        }

        let written = usize::try_from(written).unwrap_or(usize::MAX);
        out.truncate(written.min(expected_size));
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "native"
    }
}
