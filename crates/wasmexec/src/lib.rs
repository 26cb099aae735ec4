//! The WebAssembly-hosted entrypoint for the compiler.
//!
//! When the compiler is built for `wasm32-unknown-unknown`, a host drives it
//! through [`run`]: the host writes the source bytes into the exported
//! linear memory, calls `run` with their address and length, and reads the
//! result at the returned pointer as an unsigned little-endian 32-bit length
//! followed by that many bytes. On success the payload is the compiled
//! module; on failure it is the ASCII text `error: <kind>`.

#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::undocumented_unsafe_blocks)]

use std::cell::UnsafeCell;

struct OutputBuffer(UnsafeCell<Vec<u8>>);

// SAFETY: the module runs single-threaded and `run` is not re-entrant by
// contract, so the buffer is never aliased.
unsafe impl Sync for OutputBuffer {}

static OUTPUT: OutputBuffer = OutputBuffer(UnsafeCell::new(Vec::new()));

/// Compiles the `len` source bytes at `input` and returns a pointer to the
/// length-prefixed result. The result is valid until the next call, which
/// recycles the output buffer.
///
/// # Safety
///
/// `input..input + len` must be readable, and calls must not be re-entrant.
#[no_mangle]
pub unsafe extern "C" fn run(input: *const u8, len: usize) -> *const u8 {
    // SAFETY: the caller passes the address and length of the source bytes
    // it wrote into linear memory.
    let source = unsafe { std::slice::from_raw_parts(input, len) };

    let result = std::str::from_utf8(source)
        .map_err(|_| sexpr2wasm_compile::Error::Syntax)
        .and_then(sexpr2wasm_compile::compile);

    let payload = match result {
        Ok(wasm) => wasm,
        Err(error) => format!("error: {}", error.name()).into_bytes(),
    };

    // SAFETY: `run` is not re-entrant, so no other reference to the buffer
    // exists.
    let output = unsafe { &mut *OUTPUT.0.get() };
    output.clear();
    output.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    output.extend_from_slice(&payload);
    output.as_ptr()
}
