use std::slice;

use glow::HasContext;

/// Views a slice of plain-old-data elements as raw bytes.
///
/// # Safety
/// Requires that T:
/// - Has a stable memory layout (primitive arrays such as `[f32; 2]`, or #[repr(C)])
/// - Contains only copy types
/// - Has no padding issues that would cause UB
unsafe fn as_bytes<T: Copy>(data: &[T]) -> &[u8] {
    unsafe { slice::from_raw_parts(data.as_ptr() as *const u8, size_of_val(data)) }
}

/// Respecifies the buffer bound to `target` with the contents of `data`.
///
/// # Safety
/// Same requirements on T as [`as_bytes`].
pub(super) unsafe fn buffer_upload_array<T: Copy>(
    gl: &glow::Context,
    target: u32,
    data: &[T],
    usage: u32,
) {
    unsafe { gl.buffer_data_u8_slice(target, as_bytes(data), usage) };
}

/// Overwrites `data.len()` elements of the buffer bound to `target`,
/// starting at element `first`.
///
/// # Safety
/// Same requirements on T as [`as_bytes`]; the range must lie within the
/// buffer's current size.
pub(super) unsafe fn buffer_update_array<T: Copy>(
    gl: &glow::Context,
    target: u32,
    first: usize,
    data: &[T],
) {
    let offset = (first * size_of::<T>()) as i32;
    unsafe { gl.buffer_sub_data_u8_slice(target, offset, as_bytes(data)) };
}
