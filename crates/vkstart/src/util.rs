use std::ffi::{c_char, CStr};

///Converts a fixed size, nul terminated name array as found in Vulkan property structs (like `device_name` or `layer_name`)
/// into an owned string. If the array is not nul terminated the whole array is used.
pub fn name_from_raw(raw: &[c_char]) -> String {
    let bytes: &[u8] = bytemuck::cast_slice(raw);
    match CStr::from_bytes_until_nul(bytes) {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

///Returns true if the raw name array holds exactly `name`.
pub fn raw_name_eq(raw: &[c_char], name: &CStr) -> bool {
    let bytes: &[u8] = bytemuck::cast_slice(raw);
    match CStr::from_bytes_until_nul(bytes) {
        Ok(raw_name) => raw_name == name,
        Err(_) => false,
    }
}

///Splits a packed Vulkan version into `(major, minor, patch)`.
pub fn version_triple(version: u32) -> (u32, u32, u32) {
    (
        ash::vk::api_version_major(version),
        ash::vk::api_version_minor(version),
        ash::vk::api_version_patch(version),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_raw<const N: usize>(s: &[u8]) -> [c_char; N] {
        let mut raw = [0 as c_char; N];
        for (dst, src) in raw.iter_mut().zip(s.iter()) {
            *dst = *src as c_char;
        }
        raw
    }

    #[test]
    fn raw_names() {
        let raw: [c_char; 32] = to_raw(b"VK_LAYER_KHRONOS_validation");
        assert_eq!(name_from_raw(&raw), "VK_LAYER_KHRONOS_validation");
        assert!(raw_name_eq(&raw, c"VK_LAYER_KHRONOS_validation"));
        assert!(!raw_name_eq(&raw, c"VK_LAYER_KHRONOS"));
    }

    #[test]
    fn unterminated_name_is_used_completely() {
        let raw: [c_char; 4] = to_raw(b"abcd");
        assert_eq!(name_from_raw(&raw), "abcd");
        assert!(!raw_name_eq(&raw, c"abcd"));
    }

    #[test]
    fn version_split() {
        let version = ash::vk::make_api_version(0, 1, 0, 3);
        assert_eq!(version_triple(version), (1, 0, 3));
    }
}
