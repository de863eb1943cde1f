//! Plugin name sanitization.
//!
//! Every generated plugin or channel name goes through [`sanitize`]: bytes
//! outside `[A-Za-z0-9]` become `_`, `|` and `@` pass through, `+` and `-`
//! become `p` and `m`.

/// Sanitize a name with the default pass-through set.
pub fn sanitize(name: &str) -> String {
    sanitize_with(name, "")
}

/// Sanitize a name, additionally passing through every byte in `allowed`.
pub fn sanitize_with(name: &str, allowed: &str) -> String {
    let allowed = allowed.as_bytes();
    let mut out = String::with_capacity(name.len());
    for &b in name.as_bytes() {
        let c = match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'|' | b'@' => b as char,
            b'+' => 'p',
            b'-' => 'm',
            _ if b.is_ascii() && allowed.contains(&b) => b as char,
            _ => '_',
        };
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_rules() {
        assert_eq!(sanitize("Cube.001"), "Cube_001");
        assert_eq!(sanitize("OB|Cube@mesh"), "OB|Cube@mesh");
        assert_eq!(sanitize("a+b-c"), "apbmc");
        assert_eq!(sanitize("my node"), "my_node");
    }

    #[test]
    fn test_multibyte_maps_each_byte() {
        // 'é' is two bytes in UTF-8
        assert_eq!(sanitize("é"), "__");
    }

    #[test]
    fn test_widened_set() {
        assert_eq!(sanitize_with("tex/wood.png", "/."), "tex/wood.png");
        assert_eq!(sanitize("tex/wood.png"), "tex_wood_png");
    }
}
